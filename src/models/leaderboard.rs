// src/models/leaderboard.rs

use serde::Serialize;

/// One row of the global leaderboard. Derived on every read, never stored.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub user_id: i64,
    pub name: String,
    pub email: String,
    pub profile_picture: Option<String>,

    /// Sum of points from the latest attempt per distinct quiz.
    pub total_points: i64,

    /// Count of distinct quizzes with at least one attempt.
    pub total_topics: i64,

    pub last_activity: Option<chrono::DateTime<chrono::Utc>>,

    /// 1-based dense position; ties get distinct sequential ranks.
    pub rank: i64,
}

/// Aggregated per-user totals, shared by both leaderboard contracts.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub total_points: i64,
    pub total_topics: i64,
    pub last_activity: Option<chrono::DateTime<chrono::Utc>>,
}
