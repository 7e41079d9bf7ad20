// src/handlers/leaderboard.rs

use std::collections::HashMap;

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use serde_json::json;
use sqlx::PgPool;

use crate::{
    config::LEADERBOARD_LIMIT,
    error::AppError,
    models::{
        attempt::AttemptRow,
        leaderboard::{LeaderboardEntry, UserStats},
        user::UserRow,
    },
};

/// Reduces the attempt log to the latest attempt per (user, quiz) pair.
/// Earlier attempts on the same quiz must never contribute to totals.
fn latest_per_quiz(rows: Vec<AttemptRow>) -> Vec<AttemptRow> {
    let mut latest: HashMap<(i64, i64), AttemptRow> = HashMap::new();
    for row in rows {
        match latest.get(&(row.user_id, row.quiz_id)) {
            Some(existing) if existing.attempt_number >= row.attempt_number => {}
            _ => {
                latest.insert((row.user_id, row.quiz_id), row);
            }
        }
    }
    latest.into_values().collect()
}

/// Folds deduplicated rows into per-user totals.
fn fold_user_stats(latest: &[AttemptRow]) -> HashMap<i64, UserStats> {
    let mut stats: HashMap<i64, UserStats> = HashMap::new();
    for row in latest {
        let entry = stats.entry(row.user_id).or_default();
        entry.total_points += row.points_earned;
        entry.total_topics += 1;
        if row.created_at > entry.last_activity {
            entry.last_activity = row.created_at;
        }
    }
    stats
}

/// Joins per-user totals onto the full registered population, sorts by
/// points (recency breaks ties), truncates to the top 50 and assigns dense
/// 1-based ranks. Users without attempts appear with zeroed totals.
fn build_leaderboard(
    users: Vec<UserRow>,
    stats: &HashMap<i64, UserStats>,
) -> Vec<LeaderboardEntry> {
    let mut entries: Vec<LeaderboardEntry> = users
        .into_iter()
        .map(|user| {
            let user_stats = stats.get(&user.id).cloned().unwrap_or_default();
            LeaderboardEntry {
                user_id: user.id,
                name: user.name,
                email: user.email,
                profile_picture: user.profile_picture,
                total_points: user_stats.total_points,
                total_topics: user_stats.total_topics,
                last_activity: user_stats.last_activity,
                rank: 0,
            }
        })
        .collect();

    entries.sort_by(|a, b| {
        b.total_points
            .cmp(&a.total_points)
            .then(b.last_activity.cmp(&a.last_activity))
            .then(a.user_id.cmp(&b.user_id))
    });
    entries.truncate(LEADERBOARD_LIMIT);

    for (index, entry) in entries.iter_mut().enumerate() {
        entry.rank = index as i64 + 1;
    }

    entries
}

/// A user's rank: 1 + the number of users whose total strictly exceeds
/// theirs. Independent of the top-50 cutoff, so it stays correct for users
/// far down the list.
fn rank_for(stats: &HashMap<i64, UserStats>, total_points: i64) -> i64 {
    1 + stats
        .values()
        .filter(|s| s.total_points > total_points)
        .count() as i64
}

/// GET /api/leaderboard
///
/// Recomputes the full ranking from the attempt log on every call.
pub async fn get_leaderboard(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let users = UserRow::all(&pool).await?;
    let total_users = users.len();

    let rows = AttemptRow::all(&pool).await?;
    let stats = fold_user_stats(&latest_per_quiz(rows));
    let leaderboard = build_leaderboard(users, &stats);

    Ok(Json(json!({
        "success": true,
        "data": {
            "leaderboard": leaderboard,
            "totalUsers": total_users,
        },
    })))
}

/// GET /api/leaderboard/user/{user_id}
///
/// Stats come from the target user's attempts alone; the rank is computed
/// against every user's deduplicated totals. A user with no attempts gets
/// `{userStats: null, rank: null}`, which is not an error.
pub async fn get_user_rank(
    State(pool): State<PgPool>,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let exists = sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(&pool)
        .await?;
    if exists.is_none() {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    let user_rows = AttemptRow::for_user(&pool, user_id).await?;
    if user_rows.is_empty() {
        return Ok(Json(json!({
            "success": true,
            "data": { "userStats": null, "rank": null },
        })));
    }

    let user_stats = fold_user_stats(&latest_per_quiz(user_rows))
        .remove(&user_id)
        .unwrap_or_default();

    let all_stats = fold_user_stats(&latest_per_quiz(AttemptRow::all(&pool).await?));
    let rank = rank_for(&all_stats, user_stats.total_points);

    Ok(Json(json!({
        "success": true,
        "data": { "userStats": user_stats, "rank": rank },
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn row(user_id: i64, quiz_id: i64, attempt_number: i64, points: i64, minute: i64) -> AttemptRow {
        AttemptRow {
            user_id,
            quiz_id,
            attempt_number,
            points_earned: points,
            created_at: Some(
                Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap() + Duration::minutes(minute),
            ),
        }
    }

    fn user(id: i64) -> UserRow {
        UserRow {
            id,
            name: format!("User {}", id),
            email: format!("user{}@example.com", id),
            profile_picture: None,
        }
    }

    #[test]
    fn test_dedup_keeps_highest_attempt_number() {
        let rows = vec![row(1, 10, 1, 50, 0), row(1, 10, 2, 85, 5), row(1, 20, 1, 100, 3)];

        let latest = latest_per_quiz(rows);
        assert_eq!(latest.len(), 2);
        let quiz_a = latest.iter().find(|r| r.quiz_id == 10).unwrap();
        assert_eq!(quiz_a.attempt_number, 2);
        assert_eq!(quiz_a.points_earned, 85);
    }

    #[test]
    fn test_totals_exclude_stale_attempts() {
        // {quiz A: attempt1=50, attempt2=85} + {quiz B: attempt1=100}
        // must total 185, never 235.
        let rows = vec![row(1, 10, 1, 50, 0), row(1, 10, 2, 85, 5), row(1, 20, 1, 100, 3)];

        let stats = fold_user_stats(&latest_per_quiz(rows));
        let user_stats = &stats[&1];
        assert_eq!(user_stats.total_points, 185);
        assert_eq!(user_stats.total_topics, 2);
        assert_eq!(user_stats.last_activity, row(1, 10, 2, 85, 5).created_at);
    }

    #[test]
    fn test_zero_attempt_users_are_included() {
        let rows = vec![row(1, 10, 1, 80, 0)];
        let stats = fold_user_stats(&latest_per_quiz(rows));

        let entries = build_leaderboard(vec![user(1), user(2)], &stats);
        assert_eq!(entries.len(), 2);
        let idle = entries.iter().find(|e| e.user_id == 2).unwrap();
        assert_eq!(idle.total_points, 0);
        assert_eq!(idle.total_topics, 0);
        assert_eq!(idle.last_activity, None);
    }

    #[test]
    fn test_sort_and_dense_ranks() {
        let rows = vec![
            row(1, 10, 1, 80, 0),
            row(2, 10, 1, 95, 1),
            // Users 3 and 4 tie on points; 4 is more recent.
            row(3, 10, 1, 90, 2),
            row(4, 10, 1, 90, 8),
        ];
        let stats = fold_user_stats(&latest_per_quiz(rows));

        let entries = build_leaderboard(vec![user(1), user(2), user(3), user(4)], &stats);
        let order: Vec<i64> = entries.iter().map(|e| e.user_id).collect();
        assert_eq!(order, vec![2, 4, 3, 1]);
        let ranks: Vec<i64> = entries.iter().map(|e| e.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_leaderboard_truncates_to_limit() {
        let mut users = Vec::new();
        let mut rows = Vec::new();
        for id in 1..=60 {
            users.push(user(id));
            rows.push(row(id, 10, 1, id, id));
        }
        let stats = fold_user_stats(&latest_per_quiz(rows));

        let entries = build_leaderboard(users, &stats);
        assert_eq!(entries.len(), LEADERBOARD_LIMIT);
        // Highest scorer first, rank spans 1..=50 with no gaps.
        assert_eq!(entries[0].user_id, 60);
        assert_eq!(entries[0].rank, 1);
        assert_eq!(entries[49].rank, 50);
    }

    #[test]
    fn test_rank_agreement_between_contracts() {
        // The single-user rank must match the position the global
        // aggregation would assign, for every user.
        let rows = vec![
            row(1, 10, 1, 50, 0),
            row(1, 10, 2, 85, 5),
            row(1, 20, 1, 100, 3),
            row(2, 10, 1, 95, 1),
            row(2, 20, 1, 95, 2),
            row(3, 20, 1, 40, 9),
        ];
        let stats = fold_user_stats(&latest_per_quiz(rows));
        let entries = build_leaderboard(vec![user(1), user(2), user(3)], &stats);

        for entry in &entries {
            let expected = rank_for(&stats, entry.total_points);
            assert_eq!(
                expected, entry.rank,
                "rank mismatch for user {}",
                entry.user_id
            );
        }
    }

    #[test]
    fn test_rank_for_ties_share_the_better_count() {
        let rows = vec![
            row(1, 10, 1, 90, 0),
            row(2, 10, 1, 90, 1),
            row(3, 10, 1, 100, 2),
        ];
        let stats = fold_user_stats(&latest_per_quiz(rows));

        // Both tied users have exactly one user strictly above them.
        assert_eq!(rank_for(&stats, 90), 2);
        assert_eq!(rank_for(&stats, 100), 1);
        assert_eq!(rank_for(&stats, 0), 4);
    }
}
