// src/models/attempt.rs

use serde::{Deserialize, Serialize};
use sqlx::{PgPool, prelude::FromRow, types::Json};
use validator::Validate;

/// Per-question grading result, stored in the attempt's JSONB `answers` column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub question_index: i64,
    /// The option index the user picked; None when the question was skipped.
    pub user_answer: Option<i64>,
    pub is_correct: bool,
    /// Per-question time is not reported by clients; recorded as 0.
    pub time_spent: i64,
}

/// Represents the 'attempts' table: one immutable row per quiz submission.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Attempt {
    pub id: i64,
    pub user_id: i64,
    pub quiz_id: i64,
    pub module_id: i64,

    /// 1-based, monotonically increasing per (user_id, quiz_id).
    pub attempt_number: i64,

    pub answers: Json<Vec<AnswerRecord>>,

    /// Raw percentage of correct answers, 0-100.
    pub score: i64,

    /// Display score. Always equals `score`; the column exists for
    /// interface compatibility with historical records.
    pub adjusted_score: i64,

    /// Leaderboard credit derived from score and attempt number.
    pub points_earned: i64,

    pub passed: bool,

    /// 'completed' for all submitted attempts.
    pub status: String,

    pub time_spent: i64,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Lean projection of an attempt for leaderboard aggregation.
#[derive(Debug, Clone, FromRow)]
pub struct AttemptRow {
    pub user_id: i64,
    pub quiz_id: i64,
    pub attempt_number: i64,
    pub points_earned: i64,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

const ROW_COLUMNS: &str = "user_id, quiz_id, attempt_number, points_earned, created_at";

impl AttemptRow {
    /// Every attempt ever recorded. The aggregator reduces this to
    /// latest-per-(user, quiz) before summing.
    pub async fn all(pool: &PgPool) -> Result<Vec<AttemptRow>, sqlx::Error> {
        sqlx::query_as::<_, AttemptRow>(&format!("SELECT {ROW_COLUMNS} FROM attempts"))
            .fetch_all(pool)
            .await
    }

    /// All attempts for a single user, for the scoped stats computation.
    pub async fn for_user(pool: &PgPool, user_id: i64) -> Result<Vec<AttemptRow>, sqlx::Error> {
        sqlx::query_as::<_, AttemptRow>(&format!(
            "SELECT {ROW_COLUMNS} FROM attempts WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_all(pool)
        .await
    }
}

impl Attempt {
    /// The most recent attempt for a (user, quiz) pair, if any.
    pub async fn latest_for(
        pool: &PgPool,
        user_id: i64,
        quiz_id: i64,
    ) -> Result<Option<Attempt>, sqlx::Error> {
        sqlx::query_as::<_, Attempt>(
            r#"
            SELECT id, user_id, quiz_id, module_id, attempt_number, answers,
                   score, adjusted_score, points_earned, passed, status,
                   time_spent, created_at
            FROM attempts
            WHERE user_id = $1 AND quiz_id = $2
            ORDER BY attempt_number DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(quiz_id)
        .fetch_optional(pool)
        .await
    }

    /// Number of attempts recorded for a (user, quiz) pair.
    pub async fn count_for(pool: &PgPool, user_id: i64, quiz_id: i64) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM attempts WHERE user_id = $1 AND quiz_id = $2",
        )
        .bind(user_id)
        .bind(quiz_id)
        .fetch_one(pool)
        .await
    }

    /// Appends a new attempt row, returning its id.
    ///
    /// Fails with a unique violation if `attempt_number` was taken by a
    /// concurrent submission; the caller retries with a recomputed number.
    #[allow(clippy::too_many_arguments)]
    pub async fn insert(
        pool: &PgPool,
        user_id: i64,
        quiz_id: i64,
        module_id: i64,
        attempt_number: i64,
        answers: &[AnswerRecord],
        score: i64,
        points_earned: i64,
        passed: bool,
        time_spent: i64,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO attempts
                (user_id, quiz_id, module_id, attempt_number, answers,
                 score, adjusted_score, points_earned, passed, status, time_spent)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 'completed', $10)
            RETURNING id
            "#,
        )
        .bind(user_id)
        .bind(quiz_id)
        .bind(module_id)
        .bind(attempt_number)
        .bind(Json(answers))
        .bind(score)
        .bind(score) // adjusted_score mirrors score
        .bind(points_earned)
        .bind(passed)
        .bind(time_spent)
        .fetch_one(pool)
        .await
    }
}

/// DTO for submitting a quiz attempt.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitQuizRequest {
    /// Positionally aligned with the quiz's question list.
    /// Missing or null entries are graded as incorrect.
    pub answers: Vec<Option<i64>>,
    #[validate(range(min = 0))]
    #[serde(default)]
    pub time_spent: i64,
}

/// Per-question grading detail returned to the client.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionResult {
    pub question_index: i64,
    pub question: String,
    pub user_answer: Option<i64>,
    pub correct_answer: i64,
    pub is_correct: bool,
    pub explanation: Option<String>,
}

/// Payload of a successful submission response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionData {
    pub attempt_id: i64,
    pub attempt_number: i64,
    pub score: i64,
    pub adjusted_score: i64,
    pub points_earned: i64,
    pub passed: bool,
    pub status: String,
    pub can_re_attempt: bool,
    pub correct_answers: i64,
    pub total_questions: i64,
    pub passing_score: i64,
    pub time_spent: i64,
    pub results: Vec<QuestionResult>,
}
