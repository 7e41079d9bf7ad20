// src/models/quiz.rs

use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use validator::Validate;

/// One question embedded in a quiz's JSONB `questions` column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizQuestion {
    /// The text content of the question.
    pub question: String,

    /// List of options (e.g., ["Option A", "Option B"]).
    pub options: Vec<String>,

    /// Index into `options` of the correct answer (single choice).
    pub correct_answer: i64,

    /// Explanation shown to the user after grading.
    pub explanation: Option<String>,
}

/// Represents the 'quizzes' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Quiz {
    pub id: i64,

    /// The learning module this quiz belongs to.
    pub module_id: i64,

    pub title: String,

    pub description: Option<String>,

    /// Ordered question list, stored as a JSON array in the database.
    pub questions: Json<Vec<QuizQuestion>>,

    /// Minimum percentage score required to pass.
    pub passing_score: i64,

    /// Unpublished quizzes reject submissions.
    pub is_published: bool,

    /// Denormalized analytics counters, updated best-effort on submission.
    pub total_attempts: i64,
    pub pass_count: i64,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Quiz {
    pub async fn find(pool: &sqlx::PgPool, id: i64) -> Result<Option<Quiz>, sqlx::Error> {
        sqlx::query_as::<_, Quiz>(
            r#"
            SELECT id, module_id, title, description, questions, passing_score,
                   is_published, total_attempts, pass_count, created_at
            FROM quizzes
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }
}

/// DTO for a question sent to the client (excludes answer and explanation).
#[derive(Debug, Serialize)]
pub struct PublicQuestion {
    pub question: String,
    pub options: Vec<String>,
}

/// DTO for a quiz sent to the client before submission.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicQuiz {
    pub id: i64,
    pub module_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub passing_score: i64,
    pub total_questions: usize,
    pub questions: Vec<PublicQuestion>,
}

impl From<Quiz> for PublicQuiz {
    fn from(quiz: Quiz) -> Self {
        let questions: Vec<PublicQuestion> = quiz
            .questions
            .0
            .into_iter()
            .map(|q| PublicQuestion {
                question: q.question,
                options: q.options,
            })
            .collect();

        PublicQuiz {
            id: quiz.id,
            module_id: quiz.module_id,
            title: quiz.title,
            description: quiz.description,
            passing_score: quiz.passing_score,
            total_questions: questions.len(),
            questions,
        }
    }
}

/// DTO for creating a new quiz with embedded questions.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateQuizRequest {
    pub module_id: i64,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(custom(function = validate_questions))]
    pub questions: Vec<QuizQuestion>,
    #[validate(range(min = 0, max = 100))]
    pub passing_score: i64,
    #[serde(default)]
    pub is_published: bool,
}

fn validate_questions(questions: &[QuizQuestion]) -> Result<(), validator::ValidationError> {
    if questions.is_empty() {
        return Err(validator::ValidationError::new("questions_cannot_be_empty"));
    }
    for q in questions {
        if q.options.len() < 2 {
            return Err(validator::ValidationError::new("too_few_options"));
        }
        if q.correct_answer < 0 || q.correct_answer as usize >= q.options.len() {
            return Err(validator::ValidationError::new(
                "correct_answer_out_of_range",
            ));
        }
    }
    Ok(())
}
