// src/handlers/quiz.rs

use axum::{
    Extension, Json,
    extract::{Path, State, rejection::JsonRejection},
    response::IntoResponse,
};
use serde_json::json;
use sqlx::PgPool;
use validator::Validate;

use crate::{
    config::{ATTEMPT_INSERT_RETRIES, REATTEMPT_POINT_CAP},
    error::{AppError, is_unique_violation},
    models::{
        attempt::{AnswerRecord, Attempt, QuestionResult, SubmissionData, SubmitQuizRequest},
        quiz::{PublicQuiz, Quiz, QuizQuestion},
    },
    utils::jwt::Claims,
};

/// Grades a submission against the quiz's question list.
///
/// Grading is lenient: answers are aligned by position, and a missing, null
/// or out-of-range entry counts as incorrect rather than an error.
/// Returns the per-question records and the number of correct answers.
fn grade_answers(
    questions: &[QuizQuestion],
    answers: &[Option<i64>],
) -> (Vec<AnswerRecord>, i64) {
    let mut records = Vec::with_capacity(questions.len());
    let mut correct_count = 0;

    for (index, question) in questions.iter().enumerate() {
        let user_answer = answers.get(index).copied().flatten();
        let is_correct = user_answer == Some(question.correct_answer);
        if is_correct {
            correct_count += 1;
        }
        records.push(AnswerRecord {
            question_index: index as i64,
            user_answer,
            is_correct,
            time_spent: 0,
        });
    }

    (records, correct_count)
}

/// Raw percentage score, rounded to the nearest integer.
fn raw_score(correct_count: i64, total_questions: i64) -> i64 {
    if total_questions == 0 {
        return 0;
    }
    ((correct_count as f64 / total_questions as f64) * 100.0).round() as i64
}

/// The point-award policy.
///
/// First attempt earns the raw score outright. Any later attempt is capped
/// at 85 points, so a perfect re-attempt can never match first-try mastery.
fn points_for_attempt(attempt_number: i64, raw_score: i64) -> i64 {
    if attempt_number <= 1 {
        raw_score
    } else {
        raw_score.min(REATTEMPT_POINT_CAP)
    }
}

/// Whether the user is invited to try again. Advisory: the server itself
/// only rejects submissions once a perfect score exists for the pair.
fn can_re_attempt(attempt_number: i64, raw_score: i64) -> bool {
    attempt_number == 1 && raw_score < 100
}

/// Fetches a quiz for taking: questions are stripped of answers.
/// Unpublished quizzes are only visible to admins.
pub async fn get_quiz(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = Quiz::find(&pool, id)
        .await?
        .ok_or(AppError::NotFound("Quiz not found".to_string()))?;

    if !quiz.is_published && claims.role != "admin" {
        return Err(AppError::Forbidden("Quiz is not published".to_string()));
    }

    Ok(Json(json!({
        "success": true,
        "data": PublicQuiz::from(quiz),
    })))
}

/// Submits answers for a quiz: grades them, applies the point policy and
/// appends an immutable attempt record.
///
/// * A perfect score on record for this (user, quiz) pair rejects the
///   submission outright; no new attempt is written.
/// * The attempt insert is the one hard-fail write. Analytics and progress
///   updates afterwards are best-effort and never abort the response.
pub async fn submit_quiz(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    payload: Result<Json<SubmitQuizRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(req) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;
    if let Err(validation_errors) = req.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let quiz = Quiz::find(&pool, id)
        .await?
        .ok_or(AppError::NotFound("Quiz not found".to_string()))?;

    if !quiz.is_published {
        return Err(AppError::Forbidden("Quiz is not published".to_string()));
    }

    let user_id = claims.user_id();

    // Perfect-score lockout: idempotent rejection, nothing is written.
    if let Some(latest) = Attempt::latest_for(&pool, user_id, quiz.id).await? {
        if latest.score == 100 {
            return Err(AppError::AlreadyCompleted {
                user_score: latest.points_earned,
                attempt_number: latest.attempt_number,
            });
        }
    }

    let questions = &quiz.questions.0;
    let total_questions = questions.len() as i64;
    let (records, correct_count) = grade_answers(questions, &req.answers);
    let score = raw_score(correct_count, total_questions);
    let passed = score >= quiz.passing_score;

    // Attempt numbers come from a read-then-write count; the unique index on
    // (user_id, quiz_id, attempt_number) catches concurrent submissions, and
    // points are recomputed per try since they depend on the number.
    let mut attempt_number = Attempt::count_for(&pool, user_id, quiz.id).await? + 1;
    let mut retries = 0;
    let (attempt_id, points_earned) = loop {
        let points = points_for_attempt(attempt_number, score);
        match Attempt::insert(
            &pool,
            user_id,
            quiz.id,
            quiz.module_id,
            attempt_number,
            &records,
            score,
            points,
            passed,
            req.time_spent,
        )
        .await
        {
            Ok(attempt_id) => break (attempt_id, points),
            Err(e) if is_unique_violation(&e) && retries < ATTEMPT_INSERT_RETRIES => {
                retries += 1;
                attempt_number = Attempt::count_for(&pool, user_id, quiz.id).await? + 1;
            }
            Err(e) => {
                tracing::error!("Failed to record attempt: {:?}", e);
                return Err(AppError::from(e));
            }
        }
    };

    // Secondary bookkeeping: log and continue on failure.
    if let Err(e) = bump_quiz_analytics(&pool, quiz.id, passed).await {
        tracing::warn!("Failed to update analytics for quiz {}: {:?}", quiz.id, e);
    }
    if passed {
        if let Err(e) = update_module_progress(&pool, user_id, quiz.module_id).await {
            tracing::warn!(
                "Failed to update progress for user {} module {}: {:?}",
                user_id,
                quiz.module_id,
                e
            );
        }
    }

    let results = records
        .iter()
        .zip(questions.iter())
        .map(|(record, question)| QuestionResult {
            question_index: record.question_index,
            question: question.question.clone(),
            user_answer: record.user_answer,
            correct_answer: question.correct_answer,
            is_correct: record.is_correct,
            explanation: question.explanation.clone(),
        })
        .collect();

    Ok(Json(json!({
        "success": true,
        "data": SubmissionData {
            attempt_id,
            attempt_number,
            score,
            adjusted_score: score,
            points_earned,
            passed,
            status: "completed".to_string(),
            can_re_attempt: can_re_attempt(attempt_number, score),
            correct_answers: correct_count,
            total_questions,
            passing_score: quiz.passing_score,
            time_spent: req.time_spent,
            results,
        },
    })))
}

async fn bump_quiz_analytics(pool: &PgPool, quiz_id: i64, passed: bool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE quizzes
        SET total_attempts = total_attempts + 1,
            pass_count = pass_count + CASE WHEN $2 THEN 1 ELSE 0 END
        WHERE id = $1
        "#,
    )
    .bind(quiz_id)
    .bind(passed)
    .execute(pool)
    .await?;
    Ok(())
}

async fn update_module_progress(
    pool: &PgPool,
    user_id: i64,
    module_id: i64,
) -> Result<(), sqlx::Error> {
    // Recomputes the distinct-passed count so repeated passes on the same
    // quiz do not inflate it.
    sqlx::query(
        r#"
        INSERT INTO module_progress (user_id, module_id, quizzes_completed)
        VALUES ($1, $2, 1)
        ON CONFLICT (user_id, module_id) DO UPDATE SET
            quizzes_completed = (
                SELECT COUNT(DISTINCT quiz_id) FROM attempts
                WHERE user_id = $1 AND module_id = $2 AND passed
            ),
            updated_at = NOW()
        "#,
    )
    .bind(user_id)
    .bind(module_id)
    .execute(pool)
    .await?;
    Ok(())
}
