// tests/quiz_tests.rs

use learnboard::{config::Config, routes, state::AppState};
use sqlx::postgres::PgPoolOptions;

/// Helper function to spawn the app on a random port for testing.
/// Returns the base URL (e.g., "http://127.0.0.1:12345").
async fn spawn_app() -> String {
    // Note: For Postgres, you must have a running database.
    // We'll read from DATABASE_URL environment variable.
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&database_url)
        .await
        .expect("Failed to connect to Postgres for testing. Make sure DATABASE_URL is set.");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    let config = Config {
        database_url: database_url.clone(),
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        jwt_expiration: 600,
        rust_log: "error".to_string(),
        admin_email: None,
        admin_password: None,
    };

    let state = AppState { pool, config };
    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");

    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
        )
        .await
        .unwrap();
    });

    address
}

/// Registers a fresh user and logs in. Returns (user_id, token).
async fn register_and_login(client: &reqwest::Client, address: &str) -> (i64, String) {
    let email = format!("u_{}@test.com", &uuid::Uuid::new_v4().to_string()[..8]);
    let password = "password123";

    let resp = client
        .post(format!("{}/api/auth/register", address))
        .json(&serde_json::json!({"name": "Test User", "email": email, "password": password}))
        .send()
        .await
        .expect("Register failed");
    assert_eq!(resp.status().as_u16(), 201);
    let body: serde_json::Value = resp.json().await.unwrap();
    let user_id = body["data"]["id"].as_i64().expect("User id missing");

    let login: serde_json::Value = client
        .post(format!("{}/api/auth/login", address))
        .json(&serde_json::json!({"email": email, "password": password}))
        .send()
        .await
        .expect("Login failed")
        .json()
        .await
        .unwrap();
    let token = login["data"]["token"].as_str().expect("Token missing");

    (user_id, token.to_string())
}

/// Registers a user, promotes it to admin directly in the database, and
/// logs in again so the token carries the admin role.
async fn admin_token(client: &reqwest::Client, address: &str, pool: &sqlx::PgPool) -> String {
    let email = format!("adm_{}@test.com", &uuid::Uuid::new_v4().to_string()[..8]);
    let password = "password123";

    client
        .post(format!("{}/api/auth/register", address))
        .json(&serde_json::json!({"name": "Admin", "email": email, "password": password}))
        .send()
        .await
        .expect("Register failed");

    sqlx::query("UPDATE users SET role = 'admin' WHERE email = $1")
        .bind(&email)
        .execute(pool)
        .await
        .unwrap();

    let login: serde_json::Value = client
        .post(format!("{}/api/auth/login", address))
        .json(&serde_json::json!({"email": email, "password": password}))
        .send()
        .await
        .expect("Login failed")
        .json()
        .await
        .unwrap();

    login["data"]["token"].as_str().unwrap().to_string()
}

/// Creates a published 4-question quiz with answer key [1, 2, 0, 3].
async fn create_quiz(client: &reqwest::Client, address: &str, token: &str) -> i64 {
    let questions: Vec<serde_json::Value> = [1, 2, 0, 3]
        .iter()
        .enumerate()
        .map(|(i, answer)| {
            serde_json::json!({
                "question": format!("Question {}", i + 1),
                "options": ["A", "B", "C", "D"],
                "correct_answer": answer,
                "explanation": "Because."
            })
        })
        .collect();

    let resp = client
        .post(format!("{}/api/admin/quizzes", address))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({
            "moduleId": 1,
            "title": "Fractions basics",
            "questions": questions,
            "passingScore": 70,
            "isPublished": true
        }))
        .send()
        .await
        .expect("Create quiz failed");
    assert_eq!(resp.status().as_u16(), 201);

    let body: serde_json::Value = resp.json().await.unwrap();
    body["data"]["id"].as_i64().unwrap()
}

async fn submit(
    client: &reqwest::Client,
    address: &str,
    token: &str,
    quiz_id: i64,
    answers: serde_json::Value,
) -> reqwest::Response {
    client
        .post(format!("{}/api/quiz/{}/submit", address, quiz_id))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({"answers": answers, "timeSpent": 42}))
        .send()
        .await
        .expect("Submit failed")
}

#[tokio::test]
async fn perfect_first_attempt_locks_the_quiz() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let database_url = std::env::var("DATABASE_URL").unwrap();
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&database_url)
        .await
        .unwrap();

    let admin = admin_token(&client, &address, &pool).await;
    let quiz_id = create_quiz(&client, &address, &admin).await;
    let (user_id, token) = register_and_login(&client, &address).await;

    // Perfect submission.
    let resp = submit(&client, &address, &token, quiz_id, serde_json::json!([1, 2, 0, 3])).await;
    assert_eq!(resp.status().as_u16(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);
    let data = &body["data"];
    assert_eq!(data["score"], 100);
    assert_eq!(data["adjustedScore"], 100);
    assert_eq!(data["attemptNumber"], 1);
    assert_eq!(data["pointsEarned"], 100);
    assert_eq!(data["passed"], true);
    assert_eq!(data["canReAttempt"], false);
    assert_eq!(data["correctAnswers"], 4);
    assert_eq!(data["totalQuestions"], 4);
    assert_eq!(data["results"].as_array().unwrap().len(), 4);

    // A second submission is rejected and nothing new is written.
    let resp = submit(&client, &address, &token, quiz_id, serde_json::json!([1, 2, 0, 3])).await;
    assert_eq!(resp.status().as_u16(), 400);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["data"]["isCompleted"], true);
    assert_eq!(body["data"]["userScore"], 100);
    assert_eq!(body["data"]["attemptNumber"], 1);

    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM attempts WHERE user_id = $1 AND quiz_id = $2")
            .bind(user_id)
            .bind(quiz_id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn reattempt_points_are_capped_at_85() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let database_url = std::env::var("DATABASE_URL").unwrap();
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&database_url)
        .await
        .unwrap();

    let admin = admin_token(&client, &address, &pool).await;
    let quiz_id = create_quiz(&client, &address, &admin).await;
    let (_user_id, token) = register_and_login(&client, &address).await;

    // One wrong answer: 75%, re-attempt allowed.
    let resp = submit(&client, &address, &token, quiz_id, serde_json::json!([1, 2, 1, 3])).await;
    assert_eq!(resp.status().as_u16(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["score"], 75);
    assert_eq!(body["data"]["attemptNumber"], 1);
    assert_eq!(body["data"]["pointsEarned"], 75);
    assert_eq!(body["data"]["canReAttempt"], true);

    // Perfect re-attempt still earns only 85 points.
    let resp = submit(&client, &address, &token, quiz_id, serde_json::json!([1, 2, 0, 3])).await;
    assert_eq!(resp.status().as_u16(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["score"], 100);
    assert_eq!(body["data"]["attemptNumber"], 2);
    assert_eq!(body["data"]["pointsEarned"], 85);
    assert_eq!(body["data"]["canReAttempt"], false);
}

#[tokio::test]
async fn attempt_numbers_increase_without_gaps() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let database_url = std::env::var("DATABASE_URL").unwrap();
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&database_url)
        .await
        .unwrap();

    let admin = admin_token(&client, &address, &pool).await;
    let quiz_id = create_quiz(&client, &address, &admin).await;
    let (_user_id, token) = register_and_login(&client, &address).await;

    // All-wrong submissions never trigger the lockout.
    for expected in 1..=3 {
        let resp =
            submit(&client, &address, &token, quiz_id, serde_json::json!([0, 0, 1, 0])).await;
        assert_eq!(resp.status().as_u16(), 200);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["data"]["attemptNumber"], expected);
        assert_eq!(body["data"]["score"], 0);
    }
}

#[tokio::test]
async fn submit_without_answers_is_bad_request() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let database_url = std::env::var("DATABASE_URL").unwrap();
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&database_url)
        .await
        .unwrap();

    let admin = admin_token(&client, &address, &pool).await;
    let quiz_id = create_quiz(&client, &address, &admin).await;
    let (_user_id, token) = register_and_login(&client, &address).await;

    let resp = client
        .post(format!("{}/api/quiz/{}/submit", address, quiz_id))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({"timeSpent": 5}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
}

#[tokio::test]
async fn submit_to_missing_quiz_is_not_found() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let (_user_id, token) = register_and_login(&client, &address).await;

    let resp = submit(
        &client,
        &address,
        &token,
        9223372036854775807,
        serde_json::json!([0]),
    )
    .await;
    assert_eq!(resp.status().as_u16(), 404);
}

#[tokio::test]
async fn submit_to_unpublished_quiz_is_forbidden() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let database_url = std::env::var("DATABASE_URL").unwrap();
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&database_url)
        .await
        .unwrap();

    let admin = admin_token(&client, &address, &pool).await;
    let quiz_id = create_quiz(&client, &address, &admin).await;
    sqlx::query("UPDATE quizzes SET is_published = FALSE WHERE id = $1")
        .bind(quiz_id)
        .execute(&pool)
        .await
        .unwrap();

    let (_user_id, token) = register_and_login(&client, &address).await;
    let resp = submit(&client, &address, &token, quiz_id, serde_json::json!([1, 2, 0, 3])).await;
    assert_eq!(resp.status().as_u16(), 403);
}

#[tokio::test]
async fn get_quiz_hides_the_answer_key() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let database_url = std::env::var("DATABASE_URL").unwrap();
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&database_url)
        .await
        .unwrap();

    let admin = admin_token(&client, &address, &pool).await;
    let quiz_id = create_quiz(&client, &address, &admin).await;
    let (_user_id, token) = register_and_login(&client, &address).await;

    let resp = client
        .get(format!("{}/api/quiz/{}", address, quiz_id))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);

    let body: serde_json::Value = resp.json().await.unwrap();
    let questions = body["data"]["questions"].as_array().unwrap();
    assert_eq!(questions.len(), 4);
    for q in questions {
        assert!(q.get("correct_answer").is_none());
        assert!(q.get("explanation").is_none());
    }
}
