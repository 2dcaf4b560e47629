use async_trait::async_trait;
use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use vocab_quest::{api::*, Database, GamificationService, ProgressStore, QuizService, RwlParser};

async fn create_test_server() -> TestServer {
    let db = Database::new("sqlite::memory:").await.unwrap();
    db.seed_sample_words().await.unwrap();

    let app_state = AppState {
        gamification: GamificationService::new(Arc::new(db.clone())),
        quiz_service: QuizService::new(db.clone()),
        rwl_parser: RwlParser::new().unwrap(),
        db,
    };

    let app = create_router(app_state);
    TestServer::new(app).unwrap()
}

#[tokio::test]
async fn test_health() {
    let server = create_test_server().await;

    let response = server.get("/health").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"], "ok");
}

#[tokio::test]
async fn test_api_levels() {
    let server = create_test_server().await;

    let response = server.get("/api/levels").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"].as_array().unwrap().len(), 4);
    assert_eq!(body["data"][1]["required_points"], 500);

    let response = server.get("/api/levels/3").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["required_words"], 150);

    let response = server.get("/api/levels/9").await;
    response.assert_status(StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_api_progress_lifecycle() {
    let server = create_test_server().await;

    let response = server.get("/api/users/kid-1/progress").await;
    response.assert_status(StatusCode::NOT_FOUND);

    let response = server.get("/api/users/kid-1/progress/next-level").await;
    response.assert_status(StatusCode::NOT_FOUND);

    let response = server.post("/api/users/kid-1/progress").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["current_level"], 1);
    assert_eq!(body["data"]["total_points"], 0);

    let response = server
        .post("/api/users/kid-1/points")
        .json(&json!({
            "points": 40,
            "event": {"source": "reading_completed", "title": "The Apple Tree"}
        }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["new_points"], 40);
    assert_eq!(body["data"]["total_points"], 40);
    assert_eq!(body["data"]["leveled_up"], false);

    let response = server.get("/api/users/kid-1/progress/next-level").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["next_level"], 2);
    assert_eq!(body["data"]["points_needed"], 460);
}

#[tokio::test]
async fn test_api_points_for_quiz_event() {
    let server = create_test_server().await;

    let response = server
        .post("/api/users/kid-2/points")
        .json(&json!({
            "points": 60,
            "event": {"source": "quiz_completed", "accuracy": 100, "completion_time": 120, "level": 1}
        }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    let unlocked: Vec<&str> = body["data"]["unlocked_achievements"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["id"].as_str().unwrap())
        .collect();
    assert_eq!(unlocked, vec!["first_quiz", "perfect_score"]);
    assert_eq!(body["data"]["total_points"], 210);
}

#[tokio::test]
async fn test_api_words() {
    let server = create_test_server().await;

    let response = server.get("/api/words?level=1").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"].as_array().unwrap().len(), 8);

    let new_word = json!({
        "id": "castle_n_01",
        "word": "castle",
        "meaning": "성",
        "example_sentence": "The king lives in a castle.",
        "image_url": null,
        "audio_url": null,
        "level": 2
    });

    let response = server.post("/api/words").json(&new_word).await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["word"], "castle");

    let response = server.post("/api/words").json(&new_word).await;
    response.assert_status(StatusCode::CONFLICT);

    let response = server.get("/api/words?level=2").await;
    let body: Value = response.json();
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let response = server.get("/api/words").await;
    let body: Value = response.json();
    assert_eq!(body["data"].as_array().unwrap().len(), 9);

    let response = server
        .post("/api/words")
        .json(&json!({
            "id": "empty",
            "word": "",
            "meaning": "없음",
            "example_sentence": null,
            "image_url": null,
            "audio_url": null,
            "level": 1
        }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_api_quiz_flow() {
    let server = create_test_server().await;

    let response = server
        .post("/api/quiz/start")
        .json(&json!({"user_id": "kid-1", "level": 1}))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    let session_id = body["data"]["id"].as_str().unwrap().to_string();
    let questions = body["data"]["questions"].as_array().unwrap().clone();
    assert_eq!(questions.len(), 5);

    let response = server.get(&format!("/api/quiz/{}", session_id)).await;
    response.assert_status_ok();

    for question in &questions {
        let response = server
            .post(&format!("/api/quiz/{}/answer", session_id))
            .json(&json!({
                "question_id": question["id"],
                "answer": question["correct_answer"],
                "time_spent": 3
            }))
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["data"]["is_correct"], true);
        assert_eq!(body["data"]["points"], 15);
    }

    let response = server
        .post(&format!("/api/quiz/{}/answer", session_id))
        .json(&json!({
            "question_id": questions[0]["id"],
            "answer": questions[0]["correct_answer"],
            "time_spent": 1
        }))
        .await;
    response.assert_status(StatusCode::CONFLICT);

    let response = server.post(&format!("/api/quiz/{}/complete", session_id)).await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["result"]["accuracy"], 100);
    assert_eq!(body["data"]["result"]["total_points"], 75);
    assert_eq!(body["data"]["rewards"]["progress"]["total_quizzes_completed"], 1);
    assert_eq!(body["data"]["rewards"]["progress"]["total_words_learned"], 5);

    // Settled sessions are gone.
    let response = server.post(&format!("/api/quiz/{}/complete", session_id)).await;
    response.assert_status(StatusCode::NOT_FOUND);

    let response = server.get("/api/users/kid-1/words/status").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"].as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn test_api_quiz_errors() {
    let server = create_test_server().await;

    let response = server
        .post("/api/quiz/start")
        .json(&json!({"user_id": "kid-1", "level": 4}))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = server
        .get("/api/quiz/00000000-0000-0000-0000-000000000000")
        .await;
    response.assert_status(StatusCode::NOT_FOUND);

    let response = server
        .post("/api/quiz/00000000-0000-0000-0000-000000000000/complete")
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_api_quiz_config() {
    let server = create_test_server().await;

    let response = server.get("/api/quiz/config").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["questions_per_session"], 5);

    let response = server
        .put("/api/quiz/config")
        .json(&json!({"questions_per_session": 3}))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["questions_per_session"], 3);
    assert_eq!(body["data"]["max_attempts"], 2);

    let response = server
        .put("/api/quiz/config")
        .json(&json!({"max_attempts": 0}))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = server
        .post("/api/quiz/start")
        .json(&json!({"user_id": "kid-1", "level": 1}))
        .await;
    let body: Value = response.json();
    assert_eq!(body["data"]["questions"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_api_rwl() {
    let server = create_test_server().await;

    let response = server.get("/api/rwl/sample").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["title"], "The Apple Tree");
    assert_eq!(body["data"]["total_duration"], 65);

    let response = server
        .post("/api/rwl/parse")
        .json(&json!({"content": "Bedtime\n[00:00:00] Good night.\n[00:00:03] Sleep tight."}))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["segments"].as_array().unwrap().len(), 2);
    assert_eq!(body["data"]["segments"][0]["duration"], 3);

    let response = server
        .post("/api/rwl/parse")
        .json(&json!({"content": "   "}))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = server
        .post("/api/rwl/parse")
        .json(&json!({"content": "Huge\n[99999999999999999999:00:00] Too late."}))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert!(body["error"].as_str().unwrap().contains("Invalid timestamp"));
}

/// Progress store that refuses writes while `failing` is set.
struct FlakyStore {
    inner: Database,
    failing: AtomicBool,
}

#[async_trait]
impl ProgressStore for FlakyStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, value: &str) -> anyhow::Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            anyhow::bail!("progress store is offline");
        }
        self.inner.put(key, value).await
    }
}

#[tokio::test]
async fn test_api_quiz_completion_survives_storage_failure() {
    let db = Database::new("sqlite::memory:").await.unwrap();
    db.seed_sample_words().await.unwrap();
    let store = Arc::new(FlakyStore {
        inner: db.clone(),
        failing: AtomicBool::new(true),
    });

    let app_state = AppState {
        gamification: GamificationService::new(store.clone()),
        quiz_service: QuizService::new(db.clone()),
        rwl_parser: RwlParser::new().unwrap(),
        db,
    };
    let server = TestServer::new(create_router(app_state)).unwrap();

    let response = server
        .post("/api/quiz/start")
        .json(&json!({"user_id": "kid-9", "level": 1}))
        .await;
    let body: Value = response.json();
    let session_id = body["data"]["id"].as_str().unwrap().to_string();
    let questions = body["data"]["questions"].as_array().unwrap().clone();
    let question = &questions[0];

    server
        .post(&format!("/api/quiz/{}/answer", session_id))
        .json(&json!({
            "question_id": question["id"],
            "answer": question["correct_answer"],
            "time_spent": 2
        }))
        .await
        .assert_status_ok();

    let response = server.post(&format!("/api/quiz/{}/complete", session_id)).await;
    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = response.json();
    assert_eq!(body["error"], "Saving your progress failed. Please try again.");

    server
        .get("/api/users/kid-9/progress")
        .await
        .assert_status(StatusCode::NOT_FOUND);

    // Completed but unsettled sessions still refuse answers.
    let response = server
        .post(&format!("/api/quiz/{}/answer", session_id))
        .json(&json!({
            "question_id": questions[1]["id"],
            "answer": "late",
            "time_spent": 1
        }))
        .await;
    response.assert_status(StatusCode::CONFLICT);

    store.failing.store(false, Ordering::SeqCst);

    let response = server.post(&format!("/api/quiz/{}/complete", session_id)).await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["result"]["correct_answers"], 1);
    assert_eq!(body["data"]["rewards"]["progress"]["total_quizzes_completed"], 1);

    let response = server.get("/api/users/kid-9/progress").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["total_quizzes_completed"], 1);
    assert_eq!(body["data"]["statistics"]["total_correct_answers"], 1);

    let response = server.post(&format!("/api/quiz/{}/complete", session_id)).await;
    response.assert_status(StatusCode::NOT_FOUND);
}
