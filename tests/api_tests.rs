// tests/api_tests.rs

use std::sync::Arc;

use medquiz::{config::Config, routes, state::AppState, store::MemoryStore, utils::jwt::sign_jwt};
use serde_json::{Value, json};

const SECRET: &str = "test_secret_for_integration_tests";

/// Helper function to spawn the app on a random port for testing.
/// Returns the base URL (e.g., "http://127.0.0.1:12345").
async fn spawn_app() -> String {
    let config = Config::with_secret(SECRET);
    let state = AppState::new(Arc::new(MemoryStore::new()), config);
    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");

    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    address
}

fn token(id: i64, role: &str) -> String {
    sign_jwt(id, &format!("tester-{}", id), role, SECRET, 600).unwrap()
}

/// Creates and publishes `count` questions whose key is always option 0.
async fn seed_published(client: &reqwest::Client, address: &str, count: usize) -> Vec<i64> {
    let admin = token(1, "admin");
    let mut ids = Vec::new();

    for i in 0..count {
        let created: Value = client
            .post(format!("{}/api/admin/questions", address))
            .bearer_auth(&admin)
            .json(&json!({
                "prompt": format!("Question {}", i),
                "options": ["Right", "Wrong", "Also wrong"],
                "correct_answer": 0,
                "explanation": "Option 0 is the key.",
                "category": "cardiology",
                "difficulty": "medium",
                "tags": ["seed"]
            }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let id = created["id"].as_i64().unwrap();

        for status in ["review", "published"] {
            let resp = client
                .post(format!("{}/api/admin/questions/{}/status", address, id))
                .bearer_auth(&admin)
                .json(&json!({ "status": status }))
                .send()
                .await
                .unwrap();
            assert_eq!(resp.status().as_u16(), 200);
        }
        ids.push(id);
    }
    ids
}

#[tokio::test]
async fn health_check_404() {
    // Arrange
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    // Act
    let response = client
        .get(format!("{}/random_path_that_does_not_exist", address))
        .send()
        .await
        .expect("Failed to execute request");

    // Assert
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn sessions_require_a_token() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let missing = client
        .get(format!("{}/api/sessions", address))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status().as_u16(), 401);

    let forged = sign_jwt(5, "mallory", "user", "some_other_secret", 600).unwrap();
    let bad = client
        .get(format!("{}/api/sessions", address))
        .bearer_auth(forged)
        .send()
        .await
        .unwrap();
    assert_eq!(bad.status().as_u16(), 401);
    let body: Value = bad.json().await.unwrap();
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn admin_routes_reject_plain_users() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/api/admin/questions", address))
        .bearer_auth(token(2, "user"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 403);
}

#[tokio::test]
async fn question_workflow_controls_visibility() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let admin = token(1, "admin");

    // Invalid answer index is rejected
    let invalid = client
        .post(format!("{}/api/admin/questions", address))
        .bearer_auth(&admin)
        .json(&json!({
            "prompt": "Which vessel?",
            "options": ["LAD", "RCA"],
            "correct_answer": 5,
            "category": "cardiology",
            "difficulty": "easy"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(invalid.status().as_u16(), 400);

    let created = client
        .post(format!("{}/api/admin/questions", address))
        .bearer_auth(&admin)
        .json(&json!({
            "prompt": "Which vessel?<script>alert(1)</script>",
            "options": ["LAD", "RCA"],
            "correct_answer": 0,
            "category": "cardiology",
            "difficulty": "easy",
            "reference_url": "https://example.org/coronary"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(created.status().as_u16(), 201);
    let question: Value = created.json().await.unwrap();
    assert_eq!(question["status"], "draft");
    assert!(!question["prompt"].as_str().unwrap().contains("<script>"));
    let id = question["id"].as_i64().unwrap();

    // Drafts are not public
    let public: Vec<Value> = client
        .get(format!("{}/api/questions", address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(public.is_empty());

    // Draft cannot jump straight to published
    let skip = client
        .post(format!("{}/api/admin/questions/{}/status", address, id))
        .bearer_auth(&admin)
        .json(&json!({ "status": "published" }))
        .send()
        .await
        .unwrap();
    assert_eq!(skip.status().as_u16(), 400);

    seed_published(&client, &address, 1).await;
    let public: Vec<Value> = client
        .get(format!("{}/api/questions", address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(public.len(), 1);
    assert!(public[0].get("correct_answer").is_none());
}

#[tokio::test]
async fn quiz_session_flow() {
    // Arrange
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    seed_published(&client, &address, 3).await;
    let user = token(42, "user");

    // 1. Start a custom session
    let started = client
        .post(format!("{}/api/sessions", address))
        .bearer_auth(&user)
        .json(&json!({ "mode": "custom", "question_count": 3 }))
        .send()
        .await
        .unwrap();
    assert_eq!(started.status().as_u16(), 201);
    let view: Value = started.json().await.unwrap();
    assert_eq!(view["status"], "active");
    assert_eq!(view["total_questions"], 3);
    let session_id = view["id"].as_i64().unwrap();
    for q in view["questions"].as_array().unwrap() {
        assert!(q.get("correct_answer").is_none(), "key leaked while active");
    }

    // 2. Answer the first question, then resubmit the same answer
    for _ in 0..2 {
        let outcome: Value = client
            .post(format!("{}/api/sessions/{}/answers", address, session_id))
            .bearer_auth(&user)
            .json(&json!({ "index": 0, "answer": 0 }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(outcome["answered_count"], 1);
    }

    // A different answer to the same question is a conflict
    let changed = client
        .post(format!("{}/api/sessions/{}/answers", address, session_id))
        .bearer_auth(&user)
        .json(&json!({ "index": 0, "answer": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(changed.status().as_u16(), 409);

    // Out of range question index
    let out_of_range = client
        .post(format!("{}/api/sessions/{}/answers", address, session_id))
        .bearer_auth(&user)
        .json(&json!({ "index": 9, "answer": 0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(out_of_range.status().as_u16(), 400);

    // 3. Other users cannot see the session
    let foreign = client
        .get(format!("{}/api/sessions/{}", address, session_id))
        .bearer_auth(token(43, "user"))
        .send()
        .await
        .unwrap();
    assert_eq!(foreign.status().as_u16(), 404);

    // 4. Answering the rest completes the session
    let mut last = Value::Null;
    for index in 1..3 {
        last = client
            .post(format!("{}/api/sessions/{}/answers", address, session_id))
            .bearer_auth(&user)
            .json(&json!({ "index": index, "answer": 0 }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
    }
    assert_eq!(last["status"], "completed");
    assert_eq!(last["score"], 100);

    // 5. The review view reveals the keys
    let review: Value = client
        .get(format!("{}/api/sessions/{}", address, session_id))
        .bearer_auth(&user)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(review["status"], "completed");
    assert_eq!(review["questions"][0]["correct_answer"], 0);

    // Closed sessions reject further changes
    let late = client
        .post(format!("{}/api/sessions/{}/pause", address, session_id))
        .bearer_auth(&user)
        .send()
        .await
        .unwrap();
    assert_eq!(late.status().as_u16(), 409);

    // 6. Listing shows the session
    let list: Vec<Value> = client
        .get(format!("{}/api/sessions?status=completed", address))
        .bearer_auth(&user)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["id"], session_id);
}

#[tokio::test]
async fn finishing_early_abandons_the_session() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    seed_published(&client, &address, 2).await;
    let user = token(7, "user");

    let view: Value = client
        .post(format!("{}/api/sessions", address))
        .bearer_auth(&user)
        .json(&json!({ "mode": "quick" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    // Only two questions exist, so the quick session is shorter
    assert_eq!(view["total_questions"], 2);
    let id = view["id"].as_i64().unwrap();

    let paused: Value = client
        .post(format!("{}/api/sessions/{}/pause", address, id))
        .bearer_auth(&user)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(paused["paused"], true);

    let finished: Value = client
        .post(format!("{}/api/sessions/{}/finish", address, id))
        .bearer_auth(&user)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(finished["status"], "abandoned");
    assert_eq!(finished["score"], 0);
}

#[tokio::test]
async fn starting_without_questions_fails() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/sessions", address))
        .bearer_auth(token(3, "user"))
        .json(&json!({ "mode": "timed" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn review_matches_the_key_used_for_grading() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let ids = seed_published(&client, &address, 1).await;
    let user = token(8, "user");

    let view: Value = client
        .post(format!("{}/api/sessions", address))
        .bearer_auth(&user)
        .json(&json!({ "mode": "quick" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let session_id = view["id"].as_i64().unwrap();

    // Admin changes the key while the session is running
    let edited = client
        .put(format!("{}/api/admin/questions/{}", address, ids[0]))
        .bearer_auth(token(1, "admin"))
        .json(&json!({
            "prompt": "Question 0, revised",
            "options": ["Wrong now", "Right now", "Also wrong", "New option"],
            "correct_answer": 1,
            "category": "cardiology",
            "difficulty": "medium"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(edited.status().as_u16(), 200);

    let outcome: Value = client
        .post(format!("{}/api/sessions/{}/answers", address, session_id))
        .bearer_auth(&user)
        .json(&json!({ "index": 0, "answer": 0 }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(outcome["score"], 100);

    let review: Value = client
        .get(format!("{}/api/sessions/{}", address, session_id))
        .bearer_auth(&user)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(review["questions"][0]["correct_answer"], 0);
    assert_eq!(review["questions"][0]["prompt"], "Question 0");
    assert_eq!(review["questions"][0]["options"].as_array().unwrap().len(), 3);
}
