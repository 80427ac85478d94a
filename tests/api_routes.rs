use actix_web::{http::StatusCode, test, web, App};
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use serde_json::{json, Value};
use solace::api::middleware::RequireIdentity;
use solace::api::AppState;
use solace::auth::{AuthService, LocalStore};
use solace::config::SessionConfig;
use solace::db::{connection, SessionRecord};
use solace::responder::{RequestError, ResponseGenerator};
use solace::store::{DuckDbStore, SessionStore};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

struct Echo;

#[async_trait]
impl ResponseGenerator for Echo {
    async fn generate(&self, message: &str, _: Option<&str>, _: &[String]) -> Result<String, RequestError> {
        Ok(message.to_string())
    }
}

async fn state() -> (web::Data<AppState>, Arc<DuckDbStore>) {
    let conn = duckdb::Connection::open_in_memory().unwrap();
    connection::init_schema(&conn).unwrap();
    let store = Arc::new(DuckDbStore::new(Arc::new(Mutex::new(conn))));

    let auth = Arc::new(AuthService::new(Arc::new(LocalStore::in_memory()), Duration::ZERO));
    auth.restore().await;

    let state = AppState::new(auth, store.clone(), Arc::new(Echo), None, SessionConfig::default());
    (web::Data::new(state), store)
}

macro_rules! app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .app_data($state.clone())
                .wrap(RequireIdentity)
                .configure(solace::api::routes::configure),
        )
        .await
    };
}

macro_rules! sign_in {
    ($app:expr) => {{
        let req = test::TestRequest::post()
            .uri("/auth/login")
            .set_json(json!({"email": "someone@example.com", "password": "pw"}))
            .to_request();
        let resp = test::call_service(&$app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }};
}

#[actix_web::test]
async fn guarded_routes_need_a_user() {
    let (state, _) = state().await;
    let app = app!(state);

    let resp = test::try_call_service(&app, test::TestRequest::get().uri("/history").to_request()).await;
    let err = resp.err().expect("anonymous history request must fail");
    assert_eq!(err.as_response_error().status_code(), StatusCode::UNAUTHORIZED);

    let resp = test::call_service(&app, test::TestRequest::get().uri("/resources").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body.as_array().unwrap().len(), 3);
}

#[actix_web::test]
async fn login_rejects_empty_credentials_and_signs_in_demo_user() {
    let (state, _) = state().await;
    let app = app!(state);

    let req = test::TestRequest::post()
        .uri("/auth/login")
        .set_json(json!({"email": "", "password": "pw"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Invalid credentials");

    sign_in!(app);
    let resp = test::call_service(&app, test::TestRequest::get().uri("/auth/me").to_request()).await;
    let user: Value = test::read_body_json(resp).await;
    assert_eq!(user["name"], "Jane Doe");
    assert_eq!(user["email"], "jane@example.com");
}

#[actix_web::test]
async fn register_checks_password_confirmation() {
    let (state, _) = state().await;
    let app = app!(state);

    let req = test::TestRequest::post()
        .uri("/auth/register")
        .set_json(json!({"name": "Sam", "email": "sam@example.com", "password": "longenough", "confirm_password": "different"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Passwords do not match");

    let req = test::TestRequest::post()
        .uri("/auth/register")
        .set_json(json!({"name": "Sam", "email": "sam@example.com", "password": "longenough", "confirm_password": "longenough"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let user: Value = test::read_body_json(resp).await;
    assert_eq!(user["name"], "Sam");
}

#[actix_web::test]
async fn profile_edits_apply_only_on_submit() {
    let (state, _) = state().await;
    let app = app!(state);
    sign_in!(app);

    let patch = |field: &str, value: &str| {
        test::TestRequest::patch()
            .uri("/profile")
            .set_json(json!({"field": field, "value": value}))
            .to_request()
    };

    // Not in edit mode yet
    let resp = test::call_service(&app, patch("phone", "555")).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    test::call_service(&app, test::TestRequest::post().uri("/profile/edit").to_request()).await;
    let resp = test::call_service(&app, patch("emergencyContact.name", "Alex")).await;
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["editing"], true);
    assert_eq!(body["profile"]["emergencyContact"]["name"], "Alex");

    let resp = test::call_service(&app, patch("shoeSize", "9")).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = test::call_service(&app, test::TestRequest::post().uri("/profile/submit").to_request()).await;
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["editing"], false);
    assert_eq!(body["profile"]["emergencyContact"]["name"], "Alex");

    test::call_service(&app, test::TestRequest::post().uri("/profile/edit").to_request()).await;
    test::call_service(&app, patch("fullName", "Someone Else")).await;
    let resp = test::call_service(&app, test::TestRequest::post().uri("/profile/cancel").to_request()).await;
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["profile"]["fullName"], "Jane Doe");
}

#[actix_web::test]
async fn history_filters_by_emotion_and_range() {
    let (state, store) = state().await;
    let app = app!(state);
    sign_in!(app);

    let now = Utc::now();
    let mut recent = SessionRecord::new(Uuid::new_v4(), "1", now - ChronoDuration::days(2));
    recent.emotions = vec!["happy".into()];
    recent.end_time = Some(recent.start_time + ChronoDuration::minutes(30));
    let mut old = SessionRecord::new(Uuid::new_v4(), "1", now - ChronoDuration::days(60));
    old.emotions = vec!["sad".into(), "happy".into()];
    let mut someone_else = SessionRecord::new(Uuid::new_v4(), "2", now);
    someone_else.emotions = vec!["sad".into()];
    for r in [&recent, &old, &someone_else] {
        store.insert(r).await.unwrap();
    }

    let resp = test::call_service(&app, test::TestRequest::get().uri("/history").to_request()).await;
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["sessions"].as_array().unwrap().len(), 2);
    assert_eq!(body["sessions"][0]["id"], recent.id.to_string());
    assert_eq!(body["sessions"][0]["duration_minutes"], 30);
    assert_eq!(body["emotions"], json!(["happy", "sad"]));

    let resp = test::call_service(&app, test::TestRequest::get().uri("/history?emotions=sad").to_request()).await;
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["sessions"].as_array().unwrap().len(), 1);
    assert_eq!(body["sessions"][0]["id"], old.id.to_string());

    let resp = test::call_service(&app, test::TestRequest::get().uri("/history?emotions=sad&range=week").to_request()).await;
    let body: Value = test::read_body_json(resp).await;
    assert!(body["sessions"].as_array().unwrap().is_empty());

    let uri = format!("/history/{}", someone_else.id);
    let resp = test::call_service(&app, test::TestRequest::get().uri(&uri).to_request()).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn next_user_after_logout_gets_a_fresh_profile() {
    let (state, _) = state().await;
    let app = app!(state);
    sign_in!(app);

    test::call_service(&app, test::TestRequest::post().uri("/profile/edit").to_request()).await;
    let req = test::TestRequest::patch()
        .uri("/profile")
        .set_json(json!({"field": "medicalHistory", "value": "panic disorder"}))
        .to_request();
    test::call_service(&app, req).await;
    test::call_service(&app, test::TestRequest::post().uri("/profile/submit").to_request()).await;

    let resp = test::call_service(&app, test::TestRequest::post().uri("/auth/logout").to_request()).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let req = test::TestRequest::post()
        .uri("/auth/register")
        .set_json(json!({"name": "Sam", "email": "sam@example.com", "password": "longenough", "confirm_password": "longenough"}))
        .to_request();
    test::call_service(&app, req).await;

    let resp = test::call_service(&app, test::TestRequest::get().uri("/profile").to_request()).await;
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["profile"]["fullName"], "Sam");
    assert_eq!(body["profile"]["email"], "sam@example.com");
    assert_eq!(body["profile"]["medicalHistory"], "");
}
