// src/routes.rs

use axum::{
    Router,
    http::{Method, header},
    middleware,
    routing::{get, post, put},
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    handlers::{admin, diagnostics, profile, questions, quiz},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware},
};

/// Assembles the main application router.
///
/// * Public: question catalogue and leaderboard.
/// * User: sessions, analytics, profile and diagnostics (bearer token).
/// * Admin: question authoring workflow.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list([
            header::HeaderValue::from_static("http://localhost:3000"),
            header::HeaderValue::from_static("http://127.0.0.1:3000"),
        ]))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let public_routes = Router::new()
        .route("/questions", get(questions::list_questions))
        .route("/leaderboard", get(quiz::get_leaderboard));

    let session_routes = Router::new()
        .route("/", post(quiz::create_session).get(quiz::list_sessions))
        .route("/{id}", get(quiz::get_session))
        .route("/{id}/answers", post(quiz::submit_answer))
        .route("/{id}/pause", post(quiz::pause_session))
        .route("/{id}/resume", post(quiz::resume_session))
        .route("/{id}/finish", post(quiz::finish_session))
        .route("/{id}/abandon", post(quiz::abandon_session));

    let diagnostics_routes = Router::new()
        .route(
            "/errors",
            get(diagnostics::list_errors)
                .post(diagnostics::report_error)
                .delete(diagnostics::clear_errors),
        )
        .route("/errors/{id}/recovery", post(diagnostics::report_recovery))
        .route("/health", get(diagnostics::get_health));

    let user_routes = Router::new()
        .nest("/sessions", session_routes)
        .nest("/diagnostics", diagnostics_routes)
        .route("/analytics", get(profile::get_analytics))
        .route("/profile/me", get(profile::get_me))
        .route("/profile/me/preferences", put(profile::update_preferences))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let admin_routes = Router::new()
        .route(
            "/questions",
            get(admin::list_questions).post(admin::create_question),
        )
        .route("/questions/{id}", put(admin::update_question))
        .route("/questions/{id}/status", post(admin::change_status))
        // Auth runs first (outermost), then the admin check
        .layer(middleware::from_fn(admin_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .nest(
            "/api",
            public_routes.merge(user_routes).nest("/admin", admin_routes),
        )
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
