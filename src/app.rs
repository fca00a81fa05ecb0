use crate::handlers;
use crate::state::AppState;
use axum::{
    routing::{delete, get, post, put},
    Router,
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/profile", get(handlers::get_profile).put(handlers::put_profile))
        .route("/api/courses", get(handlers::list_courses).post(handlers::add_course))
        .route(
            "/api/courses/:id",
            put(handlers::edit_course).delete(handlers::delete_course),
        )
        .route("/api/routine", get(handlers::list_routine).post(handlers::add_routine))
        .route("/api/routine/import", post(handlers::import_routine))
        .route("/api/routine/:id", delete(handlers::delete_routine))
        .route("/api/attendance", post(handlers::mark_attendance))
        .route("/api/attendance/:routine_id/:date", get(handlers::get_attendance))
        .route("/api/aggregates", get(handlers::get_aggregates))
        .route("/api/summary", get(handlers::get_summary))
        .route("/api/leaderboard", get(handlers::get_leaderboard))
        .route("/api/events", get(handlers::list_events).post(handlers::add_event))
        .route("/api/notices", get(handlers::list_notices).post(handlers::add_notice))
        .route("/api/watch", get(handlers::watch))
        .with_state(state)
}
