pub mod attendance;
pub mod auth;
pub mod health;
pub mod modules;
pub mod reports;
pub mod scores;
pub mod staff_portal;
pub mod student_portal;
pub mod students;
pub mod uploads;
pub mod venues;

use axum::{
    middleware::from_fn_with_state,
    routing::{get, patch, post},
    Router,
};

use crate::middleware::auth::{require_role, Role, RoleGate};
use crate::middleware::rate_limit::{rps_middleware, RateLimiter};
use crate::openapi;
use crate::AppState;

const ADMIN: &[Role] = &[Role::Admin];
const STAFF: &[Role] = &[Role::Staff];
const STUDENT_OR_ADMIN: &[Role] = &[Role::Student, Role::Admin];

/// Full HTTP surface. Credential routes sit behind the login limiter; every
/// other route group is gated by role.
pub fn router(state: AppState) -> Router {
    let login_limiter = RateLimiter::new(state.config.login_rps);

    let credentials = Router::new()
        .route("/admin/register", post(auth::register_admin))
        .route("/admin/login", post(auth::login_admin))
        .route("/staff/login", post(auth::login_staff))
        .route("/student/login", post(auth::login_student))
        .route_layer(from_fn_with_state(login_limiter, rps_middleware));

    let admin = Router::new()
        .route(
            "/admin/students",
            get(students::list_students).post(students::create_student),
        )
        .route("/admin/students/bulk", post(students::bulk_register_students))
        .route("/admin/students/batch", patch(students::update_batch))
        .route(
            "/admin/students/:id",
            get(students::get_student).delete(students::delete_student),
        )
        .route(
            "/admin/modules",
            get(modules::list_modules).post(modules::create_module),
        )
        .route(
            "/admin/modules/:id",
            get(modules::get_module).patch(modules::update_module),
        )
        .route("/admin/modules/:id/complete", post(modules::complete_module))
        .route("/admin/modules/:id/leaderboard", get(reports::module_leaderboard))
        .route(
            "/admin/modules/:id/leaderboard/export",
            get(reports::export_module_leaderboard),
        )
        .route("/admin/assign-module", post(modules::assign_module))
        .route(
            "/admin/staff",
            get(venues::list_staff).post(venues::create_staff),
        )
        .route(
            "/admin/venues",
            get(venues::list_venues).post(venues::create_venue),
        )
        .route("/admin/venues/:id/leaderboard", get(reports::venue_leaderboard))
        .route("/admin/assign-staff", post(venues::assign_staff))
        .route("/admin/unassign-staff", post(venues::unassign_staff))
        .route("/admin/unassign-all", post(venues::unassign_all))
        .route("/admin/mark-attendance", post(attendance::mark_attendance))
        .route("/admin/existing-attendance", get(attendance::existing_attendance))
        .route("/admin/upload-scores", post(scores::upload_scores))
        .route("/admin/upload-score", post(scores::upload_score))
        .route_layer(from_fn_with_state(
            RoleGate::new(state.issuer.clone(), ADMIN),
            require_role,
        ));

    let staff = Router::new()
        .route("/staff/me", get(staff_portal::me))
        .route("/staff/venue-students", get(staff_portal::venue_students))
        .route("/staff/mark-attendance", post(attendance::staff_mark_attendance))
        .route("/staff/venue-leaderboard", get(reports::staff_venue_leaderboard))
        .route("/staff/attendance-history", get(attendance::attendance_history))
        .route_layer(from_fn_with_state(
            RoleGate::new(state.issuer.clone(), STAFF),
            require_role,
        ));

    let student = Router::new()
        .route("/student/:studentId", get(student_portal::profile))
        .route(
            "/student/:studentId/module/:moduleId",
            get(student_portal::module_performance),
        )
        .route(
            "/student/module/:moduleId/leaderboard",
            get(reports::student_module_leaderboard),
        )
        .route_layer(from_fn_with_state(
            RoleGate::new(state.issuer.clone(), STUDENT_OR_ADMIN),
            require_role,
        ));

    Router::new()
        .route("/health", get(health::health))
        .route("/api-docs/openapi.json", get(openapi::openapi_json))
        .merge(credentials)
        .merge(admin)
        .merge(staff)
        .merge(student)
        .with_state(state)
}
