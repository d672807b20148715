use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Teacher Router Module
///
/// Nested under `/teacher`. Every mutation answers with a redirect to `/teacher/dashboard`.
/// Deletes are plain GET links, matching the form-driven UI.
pub fn teacher_routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(handlers::teacher_dashboard))
        // --- Student CRUD ---
        .route(
            "/student/add",
            get(handlers::add_student_form).post(handlers::add_student),
        )
        .route("/student/edit/{id}", get(handlers::edit_student_form))
        .route(
            "/student/update/{id}",
            axum::routing::post(handlers::update_student),
        )
        .route("/student/delete/{id}", get(handlers::delete_student))
        // --- Teacher CRUD ---
        .route(
            "/teacher/add",
            get(handlers::add_teacher_form).post(handlers::add_teacher),
        )
        .route("/teacher/edit/{id}", get(handlers::edit_teacher_form))
        .route(
            "/teacher/update/{id}",
            axum::routing::post(handlers::update_teacher),
        )
        .route("/teacher/delete/{id}", get(handlers::delete_teacher))
        // --- Departments ---
        .route(
            "/department/add",
            get(handlers::add_department_form).post(handlers::add_department),
        )
        .route("/department/delete/{id}", get(handlers::delete_department))
        // --- Courses ---
        .route(
            "/course/add",
            get(handlers::add_course_form).post(handlers::add_course),
        )
        .route("/course/delete/{id}", get(handlers::delete_course))
}
