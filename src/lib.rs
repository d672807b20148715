use axum::{
    Router,
    extract::FromRef,
    http::HeaderName,
    middleware,
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod access;
pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod memory;
pub mod models;
pub mod password;
pub mod repository;

// Routing segregation (Public, Student, Teacher).
pub mod routes;
use routes::{public, student, teacher};

// --- Public Re-exports ---

pub use access::AccessRules;
pub use config::AppConfig;
pub use error::AppError;
pub use memory::InMemoryRepository;
pub use repository::{PostgresRepository, RepositoryState};

/// ApiDoc
///
/// OpenAPI description of every route and view model, served at `/api-docs/openapi.json`
/// and browsable under `/swagger-ui`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::login_page, handlers::login, handlers::logout, handlers::redirect_after_login,
        handlers::student_dashboard, handlers::teacher_dashboard,
        handlers::add_student_form, handlers::add_student, handlers::edit_student_form,
        handlers::update_student, handlers::delete_student,
        handlers::add_teacher_form, handlers::add_teacher, handlers::edit_teacher_form,
        handlers::update_teacher, handlers::delete_teacher,
        handlers::add_department_form, handlers::add_department, handlers::delete_department,
        handlers::add_course_form, handlers::add_course, handlers::delete_course
    ),
    components(
        schemas(
            models::Role, models::Student, models::Teacher, models::Department, models::Course,
            models::LoginForm, models::StudentForm, models::TeacherForm,
            models::DepartmentForm, models::CourseForm,
            models::LoginPage, models::StudentDashboard, models::TeacherDashboard,
            models::StudentFormView, models::TeacherFormView, models::DepartmentFormView,
            models::CourseFormView,
        )
    ),
    tags(
        (name = "academic-portal", description = "Role-based academic records portal")
    )
)]
struct ApiDoc;

/// AppState
///
/// The single, cloneable container of everything handlers need. Built once in `main`
/// (or in a test) and shared by every request.
#[derive(Clone)]
pub struct AppState {
    /// Directory and credential store.
    pub repo: RepositoryState,
    /// The loaded, immutable configuration.
    pub config: AppConfig,
    /// Route table consulted by the access-control middleware.
    pub access: Arc<AccessRules>,
}

impl AppState {
    /// State with the standard route table.
    pub fn new(repo: RepositoryState, config: AppConfig) -> Self {
        Self {
            repo,
            config,
            access: Arc::new(AccessRules::standard()),
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// ensure_bootstrap_teacher
///
/// Creates the configured first teacher unless the email is already taken by any account.
/// Returns whether an account was created.
pub async fn ensure_bootstrap_teacher(
    repo: &dyn repository::Repository,
    bootstrap: &config::BootstrapTeacher,
) -> Result<bool, AppError> {
    if repo.find_student_by_email(&bootstrap.email).await?.is_some()
        || repo.find_teacher_by_email(&bootstrap.email).await?.is_some()
    {
        return Ok(false);
    }
    repo.create_teacher(models::NewTeacher {
        name: bootstrap.name.clone(),
        email: bootstrap.email.clone(),
        password_hash: password::hash_password(&bootstrap.password)?,
        department_id: None,
    })
    .await?;
    Ok(true)
}

/// create_router
///
/// Assembles the routing structure, puts the whole of it behind the access-control
/// middleware, and wraps it in the request-id and tracing layers.
pub fn create_router(state: AppState) -> Router {
    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .nest("/student", student::student_routes())
        .nest("/teacher", teacher::teacher_routes())
        .fallback(|| async { AppError::NotFound("route".to_string()) })
        // Applies to every route above and to the fallback, so unknown paths are still
        // subject to deny-by-default.
        .layer(middleware::from_fn_with_state(
            state.clone(),
            access::access_control,
        ))
        .with_state(state);

    base_router.layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(trace_span_logger)
                    .on_response(
                        DefaultOnResponse::new()
                            .level(Level::INFO)
                            .latency_unit(tower_http::LatencyUnit::Millis),
                    ),
            )
            .layer(PropagateRequestIdLayer::new(x_request_id)),
    )
}

/// trace_span_logger
///
/// Span factory for `TraceLayer`: every log line of a request carries its method, uri and
/// `x-request-id`.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
