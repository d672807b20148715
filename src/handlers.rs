use crate::{
    AppState,
    auth::{self, Principal},
    error::AppError,
    models::{
        CourseForm, CourseFormView, DepartmentForm, DepartmentFormView, LoginForm, LoginPage,
        NewCourse, NewStudent, NewTeacher, Role, StudentChanges, StudentDashboard, StudentForm,
        StudentFormView, TeacherChanges, TeacherDashboard, TeacherForm, TeacherFormView,
    },
    password::hash_password,
};
use axum::{
    Form, Json,
    extract::{FromRequest, Path, Query, Request, State},
    http::header,
    response::{IntoResponse, Redirect, Response},
};
use serde::{Deserialize, de::DeserializeOwned};

const TEACHER_DASHBOARD: &str = "/teacher/dashboard";

// --- Form Helpers ---

/// ValidatedForm
///
/// `Form` whose rejection (wrong content type, unparsable field) is a 400 `BadRequest` with
/// the usual JSON error body instead of axum's plain-text 422.
pub struct ValidatedForm<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedForm<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Form(value) = Form::<T>::from_request(req, state)
            .await
            .map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
        Ok(ValidatedForm(value))
    }
}

/// LoginQuery
///
/// Flags appended to `/login` by the login and logout flows (`?error`, `?logout`).
#[derive(Deserialize, utoipa::IntoParams)]
pub struct LoginQuery {
    pub error: Option<String>,
    pub logout: Option<String>,
}

fn required(field: &str, value: String) -> Result<String, AppError> {
    let value = value.trim().to_string();
    if value.is_empty() {
        return Err(AppError::BadRequest(format!("{field} is required")));
    }
    Ok(value)
}

/// A blank password field means "no new password".
fn supplied_password(password: Option<String>) -> Option<String> {
    password.filter(|p| !p.trim().is_empty())
}

fn parse_course_ids(raw: &str) -> Result<Vec<i64>, AppError> {
    raw.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(|id| {
            id.parse::<i64>()
                .map_err(|_| AppError::BadRequest(format!("invalid course id: {id}")))
        })
        .collect()
}

// --- Authentication Handlers ---

/// login_page
///
/// [Public Route] Renders the login view.
#[utoipa::path(
    get,
    path = "/login",
    params(LoginQuery),
    responses((status = 200, description = "Login view", body = LoginPage))
)]
pub async fn login_page(Query(query): Query<LoginQuery>) -> Json<LoginPage> {
    Json(LoginPage {
        error: query.error.is_some(),
        logged_out: query.logout.is_some(),
    })
}

/// login
///
/// [Public Route] Runs the authentication gate. On success the signed session cookie is set
/// and the browser continues to `/redirect`; on failure it returns to `/login?error`.
#[utoipa::path(
    post,
    path = "/login",
    request_body(content = LoginForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "To /redirect when signed in, otherwise to /login?error")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    ValidatedForm(form): ValidatedForm<LoginForm>,
) -> Result<Response, AppError> {
    let principal =
        auth::authenticate(state.repo.as_ref(), form.email.trim(), &form.password).await?;
    let token = auth::issue_session_token(&principal, &state.config)?;
    let cookie = auth::session_cookie(&token, &state.config)?;

    tracing::info!(role = %principal.role, "login succeeded");
    let mut response = Redirect::to("/redirect").into_response();
    response.headers_mut().insert(header::SET_COOKIE, cookie);
    Ok(response)
}

/// logout
///
/// [Public Route] Expires the session cookie and returns to the login page.
///
/// Sessions are stateless signed tokens, so nothing is revoked server-side: a token copied
/// before logout stays valid until its `exp` (`SESSION_TTL_SECS`, default one hour).
#[utoipa::path(
    get,
    path = "/logout",
    responses((status = 303, description = "Session cleared"))
)]
pub async fn logout() -> Response {
    let mut response = Redirect::to("/login?logout").into_response();
    response
        .headers_mut()
        .insert(header::SET_COOKIE, auth::clear_session_cookie());
    response
}

/// redirect_after_login
///
/// [Authenticated Route] Dispatches to the dashboard for the principal's role. A user
/// holds exactly one role; TEACHER goes to the teacher dashboard, anything else to the
/// student dashboard.
#[utoipa::path(
    get,
    path = "/redirect",
    responses((status = 303, description = "Role dashboard"))
)]
pub async fn redirect_after_login(principal: Principal) -> Redirect {
    Redirect::to(principal.role.dashboard_path())
}

// --- Student Handlers ---

/// student_dashboard
///
/// [Student Route] Read-only personal view. A principal with no matching student record
/// still gets the page, with `student: null`.
#[utoipa::path(
    get,
    path = "/student/dashboard",
    responses(
        (status = 200, description = "Student view", body = StudentDashboard),
        (status = 403, description = "Not a student")
    )
)]
pub async fn student_dashboard(
    principal: Principal,
    State(state): State<AppState>,
) -> Result<Json<StudentDashboard>, AppError> {
    principal.require(Role::Student)?;
    let student = state.repo.find_student_by_email(&principal.email).await?;

    let (department, courses) = match &student {
        Some(s) => {
            let department = match s.department_id {
                Some(id) => state.repo.get_department(id).await?,
                None => None,
            };
            let mut courses = Vec::with_capacity(s.course_ids.len());
            for id in &s.course_ids {
                // Enrolments cascade with their course, so a miss is only a concurrent delete.
                if let Some(course) = state.repo.get_course(*id).await? {
                    courses.push(course);
                }
            }
            (department, courses)
        }
        None => (None, Vec::new()),
    };

    Ok(Json(StudentDashboard {
        student,
        department,
        courses,
    }))
}

// --- Teacher Handlers ---

/// teacher_dashboard
///
/// [Teacher Route] The signed-in teacher (null-tolerant) plus every student, teacher,
/// department and course. No pagination.
#[utoipa::path(
    get,
    path = "/teacher/dashboard",
    responses(
        (status = 200, description = "Teacher view", body = TeacherDashboard),
        (status = 403, description = "Not a teacher")
    )
)]
pub async fn teacher_dashboard(
    principal: Principal,
    State(state): State<AppState>,
) -> Result<Json<TeacherDashboard>, AppError> {
    principal.require(Role::Teacher)?;
    let repo = &state.repo;
    Ok(Json(TeacherDashboard {
        teacher: repo.find_teacher_by_email(&principal.email).await?,
        students: repo.list_students().await?,
        teachers: repo.list_teachers().await?,
        departments: repo.list_departments().await?,
        courses: repo.list_courses().await?,
    }))
}

// ================== STUDENT CRUD ==================

#[utoipa::path(
    get,
    path = "/teacher/student/add",
    responses((status = 200, description = "Empty student form", body = StudentFormView))
)]
pub async fn add_student_form(
    principal: Principal,
    State(state): State<AppState>,
) -> Result<Json<StudentFormView>, AppError> {
    principal.require(Role::Teacher)?;
    Ok(Json(StudentFormView {
        student: None,
        departments: state.repo.list_departments().await?,
        courses: state.repo.list_courses().await?,
    }))
}

/// add_student
///
/// [Teacher Route] Creates a student. The role is always STUDENT and the submitted
/// password is hashed before it reaches the repository.
#[utoipa::path(
    post,
    path = "/teacher/student/add",
    request_body(content = StudentForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Created, back to the dashboard"),
        (status = 400, description = "Missing field or unknown reference"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn add_student(
    principal: Principal,
    State(state): State<AppState>,
    ValidatedForm(form): ValidatedForm<StudentForm>,
) -> Result<Redirect, AppError> {
    principal.require(Role::Teacher)?;
    let password = supplied_password(form.password)
        .ok_or_else(|| AppError::BadRequest("password is required".to_string()))?;

    let new = NewStudent {
        name: required("name", form.name)?,
        email: required("email", form.email)?,
        password_hash: hash_password(&password)?,
        department_id: form.department_id,
        course_ids: parse_course_ids(&form.course_ids)?,
    };
    let student = state.repo.create_student(new).await?;

    tracing::info!(student_id = student.id, actor = %principal.email, "student added");
    Ok(Redirect::to(TEACHER_DASHBOARD))
}

/// edit_student_form
///
/// [Teacher Route] The edit form for an existing student. The password hash is never part
/// of the view.
#[utoipa::path(
    get,
    path = "/teacher/student/edit/{id}",
    params(("id" = i64, Path, description = "Student ID")),
    responses(
        (status = 200, description = "Student form", body = StudentFormView),
        (status = 404, description = "Not Found")
    )
)]
pub async fn edit_student_form(
    principal: Principal,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<StudentFormView>, AppError> {
    principal.require(Role::Teacher)?;
    let student = state
        .repo
        .get_student(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("student {id}")))?;
    Ok(Json(StudentFormView {
        student: Some(student),
        departments: state.repo.list_departments().await?,
        courses: state.repo.list_courses().await?,
    }))
}

/// update_student
///
/// [Teacher Route] Overwrites the student by id. The role is reset to STUDENT; the stored
/// hash is replaced only when a new non-blank password is submitted.
#[utoipa::path(
    post,
    path = "/teacher/student/update/{id}",
    params(("id" = i64, Path, description = "Student ID")),
    request_body(content = StudentForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Updated, back to the dashboard"),
        (status = 404, description = "Not Found"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn update_student(
    principal: Principal,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ValidatedForm(form): ValidatedForm<StudentForm>,
) -> Result<Redirect, AppError> {
    principal.require(Role::Teacher)?;
    let password_hash = supplied_password(form.password)
        .map(|p| hash_password(&p))
        .transpose()?;

    let changes = StudentChanges {
        name: required("name", form.name)?,
        email: required("email", form.email)?,
        password_hash,
        department_id: form.department_id,
        course_ids: parse_course_ids(&form.course_ids)?,
    };
    state.repo.update_student(id, changes).await?;

    tracing::info!(student_id = id, actor = %principal.email, "student updated");
    Ok(Redirect::to(TEACHER_DASHBOARD))
}

/// delete_student
///
/// [Teacher Route] Hard delete by id. A missing id is a silent no-op.
#[utoipa::path(
    get,
    path = "/teacher/student/delete/{id}",
    params(("id" = i64, Path, description = "Student ID")),
    responses((status = 303, description = "Deleted (or already absent)"))
)]
pub async fn delete_student(
    principal: Principal,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Redirect, AppError> {
    principal.require(Role::Teacher)?;
    let removed = state.repo.delete_student(id).await?;
    tracing::info!(student_id = id, removed, actor = %principal.email, "student delete");
    Ok(Redirect::to(TEACHER_DASHBOARD))
}

// ================== TEACHER CRUD ==================

#[utoipa::path(
    get,
    path = "/teacher/teacher/add",
    responses((status = 200, description = "Empty teacher form", body = TeacherFormView))
)]
pub async fn add_teacher_form(
    principal: Principal,
    State(state): State<AppState>,
) -> Result<Json<TeacherFormView>, AppError> {
    principal.require(Role::Teacher)?;
    Ok(Json(TeacherFormView {
        teacher: None,
        departments: state.repo.list_departments().await?,
    }))
}

#[utoipa::path(
    post,
    path = "/teacher/teacher/add",
    request_body(content = TeacherForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Created, back to the dashboard"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn add_teacher(
    principal: Principal,
    State(state): State<AppState>,
    ValidatedForm(form): ValidatedForm<TeacherForm>,
) -> Result<Redirect, AppError> {
    principal.require(Role::Teacher)?;
    let password = supplied_password(form.password)
        .ok_or_else(|| AppError::BadRequest("password is required".to_string()))?;

    let new = NewTeacher {
        name: required("name", form.name)?,
        email: required("email", form.email)?,
        password_hash: hash_password(&password)?,
        department_id: form.department_id,
    };
    let teacher = state.repo.create_teacher(new).await?;

    tracing::info!(teacher_id = teacher.id, actor = %principal.email, "teacher added");
    Ok(Redirect::to(TEACHER_DASHBOARD))
}

#[utoipa::path(
    get,
    path = "/teacher/teacher/edit/{id}",
    params(("id" = i64, Path, description = "Teacher ID")),
    responses(
        (status = 200, description = "Teacher form", body = TeacherFormView),
        (status = 404, description = "Not Found")
    )
)]
pub async fn edit_teacher_form(
    principal: Principal,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<TeacherFormView>, AppError> {
    principal.require(Role::Teacher)?;
    let teacher = state
        .repo
        .get_teacher(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("teacher {id}")))?;
    Ok(Json(TeacherFormView {
        teacher: Some(teacher),
        departments: state.repo.list_departments().await?,
    }))
}

#[utoipa::path(
    post,
    path = "/teacher/teacher/update/{id}",
    params(("id" = i64, Path, description = "Teacher ID")),
    request_body(content = TeacherForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Updated, back to the dashboard"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_teacher(
    principal: Principal,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ValidatedForm(form): ValidatedForm<TeacherForm>,
) -> Result<Redirect, AppError> {
    principal.require(Role::Teacher)?;
    let password_hash = supplied_password(form.password)
        .map(|p| hash_password(&p))
        .transpose()?;

    let changes = TeacherChanges {
        name: required("name", form.name)?,
        email: required("email", form.email)?,
        password_hash,
        department_id: form.department_id,
    };
    state.repo.update_teacher(id, changes).await?;

    tracing::info!(teacher_id = id, actor = %principal.email, "teacher updated");
    Ok(Redirect::to(TEACHER_DASHBOARD))
}

#[utoipa::path(
    get,
    path = "/teacher/teacher/delete/{id}",
    params(("id" = i64, Path, description = "Teacher ID")),
    responses((status = 303, description = "Deleted (or already absent)"))
)]
pub async fn delete_teacher(
    principal: Principal,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Redirect, AppError> {
    principal.require(Role::Teacher)?;
    let removed = state.repo.delete_teacher(id).await?;
    tracing::info!(teacher_id = id, removed, actor = %principal.email, "teacher delete");
    Ok(Redirect::to(TEACHER_DASHBOARD))
}

// ================== DEPARTMENT CRUD ==================

#[utoipa::path(
    get,
    path = "/teacher/department/add",
    responses((status = 200, description = "Department form", body = DepartmentFormView))
)]
pub async fn add_department_form(
    principal: Principal,
    State(state): State<AppState>,
) -> Result<Json<DepartmentFormView>, AppError> {
    principal.require(Role::Teacher)?;
    Ok(Json(DepartmentFormView {
        departments: state.repo.list_departments().await?,
    }))
}

#[utoipa::path(
    post,
    path = "/teacher/department/add",
    request_body(content = DepartmentForm, content_type = "application/x-www-form-urlencoded"),
    responses((status = 303, description = "Created, back to the dashboard"))
)]
pub async fn add_department(
    principal: Principal,
    State(state): State<AppState>,
    ValidatedForm(form): ValidatedForm<DepartmentForm>,
) -> Result<Redirect, AppError> {
    principal.require(Role::Teacher)?;
    let department = state
        .repo
        .create_department(required("name", form.name)?)
        .await?;
    tracing::info!(department_id = department.id, actor = %principal.email, "department added");
    Ok(Redirect::to(TEACHER_DASHBOARD))
}

/// delete_department
///
/// [Teacher Route] Removes a department. Students, teachers and courses that referenced it
/// are kept with no department.
#[utoipa::path(
    get,
    path = "/teacher/department/delete/{id}",
    params(("id" = i64, Path, description = "Department ID")),
    responses((status = 303, description = "Deleted (or already absent)"))
)]
pub async fn delete_department(
    principal: Principal,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Redirect, AppError> {
    principal.require(Role::Teacher)?;
    let removed = state.repo.delete_department(id).await?;
    tracing::info!(department_id = id, removed, actor = %principal.email, "department delete");
    Ok(Redirect::to(TEACHER_DASHBOARD))
}

// ================== COURSE CRUD ==================

#[utoipa::path(
    get,
    path = "/teacher/course/add",
    responses((status = 200, description = "Course form", body = CourseFormView))
)]
pub async fn add_course_form(
    principal: Principal,
    State(state): State<AppState>,
) -> Result<Json<CourseFormView>, AppError> {
    principal.require(Role::Teacher)?;
    Ok(Json(CourseFormView {
        departments: state.repo.list_departments().await?,
    }))
}

#[utoipa::path(
    post,
    path = "/teacher/course/add",
    request_body(content = CourseForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Created, back to the dashboard"),
        (status = 400, description = "Missing title or unknown department")
    )
)]
pub async fn add_course(
    principal: Principal,
    State(state): State<AppState>,
    ValidatedForm(form): ValidatedForm<CourseForm>,
) -> Result<Redirect, AppError> {
    principal.require(Role::Teacher)?;
    let new = NewCourse {
        title: required("title", form.title)?,
        department_id: form.department_id,
    };
    let course = state.repo.create_course(new).await?;
    tracing::info!(course_id = course.id, actor = %principal.email, "course added");
    Ok(Redirect::to(TEACHER_DASHBOARD))
}

#[utoipa::path(
    get,
    path = "/teacher/course/delete/{id}",
    params(("id" = i64, Path, description = "Course ID")),
    responses((status = 303, description = "Deleted (or already absent)"))
)]
pub async fn delete_course(
    principal: Principal,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Redirect, AppError> {
    principal.require(Role::Teacher)?;
    let removed = state.repo.delete_course(id).await?;
    tracing::info!(course_id = id, removed, actor = %principal.email, "course delete");
    Ok(Redirect::to(TEACHER_DASHBOARD))
}
