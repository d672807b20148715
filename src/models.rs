use serde::{Deserialize, Deserializer, Serialize, de};
use sqlx::FromRow;
use std::{fmt::Display, str::FromStr};
use ts_rs::TS;
use utoipa::ToSchema;

// --- Core Directory Schemas (Mapped to Database) ---

/// Role
///
/// The RBAC discriminant for an account. Stored as the Postgres enum `user_role` and
/// serialized as `"STUDENT"` / `"TEACHER"`. Handlers never take it from client input.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema, sqlx::Type,
)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(type_name = "user_role", rename_all = "UPPERCASE")]
#[ts(export)]
pub enum Role {
    Student,
    Teacher,
}

impl Role {
    /// The route prefix owned by this role.
    pub fn home_prefix(self) -> &'static str {
        match self {
            Role::Student => "/student",
            Role::Teacher => "/teacher",
        }
    }

    pub fn dashboard_path(self) -> &'static str {
        match self {
            Role::Student => "/student/dashboard",
            Role::Teacher => "/teacher/dashboard",
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Role::Student => "STUDENT",
            Role::Teacher => "TEACHER",
        })
    }
}

/// Department
///
/// Owner of zero or many students, teachers and courses. Deleting one never cascades;
/// referencing rows keep a null `department_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct Department {
    pub id: i64,
    pub name: String,
}

/// Course
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct Course {
    pub id: i64,
    pub title: String,
    pub department_id: Option<i64>,
}

/// Student
///
/// A login-capable account with the STUDENT role and a set of course enrolments.
/// The password hash is loaded for the authentication gate but never serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct Student {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(skip)]
    pub password_hash: String,
    pub role: Role,
    pub department_id: Option<i64>,
    // Aggregated from `student_courses`; order carries no meaning.
    pub course_ids: Vec<i64>,
}

/// Teacher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct Teacher {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(skip)]
    pub password_hash: String,
    pub role: Role,
    pub department_id: Option<i64>,
}

/// Account
///
/// The tagged union resolved by the authentication gate. Both variants share the
/// credential shape; the variant itself decides the role.
#[derive(Debug, Clone)]
pub enum Account {
    Student(Student),
    Teacher(Teacher),
}

impl Account {
    pub fn role(&self) -> Role {
        match self {
            Account::Student(_) => Role::Student,
            Account::Teacher(_) => Role::Teacher,
        }
    }

    pub fn email(&self) -> &str {
        match self {
            Account::Student(s) => &s.email,
            Account::Teacher(t) => &t.email,
        }
    }

    pub fn password_hash(&self) -> &str {
        match self {
            Account::Student(s) => &s.password_hash,
            Account::Teacher(t) => &t.password_hash,
        }
    }
}

// --- Repository Inputs ---
// No role field: the repository writes the role matching the table.

#[derive(Debug, Clone)]
pub struct NewStudent {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub department_id: Option<i64>,
    pub course_ids: Vec<i64>,
}

/// StudentChanges
///
/// Full overwrite of a student's mutable fields. `password_hash: None` keeps the stored hash.
#[derive(Debug, Clone)]
pub struct StudentChanges {
    pub name: String,
    pub email: String,
    pub password_hash: Option<String>,
    pub department_id: Option<i64>,
    pub course_ids: Vec<i64>,
}

#[derive(Debug, Clone)]
pub struct NewTeacher {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub department_id: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct TeacherChanges {
    pub name: String,
    pub email: String,
    pub password_hash: Option<String>,
    pub department_id: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct NewCourse {
    pub title: String,
    pub department_id: Option<i64>,
}

// --- Form Payloads (Input Schemas) ---

/// LoginForm
///
/// `application/x-www-form-urlencoded` body of `POST /login`. Accepts `username` as an
/// alias so conventional login forms work unchanged. Missing fields arrive empty and fail
/// the gate like any other wrong credential.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct LoginForm {
    #[serde(default, alias = "username")]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// StudentForm
///
/// Body of the student add/update endpoints. `course_ids` is a comma-separated id list
/// (`"1,3,4"`); an empty `department_id` means "no department". A blank `password` on
/// update keeps the existing hash.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct StudentForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub department_id: Option<i64>,
    #[serde(default)]
    pub course_ids: String,
}

/// TeacherForm
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct TeacherForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub department_id: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct DepartmentForm {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct CourseForm {
    #[serde(default)]
    pub title: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub department_id: Option<i64>,
}

/// empty_string_as_none
///
/// HTML forms submit an unselected `<select>` as `field=`; treat that as `None` instead of
/// failing the integer parse.
fn empty_string_as_none<'de, D, T>(de: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    let opt = Option::<String>::deserialize(de)?;
    match opt.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s.parse::<T>().map(Some).map_err(de::Error::custom),
    }
}

// --- View Models (Output) ---

/// LoginPage
///
/// The login view. `error` is set after a failed attempt, `logged_out` after logout.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct LoginPage {
    pub error: bool,
    pub logged_out: bool,
}

/// StudentDashboard
///
/// Read-only personal view. `student` is `null` when the session email has no matching
/// record; the page still renders.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct StudentDashboard {
    pub student: Option<Student>,
    pub department: Option<Department>,
    pub courses: Vec<Course>,
}

/// TeacherDashboard
///
/// Management view: the signed-in teacher (null-tolerant) plus every directory collection.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct TeacherDashboard {
    pub teacher: Option<Teacher>,
    pub students: Vec<Student>,
    pub teachers: Vec<Teacher>,
    pub departments: Vec<Department>,
    pub courses: Vec<Course>,
}

/// StudentFormView
///
/// Backs both the add form (`student: null`) and the edit form.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct StudentFormView {
    pub student: Option<Student>,
    pub departments: Vec<Department>,
    pub courses: Vec<Course>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct TeacherFormView {
    pub teacher: Option<Teacher>,
    pub departments: Vec<Department>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct DepartmentFormView {
    pub departments: Vec<Department>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CourseFormView {
    pub departments: Vec<Department>,
}
