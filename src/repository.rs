use crate::models::{
    Course, Department, NewCourse, NewStudent, NewTeacher, Role, Student, StudentChanges, Teacher,
    TeacherChanges,
};
use async_trait::async_trait;
use sqlx::{PgConnection, PgPool};
use std::sync::Arc;

/// RepositoryError
///
/// Failure modes shared by every `Repository` implementation. Handlers convert these into
/// `AppError` with `?`.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("{0} not found")]
    NotFound(String),
    /// The email already belongs to a different student or teacher.
    #[error("email already registered: {0}")]
    DuplicateEmail(String),
    /// A department or course id that does not exist.
    #[error("unknown {0}")]
    InvalidReference(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

pub type RepoResult<T> = Result<T, RepositoryError>;

/// Repository Trait
///
/// The directory contract: credential lookups plus CRUD over students, teachers,
/// departments and courses. Handlers only ever see `Arc<dyn Repository>`, so the Postgres
/// store and the in-memory store are interchangeable.
///
/// Invariants every implementation upholds:
/// - an email is unique across students *and* teachers (`DuplicateEmail` otherwise);
/// - the role column always matches the table, whatever the caller intended;
/// - deleting a missing id is not an error (`Ok(false)`);
/// - deleting a department nulls the references to it instead of cascading.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Credential Store ---
    async fn find_student_by_email(&self, email: &str) -> RepoResult<Option<Student>>;
    async fn find_teacher_by_email(&self, email: &str) -> RepoResult<Option<Teacher>>;

    // --- Students ---
    async fn list_students(&self) -> RepoResult<Vec<Student>>;
    async fn get_student(&self, id: i64) -> RepoResult<Option<Student>>;
    async fn create_student(&self, new: NewStudent) -> RepoResult<Student>;
    // Full overwrite by id; `NotFound` if the id does not exist.
    async fn update_student(&self, id: i64, changes: StudentChanges) -> RepoResult<Student>;
    async fn delete_student(&self, id: i64) -> RepoResult<bool>;

    // --- Teachers ---
    async fn list_teachers(&self) -> RepoResult<Vec<Teacher>>;
    async fn get_teacher(&self, id: i64) -> RepoResult<Option<Teacher>>;
    async fn create_teacher(&self, new: NewTeacher) -> RepoResult<Teacher>;
    async fn update_teacher(&self, id: i64, changes: TeacherChanges) -> RepoResult<Teacher>;
    async fn delete_teacher(&self, id: i64) -> RepoResult<bool>;

    // --- Departments ---
    async fn list_departments(&self) -> RepoResult<Vec<Department>>;
    async fn get_department(&self, id: i64) -> RepoResult<Option<Department>>;
    async fn create_department(&self, name: String) -> RepoResult<Department>;
    async fn delete_department(&self, id: i64) -> RepoResult<bool>;

    // --- Courses ---
    async fn list_courses(&self) -> RepoResult<Vec<Course>>;
    async fn get_course(&self, id: i64) -> RepoResult<Option<Course>>;
    async fn create_course(&self, new: NewCourse) -> RepoResult<Course>;
    async fn delete_course(&self, id: i64) -> RepoResult<bool>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// PostgresRepository
///
/// The `Repository` implementation backed by PostgreSQL (see `migrations/`).
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// Enrolments are folded into `course_ids`; students without any get an empty array.
const STUDENT_SELECT: &str = r#"
    SELECT s.id, s.name, s.email, s.password_hash, s.role, s.department_id,
           COALESCE(
               array_agg(sc.course_id ORDER BY sc.course_id) FILTER (WHERE sc.course_id IS NOT NULL),
               '{}'
           ) AS course_ids
    FROM students s
    LEFT JOIN student_courses sc ON sc.student_id = s.id
"#;

const TEACHER_SELECT: &str =
    "SELECT id, name, email, password_hash, role, department_id FROM teachers";

// Postgres SQLSTATE codes surfaced by constraint violations.
const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

/// map_write_error
///
/// Translates constraint violations raised by INSERT/UPDATE into domain errors. Anything
/// else stays a `Database` error.
fn map_write_error(err: sqlx::Error, email: &str) -> RepositoryError {
    let code = err
        .as_database_error()
        .and_then(|db| db.code())
        .map(|c| c.into_owned());
    match code.as_deref() {
        Some(UNIQUE_VIOLATION) => RepositoryError::DuplicateEmail(email.to_string()),
        Some(FOREIGN_KEY_VIOLATION) => {
            RepositoryError::InvalidReference("department or course".to_string())
        }
        _ => RepositoryError::Database(err),
    }
}

/// ensure_email_free
///
/// Enforces email uniqueness across both identity tables. The per-table UNIQUE constraints
/// cannot see each other, so this check runs inside the writing transaction.
/// `skip_student`/`skip_teacher` exclude the row being updated (0 excludes nothing).
async fn ensure_email_free(
    conn: &mut PgConnection,
    email: &str,
    skip_student: i64,
    skip_teacher: i64,
) -> RepoResult<()> {
    let taken: bool = sqlx::query_scalar(
        r#"SELECT EXISTS (SELECT 1 FROM students WHERE email = $1 AND id <> $2)
               OR EXISTS (SELECT 1 FROM teachers WHERE email = $1 AND id <> $3)"#,
    )
    .bind(email)
    .bind(skip_student)
    .bind(skip_teacher)
    .fetch_one(&mut *conn)
    .await?;

    if taken {
        return Err(RepositoryError::DuplicateEmail(email.to_string()));
    }
    Ok(())
}

/// replace_enrolments
///
/// Rewrites a student's course set. Duplicate ids collapse; unknown ids fail the foreign key.
async fn replace_enrolments(
    conn: &mut PgConnection,
    student_id: i64,
    course_ids: &[i64],
    email: &str,
) -> RepoResult<()> {
    sqlx::query("DELETE FROM student_courses WHERE student_id = $1")
        .bind(student_id)
        .execute(&mut *conn)
        .await?;

    if course_ids.is_empty() {
        return Ok(());
    }

    sqlx::query(
        r#"INSERT INTO student_courses (student_id, course_id)
           SELECT $1, UNNEST($2::BIGINT[])
           ON CONFLICT DO NOTHING"#,
    )
    .bind(student_id)
    .bind(course_ids)
    .execute(&mut *conn)
    .await
    .map_err(|e| map_write_error(e, email))?;
    Ok(())
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn find_student_by_email(&self, email: &str) -> RepoResult<Option<Student>> {
        let sql = format!("{STUDENT_SELECT} WHERE s.email = $1 GROUP BY s.id");
        Ok(sqlx::query_as::<_, Student>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_teacher_by_email(&self, email: &str) -> RepoResult<Option<Teacher>> {
        let sql = format!("{TEACHER_SELECT} WHERE email = $1");
        Ok(sqlx::query_as::<_, Teacher>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_students(&self) -> RepoResult<Vec<Student>> {
        let sql = format!("{STUDENT_SELECT} GROUP BY s.id ORDER BY s.id");
        Ok(sqlx::query_as::<_, Student>(&sql)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn get_student(&self, id: i64) -> RepoResult<Option<Student>> {
        let sql = format!("{STUDENT_SELECT} WHERE s.id = $1 GROUP BY s.id");
        Ok(sqlx::query_as::<_, Student>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// create_student
    ///
    /// Inserts the student row and its enrolments in one transaction. The role is always
    /// written as STUDENT.
    async fn create_student(&self, new: NewStudent) -> RepoResult<Student> {
        let mut tx = self.pool.begin().await?;
        ensure_email_free(&mut tx, &new.email, 0, 0).await?;

        let id: i64 = sqlx::query_scalar(
            r#"INSERT INTO students (name, email, password_hash, role, department_id)
               VALUES ($1, $2, $3, $4, $5)
               RETURNING id"#,
        )
        .bind(&new.name)
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(Role::Student)
        .bind(new.department_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_write_error(e, &new.email))?;

        replace_enrolments(&mut tx, id, &new.course_ids, &new.email).await?;
        tx.commit().await?;

        tracing::debug!(student_id = id, "student created");
        self.get_student(id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("student {id}")))
    }

    /// update_student
    ///
    /// Overwrites every mutable field by id. A missing id is `NotFound` before any email
    /// clash is considered. `COALESCE` keeps the stored hash when no new one is supplied.
    async fn update_student(&self, id: i64, changes: StudentChanges) -> RepoResult<Student> {
        let mut tx = self.pool.begin().await?;
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM students WHERE id = $1)")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;
        if !exists {
            return Err(RepositoryError::NotFound(format!("student {id}")));
        }
        ensure_email_free(&mut tx, &changes.email, id, 0).await?;

        let updated = sqlx::query(
            r#"UPDATE students
               SET name = $2, email = $3, password_hash = COALESCE($4, password_hash),
                   role = $5, department_id = $6
               WHERE id = $1"#,
        )
        .bind(id)
        .bind(&changes.name)
        .bind(&changes.email)
        .bind(changes.password_hash.as_deref())
        .bind(Role::Student)
        .bind(changes.department_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_write_error(e, &changes.email))?;

        if updated.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("student {id}")));
        }

        replace_enrolments(&mut tx, id, &changes.course_ids, &changes.email).await?;
        tx.commit().await?;

        self.get_student(id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("student {id}")))
    }

    async fn delete_student(&self, id: i64) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM students WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_teachers(&self) -> RepoResult<Vec<Teacher>> {
        let sql = format!("{TEACHER_SELECT} ORDER BY id");
        Ok(sqlx::query_as::<_, Teacher>(&sql)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn get_teacher(&self, id: i64) -> RepoResult<Option<Teacher>> {
        let sql = format!("{TEACHER_SELECT} WHERE id = $1");
        Ok(sqlx::query_as::<_, Teacher>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create_teacher(&self, new: NewTeacher) -> RepoResult<Teacher> {
        let mut tx = self.pool.begin().await?;
        ensure_email_free(&mut tx, &new.email, 0, 0).await?;

        let teacher = sqlx::query_as::<_, Teacher>(
            r#"INSERT INTO teachers (name, email, password_hash, role, department_id)
               VALUES ($1, $2, $3, $4, $5)
               RETURNING id, name, email, password_hash, role, department_id"#,
        )
        .bind(&new.name)
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(Role::Teacher)
        .bind(new.department_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_write_error(e, &new.email))?;

        tx.commit().await?;
        tracing::debug!(teacher_id = teacher.id, "teacher created");
        Ok(teacher)
    }

    async fn update_teacher(&self, id: i64, changes: TeacherChanges) -> RepoResult<Teacher> {
        let mut tx = self.pool.begin().await?;
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM teachers WHERE id = $1)")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;
        if !exists {
            return Err(RepositoryError::NotFound(format!("teacher {id}")));
        }
        ensure_email_free(&mut tx, &changes.email, 0, id).await?;

        let teacher = sqlx::query_as::<_, Teacher>(
            r#"UPDATE teachers
               SET name = $2, email = $3, password_hash = COALESCE($4, password_hash),
                   role = $5, department_id = $6
               WHERE id = $1
               RETURNING id, name, email, password_hash, role, department_id"#,
        )
        .bind(id)
        .bind(&changes.name)
        .bind(&changes.email)
        .bind(changes.password_hash.as_deref())
        .bind(Role::Teacher)
        .bind(changes.department_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_write_error(e, &changes.email))?
        .ok_or_else(|| RepositoryError::NotFound(format!("teacher {id}")))?;

        tx.commit().await?;
        Ok(teacher)
    }

    async fn delete_teacher(&self, id: i64) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM teachers WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_departments(&self) -> RepoResult<Vec<Department>> {
        Ok(
            sqlx::query_as::<_, Department>("SELECT id, name FROM departments ORDER BY id")
                .fetch_all(&self.pool)
                .await?,
        )
    }

    async fn get_department(&self, id: i64) -> RepoResult<Option<Department>> {
        Ok(
            sqlx::query_as::<_, Department>("SELECT id, name FROM departments WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn create_department(&self, name: String) -> RepoResult<Department> {
        Ok(sqlx::query_as::<_, Department>(
            "INSERT INTO departments (name) VALUES ($1) RETURNING id, name",
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await?)
    }

    /// delete_department
    ///
    /// `ON DELETE SET NULL` on every referencing column keeps students, teachers and
    /// courses alive with a null department.
    async fn delete_department(&self, id: i64) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM departments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_courses(&self) -> RepoResult<Vec<Course>> {
        Ok(sqlx::query_as::<_, Course>(
            "SELECT id, title, department_id FROM courses ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?)
    }

    async fn get_course(&self, id: i64) -> RepoResult<Option<Course>> {
        Ok(sqlx::query_as::<_, Course>(
            "SELECT id, title, department_id FROM courses WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn create_course(&self, new: NewCourse) -> RepoResult<Course> {
        sqlx::query_as::<_, Course>(
            r#"INSERT INTO courses (title, department_id) VALUES ($1, $2)
               RETURNING id, title, department_id"#,
        )
        .bind(&new.title)
        .bind(new.department_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_write_error(e, ""))
    }

    async fn delete_course(&self, id: i64) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM courses WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
