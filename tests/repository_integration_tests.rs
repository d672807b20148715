use academic_portal::{
    models::{NewCourse, NewStudent, NewTeacher, Role, StudentChanges, TeacherChanges},
    repository::{PostgresRepository, Repository, RepositoryError},
    InMemoryRepository,
};
use sqlx::PgPool;
use uuid::Uuid;

// --- Test Context and Setup ---

/// Holds the database pool for the Postgres-backed runs.
struct DbTestContext {
    pool: PgPool,
}

impl DbTestContext {
    async fn setup() -> Self {
        dotenv::dotenv().ok();

        let db_url = std::env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set to run integration tests");

        let pool = PgPool::connect(&db_url)
            .await
            .expect("Failed to connect to database for integration tests.");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("Failed to run database migrations.");

        DbTestContext { pool }
    }

    fn repository(&self) -> PostgresRepository {
        PostgresRepository::new(self.pool.clone())
    }
}

// --- Test Data Helpers ---

// The Postgres database outlives a test run, so every address is unique.
fn unique_email(label: &str) -> String {
    format!("{label}-{}@test.com", Uuid::new_v4())
}

fn new_student(email: &str, department_id: Option<i64>, course_ids: Vec<i64>) -> NewStudent {
    NewStudent {
        name: "Test Student".to_string(),
        email: email.to_string(),
        password_hash: "$argon2id$test-hash".to_string(),
        department_id,
        course_ids,
    }
}

fn new_teacher(email: &str, department_id: Option<i64>) -> NewTeacher {
    NewTeacher {
        name: "Test Teacher".to_string(),
        email: email.to_string(),
        password_hash: "$argon2id$test-hash".to_string(),
        department_id,
    }
}

// --- Shared Contract ---
// Both backends must behave identically; each scenario runs against either.

async fn student_crud(repo: &dyn Repository) {
    let dept = repo.create_department("Physics".to_string()).await.unwrap();
    let c1 = repo
        .create_course(NewCourse {
            title: "Mechanics".to_string(),
            department_id: Some(dept.id),
        })
        .await
        .unwrap();
    let c2 = repo
        .create_course(NewCourse {
            title: "Optics".to_string(),
            department_id: None,
        })
        .await
        .unwrap();

    let email = unique_email("student");
    let created = repo
        .create_student(new_student(&email, Some(dept.id), vec![c2.id, c1.id, c2.id]))
        .await
        .unwrap();
    assert_eq!(created.role, Role::Student);
    assert_eq!(created.course_ids, vec![c1.id, c2.id]);

    let found = repo.find_student_by_email(&email).await.unwrap().unwrap();
    assert_eq!(found, created);

    let new_email = unique_email("renamed");
    let updated = repo
        .update_student(
            created.id,
            StudentChanges {
                name: "Renamed".to_string(),
                email: new_email.clone(),
                password_hash: None,
                department_id: None,
                course_ids: vec![c1.id],
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.name, "Renamed");
    assert_eq!(updated.email, new_email);
    assert_eq!(updated.password_hash, created.password_hash);
    assert_eq!(updated.department_id, None);
    assert_eq!(updated.course_ids, vec![c1.id]);

    assert!(repo.delete_student(created.id).await.unwrap());
    assert!(!repo.delete_student(created.id).await.unwrap());
    assert!(repo.get_student(created.id).await.unwrap().is_none());
}

async fn email_unique_across_tables(repo: &dyn Repository) {
    let shared = unique_email("shared");
    let teacher = repo.create_teacher(new_teacher(&shared, None)).await.unwrap();

    let clash = repo.create_student(new_student(&shared, None, vec![])).await;
    assert!(matches!(clash, Err(RepositoryError::DuplicateEmail(_))));

    let again = repo.create_teacher(new_teacher(&shared, None)).await;
    assert!(matches!(again, Err(RepositoryError::DuplicateEmail(_))));

    // Renaming a student onto the teacher's address is rejected as well.
    let student = repo
        .create_student(new_student(&unique_email("other"), None, vec![]))
        .await
        .unwrap();
    let moved = repo
        .update_student(
            student.id,
            StudentChanges {
                name: student.name.clone(),
                email: shared.clone(),
                password_hash: None,
                department_id: None,
                course_ids: vec![],
            },
        )
        .await;
    assert!(matches!(moved, Err(RepositoryError::DuplicateEmail(_))));

    // Keeping one's own address is not a clash.
    let kept = repo
        .update_teacher(
            teacher.id,
            TeacherChanges {
                name: "Same Email".to_string(),
                email: shared,
                password_hash: Some("$argon2id$new-hash".to_string()),
                department_id: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(kept.password_hash, "$argon2id$new-hash");
    assert_eq!(kept.role, Role::Teacher);
}

async fn unknown_references_are_rejected(repo: &dyn Repository) {
    let bad_dept = repo
        .create_student(new_student(&unique_email("nodept"), Some(i64::MAX), vec![]))
        .await;
    assert!(matches!(bad_dept, Err(RepositoryError::InvalidReference(_))));

    let bad_course = repo
        .create_student(new_student(&unique_email("nocourse"), None, vec![i64::MAX]))
        .await;
    assert!(matches!(bad_course, Err(RepositoryError::InvalidReference(_))));

    let missing = repo
        .update_teacher(
            i64::MAX,
            TeacherChanges {
                name: "Ghost".to_string(),
                email: unique_email("ghost"),
                password_hash: None,
                department_id: None,
            },
        )
        .await;
    assert!(matches!(missing, Err(RepositoryError::NotFound(_))));
}

async fn missing_row_wins_over_email_clash(repo: &dyn Repository) {
    let taken = unique_email("taken");
    repo.create_teacher(new_teacher(&taken, None)).await.unwrap();

    let student = repo
        .update_student(
            i64::MAX,
            StudentChanges {
                name: "Ghost".to_string(),
                email: taken.clone(),
                password_hash: None,
                department_id: None,
                course_ids: vec![],
            },
        )
        .await;
    assert!(matches!(student, Err(RepositoryError::NotFound(_))));

    let teacher = repo
        .update_teacher(
            i64::MAX,
            TeacherChanges {
                name: "Ghost".to_string(),
                email: taken,
                password_hash: None,
                department_id: None,
            },
        )
        .await;
    assert!(matches!(teacher, Err(RepositoryError::NotFound(_))));
}

async fn deletes_do_not_cascade_to_people(repo: &dyn Repository) {
    let dept = repo.create_department("History".to_string()).await.unwrap();
    let course = repo
        .create_course(NewCourse {
            title: "Antiquity".to_string(),
            department_id: Some(dept.id),
        })
        .await
        .unwrap();
    let student = repo
        .create_student(new_student(&unique_email("hist"), Some(dept.id), vec![course.id]))
        .await
        .unwrap();
    let teacher = repo
        .create_teacher(new_teacher(&unique_email("hist"), Some(dept.id)))
        .await
        .unwrap();

    assert!(repo.delete_department(dept.id).await.unwrap());
    assert!(repo.get_department(dept.id).await.unwrap().is_none());

    let student = repo.get_student(student.id).await.unwrap().unwrap();
    let teacher = repo.get_teacher(teacher.id).await.unwrap().unwrap();
    let course_after = repo.get_course(course.id).await.unwrap().unwrap();
    assert_eq!(student.department_id, None);
    assert_eq!(teacher.department_id, None);
    assert_eq!(course_after.department_id, None);
    assert_eq!(student.course_ids, vec![course.id]);

    assert!(repo.delete_course(course.id).await.unwrap());
    let student = repo.get_student(student.id).await.unwrap().unwrap();
    assert!(student.course_ids.is_empty());
}

// --- In-Memory Backend ---

#[tokio::test]
async fn memory_student_crud() {
    student_crud(&InMemoryRepository::new()).await;
}

#[tokio::test]
async fn memory_email_unique_across_tables() {
    email_unique_across_tables(&InMemoryRepository::new()).await;
}

#[tokio::test]
async fn memory_unknown_references_are_rejected() {
    unknown_references_are_rejected(&InMemoryRepository::new()).await;
}

#[tokio::test]
async fn memory_missing_row_wins_over_email_clash() {
    missing_row_wins_over_email_clash(&InMemoryRepository::new()).await;
}

#[tokio::test]
async fn memory_deletes_do_not_cascade_to_people() {
    deletes_do_not_cascade_to_people(&InMemoryRepository::new()).await;
}

#[tokio::test]
async fn memory_ids_are_sequential_per_table() {
    let repo = InMemoryRepository::new();
    let d1 = repo.create_department("A".to_string()).await.unwrap();
    let d2 = repo.create_department("B".to_string()).await.unwrap();
    let t1 = repo
        .create_teacher(new_teacher("t@test.com", None))
        .await
        .unwrap();
    assert_eq!((d1.id, d2.id, t1.id), (1, 2, 1));
}

// --- Postgres Backend (needs DATABASE_URL) ---

#[tokio::test]
#[ignore = "requires a Postgres database (DATABASE_URL)"]
async fn postgres_student_crud() {
    let ctx = DbTestContext::setup().await;
    student_crud(&ctx.repository()).await;
}

#[tokio::test]
#[ignore = "requires a Postgres database (DATABASE_URL)"]
async fn postgres_email_unique_across_tables() {
    let ctx = DbTestContext::setup().await;
    email_unique_across_tables(&ctx.repository()).await;
}

#[tokio::test]
#[ignore = "requires a Postgres database (DATABASE_URL)"]
async fn postgres_unknown_references_are_rejected() {
    let ctx = DbTestContext::setup().await;
    unknown_references_are_rejected(&ctx.repository()).await;
}

#[tokio::test]
#[ignore = "requires a Postgres database (DATABASE_URL)"]
async fn postgres_deletes_do_not_cascade_to_people() {
    let ctx = DbTestContext::setup().await;
    deletes_do_not_cascade_to_people(&ctx.repository()).await;
}

#[tokio::test]
#[ignore = "requires a Postgres database (DATABASE_URL)"]
async fn postgres_missing_row_wins_over_email_clash() {
    let ctx = DbTestContext::setup().await;
    missing_row_wins_over_email_clash(&ctx.repository()).await;
}
