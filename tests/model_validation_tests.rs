use academic_portal::models::{
    CourseForm, LoginForm, Role, Student, StudentDashboard, StudentForm, Teacher,
};
use axum::{
    Form,
    body::Body,
    extract::FromRequest,
    http::{Request, header},
};

// --- Test Utilities ---

async fn parse_form<T>(body: &'static str) -> Option<T>
where
    T: serde::de::DeserializeOwned + Send,
{
    let request = Request::builder()
        .method("POST")
        .uri("/")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body))
        .unwrap();
    Form::<T>::from_request(request, &()).await.ok().map(|Form(v)| v)
}

fn sample_student() -> Student {
    Student {
        id: 7,
        name: "Ada".to_string(),
        email: "ada@example.com".to_string(),
        password_hash: "$argon2id$v=19$m=19456,t=2,p=1$salt$hash".to_string(),
        role: Role::Student,
        department_id: None,
        course_ids: vec![1, 2],
    }
}

// --- Serialization ---

#[test]
fn role_serializes_uppercase() {
    assert_eq!(serde_json::to_string(&Role::Student).unwrap(), "\"STUDENT\"");
    assert_eq!(serde_json::to_string(&Role::Teacher).unwrap(), "\"TEACHER\"");
    assert_eq!(
        serde_json::from_str::<Role>("\"TEACHER\"").unwrap(),
        Role::Teacher
    );
    assert_eq!(Role::Student.to_string(), "STUDENT");
}

#[test]
fn password_hash_never_leaves_the_server() {
    let json = serde_json::to_value(sample_student()).unwrap();
    assert!(json.get("password_hash").is_none());
    assert_eq!(json["role"], "STUDENT");
    assert_eq!(json["course_ids"], serde_json::json!([1, 2]));
    assert!(json["department_id"].is_null());

    let teacher = Teacher {
        id: 1,
        name: "Grace".to_string(),
        email: "grace@example.com".to_string(),
        password_hash: "secret-hash".to_string(),
        role: Role::Teacher,
        department_id: Some(3),
    };
    let json = serde_json::to_string(&teacher).unwrap();
    assert!(!json.contains("secret-hash"));
}

#[test]
fn dashboard_with_missing_student_serializes_null() {
    let view = StudentDashboard {
        student: None,
        department: None,
        courses: vec![],
    };
    let json = serde_json::to_value(view).unwrap();
    assert!(json["student"].is_null());
    assert_eq!(json["courses"], serde_json::json!([]));
}

#[test]
fn role_paths_match_route_prefixes() {
    assert_eq!(Role::Student.home_prefix(), "/student");
    assert_eq!(Role::Teacher.dashboard_path(), "/teacher/dashboard");
    assert!(Role::Student
        .dashboard_path()
        .starts_with(Role::Student.home_prefix()));
}

// --- Form Parsing ---

#[tokio::test]
async fn login_form_accepts_username_alias() {
    let form: LoginForm = parse_form("username=ada%40example.com&password=pw")
        .await
        .unwrap();
    assert_eq!(form.email, "ada@example.com");

    let form: LoginForm = parse_form("email=ada%40example.com&password=pw")
        .await
        .unwrap();
    assert_eq!(form.password, "pw");
}

#[tokio::test]
async fn empty_department_means_none() {
    let form: StudentForm =
        parse_form("name=Ada&email=ada%40example.com&password=&department_id=&course_ids=1%2C2")
            .await
            .unwrap();
    assert_eq!(form.department_id, None);
    assert_eq!(form.password.as_deref(), Some(""));
    assert_eq!(form.course_ids, "1,2");

    let form: CourseForm = parse_form("title=Logic&department_id=4").await.unwrap();
    assert_eq!(form.department_id, Some(4));
}

#[tokio::test]
async fn omitted_optional_fields_default() {
    let form: StudentForm = parse_form("name=Ada&email=ada%40example.com").await.unwrap();
    assert_eq!(form.password, None);
    assert_eq!(form.department_id, None);
    assert!(form.course_ids.is_empty());
}

#[tokio::test]
async fn omitted_required_fields_arrive_empty() {
    // Left for the handlers to reject with a 400.
    let form: StudentForm = parse_form("password=pw").await.unwrap();
    assert!(form.name.is_empty());
    assert!(form.email.is_empty());

    let form: LoginForm = parse_form("email=ada%40example.com").await.unwrap();
    assert!(form.password.is_empty());
}

#[tokio::test]
async fn non_numeric_department_is_rejected() {
    let form: Option<CourseForm> = parse_form("title=Logic&department_id=abc").await;
    assert!(form.is_none());
}
