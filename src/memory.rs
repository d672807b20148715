use crate::{
    models::{
        Course, Department, NewCourse, NewStudent, NewTeacher, Role, Student, StudentChanges,
        Teacher, TeacherChanges,
    },
    repository::{RepoResult, Repository, RepositoryError},
};
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// InMemoryRepository
///
/// A `Repository` held entirely in process memory. It mirrors the Postgres schema's
/// constraints (cross-table email uniqueness, foreign keys, `ON DELETE SET NULL`) so
/// handler tests and database-less local runs behave like production.
#[derive(Default)]
pub struct InMemoryRepository {
    tables: RwLock<Tables>,
}

#[derive(Default)]
struct Tables {
    students: BTreeMap<i64, Student>,
    teachers: BTreeMap<i64, Teacher>,
    departments: BTreeMap<i64, Department>,
    courses: BTreeMap<i64, Course>,
    sequences: Sequences,
}

// One counter per table, like BIGSERIAL.
#[derive(Default)]
struct Sequences {
    student: i64,
    teacher: i64,
    department: i64,
    course: i64,
}

fn next(seq: &mut i64) -> i64 {
    *seq += 1;
    *seq
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Tables {
    fn email_taken(&self, email: &str, skip_student: i64, skip_teacher: i64) -> bool {
        self.students
            .values()
            .any(|s| s.email == email && s.id != skip_student)
            || self
                .teachers
                .values()
                .any(|t| t.email == email && t.id != skip_teacher)
    }

    fn check_department(&self, department_id: Option<i64>) -> RepoResult<()> {
        match department_id {
            Some(id) if !self.departments.contains_key(&id) => Err(
                RepositoryError::InvalidReference(format!("department {id}")),
            ),
            _ => Ok(()),
        }
    }

    /// Validates course ids and normalises them to a sorted, duplicate-free set.
    fn check_courses(&self, course_ids: &[i64]) -> RepoResult<Vec<i64>> {
        if let Some(missing) = course_ids.iter().find(|id| !self.courses.contains_key(*id)) {
            return Err(RepositoryError::InvalidReference(format!("course {missing}")));
        }
        let mut ids = course_ids.to_vec();
        ids.sort_unstable();
        ids.dedup();
        Ok(ids)
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn find_student_by_email(&self, email: &str) -> RepoResult<Option<Student>> {
        let tables = self.tables.read().await;
        Ok(tables.students.values().find(|s| s.email == email).cloned())
    }

    async fn find_teacher_by_email(&self, email: &str) -> RepoResult<Option<Teacher>> {
        let tables = self.tables.read().await;
        Ok(tables.teachers.values().find(|t| t.email == email).cloned())
    }

    async fn list_students(&self) -> RepoResult<Vec<Student>> {
        Ok(self.tables.read().await.students.values().cloned().collect())
    }

    async fn get_student(&self, id: i64) -> RepoResult<Option<Student>> {
        Ok(self.tables.read().await.students.get(&id).cloned())
    }

    async fn create_student(&self, new: NewStudent) -> RepoResult<Student> {
        let mut tables = self.tables.write().await;
        if tables.email_taken(&new.email, 0, 0) {
            return Err(RepositoryError::DuplicateEmail(new.email));
        }
        tables.check_department(new.department_id)?;
        let course_ids = tables.check_courses(&new.course_ids)?;

        let id = next(&mut tables.sequences.student);
        let student = Student {
            id,
            name: new.name,
            email: new.email,
            password_hash: new.password_hash,
            role: Role::Student,
            department_id: new.department_id,
            course_ids,
        };
        tables.students.insert(id, student.clone());
        Ok(student)
    }

    async fn update_student(&self, id: i64, changes: StudentChanges) -> RepoResult<Student> {
        let mut tables = self.tables.write().await;
        if !tables.students.contains_key(&id) {
            return Err(RepositoryError::NotFound(format!("student {id}")));
        }
        if tables.email_taken(&changes.email, id, 0) {
            return Err(RepositoryError::DuplicateEmail(changes.email));
        }
        tables.check_department(changes.department_id)?;
        let course_ids = tables.check_courses(&changes.course_ids)?;

        let student = tables
            .students
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("student {id}")))?;
        student.name = changes.name;
        student.email = changes.email;
        if let Some(hash) = changes.password_hash {
            student.password_hash = hash;
        }
        student.role = Role::Student;
        student.department_id = changes.department_id;
        student.course_ids = course_ids;
        Ok(student.clone())
    }

    async fn delete_student(&self, id: i64) -> RepoResult<bool> {
        Ok(self.tables.write().await.students.remove(&id).is_some())
    }

    async fn list_teachers(&self) -> RepoResult<Vec<Teacher>> {
        Ok(self.tables.read().await.teachers.values().cloned().collect())
    }

    async fn get_teacher(&self, id: i64) -> RepoResult<Option<Teacher>> {
        Ok(self.tables.read().await.teachers.get(&id).cloned())
    }

    async fn create_teacher(&self, new: NewTeacher) -> RepoResult<Teacher> {
        let mut tables = self.tables.write().await;
        if tables.email_taken(&new.email, 0, 0) {
            return Err(RepositoryError::DuplicateEmail(new.email));
        }
        tables.check_department(new.department_id)?;

        let id = next(&mut tables.sequences.teacher);
        let teacher = Teacher {
            id,
            name: new.name,
            email: new.email,
            password_hash: new.password_hash,
            role: Role::Teacher,
            department_id: new.department_id,
        };
        tables.teachers.insert(id, teacher.clone());
        Ok(teacher)
    }

    async fn update_teacher(&self, id: i64, changes: TeacherChanges) -> RepoResult<Teacher> {
        let mut tables = self.tables.write().await;
        if !tables.teachers.contains_key(&id) {
            return Err(RepositoryError::NotFound(format!("teacher {id}")));
        }
        if tables.email_taken(&changes.email, 0, id) {
            return Err(RepositoryError::DuplicateEmail(changes.email));
        }
        tables.check_department(changes.department_id)?;

        let teacher = tables
            .teachers
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("teacher {id}")))?;
        teacher.name = changes.name;
        teacher.email = changes.email;
        if let Some(hash) = changes.password_hash {
            teacher.password_hash = hash;
        }
        teacher.role = Role::Teacher;
        teacher.department_id = changes.department_id;
        Ok(teacher.clone())
    }

    async fn delete_teacher(&self, id: i64) -> RepoResult<bool> {
        Ok(self.tables.write().await.teachers.remove(&id).is_some())
    }

    async fn list_departments(&self) -> RepoResult<Vec<Department>> {
        Ok(self.tables.read().await.departments.values().cloned().collect())
    }

    async fn get_department(&self, id: i64) -> RepoResult<Option<Department>> {
        Ok(self.tables.read().await.departments.get(&id).cloned())
    }

    async fn create_department(&self, name: String) -> RepoResult<Department> {
        let mut tables = self.tables.write().await;
        let id = next(&mut tables.sequences.department);
        let department = Department { id, name };
        tables.departments.insert(id, department.clone());
        Ok(department)
    }

    async fn delete_department(&self, id: i64) -> RepoResult<bool> {
        let mut tables = self.tables.write().await;
        if tables.departments.remove(&id).is_none() {
            return Ok(false);
        }
        let orphaned = Some(id);
        for s in tables.students.values_mut().filter(|s| s.department_id == orphaned) {
            s.department_id = None;
        }
        for t in tables.teachers.values_mut().filter(|t| t.department_id == orphaned) {
            t.department_id = None;
        }
        for c in tables.courses.values_mut().filter(|c| c.department_id == orphaned) {
            c.department_id = None;
        }
        Ok(true)
    }

    async fn list_courses(&self) -> RepoResult<Vec<Course>> {
        Ok(self.tables.read().await.courses.values().cloned().collect())
    }

    async fn get_course(&self, id: i64) -> RepoResult<Option<Course>> {
        Ok(self.tables.read().await.courses.get(&id).cloned())
    }

    async fn create_course(&self, new: NewCourse) -> RepoResult<Course> {
        let mut tables = self.tables.write().await;
        tables.check_department(new.department_id)?;
        let id = next(&mut tables.sequences.course);
        let course = Course {
            id,
            title: new.title,
            department_id: new.department_id,
        };
        tables.courses.insert(id, course.clone());
        Ok(course)
    }

    async fn delete_course(&self, id: i64) -> RepoResult<bool> {
        let mut tables = self.tables.write().await;
        if tables.courses.remove(&id).is_none() {
            return Ok(false);
        }
        // Enrolments go with the course, as with the join table's ON DELETE CASCADE.
        for s in tables.students.values_mut() {
            s.course_ids.retain(|c| *c != id);
        }
        Ok(true)
    }
}
