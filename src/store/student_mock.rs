#![allow(clippy::unwrap_used)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::StudentRepository;
use crate::AuthError;
use crate::api::{GpaEntry, NewStudent, Student, StudentUpdate};

#[derive(Clone, Default)]
pub struct MockStudentRepository {
    pub students: Arc<Mutex<Vec<Student>>>,
    pub gpa: Arc<Mutex<Vec<GpaEntry>>>,
}

impl MockStudentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_student(self, student: Student) -> Self {
        self.students.lock().unwrap().push(student);
        self
    }

    /// Appends `entry` to the history of `entry.student_id`.
    pub fn with_gpa(self, entry: GpaEntry) -> Self {
        self.gpa.lock().unwrap().push(entry);
        self
    }
}

#[async_trait]
impl StudentRepository for MockStudentRepository {
    async fn list_students(&self, email: Option<&str>) -> Result<Vec<Student>, AuthError> {
        let students = self.students.lock().unwrap();
        Ok(match email {
            Some(email) => students
                .iter()
                .filter(|s| s.email.eq_ignore_ascii_case(email))
                .cloned()
                .collect(),
            None => students.clone(),
        })
    }

    async fn find_student(&self, student_id: &str) -> Result<Option<Student>, AuthError> {
        let students = self.students.lock().unwrap();
        Ok(students.iter().find(|s| s.student_id == student_id).cloned())
    }

    async fn create_student(&self, student: NewStudent) -> Result<Student, AuthError> {
        let mut students = self.students.lock().unwrap();
        if students.iter().any(|s| s.student_id == student.student_id) {
            return Err(AuthError::Validation(format!(
                "student {} already exists",
                student.student_id
            )));
        }

        let student = Student::from(student);
        students.push(student.clone());
        Ok(student)
    }

    async fn update_student(
        &self,
        student_id: &str,
        update: &StudentUpdate,
    ) -> Result<Student, AuthError> {
        let mut students = self.students.lock().unwrap();
        let student = students
            .iter_mut()
            .find(|s| s.student_id == student_id)
            .ok_or(AuthError::NotFound)?;
        student.apply(update);
        Ok(student.clone())
    }

    async fn delete_student(&self, student_id: &str) -> Result<(), AuthError> {
        let mut students = self.students.lock().unwrap();
        let before = students.len();
        students.retain(|s| s.student_id != student_id);
        if students.len() == before {
            return Err(AuthError::NotFound);
        }

        self.gpa
            .lock()
            .unwrap()
            .retain(|g| g.student_id.as_deref() != Some(student_id));
        Ok(())
    }

    async fn gpa_history(&self, student_id: &str) -> Result<Vec<GpaEntry>, AuthError> {
        let gpa = self.gpa.lock().unwrap();
        Ok(gpa
            .iter()
            .filter(|g| g.student_id.as_deref() == Some(student_id))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_student(id: &str, email: &str) -> NewStudent {
        NewStudent {
            student_id: id.to_owned(),
            first_name: "Ada".to_owned(),
            last_name: "Lovelace".to_owned(),
            email: email.to_owned(),
            ..NewStudent::default()
        }
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate_ids() {
        let repo = MockStudentRepository::new();
        repo.create_student(new_student("S001", "ada@school.edu"))
            .await
            .unwrap();

        assert!(matches!(
            repo.create_student(new_student("S001", "other@school.edu"))
                .await,
            Err(AuthError::Validation(_))
        ));
        assert_eq!(repo.list_students(None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_email_filter_ignores_case() {
        let repo = MockStudentRepository::new()
            .with_student(Student::from(new_student("S001", "Ada@School.edu")))
            .with_student(Student::from(new_student("S002", "grace@school.edu")));

        let found = repo.list_students(Some("ada@school.edu")).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].student_id, "S001");
    }

    #[tokio::test]
    async fn test_delete_drops_history() {
        let repo = MockStudentRepository::new()
            .with_student(Student::from(new_student("S001", "ada@school.edu")))
            .with_gpa(GpaEntry {
                student_id: Some("S001".to_owned()),
                academic_year: "2023-2024".to_owned(),
                term: "Fall".to_owned(),
                gpa_value: 3.7,
            });

        assert_eq!(repo.gpa_history("S001").await.unwrap().len(), 1);
        repo.delete_student("S001").await.unwrap();

        assert!(repo.gpa_history("S001").await.unwrap().is_empty());
        assert_eq!(
            repo.delete_student("S001").await.unwrap_err(),
            AuthError::NotFound
        );
        assert_eq!(
            repo.update_student("S001", &StudentUpdate::default())
                .await
                .unwrap_err(),
            AuthError::NotFound
        );
    }
}
