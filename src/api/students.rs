//! Student record wire types, shared by the client and the server routes.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::AuthError;
use crate::roles::{Role, RoleSet, STUDENT_EDITABLE_FIELDS, is_staff};
use crate::validators::validate_email;

/// A row of the `students` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub student_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub enrollment_date: Option<NaiveDate>,
    #[serde(default)]
    pub major: Option<String>,
    #[serde(default)]
    pub gpa: Option<f64>,
    #[serde(default)]
    pub academic_standing: Option<String>,
    #[serde(default)]
    pub advisor: Option<String>,
    #[serde(default)]
    pub enrollment_status: Option<String>,
}

impl Student {
    /// A student row belongs to the account signed up with its email.
    pub fn is_owned_by(&self, email: &str) -> bool {
        !email.is_empty() && self.email.eq_ignore_ascii_case(email)
    }

    /// Copies every field `update` sets.
    pub fn apply(&mut self, update: &StudentUpdate) {
        fn set<T: Clone>(field: &mut T, value: &Option<T>) {
            if let Some(value) = value {
                *field = value.clone();
            }
        }
        fn set_opt<T: Clone>(field: &mut Option<T>, value: &Option<T>) {
            if value.is_some() {
                field.clone_from(value);
            }
        }

        set(&mut self.first_name, &update.first_name);
        set(&mut self.last_name, &update.last_name);
        set(&mut self.email, &update.email);
        set_opt(&mut self.phone_number, &update.phone_number);
        set_opt(&mut self.address, &update.address);
        set_opt(&mut self.major, &update.major);
        set_opt(&mut self.gpa, &update.gpa);
        set_opt(&mut self.academic_standing, &update.academic_standing);
        set_opt(&mut self.advisor, &update.advisor);
        set_opt(&mut self.enrollment_status, &update.enrollment_status);
    }
}

impl From<NewStudent> for Student {
    fn from(new: NewStudent) -> Self {
        Student {
            student_id: new.student_id,
            first_name: new.first_name,
            last_name: new.last_name,
            email: new.email,
            date_of_birth: new.date_of_birth,
            gender: None,
            phone_number: None,
            address: None,
            enrollment_date: new.enrollment_date,
            major: new.major,
            gpa: None,
            academic_standing: None,
            advisor: None,
            enrollment_status: None,
        }
    }
}

/// Body of `POST /students`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NewStudent {
    pub student_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub major: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enrollment_date: Option<NaiveDate>,
}

impl NewStudent {
    /// # Errors
    ///
    /// `Validation` for blank id or names, `InvalidEmail` for a bad email.
    pub fn validate(&self) -> Result<(), AuthError> {
        for (name, value) in [
            ("student_id", &self.student_id),
            ("first_name", &self.first_name),
            ("last_name", &self.last_name),
        ] {
            if value.trim().is_empty() {
                return Err(AuthError::Validation(format!("{name} cannot be empty")));
            }
        }
        validate_email(&self.email)?;
        Ok(())
    }
}

/// Partial update for `PATCH /students/:id`. Unset fields are left alone.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StudentUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub major: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpa: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub academic_standing: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advisor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enrollment_status: Option<String>,
}

impl StudentUpdate {
    /// Names of the fields this update sets.
    pub fn fields(&self) -> Vec<&'static str> {
        [
            ("first_name", self.first_name.is_some()),
            ("last_name", self.last_name.is_some()),
            ("email", self.email.is_some()),
            ("phone_number", self.phone_number.is_some()),
            ("address", self.address.is_some()),
            ("major", self.major.is_some()),
            ("gpa", self.gpa.is_some()),
            ("academic_standing", self.academic_standing.is_some()),
            ("advisor", self.advisor.is_some()),
            ("enrollment_status", self.enrollment_status.is_some()),
        ]
        .into_iter()
        .filter_map(|(name, set)| set.then_some(name))
        .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.fields().is_empty()
    }

    /// Checks the update against what `roles` may change.
    ///
    /// Staff roles may change any field. Students may only change their
    /// contact fields; ownership of the row is checked by the backend.
    ///
    /// # Errors
    ///
    /// `AuthError::Forbidden` when a set field is off limits.
    pub fn editable_by(&self, roles: &RoleSet) -> Result<(), AuthError> {
        if is_staff(roles) {
            return Ok(());
        }
        if !roles.contains(&Role::STUDENT) {
            return Err(AuthError::Forbidden);
        }

        match self
            .fields()
            .into_iter()
            .find(|field| !STUDENT_EDITABLE_FIELDS.contains(field))
        {
            Some(field) => {
                log::debug!(
                    target: "roster::api",
                    "msg=\"student update rejected\", field={field}"
                );
                Err(AuthError::Forbidden)
            }
            None => Ok(()),
        }
    }
}

/// One row of `GET /gpa_history/:studentId`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpaEntry {
    #[serde(default)]
    pub student_id: Option<String>,
    pub academic_year: String,
    pub term: String,
    pub gpa_value: f64,
}

/// Response of `POST /students/upload`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UploadReport {
    #[serde(default)]
    pub inserted: u32,
    #[serde(default)]
    pub errors: Vec<String>,
}

const REQUIRED_COLUMNS: [&str; 4] = ["student_id", "first_name", "last_name", "email"];

/// One data row of an uploaded students file.
#[derive(Debug, Clone, PartialEq)]
pub struct CsvRow {
    /// 1-based line the row starts on, the header being line 1.
    pub line: usize,
    pub student: Result<NewStudent, String>,
}

/// Reads a comma-separated students file with a header row.
///
/// Columns are matched by header name, case-insensitively; columns
/// [`NewStudent`] has no field for are ignored and empty cells are unset.
/// Quoted fields may contain commas, newlines and doubled quotes.
///
/// # Errors
///
/// `Validation` when the file is empty, a quote is never closed, or a
/// required column is missing. Problems with single rows are reported in
/// their [`CsvRow`] instead.
pub fn parse_students_csv(text: &str) -> Result<Vec<CsvRow>, AuthError> {
    let mut records = csv_records(text).map_err(AuthError::Validation)?.into_iter();

    let (_, header) = records
        .next()
        .ok_or_else(|| AuthError::Validation("the file has no header row".to_owned()))?;
    let header: Vec<String> = header
        .iter()
        .map(|name| name.trim().trim_start_matches('\u{feff}').to_lowercase())
        .collect();

    if let Some(missing) = REQUIRED_COLUMNS
        .iter()
        .find(|column| !header.iter().any(|name| name == *column))
    {
        return Err(AuthError::Validation(format!("missing column {missing}")));
    }

    Ok(records
        .map(|(line, values)| CsvRow {
            line,
            student: row_to_student(&header, values),
        })
        .collect())
}

fn row_to_student(header: &[String], values: Vec<String>) -> Result<NewStudent, String> {
    if values.len() != header.len() {
        return Err(format!(
            "expected {} columns, found {}",
            header.len(),
            values.len()
        ));
    }

    let object: serde_json::Map<String, serde_json::Value> = header
        .iter()
        .zip(values)
        .filter(|(_, value)| !value.trim().is_empty())
        .map(|(name, value)| (name.clone(), serde_json::Value::String(value.trim().to_owned())))
        .collect();

    let student: NewStudent =
        serde_json::from_value(serde_json::Value::Object(object)).map_err(|e| e.to_string())?;
    student.validate().map_err(|e| e.to_string())?;
    Ok(student)
}

type Record = (usize, Vec<String>);

fn csv_records(text: &str) -> Result<Vec<Record>, String> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut line = 1;
    let mut start = 1;

    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' if quoted => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    quoted = false;
                }
            }
            '"' if field.is_empty() => quoted = true,
            ',' if !quoted => record.push(std::mem::take(&mut field)),
            '\r' if !quoted => {}
            '\n' => {
                line += 1;
                if quoted {
                    field.push('\n');
                    continue;
                }
                record.push(std::mem::take(&mut field));
                records.push((start, std::mem::take(&mut record)));
                start = line;
            }
            other => field.push(other),
        }
    }

    if quoted {
        return Err(format!("unterminated quote on line {start}"));
    }
    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push((start, record));
    }

    // blank lines
    records.retain(|(_, values)| !matches!(values.as_slice(), [only] if only.trim().is_empty()));
    Ok(records)
}
