//! HTTP handlers for student records, GPA history and CSV ingestion.
//!
//! Every handler first checks the caller's roles against the state's
//! [`RolePolicy`](crate::RolePolicy). Row-level access comes on top: staff
//! roles reach every row, anyone else only the row carrying their own
//! email. Rows a non-staff caller cannot reach answer 403 whether or not
//! they exist.

use axum::Json;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use serde::Deserialize;

use super::error::AppError;
use super::middleware::AuthenticatedUser;
use super::routes::AppState;
use crate::AuthError;
use crate::api::{
    GpaEntry, MessageResponse, NewStudent, Student, StudentUpdate, UploadReport,
    parse_students_csv,
};
use crate::identity::TokenVerifier;
use crate::roles::{DashboardAction, DashboardResource, is_staff};
use crate::store::{RoleRepository, StudentRepository, UserRecord};
use crate::validators::validate_email;

const LOG_TARGET: &str = "roster::api";
const UPLOAD_FIELD: &str = "file";

#[derive(Debug, Default, Deserialize)]
pub struct StudentQuery {
    pub email: Option<String>,
}

fn authorize<V, R, S>(
    state: &AppState<V, R, S>,
    user: &UserRecord,
    resource: DashboardResource,
    action: DashboardAction,
) -> Result<(), AppError> {
    if state.policy.allows(&user.roles, &resource, &action) {
        return Ok(());
    }

    log::info!(
        target: LOG_TARGET,
        "msg=\"student route denied\", user_id={}, roles={}, resource={resource:?}, action={action:?}",
        user.id,
        user.roles
    );
    Err(AppError(AuthError::Forbidden))
}

/// Loads `student_id` if `user` may see that row.
async fn reachable_student<V, R, S>(
    state: &AppState<V, R, S>,
    user: &UserRecord,
    student_id: &str,
) -> Result<Student, AppError>
where
    S: StudentRepository,
{
    let student = state.student_repo.find_student(student_id).await?;

    if is_staff(&user.roles) {
        return student.ok_or(AppError(AuthError::NotFound));
    }

    match student {
        Some(student) if student.is_owned_by(&user.email) => Ok(student),
        _ => {
            log::info!(
                target: LOG_TARGET,
                "msg=\"student row denied\", user_id={}, student_id={student_id}",
                user.id
            );
            Err(AppError(AuthError::Forbidden))
        }
    }
}

/// Every student, optionally filtered by email. Staff only.
///
/// GET /students
pub async fn list_students<V, R, S>(
    user: AuthenticatedUser<V, R, S>,
    State(state): State<AppState<V, R, S>>,
    Query(query): Query<StudentQuery>,
) -> Result<Json<Vec<Student>>, AppError>
where
    V: TokenVerifier + Clone + Send + Sync + 'static,
    R: RoleRepository + Clone + Send + Sync + 'static,
    S: StudentRepository + Clone + Send + Sync + 'static,
{
    let user = user.user();
    authorize(&state, user, DashboardResource::Student, DashboardAction::Read)?;
    if !is_staff(&user.roles) {
        return Err(AppError(AuthError::Forbidden));
    }

    let students = state
        .student_repo
        .list_students(query.email.as_deref())
        .await?;
    Ok(Json(students))
}

/// GET /students/{id}
pub async fn get_student<V, R, S>(
    user: AuthenticatedUser<V, R, S>,
    State(state): State<AppState<V, R, S>>,
    Path(student_id): Path<String>,
) -> Result<Json<Student>, AppError>
where
    V: TokenVerifier + Clone + Send + Sync + 'static,
    R: RoleRepository + Clone + Send + Sync + 'static,
    S: StudentRepository + Clone + Send + Sync + 'static,
{
    let user = user.user();
    authorize(&state, user, DashboardResource::Student, DashboardAction::Read)?;

    let student = reachable_student(&state, user, &student_id).await?;
    Ok(Json(student))
}

/// POST /students
pub async fn create_student<V, R, S>(
    user: AuthenticatedUser<V, R, S>,
    State(state): State<AppState<V, R, S>>,
    Json(body): Json<NewStudent>,
) -> Result<(StatusCode, Json<Student>), AppError>
where
    V: TokenVerifier + Clone + Send + Sync + 'static,
    R: RoleRepository + Clone + Send + Sync + 'static,
    S: StudentRepository + Clone + Send + Sync + 'static,
{
    let user = user.user();
    authorize(&state, user, DashboardResource::Student, DashboardAction::Create)?;
    body.validate()?;

    let student = state.student_repo.create_student(body).await?;

    log::info!(
        target: LOG_TARGET,
        "msg=\"student created\", student_id={}, by={}",
        student.student_id,
        user.id
    );

    Ok((StatusCode::CREATED, Json(student)))
}

/// Staff may change any field. A student may change the contact fields of
/// their own row.
///
/// PATCH /students/{id}
pub async fn update_student<V, R, S>(
    user: AuthenticatedUser<V, R, S>,
    State(state): State<AppState<V, R, S>>,
    Path(student_id): Path<String>,
    Json(update): Json<StudentUpdate>,
) -> Result<Json<Student>, AppError>
where
    V: TokenVerifier + Clone + Send + Sync + 'static,
    R: RoleRepository + Clone + Send + Sync + 'static,
    S: StudentRepository + Clone + Send + Sync + 'static,
{
    let user = user.user();
    authorize(&state, user, DashboardResource::Student, DashboardAction::Update)?;

    if update.is_empty() {
        return Err(AuthError::Validation("no fields to update".to_owned()).into());
    }
    if let Some(email) = &update.email {
        validate_email(email).map_err(AuthError::from)?;
    }

    reachable_student(&state, user, &student_id).await?;
    update.editable_by(&user.roles)?;

    let student = state
        .student_repo
        .update_student(&student_id, &update)
        .await?;

    log::info!(
        target: LOG_TARGET,
        "msg=\"student updated\", student_id={student_id}, fields={:?}, by={}",
        update.fields(),
        user.id
    );

    Ok(Json(student))
}

/// DELETE /students/{id}
pub async fn delete_student<V, R, S>(
    user: AuthenticatedUser<V, R, S>,
    State(state): State<AppState<V, R, S>>,
    Path(student_id): Path<String>,
) -> Result<Json<MessageResponse>, AppError>
where
    V: TokenVerifier + Clone + Send + Sync + 'static,
    R: RoleRepository + Clone + Send + Sync + 'static,
    S: StudentRepository + Clone + Send + Sync + 'static,
{
    let user = user.user();
    authorize(&state, user, DashboardResource::Student, DashboardAction::Delete)?;

    state.student_repo.delete_student(&student_id).await?;

    log::info!(
        target: LOG_TARGET,
        "msg=\"student deleted\", student_id={student_id}, by={}",
        user.id
    );

    Ok(Json(MessageResponse {
        message: format!("Student {student_id} deleted"),
    }))
}

/// GET /gpa_history/{id}
pub async fn gpa_history<V, R, S>(
    user: AuthenticatedUser<V, R, S>,
    State(state): State<AppState<V, R, S>>,
    Path(student_id): Path<String>,
) -> Result<Json<Vec<GpaEntry>>, AppError>
where
    V: TokenVerifier + Clone + Send + Sync + 'static,
    R: RoleRepository + Clone + Send + Sync + 'static,
    S: StudentRepository + Clone + Send + Sync + 'static,
{
    let user = user.user();
    authorize(&state, user, DashboardResource::GpaHistory, DashboardAction::Read)?;

    reachable_student(&state, user, &student_id).await?;
    let history = state.student_repo.gpa_history(&student_id).await?;
    Ok(Json(history))
}

/// Inserts every valid row of the `.csv` file sent as multipart field
/// `file`. Rows that fail to parse or insert are listed in the report.
///
/// POST /students/upload
pub async fn upload_students<V, R, S>(
    user: AuthenticatedUser<V, R, S>,
    State(state): State<AppState<V, R, S>>,
    mut multipart: Multipart,
) -> Result<Json<UploadReport>, AppError>
where
    V: TokenVerifier + Clone + Send + Sync + 'static,
    R: RoleRepository + Clone + Send + Sync + 'static,
    S: StudentRepository + Clone + Send + Sync + 'static,
{
    let user = user.user();
    authorize(
        &state,
        user,
        DashboardResource::StudentUpload,
        DashboardAction::Create,
    )?;

    let text = loop {
        let field = multipart
            .next_field()
            .await
            .map_err(|e| AuthError::Validation(e.to_string()))?
            .ok_or_else(|| AuthError::Validation(format!("missing field {UPLOAD_FIELD}")))?;

        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let is_csv = field
            .file_name()
            .is_some_and(|name| name.to_ascii_lowercase().ends_with(".csv"));
        if !is_csv {
            return Err(AuthError::Validation("only CSV files are accepted".to_owned()).into());
        }

        let bytes = field
            .bytes()
            .await
            .map_err(|e| AuthError::Validation(e.to_string()))?;
        break String::from_utf8(bytes.to_vec())
            .map_err(|_| AuthError::Validation("the file is not valid UTF-8".to_owned()))?;
    };

    let mut report = UploadReport::default();
    for row in parse_students_csv(&text)? {
        let inserted = match row.student {
            Ok(student) => state
                .student_repo
                .create_student(student)
                .await
                .map_err(|e| e.to_string()),
            Err(reason) => Err(reason),
        };

        match inserted {
            Ok(_) => report.inserted += 1,
            Err(reason) => report.errors.push(format!("line {}: {reason}", row.line)),
        }
    }

    log::info!(
        target: LOG_TARGET,
        "msg=\"students uploaded\", inserted={}, rejected={}, by={}",
        report.inserted,
        report.errors.len(),
        user.id
    );

    Ok(Json(report))
}
