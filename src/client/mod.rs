//! Resource API client.
//!
//! Every request carries the current session's bearer token; without a
//! session nothing is sent. The backend remains the authority on every
//! decision, the client only maps its answers onto [`AuthError`].
//!
//! | Status | Error |
//! |--------|-------|
//! | 401 | `TokenInvalid` |
//! | 403 | `Forbidden` |
//! | 404 | `NotFound` |
//! | other non-2xx | `Http { status, message }` |

use std::sync::Arc;

use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;

use crate::AuthError;
use crate::api::{ErrorResponse, UpdateRolesRequest, UserWithRoles};
use crate::config::BackendConfig;
use crate::identity::IdentityProvider;
use crate::roles::RoleSet;
use crate::secret::BearerToken;

pub use crate::api::{GpaEntry, NewStudent, Student, StudentUpdate, UploadReport};

/// Bearer-authenticated client for the dashboard REST API.
pub struct ResourceClient<P> {
    http: reqwest::Client,
    base: Url,
    provider: Arc<P>,
}

impl<P> Clone for ResourceClient<P> {
    fn clone(&self) -> Self {
        Self {
            http: self.http.clone(),
            base: self.base.clone(),
            provider: Arc::clone(&self.provider),
        }
    }
}

impl<P: IdentityProvider> ResourceClient<P> {
    /// # Errors
    ///
    /// `AuthError::ConfigurationError` when the backend URL is unset.
    pub fn new(config: &BackendConfig, provider: Arc<P>) -> Result<Self, AuthError> {
        Self::with_client(config, provider, reqwest::Client::new())
    }

    /// # Errors
    ///
    /// `AuthError::ConfigurationError` when the backend URL is unset.
    pub fn with_client(
        config: &BackendConfig,
        provider: Arc<P>,
        http: reqwest::Client,
    ) -> Result<Self, AuthError> {
        Ok(Self {
            http,
            base: config.base_url()?,
            provider,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// `GET /students`
    pub async fn list_students(&self) -> Result<Vec<Student>, AuthError> {
        let request = self.request(Method::GET, &["students"]).await?;
        json(request).await
    }

    /// `GET /students?email=<email>`
    pub async fn find_students_by_email(&self, email: &str) -> Result<Vec<Student>, AuthError> {
        let request = self
            .request(Method::GET, &["students"])
            .await?
            .query(&[("email", email)]);
        json(request).await
    }

    /// `GET /students/:id`
    pub async fn get_student(&self, student_id: &str) -> Result<Student, AuthError> {
        let request = self.request(Method::GET, &["students", student_id]).await?;
        json(request).await
    }

    /// `POST /students`
    pub async fn create_student(&self, student: &NewStudent) -> Result<Student, AuthError> {
        let request = self
            .request(Method::POST, &["students"])
            .await?
            .json(student);
        json(request).await
    }

    /// `PATCH /students/:id`
    pub async fn update_student(
        &self,
        student_id: &str,
        update: &StudentUpdate,
    ) -> Result<Student, AuthError> {
        let request = self
            .request(Method::PATCH, &["students", student_id])
            .await?
            .json(update);
        json(request).await
    }

    /// `DELETE /students/:id`
    pub async fn delete_student(&self, student_id: &str) -> Result<(), AuthError> {
        let request = self
            .request(Method::DELETE, &["students", student_id])
            .await?;
        send(request).await.map(drop)
    }

    /// `GET /gpa_history/:studentId`
    pub async fn gpa_history(&self, student_id: &str) -> Result<Vec<GpaEntry>, AuthError> {
        let request = self
            .request(Method::GET, &["gpa_history", student_id])
            .await?;
        json(request).await
    }

    /// `GET /users`
    pub async fn list_users(&self) -> Result<Vec<UserWithRoles>, AuthError> {
        let request = self.request(Method::GET, &["users"]).await?;
        json(request).await
    }

    /// `PATCH /users/:id/roles`
    pub async fn update_user_roles(
        &self,
        user_id: &str,
        roles: &RoleSet,
    ) -> Result<UserWithRoles, AuthError> {
        let request = self
            .request(Method::PATCH, &["users", user_id, "roles"])
            .await?
            .json(&UpdateRolesRequest::new(roles));
        json(request).await
    }

    /// `POST /students/upload`, the file sent as multipart field `file`.
    pub async fn upload_students(
        &self,
        file_name: &str,
        contents: Vec<u8>,
    ) -> Result<UploadReport, AuthError> {
        let part = Part::bytes(contents).file_name(file_name.to_owned());
        let request = self
            .request(Method::POST, &["students", "upload"])
            .await?
            .multipart(Form::new().part("file", part));
        json(request).await
    }

    async fn token(&self) -> Result<BearerToken, AuthError> {
        match self.provider.get_session().await {
            Ok(Some(session)) if !session.is_expired() => Ok(session.token),
            Ok(_) => Err(AuthError::SessionUnavailable),
            Err(err) => {
                log::warn!(
                    target: "roster::client",
                    "msg=\"session read failed\", error=\"{err}\""
                );
                Err(AuthError::SessionUnavailable)
            }
        }
    }

    async fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder, AuthError> {
        let token = self.token().await?;
        let url = self.url(segments)?;

        Ok(self
            .http
            .request(method, url)
            .header(reqwest::header::AUTHORIZATION, token.header_value()))
    }

    fn url(&self, segments: &[&str]) -> Result<Url, AuthError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| AuthError::ConfigurationError("backend url cannot be a base".to_owned()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

async fn send(request: RequestBuilder) -> Result<Response, AuthError> {
    let response = request.send().await?;
    let status = response.status();

    if status.is_success() {
        return Ok(response);
    }

    match status {
        StatusCode::UNAUTHORIZED => Err(AuthError::TokenInvalid),
        StatusCode::FORBIDDEN => Err(AuthError::Forbidden),
        StatusCode::NOT_FOUND => Err(AuthError::NotFound),
        _ => {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error)
                .unwrap_or(body);
            Err(AuthError::Http {
                status: status.as_u16(),
                message,
            })
        }
    }
}

async fn json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, AuthError> {
    send(request)
        .await?
        .json::<T>()
        .await
        .map_err(|e| AuthError::Transport(format!("invalid response body: {e}")))
}
