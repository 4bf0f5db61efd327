mod error;
mod handlers;
mod middleware;
mod routes;
mod students;

pub use error::AppError;
pub use middleware::{AuthenticatedUser, RequireAdmin, extract_bearer_token};
pub use routes::{
    AppState, admin_routes, api_routes, auth_user_routes, role_routes, student_routes,
};
pub use students::StudentQuery;
