//! Server side of the role and student endpoints.
//!
//! The wire types are always available so the [`client`](crate::client)
//! can share them. The axum routes need the `axum_api` feature.

mod students;
mod types;

pub use students::{
    CsvRow, GpaEntry, NewStudent, Student, StudentUpdate, UploadReport, parse_students_csv,
};
pub use types::*;

#[cfg(feature = "axum_api")]
pub mod axum;
