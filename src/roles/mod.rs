//! Role names, role sets and the permission policy.

mod permission_set;
mod policy;
mod role;
mod traits;

pub use permission_set::PermissionSet;
pub use policy::{
    DashboardAction, DashboardPermissions, DashboardResource, RolePolicy, STAFF_ROLES,
    STUDENT_EDITABLE_FIELDS, is_staff,
};
pub use role::{Role, RoleSet};
pub use traits::{Action, Resource};
