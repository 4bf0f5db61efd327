//! Traits for the things a role can be granted access to.

/// A protected kind of record.
///
/// # Example
///
/// ```rust
/// use roster::roles::Resource;
///
/// #[derive(Clone, PartialEq, Eq, Hash)]
/// enum ReportResource {
///     Transcript,
///     Attendance,
/// }
///
/// impl Resource for ReportResource {
///     fn as_str(&self) -> &'static str {
///         match self {
///             Self::Transcript => "transcript",
///             Self::Attendance => "attendance",
///         }
///     }
///
///     fn from_str(s: &str) -> Option<Self> {
///         match s {
///             "transcript" => Some(Self::Transcript),
///             "attendance" => Some(Self::Attendance),
///             _ => None,
///         }
///     }
/// }
/// ```
pub trait Resource: Clone + PartialEq + Eq + std::hash::Hash + Send + Sync + 'static {
    fn as_str(&self) -> &'static str;

    fn from_str(s: &str) -> Option<Self>;
}

/// An operation on a resource.
///
/// Implementations with a catch-all variant override [`Action::is_all`].
pub trait Action: Clone + PartialEq + Send + Sync + 'static {
    fn as_str(&self) -> &'static str;

    fn from_str(s: &str) -> Option<Self>;

    /// Returns true if this action grants every action on the resource.
    fn is_all(&self) -> bool {
        false
    }
}
