use thiserror::Error;

/// Errors returned by the call builder.
///
/// Builder errors are fatal and never retried: they indicate a structurally
/// incomplete request, not a transient condition.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CallBuilderError {
    /// A required parameter is missing or structurally invalid.
    #[error("malformed parameters: {0}")]
    MalformedParameters(&'static str),
}
