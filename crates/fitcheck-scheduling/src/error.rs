// Allow unused assignments for diagnostic fields - they're used by the macros
#![allow(unused_assignments)]

use miette::Diagnostic;
use thiserror::Error;

/// Scheduling error type
#[derive(Error, Debug, Diagnostic)]
pub enum SchedulingError {
    /// Node selector contains terms that cannot be evaluated
    #[error("Invalid node selector: {details}")]
    #[diagnostic(
        code(scheduling::invalid_node_selector),
        help("Check operators (In, NotIn, Exists, DoesNotExist, Gt, Lt) and their values")
    )]
    InvalidNodeSelector {
        details: String,
    },

    /// preferAvoidPods annotation is not valid JSON
    #[error("Failed to decode avoid-pods annotation: {message}")]
    #[diagnostic(
        code(scheduling::avoid_pods_decode),
        help("The node annotation scheduler.alpha.kubernetes.io/preferAvoidPods must hold an AvoidPods JSON object")
    )]
    AvoidPodsDecode {
        message: String,
        #[source]
        source: serde_json::Error,
    },

    /// Core error
    #[error("Core error: {0}")]
    #[diagnostic(
        code(scheduling::core_error),
        help("Check the pod and node manifests")
    )]
    CoreError(#[from] fitcheck_core::FitcheckError),
}

/// Result type for scheduling operations
pub type Result<T> = std::result::Result<T, SchedulingError>;

impl SchedulingError {
    /// Create an InvalidNodeSelector error
    pub fn invalid_node_selector(details: impl Into<String>) -> Self {
        Self::InvalidNodeSelector {
            details: details.into(),
        }
    }

    /// Create an AvoidPodsDecode error
    pub fn avoid_pods_decode(source: serde_json::Error) -> Self {
        Self::AvoidPodsDecode {
            message: source.to_string(),
            source,
        }
    }
}
