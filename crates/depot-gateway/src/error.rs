use depot_id::IdError;
use miette::Diagnostic;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum GatewayError {
    #[error("Backend rejected the request ({status}): {detail}")]
    #[diagnostic(code(depot_gateway::validation))]
    Validation { status: u16, detail: Value },

    #[error("Not found: {path}")]
    #[diagnostic(code(depot_gateway::not_found))]
    NotFound { path: String, detail: Value },

    #[error("Backend error ({status}) on {path}")]
    #[diagnostic(
        code(depot_gateway::upstream),
        help("The content store failed to handle the request; check its logs")
    )]
    Upstream {
        status: u16,
        path: String,
        detail: Value,
    },

    #[error(transparent)]
    #[diagnostic(
        code(depot_gateway::network),
        help("Check that the content store is reachable and the host is correct")
    )]
    Network(#[from] Box<ureq::Error>),

    #[error("Invalid response from {path}: {reason}")]
    #[diagnostic(code(depot_gateway::invalid_response))]
    InvalidResponse { path: String, reason: String },

    #[error("JSON error: {0}")]
    #[diagnostic(code(depot_gateway::json))]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    #[diagnostic(transparent)]
    InvalidIdentifier(#[from] IdError),

    #[error("Response is missing field `{0}`")]
    #[diagnostic(code(depot_gateway::missing_field))]
    MissingField(&'static str),

    #[error("Cannot {action} {kind}")]
    #[diagnostic(code(depot_gateway::unsupported_action))]
    UnsupportedAction { action: &'static str, kind: String },

    #[error("Task {task} ended in state {state}")]
    #[diagnostic(
        code(depot_gateway::task_failed),
        help("The task's error is attached verbatim")
    )]
    TaskFailed {
        task: String,
        state: String,
        error: Value,
    },

    #[error("Timed out waiting for task {task}")]
    #[diagnostic(
        code(depot_gateway::task_timeout),
        help("Raise tasks.timeout_secs or poll the task again later")
    )]
    TaskTimeout { task: String },

    #[error("Task {task} can no longer be canceled")]
    #[diagnostic(code(depot_gateway::task_cancel_conflict))]
    TaskCancelConflict { task: String },
}

pub type Result<T> = std::result::Result<T, GatewayError>;

impl From<ureq::Error> for GatewayError {
    fn from(e: ureq::Error) -> Self {
        Self::Network(Box::new(e))
    }
}

impl GatewayError {
    /// HTTP status an outer API should answer with for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            GatewayError::Validation { status, .. } => *status,
            GatewayError::NotFound { .. } => 404,
            GatewayError::InvalidIdentifier(_) => 400,
            GatewayError::UnsupportedAction { .. } => 422,
            GatewayError::TaskCancelConflict { .. } => 409,
            GatewayError::TaskTimeout { .. } => 504,
            GatewayError::Upstream { .. }
            | GatewayError::Network(_)
            | GatewayError::InvalidResponse { .. }
            | GatewayError::Json(_)
            | GatewayError::MissingField(_)
            | GatewayError::TaskFailed { .. } => 502,
        }
    }

    /// The backend's own error body, when there is one.
    pub fn detail(&self) -> Option<&Value> {
        match self {
            GatewayError::Validation { detail, .. }
            | GatewayError::NotFound { detail, .. }
            | GatewayError::Upstream { detail, .. } => Some(detail),
            GatewayError::TaskFailed { error, .. } => Some(error),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, GatewayError::Validation { status: 401, .. })
    }
}
