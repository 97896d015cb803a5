use depot_gateway::GatewayError;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum ContentError {
    #[error("You must specify a release to add packages to an apt repo.")]
    #[diagnostic(
        code(depot_content::missing_release),
        help("Pass the release the packages should be added to")
    )]
    MissingRelease,

    #[error("Removing packages from a single release is not supported.")]
    #[diagnostic(
        code(depot_content::unsupported_operation),
        help("Remove the packages from the whole repository, then add them back to the releases that should keep them")
    )]
    UnsupportedOperation,

    #[error("Specified release not found!")]
    #[diagnostic(code(depot_content::release_not_found))]
    ReleaseNotFound { release: String },

    #[error("{count} packages match {query}")]
    #[diagnostic(
        code(depot_content::ambiguous_match),
        help("Specify every natural key field to pick a single package")
    )]
    AmbiguousMatch { query: String, count: usize },

    #[error("Invalid package query: {0}")]
    #[diagnostic(code(depot_content::invalid_query))]
    InvalidQuery(String),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Gateway(#[from] GatewayError),

    #[error("Failed to start upload workers: {0}")]
    #[diagnostic(code(depot_content::worker_pool))]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

pub type Result<T> = std::result::Result<T, ContentError>;

impl From<depot_id::IdError> for ContentError {
    fn from(e: depot_id::IdError) -> Self {
        Self::Gateway(GatewayError::from(e))
    }
}

impl ContentError {
    /// HTTP status an outer API should answer with for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            ContentError::MissingRelease
            | ContentError::UnsupportedOperation
            | ContentError::ReleaseNotFound { .. } => 422,
            ContentError::AmbiguousMatch { .. } => 409,
            ContentError::InvalidQuery(_) => 400,
            ContentError::Gateway(e) => e.status_code(),
            ContentError::WorkerPool(_) => 500,
        }
    }
}
