use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum ConfigError {
    #[error("TOML serialization error: {0}")]
    #[diagnostic(
        code(depot_config::toml_serialize),
        help("Check your configuration structure for invalid values")
    )]
    TomlSerError(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    #[diagnostic(
        code(depot_config::toml_deserialize),
        help("Check your config.toml syntax and structure")
    )]
    TomlDeError(#[from] toml::de::Error),

    #[error("Invalid backend host: {host}")]
    #[diagnostic(
        code(depot_config::invalid_host),
        help("The backend host must be an absolute URL such as `https://pulp.example.com`")
    )]
    InvalidHost {
        host: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Invalid backend API path: {0}")]
    #[diagnostic(
        code(depot_config::invalid_api_path),
        help("The API path must start with `/` and must not end with `/`, e.g. `/pulp/api/v3`")
    )]
    InvalidApiPath(String),

    #[error("Missing backend credentials")]
    #[diagnostic(
        code(depot_config::missing_credentials),
        help("Set backend.username/backend.password or DEPOT_BACKEND_USERNAME/DEPOT_BACKEND_PASSWORD")
    )]
    MissingCredentials,

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(depot_config::invalid_value))]
    InvalidValue { field: &'static str, reason: String },

    #[error("Error while {action}")]
    #[diagnostic(code(depot_config::io))]
    IoError {
        action: String,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, ConfigError>;
