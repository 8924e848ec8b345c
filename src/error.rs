use thiserror::Error;

/// Configuration-related errors with structured variants.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),
}

/// Errors surfaced by client operations.
///
/// The dispatcher absorbs the transport-class variants
/// ([`Error::TransportUnavailable`], [`Error::RequestTimeout`]) by retrying
/// over the stateless path; they only reach a caller when the fallback path
/// has failed as well. [`Error::ServerRejected`] and [`Error::FallbackHttp`]
/// are the final, user-meaningful failures of an operation.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("channel transport unavailable: {reason}")]
    TransportUnavailable { reason: String },

    #[error("request '{method}' timed out after {timeout_ms} ms")]
    RequestTimeout { method: String, timeout_ms: u64 },

    #[error("server rejected '{method}': {message}")]
    ServerRejected { method: String, message: String },

    #[error("fallback request failed with status {status}: {message}")]
    FallbackHttp { status: u16, message: String },

    #[error("WebSocket error: {0}")]
    WebSocket(Box<tokio_tungstenite::tungstenite::Error>),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("connection error: {0}")]
    Connection(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Shorthand for a [`Error::TransportUnavailable`] with the given reason.
    pub fn transport_unavailable(reason: impl Into<String>) -> Self {
        Self::TransportUnavailable {
            reason: reason.into(),
        }
    }

    /// Whether this error is a transport-class failure of the channel path.
    ///
    /// The fallback dispatcher substitutes the stateless path for exactly
    /// these errors; everything else is surfaced to the caller as-is.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::TransportUnavailable { .. }
                | Self::RequestTimeout { .. }
                | Self::WebSocket(_)
                | Self::Connection(_)
        )
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Error::WebSocket(Box::new(err))
    }
}
