use thiserror::Error;

/// Boxed transport-level failure, as returned by a [`crate::NetworkService`]
pub type TransportError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur while searching for recipes
#[derive(Error, Debug)]
pub enum SearchError {
    /// Request URL or parameters could not be built
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The network layer failed before a response body was obtained
    #[error("Network request failed: {0}")]
    TransportFailure(#[source] TransportError),

    /// The response body did not match the expected schema
    #[error("Failed to decode response: {0}")]
    DecodeFailure(#[from] DecodeError),

    /// Another fetch is already running for this session
    #[error("A search is already in progress")]
    Busy,

    /// The in-flight fetch was cancelled by the caller
    #[error("Search was cancelled")]
    Cancelled,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

/// What went wrong at a given location of the response document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeErrorKind {
    /// A required key is absent
    MissingField,
    /// A required key is present but `null`
    NullValue { expected: &'static str },
    /// The value has the wrong JSON type
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
    /// The body is not valid JSON at all
    DataCorrupted(String),
}

/// Structured decode failure carrying the path of the offending value,
/// e.g. `hits[0].recipe.calories`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{}", describe(.path, .kind))]
pub struct DecodeError {
    pub path: String,
    pub kind: DecodeErrorKind,
}

impl DecodeError {
    pub fn missing(path: impl Into<String>) -> Self {
        DecodeError {
            path: path.into(),
            kind: DecodeErrorKind::MissingField,
        }
    }

    pub fn null(path: impl Into<String>, expected: &'static str) -> Self {
        DecodeError {
            path: path.into(),
            kind: DecodeErrorKind::NullValue { expected },
        }
    }

    pub fn mismatch(path: impl Into<String>, expected: &'static str, found: &'static str) -> Self {
        DecodeError {
            path: path.into(),
            kind: DecodeErrorKind::TypeMismatch { expected, found },
        }
    }

    pub fn corrupted(message: impl Into<String>) -> Self {
        DecodeError {
            path: String::new(),
            kind: DecodeErrorKind::DataCorrupted(message.into()),
        }
    }

    /// Last segment of the path, i.e. the key that failed (`"uri"`, `"calories"`)
    pub fn field(&self) -> &str {
        let last = self.path.rsplit('.').next().unwrap_or_default();
        last.split('[').next().unwrap_or_default()
    }
}

fn describe(path: &str, kind: &DecodeErrorKind) -> String {
    match kind {
        DecodeErrorKind::MissingField => format!("missing field `{}`", path),
        DecodeErrorKind::NullValue { expected } => {
            format!("expected {} at `{}`, found null", expected, path)
        }
        DecodeErrorKind::TypeMismatch { expected, found } => format!(
            "type mismatch at `{}`: expected {}, found {}",
            path, expected, found
        ),
        DecodeErrorKind::DataCorrupted(message) => format!("data corrupted: {}", message),
    }
}

/// Errors raised by the favorites store
#[derive(Error, Debug)]
pub enum FavoritesError {
    /// Reading or writing the backing storage failed
    #[error("Persistence failure: {0}")]
    Persistence(#[from] std::io::Error),

    /// Stored favorites could not be parsed
    #[error("Stored favorites are corrupted: {0}")]
    Corrupted(#[from] serde_json::Error),

    /// The recipe cannot be stored (e.g. empty identifier)
    #[error("Invalid recipe: {0}")]
    InvalidRecipe(String),
}
