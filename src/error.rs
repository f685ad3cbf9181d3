use thiserror::Error;
use warp::http::StatusCode;

/// Failures of the key-value cache backing the ephemeris store.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache codec error: {0}")]
    Codec(String),

    #[error("poisoned cache lock")]
    Poisoned,
}

/// Failures while fetching or decoding the upstream ephemeris feed.
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("feed request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("feed returned HTTP {0}")]
    Status(u16),

    #[error("feed is not well-formed XML: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("feed is not well-formed XML: {0}")]
    Malformed(String),

    #[error("stateVector #{index} is missing {field}")]
    MissingField { index: usize, field: &'static str },

    #[error("stateVector {epoch} has invalid {field}: '{value}'")]
    InvalidNumber {
        epoch: String,
        field: &'static str,
        value: String,
    },
}

#[derive(Error, Debug, PartialEq)]
pub enum GeometryError {
    #[error("degenerate position: radius is {0}")]
    Degenerate(f64),
}

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Epoch not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Feed(#[from] FeedError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("invalid state vector at {epoch}: {source}")]
    Geometry {
        epoch: String,
        #[source]
        source: GeometryError,
    },

    #[error("Could not determine current ISS data")]
    Empty,

    #[error("No ISS data available to summarize")]
    NothingToSummarize,
}

/// Error surfaced by the HTTP layer. Always rendered as `{"error": message}`.
#[derive(Error, Debug)]
#[error("{message}")]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into() }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl From<TrackerError> for ApiError {
    fn from(err: TrackerError) -> Self {
        let status = match &err {
            TrackerError::NotFound(_) => StatusCode::NOT_FOUND,
            TrackerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.to_string())
    }
}

pub type TrackerResult<T> = Result<T, TrackerError>;
