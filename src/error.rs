//! Error types for parcel-track.

/// Top-level error type for the service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Geocoding error: {0}")]
    Geocoding(#[from] GeocodingError),

    #[error("Carrier error: {0}")]
    Carrier(#[from] CarrierError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Address/field extraction errors.
///
/// A message that simply contains no address is NOT an error — extractors
/// return `address: None` for that. These variants cover genuine failures
/// of the delegated (LLM) strategy.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("Extractor returned an empty reply")]
    EmptyReply,

    #[error("Extractor reply was not valid JSON: {0}")]
    BadReply(String),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),
}

/// Geocoding errors. An empty result set from the provider is not an
/// error (it yields `[]`); these cover the network call itself failing.
#[derive(Debug, thiserror::Error)]
pub enum GeocodingError {
    #[error("Cannot fetch geo location from external API: {0}")]
    Upstream(String),

    #[error("Malformed geocoder response: {0}")]
    BadResponse(String),
}

/// Carrier tracking API errors.
#[derive(Debug, thiserror::Error)]
pub enum CarrierError {
    #[error("Failed to fetch package delivery status: {0}")]
    Fetch(String),

    #[error("No tracking information for {tracking_id}")]
    NotFound { tracking_id: String },

    #[error("Tracking id redirect depth exceeded ({max}) for {tracking_id}")]
    MaxRetriesExceeded { tracking_id: String, max: u32 },
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Pipeline-related errors.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Package fetch failed: {0}")]
    PackageFetch(String),

    #[error("Patch persistence failed for {package_id}: {reason}")]
    Persistence { package_id: String, reason: String },
}

/// Result type alias for the service.
pub type Result<T> = std::result::Result<T, Error>;
