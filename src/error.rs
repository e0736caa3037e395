use thiserror::Error;

/// Failure of a single HTTP attempt. Either kind moves the fallback chain on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttemptError {
    #[error("HTTP {0}")]
    Status(u16),
    #[error("transport error: {0}")]
    Transport(String),
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("missing OpenITI magic line")]
    MissingMagic,
    #[error("metadata header never closed with #META#Header#End#")]
    UnterminatedHeader,
    #[error("invalid Turath payload: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum BookError {
    /// Every candidate URL failed.
    #[error("source not found for {key} (tried: {})", .attempts.join(", "))]
    SourceNotFound { key: String, attempts: Vec<String> },

    #[error("failed to parse {key}: {source}")]
    ParseFailure {
        key: String,
        #[source]
        source: ParseError,
    },

    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

impl BookError {
    /// Both variants surface to readers as a missing book.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::SourceNotFound { .. } | Self::ParseFailure { .. })
    }
}
