use recon_core::SimilarityError;
use thiserror::Error;

/// Why a single merchant-level call did not produce a usable answer.
///
/// These never cross the component that issued the call: the checker and the
/// validator log them and fold them into a negative result.
#[derive(Error, Debug)]
pub enum ReconError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("unexpected http status {0}")]
    UnexpectedStatus(u16),
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    #[error("service returned an error body with a success status: {0}")]
    DisguisedErrorPayload(String),
    #[error(transparent)]
    Similarity(#[from] SimilarityError),
    #[error("similarity {score:.4} is below the configured floor {floor:.4}")]
    BelowThreshold { score: f64, floor: f64 },
}

impl From<reqwest::Error> for ReconError {
    fn from(value: reqwest::Error) -> Self {
        Self::Transport(value.to_string())
    }
}

impl From<serde_json::Error> for ReconError {
    fn from(value: serde_json::Error) -> Self {
        Self::MalformedResponse(value.to_string())
    }
}
