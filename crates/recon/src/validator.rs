use recon_core::{decode_lossy, SimilarityEngine};
use serde_json::Value;

use crate::error::ReconError;
use crate::service::{ContractService, DocumentDescriptor, ServiceResponse};

/// Leading body bytes inspected for an error envelope.
const SNIFF_LEN: usize = 100;
const DEFAULT_ERROR_MESSAGE: &str = "file not found";

/// Outcome of one download-and-compare attempt.
///
/// `valid` means a comparison was obtained at all; the score carries how close
/// the document is to the reference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Validation {
    pub score: f64,
    pub valid: bool,
}

impl Validation {
    pub fn failed() -> Self {
        Self {
            score: 0.0,
            valid: false,
        }
    }
}

pub struct DocumentValidator<'a> {
    engine: &'a SimilarityEngine,
    min_similarity: Option<f64>,
}

impl<'a> DocumentValidator<'a> {
    pub fn new(engine: &'a SimilarityEngine) -> Self {
        Self {
            engine,
            min_similarity: None,
        }
    }

    /// Scores below `floor` turn an otherwise valid comparison into a failure.
    pub fn with_min_similarity(mut self, floor: Option<f64>) -> Self {
        self.min_similarity = floor;
        self
    }

    /// Downloads the described document and compares it to the reference.
    ///
    /// Never fails: every error is logged and folded into the result.
    pub fn validate<S>(
        &self,
        service: &S,
        merchant_id: &str,
        descriptor: &DocumentDescriptor,
    ) -> Validation
    where
        S: ContractService + ?Sized,
    {
        tracing::info!(merchant_id, "validating contract file");
        match self.try_validate(service, merchant_id, descriptor) {
            Ok(score) => {
                tracing::info!(merchant_id, score, "contract file compared to reference");
                Validation { score, valid: true }
            }
            Err(ReconError::BelowThreshold { score, floor }) => {
                tracing::warn!(merchant_id, score, floor, "contract file below similarity floor");
                Validation {
                    score,
                    valid: false,
                }
            }
            Err(err) => {
                tracing::warn!(merchant_id, "contract file validation failed: {err}");
                Validation::failed()
            }
        }
    }

    pub fn try_validate<S>(
        &self,
        service: &S,
        merchant_id: &str,
        descriptor: &DocumentDescriptor,
    ) -> Result<f64, ReconError>
    where
        S: ContractService + ?Sized,
    {
        let response = service.fetch_document(merchant_id, descriptor)?;
        let document = classify_response(&response)?;
        let score = self.engine.compare_to_reference(document)?;
        match self.min_similarity {
            Some(floor) if score < floor => Err(ReconError::BelowThreshold { score, floor }),
            _ => Ok(score),
        }
    }
}

/// Returns the document bytes of a download response, or why there are none.
///
/// The service sometimes answers 200 with a JSON error body instead of a file,
/// so the body is sniffed before anything tries to parse it as a document.
pub fn classify_response(response: &ServiceResponse) -> Result<&[u8], ReconError> {
    if !response.is_success() {
        return Err(ReconError::UnexpectedStatus(response.status));
    }
    if looks_like_error_payload(response) {
        return Err(ReconError::DisguisedErrorPayload(error_message(
            &response.body,
        )));
    }
    Ok(&response.body[..])
}

fn looks_like_error_payload(response: &ServiceResponse) -> bool {
    let content_type = response
        .content_type
        .as_deref()
        .unwrap_or_default()
        .to_lowercase();
    if content_type.contains("json") {
        return true;
    }
    let head = decode_lossy(&response.body[..SNIFF_LEN.min(response.body.len())]);
    head.trim_start().starts_with('{')
        || head.contains("\"message\":")
        || head.contains("\"status_code\":")
}

fn error_message(body: &[u8]) -> String {
    serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| DEFAULT_ERROR_MESSAGE.to_string())
}
