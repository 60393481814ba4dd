use serde_json::Value;

use crate::error::ReconError;
use crate::service::{ContractService, DocumentDescriptor};

#[derive(Debug, Clone, PartialEq)]
pub enum ContractCheck {
    /// The listing holds a contract entry; the entry is kept for the download.
    Present(DocumentDescriptor),
    Absent,
}

/// Looks for a contract in the merchant's document listing.
///
/// Fails closed: transport errors, non-200 answers and listings that are not a
/// JSON array of objects all read as `Absent`.
pub fn check_contract<S>(service: &S, merchant_id: &str) -> ContractCheck
where
    S: ContractService + ?Sized,
{
    match find_contract(service, merchant_id) {
        Ok(Some(descriptor)) => ContractCheck::Present(descriptor),
        Ok(None) => ContractCheck::Absent,
        Err(err) => {
            tracing::debug!(merchant_id, "contract listing unusable: {err}");
            ContractCheck::Absent
        }
    }
}

pub fn find_contract<S>(
    service: &S,
    merchant_id: &str,
) -> Result<Option<DocumentDescriptor>, ReconError>
where
    S: ContractService + ?Sized,
{
    let response = service.list_documents(merchant_id)?;
    if !response.is_success() {
        return Err(ReconError::UnexpectedStatus(response.status));
    }
    let listing: Value = serde_json::from_slice(&response.body)?;
    let entries = listing
        .as_array()
        .ok_or_else(|| ReconError::MalformedResponse("listing is not a JSON array".into()))?;
    for entry in entries {
        if !entry.is_object() {
            return Err(ReconError::MalformedResponse(format!(
                "listing entry is not an object: {entry}"
            )));
        }
        let descriptor = DocumentDescriptor::new(entry.clone());
        if descriptor.is_contract() {
            return Ok(Some(descriptor));
        }
    }
    Ok(None)
}
