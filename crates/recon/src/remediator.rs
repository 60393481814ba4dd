use std::fmt;

use crate::checker::{check_contract, ContractCheck};
use crate::roster::ContractStatus;
use crate::service::{ContractService, DocumentDescriptor};
use crate::validator::DocumentValidator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairStage {
    Create,
    DoubleCheck,
    Validation,
}

impl fmt::Display for RepairStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RepairStage::Create => "create",
            RepairStage::DoubleCheck => "double-check",
            RepairStage::Validation => "validation",
        })
    }
}

/// Recovery sequence for a merchant whose listing holds no contract.
///
/// `Missing -> Created -> PendingValidation -> Repaired`, with any failed step
/// ending in `RepairFailed`. Each step runs at most once.
#[derive(Debug, Clone, PartialEq)]
pub enum RemediationState {
    Missing,
    Created,
    PendingValidation(DocumentDescriptor),
    Repaired { score: f64 },
    RepairFailed { stage: RepairStage, score: f64 },
}

impl RemediationState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RemediationState::Repaired { .. } | RemediationState::RepairFailed { .. }
        )
    }

    /// Row status and score a terminal state records; `None` while in flight.
    pub fn row_outcome(&self) -> Option<(ContractStatus, f64)> {
        match self {
            RemediationState::Repaired { score } => Some((ContractStatus::Confirmed, *score)),
            RemediationState::RepairFailed { score, .. } => Some((ContractStatus::Absent, *score)),
            _ => None,
        }
    }
}

pub struct Remediator<'a, S: ?Sized> {
    service: &'a S,
    validator: &'a DocumentValidator<'a>,
}

impl<'a, S> Remediator<'a, S>
where
    S: ContractService + ?Sized,
{
    pub fn new(service: &'a S, validator: &'a DocumentValidator<'a>) -> Self {
        Self { service, validator }
    }

    /// Drives the sequence from `Missing` to a terminal state.
    pub fn remediate(&self, merchant_id: &str) -> RemediationState {
        let mut state = RemediationState::Missing;
        while !state.is_terminal() {
            state = self.step(merchant_id, state);
        }
        state
    }

    pub fn step(&self, merchant_id: &str, state: RemediationState) -> RemediationState {
        match state {
            RemediationState::Missing => self.create(merchant_id),
            RemediationState::Created => match check_contract(self.service, merchant_id) {
                ContractCheck::Present(descriptor) => {
                    RemediationState::PendingValidation(descriptor)
                }
                ContractCheck::Absent => {
                    tracing::warn!(merchant_id, "created contract not listed on double-check");
                    failed(RepairStage::DoubleCheck, 0.0)
                }
            },
            RemediationState::PendingValidation(descriptor) => {
                let validation = self
                    .validator
                    .validate(self.service, merchant_id, &descriptor);
                if validation.valid {
                    RemediationState::Repaired {
                        score: validation.score,
                    }
                } else {
                    failed(RepairStage::Validation, validation.score)
                }
            }
            terminal => terminal,
        }
    }

    fn create(&self, merchant_id: &str) -> RemediationState {
        match self.service.create_contract(merchant_id) {
            Ok(response) if response.is_success() => RemediationState::Created,
            Ok(response) => {
                tracing::warn!(merchant_id, status = response.status, "contract creation rejected");
                failed(RepairStage::Create, 0.0)
            }
            Err(err) => {
                tracing::warn!(merchant_id, "contract creation failed: {err}");
                failed(RepairStage::Create, 0.0)
            }
        }
    }
}

fn failed(stage: RepairStage, score: f64) -> RemediationState {
    RemediationState::RepairFailed { stage, score }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{contract_pdf, engine_for, listing_with_contract, ScriptedService};
    use crate::service::ServiceResponse;

    #[test]
    fn full_sequence_repairs_with_validator_score() {
        let pdf = contract_pdf();
        let engine = engine_for(pdf.clone());
        let validator = DocumentValidator::new(&engine);
        let service = ScriptedService::default();
        service.push_create(Ok(ServiceResponse::new(200, None, "{}")));
        service.push_list(Ok(listing_with_contract()));
        service.push_fetch(Ok(ServiceResponse::new(200, Some("application/pdf"), pdf)));

        let state = Remediator::new(&service, &validator).remediate("76123456-7");
        match state {
            RemediationState::Repaired { score } => assert!(score > 0.999),
            other => panic!("unexpected state {other:?}"),
        }
        assert_eq!(service.create_calls(), vec!["76123456-7".to_string()]);
    }

    #[test]
    fn rejected_create_stops_before_double_check() {
        let engine = engine_for(contract_pdf());
        let validator = DocumentValidator::new(&engine);
        let service = ScriptedService::default();
        service.push_create(Ok(ServiceResponse::new(500, None, "boom")));

        let state = Remediator::new(&service, &validator).remediate("1-9");
        assert_eq!(
            state,
            RemediationState::RepairFailed {
                stage: RepairStage::Create,
                score: 0.0
            }
        );
        assert!(service.list_calls().is_empty());
        assert!(service.fetch_calls().is_empty());
    }

    #[test]
    fn created_status_201_counts_as_failure() {
        let engine = engine_for(contract_pdf());
        let validator = DocumentValidator::new(&engine);
        let service = ScriptedService::default();
        service.push_create(Ok(ServiceResponse::new(201, None, "{}")));
        let state = Remediator::new(&service, &validator).remediate("1-9");
        assert_eq!(state.row_outcome(), Some((ContractStatus::Absent, 0.0)));
    }

    #[test]
    fn missing_after_create_fails_double_check() {
        let engine = engine_for(contract_pdf());
        let validator = DocumentValidator::new(&engine);
        let service = ScriptedService::default();
        service.push_create(Ok(ServiceResponse::new(200, None, "{}")));
        service.push_list(Ok(ServiceResponse::new(200, Some("application/json"), "[]")));

        let state = Remediator::new(&service, &validator).remediate("1-9");
        assert_eq!(
            state,
            RemediationState::RepairFailed {
                stage: RepairStage::DoubleCheck,
                score: 0.0
            }
        );
        assert!(service.fetch_calls().is_empty());
    }

    #[test]
    fn invalid_download_never_confirms() {
        let engine = engine_for(contract_pdf());
        let validator = DocumentValidator::new(&engine);
        let service = ScriptedService::default();
        service.push_create(Ok(ServiceResponse::new(200, None, "{}")));
        service.push_list(Ok(listing_with_contract()));
        service.push_fetch(Ok(ServiceResponse::new(
            200,
            Some("application/json"),
            r#"{"message": "File not found", "status_code": 404}"#,
        )));

        let state = Remediator::new(&service, &validator).remediate("1-9");
        assert_eq!(state.row_outcome(), Some((ContractStatus::Absent, 0.0)));
    }

    #[test]
    fn terminal_states_do_not_advance() {
        let engine = engine_for(contract_pdf());
        let validator = DocumentValidator::new(&engine);
        let service = ScriptedService::default();
        let remediator = Remediator::new(&service, &validator);
        let repaired = RemediationState::Repaired { score: 0.7 };
        assert_eq!(remediator.step("1-9", repaired.clone()), repaired);
        assert!(service.create_calls().is_empty());
    }
}
