//! Fakes shared by the unit tests.

use std::cell::RefCell;
use std::collections::VecDeque;

pub use recon_core::fixtures::pdf_with_text;
use recon_core::{HashEmbedder, ReferenceDocument, SimilarityEngine};
use serde_json::json;

use crate::error::ReconError;
use crate::service::{ContractService, DocumentDescriptor, ServiceResponse};

pub const CONTRACT_TEXT: &str = "CONTRATO DE AFILIACION Y PRESTACION DE SERVICIOS DEL COMERCIO";

type Scripted = RefCell<VecDeque<Result<ServiceResponse, ReconError>>>;

/// Contract service answering from per-operation queues and recording calls.
/// An exhausted queue answers with a transport error.
#[derive(Default)]
pub struct ScriptedService {
    list: Scripted,
    create: Scripted,
    fetch: Scripted,
    list_calls: RefCell<Vec<String>>,
    create_calls: RefCell<Vec<String>>,
    fetch_calls: RefCell<Vec<String>>,
}

impl ScriptedService {
    pub fn push_list(&self, response: Result<ServiceResponse, ReconError>) {
        self.list.borrow_mut().push_back(response);
    }

    pub fn push_create(&self, response: Result<ServiceResponse, ReconError>) {
        self.create.borrow_mut().push_back(response);
    }

    pub fn push_fetch(&self, response: Result<ServiceResponse, ReconError>) {
        self.fetch.borrow_mut().push_back(response);
    }

    pub fn list_calls(&self) -> Vec<String> {
        self.list_calls.borrow().clone()
    }

    pub fn create_calls(&self) -> Vec<String> {
        self.create_calls.borrow().clone()
    }

    pub fn fetch_calls(&self) -> Vec<String> {
        self.fetch_calls.borrow().clone()
    }

    fn next(queue: &Scripted, calls: &RefCell<Vec<String>>, merchant_id: &str) -> Result<ServiceResponse, ReconError> {
        calls.borrow_mut().push(merchant_id.to_string());
        queue
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(ReconError::Transport("no scripted response".into())))
    }
}

impl ContractService for ScriptedService {
    fn list_documents(&self, merchant_id: &str) -> Result<ServiceResponse, ReconError> {
        Self::next(&self.list, &self.list_calls, merchant_id)
    }

    fn create_contract(&self, merchant_id: &str) -> Result<ServiceResponse, ReconError> {
        Self::next(&self.create, &self.create_calls, merchant_id)
    }

    fn fetch_document(
        &self,
        merchant_id: &str,
        _descriptor: &DocumentDescriptor,
    ) -> Result<ServiceResponse, ReconError> {
        Self::next(&self.fetch, &self.fetch_calls, merchant_id)
    }
}

pub fn contract_descriptor() -> DocumentDescriptor {
    DocumentDescriptor::new(json!({
        "codigoDocumento": "001",
        "nombreDocumento": "CONTRATOS",
        "nombreArchivo": "contrato.pdf",
        "estado": "APROBADO",
    }))
}

pub fn listing_with_contract() -> ServiceResponse {
    let body = serde_json::to_vec(&json!([contract_descriptor().entry()])).unwrap();
    ServiceResponse::new(200, Some("application/json"), body)
}

pub fn listing_without_contract() -> ServiceResponse {
    ServiceResponse::new(
        200,
        Some("application/json"),
        r#"[{"nombreDocumento": "CEDULA"}]"#,
    )
}

pub fn engine_for(reference: Vec<u8>) -> SimilarityEngine {
    SimilarityEngine::builder(ReferenceDocument::from_bytes(reference))
        .embedder(Box::new(HashEmbedder::default()))
        .build()
}

pub fn contract_pdf() -> Vec<u8> {
    pdf_with_text(CONTRACT_TEXT)
}
