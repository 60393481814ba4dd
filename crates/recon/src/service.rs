use bytes::Bytes;
use reqwest::blocking::{Client, Response};
use reqwest::header::CONTENT_TYPE;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};

use crate::error::ReconError;

/// Document-name value that identifies a signed contract in a listing.
pub const CONTRACT_SENTINEL: &str = "CONTRATOS";
/// Listing field holding the document name.
pub const DOCUMENT_NAME_FIELD: &str = "nombreDocumento";

/// What the remote service answered, before any interpretation.
#[derive(Debug, Clone)]
pub struct ServiceResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl ServiceResponse {
    pub fn new(status: u16, content_type: Option<&str>, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            content_type: content_type.map(str::to_string),
            body: body.into(),
        }
    }

    /// Only 200 counts as success; the service's 201 convention is not honored.
    pub fn is_success(&self) -> bool {
        self.status == 200
    }
}

/// One entry of a merchant's document listing, forwarded verbatim on fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentDescriptor {
    entry: Value,
}

impl DocumentDescriptor {
    pub fn new(entry: Value) -> Self {
        Self { entry }
    }

    pub fn name(&self) -> Option<&str> {
        self.entry.get(DOCUMENT_NAME_FIELD).and_then(Value::as_str)
    }

    pub fn file_name(&self) -> Option<&str> {
        self.entry.get("nombreArchivo").and_then(Value::as_str)
    }

    pub fn entry(&self) -> &Value {
        &self.entry
    }

    pub fn is_contract(&self) -> bool {
        self.name() == Some(CONTRACT_SENTINEL)
    }
}

/// The three calls the reconciliation makes against the contract service.
///
/// Implementations report transport failures as `ReconError::Transport` and
/// return every HTTP answer, whatever its status, as a `ServiceResponse`.
pub trait ContractService {
    fn list_documents(&self, merchant_id: &str) -> Result<ServiceResponse, ReconError>;

    fn create_contract(&self, merchant_id: &str) -> Result<ServiceResponse, ReconError>;

    fn fetch_document(
        &self,
        merchant_id: &str,
        descriptor: &DocumentDescriptor,
    ) -> Result<ServiceResponse, ReconError>;
}

pub struct ServiceEndpoints {
    /// Listing (GET) and file download (POST) base URL.
    pub files_url: String,
    pub files_token: SecretString,
    /// Contract creation URL.
    pub contract_url: String,
    pub contract_token: SecretString,
}

pub struct HttpContractService {
    http: Client,
    endpoints: ServiceEndpoints,
}

impl HttpContractService {
    pub fn new(endpoints: ServiceEndpoints) -> Self {
        Self {
            http: Client::new(),
            endpoints,
        }
    }
}

impl ContractService for HttpContractService {
    fn list_documents(&self, merchant_id: &str) -> Result<ServiceResponse, ReconError> {
        let url = join_url(&self.endpoints.files_url, merchant_id);
        tracing::debug!(%url, "listing documents");
        let response = self
            .http
            .get(&url)
            .bearer_auth(self.endpoints.files_token.expose_secret())
            .send()?;
        into_service_response(response)
    }

    fn create_contract(&self, merchant_id: &str) -> Result<ServiceResponse, ReconError> {
        tracing::debug!(url = %self.endpoints.contract_url, merchant_id, "creating contract");
        let response = self
            .http
            .post(&self.endpoints.contract_url)
            .bearer_auth(self.endpoints.contract_token.expose_secret())
            .json(&json!({ "commerceRut": merchant_id }))
            .send()?;
        into_service_response(response)
    }

    fn fetch_document(
        &self,
        merchant_id: &str,
        descriptor: &DocumentDescriptor,
    ) -> Result<ServiceResponse, ReconError> {
        let url = join_url(&self.endpoints.files_url, merchant_id);
        tracing::debug!(%url, file = ?descriptor.file_name(), "fetching document");
        let response = self
            .http
            .post(&url)
            .bearer_auth(self.endpoints.files_token.expose_secret())
            .json(descriptor.entry())
            .send()?;
        into_service_response(response)
    }
}

fn into_service_response(response: Response) -> Result<ServiceResponse, ReconError> {
    let status = response.status().as_u16();
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let body = response.bytes()?;
    Ok(ServiceResponse::new(status, content_type.as_deref(), body))
}

fn join_url(base: &str, merchant_id: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), merchant_id.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;
    use std::time::Duration;

    struct CapturedRequest {
        method: String,
        path: String,
        headers: HashMap<String, String>,
        body: Vec<u8>,
    }

    /// Answers exactly one request with the given reply and hands back what it received.
    fn serve_once(
        status: u16,
        content_type: &'static str,
        body: &'static [u8],
    ) -> (String, thread::JoinHandle<CapturedRequest>) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind test listener");
        let addr = listener.local_addr().expect("listener addr");
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("accept");
            stream
                .set_read_timeout(Some(Duration::from_secs(5)))
                .expect("read timeout");
            let mut raw = Vec::new();
            let mut chunk = [0_u8; 4096];
            let header_end = loop {
                let read = stream.read(&mut chunk).expect("read request");
                assert!(read > 0, "connection closed before headers");
                raw.extend_from_slice(&chunk[..read]);
                if let Some(pos) = raw.windows(4).position(|w| w == b"\r\n\r\n") {
                    break pos + 4;
                }
            };
            let head = String::from_utf8_lossy(&raw[..header_end]).into_owned();
            let mut lines = head.split("\r\n");
            let mut request_line = lines.next().unwrap_or_default().split(' ');
            let method = request_line.next().unwrap_or_default().to_string();
            let path = request_line.next().unwrap_or_default().to_string();
            let headers: HashMap<String, String> = lines
                .filter_map(|line| line.split_once(':'))
                .map(|(name, value)| (name.trim().to_lowercase(), value.trim().to_string()))
                .collect();
            let length = headers
                .get("content-length")
                .and_then(|value| value.parse::<usize>().ok())
                .unwrap_or(0);
            while raw.len() < header_end + length {
                let read = stream.read(&mut chunk).expect("read body");
                assert!(read > 0, "connection closed before body");
                raw.extend_from_slice(&chunk[..read]);
            }
            let reply = format!(
                "HTTP/1.1 {status} Test\r\ncontent-type: {content_type}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n",
                body.len()
            );
            stream.write_all(reply.as_bytes()).expect("write head");
            stream.write_all(body).expect("write body");
            let _ = stream.flush();
            CapturedRequest {
                method,
                path,
                headers,
                body: raw[header_end..header_end + length].to_vec(),
            }
        });
        (format!("http://{addr}"), handle)
    }

    fn service_at(base: &str) -> HttpContractService {
        HttpContractService::new(ServiceEndpoints {
            files_url: format!("{base}/documents/files/"),
            files_token: SecretString::new("files-token".to_string()),
            contract_url: format!("{base}/documents/contract"),
            contract_token: SecretString::new("contract-token".to_string()),
        })
    }

    #[test]
    fn listing_is_a_get_on_the_merchant_path_with_files_token() {
        let (base, server) = serve_once(200, "application/json", br#"[{"nombreDocumento":"CONTRATOS"}]"#);
        let response = service_at(&base).list_documents("76123456-7").unwrap();
        let request = server.join().unwrap();

        assert_eq!(request.method, "GET");
        assert_eq!(request.path, "/documents/files/76123456-7");
        assert_eq!(request.headers["authorization"], "Bearer files-token");
        assert_eq!(response.status, 200);
        assert_eq!(response.content_type.as_deref(), Some("application/json"));
        assert_eq!(&response.body[..], br#"[{"nombreDocumento":"CONTRATOS"}]"#);
    }

    #[test]
    fn create_posts_commerce_rut_with_contract_token() {
        let (base, server) = serve_once(200, "application/json", b"{}");
        let response = service_at(&base).create_contract("76123456-7").unwrap();
        let request = server.join().unwrap();

        assert_eq!(request.method, "POST");
        assert_eq!(request.path, "/documents/contract");
        assert_eq!(request.headers["authorization"], "Bearer contract-token");
        assert!(request.headers["content-type"].starts_with("application/json"));
        let body: Value = serde_json::from_slice(&request.body).unwrap();
        assert_eq!(body, json!({ "commerceRut": "76123456-7" }));
        assert!(response.is_success());
    }

    #[test]
    fn fetch_posts_the_listing_entry_verbatim() {
        let entry = json!({
            "codigoDocumento": "001",
            "nombreDocumento": "CONTRATOS",
            "nombreArchivo": "0076123456-7_001.pdf",
        });
        let (base, server) = serve_once(200, "application/pdf", b"%PDF-1.4 contract");
        let response = service_at(&base)
            .fetch_document("76123456-7", &DocumentDescriptor::new(entry.clone()))
            .unwrap();
        let request = server.join().unwrap();

        assert_eq!(request.method, "POST");
        assert_eq!(request.path, "/documents/files/76123456-7");
        assert_eq!(request.headers["authorization"], "Bearer files-token");
        assert!(request.headers["content-type"].starts_with("application/json"));
        let body: Value = serde_json::from_slice(&request.body).unwrap();
        assert_eq!(body, entry);
        assert_eq!(response.content_type.as_deref(), Some("application/pdf"));
        assert_eq!(&response.body[..], b"%PDF-1.4 contract");
    }

    #[test]
    fn error_statuses_come_back_as_responses() {
        let (base, server) = serve_once(404, "text/plain", b"not found");
        let response = service_at(&base).list_documents("1-9").unwrap();
        server.join().unwrap();
        assert_eq!(response.status, 404);
        assert!(!response.is_success());
    }

    #[test]
    fn refused_connection_is_a_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);
        assert!(matches!(
            service_at(&base).list_documents("1-9"),
            Err(ReconError::Transport(_))
        ));
    }

    #[test]
    fn join_url_avoids_double_slash() {
        assert_eq!(
            join_url("https://svc/documents/files/", "76123456-7"),
            "https://svc/documents/files/76123456-7"
        );
        assert_eq!(join_url("https://svc/files", "1-9"), "https://svc/files/1-9");
    }

    #[test]
    fn descriptor_recognizes_contract_entries() {
        let contract = DocumentDescriptor::new(json!({
            "nombreDocumento": "CONTRATOS",
            "nombreArchivo": "0076123456-7_001.pdf",
        }));
        assert!(contract.is_contract());
        assert_eq!(contract.file_name(), Some("0076123456-7_001.pdf"));

        let other = DocumentDescriptor::new(json!({ "nombreDocumento": "CONTRATO" }));
        assert!(!other.is_contract());
    }

    #[test]
    fn only_200_is_success() {
        assert!(ServiceResponse::new(200, None, Vec::new()).is_success());
        assert!(!ServiceResponse::new(201, None, Vec::new()).is_success());
        assert!(!ServiceResponse::new(404, None, Vec::new()).is_success());
    }
}
