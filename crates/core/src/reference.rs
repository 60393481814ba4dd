use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::error::{Result, SimilarityError};

/// How the reference file stores the example contract.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReferenceEncoding {
    #[default]
    Raw,
    Base64,
}

impl FromStr for ReferenceEncoding {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "raw" | "binary" => Ok(Self::Raw),
            "base64" | "b64" => Ok(Self::Base64),
            other => Err(format!("unknown reference encoding '{other}'")),
        }
    }
}

/// The example contract every fetched document is measured against.
#[derive(Debug, Clone)]
pub struct ReferenceDocument {
    bytes: Vec<u8>,
    source: Option<PathBuf>,
}

impl ReferenceDocument {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            source: None,
        }
    }

    pub fn load(path: &Path, encoding: ReferenceEncoding) -> Result<Self> {
        let raw = fs::read(path)?;
        let bytes = match encoding {
            ReferenceEncoding::Raw => raw,
            ReferenceEncoding::Base64 => {
                decode_base64(&raw).map_err(|reason| SimilarityError::InvalidReference {
                    path: path.to_path_buf(),
                    reason,
                })?
            }
        };
        if bytes.is_empty() {
            return Err(SimilarityError::InvalidReference {
                path: path.to_path_buf(),
                reason: "file is empty".to_string(),
            });
        }
        Ok(Self {
            bytes,
            source: Some(path.to_path_buf()),
        })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }
}

fn decode_base64(raw: &[u8]) -> std::result::Result<Vec<u8>, String> {
    let compact: Vec<u8> = raw
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    STANDARD
        .decode(compact)
        .map_err(|err| format!("base64 decode failed: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn loads_raw_bytes_verbatim() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"%PDF-1.4 raw").unwrap();
        let reference = ReferenceDocument::load(file.path(), ReferenceEncoding::Raw).unwrap();
        assert_eq!(reference.bytes(), b"%PDF-1.4 raw");
        assert_eq!(reference.source(), Some(file.path()));
    }

    #[test]
    fn decodes_wrapped_base64() {
        let mut file = NamedTempFile::new().unwrap();
        let encoded = STANDARD.encode(b"%PDF-1.4 encoded reference");
        let (head, tail) = encoded.split_at(10);
        writeln!(file, "{head}\n{tail}").unwrap();
        let reference = ReferenceDocument::load(file.path(), ReferenceEncoding::Base64).unwrap();
        assert_eq!(reference.bytes(), b"%PDF-1.4 encoded reference");
    }

    #[test]
    fn rejects_invalid_base64() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"not base64 at all!").unwrap();
        let err = ReferenceDocument::load(file.path(), ReferenceEncoding::Base64).unwrap_err();
        assert!(matches!(err, SimilarityError::InvalidReference { .. }));
    }

    #[test]
    fn rejects_empty_reference() {
        let file = NamedTempFile::new().unwrap();
        assert!(ReferenceDocument::load(file.path(), ReferenceEncoding::Raw).is_err());
    }

    #[test]
    fn parses_encoding_names() {
        assert_eq!("BASE64".parse::<ReferenceEncoding>(), Ok(ReferenceEncoding::Base64));
        assert_eq!("raw".parse::<ReferenceEncoding>(), Ok(ReferenceEncoding::Raw));
        assert!("zip".parse::<ReferenceEncoding>().is_err());
    }
}
