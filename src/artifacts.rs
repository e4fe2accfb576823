//! Compiled contract artifacts.
//!
//! Creation bytecode is read from the JSON files emitted by the contract build. Both the flat
//! `"bytecode": "0x..."` layout and the nested `"bytecode": {"object": "..."}` layout are
//! accepted.

use std::path::PathBuf;

use miette::Diagnostic;
use serde_json::Value;
use thiserror::Error;

use crate::{chain::ContractKind, config::ArtifactNames};

#[derive(Debug, Error, Diagnostic)]
pub enum ArtifactError {
    #[error("failed to read artifact {}", path.display())]
    #[diagnostic(help("build the contracts first or point `artifacts_dir` at the build output"))]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("artifact {} is not valid JSON", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("artifact {} has no bytecode field", path.display())]
    MissingBytecode { path: PathBuf },

    #[error("artifact {} holds invalid hex bytecode", path.display())]
    InvalidHex {
        path: PathBuf,
        #[source]
        source: hex::FromHexError,
    },
}

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
    names: ArtifactNames,
}

impl ArtifactStore {
    pub fn new(dir: PathBuf, names: ArtifactNames) -> Self {
        Self { dir, names }
    }

    pub fn path_for(&self, kind: ContractKind) -> PathBuf {
        self.dir
            .join(format!("{}.json", self.names.for_kind(kind)))
    }

    /// Load the creation bytecode of a contract.
    pub fn bytecode(&self, kind: ContractKind) -> Result<Vec<u8>, ArtifactError> {
        let path = self.path_for(kind);

        let json = std::fs::read_to_string(&path)
            .map_err(|source| ArtifactError::Read { path: path.clone(), source })?;
        let value: Value = serde_json::from_str(&json)
            .map_err(|source| ArtifactError::Parse { path: path.clone(), source })?;

        let bytecode = match &value["bytecode"] {
            Value::String(code) => code.as_str(),
            Value::Object(nested) => nested
                .get("object")
                .and_then(Value::as_str)
                .ok_or_else(|| ArtifactError::MissingBytecode { path: path.clone() })?,
            _ => return Err(ArtifactError::MissingBytecode { path }),
        };

        let bytecode_hex = bytecode
            .strip_prefix("0x")
            .unwrap_or(bytecode);
        if bytecode_hex.is_empty() {
            return Err(ArtifactError::MissingBytecode { path });
        }

        hex::decode(bytecode_hex).map_err(|source| ArtifactError::InvalidHex { path, source })
    }
}
