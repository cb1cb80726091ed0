//! Exported-intent artifact: the JSON hand-off between the relayer that unseals the output
//! amount and the process that fulfils on the destination chain.
//!
//! Layout:
//! `{ "intent": [ ...13 fields in on-chain struct order... ], "plainOutputAmount": "..." }`.
//! Big integers (and the small on-chain integers) are decimal strings, addresses are checksummed
//! hex and `solverPaid` is a JSON bool.

use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use alloy_primitives::{Address, U256};
use fhe_bridge_types::{BridgeIntent, CiphertextHandle, FilledStatus};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("artifact I/O on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed artifact JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid intent field {field}: {value:?}")]
    InvalidField { field: &'static str, value: String },
}

/// An intent together with its unsealed output amount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentArtifact {
    pub intent: BridgeIntent,
    pub plain_output_amount: U256,
}

type IntentTuple = (
    String, // sender
    String, // receiver
    String, // relayer
    String, // inputToken
    String, // outputToken
    String, // inputAmount
    String, // outputAmount
    String, // id
    String, // originChainId
    String, // destinationChainId
    String, // filledStatus
    bool,   // solverPaid
    String, // timeout
);

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ArtifactDocument {
    intent: IntentTuple,
    plain_output_amount: String,
}

fn address_field(field: &'static str, value: &str) -> Result<Address, ArtifactError> {
    Address::from_str(value).map_err(|_| ArtifactError::InvalidField {
        field,
        value: value.to_string(),
    })
}

fn u256_field(field: &'static str, value: &str) -> Result<U256, ArtifactError> {
    U256::from_str_radix(value, 10).map_err(|_| ArtifactError::InvalidField {
        field,
        value: value.to_string(),
    })
}

fn u32_field(field: &'static str, value: &str) -> Result<u32, ArtifactError> {
    value
        .parse::<u32>()
        .map_err(|_| ArtifactError::InvalidField {
            field,
            value: value.to_string(),
        })
}

impl IntentArtifact {
    pub fn intent_id(&self) -> U256 {
        self.intent.id
    }

    pub fn to_json(&self) -> Result<String, ArtifactError> {
        let i = &self.intent;
        let doc = ArtifactDocument {
            intent: (
                i.sender.to_checksum(None),
                i.receiver.to_checksum(None),
                i.relayer.to_checksum(None),
                i.input_token.to_checksum(None),
                i.output_token.to_checksum(None),
                i.input_amount.into_raw().to_string(),
                i.output_amount.into_raw().to_string(),
                i.id.to_string(),
                i.origin_chain_id.to_string(),
                i.destination_chain_id.to_string(),
                (i.filled_status as u8).to_string(),
                i.solver_paid,
                i.timeout.to_string(),
            ),
            plain_output_amount: self.plain_output_amount.to_string(),
        };
        Ok(serde_json::to_string_pretty(&doc)?)
    }

    pub fn from_json(json: &str) -> Result<Self, ArtifactError> {
        let doc: ArtifactDocument = serde_json::from_str(json)?;
        let (
            sender,
            receiver,
            relayer,
            input_token,
            output_token,
            input_amount,
            output_amount,
            id,
            origin_chain_id,
            destination_chain_id,
            filled_status,
            solver_paid,
            timeout,
        ) = doc.intent;

        let filled_status = filled_status
            .parse::<u8>()
            .ok()
            .and_then(|raw| FilledStatus::try_from(raw).ok())
            .ok_or_else(|| ArtifactError::InvalidField {
                field: "filledStatus",
                value: filled_status.clone(),
            })?;

        let intent = BridgeIntent {
            sender: address_field("sender", &sender)?,
            receiver: address_field("receiver", &receiver)?,
            relayer: address_field("relayer", &relayer)?,
            input_token: address_field("inputToken", &input_token)?,
            output_token: address_field("outputToken", &output_token)?,
            input_amount: CiphertextHandle::from_raw(u256_field("inputAmount", &input_amount)?),
            output_amount: CiphertextHandle::from_raw(u256_field("outputAmount", &output_amount)?),
            id: u256_field("id", &id)?,
            origin_chain_id: u32_field("originChainId", &origin_chain_id)?,
            destination_chain_id: u32_field("destinationChainId", &destination_chain_id)?,
            filled_status,
            solver_paid,
            timeout: u256_field("timeout", &timeout)?,
        };

        Ok(Self {
            intent,
            plain_output_amount: u256_field("plainOutputAmount", &doc.plain_output_amount)?,
        })
    }

    /// Write atomically: a reader never observes a half-written artifact.
    pub fn write_to(&self, path: &Path) -> Result<(), ArtifactError> {
        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source| ArtifactError::Io { path, source }
        };

        let parent = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        if !parent.exists() {
            fs::create_dir_all(parent).map_err(io_err(parent))?;
        }

        let serialised = self.to_json()?;
        let tmp_path = tmp_path_for(path);
        fs::write(&tmp_path, serialised.as_bytes()).map_err(io_err(&tmp_path))?;
        fs::rename(&tmp_path, path).map_err(io_err(path))?;
        Ok(())
    }

    pub fn read_from(path: &Path) -> Result<Self, ArtifactError> {
        let raw = fs::read_to_string(path).map_err(|source| ArtifactError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw)
    }
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_os_string();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}
