//! Genesis transactions: one JSON object per line.
//!
//! ```text
//! {"txn":{"type":"1","data":{"dest":"Th7M...","verkey":"~7TY...","role":"0"}},"txnMetadata":{"seqNo":1}}
//! ```
//!
//! NYM entries (type `"1"` or `"NYM"`) seed the ledger's identities. Node
//! entries (type `"0"` or `"NODE"`) describe validator nodes and are skipped.

use serde::Deserialize;
use std::path::Path;

use indigo_core::{Did, Role, Verkey};

use crate::error::LedgerError;

/// A NYM seeded by the genesis file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenesisNym {
    pub dest: Did,
    pub verkey: Verkey,
    pub role: Option<Role>,
    pub seq_no: u64,
}

#[derive(Deserialize)]
struct GenesisLine {
    txn: GenesisTxn,
    #[serde(rename = "txnMetadata", default)]
    txn_metadata: GenesisMetadata,
}

#[derive(Deserialize)]
struct GenesisTxn {
    #[serde(rename = "type")]
    txn_type: String,
    data: serde_json::Value,
}

#[derive(Deserialize, Default)]
struct GenesisMetadata {
    #[serde(rename = "seqNo")]
    seq_no: Option<u64>,
}

#[derive(Deserialize)]
struct GenesisNymData {
    dest: Did,
    verkey: String,
    #[serde(default)]
    role: Option<Role>,
}

/// Parse genesis text. Blank lines are ignored.
pub fn parse_genesis(text: &str) -> Result<Vec<GenesisNym>, LedgerError> {
    let mut nyms = Vec::new();
    for (index, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let line_no = index + 1;
        let entry: GenesisLine = serde_json::from_str(line)
            .map_err(|e| LedgerError::InvalidGenesis(format!("line {}: {}", line_no, e)))?;

        match entry.txn.txn_type.as_str() {
            "1" | "NYM" => {
                let data: GenesisNymData = serde_json::from_value(entry.txn.data)
                    .map_err(|e| LedgerError::InvalidGenesis(format!("line {}: {}", line_no, e)))?;
                let verkey = expand_verkey(&data.dest, &data.verkey)
                    .map_err(|e| LedgerError::InvalidGenesis(format!("line {}: {}", line_no, e)))?;
                nyms.push(GenesisNym {
                    dest: data.dest,
                    verkey,
                    role: data.role,
                    seq_no: entry.txn_metadata.seq_no.unwrap_or(line_no as u64),
                });
            }
            "0" | "NODE" => {
                tracing::debug!(line = line_no, "skipping node genesis entry");
            }
            other => {
                return Err(LedgerError::InvalidGenesis(format!(
                    "line {}: unsupported transaction type {}",
                    line_no, other
                )));
            }
        }
    }
    Ok(nyms)
}

/// Read and parse a genesis file.
pub async fn load_genesis(path: &Path) -> Result<Vec<GenesisNym>, LedgerError> {
    let text = tokio::fs::read_to_string(path).await?;
    let nyms = parse_genesis(&text)?;
    tracing::info!(path = %path.display(), nyms = nyms.len(), "genesis loaded");
    Ok(nyms)
}

/// Resolve an abbreviated verkey (`~` + last 16 bytes) against its DID,
/// which carries the first 16 bytes.
fn expand_verkey(dest: &Did, verkey: &str) -> Result<Verkey, String> {
    let Some(tail) = verkey.strip_prefix('~') else {
        return Verkey::new(verkey).map_err(|e| e.to_string());
    };
    let mut bytes = bs58::decode(dest.as_str())
        .into_vec()
        .map_err(|e| e.to_string())?;
    bytes.extend(bs58::decode(tail).into_vec().map_err(|e| e.to_string())?);
    let bytes: [u8; 32] = bytes
        .try_into()
        .map_err(|v: Vec<u8>| format!("abbreviated verkey expands to {} bytes", v.len()))?;
    Ok(Verkey::from_bytes(bytes))
}
