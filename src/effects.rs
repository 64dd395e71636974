//! Transaction-response adapter.
//!
//! Two generations of the signer/broadcast collaborator are in the wild and
//! return incompatible effects shapes: the older one reports created objects
//! under `effects.created` as bare references (types must be fetched
//! separately), the newer one reports `objectChanges` with fully-qualified
//! types inline, including a dedicated `published` entry for the package
//! object. Neither shape is treated as canonical; both normalize into
//! [`TransactionOutcome`], the one input contract the resolver and the gas
//! accountant consume.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DeployError;
use crate::gas::{GasBreakdown, RawGasUsed};
use crate::type_tag::PACKAGE_SENTINEL;

/// Raw response as returned by the signer/broadcast collaborator. Every
/// field is optional: which ones are present depends on the client
/// generation and the requested response options.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTransactionResponse {
    #[serde(default)]
    pub digest: Option<String>,
    #[serde(default)]
    pub effects: Option<RawEffects>,
    #[serde(default)]
    pub object_changes: Option<Vec<RawObjectChange>>,
}

/// `effects` as the legacy generation reports it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEffects {
    #[serde(default)]
    pub status: Option<RawExecutionStatus>,
    #[serde(default)]
    pub gas_used: Option<RawGasUsed>,
    #[serde(default)]
    pub created: Vec<RawCreatedRef>,
}

/// Execution status object: `{ "status": "success" }` or
/// `{ "status": "failure", "error": "..." }`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawExecutionStatus {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub error: Option<String>,
}

/// One created-object entry in the legacy shape. Carries no type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawCreatedRef {
    pub reference: RawObjectRef,
    #[serde(default)]
    pub owner: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawObjectRef {
    pub object_id: String,
    #[serde(default)]
    pub version: Option<Value>,
    #[serde(default)]
    pub digest: Option<String>,
}

/// One entry of the modern `objectChanges` array. Only created and published
/// entries matter to resolution; everything else is passed over.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RawObjectChange {
    #[serde(rename_all = "camelCase")]
    Created {
        object_id: String,
        object_type: String,
    },
    #[serde(rename_all = "camelCase")]
    Published { package_id: String },
    #[serde(rename_all = "camelCase")]
    Mutated { object_id: String },
    #[serde(other)]
    Other,
}

/// One created object, before classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedObject {
    pub object_id: String,
    /// Fully-qualified type string; `None` until resolved via the ledger
    /// client (legacy shape only).
    pub type_string: Option<String>,
}

/// Execution status normalized across both generations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionStatus {
    Success,
    Failure { error: String },
}

impl ExecutionStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionStatus::Success)
    }
}

/// The normalized view of one submitted transaction.
#[derive(Debug, Clone)]
pub struct TransactionOutcome {
    pub digest: Option<String>,
    pub status: ExecutionStatus,
    pub gas: Option<GasBreakdown>,
    /// Created objects in ledger order.
    pub created: Vec<CreatedObject>,
}

impl RawTransactionResponse {
    /// Normalize whichever generation of the wire shape is present.
    ///
    /// `objectChanges` wins over `effects.created` when both appear, since
    /// it carries types inline and spares a round trip. Gas validation is
    /// the only failure mode; structural absences surface as `None`/empty
    /// fields for the orchestrator to judge.
    pub fn normalize(&self) -> Result<TransactionOutcome, DeployError> {
        let gas = match self.effects.as_ref().and_then(|e| e.gas_used.as_ref()) {
            Some(raw) => Some(GasBreakdown::from_raw(raw)?),
            None => None,
        };

        let created = if let Some(changes) = &self.object_changes {
            changes
                .iter()
                .filter_map(|change| match change {
                    RawObjectChange::Published { package_id } => Some(CreatedObject {
                        object_id: package_id.clone(),
                        type_string: Some(PACKAGE_SENTINEL.to_string()),
                    }),
                    RawObjectChange::Created {
                        object_id,
                        object_type,
                    } => Some(CreatedObject {
                        object_id: object_id.clone(),
                        type_string: Some(object_type.clone()),
                    }),
                    _ => None,
                })
                .collect()
        } else if let Some(effects) = &self.effects {
            effects
                .created
                .iter()
                .map(|entry| CreatedObject {
                    object_id: entry.reference.object_id.clone(),
                    type_string: None,
                })
                .collect()
        } else {
            Vec::new()
        };

        Ok(TransactionOutcome {
            digest: self.digest.clone(),
            status: normalized_status(self.effects.as_ref()),
            gas,
            created,
        })
    }
}

fn normalized_status(effects: Option<&RawEffects>) -> ExecutionStatus {
    let Some(status) = effects.and_then(|e| e.status.as_ref()) else {
        // Absent effects carry no verdict; digest presence is the success
        // gate and is judged by the orchestrator.
        return ExecutionStatus::Success;
    };
    if let Some(error) = status.error.as_ref().filter(|e| !e.is_empty()) {
        return ExecutionStatus::Failure {
            error: error.clone(),
        };
    }
    if status.status.is_empty() || status.status.eq_ignore_ascii_case("success") {
        ExecutionStatus::Success
    } else {
        ExecutionStatus::Failure {
            error: format!("execution status {:?}", status.status),
        }
    }
}
