//! Gas accounting.
//!
//! The ledger charges four independent fee components per transaction. The
//! net figure is `computation + storage - rebate + non_refundable`, and it is
//! legitimately negative when the storage rebate exceeds the fresh costs, so
//! it is never clamped. All arithmetic is integer; the SUI rendering is an
//! exact decimal, not a float.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DeployError;

/// Smallest ledger units per SUI.
pub const MIST_PER_SUI: i128 = 1_000_000_000;

/// The four fee components of one transaction, in MIST.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasBreakdown {
    pub computation_cost: u64,
    pub storage_cost: u64,
    pub storage_rebate: u64,
    pub non_refundable_storage_fee: u64,
}

/// `gasUsed` as it appears on the wire. Costs arrive as JSON strings in the
/// legacy client generation and as numbers in the modern one, so each field
/// is kept loose until validated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawGasUsed {
    #[serde(default)]
    pub computation_cost: Value,
    #[serde(default)]
    pub storage_cost: Value,
    #[serde(default)]
    pub storage_rebate: Value,
    #[serde(default)]
    pub non_refundable_storage_fee: Value,
}

impl GasBreakdown {
    /// Validate a wire-shaped breakdown. Fails with
    /// [`DeployError::InvalidGasBreakdown`] if any component is missing,
    /// non-numeric or negative.
    pub fn from_raw(raw: &RawGasUsed) -> Result<Self, DeployError> {
        Ok(Self {
            computation_cost: parse_component("computationCost", &raw.computation_cost)?,
            storage_cost: parse_component("storageCost", &raw.storage_cost)?,
            storage_rebate: parse_component("storageRebate", &raw.storage_rebate)?,
            non_refundable_storage_fee: parse_component(
                "nonRefundableStorageFee",
                &raw.non_refundable_storage_fee,
            )?,
        })
    }

    /// Net cost across all four components. Negative when the rebate exceeds
    /// the other three terms combined.
    pub fn net_cost(&self) -> NetGasCost {
        let net = self.computation_cost as i128 + self.storage_cost as i128
            - self.storage_rebate as i128
            + self.non_refundable_storage_fee as i128;
        NetGasCost(net)
    }
}

fn parse_component(field: &'static str, value: &Value) -> Result<u64, DeployError> {
    let parsed = match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| {
        DeployError::InvalidGasBreakdown(format!(
            "{field} is not a non-negative integer: {value}"
        ))
    })
}

/// Net gas cost in MIST. May be negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct NetGasCost(pub i128);

impl NetGasCost {
    pub fn mist(&self) -> i128 {
        self.0
    }

    /// Exact decimal SUI amount, trailing zeros trimmed: `1.5`, `0.000000123`,
    /// `-0.5`.
    pub fn to_sui_string(&self) -> String {
        let abs = self.0.unsigned_abs();
        let whole = abs / MIST_PER_SUI as u128;
        let frac = abs % MIST_PER_SUI as u128;

        let mut out = String::new();
        if self.0 < 0 {
            out.push('-');
        }
        out.push_str(&whole.to_string());
        if frac != 0 {
            let mut digits = format!("{frac:09}");
            while digits.ends_with('0') {
                digits.pop();
            }
            out.push('.');
            out.push_str(&digits);
        }
        out
    }
}

impl fmt::Display for NetGasCost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sui_string())
    }
}
