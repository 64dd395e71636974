//! Error taxonomy for the deployment pipeline.
//!
//! Two propagation regimes coexist here. Classification errors
//! ([`DeployError::MalformedTypeTag`]) are absorbed by the effects resolver:
//! the object is skipped and the run continues. Every orchestration-step
//! error is fatal to its run and carries the raw collaborator diagnostic,
//! since on-chain partial state requires an operator to decide the next
//! action. There is no automatic retry anywhere in this crate.

use std::path::PathBuf;
use thiserror::Error;

/// Pipeline step at which an orchestration run failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    /// Obtaining bytecode and assembling the transaction plan.
    Build,
    /// Handing the plan to the signer/broadcast collaborator.
    Submit,
    /// Validating the ledger response and awaiting finality.
    Confirm,
    /// Submitting the version-marker transaction (upgrades only).
    BumpVersion,
    /// Validating the version-bump effects (upgrades only).
    ConfirmBump,
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Step::Build => "build",
            Step::Submit => "submit",
            Step::Confirm => "confirm",
            Step::BumpVersion => "bump-version",
            Step::ConfirmBump => "confirm-bump",
        };
        f.write_str(name)
    }
}

/// Errors produced by the deployment pipeline.
#[derive(Debug, Error)]
pub enum DeployError {
    /// Type string outside the legal grammar. Recoverable: the resolver
    /// skips the object and records it as unresolved.
    #[error("malformed type tag {input:?}: {reason}")]
    MalformedTypeTag {
        /// The full input string that failed to parse.
        input: String,
        /// What the parser expected at the point of failure.
        reason: &'static str,
    },

    /// A gas component on the wire was not a non-negative integer. The
    /// ledger guarantees non-negative components, so this is a data error.
    #[error("invalid gas breakdown: {0}")]
    InvalidGasBreakdown(String),

    /// A publish run failed. The source is the collaborator's error,
    /// verbatim; recovery is a fresh run from build.
    #[error("publish failed at {step}: {source:#}")]
    PublishFailed {
        step: Step,
        #[source]
        source: anyhow::Error,
    },

    /// An upgrade run failed before the version bump.
    #[error("upgrade failed at {step}: {source:#}")]
    UpgradeFailed {
        step: Step,
        #[source]
        source: anyhow::Error,
    },

    /// The package upgraded but the version-marker transaction failed.
    /// The package is live while the marker is stale; reconciliation is
    /// manual, which is why the raw payload is attached in full.
    #[error("version bump failed: {source:#}")]
    VersionBumpFailed {
        #[source]
        source: anyhow::Error,
    },

    /// The run succeeded on-chain but the report could not be persisted.
    /// Distinct from every on-chain failure: the ledger state is fine.
    #[error("failed to write deployment report {}: {source}", .path.display())]
    ReportWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl DeployError {
    /// Step at which an orchestration error occurred, if step-scoped.
    pub fn step(&self) -> Option<Step> {
        match self {
            DeployError::PublishFailed { step, .. } | DeployError::UpgradeFailed { step, .. } => {
                Some(*step)
            }
            DeployError::VersionBumpFailed { .. } => Some(Step::ConfirmBump),
            _ => None,
        }
    }
}
