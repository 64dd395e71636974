//! Deployment pipeline for Sui application packages.
//!
//! Publishing or upgrading an on-chain package is mostly glue around an SDK,
//! except for the part that keeps going wrong: turning the ledger's
//! transaction-effects payload into a durable, typed record of what was
//! created, and sequencing the multi-step upgrade flow that cannot safely be
//! retried once begun. This crate owns exactly that part:
//!
//! - [`type_tag`] parses fully-qualified on-ledger type strings into
//!   structured tags (round-trip exact).
//! - [`resolver`] classifies created objects by type into a stable
//!   label -> object-id naming scheme.
//! - [`gas`] derives the net cost of a transaction from its four fee
//!   components.
//! - [`orchestrator`] sequences publish and upgrade runs
//!   (build -> submit -> confirm -> bump version), failing hard on the first
//!   broken step.
//! - [`report`] persists each run as an append-only, versioned JSON artifact
//!   that later tooling reads as a local address book.
//!
//! The RPC transport, signer and Move compiler stay outside, behind the
//! [`ledger::LedgerClient`] and [`ledger::PackageBuilder`] traits.

pub mod config;
pub mod effects;
pub mod error;
pub mod gas;
pub mod ledger;
pub mod orchestrator;
pub mod report;
pub mod resolver;
pub mod type_tag;

pub use config::{Network, NetworkConfig};
pub use effects::{CreatedObject, ExecutionStatus, RawTransactionResponse, TransactionOutcome};
pub use error::{DeployError, Step};
pub use gas::{GasBreakdown, NetGasCost, MIST_PER_SUI};
pub use ledger::{
    BuildArtifact, LedgerClient, PackageBuilder, PlanBuilder, TransactionPlan, TypedObjectRef,
    UpgradePolicy,
};
pub use orchestrator::{DeploymentOutcome, Orchestrator};
pub use report::{DeploymentReport, ReportStore};
pub use resolver::{
    ClassificationRule, CollisionStrategy, EffectsResolver, LabelMap, Resolution,
};
pub use type_tag::{StructTag, TypeTag};
