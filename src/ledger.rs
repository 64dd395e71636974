//! Boundary types for the external build and ledger collaborators.
//!
//! The compiler, the wallet and the RPC transport are not this crate's
//! business: they appear only as [`PackageBuilder`] and [`LedgerClient`].
//! What the crate does own is the shape of the transaction plan handed to
//! the signer, modeled as inputs plus commands the way programmable
//! transactions are, with move-once [`UpgradeTicket`]/[`UpgradeReceipt`]
//! tokens so an upgrade authorization cannot leak into a second plan or be
//! redeemed twice.

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::effects::RawTransactionResponse;

/// Address of the framework package hosting `package` and `display`.
pub const SUI_FRAMEWORK: &str = "0x2";

/// Compiled package artifact produced by the external build collaborator,
/// matching the compiler CLI's base64 dump format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildArtifact {
    /// Base64-encoded module bytecode.
    pub modules: Vec<String>,
    /// Package ids this build depends on.
    pub dependencies: Vec<String>,
    /// Build digest binding an upgrade authorization to this exact bytecode.
    #[serde(default)]
    pub digest: Vec<u8>,
}

impl BuildArtifact {
    /// Decode the module blobs.
    pub fn module_bytes(&self) -> Result<Vec<Vec<u8>>> {
        self.modules
            .iter()
            .enumerate()
            .map(|(i, module)| {
                base64::engine::general_purpose::STANDARD
                    .decode(module.as_bytes())
                    .with_context(|| format!("base64 decode module {i}"))
            })
            .collect()
    }

    pub fn digest_hex(&self) -> String {
        hex::encode(&self.digest)
    }
}

/// Compatibility policy declared when authorizing an upgrade.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpgradePolicy {
    #[default]
    Compatible,
    Additive,
    DepOnly,
}

impl UpgradePolicy {
    /// Framework policy code passed to `0x2::package::authorize_upgrade`.
    pub fn code(self) -> u8 {
        match self {
            UpgradePolicy::Compatible => 0,
            UpgradePolicy::Additive => 128,
            UpgradePolicy::DepOnly => 192,
        }
    }
}

/// Argument reference inside one transaction plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Argument {
    /// Reference to a transaction input.
    Input { index: u16 },
    /// Result of a previous command.
    Result { index: u16 },
    /// The gas coin.
    GasCoin,
}

/// Input value of one transaction plan. The signer resolves object ids to
/// full references and BCS-encodes pure values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TransactionInput {
    #[serde(rename_all = "camelCase")]
    Object { object_id: String },
    PureU8 { value: u8 },
    PureBytes { value: Vec<u8> },
    PureAddress { address: String },
}

/// A command in one transaction plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Command {
    /// Publish new modules; the result is the package's upgrade capability.
    Publish {
        modules: Vec<String>,
        dependencies: Vec<String>,
    },
    /// Upgrade an existing package; consumes an authorization ticket, the
    /// result is the upgrade receipt.
    Upgrade {
        modules: Vec<String>,
        dependencies: Vec<String>,
        package: String,
        ticket: Argument,
    },
    /// Move function call.
    #[serde(rename_all = "camelCase")]
    MoveCall {
        package: String,
        module: String,
        function: String,
        type_arguments: Vec<String>,
        arguments: Vec<Argument>,
    },
    /// Transfer objects to an address.
    TransferObjects {
        objects: Vec<Argument>,
        address: Argument,
    },
}

/// Assembled transaction handed to the signer/broadcast collaborator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionPlan {
    pub inputs: Vec<TransactionInput>,
    pub commands: Vec<Command>,
}

/// Authorization produced by `authorize_upgrade`, consumed by
/// [`PlanBuilder::upgrade`]. Deliberately not `Clone`: a ticket from one
/// transaction cannot be redeemed in another, and cannot be redeemed twice.
#[derive(Debug)]
pub struct UpgradeTicket {
    arg: Argument,
}

/// Proof the upgrade command ran, consumed by
/// [`PlanBuilder::commit_upgrade`] within the same plan.
#[derive(Debug)]
pub struct UpgradeReceipt {
    arg: Argument,
}

/// Builds one transaction plan. Inputs and command results are referenced
/// by index, so arguments are only meaningful within the builder that
/// produced them.
#[derive(Debug, Default)]
pub struct PlanBuilder {
    plan: TransactionPlan,
}

impl PlanBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn object_input(&mut self, object_id: impl Into<String>) -> Argument {
        self.push_input(TransactionInput::Object {
            object_id: object_id.into(),
        })
    }

    pub fn pure_u8(&mut self, value: u8) -> Argument {
        self.push_input(TransactionInput::PureU8 { value })
    }

    pub fn pure_bytes(&mut self, value: impl Into<Vec<u8>>) -> Argument {
        self.push_input(TransactionInput::PureBytes {
            value: value.into(),
        })
    }

    pub fn pure_address(&mut self, address: impl Into<String>) -> Argument {
        self.push_input(TransactionInput::PureAddress {
            address: address.into(),
        })
    }

    /// Publish command; returns the upgrade-capability result.
    pub fn publish(&mut self, artifact: &BuildArtifact) -> Argument {
        self.push_command(Command::Publish {
            modules: artifact.modules.clone(),
            dependencies: artifact.dependencies.clone(),
        })
    }

    /// `0x2::package::authorize_upgrade(cap, policy, digest)`.
    pub fn authorize_upgrade(
        &mut self,
        upgrade_cap: &str,
        policy: UpgradePolicy,
        build_digest: &[u8],
    ) -> UpgradeTicket {
        let cap = self.object_input(upgrade_cap);
        let policy = self.pure_u8(policy.code());
        let digest = self.pure_bytes(build_digest.to_vec());
        let arg = self.move_call(
            SUI_FRAMEWORK,
            "package",
            "authorize_upgrade",
            vec![],
            vec![cap, policy, digest],
        );
        UpgradeTicket { arg }
    }

    /// Upgrade command consuming the authorization ticket.
    pub fn upgrade(
        &mut self,
        artifact: &BuildArtifact,
        package_id: &str,
        ticket: UpgradeTicket,
    ) -> UpgradeReceipt {
        let arg = self.push_command(Command::Upgrade {
            modules: artifact.modules.clone(),
            dependencies: artifact.dependencies.clone(),
            package: package_id.to_string(),
            ticket: ticket.arg,
        });
        UpgradeReceipt { arg }
    }

    /// `0x2::package::commit_upgrade(cap, receipt)`.
    pub fn commit_upgrade(&mut self, upgrade_cap: &str, receipt: UpgradeReceipt) {
        let cap = self.object_input(upgrade_cap);
        self.move_call(
            SUI_FRAMEWORK,
            "package",
            "commit_upgrade",
            vec![],
            vec![cap, receipt.arg],
        );
    }

    pub fn move_call(
        &mut self,
        package: &str,
        module: &str,
        function: &str,
        type_arguments: Vec<String>,
        arguments: Vec<Argument>,
    ) -> Argument {
        self.push_command(Command::MoveCall {
            package: package.to_string(),
            module: module.to_string(),
            function: function.to_string(),
            type_arguments,
            arguments,
        })
    }

    pub fn transfer_objects(&mut self, objects: Vec<Argument>, recipient: &str) {
        let address = self.pure_address(recipient);
        self.push_command(Command::TransferObjects { objects, address });
    }

    pub fn finish(self) -> TransactionPlan {
        self.plan
    }

    fn push_input(&mut self, input: TransactionInput) -> Argument {
        let index = self.plan.inputs.len() as u16;
        self.plan.inputs.push(input);
        Argument::Input { index }
    }

    fn push_command(&mut self, command: Command) -> Argument {
        let index = self.plan.commands.len() as u16;
        self.plan.commands.push(command);
        Argument::Result { index }
    }
}

/// Object id with its fully-qualified type, as reported by the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypedObjectRef {
    pub object_id: String,
    pub type_string: String,
}

/// Signing/broadcast collaborator. Implementations own keys, transport and
/// their own timeout policy; this crate never retries a submission, since a
/// resubmitted build digest or ticket would be invalid or double-apply.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Address that signs, pays gas and receives capability objects.
    fn sender(&self) -> String;

    /// Sign, broadcast and return the raw response. Errors are transport or
    /// validation failures; they are surfaced verbatim by the orchestrator.
    async fn submit(&self, plan: TransactionPlan) -> Result<RawTransactionResponse>;

    /// Resolve fully-qualified type strings for the given object ids.
    async fn resolve_object_types(&self, ids: &[String]) -> Result<Vec<TypedObjectRef>>;

    /// Await finality of a submitted transaction.
    async fn wait_for_transaction(&self, digest: &str) -> Result<()>;
}

/// Compiler collaborator producing deployable bytecode.
pub trait PackageBuilder {
    fn build(&self) -> Result<BuildArtifact>;
}

/// A pre-built artifact, for callers that already ran the compiler.
impl PackageBuilder for BuildArtifact {
    fn build(&self) -> Result<BuildArtifact> {
        Ok(self.clone())
    }
}
