//! Publish/upgrade orchestration.
//!
//! One orchestrator run walks a strictly sequential state machine:
//!
//! ```text
//! build -> submit -> confirm -> done                      (publish)
//!                            -> bump-version -> confirm-bump -> done  (upgrade)
//! any step -> failed (terminal)
//! ```
//!
//! Every step failure is fatal to the run and surfaced with the deepest
//! available raw diagnostic; the only recovery path is a fresh run from
//! build, decided by an operator. Nothing here retries: resubmitting the
//! same build digest or authorization ticket would be invalid or
//! double-apply.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::anyhow;
use chrono::Utc;
use tracing::info;

use crate::config::NetworkConfig;
use crate::effects::{CreatedObject, ExecutionStatus, RawTransactionResponse, TransactionOutcome};
use crate::error::{DeployError, Step};
use crate::ledger::{LedgerClient, PackageBuilder, PlanBuilder, UpgradePolicy};
use crate::report::{DeploymentReport, ReportStore};
use crate::resolver::{EffectsResolver, Resolution, PACKAGE_LABEL};

/// Outcome of a successful run.
#[derive(Debug)]
pub struct DeploymentOutcome {
    pub report: DeploymentReport,
    pub report_path: PathBuf,
    /// Full resolution, including objects that could not be classified.
    pub resolution: Resolution,
    /// Digest of the version-bump transaction (upgrade runs only).
    pub bump_digest: Option<String>,
}

#[derive(Debug, Clone, Copy)]
enum RunKind {
    Publish,
    Upgrade,
}

impl RunKind {
    fn fail(self, step: Step, source: anyhow::Error) -> DeployError {
        match self {
            RunKind::Publish => DeployError::PublishFailed { step, source },
            RunKind::Upgrade => DeployError::UpgradeFailed { step, source },
        }
    }
}

/// Sequences the dependent on-chain operations of a publish or upgrade and
/// turns the final effects into a persisted deployment report.
pub struct Orchestrator<C> {
    client: C,
    config: NetworkConfig,
    resolver: EffectsResolver,
    store: ReportStore,
}

impl<C: LedgerClient> Orchestrator<C> {
    /// Configuration is taken once at construction and never reloaded.
    pub fn new(client: C, config: NetworkConfig) -> Self {
        let store = ReportStore::new(config.reports_dir.clone());
        Self {
            client,
            config,
            resolver: EffectsResolver::new(),
            store,
        }
    }

    pub fn with_resolver(mut self, resolver: EffectsResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Publish a new package and persist the deployment report.
    pub async fn publish(
        &self,
        builder: &dyn PackageBuilder,
    ) -> Result<DeploymentOutcome, DeployError> {
        let kind = RunKind::Publish;
        info!(network = %self.config.network, "publishing package");

        let artifact = builder.build().map_err(|e| kind.fail(Step::Build, e))?;
        let mut plan = PlanBuilder::new();
        let upgrade_cap = plan.publish(&artifact);
        plan.transfer_objects(vec![upgrade_cap], &self.client.sender());

        let response = self
            .client
            .submit(plan.finish())
            .await
            .map_err(|e| kind.fail(Step::Submit, e))?;
        let (outcome, digest) = self.confirm(&response, kind).await?;

        let (report, report_path, resolution) = self.persist(kind, outcome, digest, None).await?;
        Ok(DeploymentOutcome {
            report,
            report_path,
            resolution,
            bump_digest: None,
        })
    }

    /// Upgrade the configured package, then advance its version marker in a
    /// second transaction.
    ///
    /// The report is written right after the upgrade confirms: a failed
    /// version bump leaves the package upgraded, the marker stale and a
    /// publish-level report on disk, which is exactly the state an operator
    /// needs to see to reconcile manually.
    pub async fn upgrade(
        &self,
        builder: &dyn PackageBuilder,
        policy: UpgradePolicy,
    ) -> Result<DeploymentOutcome, DeployError> {
        let kind = RunKind::Upgrade;
        let ids = self
            .config
            .upgrade_ids()
            .map_err(|e| kind.fail(Step::Build, e))?;
        info!(
            network = %self.config.network,
            package = ids.package_id,
            "upgrading package"
        );

        let artifact = builder.build().map_err(|e| kind.fail(Step::Build, e))?;
        let mut plan = PlanBuilder::new();
        // Ticket and receipt live and die inside this one plan; a ticket
        // from one transaction cannot be redeemed in another.
        let ticket = plan.authorize_upgrade(ids.upgrade_cap, policy, &artifact.digest);
        let receipt = plan.upgrade(&artifact, ids.package_id, ticket);
        plan.commit_upgrade(ids.upgrade_cap, receipt);

        let response = self
            .client
            .submit(plan.finish())
            .await
            .map_err(|e| kind.fail(Step::Submit, e))?;
        let (outcome, digest) = self.confirm(&response, kind).await?;

        let previous_package = Some(ids.package_id.to_string());
        let (report, report_path, resolution) =
            self.persist(kind, outcome, digest, previous_package).await?;

        let bump_digest = self
            .bump_version(&resolution, ids.version_object, ids.admin_cap)
            .await?;

        Ok(DeploymentOutcome {
            report,
            report_path,
            resolution,
            bump_digest: Some(bump_digest),
        })
    }

    /// Validate the ledger response and await finality.
    ///
    /// A response without a digest is a failure even when the submission
    /// call itself returned cleanly; the collaborator's error signaling has
    /// been observed to be inconsistent, and a success-shaped response with
    /// no digest must not be trusted.
    async fn confirm(
        &self,
        response: &RawTransactionResponse,
        kind: RunKind,
    ) -> Result<(TransactionOutcome, String), DeployError> {
        let outcome = response.normalize()?;

        let digest = outcome
            .digest
            .clone()
            .filter(|d| !d.is_empty())
            .ok_or_else(|| {
                kind.fail(
                    Step::Confirm,
                    anyhow!("ledger response carries no transaction digest"),
                )
            })?;

        if let ExecutionStatus::Failure { error } = &outcome.status {
            return Err(kind.fail(Step::Confirm, anyhow!("execution failed: {error}")));
        }

        self.client
            .wait_for_transaction(&digest)
            .await
            .map_err(|e| kind.fail(Step::Confirm, e))?;

        info!(%digest, "transaction confirmed");
        Ok((outcome, digest))
    }

    /// Run the gas accountant and the resolver over confirmed effects and
    /// write the report.
    async fn persist(
        &self,
        kind: RunKind,
        outcome: TransactionOutcome,
        digest: String,
        previous_package: Option<String>,
    ) -> Result<(DeploymentReport, PathBuf, Resolution), DeployError> {
        let gas = outcome.gas.ok_or_else(|| {
            kind.fail(
                Step::Confirm,
                anyhow!("ledger response carries no gas summary"),
            )
        })?;

        let created = self.resolve_created_types(outcome.created, kind).await?;
        let resolution = self.resolver.resolve(&created);

        let report = DeploymentReport {
            network: self.config.network,
            digest,
            gas: gas.net_cost().to_sui_string(),
            previous_package,
            labels: resolution.labels.clone(),
            timestamp: Utc::now(),
        };
        let report_path = self.store.write(&report)?;
        Ok((report, report_path, resolution))
    }

    /// Fill in type strings the response did not carry inline (legacy
    /// effects shape) via the ledger client.
    async fn resolve_created_types(
        &self,
        created: Vec<CreatedObject>,
        kind: RunKind,
    ) -> Result<Vec<CreatedObject>, DeployError> {
        let missing: Vec<String> = created
            .iter()
            .filter(|object| object.type_string.is_none())
            .map(|object| object.object_id.clone())
            .collect();
        if missing.is_empty() {
            return Ok(created);
        }

        let typed = self
            .client
            .resolve_object_types(&missing)
            .await
            .map_err(|e| kind.fail(Step::Confirm, e))?;
        let by_id: HashMap<String, String> = typed
            .into_iter()
            .map(|t| (t.object_id, t.type_string))
            .collect();

        Ok(created
            .into_iter()
            .map(|mut object| {
                if object.type_string.is_none() {
                    object.type_string = by_id.get(&object.object_id).cloned();
                }
                object
            })
            .collect())
    }

    /// Advance the shared version marker to the newly upgraded package.
    ///
    /// Separate transaction by necessity: the marker is a shared mutable
    /// resource distinct from the immutable package, and the call target is
    /// the new package id, known only after confirm.
    async fn bump_version(
        &self,
        resolution: &Resolution,
        version_object: &str,
        admin_cap: &str,
    ) -> Result<String, DeployError> {
        let new_package = resolution.labels.get(PACKAGE_LABEL).ok_or_else(|| {
            DeployError::VersionBumpFailed {
                source: anyhow!("upgraded package id missing from resolved effects"),
            }
        })?;
        info!(package = new_package, "bumping version marker");

        let mut plan = PlanBuilder::new();
        let version = plan.object_input(version_object);
        let cap = plan.object_input(admin_cap);
        plan.move_call(new_package, "version", "update", vec![], vec![version, cap]);

        let response = self
            .client
            .submit(plan.finish())
            .await
            .map_err(|source| DeployError::VersionBumpFailed { source })?;

        let outcome = response.normalize()?;
        if let ExecutionStatus::Failure { error } = &outcome.status {
            // Stale-marker state; attach the whole payload for diagnosis.
            let payload = serde_json::to_string_pretty(&response)
                .unwrap_or_else(|_| "<unserializable response>".to_string());
            return Err(DeployError::VersionBumpFailed {
                source: anyhow!("execution failed: {error}\nraw response: {payload}"),
            });
        }
        let bump_digest = outcome
            .digest
            .filter(|d| !d.is_empty())
            .ok_or_else(|| DeployError::VersionBumpFailed {
                source: anyhow!("version bump response carries no transaction digest"),
            })?;

        info!(digest = %bump_digest, "version marker updated");
        Ok(bump_digest)
    }
}
