//! End-to-end publish and upgrade runs against a scripted ledger client.

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::json;

use sui_deploy::ledger::Command;
use sui_deploy::{
    BuildArtifact, DeployError, LedgerClient, Network, NetworkConfig, Orchestrator,
    RawTransactionResponse, Step, TransactionPlan, TypedObjectRef, UpgradePolicy,
};

const PACKAGE_ID: &str = "0x0c27b8da5a304e5cc1862a664379e039584ab5dee0988ef4e54e53f7f5c6970b";
const NEW_PACKAGE_ID: &str = "0x92f41ab8a55eabef2f37b7a2a10de161d7f9ffd9cfaf8da1c3a28ed8bbdda3ae";

/// Ledger client returning pre-scripted responses in submission order.
struct ScriptedLedger {
    responses: Mutex<VecDeque<Result<RawTransactionResponse>>>,
    types: HashMap<String, String>,
    submitted: Mutex<Vec<TransactionPlan>>,
}

impl ScriptedLedger {
    fn new(responses: Vec<Result<RawTransactionResponse>>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            types: HashMap::new(),
            submitted: Mutex::new(Vec::new()),
        }
    }

    fn with_types(mut self, types: &[(&str, &str)]) -> Self {
        self.types = types
            .iter()
            .map(|(id, ty)| (id.to_string(), ty.to_string()))
            .collect();
        self
    }

    fn submitted_plans(&self) -> Vec<TransactionPlan> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl LedgerClient for ScriptedLedger {
    fn sender(&self) -> String {
        "0xsender".to_string()
    }

    async fn submit(&self, plan: TransactionPlan) -> Result<RawTransactionResponse> {
        self.submitted.lock().unwrap().push(plan);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(anyhow!("no scripted response left")))
    }

    async fn resolve_object_types(&self, ids: &[String]) -> Result<Vec<TypedObjectRef>> {
        Ok(ids
            .iter()
            .filter_map(|id| {
                self.types.get(id).map(|ty| TypedObjectRef {
                    object_id: id.clone(),
                    type_string: ty.clone(),
                })
            })
            .collect())
    }

    async fn wait_for_transaction(&self, _digest: &str) -> Result<()> {
        Ok(())
    }
}

fn artifact() -> BuildArtifact {
    BuildArtifact {
        modules: vec!["oRzrCwYAAAA=".to_string()],
        dependencies: vec!["0x1".to_string(), "0x2".to_string()],
        digest: vec![0xde, 0xad, 0xbe, 0xef],
    }
}

fn publish_config(dir: &Path) -> NetworkConfig {
    NetworkConfig::new(Network::Testnet).with_reports_dir(dir)
}

fn upgrade_config(dir: &Path) -> NetworkConfig {
    publish_config(dir)
        .with_package_id(PACKAGE_ID)
        .with_upgrade_cap("0x6b8167c5eef9db73")
        .with_admin_cap("0xf7f83fa7f90bf4bc")
        .with_version_object("0xcbebec478bfa2556")
}

/// Legacy-generation response: created objects as bare references, gas as
/// strings, no inline types.
fn legacy_publish_response() -> RawTransactionResponse {
    serde_json::from_value(json!({
        "digest": "9gG1yrAtcCpYHDxpSGr4wKKiDHGk2BguyXnAG35tpADj",
        "effects": {
            "status": { "status": "success" },
            "gasUsed": {
                "computationCost": "1000000",
                "storageCost": "3000000",
                "storageRebate": "500000",
                "nonRefundableStorageFee": "10000"
            },
            "created": [
                { "reference": { "objectId": "0xaaa1", "version": 1, "digest": "d1" } },
                { "reference": { "objectId": "0xaaa2", "version": 1, "digest": "d2" } },
                { "reference": { "objectId": "0xaaa3", "version": 1, "digest": "d3" } }
            ]
        }
    }))
    .unwrap()
}

/// Modern-generation response: objectChanges carry types inline.
fn modern_upgrade_response() -> RawTransactionResponse {
    serde_json::from_value(json!({
        "digest": "7kD2wqXtbBnXGCwoRFq3vJJhCGFj1AftxWmZF24soZCi",
        "effects": {
            "status": { "status": "success" },
            "gasUsed": {
                "computationCost": 2000000,
                "storageCost": 6000000,
                "storageRebate": 9000000,
                "nonRefundableStorageFee": 90000
            }
        },
        "objectChanges": [
            { "type": "published", "packageId": NEW_PACKAGE_ID, "version": "2" },
            { "type": "mutated", "objectId": "0x6b8167c5eef9db73" }
        ]
    }))
    .unwrap()
}

fn bump_ok_response() -> RawTransactionResponse {
    serde_json::from_value(json!({
        "digest": "BumpDigest1111111111",
        "effects": { "status": { "status": "success" } }
    }))
    .unwrap()
}

fn bump_error_response() -> RawTransactionResponse {
    serde_json::from_value(json!({
        "digest": "BumpDigest2222222222",
        "effects": {
            "status": { "status": "failure", "error": "MoveAbort(2) in version::update" }
        }
    }))
    .unwrap()
}

fn report_files(dir: &Path) -> Vec<std::path::PathBuf> {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries.map(|e| e.unwrap().path()).collect(),
        Err(_) => Vec::new(),
    }
}

#[tokio::test]
async fn publish_resolves_legacy_effects_into_a_report() {
    let dir = tempfile::tempdir().unwrap();
    let client = ScriptedLedger::new(vec![Ok(legacy_publish_response())]).with_types(&[
        ("0xaaa1", "package"),
        ("0xaaa2", "0x2::package::UpgradeCap"),
        ("0xaaa3", "0x2::display::Display<0xbeef::item::Item>"),
    ]);
    let orchestrator = Orchestrator::new(client, publish_config(dir.path()));

    let outcome = orchestrator.publish(&artifact()).await.unwrap();

    assert_eq!(outcome.report.labels.get("package"), Some("0xaaa1"));
    assert_eq!(
        outcome.report.labels.get("package::UpgradeCap"),
        Some("0xaaa2")
    );
    assert_eq!(
        outcome.report.labels.get("Display<item::Item>"),
        Some("0xaaa3")
    );
    // 1000000 + 3000000 - 500000 + 10000 MIST
    assert_eq!(outcome.report.gas, "0.00351");
    assert!(outcome.report.previous_package.is_none());
    assert!(outcome.bump_digest.is_none());
    assert!(outcome.report_path.exists());
    assert!(outcome
        .report_path
        .file_name()
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("publish_testnet_"));
}

#[tokio::test]
async fn publish_transport_error_never_reaches_confirm() {
    let dir = tempfile::tempdir().unwrap();
    let client = ScriptedLedger::new(vec![Err(anyhow!("connection reset by peer"))]);
    let orchestrator = Orchestrator::new(client, publish_config(dir.path()));

    let err = orchestrator.publish(&artifact()).await.unwrap_err();

    match err {
        DeployError::PublishFailed { step, source } => {
            assert_eq!(step, Step::Submit);
            assert!(source.to_string().contains("connection reset"));
        }
        other => panic!("expected PublishFailed at submit, got {other:?}"),
    }
    assert!(report_files(dir.path()).is_empty());
}

#[tokio::test]
async fn publish_missing_digest_is_a_confirm_failure() {
    // Success-shaped response without a digest: the collaborator's error
    // signaling is inconsistent, so the orchestrator must not trust it.
    let dir = tempfile::tempdir().unwrap();
    let response: RawTransactionResponse =
        serde_json::from_value(json!({ "effects": { "status": { "status": "success" } } }))
            .unwrap();
    let client = ScriptedLedger::new(vec![Ok(response)]);
    let orchestrator = Orchestrator::new(client, publish_config(dir.path()));

    let err = orchestrator.publish(&artifact()).await.unwrap_err();
    assert!(matches!(
        err,
        DeployError::PublishFailed {
            step: Step::Confirm,
            ..
        }
    ));
    assert!(report_files(dir.path()).is_empty());
}

#[tokio::test]
async fn publish_execution_failure_is_a_confirm_failure() {
    let dir = tempfile::tempdir().unwrap();
    let response: RawTransactionResponse = serde_json::from_value(json!({
        "digest": "D",
        "effects": { "status": { "status": "failure", "error": "InsufficientGas" } }
    }))
    .unwrap();
    let client = ScriptedLedger::new(vec![Ok(response)]);
    let orchestrator = Orchestrator::new(client, publish_config(dir.path()));

    let err = orchestrator.publish(&artifact()).await.unwrap_err();
    match err {
        DeployError::PublishFailed { step, source } => {
            assert_eq!(step, Step::Confirm);
            assert!(source.to_string().contains("InsufficientGas"));
        }
        other => panic!("expected PublishFailed at confirm, got {other:?}"),
    }
    assert!(report_files(dir.path()).is_empty());
}

#[tokio::test]
async fn upgrade_publishes_report_and_bumps_version() {
    let dir = tempfile::tempdir().unwrap();
    let client = ScriptedLedger::new(vec![Ok(modern_upgrade_response()), Ok(bump_ok_response())]);
    let orchestrator = Orchestrator::new(client, upgrade_config(dir.path()));

    let outcome = orchestrator
        .upgrade(&artifact(), UpgradePolicy::Compatible)
        .await
        .unwrap();

    assert_eq!(outcome.report.previous_package.as_deref(), Some(PACKAGE_ID));
    assert_eq!(outcome.report.labels.get("package"), Some(NEW_PACKAGE_ID));
    // Rebate exceeds the fresh costs: negative net gas, not clamped.
    assert_eq!(outcome.report.gas, "-0.00091");
    assert_eq!(outcome.bump_digest.as_deref(), Some("BumpDigest1111111111"));
    assert!(outcome
        .report_path
        .file_name()
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("upgrade_testnet_"));
}

#[tokio::test]
async fn upgrade_bump_targets_the_new_package() {
    let dir = tempfile::tempdir().unwrap();
    let client = ScriptedLedger::new(vec![Ok(modern_upgrade_response()), Ok(bump_ok_response())]);
    let orchestrator = Orchestrator::new(client, upgrade_config(dir.path()));

    orchestrator
        .upgrade(&artifact(), UpgradePolicy::Compatible)
        .await
        .unwrap();

    let plans = orchestrator.client().submitted_plans();
    assert_eq!(plans.len(), 2);

    // First plan: authorize -> upgrade -> commit in one transaction.
    let kinds: Vec<&str> = plans[0]
        .commands
        .iter()
        .map(|command| match command {
            Command::MoveCall { function, .. } => function.as_str(),
            Command::Upgrade { .. } => "upgrade",
            Command::Publish { .. } => "publish",
            Command::TransferObjects { .. } => "transfer",
        })
        .collect();
    assert_eq!(kinds, vec!["authorize_upgrade", "upgrade", "commit_upgrade"]);

    // Second plan: version bump against the package id learned at confirm.
    match &plans[1].commands[0] {
        Command::MoveCall {
            package,
            module,
            function,
            ..
        } => {
            assert_eq!(package, NEW_PACKAGE_ID);
            assert_eq!(module, "version");
            assert_eq!(function, "update");
        }
        other => panic!("expected version-bump MoveCall, got {other:?}"),
    }
}

#[tokio::test]
async fn failed_bump_leaves_publish_level_report_only() {
    let dir = tempfile::tempdir().unwrap();
    let client =
        ScriptedLedger::new(vec![Ok(modern_upgrade_response()), Ok(bump_error_response())]);
    let orchestrator = Orchestrator::new(client, upgrade_config(dir.path()));

    let err = orchestrator
        .upgrade(&artifact(), UpgradePolicy::Compatible)
        .await
        .unwrap_err();

    match &err {
        DeployError::VersionBumpFailed { source } => {
            let rendered = format!("{source:#}");
            assert!(rendered.contains("MoveAbort(2)"));
            // Full raw payload attached for operator diagnosis.
            assert!(rendered.contains("\"status\": \"failure\""));
        }
        other => panic!("expected VersionBumpFailed, got {other:?}"),
    }

    // Confirm succeeded, so the upgrade report exists; it records only
    // publish-level fields, never a fabricated bump digest.
    let files = report_files(dir.path());
    assert_eq!(files.len(), 1);
    let body = std::fs::read_to_string(&files[0]).unwrap();
    assert!(body.contains(NEW_PACKAGE_ID));
    assert!(body.contains(&format!("\"previousPackage\": \"{PACKAGE_ID}\"")));
    assert!(!body.contains("BumpDigest"));
}

#[tokio::test]
async fn upgrade_without_config_ids_fails_before_any_submission() {
    let dir = tempfile::tempdir().unwrap();
    let client = ScriptedLedger::new(vec![]);
    let orchestrator = Orchestrator::new(client, publish_config(dir.path()));

    let err = orchestrator
        .upgrade(&artifact(), UpgradePolicy::Compatible)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        DeployError::UpgradeFailed {
            step: Step::Build,
            ..
        }
    ));
    assert!(orchestrator.client().submitted_plans().is_empty());
    assert!(report_files(dir.path()).is_empty());
}

#[tokio::test]
async fn repeat_runs_never_overwrite_reports() {
    let dir = tempfile::tempdir().unwrap();

    for digest in ["DigestAAAAAAA", "DigestBBBBBBB"] {
        let mut response = legacy_publish_response();
        response.digest = Some(digest.to_string());
        let client = ScriptedLedger::new(vec![Ok(response)]).with_types(&[("0xaaa1", "package")]);
        let orchestrator = Orchestrator::new(client, publish_config(dir.path()));
        orchestrator.publish(&artifact()).await.unwrap();
    }

    assert_eq!(report_files(dir.path()).len(), 2);
}
