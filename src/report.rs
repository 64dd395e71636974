//! Deployment report persistence.
//!
//! Each successful run produces one [`DeploymentReport`], written once and
//! never mutated. The store is append-only history: no update, no delete,
//! and an existing artifact is never overwritten. Artifact names encode the
//! run kind, network, timestamp and a digest prefix, so concurrent runs
//! against the same network need no coordination beyond the filesystem.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::Network;
use crate::error::DeployError;
use crate::resolver::LabelMap;

/// Durable record of one publish or upgrade run: the local address book
/// later scripts read object identifiers from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentReport {
    pub network: Network,
    /// Digest of the publish/upgrade transaction.
    pub digest: String,
    /// Net gas cost in SUI, exact decimal.
    pub gas: String,
    /// Package replaced by this run (upgrade runs only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_package: Option<String>,
    /// Label -> object id, in first-seen creation order.
    pub labels: LabelMap,
    pub timestamp: DateTime<Utc>,
}

impl DeploymentReport {
    /// `upgrade` when a previous package is recorded, `publish` otherwise.
    pub fn kind(&self) -> &'static str {
        if self.previous_package.is_some() {
            "upgrade"
        } else {
            "publish"
        }
    }
}

/// Append-only store of deployment reports under one directory.
#[derive(Debug, Clone)]
pub struct ReportStore {
    dir: PathBuf,
}

impl ReportStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write a new artifact and return its path.
    ///
    /// The timestamp plus digest prefix make collisions unexpected; should
    /// a file with the generated name exist anyway, a suffixed name is
    /// chosen instead of clobbering it.
    pub fn write(&self, report: &DeploymentReport) -> Result<PathBuf, DeployError> {
        fs::create_dir_all(&self.dir).map_err(|e| DeployError::ReportWriteFailed {
            path: self.dir.clone(),
            source: e,
        })?;

        let stem = file_stem(report);
        let mut path = self.dir.join(format!("{stem}.json"));
        let mut attempt = 1;
        let mut file = loop {
            match File::options().write(true).create_new(true).open(&path) {
                Ok(file) => break file,
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    path = self.dir.join(format!("{stem}-{attempt}.json"));
                    attempt += 1;
                }
                Err(e) => {
                    return Err(DeployError::ReportWriteFailed { path, source: e });
                }
            }
        };

        let write_failed = |path: &Path, source: std::io::Error| DeployError::ReportWriteFailed {
            path: path.to_path_buf(),
            source,
        };
        let body = serde_json::to_vec_pretty(report)
            .map_err(|e| write_failed(&path, e.into()))?;
        file.write_all(&body)
            .and_then(|_| file.write_all(b"\n"))
            .map_err(|e| write_failed(&path, e))?;

        info!(path = %path.display(), kind = report.kind(), "deployment report written");
        Ok(path)
    }
}

fn file_stem(report: &DeploymentReport) -> String {
    let timestamp = report
        .timestamp
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace(':', "-");
    format!(
        "{}_{}_{}_{}",
        report.kind(),
        report.network,
        timestamp,
        digest_prefix(&report.digest)
    )
}

/// First eight characters of the digest, enough to break same-second name
/// collisions between runs.
fn digest_prefix(digest: &str) -> String {
    digest.chars().take(8).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn report(digest: &str) -> DeploymentReport {
        let mut labels = LabelMap::new();
        labels.insert("package".to_string(), "0xbeef".to_string());
        labels.insert("admin::AdminCap".to_string(), "0xcafe".to_string());
        DeploymentReport {
            network: Network::Testnet,
            digest: digest.to_string(),
            gas: "0.00251".to_string(),
            previous_package: None,
            labels,
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 45).unwrap(),
        }
    }

    #[test]
    fn test_artifact_name_encodes_kind_network_timestamp_digest() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReportStore::new(dir.path());
        let path = store.write(&report("9gG1yrAtcCpYHDxp")).unwrap();

        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("publish_testnet_2024-03-01T12-30-45"));
        assert!(name.contains("9gG1yrAt"));
        assert!(name.ends_with(".json"));
    }

    #[test]
    fn test_upgrade_reports_are_named_upgrade() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReportStore::new(dir.path());
        let mut upgrade = report("DigestA");
        upgrade.previous_package = Some("0xolder".to_string());
        let path = store.write(&upgrade).unwrap();
        assert!(path
            .file_name()
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("upgrade_testnet_"));
    }

    #[test]
    fn test_same_second_runs_produce_distinct_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReportStore::new(dir.path());
        // Same network, same timestamp; digests differ.
        let first = store.write(&report("DigestAAAA")).unwrap();
        let second = store.write(&report("DigestBBBB")).unwrap();
        assert_ne!(first, second);
        assert!(first.exists());
        assert!(second.exists());
    }

    #[test]
    fn test_existing_artifact_is_never_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReportStore::new(dir.path());
        let first = store.write(&report("DigestAAAA")).unwrap();
        let original = fs::read_to_string(&first).unwrap();

        // Identical name inputs: the second write picks a suffixed name.
        let second = store.write(&report("DigestAAAA")).unwrap();
        assert_ne!(first, second);
        assert_eq!(fs::read_to_string(&first).unwrap(), original);
    }

    #[test]
    fn test_report_body_shape_and_label_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReportStore::new(dir.path());
        let path = store.write(&report("DigestAAAA")).unwrap();
        let body = fs::read_to_string(&path).unwrap();

        let value: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(value["network"], "testnet");
        assert_eq!(value["gas"], "0.00251");
        assert!(value.get("previousPackage").is_none());

        // Insertion order survives in the serialized text.
        let package_pos = body.find("\"package\"").unwrap();
        let admin_pos = body.find("\"admin::AdminCap\"").unwrap();
        assert!(package_pos < admin_pos);

        let back: DeploymentReport = serde_json::from_str(&body).unwrap();
        assert_eq!(back.labels.get("package"), Some("0xbeef"));
    }
}
