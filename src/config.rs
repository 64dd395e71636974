//! Per-network deployment configuration.
//!
//! Object identifiers that gate upgrades (the deployed package, its upgrade
//! capability, the admin capability and the shared version marker) differ
//! per network and used to live as constants at the top of each script.
//! [`NetworkConfig`] gathers them into one value, loaded once at run start
//! from a JSON file or the environment and immutable afterward.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

/// Target ledger network.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Testnet,
    Mainnet,
    Devnet,
    Localnet,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Testnet => "testnet",
            Network::Mainnet => "mainnet",
            Network::Devnet => "devnet",
            Network::Localnet => "localnet",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "testnet" => Ok(Network::Testnet),
            "mainnet" => Ok(Network::Mainnet),
            "devnet" => Ok(Network::Devnet),
            "localnet" => Ok(Network::Localnet),
            other => Err(anyhow!("unknown network {other:?}")),
        }
    }
}

/// Deployment configuration for one network. Publish runs need only the
/// network and reports directory; upgrade runs need all four object ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConfig {
    pub network: Network,
    /// Currently deployed package (upgrade runs only).
    #[serde(default)]
    pub package_id: Option<String>,
    /// `0x2::package::UpgradeCap` for the deployed package.
    #[serde(default)]
    pub upgrade_cap: Option<String>,
    /// Admin capability gating the version bump.
    #[serde(default)]
    pub admin_cap: Option<String>,
    /// Shared version-marker object.
    #[serde(default)]
    pub version_object: Option<String>,
    /// Directory deployment reports are written under.
    #[serde(default = "default_reports_dir")]
    pub reports_dir: PathBuf,
}

fn default_reports_dir() -> PathBuf {
    PathBuf::from("reports")
}

impl NetworkConfig {
    pub fn new(network: Network) -> Self {
        Self {
            network,
            package_id: None,
            upgrade_cap: None,
            admin_cap: None,
            version_object: None,
            reports_dir: default_reports_dir(),
        }
    }

    /// Load from a JSON file matching this struct's shape.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("read network config {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("parse network config {}", path.display()))
    }

    /// Load from the environment: `NETWORK` (defaults to testnet),
    /// `PACKAGE_ID`, `UPGRADE_CAP`, `ADMIN_CAP`, `VERSION_OBJECT`,
    /// `REPORTS_DIR`.
    pub fn from_env() -> Result<Self> {
        let network = match env_opt("NETWORK") {
            Some(value) => value.parse()?,
            None => Network::default(),
        };
        Ok(Self {
            network,
            package_id: env_opt("PACKAGE_ID"),
            upgrade_cap: env_opt("UPGRADE_CAP"),
            admin_cap: env_opt("ADMIN_CAP"),
            version_object: env_opt("VERSION_OBJECT"),
            reports_dir: env_opt("REPORTS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(default_reports_dir),
        })
    }

    pub fn with_package_id(mut self, id: impl Into<String>) -> Self {
        self.package_id = Some(id.into());
        self
    }

    pub fn with_upgrade_cap(mut self, id: impl Into<String>) -> Self {
        self.upgrade_cap = Some(id.into());
        self
    }

    pub fn with_admin_cap(mut self, id: impl Into<String>) -> Self {
        self.admin_cap = Some(id.into());
        self
    }

    pub fn with_version_object(mut self, id: impl Into<String>) -> Self {
        self.version_object = Some(id.into());
        self
    }

    pub fn with_reports_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.reports_dir = dir.into();
        self
    }

    /// The four ids an upgrade run requires, or an error naming the first
    /// missing one.
    pub fn upgrade_ids(&self) -> Result<UpgradeIds<'_>> {
        Ok(UpgradeIds {
            package_id: self.require(&self.package_id, "packageId")?,
            upgrade_cap: self.require(&self.upgrade_cap, "upgradeCap")?,
            admin_cap: self.require(&self.admin_cap, "adminCap")?,
            version_object: self.require(&self.version_object, "versionObject")?,
        })
    }

    fn require<'a>(&self, field: &'a Option<String>, name: &str) -> Result<&'a str> {
        field.as_deref().ok_or_else(|| {
            anyhow!(
                "network config for {} is missing {name}, required for upgrades",
                self.network
            )
        })
    }
}

/// Borrowed view of the upgrade-relevant object ids.
#[derive(Debug, Clone, Copy)]
pub struct UpgradeIds<'a> {
    pub package_id: &'a str,
    pub upgrade_cap: &'a str,
    pub admin_cap: &'a str,
    pub version_object: &'a str,
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
