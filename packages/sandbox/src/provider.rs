// ABOUTME: Virtualization backends a sandbox can run on and their static capability flags
// ABOUTME: Every provider branch in the crate matches exhaustively on SandboxProvider

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::SandboxError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SandboxProvider {
    Morph,
    PveLxc,
    PveVm,
    Docker,
    Daytona,
    Other,
}

/// Static per-provider feature flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderCapabilities {
    pub hibernate: bool,
    pub snapshots: bool,
    pub resize: bool,
    pub nested_virt: bool,
    pub gpu: bool,
}

impl SandboxProvider {
    pub const ALL: [SandboxProvider; 6] = [
        Self::Morph,
        Self::PveLxc,
        Self::PveVm,
        Self::Docker,
        Self::Daytona,
        Self::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Morph => "morph",
            Self::PveLxc => "pve-lxc",
            Self::PveVm => "pve-vm",
            Self::Docker => "docker",
            Self::Daytona => "daytona",
            Self::Other => "other",
        }
    }

    /// Prefix used by canonical snapshot IDs, if the provider has versioned snapshots
    pub fn snapshot_prefix(&self) -> Option<&'static str> {
        match self {
            Self::Morph => Some("morph"),
            Self::PveLxc => Some("pvelxc"),
            Self::PveVm => Some("pvevm"),
            Self::Docker | Self::Daytona | Self::Other => None,
        }
    }

    pub fn from_snapshot_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "morph" => Some(Self::Morph),
            "pvelxc" => Some(Self::PveLxc),
            "pvevm" => Some(Self::PveVm),
            _ => None,
        }
    }

    pub fn capabilities(&self) -> ProviderCapabilities {
        match self {
            Self::Morph => ProviderCapabilities {
                hibernate: true,
                snapshots: true,
                resize: false,
                nested_virt: false,
                gpu: false,
            },
            Self::PveLxc => ProviderCapabilities {
                hibernate: false,
                snapshots: true,
                resize: true,
                nested_virt: false,
                gpu: false,
            },
            Self::PveVm => ProviderCapabilities {
                hibernate: true,
                snapshots: true,
                resize: true,
                nested_virt: true,
                gpu: true,
            },
            Self::Docker => ProviderCapabilities {
                hibernate: false,
                snapshots: false,
                resize: false,
                nested_virt: false,
                gpu: false,
            },
            Self::Daytona => ProviderCapabilities {
                hibernate: true,
                snapshots: true,
                resize: false,
                nested_virt: false,
                gpu: false,
            },
            Self::Other => ProviderCapabilities {
                hibernate: false,
                snapshots: false,
                resize: false,
                nested_virt: false,
                gpu: false,
            },
        }
    }
}

impl fmt::Display for SandboxProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SandboxProvider {
    type Err = SandboxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "morph" => Ok(Self::Morph),
            "pve-lxc" | "pvelxc" => Ok(Self::PveLxc),
            "pve-vm" | "pvevm" => Ok(Self::PveVm),
            "docker" => Ok(Self::Docker),
            "daytona" => Ok(Self::Daytona),
            "other" => Ok(Self::Other),
            other => Err(SandboxError::Validation(format!(
                "Unknown sandbox provider: {}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_round_trip() {
        for provider in SandboxProvider::ALL {
            assert_eq!(provider.as_str().parse::<SandboxProvider>().unwrap(), provider);
            assert_eq!(provider.to_string(), provider.as_str());
        }
        assert!("e2b".parse::<SandboxProvider>().is_err());
    }

    #[test]
    fn test_serde_uses_kebab_case() {
        let json = serde_json::to_string(&SandboxProvider::PveLxc).unwrap();
        assert_eq!(json, "\"pve-lxc\"");
        let parsed: SandboxProvider = serde_json::from_str("\"pve-vm\"").unwrap();
        assert_eq!(parsed, SandboxProvider::PveVm);
    }

    #[test]
    fn test_prefix_mapping() {
        for provider in SandboxProvider::ALL {
            if let Some(prefix) = provider.snapshot_prefix() {
                assert_eq!(SandboxProvider::from_snapshot_prefix(prefix), Some(provider));
            }
        }
        assert_eq!(SandboxProvider::Docker.snapshot_prefix(), None);
        assert_eq!(SandboxProvider::from_snapshot_prefix("pve"), None);
    }

    #[test]
    fn test_capabilities() {
        assert!(SandboxProvider::PveVm.capabilities().nested_virt);
        assert!(SandboxProvider::Morph.capabilities().hibernate);
        assert!(!SandboxProvider::Docker.capabilities().snapshots);
    }
}
