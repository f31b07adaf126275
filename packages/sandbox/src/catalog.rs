// ABOUTME: Static per-provider preset catalogs loaded from embedded JSON manifests
// ABOUTME: Exposes presets, version history and the operator allow-list of user-visible presets

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::LazyLock;

use crate::error::{Result, SandboxError};
use crate::provider::{ProviderCapabilities, SandboxProvider};

/// Catalog built from the manifests compiled into this crate
pub static CATALOG: LazyLock<PresetCatalog> = LazyLock::new(|| {
    PresetCatalog::builtin().unwrap_or_else(|e| {
        panic!(
            "FATAL: Failed to load snapshot catalogs. \
             Check packages/sandbox/config/*-snapshots.json: {}",
            e
        )
    })
});

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogManifest {
    pub schema_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    pub presets: Vec<CatalogPreset>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogPreset {
    pub preset_id: String,
    pub label: String,
    pub cpu: String,
    pub memory: String,
    pub disk: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub versions: Vec<CatalogVersion>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogVersion {
    pub version: u32,
    pub snapshot_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_vmid: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captured_at: Option<String>,
}

/// User-facing resource tier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preset {
    /// Snapshot ID of the preset's latest version
    pub id: String,
    pub preset_id: String,
    pub label: String,
    pub cpu: String,
    pub memory: String,
    pub disk: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl CatalogPreset {
    pub fn latest_version(&self) -> Option<&CatalogVersion> {
        self.versions.iter().max_by_key(|v| v.version)
    }

    fn to_preset(&self) -> Option<Preset> {
        let latest = self.latest_version()?;
        Some(Preset {
            id: latest.snapshot_id.clone(),
            preset_id: self.preset_id.clone(),
            label: self.label.clone(),
            cpu: self.cpu.clone(),
            memory: self.memory.clone(),
            disk: self.disk.clone(),
            description: self.description.clone(),
        })
    }
}

fn builtin_manifest(provider: SandboxProvider) -> Option<&'static str> {
    match provider {
        SandboxProvider::Morph => Some(include_str!("../config/morph-snapshots.json")),
        SandboxProvider::PveLxc => Some(include_str!("../config/pve-lxc-snapshots.json")),
        SandboxProvider::PveVm => Some(include_str!("../config/pve-vm-snapshots.json")),
        SandboxProvider::Docker | SandboxProvider::Daytona | SandboxProvider::Other => None,
    }
}

/// Presets operators have approved for end users. New catalog entries stay
/// hidden until listed here.
fn visible_preset_ids(provider: SandboxProvider) -> &'static [&'static str] {
    match provider {
        SandboxProvider::Morph => &["4vcpu_16gb_48gb", "8vcpu_32gb_48gb"],
        SandboxProvider::PveLxc => &["4vcpu_6gb_32gb", "6vcpu_8gb_32gb"],
        SandboxProvider::PveVm => &[],
        SandboxProvider::Docker | SandboxProvider::Daytona | SandboxProvider::Other => &[],
    }
}

/// Narrow a full preset list to the operator allow-list, keeping catalog order
pub fn filter_visible_presets(provider: SandboxProvider, presets: Vec<Preset>) -> Vec<Preset> {
    let allowed = visible_preset_ids(provider);
    presets
        .into_iter()
        .filter(|preset| allowed.contains(&preset.preset_id.as_str()))
        .collect()
}

#[derive(Debug, Default)]
pub struct PresetCatalog {
    catalogs: HashMap<SandboxProvider, CatalogManifest>,
}

impl PresetCatalog {
    /// Load every provider manifest embedded at compile time
    pub fn builtin() -> Result<Self> {
        let mut manifests = HashMap::new();
        for provider in SandboxProvider::ALL {
            if let Some(raw) = builtin_manifest(provider) {
                let manifest: CatalogManifest = serde_json::from_str(raw).map_err(|e| {
                    SandboxError::Catalog(format!("{} manifest: {}", provider, e))
                })?;
                manifests.insert(provider, manifest);
            }
        }
        Self::from_manifests(manifests)
    }

    /// Build a catalog from an explicit provider map
    pub fn from_manifests(manifests: HashMap<SandboxProvider, CatalogManifest>) -> Result<Self> {
        for (provider, manifest) in &manifests {
            for preset in &manifest.presets {
                if preset.versions.is_empty() {
                    return Err(SandboxError::Catalog(format!(
                        "{} preset {} has no versions",
                        provider, preset.preset_id
                    )));
                }
                let mut seen = Vec::with_capacity(preset.versions.len());
                for version in &preset.versions {
                    if version.version == 0 || seen.contains(&version.version) {
                        return Err(SandboxError::Catalog(format!(
                            "{} preset {} has invalid or duplicate version {}",
                            provider, preset.preset_id, version.version
                        )));
                    }
                    seen.push(version.version);
                }
            }
        }

        Ok(Self {
            catalogs: manifests,
        })
    }

    /// Raw catalog entries for a provider (empty for providers without a catalog)
    pub fn entries(&self, provider: SandboxProvider) -> &[CatalogPreset] {
        self.catalogs
            .get(&provider)
            .map(|m| m.presets.as_slice())
            .unwrap_or(&[])
    }

    pub fn presets(&self, provider: SandboxProvider) -> Vec<Preset> {
        self.entries(provider)
            .iter()
            .filter_map(CatalogPreset::to_preset)
            .collect()
    }

    pub fn visible_presets(&self, provider: SandboxProvider) -> Vec<Preset> {
        filter_visible_presets(provider, self.presets(provider))
    }

    pub fn preset(&self, provider: SandboxProvider, preset_id: &str) -> Option<Preset> {
        self.find_entry(provider, preset_id)
            .and_then(CatalogPreset::to_preset)
    }

    /// First user-visible preset, used when a caller does not pick one
    pub fn default_preset(&self, provider: SandboxProvider) -> Option<Preset> {
        self.visible_presets(provider).into_iter().next()
    }

    pub fn latest_version(
        &self,
        provider: SandboxProvider,
        preset_id: &str,
    ) -> Option<&CatalogVersion> {
        self.find_entry(provider, preset_id)?.latest_version()
    }

    pub fn capabilities(&self, provider: SandboxProvider) -> ProviderCapabilities {
        provider.capabilities()
    }

    pub(crate) fn find_entry(
        &self,
        provider: SandboxProvider,
        preset_id: &str,
    ) -> Option<&CatalogPreset> {
        self.entries(provider)
            .iter()
            .find(|preset| preset.preset_id == preset_id)
    }
}
