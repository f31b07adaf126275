// ABOUTME: Resolves a (snapshot ID, provider) pair to a concrete catalog version
// ABOUTME: Direct catalog match first, then the parsed preset/version (or legacy template VMID)

use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tracing::debug;

use crate::catalog::{CatalogPreset, CatalogVersion, PresetCatalog, CATALOG};
use crate::error::{Result, SandboxError};
use crate::provider::SandboxProvider;
use crate::snapshot_id::{parse_snapshot_id, ParsedSnapshotId, SnapshotIdFormat};

/// A snapshot ID pinned to a specific catalog version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedSnapshot {
    pub provider: SandboxProvider,
    pub preset_id: String,
    pub label: String,
    pub version: u32,
    /// Canonical ID from the catalog, which may differ from the requested (legacy) ID
    pub snapshot_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_vmid: Option<u32>,
}

impl ResolvedSnapshot {
    fn new(provider: SandboxProvider, preset: &CatalogPreset, version: &CatalogVersion) -> Self {
        Self {
            provider,
            preset_id: preset.preset_id.clone(),
            label: preset.label.clone(),
            version: version.version,
            snapshot_id: version.snapshot_id.clone(),
            template_vmid: version.template_vmid,
        }
    }
}

/// Pure lookup over a preset catalog; no I/O.
pub struct SnapshotResolver<'a> {
    catalog: &'a PresetCatalog,
}

impl SnapshotResolver<'static> {
    /// Resolver over the catalogs embedded in this crate
    pub fn builtin() -> Self {
        Self {
            catalog: LazyLock::force(&CATALOG),
        }
    }
}

impl<'a> SnapshotResolver<'a> {
    pub fn new(catalog: &'a PresetCatalog) -> Self {
        Self { catalog }
    }

    pub fn resolve(&self, snapshot_id: &str, provider: SandboxProvider) -> Result<ResolvedSnapshot> {
        let snapshot_id = snapshot_id.trim();
        if snapshot_id.is_empty() {
            return Err(SandboxError::Validation(
                "Snapshot ID must not be empty".to_string(),
            ));
        }

        let parsed = parse_snapshot_id(snapshot_id);

        // An ID that names its provider must only resolve on that provider
        if let Some(parsed) = &parsed {
            if parsed.provider != provider {
                return Err(SandboxError::ProviderMismatch {
                    snapshot_id: snapshot_id.to_string(),
                    embedded: parsed.provider,
                    requested: provider,
                });
            }
        }

        match provider {
            SandboxProvider::PveVm => Err(SandboxError::Unimplemented {
                provider,
                operation: "Snapshot resolution",
            }),
            SandboxProvider::Morph
            | SandboxProvider::PveLxc
            | SandboxProvider::Docker
            | SandboxProvider::Daytona
            | SandboxProvider::Other => self
                .find_direct(snapshot_id, provider)
                .or_else(|| {
                    parsed
                        .as_ref()
                        .and_then(|parsed| self.find_parsed(parsed, provider))
                })
                .ok_or_else(|| SandboxError::SnapshotNotFound {
                    snapshot_id: snapshot_id.to_string(),
                    provider,
                }),
        }
    }

    fn find_direct(&self, snapshot_id: &str, provider: SandboxProvider) -> Option<ResolvedSnapshot> {
        self.catalog.entries(provider).iter().find_map(|preset| {
            preset
                .versions
                .iter()
                .find(|v| v.snapshot_id == snapshot_id)
                .map(|v| ResolvedSnapshot::new(provider, preset, v))
        })
    }

    fn find_parsed(
        &self,
        parsed: &ParsedSnapshotId,
        provider: SandboxProvider,
    ) -> Option<ResolvedSnapshot> {
        let preset = self.catalog.find_entry(provider, &parsed.preset_id)?;

        // Legacy pve-lxc records only know the clone-source VM
        let version = match (parsed.format, parsed.template_vmid) {
            (SnapshotIdFormat::Legacy, Some(vmid)) => preset
                .versions
                .iter()
                .find(|v| v.template_vmid == Some(vmid)),
            _ => preset.versions.iter().find(|v| v.version == parsed.version),
        }?;

        debug!(
            requested = %parsed.preset_id,
            resolved = %version.snapshot_id,
            %provider,
            "Resolved snapshot through parsed fallback"
        );
        Some(ResolvedSnapshot::new(provider, preset, version))
    }
}
