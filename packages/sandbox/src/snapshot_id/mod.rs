// ABOUTME: Parsing and formatting of snapshot identifiers
// ABOUTME: Canonical `{prefix}_{preset}_v{n}` IDs first, then the pre-versioning legacy shape

mod legacy;

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::provider::SandboxProvider;

static CANONICAL_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(morph|pvelxc|pvevm)_(\d+vcpu_\d+gb_\d+gb)_v(\d+)$")
        .expect("canonical snapshot ID pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotIdFormat {
    Canonical,
    Legacy,
}

/// Structured view of a snapshot ID
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedSnapshotId {
    pub provider: SandboxProvider,
    pub preset_id: String,
    pub version: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_vmid: Option<u32>,
    pub format: SnapshotIdFormat,
}

/// Parse a snapshot ID. Returns `None` for anything that is neither canonical nor legacy.
pub fn parse_snapshot_id(id: &str) -> Option<ParsedSnapshotId> {
    parse_canonical(id).or_else(|| legacy::parse_legacy(id))
}

fn parse_canonical(id: &str) -> Option<ParsedSnapshotId> {
    let caps = CANONICAL_ID.captures(id)?;
    let provider = SandboxProvider::from_snapshot_prefix(&caps[1])?;
    let version: u32 = caps[3].parse().ok()?;
    if version == 0 {
        return None;
    }

    Some(ParsedSnapshotId {
        provider,
        preset_id: caps[2].to_string(),
        version,
        template_vmid: None,
        format: SnapshotIdFormat::Canonical,
    })
}

/// Build the canonical ID for a preset version. `None` for providers without versioned snapshots.
pub fn format_snapshot_id(
    provider: SandboxProvider,
    preset_id: &str,
    version: u32,
) -> Option<String> {
    let prefix = provider.snapshot_prefix()?;
    Some(format!("{}_{}_v{}", prefix, preset_id, version))
}

/// Provider implied by an ID's shape, if it has one
pub fn infer_provider(snapshot_id: &str) -> Option<SandboxProvider> {
    parse_snapshot_id(snapshot_id).map(|parsed| parsed.provider)
}

/// Derive a preset ID like `4vcpu_16gb_48gb` from raw resources
pub fn preset_id_from_resources(vcpus: u32, memory_mib: u64, disk_mib: u64) -> String {
    let memory_gb = (memory_mib / 1024).max(1);
    let disk_gb = (disk_mib / 1024).max(1);
    format!("{}vcpu_{}gb_{}gb", vcpus, memory_gb, disk_gb)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_format_then_parse_every_prefix() {
        for provider in SandboxProvider::ALL {
            let Some(id) = format_snapshot_id(provider, "4vcpu_16gb_48gb", 7) else {
                continue;
            };
            let parsed = parse_snapshot_id(&id).unwrap();
            assert_eq!(parsed.provider, provider);
            assert_eq!(parsed.preset_id, "4vcpu_16gb_48gb");
            assert_eq!(parsed.version, 7);
            assert_eq!(parsed.template_vmid, None);
            assert_eq!(parsed.format, SnapshotIdFormat::Canonical);
        }
    }

    #[test]
    fn test_parse_legacy_pve_id() {
        let parsed = parse_snapshot_id("pve_4vcpu_6gb_32gb_9011").unwrap();
        assert_eq!(
            parsed,
            ParsedSnapshotId {
                provider: SandboxProvider::PveLxc,
                preset_id: "4vcpu_6gb_32gb".to_string(),
                version: 1,
                template_vmid: Some(9011),
                format: SnapshotIdFormat::Legacy,
            }
        );
    }

    #[test]
    fn test_canonical_wins_over_legacy() {
        let parsed = parse_snapshot_id("pvelxc_4vcpu_6gb_32gb_v3").unwrap();
        assert_eq!(parsed.format, SnapshotIdFormat::Canonical);
        assert_eq!(parsed.provider, SandboxProvider::PveLxc);
        assert_eq!(parsed.version, 3);
    }

    #[test]
    fn test_rejects_unrecognised_ids() {
        for id in [
            "",
            "snapshot_abc",
            "morph_4vcpu_16gb_48gb",
            "morph_4vcpu_16gb_48gb_v0",
            "docker_4vcpu_16gb_48gb_v1",
            "morph_4vcpu_16gb_48gb_v1 ",
            "pve_4vcpu_6gb_32gb_",
            "pve_standard_9011",
            "morph_4vcpu_16gb_48gb_v99999999999",
        ] {
            assert_eq!(parse_snapshot_id(id), None, "expected {:?} to be rejected", id);
        }
    }

    #[test]
    fn test_format_without_prefix() {
        assert_eq!(
            format_snapshot_id(SandboxProvider::Docker, "4vcpu_16gb_48gb", 1),
            None
        );
        assert_eq!(
            format_snapshot_id(SandboxProvider::PveVm, "2vcpu_4gb_32gb", 2).as_deref(),
            Some("pvevm_2vcpu_4gb_32gb_v2")
        );
    }

    #[test]
    fn test_infer_provider() {
        assert_eq!(
            infer_provider("morph_4vcpu_16gb_48gb_v1"),
            Some(SandboxProvider::Morph)
        );
        assert_eq!(
            infer_provider("pve_4vcpu_6gb_32gb_9011"),
            Some(SandboxProvider::PveLxc)
        );
        assert_eq!(infer_provider("snapshot_abc"), None);
    }

    #[test]
    fn test_preset_id_from_resources() {
        assert_eq!(preset_id_from_resources(4, 6144, 32768), "4vcpu_6gb_32gb");
        assert_eq!(preset_id_from_resources(2, 512, 100), "2vcpu_1gb_1gb");
    }
}
