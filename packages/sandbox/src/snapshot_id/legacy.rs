// ABOUTME: Adapter for pre-versioning `pve_{preset}_{vmid}` snapshot IDs
// ABOUTME: Only consulted after canonical parsing fails; delete once historical records are backfilled

use regex::Regex;
use std::sync::LazyLock;

use super::{ParsedSnapshotId, SnapshotIdFormat};
use crate::provider::SandboxProvider;

static LEGACY_PVE_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^pve_(\d+vcpu_\d+gb_\d+gb)_(\d+)$").expect("legacy snapshot ID pattern is valid")
});

/// Legacy IDs recorded only the clone-source VM, so they are always
/// pve-lxc at version 1.
pub(super) fn parse_legacy(id: &str) -> Option<ParsedSnapshotId> {
    let caps = LEGACY_PVE_ID.captures(id)?;
    let template_vmid: u32 = caps[2].parse().ok()?;

    Some(ParsedSnapshotId {
        provider: SandboxProvider::PveLxc,
        preset_id: caps[1].to_string(),
        version: 1,
        template_vmid: Some(template_vmid),
        format: SnapshotIdFormat::Legacy,
    })
}
