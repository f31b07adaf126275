// ABOUTME: Table and colour formatting for CLI output
// ABOUTME: Keeps rendering separate from the commands so it can be tested without a terminal

use chrono::{DateTime, Utc};
use colored::*;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, ContentArrangement, Table};
use devbox_sandbox::{Instance, InstanceStatus, Preset, SnapshotVersionWithStatus};

pub fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(header);
    table
}

pub fn format_time(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M").to_string()
}

pub fn format_optional_time(ts: Option<DateTime<Utc>>) -> String {
    ts.map(format_time).unwrap_or_else(|| "-".to_string())
}

pub fn status_label(status: InstanceStatus) -> ColoredString {
    match status {
        InstanceStatus::Running => status.as_str().green(),
        InstanceStatus::Starting | InstanceStatus::Stopping => status.as_str().yellow(),
        InstanceStatus::Paused | InstanceStatus::Stopped => status.as_str().blue(),
        InstanceStatus::Error => status.as_str().red(),
        InstanceStatus::Archived | InstanceStatus::Unknown => status.as_str().dimmed(),
    }
}

pub fn presets_table(presets: &[Preset]) -> Table {
    let mut table = new_table(vec!["Preset", "Label", "CPU", "Memory", "Disk", "Latest snapshot"]);
    for preset in presets {
        table.add_row(vec![
            preset.preset_id.as_str(),
            preset.label.as_str(),
            preset.cpu.as_str(),
            preset.memory.as_str(),
            preset.disk.as_str(),
            preset.id.as_str(),
        ]);
    }
    table
}

pub fn versions_table(versions: &[SnapshotVersionWithStatus]) -> Table {
    let mut table = new_table(vec!["Version", "Snapshot", "Provider", "Label", "Created", "Active"]);
    for entry in versions {
        let v = &entry.version;
        table.add_row(vec![
            format!("v{}", v.version),
            v.snapshot_id.clone(),
            v.provider.to_string(),
            v.label.clone().unwrap_or_default(),
            format!("{} by {}", format_time(v.created_at), v.created_by),
            if entry.is_active { "●".to_string() } else { String::new() },
        ]);
    }
    table
}

pub fn instances_table(instances: &[Instance]) -> Table {
    let mut table = new_table(vec![
        "Instance",
        "Sandbox",
        "Name",
        "Status",
        "Created",
        "Last access",
        "Stopped",
    ]);
    for instance in instances {
        table.add_row(vec![
            instance.instance_id.clone(),
            instance.provider_sandbox_id.clone(),
            instance.name.clone().unwrap_or_default(),
            status_label(instance.status).to_string(),
            format_time(instance.created_at),
            format_optional_time(instance.last_accessed_at),
            format_optional_time(instance.stopped_at),
        ]);
    }
    table
}
