// ABOUTME: CLI commands over the embedded preset catalogs (no database needed)
// ABOUTME: Lists presets, resolves snapshot IDs against a provider and explains ID structure

use anyhow::Result;
use colored::*;
use devbox_sandbox::{parse_snapshot_id, SandboxProvider, SnapshotResolver, CATALOG};

pub fn presets_cmd(provider: SandboxProvider, all: bool, json: bool) -> Result<()> {
    let presets = if all {
        CATALOG.presets(provider)
    } else {
        CATALOG.visible_presets(provider)
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&presets)?);
        return Ok(());
    }

    if presets.is_empty() {
        println!("{}", format!("No presets available for {}", provider).yellow());
        return Ok(());
    }

    println!("{} {}", "Presets for".blue().bold(), provider.to_string().bold());
    println!();
    println!("{}", devbox_cli::output::presets_table(&presets));

    let caps = CATALOG.capabilities(provider);
    println!();
    println!(
        "{} hibernate={} snapshots={} resize={} nestedVirt={} gpu={}",
        "Capabilities:".dimmed(),
        caps.hibernate,
        caps.snapshots,
        caps.resize,
        caps.nested_virt,
        caps.gpu
    );
    if let Some(default) = CATALOG.default_preset(provider) {
        println!("{} {}", "Default:".dimmed(), default.preset_id);
    }

    Ok(())
}

pub fn resolve_cmd(snapshot_id: &str, provider: SandboxProvider, json: bool) -> Result<()> {
    let resolved = SnapshotResolver::builtin().resolve(snapshot_id, provider)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&resolved)?);
        return Ok(());
    }

    println!("{} {}", "✓".green(), resolved.snapshot_id.bold());
    println!("  Provider: {}", resolved.provider);
    println!("  Preset:   {} ({})", resolved.preset_id, resolved.label);
    println!("  Version:  v{}", resolved.version);
    if let Some(vmid) = resolved.template_vmid {
        println!("  Template: {}", vmid);
    }

    Ok(())
}

pub fn parse_cmd(snapshot_id: &str, json: bool) -> Result<()> {
    let Some(parsed) = parse_snapshot_id(snapshot_id.trim()) else {
        anyhow::bail!("'{}' is not a recognised snapshot ID", snapshot_id);
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&parsed)?);
        return Ok(());
    }

    println!("  Format:   {:?}", parsed.format);
    println!("  Provider: {}", parsed.provider);
    println!("  Preset:   {}", parsed.preset_id);
    println!("  Version:  v{}", parsed.version);
    if let Some(vmid) = parsed.template_vmid {
        println!("  Template: {}", vmid);
    }

    Ok(())
}
