// ─── CLI Commands ───
// Bridge between the parsed command line and the core managers.
// Listings are rendered to stdout; everything else reports through tracing.

use anyhow::{bail, Context};
use serde_json::Value;
use tracing::{info, warn};

use crate::cli::{
    Command, ConfigArgs, InstanceCommand, ListEntity, SnapshotCommand, StartArgs, UpgradeArgs,
    VersionCommand,
};
use crate::core::instance::{ConfigResolution, InstanceManager, StartOptions};
use crate::core::launch::SupervisorState;
use crate::core::registry::{Registry, SnapshotRecord};
use crate::core::state::AppState;

/// Run one command against the loaded state.
pub async fn execute(state: &mut AppState, command: Command) -> anyhow::Result<()> {
    match command {
        Command::List { entity } => {
            print!("{}", render_list(&state.registry, entity));
            Ok(())
        }
        Command::Download(args) | Command::Version { action: VersionCommand::Download(args) } => {
            download_version(state, &args.version).await
        }
        Command::Version { action: VersionCommand::Prune } => {
            state.versions.prune(&mut state.registry)?;
            Ok(())
        }
        Command::Version { action: VersionCommand::Remove(args) } => {
            state.versions.remove_version(&mut state.registry, &args.version)?;
            Ok(())
        }
        Command::Create(args) | Command::Instance { action: InstanceCommand::Create(args) } => {
            state
                .instances
                .create(&mut state.registry, &args.instance, &args.version)
                .await?;
            Ok(())
        }
        Command::Start(args) | Command::Instance { action: InstanceCommand::Start(args) } => {
            start(state, args).await
        }
        Command::Remove(args) | Command::Instance { action: InstanceCommand::Remove(args) } => {
            state.instances.remove(&mut state.registry, &args.instance)?;
            Ok(())
        }
        Command::Copy(args) | Command::Instance { action: InstanceCommand::Copy(args) } => {
            state
                .instances
                .copy(&mut state.registry, &args.instance, &args.new_name)?;
            Ok(())
        }
        Command::Edit(args) | Command::Instance { action: InstanceCommand::Edit(args) } => {
            state
                .instances
                .edit(&state.registry, &args.instance, &args.file)
                .await?;
            Ok(())
        }
        Command::Upgrade(args) | Command::Instance { action: InstanceCommand::Upgrade(args) } => {
            upgrade(state, args).await
        }
        Command::Instance { action: InstanceCommand::Link(args) } => {
            let linked = state
                .instances
                .link(&mut state.registry, &args.instance)
                .await?;
            info!("{} files of instance {} are now links", linked, args.instance);
            Ok(())
        }
        Command::Snapshot { action } => snapshot(state, action).await,
        Command::Config(args) => config(&mut state.registry, args),
    }
}

// ── Versions ────────────────────────────────────────

async fn download_version(state: &mut AppState, version: &str) -> anyhow::Result<()> {
    if state.versions.has_version(&state.registry, version) {
        info!("Version {} is already downloaded", version);
        return Ok(());
    }
    state.versions.download(&mut state.registry, version).await?;
    Ok(())
}

// ── Instances ───────────────────────────────────────

async fn start(state: &mut AppState, args: StartArgs) -> anyhow::Result<()> {
    let Some(entity) = args.entity else {
        bail!("Nothing to start: give an instance name or a version");
    };
    let options = StartOptions {
        port: args.port,
        debug: args.debug,
        temp: args.temp,
    };

    let outcome = state
        .instances
        .start(&mut state.registry, &entity, options, interrupted())
        .await?;

    if outcome.state == SupervisorState::Killed {
        warn!("{} did not stop in time and was killed", entity);
    }
    Ok(())
}

/// Resolves on Ctrl-C. Never resolves if the handler cannot be installed.
async fn interrupted() {
    if tokio::signal::ctrl_c().await.is_err() {
        warn!("Cannot listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

async fn upgrade(state: &mut AppState, args: UpgradeArgs) -> anyhow::Result<()> {
    let report = state
        .instances
        .upgrade(
            &mut state.registry,
            &args.instance,
            &args.version,
            args.force,
            args.keepconf,
        )
        .await?;

    for (file, resolution) in &report.config_files {
        match resolution {
            ConfigResolution::KeptOld => info!("Kept old {file}, new one saved as {file}.new"),
            ConfigResolution::KeptNew => info!("Using new {file}, old one saved as {file}.orig"),
            ConfigResolution::Unchanged | ConfigResolution::Missing => {}
        }
    }
    info!(
        "Instance {} upgraded from {} to {}",
        args.instance, report.from, report.to
    );
    Ok(())
}

// ── Snapshots ───────────────────────────────────────

async fn snapshot(state: &mut AppState, action: SnapshotCommand) -> anyhow::Result<()> {
    match action {
        SnapshotCommand::Create(args) => {
            let record = state
                .snapshots
                .create(&mut state.registry, &args.instance)
                .await?;
            println!("{}", record.name);
        }
        SnapshotCommand::Restore(args) => {
            state
                .snapshots
                .restore(&mut state.registry, &args.name, args.overwrite)
                .await?;
        }
        SnapshotCommand::Remove(args) => {
            state.snapshots.remove(&mut state.registry, &args.name)?;
        }
    }
    Ok(())
}

// ── Preferences ─────────────────────────────────────

fn config(registry: &mut Registry, args: ConfigArgs) -> anyhow::Result<()> {
    match args.set {
        Some(raw) => {
            registry
                .set_preference(&args.key, parse_preference_value(&raw))
                .with_context(|| format!("Cannot set {}", args.key))?;
            registry.persist()?;
            info!("{} set to {}", args.key, raw);
        }
        None => {
            let value = registry
                .preference(&args.key)
                .with_context(|| format!("Unknown preference {}", args.key))?;
            println!("{}", render_preference(&value));
        }
    }
    Ok(())
}

/// JSON literal when the input is one (`true`, `42`, `["jar"]`), plain
/// string otherwise.
fn parse_preference_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn render_preference(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

// ── Listing ─────────────────────────────────────────

fn render_list(registry: &Registry, entity: ListEntity) -> String {
    match entity {
        ListEntity::Instances => render_instances(registry),
        ListEntity::Versions => render_versions(registry),
        ListEntity::Snapshots => render_snapshots(registry.snapshots()),
    }
}

fn render_instances(registry: &Registry) -> String {
    let mut out = String::new();
    for (version, names) in InstanceManager::grouped_by_version(registry) {
        out.push_str(&format!("{version}:\n"));
        for name in names {
            out.push_str(&format!("  - {name}\n"));
        }
    }
    out
}

fn render_versions(registry: &Registry) -> String {
    let mut versions = registry.versions().to_vec();
    versions.sort_by(|a, b| crate::core::version::compare_versions(a, b));
    versions.iter().map(|v| format!("{v}\n")).collect()
}

fn render_snapshots(snapshots: &[SnapshotRecord]) -> String {
    if snapshots.is_empty() {
        return String::new();
    }

    let header = ["Name", "Instance", "Version", "Date", "Format"];
    let rows: Vec<[String; 5]> = snapshots
        .iter()
        .map(|s| {
            [
                s.name.clone(),
                s.instance_name.clone(),
                s.version.clone(),
                s.date.format("%Y-%m-%d %H:%M:%S").to_string(),
                s.format.to_string(),
            ]
        })
        .collect();

    let mut widths = header.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    let line = |cells: &[&str]| -> String {
        let padded: Vec<String> = cells
            .iter()
            .zip(widths)
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect();
        format!("{}\n", padded.join(" | ").trim_end())
    };

    let mut out = line(&header);
    for row in &rows {
        let cells: Vec<&str> = row.iter().map(String::as_str).collect();
        out.push_str(&line(&cells));
    }
    out
}
