use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

/// xtool: manage local XWiki versions, instances and snapshots.
#[derive(Parser, Debug)]
#[command(name = "xtool", version, about)]
pub struct Cli {
    /// Verbose logs (-v for debug, -vv for trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Data directory (defaults to $XTOOL_HOME, then ~/.xtool).
    #[arg(long, global = true, value_name = "DIR")]
    pub home: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List instances, versions or snapshots.
    #[command(visible_alias = "l")]
    List {
        #[arg(value_enum)]
        entity: ListEntity,
    },

    /// Download a version.
    #[command(visible_alias = "d")]
    Download(VersionArgs),

    /// Create a new instance.
    #[command(visible_alias = "c")]
    Create(CreateArgs),

    /// Start an instance, or a new instance of a version.
    #[command(visible_alias = "s")]
    Start(StartArgs),

    /// Remove an instance.
    Remove(InstanceArgs),

    /// Copy an instance.
    Copy(CopyArgs),

    /// Edit a WEB-INF file of an instance.
    #[command(visible_alias = "e")]
    Edit(EditArgs),

    /// Upgrade an instance to another version.
    #[command(visible_alias = "u")]
    Upgrade(UpgradeArgs),

    /// View or change a preference.
    Config(ConfigArgs),

    /// Manage versions.
    #[command(visible_alias = "v")]
    Version {
        #[command(subcommand)]
        action: VersionCommand,
    },

    /// Manage instances.
    #[command(visible_alias = "i")]
    Instance {
        #[command(subcommand)]
        action: InstanceCommand,
    },

    /// Manage instance snapshots.
    #[command(visible_alias = "sp")]
    Snapshot {
        #[command(subcommand)]
        action: SnapshotCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum VersionCommand {
    /// Download a version.
    #[command(visible_alias = "d")]
    Download(VersionArgs),
    /// Remove every version no instance uses.
    Prune,
    /// Remove a version.
    Remove(VersionArgs),
}

#[derive(Subcommand, Debug)]
pub enum InstanceCommand {
    #[command(visible_alias = "c")]
    Create(CreateArgs),
    #[command(visible_alias = "s")]
    Start(StartArgs),
    Remove(InstanceArgs),
    Copy(CopyArgs),
    #[command(visible_alias = "e")]
    Edit(EditArgs),
    #[command(visible_alias = "u")]
    Upgrade(UpgradeArgs),
    /// Replace files identical to the version's with links.
    Link(InstanceArgs),
}

#[derive(Subcommand, Debug)]
pub enum SnapshotCommand {
    /// Snapshot an instance.
    #[command(visible_alias = "c")]
    Create(InstanceArgs),
    /// Restore a snapshot.
    #[command(visible_alias = "r")]
    Restore(RestoreArgs),
    /// Delete a snapshot.
    Remove(SnapshotArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListEntity {
    Instances,
    Versions,
    Snapshots,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// XWiki version, e.g. 15.10.4 or 16.0.0-SNAPSHOT.
    pub version: String,
}

#[derive(Args, Debug)]
pub struct InstanceArgs {
    pub instance: String,
}

#[derive(Args, Debug)]
pub struct SnapshotArgs {
    pub name: String,
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    pub instance: String,
    pub version: String,
}

#[derive(Args, Debug)]
pub struct StartArgs {
    /// Instance name, or a version to start a new instance of.
    pub entity: Option<String>,
    /// Use the debug start script.
    #[arg(short, long)]
    pub debug: bool,
    /// Port the instance listens on.
    #[arg(short, long)]
    pub port: Option<u16>,
    /// Remove the instance created for a version once it stops.
    #[arg(short, long)]
    pub temp: bool,
}

#[derive(Args, Debug)]
pub struct CopyArgs {
    pub instance: String,
    pub new_name: String,
}

#[derive(Args, Debug)]
pub struct EditArgs {
    pub instance: String,
    /// File under WEB-INF, e.g. xwiki.cfg.
    pub file: String,
}

#[derive(Args, Debug)]
pub struct UpgradeArgs {
    pub instance: String,
    pub version: String,
    /// Upgrade even if the target is not newer.
    #[arg(short, long)]
    pub force: bool,
    /// Keep the current configuration files.
    #[arg(short, long)]
    pub keepconf: bool,
}

#[derive(Args, Debug)]
pub struct RestoreArgs {
    pub name: String,
    /// Replace the instance if it exists.
    #[arg(short, long)]
    pub overwrite: bool,
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Preference name, e.g. snapshot-format.
    pub key: String,
    /// New value; JSON literals are accepted (true, ["jar","war"]).
    #[arg(short, long, value_name = "VALUE")]
    pub set: Option<String>,
}
