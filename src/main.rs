//! Satisfactory Mod Manager (smm)

use clap::{Parser, Subcommand};
use smm::{
    DiskModCache, FicsitCatalog, Lockfile, LockfileDiff, Manifest, ModManager,
};
use std::path::Path;

#[derive(Parser)]
#[command(name = "smm")]
#[command(about = "Satisfactory mod manager", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Install a mod
    Install {
        /// Mod id
        id: String,
        /// Version constraint (defaults to any version)
        constraint: Option<String>,
    },
    /// Uninstall a mod
    Uninstall {
        /// Mod id
        id: String,
    },
    /// Update a mod to the newest version its constraint allows
    Update {
        /// Mod id
        id: String,
    },
    /// Bring the lockfile in line with the manifest
    Sync,
    /// List locked mods
    List,
}

fn print_diff(diff: &LockfileDiff) {
    for id in &diff.uninstall {
        println!("- {}", id);
    }
    for (id, version) in &diff.install {
        println!("+ {} {}", id, version);
    }
    if diff.is_empty() {
        println!("Nothing to do");
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let manifest_path = Path::new(smm::manifest::MANIFEST_FILE_NAME);
    let lockfile_path = Path::new(smm::lockfile::LOCKFILE_FILE_NAME);

    let manifest = Manifest::from_file(manifest_path)?;
    let lockfile = if lockfile_path.exists() {
        Lockfile::from_file(lockfile_path)?
    } else {
        Lockfile::new()
    };

    if let Commands::List = cli.command {
        for (id, locked) in lockfile.iter() {
            println!("{} {}", id, locked.version);
        }
        return Ok(());
    }

    let catalog = FicsitCatalog::new()?;
    let mod_cache = DiskModCache::new()?;
    let mut manager = ModManager::new(catalog, mod_cache, manifest, lockfile);

    let diff = match cli.command {
        Commands::Install { id, constraint } => {
            manager.install(&id, constraint.as_deref().unwrap_or("*"))?
        }
        Commands::Uninstall { id } => manager.uninstall(&id)?,
        Commands::Update { id } => manager.update(&id)?,
        Commands::Sync => manager.sync()?,
        Commands::List => unreachable!(),
    };

    print_diff(&diff);

    manager.manifest().to_file(manifest_path)?;
    manager.lockfile().to_file(lockfile_path)?;

    Ok(())
}
