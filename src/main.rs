//! Host group admin tool
//!
//! ## Usage
//!
//! ```bash
//! # Register a creator and some hosts
//! hostgroupctl add-principal admin "Admin"
//! hostgroupctl add-host h1 10.0.0.1:8080 --hostname worker-1
//!
//! # Manage groups
//! hostgroupctl create web --remark "frontend" --created-by admin --host h1 --host h2
//! hostgroupctl update <id> --remark "frontend v2" --host h1
//! hostgroupctl list --limit 20 --offset 0
//! hostgroupctl get --name web
//! hostgroupctl delete <id>
//!
//! # Resolve and pick
//! hostgroupctl hosts <id>
//! hostgroupctl pick <id>
//!
//! # Use another database
//! hostgroupctl --database /data/hostgroup.db list
//! ```
//!
//! Output is JSON on stdout; logs go to stderr (`RUST_LOG` overrides).

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use hostgroup::db::hosts::NewHost;
use hostgroup::{
    Config, Database, HostGroupResolver, HostGroupStore, PrincipalStore, SqlHostRegistry,
    WorkerSelector,
};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "hostgroupctl")]
#[command(about = "Manage scheduler host groups")]
struct Args {
    /// Path to config file
    #[arg(short, long, env = "HOSTGROUP_CONFIG")]
    config: Option<PathBuf>,

    /// SQLite database file (overrides config)
    #[arg(long, env = "HOSTGROUP_DATABASE")]
    database: Option<String>,

    /// Per-operation timeout in milliseconds (overrides config)
    #[arg(long)]
    timeout_ms: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a host group
    Create {
        name: String,
        #[arg(long, default_value = "")]
        remark: String,
        /// Principal id of the creator
        #[arg(long)]
        created_by: String,
        /// Member host id (repeatable)
        #[arg(long = "host")]
        hosts: Vec<String>,
    },
    /// Replace a group's remark and members
    Update {
        id: String,
        #[arg(long, default_value = "")]
        remark: String,
        #[arg(long = "host")]
        hosts: Vec<String>,
    },
    /// Delete a host group
    Delete { id: String },
    /// List host groups
    List {
        /// Page size; 0 lists everything
        #[arg(long, default_value_t = 0)]
        limit: i64,
        #[arg(long, default_value_t = 0)]
        offset: i64,
    },
    /// Show one host group
    Get {
        #[arg(long, conflicts_with = "name", required_unless_present = "name")]
        id: Option<String>,
        #[arg(long)]
        name: Option<String>,
    },
    /// Resolve a group's members to host records
    Hosts { id: String },
    /// Pick one worker from a group
    Pick {
        id: String,
        /// Seed for a reproducible pick
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Register or rename a principal
    AddPrincipal { id: String, name: String },
    /// Register or refresh a worker host
    AddHost {
        id: String,
        addr: String,
        #[arg(long, default_value = "")]
        hostname: String,
        #[arg(long, default_value = "")]
        version: String,
        #[arg(long, default_value = "")]
        remark: String,
        /// Mark the host offline
        #[arg(long)]
        offline: bool,
    },
    /// Remove a worker host
    RemoveHost { id: String },
    /// Show row counts
    Stats,
    /// Write the effective config to a file
    InitConfig {
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

#[derive(Serialize)]
struct Changed<'a> {
    id: &'a str,
    changed: bool,
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env().add_directive("hostgroup=info".parse()?))
        .init();

    let args = Args::parse();

    // Load config
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None if Config::config_path().exists() => Config::load(Config::config_path())?,
        None => Config::default(),
    };

    // Apply CLI overrides
    if let Some(database) = args.database {
        config.database_url = database;
    }
    if let Some(timeout_ms) = args.timeout_ms {
        config.query_timeout_ms = timeout_ms;
    }

    if let Command::InitConfig { path } = &args.command {
        let path = path.clone().unwrap_or_else(Config::config_path);
        config.save(&path)?;
        info!("Wrote config to {}", path.display());
        return Ok(());
    }

    let db = Database::open(&config).context("opening database")?;
    let store = HostGroupStore::new(db.clone()).with_time_format(config.time_format.clone());
    let principals = PrincipalStore::new(db.clone()).with_time_format(config.time_format.clone());
    let registry = SqlHostRegistry::new(db.clone()).with_time_format(config.time_format.clone());

    match args.command {
        Command::Create {
            name,
            remark,
            created_by,
            hosts,
        } => {
            let id = store.create(&name, &remark, &created_by, &hosts).await?;
            print_json(&store.get_by_id(&id).await?)?;
        }
        Command::Update { id, remark, hosts } => {
            let changed = store.update(&id, &remark, &hosts).await?;
            print_json(&Changed { id: &id, changed })?;
        }
        Command::Delete { id } => {
            let changed = store.delete(&id).await?;
            print_json(&Changed { id: &id, changed })?;
        }
        Command::List { limit, offset } => {
            print_json(&store.list(limit, offset).await?)?;
        }
        Command::Get { id, name } => {
            let group = match (id, name) {
                (Some(id), _) => store.get_by_id(&id).await?,
                (None, Some(name)) => store.get_by_name(&name).await?,
                (None, None) => bail!("either --id or --name is required"),
            };
            print_json(&group)?;
        }
        Command::Hosts { id } => {
            let resolver = HostGroupResolver::new(store, Arc::new(registry));
            print_json(&resolver.get_hosts_by_group_id(&id).await?)?;
        }
        Command::Pick { id, seed } => {
            let selector = match seed {
                Some(seed) => WorkerSelector::seeded(seed),
                None => WorkerSelector::default(),
            };
            let group = store.get_by_id(&id).await?;
            let host_id = selector.pick_host(&group)?;
            print_json(&serde_json::json!({ "hostgroup": group.id, "host": host_id }))?;
        }
        Command::AddPrincipal { id, name } => {
            principals.register(&id, &name).await?;
            print_json(&principals.get(&id).await?)?;
        }
        Command::AddHost {
            id,
            addr,
            hostname,
            version,
            remark,
            offline,
        } => {
            registry
                .register(NewHost {
                    id: id.clone(),
                    addr,
                    hostname,
                    version,
                    online: !offline,
                    remark,
                })
                .await?;
            print_json(&registry.get_by_ids(&[id]).await?)?;
        }
        Command::RemoveHost { id } => {
            let changed = registry.remove(&id).await?;
            print_json(&Changed { id: &id, changed })?;
        }
        Command::Stats => {
            print_json(&db.stats().await?)?;
        }
        // Written before the database was opened
        Command::InitConfig { .. } => {}
    }

    Ok(())
}
