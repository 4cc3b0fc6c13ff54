use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use grp_prefs::{config, db, warnings, Layout, PreferenceRecord, PrefsSnapshot, RecordStore, SetOutcome};
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(author, version, about = "Inspect and edit per-group bot preferences")]
struct Args {
    /// Storage root holding the GroupPrefs/ directory
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Path to the credentials INI file
    #[arg(long, default_value = config::DEFAULT_PATH)]
    credentials: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the bot's startup sequence and summarize every recovered group
    Check,
    /// Print every recovered group
    List {
        #[arg(long)]
        json: bool,
    },
    /// Print one group, creating its record if needed
    Show {
        #[arg(allow_hyphen_values = true)]
        group: String,
        #[arg(long)]
        json: bool,
    },
    /// Turn a content filter on or off
    SetFilter {
        #[arg(allow_hyphen_values = true)]
        group: String,
        filter: String,
        state: Toggle,
    },
    /// Set how many warnings a user gets before removal
    SetMaxWarn {
        #[arg(allow_hyphen_values = true)]
        group: String,
        #[arg(allow_hyphen_values = true)]
        value: String,
    },
    /// Warn a user in a group
    Warn {
        #[arg(allow_hyphen_values = true)]
        group: String,
        #[arg(allow_hyphen_values = true)]
        user_id: i64,
        #[arg(long)]
        reason: Option<String>,
    },
    /// Clear a user's warnings in a group
    ResetWarns {
        #[arg(allow_hyphen_values = true)]
        group: String,
        #[arg(allow_hyphen_values = true)]
        user_id: i64,
    },
    /// Print a credentials.ini template
    ExampleCredentials,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Toggle {
    On,
    Off,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let layout = Layout::new(&args.root);
    if !matches!(args.command, Command::ExampleCredentials) {
        layout
            .ensure()
            .with_context(|| format!("failed to prepare storage under {}", args.root.display()))?;
    }
    let store = RecordStore::new(layout.clone());

    match args.command {
        Command::Check => {
            let creds = config::load(Some(&args.credentials))?;
            info!(api_id = creds.api_id(), "credentials ok");
            let records = store.recover()?;
            for (id, mut record) in records {
                let snap = match record.snapshot() {
                    Ok(snap) => snap,
                    Err(err) => {
                        warn!(group = %id, %err, "group record has invalid fields");
                        continue;
                    }
                };
                match warnings::open_store(&mut record).await {
                    Ok(pool) => {
                        pool.close().await;
                        info!(group = %id, "warning store ok");
                    }
                    Err(err) => {
                        warn!(group = %id, ?err, "warning store unavailable");
                        continue;
                    }
                }
                println!("{}", summary(&snap));
            }
        }
        Command::List { json } => {
            let snaps = store.snapshots()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&snaps)?);
            } else {
                for snap in &snaps {
                    println!("{}", summary(snap));
                }
            }
        }
        Command::Show { group, json } => {
            let snap = PreferenceRecord::open_or_create(&layout, &group)?.snapshot()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&snap)?);
            } else {
                println!("{}", summary(&snap));
            }
        }
        Command::SetFilter {
            group,
            filter,
            state,
        } => {
            let mut record = PreferenceRecord::open_or_create(&layout, &group)?;
            let enabled = matches!(state, Toggle::On);
            match record.set_filter_by_name(&filter, enabled)? {
                SetOutcome::UnknownFilter => {
                    warn!(%filter, "unknown filter");
                    bail!("unknown filter {filter}, expected LOCK_LINK or LOCK_FORWARD");
                }
                outcome => println!("{}: {} -> {}", outcome.as_str(), filter, enabled),
            }
        }
        Command::SetMaxWarn { group, value } => {
            let mut record = PreferenceRecord::open_or_create(&layout, &group)?;
            match record.set_max_warn(&value)? {
                SetOutcome::Applied => println!("max_warn = {}", record.max_warn()?),
                _ => bail!("max_warn must be a positive integer, got {value:?}"),
            }
        }
        Command::Warn {
            group,
            user_id,
            reason,
        } => {
            let mut record = PreferenceRecord::open_or_create(&layout, &group)?;
            let pool = warnings::open_store(&mut record).await?;
            let outcome = warnings::warn_user(&mut record, &pool, user_id, reason.as_deref()).await?;
            if outcome.limit_reached {
                println!("user {user_id}: {}/{} warnings, limit reached", outcome.count, outcome.limit);
            } else {
                println!("user {user_id}: {}/{} warnings", outcome.count, outcome.limit);
            }
            pool.close().await;
        }
        Command::ResetWarns { group, user_id } => {
            let mut record = PreferenceRecord::open_or_create(&layout, &group)?;
            let pool = warnings::open_store(&mut record).await?;
            let removed = db::reset_warns(&pool, user_id).await?;
            println!("user {user_id}: removed {removed} warnings");
            pool.close().await;
        }
        Command::ExampleCredentials => print!("{}", config::example()),
    }

    Ok(())
}

fn summary(snap: &PrefsSnapshot) -> String {
    let filters: Vec<String> = snap
        .filters
        .iter()
        .map(|(name, on)| format!("{}={}", name, if *on { "on" } else { "off" }))
        .collect();
    format!(
        "{} ({}) max_warn={} db={} {}",
        snap.group_id,
        snap.name,
        snap.max_warn,
        snap.warn_db_path,
        filters.join(" ")
    )
}
