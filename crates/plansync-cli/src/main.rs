mod config;
mod convert_cmd;
mod create_issue_cmd;
mod discover_cmd;
mod sync_cmd;
mod type_cache;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use config::PlansyncConfig;

#[derive(Parser)]
#[command(name = "plansync", about = "Compile work-breakdown outlines into GitHub issues")]
struct Cli {
    /// Path to the gh binary (overrides PLANSYNC_GH_BINARY env var)
    #[arg(long, global = true)]
    gh_binary: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a plansync config file
    Init {
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Convert a markdown outline into a structured plan document
    Convert {
        /// Markdown outline to read
        input: PathBuf,
        /// Output path (defaults to the input with a .yaml extension)
        output: Option<PathBuf>,
        /// Repository owner (detected from the git remote when omitted)
        #[arg(long)]
        owner: Option<String>,
        /// Repository name (detected from the git remote when omitted)
        #[arg(long)]
        repo: Option<String>,
        /// JSON file mapping item types to tracker issue type ids
        #[arg(long)]
        types: Option<PathBuf>,
        /// Project directory holding the .plansync cache
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },
    /// Create tracker issues for every item in a plan document
    Sync {
        /// Plan document to synchronize
        plan: PathBuf,
        /// Validate and list what would be created without creating anything
        #[arg(long)]
        dry_run: bool,
        /// Delay after each single create call, in milliseconds
        #[arg(long)]
        rate_limit_ms: Option<u64>,
    },
    /// Query the repository's issue types and cache the mapping locally
    DiscoverTypes {
        /// Repository owner (detected from the git remote when omitted)
        #[arg(long)]
        owner: Option<String>,
        /// Repository name (detected from the git remote when omitted)
        #[arg(long)]
        repo: Option<String>,
        /// Project directory holding the .plansync cache
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },
    /// Create a single issue of a given item type
    CreateIssue {
        /// Item type (phase, epic, feature, story, task, bug, doc, ...)
        item_type: String,
        /// Issue title
        title: String,
        /// Issue body
        #[arg(default_value = "")]
        body: String,
        /// Repository owner (detected from the git remote when omitted)
        #[arg(long)]
        owner: Option<String>,
        /// Repository name (detected from the git remote when omitted)
        #[arg(long)]
        repo: Option<String>,
        /// Project directory holding the .plansync cache
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },
}

/// Execute the `plansync init` command: write config file.
fn cmd_init(force: bool) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let cfg = config::ConfigFile::default();
    config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    println!("  tracker.gh_binary = {}", cfg.tracker.gh_binary);
    println!("  tracker.rate_limit_ms = {}", cfg.tracker.rate_limit_ms);
    println!();
    println!("Next: run `plansync discover-types` inside your repository.");

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { force } => {
            cmd_init(force)?;
        }
        Commands::Convert {
            input,
            output,
            owner,
            repo,
            types,
            dir,
        } => {
            let resolved = PlansyncConfig::resolve(cli.gh_binary.as_deref(), None)?;
            let options = convert_cmd::ConvertOptions {
                input,
                output,
                owner,
                repo,
                types,
                dir,
            };
            convert_cmd::run_convert(&resolved, &options)?;
        }
        Commands::Sync {
            plan,
            dry_run,
            rate_limit_ms,
        } => {
            let resolved = PlansyncConfig::resolve(cli.gh_binary.as_deref(), rate_limit_ms)?;
            let success = sync_cmd::run_sync(&resolved, &plan, dry_run).await?;
            if !success {
                std::process::exit(1);
            }
        }
        Commands::DiscoverTypes { owner, repo, dir } => {
            let resolved = PlansyncConfig::resolve(cli.gh_binary.as_deref(), None)?;
            discover_cmd::run_discover(&resolved, owner.as_deref(), repo.as_deref(), &dir).await?;
        }
        Commands::CreateIssue {
            item_type,
            title,
            body,
            owner,
            repo,
            dir,
        } => {
            let resolved = PlansyncConfig::resolve(cli.gh_binary.as_deref(), None)?;
            let request = create_issue_cmd::IssueRequest {
                item_type,
                title,
                body,
            };
            create_issue_cmd::run_create_issue(&resolved, &request, owner.as_deref(), repo.as_deref(), &dir)
                .await?;
        }
    }

    Ok(())
}
