use std::path::PathBuf;

use clap::{Parser, Subcommand};
use defs_config::DefsConfig;
use defs_remote::DirectoryManager;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "defs", version, about = "Directory manager for append-only remote storage")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log debug output to stderr (RUST_LOG takes precedence)
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List directory contents
    Ls {
        /// Directory to list (defaults to the root)
        path: Option<String>,
        /// Bypass the listing cache
        #[arg(short, long)]
        force: bool,
    },
    /// Show directory tree
    Tree {
        /// Directory to show the tree for (defaults to the root)
        path: Option<String>,
        /// Maximum depth to recurse
        #[arg(short, long)]
        depth: Option<usize>,
    },
    /// Fuzzy-find files and directories by name
    Find {
        /// Name query
        query: String,
        /// Directory to search in (defaults to the root)
        #[arg(short, long)]
        path: Option<String>,
    },
    /// Show file or directory metadata
    Stat {
        /// Path to inspect
        path: String,
    },
    /// Create a directory
    Mkdir {
        /// Path of the new directory
        path: String,
    },
    /// Upload a local file
    Put {
        /// Local file to upload
        local: PathBuf,
        /// Destination directory (defaults to the root)
        dir: Option<String>,
    },
    /// Download a file
    Get {
        /// Path of the file
        path: String,
        /// Local output file (writes to stdout if not provided)
        out: Option<PathBuf>,
    },
    /// Remove a file, or a directory and everything below it
    Rm {
        /// Path to remove
        path: String,
    },
    /// Show occupied, reserved and available space
    Space,
    /// Reserve storage space (e.g. 512mb, 2gb)
    Reserve {
        /// Amount to reserve
        amount: String,
    },
    /// Grant the allocator role to an address
    Grant {
        /// Address receiving the role
        address: String,
    },
    /// Show target, backend and cache status
    Status,
    /// Show effective configuration
    Config,
    /// Print every operation event as JSON
    Watch,
}

fn find_config() -> Option<PathBuf> {
    // 1. DEFS_CONFIG environment variable
    if let Ok(path) = std::env::var("DEFS_CONFIG") {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
    }

    // 2. defs.yaml in current directory
    let cwd_config = PathBuf::from("defs.yaml");
    if cwd_config.exists() {
        return Some(cwd_config);
    }

    // 3. ~/.config/defs/config.yaml
    if let Some(home) = dirs_next::home_dir() {
        let home_config = home.join(".config/defs/config.yaml");
        if home_config.exists() {
            return Some(home_config);
        }
    }

    None
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config_path = cli.config.or_else(find_config).ok_or(
        "No configuration file found. Use --config, set DEFS_CONFIG, or create defs.yaml",
    )?;
    let config = DefsConfig::from_file(&config_path)?;
    tracing::debug!(path = %config_path.display(), "loaded configuration");

    // Config display does not need a backend
    if let Commands::Config = cli.command {
        return commands::config::run(&config);
    }

    let manager = DirectoryManager::open(&config).await?;

    match cli.command {
        Commands::Ls { path, force } => {
            commands::ls::run(&manager, path, force).await?;
        }
        Commands::Tree { path, depth } => {
            commands::tree::run(&manager, path, depth).await?;
        }
        Commands::Find { query, path } => {
            commands::find::run(&manager, path, &query).await?;
        }
        Commands::Stat { path } => {
            commands::stat::run(&manager, &path).await?;
        }
        Commands::Mkdir { path } => {
            commands::mkdir::run(&manager, &path).await?;
        }
        Commands::Put { local, dir } => {
            commands::put::run(&manager, &local, dir).await?;
        }
        Commands::Get { path, out } => {
            commands::get::run(&manager, &path, out).await?;
        }
        Commands::Rm { path } => {
            commands::rm::run(&manager, &path).await?;
        }
        Commands::Space => {
            commands::space::run(&manager).await?;
        }
        Commands::Reserve { amount } => {
            commands::space::reserve(&manager, &amount).await?;
        }
        Commands::Grant { address } => {
            commands::grant::run(&manager, &address).await?;
        }
        Commands::Status => {
            commands::status::run(&manager, &config).await?;
        }
        Commands::Watch => {
            commands::watch::run(&manager).await?;
        }
        Commands::Config => {}
    }

    Ok(())
}
