//! Blocksync CLI - fixed-block file synchronization over TCP.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use blocksync::{ApplyOptions, Client, Digest, Server, ServerConfig};

/// Blocksync - transfer only the blocks that changed
#[derive(Parser)]
#[command(name = "blocksync")]
#[command(version)]
#[command(about = "Fixed-block file synchronization over a checksum exchange")]
#[command(long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve files to patch requests until ctrl-c
    Serve {
        /// Address to listen on
        #[arg(long, default_value = "127.0.0.1:50051")]
        bind: SocketAddr,

        /// Directory requested file names are resolved under
        #[arg(long, default_value = "/tmp")]
        root: PathBuf,

        /// Maximum number of concurrently running diffs
        #[arg(long, default_value_t = 2)]
        workers: usize,
    },

    /// Fetch a file from a server onto a local path
    Fetch {
        /// Name of the file on the server
        #[arg(required = true)]
        name: String,

        /// Local destination path (default: NAME in the current directory)
        dest: Option<PathBuf>,

        /// Server address
        #[arg(short, long, default_value = "127.0.0.1:50051")]
        server: String,

        /// Block size in bytes
        #[arg(short, long, default_value_t = 4096)]
        block_size: u32,

        /// Validate each literal block against its digest before writing
        #[arg(long)]
        validate_blocks: bool,
    },

    /// Print the whole-file digest of a local file
    Digest {
        /// File to digest
        #[arg(required = true)]
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbosity: u8) {
    let default_filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Serve {
            bind,
            root,
            workers,
        } => run_serve(bind, root, workers).await,
        Commands::Fetch {
            name,
            dest,
            server,
            block_size,
            validate_blocks,
        } => run_fetch(name, dest, &server, block_size, validate_blocks).await,
        Commands::Digest { path } => run_digest(path).await,
    }
}

async fn run_serve(
    bind: SocketAddr,
    root: PathBuf,
    workers: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let server = Server::bind(ServerConfig {
        bind,
        root,
        max_workers: workers,
    })
    .await?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("shutting down");
        }
    }
    Ok(())
}

async fn run_fetch(
    name: String,
    dest: Option<PathBuf>,
    server: &str,
    block_size: u32,
    validate_blocks: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let dest = dest.unwrap_or_else(|| PathBuf::from(&name));

    let mut client = Client::connect(server).await?;
    let report = client
        .sync(&name, &dest, block_size, ApplyOptions { validate_blocks })
        .await?;

    if report.up_to_date {
        println!("{} already up to date", dest.display());
    } else {
        println!(
            "Synced {} ({} bytes transferred, {} bytes reused)",
            dest.display(),
            report.bytes_transferred,
            report.bytes_reused
        );
    }
    Ok(())
}

async fn run_digest(path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let digest = tokio::task::spawn_blocking(move || Digest::compute_file(&path)).await??;
    println!("{digest}");
    Ok(())
}
