use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use storefront_env::parse;
use storefront_env::reconcile::{self, RemoteVariable};

#[derive(Parser)]
#[command(
  name = "storefront-env",
  about = "Compare local .env files with a storefront's environment variables",
  version,
  author
)]
struct Cli {
  #[command(subcommand)]
  command: Command,

  /// Verbose output (-v for verbose, -vv for very verbose)
  #[arg(short, long, action = clap::ArgAction::Count, global = true)]
  verbose: u8,
}

#[derive(Subcommand)]
enum Command {
  /// Show what pushing a local file over a remote snapshot would change
  Diff {
    /// Path to the local .env file
    #[arg(short, long, default_value = ".env")]
    local: PathBuf,

    /// Path to a snapshot of the remote variables, in .env format
    #[arg(short, long)]
    remote: PathBuf,

    /// Key the remote marks as secret (repeatable)
    #[arg(short, long = "secret", value_name = "KEY")]
    secrets: Vec<String>,
  },
  /// Print a .env file in normalized form
  Fmt {
    /// Path to the local .env file
    #[arg(short, long, default_value = ".env")]
    local: PathBuf,
  },
}

#[derive(Debug, thiserror::Error)]
enum CliError {
  #[error("File not found: {0}")]
  FileNotFound(PathBuf),
  #[error("Failed to read {path}: {source}")]
  Read {
    path: PathBuf,
    source: std::io::Error,
  },
}

fn setup_tracing(verbose: u8) {
  use tracing_subscriber::fmt;
  use tracing_subscriber::prelude::*;

  let log_level = match verbose {
    1 => "debug",
    2 => "trace",
    _ => "info",
  };

  tracing_subscriber::registry()
    .with(fmt::layer().with_writer(std::io::stderr))
    .with(tracing_subscriber::EnvFilter::new(
      std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
    ))
    .init();
}

fn read_env_file(path: &Path) -> Result<parse::ParsedEnvFile, CliError> {
  if !path.exists() {
    return Err(CliError::FileNotFound(path.to_path_buf()));
  }
  let text = std::fs::read_to_string(path).map_err(|source| CliError::Read {
    path: path.to_path_buf(),
    source,
  })?;
  Ok(parse::parse(&text))
}

fn run_diff(local: PathBuf, remote: PathBuf, secrets: Vec<String>) -> Result<(), CliError> {
  let local = read_env_file(&local)?;
  let snapshot = read_env_file(&remote)?;

  let remote_vars: Vec<RemoteVariable> = snapshot
    .iter()
    .map(|(key, value)| RemoteVariable {
      key: key.to_string(),
      value: value.to_string(),
      is_secret: secrets.iter().any(|secret| secret == key),
    })
    .collect();

  let result = reconcile::reconcile(&local, &remote_vars);

  if !result.secret_keys_skipped.is_empty() {
    println!(
      "Skipped secret variables: {}",
      result.secret_keys_skipped.join(", ")
    );
  }

  match result.push_set {
    None => println!("No changes."),
    Some(ref push_set) => {
      println!("{}", result.diff_text());
      println!();
      println!("Variables to push ({}):", push_set.len());
      for var in push_set {
        println!("  {}", var.key);
      }
    }
  }

  Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
  let cli = Cli::parse();

  setup_tracing(cli.verbose);

  match cli.command {
    Command::Diff {
      local,
      remote,
      secrets,
    } => run_diff(local, remote, secrets)?,
    Command::Fmt { local } => print!("{}", read_env_file(&local)?),
  }

  Ok(())
}
