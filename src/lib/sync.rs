//! Push and pull workflows between a local `.env` file and a remote environment.
//!
//! # Push Logic
//!
//! 1. Reads and parses the local file, which must exist
//! 2. Picks the target environment (by name/branch, or production)
//! 3. Fetches the environment's variables and reconciles them with the file
//! 4. If anything differs, shows the diff and asks for confirmation
//! 5. Pushes every local variable that isn't a remote secret
//!
//! # Pull Logic
//!
//! 1. Picks the source environment and fetches its variables
//! 2. Renders them as a `.env` file; a secret keeps its local value, or is
//!    left blank when the local file doesn't have it
//! 3. Asks before overwriting a local file with different contents
//!
//! The remote API and the terminal prompts are supplied by the caller through
//! [`RemoteStore`] and [`Prompt`].
//!
//! # Examples
//!
//! ```rust,no_run
//! # use storefront_env::sync::{EnvPush, EnvPushOptions, Prompt, RemoteStore};
//! # fn run(remote: &impl RemoteStore, prompt: &impl Prompt) {
//! let options = EnvPushOptions {
//!     env_file: None, // defaults to .env
//!     environment: None, // defaults to production
//!     force: false,
//! };
//!
//! let _outcome = EnvPush::push_with_options(options, remote, prompt).unwrap();
//! # }
//! ```

use std::path::{Path, PathBuf};

#[cfg(feature = "tracing")]
use tracing::{debug, info};

use crate::environment::{self, Environment, EnvironmentError, EnvironmentSelector};
use crate::parse::{self, quote_value, ParsedEnvFile};
use crate::reconcile::{self, PushVariable, RemoteVariable};

const DEFAULT_LOCAL_FILENAME: &str = ".env";

/// Error raised by a [`RemoteStore`] implementation.
pub type RemoteError = Box<dyn std::error::Error + Send + Sync>;

/// A validation error reported by the remote write operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserError {
  pub field: Option<String>,
  pub message: String,
}

impl std::fmt::Display for UserError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match &self.field {
      Some(field) => write!(f, "{}: {}", field, self.message),
      None => write!(f, "{}", self.message),
    }
  }
}

/// Remote storage of environments and their variables.
pub trait RemoteStore {
  fn fetch_environments(&self) -> Result<Vec<Environment>, RemoteError>;

  /// Variables of `environment`. Implementations looking variables up by
  /// branch use `environment.branch`.
  fn fetch_variables(&self, environment: &Environment) -> Result<Vec<RemoteVariable>, RemoteError>;

  fn push_variables(
    &self,
    environment_id: &str,
    variables: &[PushVariable],
  ) -> Result<Vec<UserError>, RemoteError>;
}

/// Interactive questions asked during a workflow.
pub trait Prompt {
  fn confirm(&self, message: &str) -> bool;

  /// Returns the id of the chosen environment, or `None` to cancel.
  fn select_environment(&self, candidates: &[Environment]) -> Option<String>;
}

/// Configuration options for pushing a local file.
#[derive(Debug, Clone, Default)]
pub struct EnvPushOptions {
  /// Path to the local environment file. If None, defaults to `.env` in current directory.
  pub env_file: Option<PathBuf>,
  /// Which environment to push to. If None, the production environment.
  pub environment: Option<EnvironmentSelector>,
  /// Push without asking for confirmation.
  pub force: bool,
}

/// Configuration options for pulling into a local file.
#[derive(Debug, Clone, Default)]
pub struct EnvPullOptions {
  /// Path to the local environment file. If None, defaults to `.env` in current directory.
  pub env_file: Option<PathBuf>,
  /// Which environment to pull from. If None, the production environment.
  pub environment: Option<EnvironmentSelector>,
  /// Overwrite an existing file without asking.
  pub force: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
  /// Nothing to push.
  Identical { secret_keys_skipped: Vec<String> },
  /// The user declined.
  Cancelled,
  Pushed {
    environment: Environment,
    pushed: Vec<PushVariable>,
    secret_keys_skipped: Vec<String>,
  },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullOutcome {
  /// The environment has no variables, the local file is untouched.
  Empty,
  /// The local file already has the rendered contents.
  Unchanged,
  /// The user declined.
  Cancelled,
  Written {
    path: PathBuf,
    variables: usize,
    secrets: usize,
  },
}

/// Pushes a local `.env` file to a remote environment.
pub struct EnvPush;

impl EnvPush {
  /// Runs the push workflow using the provided options.
  ///
  /// Returns an error if the local file doesn't exist.
  pub fn push_with_options<R, P>(
    options: EnvPushOptions,
    remote: &R,
    prompt: &P,
  ) -> Result<PushOutcome, EnvSyncError>
  where
    R: RemoteStore + ?Sized,
    P: Prompt + ?Sized,
  {
    #[cfg(feature = "tracing")]
    info!("Starting env push");

    let EnvPushOptions {
      env_file,
      environment,
      force,
    } = options;

    let local_path = resolve_local_path(env_file);

    #[cfg(feature = "tracing")]
    debug!(?local_path, ?environment, "Resolved push options");

    if !local_path.exists() {
      return Err(EnvSyncError::FileNotFound(local_path));
    }

    let local_str = std::fs::read_to_string(&local_path).map_err(EnvSyncError::Read)?;
    let local = parse::parse(&local_str);

    let environments = remote.fetch_environments().map_err(EnvSyncError::Remote)?;
    let Some(target) = choose_environment(&environments, environment.as_ref(), prompt)? else {
      return Ok(PushOutcome::Cancelled);
    };

    let remote_vars = remote
      .fetch_variables(target)
      .map_err(EnvSyncError::Remote)?;

    let result = reconcile::reconcile(&local, &remote_vars);

    let Some(push_set) = result.push_set.clone() else {
      #[cfg(feature = "tracing")]
      info!("No changes to push");

      return Ok(PushOutcome::Identical {
        secret_keys_skipped: result.secret_keys_skipped,
      });
    };

    if !force {
      let message = format!(
        "Push these changes to {}?\n{}",
        target,
        result.diff_text()
      );
      if !prompt.confirm(&message) {
        return Ok(PushOutcome::Cancelled);
      }
    }

    let user_errors = remote
      .push_variables(&target.id, &push_set)
      .map_err(EnvSyncError::Remote)?;
    if !user_errors.is_empty() {
      return Err(EnvSyncError::Rejected(user_errors));
    }

    #[cfg(feature = "tracing")]
    info!("Pushed {} variables to {}", push_set.len(), target);

    Ok(PushOutcome::Pushed {
      environment: target.clone(),
      pushed: push_set,
      secret_keys_skipped: result.secret_keys_skipped,
    })
  }
}

/// Writes a remote environment's variables into a local `.env` file.
pub struct EnvPull;

impl EnvPull {
  /// Runs the pull workflow using the provided options.
  ///
  /// Creates the local file if it doesn't exist.
  pub fn pull_with_options<R, P>(
    options: EnvPullOptions,
    remote: &R,
    prompt: &P,
  ) -> Result<PullOutcome, EnvSyncError>
  where
    R: RemoteStore + ?Sized,
    P: Prompt + ?Sized,
  {
    #[cfg(feature = "tracing")]
    info!("Starting env pull");

    let EnvPullOptions {
      env_file,
      environment,
      force,
    } = options;

    let local_path = resolve_local_path(env_file);

    let environments = remote.fetch_environments().map_err(EnvSyncError::Remote)?;
    let Some(source) = choose_environment(&environments, environment.as_ref(), prompt)? else {
      return Ok(PullOutcome::Cancelled);
    };

    let remote_vars = remote
      .fetch_variables(source)
      .map_err(EnvSyncError::Remote)?;

    if remote_vars.is_empty() {
      #[cfg(feature = "tracing")]
      info!("No variables found for {}", source);

      return Ok(PullOutcome::Empty);
    }

    let existing = if local_path.exists() {
      Some(std::fs::read_to_string(&local_path).map_err(EnvSyncError::Read)?)
    } else {
      None
    };
    let local = existing.as_deref().map(parse::parse);
    let content = Self::render(&remote_vars, local.as_ref());

    if let (Some(existing), Some(local)) = (&existing, &local) {
      if *existing == content {
        return Ok(PullOutcome::Unchanged);
      }

      if !force {
        let is_remote_secret =
          |key: &str| remote_vars.iter().any(|var| var.is_secret && var.key == key);
        let current =
          reconcile::comparable_text(local.iter().filter(|(key, _)| !is_remote_secret(*key)));
        let incoming = reconcile::comparable_text(
          remote_vars
            .iter()
            .filter(|var| !var.is_secret)
            .map(|var| (var.key.as_str(), var.value.as_str())),
        );
        let message = format!(
          "Overwrite {} with variables from {}?\n{}",
          local_path.display(),
          source,
          crate::diff::render(&crate::diff::diff_lines(&current, &incoming))
        );
        if !prompt.confirm(&message) {
          return Ok(PullOutcome::Cancelled);
        }
      }
    }

    Self::write_local(&content, &local_path)?;

    let secrets = remote_vars.iter().filter(|var| var.is_secret).count();
    Ok(PullOutcome::Written {
      path: local_path,
      variables: remote_vars.len(),
      secrets,
    })
  }

  /// Renders remote variables as `.env` text.
  ///
  /// Secret values are unknown remotely: a secret keeps its value from `local`
  /// when present there, otherwise it is written empty with a comment above.
  pub fn render(variables: &[RemoteVariable], local: Option<&ParsedEnvFile>) -> String {
    let mut content = String::new();
    for var in variables {
      let kept = local
        .filter(|_| var.is_secret)
        .and_then(|local| local.get(&var.key));
      if let Some(value) = kept {
        content.push_str(&format!("{}={}\n", var.key, quote_value(value)));
      } else if var.is_secret {
        content.push_str(&format!(
          "# {} is marked as secret and its value is hidden\n{}=\"\"\n",
          var.key, var.key
        ));
      } else {
        content.push_str(&format!("{}={}\n", var.key, quote_value(&var.value)));
      }
    }
    content
  }

  fn write_local<P: AsRef<Path>>(content: &str, local_path: P) -> Result<(), EnvSyncError> {
    #[cfg(feature = "tracing")]
    debug!("Writing pulled variables to {:?}", local_path.as_ref());

    std::fs::write(local_path, content).map_err(EnvSyncError::Write)?;

    #[cfg(feature = "tracing")]
    info!("Pull completed successfully");

    Ok(())
  }
}

fn resolve_local_path(env_file: Option<PathBuf>) -> PathBuf {
  env_file.unwrap_or_else(|| {
    std::env::current_dir()
      .unwrap_or_else(|_| PathBuf::from("."))
      .join(DEFAULT_LOCAL_FILENAME)
  })
}

/// Resolves the target environment, asking the user when several match.
///
/// `Ok(None)` means the user cancelled the choice.
fn choose_environment<'a, P: Prompt + ?Sized>(
  environments: &'a [Environment],
  selector: Option<&EnvironmentSelector>,
  prompt: &P,
) -> Result<Option<&'a Environment>, EnvSyncError> {
  let selected = match selector {
    Some(selector) => environment::select(environments, selector),
    None => environment::production(environments),
  };

  match selected {
    Ok(found) => Ok(Some(found)),
    Err(EnvironmentError::Ambiguous { candidates, .. }) => {
      #[cfg(feature = "tracing")]
      debug!("Asking to choose between {} environments", candidates.len());

      let Some(id) = prompt.select_environment(&candidates) else {
        return Ok(None);
      };
      environments
        .iter()
        .filter(|env| candidates.iter().any(|candidate| candidate.id == env.id))
        .find(|env| env.id == id)
        .map(Some)
        .ok_or_else(|| EnvironmentError::NotFound(format!("id `{id}`")).into())
    }
    Err(err) => Err(EnvSyncError::Environment(err)),
  }
}

/// Errors that can occur while pushing or pulling environment variables.
#[derive(Debug, thiserror::Error)]
pub enum EnvSyncError {
  /// The local environment file does not exist
  #[error("Env file not found: {0}")]
  FileNotFound(PathBuf),
  /// Error reading the local environment file
  #[error("Local file IO error: {0}")]
  Read(std::io::Error),
  /// Error writing the local environment file
  #[error("Write error: {0}")]
  Write(std::io::Error),
  /// The remote API call failed
  #[error("Remote error: {0}")]
  Remote(RemoteError),
  /// No usable environment could be picked
  #[error(transparent)]
  Environment(#[from] EnvironmentError),
  /// The remote refused the pushed variables
  #[error("Push rejected: {}", .0.iter().map(ToString::to_string).collect::<Vec<_>>().join("; "))]
  Rejected(Vec<UserError>),
}
