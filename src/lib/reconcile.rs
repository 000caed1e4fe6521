//! Secret-aware reconciliation of a local `.env` file with remote variables.
//!
//! # Reconcile Logic
//!
//! 1. Remote variables are split into secret keys and comparable `key=value`
//!    lines. Secret values are never visible to us, so they are neither diffed
//!    nor pushed.
//! 2. Local variables are rendered the same way, minus any key that is secret
//!    remotely.
//! 3. If both renderings are equal the sides are identical and nothing is
//!    pushed.
//! 4. Otherwise the push set is every local variable that isn't a remote
//!    secret, in file order. Remote-only keys are left out of it.
//!
//! Newlines and carriage returns inside values are escaped to a literal `\n`
//! and `\r` so each variable takes exactly one line.

#[cfg(feature = "tracing")]
use tracing::{debug, trace};

use crate::diff::{self, DiffLine};
use crate::parse::ParsedEnvFile;

/// A variable as stored for a remote environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteVariable {
  pub key: String,
  pub value: String,
  pub is_secret: bool,
}

impl RemoteVariable {
  pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
    Self {
      key: key.into(),
      value: value.into(),
      is_secret: false,
    }
  }

  pub fn secret(key: impl Into<String>) -> Self {
    Self {
      key: key.into(),
      value: String::new(),
      is_secret: true,
    }
  }
}

/// A key/value pair to send to the remote write operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushVariable {
  pub key: String,
  pub value: String,
}

/// Outcome of comparing a local file with a remote variable set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
  /// Whether the comparable renderings of both sides are equal.
  pub identical: bool,
  /// Local keys left out because the remote marks them secret.
  pub secret_keys_skipped: Vec<String>,
  /// Variables to push, `None` when the sides are identical.
  pub push_set: Option<Vec<PushVariable>>,
  remote_text: String,
  local_text: String,
}

impl Reconciliation {
  /// The line diff from the remote rendering to the local one.
  pub fn diff(&self) -> Vec<DiffLine<'_>> {
    if self.identical {
      return Vec::new();
    }
    diff::diff_lines(&self.remote_text, &self.local_text)
  }

  pub fn diff_text(&self) -> String {
    diff::render(&self.diff())
  }

  /// The non-secret remote variables as compared, one `key=value` per line.
  pub fn remote_text(&self) -> &str {
    &self.remote_text
  }

  /// The local variables as compared, one `key=value` per line.
  pub fn local_text(&self) -> &str {
    &self.local_text
  }
}

/// Replaces line breaks with the two-character sequences `\n` and `\r`.
pub fn escape_newlines(value: &str) -> String {
  value.replace('\n', "\\n").replace('\r', "\\r")
}

/// Renders pairs as `key=value` lines joined with `\n`.
pub fn comparable_text<'a, I>(pairs: I) -> String
where
  I: IntoIterator<Item = (&'a str, &'a str)>,
{
  pairs
    .into_iter()
    .map(|(key, value)| format!("{}={}", key, escape_newlines(value)))
    .collect::<Vec<_>>()
    .join("\n")
}

/// Compares `local` against `remote`, deciding what may be pushed.
pub fn reconcile(local: &ParsedEnvFile, remote: &[RemoteVariable]) -> Reconciliation {
  let (secrets, visible): (Vec<&RemoteVariable>, Vec<&RemoteVariable>) =
    remote.iter().partition(|var| var.is_secret);

  let is_remote_secret = |key: &str| secrets.iter().any(|var| var.key == key);

  #[cfg(feature = "tracing")]
  debug!(
    local = local.len(),
    remote = visible.len(),
    secrets = secrets.len(),
    "Reconciling env variables"
  );

  let remote_text = comparable_text(
    visible
      .iter()
      .map(|var| (var.key.as_str(), var.value.as_str())),
  );
  let local_text = comparable_text(local.iter().filter(|(key, _)| !is_remote_secret(*key)));

  let secret_keys_skipped: Vec<String> = local
    .keys()
    .filter(|key| is_remote_secret(*key))
    .map(str::to_string)
    .collect();

  #[cfg(feature = "tracing")]
  trace!(?secret_keys_skipped, "Skipping remote secrets");

  if remote_text == local_text {
    #[cfg(feature = "tracing")]
    debug!("Local and remote variables are identical");

    return Reconciliation {
      identical: true,
      secret_keys_skipped,
      push_set: None,
      remote_text,
      local_text,
    };
  }

  let push_set = local
    .iter()
    .filter(|(key, _)| !is_remote_secret(*key))
    .map(|(key, value)| PushVariable {
      key: key.to_string(),
      value: escape_newlines(value),
    })
    .collect::<Vec<_>>();

  #[cfg(feature = "tracing")]
  debug!("Prepared {} variables to push", push_set.len());

  Reconciliation {
    identical: false,
    secret_keys_skipped,
    push_set: Some(push_set),
    remote_text,
    local_text,
  }
}
