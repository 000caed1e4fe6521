//! Remote deployment environments and how one is picked.

use std::{fmt, str::FromStr};

#[cfg(feature = "tracing")]
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnvironmentType {
  Preview,
  Production,
  Custom,
}

impl fmt::Display for EnvironmentType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      EnvironmentType::Preview => "PREVIEW",
      EnvironmentType::Production => "PRODUCTION",
      EnvironmentType::Custom => "CUSTOM",
    };
    f.write_str(name)
  }
}

impl FromStr for EnvironmentType {
  type Err = EnvironmentError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "preview" => Ok(EnvironmentType::Preview),
      "production" => Ok(EnvironmentType::Production),
      "custom" => Ok(EnvironmentType::Custom),
      _ => Err(EnvironmentError::UnknownType(s.to_string())),
    }
  }
}

/// Metadata describing a remote deployment target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
  pub id: String,
  pub name: String,
  pub branch: Option<String>,
  pub kind: EnvironmentType,
  pub url: Option<String>,
}

impl fmt::Display for Environment {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} ({})", self.name, self.kind)?;
    if let Some(branch) = &self.branch {
      write!(f, " [{branch}]")?;
    }
    Ok(())
  }
}

/// How to pick an environment from the remote list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvironmentSelector {
  ByName(String),
  ByBranch(String),
}

impl EnvironmentSelector {
  fn matches(&self, environment: &Environment) -> bool {
    match self {
      EnvironmentSelector::ByName(name) => environment.name == *name,
      EnvironmentSelector::ByBranch(branch) => environment.branch.as_deref() == Some(branch.as_str()),
    }
  }
}

impl fmt::Display for EnvironmentSelector {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      EnvironmentSelector::ByName(name) => write!(f, "name `{name}`"),
      EnvironmentSelector::ByBranch(branch) => write!(f, "branch `{branch}`"),
    }
  }
}

/// Picks the environment matching `selector`.
///
/// Several matches are never resolved here; the candidates are returned so
/// the caller can ask.
pub fn select<'a>(
  environments: &'a [Environment],
  selector: &EnvironmentSelector,
) -> Result<&'a Environment, EnvironmentError> {
  pick(environments, |env| selector.matches(env), || selector.to_string())
}

/// Picks the production environment, the default push/pull target.
pub fn production(environments: &[Environment]) -> Result<&Environment, EnvironmentError> {
  pick(
    environments,
    |env| env.kind == EnvironmentType::Production,
    || EnvironmentType::Production.to_string(),
  )
}

fn pick<'a>(
  environments: &'a [Environment],
  predicate: impl Fn(&Environment) -> bool,
  describe: impl FnOnce() -> String,
) -> Result<&'a Environment, EnvironmentError> {
  if environments.is_empty() {
    return Err(EnvironmentError::NoEnvironmentsAvailable);
  }

  let mut matches: Vec<&Environment> = environments.iter().filter(|env| predicate(*env)).collect();

  #[cfg(feature = "tracing")]
  debug!("{} of {} environments match", matches.len(), environments.len());

  match matches.len() {
    0 => Err(EnvironmentError::NotFound(describe())),
    1 => Ok(matches.remove(0)),
    _ => Err(EnvironmentError::Ambiguous {
      selector: describe(),
      candidates: matches.into_iter().cloned().collect(),
    }),
  }
}

#[derive(Debug, thiserror::Error)]
pub enum EnvironmentError {
  /// The remote returned no environments at all
  #[error("No environments available")]
  NoEnvironmentsAvailable,
  /// Nothing matched the selector
  #[error("No environment found for {0}")]
  NotFound(String),
  /// More than one environment matched; the caller has to choose
  #[error("{} environments match {selector}", .candidates.len())]
  Ambiguous {
    selector: String,
    candidates: Vec<Environment>,
  },
  /// Unrecognized environment type name
  #[error("Unknown environment type: {0}")]
  UnknownType(String),
}
