//! Line-oriented text diff for showing what a push or pull would change.
//!
//! The diff is advisory: it is rendered for a human and never fed back into
//! the reconciliation.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffLine<'a> {
  Unchanged(&'a str),
  Added(&'a str),
  Removed(&'a str),
}

impl DiffLine<'_> {
  pub fn text(&self) -> &str {
    match self {
      DiffLine::Unchanged(line) | DiffLine::Added(line) | DiffLine::Removed(line) => line,
    }
  }

  pub fn is_change(&self) -> bool {
    !matches!(self, DiffLine::Unchanged(_))
  }
}

impl fmt::Display for DiffLine<'_> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      DiffLine::Unchanged(line) => write!(f, "  {line}"),
      DiffLine::Added(line) => write!(f, "+ {line}"),
      DiffLine::Removed(line) => write!(f, "- {line}"),
    }
  }
}

/// Diffs `old` against `new` line by line using a longest common subsequence.
///
/// Within a changed block removals come before additions.
pub fn diff_lines<'a>(old: &'a str, new: &'a str) -> Vec<DiffLine<'a>> {
  let old: Vec<&str> = old.lines().collect();
  let new: Vec<&str> = new.lines().collect();

  // lcs[i][j] = length of the LCS of old[i..] and new[j..]
  let mut lcs = vec![vec![0usize; new.len() + 1]; old.len() + 1];
  for i in (0..old.len()).rev() {
    for j in (0..new.len()).rev() {
      lcs[i][j] = if old[i] == new[j] {
        lcs[i + 1][j + 1] + 1
      } else {
        lcs[i + 1][j].max(lcs[i][j + 1])
      };
    }
  }

  let mut lines = Vec::with_capacity(old.len().max(new.len()));
  let (mut i, mut j) = (0, 0);
  while i < old.len() && j < new.len() {
    if old[i] == new[j] {
      lines.push(DiffLine::Unchanged(old[i]));
      i += 1;
      j += 1;
    } else if lcs[i + 1][j] >= lcs[i][j + 1] {
      lines.push(DiffLine::Removed(old[i]));
      i += 1;
    } else {
      lines.push(DiffLine::Added(new[j]));
      j += 1;
    }
  }
  lines.extend(old[i..].iter().copied().map(DiffLine::Removed));
  lines.extend(new[j..].iter().copied().map(DiffLine::Added));

  lines
}

/// Joins rendered diff lines with `\n`.
pub fn render(lines: &[DiffLine<'_>]) -> String {
  lines
    .iter()
    .map(ToString::to_string)
    .collect::<Vec<_>>()
    .join("\n")
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_identical_text() {
    let lines = diff_lines("A=1\nB=2", "A=1\nB=2");

    assert_eq!(lines, vec![DiffLine::Unchanged("A=1"), DiffLine::Unchanged("B=2")]);
    assert!(!lines.iter().any(DiffLine::is_change));
  }

  #[test]
  fn test_addition_and_removal() {
    let lines = diff_lines("A=1\nB=2\nC=3", "A=1\nC=3\nD=4");

    assert_eq!(
      lines,
      vec![
        DiffLine::Unchanged("A=1"),
        DiffLine::Removed("B=2"),
        DiffLine::Unchanged("C=3"),
        DiffLine::Added("D=4"),
      ]
    );
  }

  #[test]
  fn test_changed_value_removes_before_adding() {
    let lines = diff_lines("A=1", "A=2");

    assert_eq!(lines, vec![DiffLine::Removed("A=1"), DiffLine::Added("A=2")]);
  }

  #[test]
  fn test_empty_sides() {
    assert!(diff_lines("", "").is_empty());
    assert_eq!(diff_lines("", "A=1"), vec![DiffLine::Added("A=1")]);
    assert_eq!(diff_lines("A=1", ""), vec![DiffLine::Removed("A=1")]);
  }

  #[test]
  fn test_render() {
    let lines = diff_lines("A=1\nB=2", "A=1\nB=3");

    assert_eq!(render(&lines), "  A=1\n- B=2\n+ B=3");
    assert_eq!(lines[2].text(), "B=3");
  }
}
