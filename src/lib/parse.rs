//! Permissive `.env` parsing.
//!
//! Text is normalized to `\n` line endings and scanned with a single
//! multi-line pattern. Lines that don't look like an assignment are skipped
//! rather than reported, so a parse never fails.
//!
//! Supported forms:
//!
//! ```text
//! KEY=value            # trailing comments are dropped
//! export KEY=value
//! KEY: value
//! KEY='single # kept'
//! KEY="double\nwith escapes"
//! KEY=`backtick`
//! ```

use std::{borrow::Cow, convert::Infallible, fmt, str::FromStr};

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;

#[cfg(feature = "tracing")]
use tracing::{debug, trace};

const QUOTES: [char; 3] = ['\'', '"', '`'];

static LINE_REGEX: Lazy<Regex> = Lazy::new(|| {
  Regex::new(
    r#"(?m)^\s*(?:export\s+)?([\w.-]+)(?:\s*=\s*?|:\s+?)(\s*'(?:\\'|[^'])*'|\s*"(?:\\"|[^"])*"|\s*`(?:\\`|[^`])*`|[^#\r\n]+)?\s*(?:#.*)?$"#,
  )
  .expect("Invalid env line pattern")
});

/// Ordered key/value pairs read from one `.env` text blob.
///
/// A key that appears more than once keeps the position of its first
/// occurrence and the value of its last.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedEnvFile {
  entries: IndexMap<String, String>,
}

/// Parses `.env` formatted text.
pub fn parse(text: &str) -> ParsedEnvFile {
  let normalized = normalize_line_endings(text);

  #[cfg(feature = "tracing")]
  debug!("Parsing env text with {} lines", normalized.lines().count());

  let mut entries = IndexMap::new();

  for captures in LINE_REGEX.captures_iter(&normalized) {
    let key = &captures[1];
    let raw = captures.get(2).map_or("", |m| m.as_str()).trim();
    let value = resolve_value(raw);

    #[cfg(feature = "tracing")]
    trace!(key, raw, "Parsed variable");

    entries.insert(key.to_string(), value);
  }

  #[cfg(feature = "tracing")]
  debug!("Parsed {} variables", entries.len());

  ParsedEnvFile { entries }
}

fn normalize_line_endings(text: &str) -> Cow<'_, str> {
  if text.contains('\r') {
    Cow::Owned(text.replace("\r\n", "\n").replace('\r', "\n"))
  } else {
    Cow::Borrowed(text)
  }
}

fn resolve_value(raw: &str) -> String {
  let Some(quote) = raw.chars().next().filter(|c| QUOTES.contains(c)) else {
    return raw.to_string();
  };

  let inner = if raw.len() >= 2 && raw.ends_with(quote) {
    &raw[1..raw.len() - 1]
  } else {
    raw
  };

  if quote == '"' {
    inner.replace("\\n", "\n").replace("\\r", "\r")
  } else {
    inner.to_string()
  }
}

impl ParsedEnvFile {
  pub fn get(&self, key: &str) -> Option<&str> {
    self.entries.get(key).map(String::as_str)
  }

  pub fn contains_key(&self, key: &str) -> bool {
    self.entries.contains_key(key)
  }

  pub fn keys(&self) -> impl Iterator<Item = &str> {
    self.entries.keys().map(String::as_str)
  }

  /// Iterates entries in file order.
  pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
    self
      .entries
      .iter()
      .map(|(key, value)| (key.as_str(), value.as_str()))
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn into_inner(self) -> IndexMap<String, String> {
    self.entries
  }
}

impl From<&str> for ParsedEnvFile {
  fn from(text: &str) -> Self {
    parse(text)
  }
}

impl FromStr for ParsedEnvFile {
  type Err = Infallible;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Ok(parse(s))
  }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ParsedEnvFile {
  fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
    Self {
      entries: iter
        .into_iter()
        .map(|(key, value)| (key.into(), value.into()))
        .collect(),
    }
  }
}

/// Renders one `KEY=value` line per entry, quoting values so that parsing the
/// output yields the same mapping.
impl fmt::Display for ParsedEnvFile {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (key, value) in &self.entries {
      writeln!(f, "{}={}", key, quote_value(value))?;
    }
    Ok(())
  }
}

/// Quotes `value` for writing to a `.env` file.
///
/// Bare values are preferred, then single quotes, then backticks, then double
/// quotes with `\n`/`\r` escapes. A value that contains a double quote *and*
/// can't use either of the other quote styles is written double quoted as-is
/// and won't read back identically.
pub fn quote_value(value: &str) -> Cow<'_, str> {
  if is_bare_safe(value) {
    return Cow::Borrowed(value);
  }

  let fits_raw_quotes = !value.contains('\r') && !value.ends_with('\\');
  if fits_raw_quotes && !value.contains('\'') {
    return Cow::Owned(format!("'{value}'"));
  }
  if fits_raw_quotes && !value.contains('`') {
    return Cow::Owned(format!("`{value}`"));
  }

  let escaped = value.replace('\n', "\\n").replace('\r', "\\r");
  Cow::Owned(format!("\"{escaped}\""))
}

fn is_bare_safe(value: &str) -> bool {
  value == value.trim()
    && !value.starts_with(QUOTES)
    && !value.contains(['#', '\n', '\r'])
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_simple() {
    let env = parse("KEY=value\nANOTHER=test");

    assert_eq!(env.len(), 2);
    assert_eq!(env.get("KEY"), Some("value"));
    assert_eq!(env.get("ANOTHER"), Some("test"));
    assert_eq!(env.keys().collect::<Vec<_>>(), vec!["KEY", "ANOTHER"]);
  }

  #[test]
  fn test_line_endings() {
    let env = parse("A=1\r\nB=2\rC=3\n");

    assert_eq!(
      env.iter().collect::<Vec<_>>(),
      vec![("A", "1"), ("B", "2"), ("C", "3")]
    );
  }

  #[test]
  fn test_export_and_colon_assignment() {
    let env = parse("export A=1\n  B: two\nC.d-e=3");

    assert_eq!(env.get("A"), Some("1"));
    assert_eq!(env.get("B"), Some("two"));
    assert_eq!(env.get("C.d-e"), Some("3"));
  }

  #[test]
  fn test_comments_and_blank_lines() {
    let input = "# leading comment\n\nKEY=value # trailing\n   # indented comment\nOTHER=x#y";
    let env = parse(input);

    assert_eq!(env.len(), 2);
    assert_eq!(env.get("KEY"), Some("value"));
    assert_eq!(env.get("OTHER"), Some("x"));
  }

  #[test]
  fn test_quote_stripping() {
    assert_eq!(parse(r#"KEY="hello world""#).get("KEY"), Some("hello world"));
    assert_eq!(parse("KEY='a#b'").get("KEY"), Some("a#b"));
    assert_eq!(parse("KEY=`tick # tock`").get("KEY"), Some("tick # tock"));
    assert_eq!(parse("KEY=\"  padded  \" # note").get("KEY"), Some("  padded  "));
  }

  #[test]
  fn test_escape_expansion_only_in_double_quotes() {
    assert_eq!(
      parse(r#"KEY="line1\nline2\rend""#).get("KEY"),
      Some("line1\nline2\rend")
    );
    assert_eq!(parse(r"KEY='line1\nline2'").get("KEY"), Some(r"line1\nline2"));
    assert_eq!(parse(r"KEY=`line1\nline2`").get("KEY"), Some(r"line1\nline2"));
    assert_eq!(parse(r"KEY=line1\nline2").get("KEY"), Some(r"line1\nline2"));
  }

  #[test]
  fn test_multiline_quoted_value() {
    let env = parse("CERT='-----BEGIN-----\nabc\n-----END-----'\nNEXT=1");

    assert_eq!(env.get("CERT"), Some("-----BEGIN-----\nabc\n-----END-----"));
    assert_eq!(env.get("NEXT"), Some("1"));
  }

  #[test]
  fn test_duplicate_keys_last_wins() {
    let env = parse("A=1\nB=x\nA=2");

    assert_eq!(env.get("A"), Some("2"));
    assert_eq!(env.keys().collect::<Vec<_>>(), vec!["A", "B"]);
  }

  #[test]
  fn test_key_without_value() {
    let env = parse("EMPTY=\nSPACES=   \nQUOTED=\"\"");

    assert_eq!(env.get("EMPTY"), Some(""));
    assert_eq!(env.get("SPACES"), Some(""));
    assert_eq!(env.get("QUOTED"), Some(""));
  }

  #[test]
  fn test_malformed_lines_are_skipped() {
    let env = parse("not an assignment\n=novalue\nGOOD=yes\n!!!");

    assert_eq!(env.len(), 1);
    assert_eq!(env.get("GOOD"), Some("yes"));
  }

  #[test]
  fn test_empty_input() {
    assert!(parse("").is_empty());
    assert!(parse("\n\n# only comments\n").is_empty());
  }

  #[test]
  fn test_from_str() {
    let env: ParsedEnvFile = "A=1".parse().unwrap();
    assert_eq!(env, ParsedEnvFile::from("A=1"));
  }

  #[test]
  fn test_roundtrip_plain_values() {
    let original: ParsedEnvFile = [("HOST", "localhost"), ("PORT", "5432"), ("URL", "a:b/c")]
      .into_iter()
      .collect();

    assert_eq!(parse(&original.to_string()), original);
  }

  #[test]
  fn test_roundtrip_generated_mappings() {
    let keys = ["A", "my.key", "with-hyphen", "_under", "export", "Ключ", "k1.v-2_x"];
    let values = [
      "plain",
      "host:8080",
      "日本語",
      "x-y.z",
      "with inner space",
      r"back\slash",
      "naïve café",
      "0",
    ];

    for shift in 0..values.len() {
      for len in 1..=keys.len() {
        let pairs: Vec<(&str, &str)> = keys
          .iter()
          .take(len)
          .enumerate()
          .map(|(i, key)| (*key, values[(i + shift) % values.len()]))
          .collect();
        let expected: ParsedEnvFile = pairs.iter().copied().collect();

        let serialized = pairs
          .iter()
          .map(|(key, value)| format!("{key}={value}"))
          .collect::<Vec<_>>()
          .join("\n");

        assert_eq!(parse(&serialized), expected, "input: {serialized:?}");
        assert_eq!(
          parse(&serialized).iter().collect::<Vec<_>>(),
          pairs,
          "order for input: {serialized:?}"
        );
        assert_eq!(parse(&expected.to_string()), expected);
      }
    }
  }

  #[test]
  fn test_reserialize_is_idempotent() {
    let input = concat!(
      "A=plain # c\n",
      "B='has # hash'\n",
      "C=\"multi\\nline\"\n",
      "D='it''s'\n",
      "E=`it's`\n",
      "F=\"say \\\"hi\\\"\"\n",
      "G=  spaced  \n",
      "H='trailing\\'\n",
    );
    let first = parse(input);
    let second = parse(&first.to_string());

    assert_eq!(first, second);
  }

  #[test]
  fn test_quote_value() {
    assert_eq!(quote_value("plain"), "plain");
    assert_eq!(quote_value(""), "");
    assert_eq!(quote_value("a#b"), "'a#b'");
    assert_eq!(quote_value(" lead"), "' lead'");
    assert_eq!(quote_value("it's"), "it's");
    assert_eq!(quote_value("it's #1"), "`it's #1`");
    assert_eq!(quote_value("it's `x`\nnext"), "\"it's `x`\\nnext\"");
    assert_eq!(quote_value("\"quoted"), "'\"quoted'");
  }
}
