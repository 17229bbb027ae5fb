//! Pool filters over the verse corpus, and version resolution.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
  Error, Result,
  rules::LengthBounds,
  store::VerseStore,
  verse::{BibleVerse, BibleVersion},
};

// ─── Filter ──────────────────────────────────────────────────────────────────

/// Restricts a version's verses to a pool. Every populated criterion must
/// hold; an empty list means "no restriction" for that criterion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolFilter {
  /// Allowed book names (exact match).
  pub books:    Vec<String>,
  /// The text must contain at least one of these, case-insensitively.
  pub keywords: Vec<String>,
  pub length:   Option<LengthBounds>,
}

impl PoolFilter {
  /// The whole corpus for a version.
  pub fn unfiltered() -> Self { Self::default() }

  pub fn books<I, S>(books: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self {
      books: books.into_iter().map(Into::into).collect(),
      ..Self::default()
    }
  }

  pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.keywords = keywords.into_iter().map(Into::into).collect();
    self
  }

  pub fn with_length(mut self, length: Option<LengthBounds>) -> Self {
    self.length = length;
    self
  }

  pub fn is_unfiltered(&self) -> bool {
    self.books.is_empty() && self.keywords.is_empty() && self.length.is_none()
  }

  pub fn matches_book(&self, book: &str) -> bool {
    self.books.is_empty() || self.books.iter().any(|b| b == book)
  }

  pub fn matches_text(&self, text: &str) -> bool {
    if let Some(bounds) = self.length
      && !bounds.contains(text)
    {
      return false;
    }
    if self.keywords.is_empty() {
      return true;
    }
    let haystack = text.to_lowercase();
    self
      .keywords
      .iter()
      .any(|k| haystack.contains(&k.to_lowercase()))
  }

  pub fn matches(&self, verse: &BibleVerse) -> bool {
    self.matches_book(&verse.book) && self.matches_text(&verse.text)
  }
}

// ─── Version resolution ──────────────────────────────────────────────────────

/// Look up `code`, falling back to the lexicographically first version when
/// it is unknown. Fails only when no version exists at all.
pub async fn resolve_version<S>(store: &S, code: &str) -> Result<BibleVersion>
where
  S: VerseStore,
{
  if let Some(version) = store
    .get_version(code)
    .await
    .map_err(Error::store)?
  {
    return Ok(version);
  }

  let fallback = store
    .first_version()
    .await
    .map_err(Error::store)?
    .ok_or(Error::NoVersionAvailable)?;
  warn!(
    requested = code,
    fallback = %fallback.code,
    "unknown bible version, falling back to first available"
  );
  Ok(fallback)
}
