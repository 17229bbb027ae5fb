//! Bible versions and verses: the read-only corpus the selector draws from.
//!
//! Versions and verses are written by an import pipeline that lives outside
//! this crate. The selector only ever reads them.

use std::fmt;

use serde::{Deserialize, Serialize};

// ─── Version ─────────────────────────────────────────────────────────────────

/// A translation of the bible, e.g. `LSG` (Louis Segond 1910).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BibleVersion {
  /// Short unique code.
  pub code:         String,
  pub name:         String,
  pub language:     String,
  /// Cached verse count, maintained by the importer.
  pub total_verses: u32,
  /// Content fingerprint; changes whenever the verses are re-imported with
  /// different content.
  pub etag:         String,
}

// ─── Natural key ─────────────────────────────────────────────────────────────

/// Identifies a verse independently of the version it was read from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VerseKey {
  pub book:    String,
  pub chapter: u32,
  pub verse:   u32,
}

impl fmt::Display for VerseKey {
  /// Human-readable reference, e.g. `Jean 3:16`.
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} {}:{}", self.book, self.chapter, self.verse)
  }
}

// ─── Verse ───────────────────────────────────────────────────────────────────

/// One verse of one version. `(version_code, book, chapter, verse)` is unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BibleVerse {
  pub version_code: String,
  pub book:         String,
  pub chapter:      u32,
  pub verse:        u32,
  pub text:         String,
}

impl BibleVerse {
  pub fn key(&self) -> VerseKey {
    VerseKey {
      book:    self.book.clone(),
      chapter: self.chapter,
      verse:   self.verse,
    }
  }

  /// The `"Book chapter:verse"` reference string.
  pub fn reference(&self) -> String { self.key().to_string() }
}

/// Input row for the importer; the version is given separately.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewVerse {
  pub book:    String,
  pub chapter: u32,
  pub verse:   u32,
  pub text:    String,
}

/// Input to the importer describing the version itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewVersion {
  pub code:     String,
  pub name:     String,
  pub language: String,
}
