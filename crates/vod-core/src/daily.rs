//! Persisted selection records: the per-day cache row and the usage log.
//!
//! A [`DailyVerse`] is written once per `(date, church)` and doubles as the
//! audit trail. A [`VerseUsageRecord`] is appended alongside it and feeds the
//! repetition guard. Both are written in a single unit of work by
//! [`crate::store::VerseStore::commit_resolution`].

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::verse::VerseKey;

// ─── Cache row ───────────────────────────────────────────────────────────────

/// The resolved choice for one `(date, church)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyVerse {
  pub date:         NaiveDate,
  pub church_id:    i64,
  pub version_code: String,
  pub language:     String,
  /// Which selection path matched, e.g. `EVENT:mariage` or `DEFAULT`.
  pub context_key:  String,
  pub text:         String,
  pub reference:    String,
  pub created_at:   DateTime<Utc>,
}

/// Input to [`crate::store::VerseStore::commit_resolution`].
/// `created_at` is always set by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDailyVerse {
  pub date:         NaiveDate,
  pub church_id:    i64,
  pub version_code: String,
  pub language:     String,
  pub context_key:  String,
  pub text:         String,
  pub reference:    String,
  /// Natural key of the chosen verse, recorded in the usage log.
  pub key:          VerseKey,
}

// ─── Usage log ───────────────────────────────────────────────────────────────

/// One verse served to one church on one date. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerseUsageRecord {
  pub church_id:    i64,
  pub used_on:      NaiveDate,
  pub version_code: String,
  pub key:          VerseKey,
}

// ─── Public result ───────────────────────────────────────────────────────────

/// What callers of the selector receive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedVerse {
  pub date:        NaiveDate,
  pub version:     String,
  pub language:    String,
  pub context_key: String,
  pub text:        String,
  pub reference:   String,
}

impl From<DailyVerse> for ResolvedVerse {
  fn from(d: DailyVerse) -> Self {
    Self {
      date:        d.date,
      version:     d.version_code,
      language:    d.language,
      context_key: d.context_key,
      text:        d.text,
      reference:   d.reference,
    }
  }
}

impl From<&NewDailyVerse> for ResolvedVerse {
  fn from(d: &NewDailyVerse) -> Self {
    Self {
      date:        d.date,
      version:     d.version_code.clone(),
      language:    d.language.clone(),
      context_key: d.context_key.clone(),
      text:        d.text.clone(),
      reference:   d.reference.clone(),
    }
  }
}
