//! Deterministic, hash-seeded selection from a pool.
//!
//! The seed string combines the date, version, language, context and church,
//! so the same church gets the same verse for the same day and context
//! without storing any randomness. The hash function is part of the
//! persisted contract: changing it changes every historical assignment.

use std::collections::HashSet;

use chrono::NaiveDate;
use sha2::{Digest, Sha256};

use crate::verse::{BibleVerse, VerseKey};

/// Everything that feeds the seed.
#[derive(Debug, Clone, Copy)]
pub struct Seed<'a> {
  pub on_date:      NaiveDate,
  pub version_code: &'a str,
  pub language:     &'a str,
  pub context_key:  &'a str,
  pub church_id:    i64,
}

impl Seed<'_> {
  /// `"<date>|<version>|<language>|<context>|EGLISE:<church>"`
  pub fn seed_string(&self) -> String {
    format!(
      "{}|{}|{}|{}|EGLISE:{}",
      self.on_date.format("%Y-%m-%d"),
      self.version_code,
      self.language,
      self.context_key,
      self.church_id
    )
  }

  /// The first 8 hex digits of the SHA-256 digest of the seed string.
  pub fn value(&self) -> u64 { seed_int(&self.seed_string()) }
}

pub fn seed_int(s: &str) -> u64 {
  let digest = hex::encode(Sha256::digest(s.as_bytes()));
  // A hex digest is always 64 ASCII hex digits.
  u64::from_str_radix(&digest[..8], 16).unwrap_or_default()
}

/// Pick one verse from `pool`, skipping any whose natural key is in
/// `exclude`. Returns `None` if nothing remains.
///
/// The remaining verses keep their pool order; the result is the one at
/// `seed mod remaining`.
pub fn pick<'p>(
  pool: &'p [BibleVerse],
  seed: &Seed<'_>,
  exclude: &HashSet<VerseKey>,
) -> Option<&'p BibleVerse> {
  let eligible: Vec<&BibleVerse> = if exclude.is_empty() {
    pool.iter().collect()
  } else {
    pool.iter().filter(|v| !exclude.contains(&v.key())).collect()
  };
  if eligible.is_empty() {
    return None;
  }
  let offset = (seed.value() % eligible.len() as u64) as usize;
  Some(eligible[offset])
}
