//! Anti-repetition: verses served to a church recently are excluded.
//!
//! Usage is tracked by natural key, so switching versions does not reset the
//! window. The window extends both ways from the resolution day. Recording happens inside
//! [`crate::store::VerseStore::commit_resolution`], atomically with the cache
//! write; this module only reads.

use std::collections::HashSet;

use chrono::{Days, NaiveDate};

use crate::{Error, Result, store::VerseStore, verse::VerseKey};

pub const DEFAULT_WINDOW_DAYS: u32 = 90;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepetitionGuard {
  window_days: u32,
}

impl Default for RepetitionGuard {
  fn default() -> Self { Self::new(DEFAULT_WINDOW_DAYS) }
}

impl RepetitionGuard {
  pub fn new(window_days: u32) -> Self { Self { window_days } }

  pub fn window_days(&self) -> u32 { self.window_days }

  /// The window `[on_date - window_days, on_date + window_days + 1)`, as a
  /// half-open date range. Later-dated usage counts too, so days resolved out
  /// of order still do not repeat each other.
  pub fn window(&self, on_date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let days = Days::new(u64::from(self.window_days));
    let from = on_date.checked_sub_days(days).unwrap_or(NaiveDate::MIN);
    let until = on_date
      .checked_add_days(days)
      .and_then(|d| d.succ_opt())
      .unwrap_or(NaiveDate::MAX);
    (from, until)
  }

  /// Natural keys of every verse served to `church_id` within the window,
  /// except on `on_date` itself: recomputing a day must not exclude its own
  /// verse.
  pub async fn exclusions_for<S>(
    &self,
    store: &S,
    church_id: i64,
    on_date: NaiveDate,
  ) -> Result<HashSet<VerseKey>>
  where
    S: VerseStore,
  {
    let (from, until) = self.window(on_date);
    let records = store
      .usage_between(church_id, from, until)
      .await
      .map_err(Error::store)?;
    Ok(
      records
        .into_iter()
        .filter(|r| r.used_on != on_date)
        .map(|r| r.key)
        .collect(),
    )
  }
}
