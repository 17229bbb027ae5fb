//! The `VerseStore` trait: the persistence contract of the selector.
//!
//! The trait is implemented by storage backends (e.g. `vod-store-sqlite`).
//! The selector and the batch job depend on this abstraction, not on any
//! concrete backend.

use std::future::Future;

use chrono::NaiveDate;

use crate::{
  church::{Church, DisplayedVerse},
  corpus::PoolFilter,
  daily::{DailyVerse, NewDailyVerse, VerseUsageRecord},
  verse::{BibleVerse, BibleVersion},
};

/// Abstraction over the selector's storage backend.
///
/// The corpus side is read-only. Cache rows are written only through
/// [`VerseStore::commit_resolution`], which also appends the usage record in
/// the same unit of work.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes.
pub trait VerseStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Corpus ────────────────────────────────────────────────────────────

  /// Look up a version by its exact code.
  fn get_version<'a>(
    &'a self,
    code: &'a str,
  ) -> impl Future<Output = Result<Option<BibleVersion>, Self::Error>> + Send + 'a;

  /// The version whose code sorts first, if any version exists.
  fn first_version(
    &self,
  ) -> impl Future<Output = Result<Option<BibleVersion>, Self::Error>> + Send + '_;

  fn version_exists<'a>(
    &'a self,
    code: &'a str,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a {
    async move { Ok(self.get_version(code).await?.is_some()) }
  }

  /// All verses of `version_code` matching `filter`, in a stable order
  /// (ascending import order). The selector indexes into this sequence by
  /// position, so the order must not change between calls.
  fn verses_for<'a>(
    &'a self,
    version_code: &'a str,
    filter: &'a PoolFilter,
  ) -> impl Future<Output = Result<Vec<BibleVerse>, Self::Error>> + Send + 'a;

  // ── Daily cache ───────────────────────────────────────────────────────

  /// The cached resolution for `(church, date)`, if any.
  fn get_daily_verse(
    &self,
    church_id: i64,
    date: NaiveDate,
  ) -> impl Future<Output = Result<Option<DailyVerse>, Self::Error>> + Send + '_;

  /// Atomically write the cache row for `(input.date, input.church_id)` and
  /// append the matching usage record.
  ///
  /// - `overwrite == false`: get-or-create. If a row already exists it is
  ///   returned untouched and no usage is appended.
  /// - `overwrite == true`: the existing row's fields are replaced (forced
  ///   recomputation).
  ///
  /// Returns the row as stored after the write.
  fn commit_resolution(
    &self,
    input: NewDailyVerse,
    overwrite: bool,
  ) -> impl Future<Output = Result<DailyVerse, Self::Error>> + Send + '_;

  /// Cache rows for a church, newest date first.
  fn daily_verse_history(
    &self,
    church_id: i64,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<DailyVerse>, Self::Error>> + Send + '_;

  // ── Usage log ─────────────────────────────────────────────────────────

  /// Usage records for a church with `from <= used_on < until`.
  fn usage_between(
    &self,
    church_id: i64,
    from: NaiveDate,
    until: NaiveDate,
  ) -> impl Future<Output = Result<Vec<VerseUsageRecord>, Self::Error>> + Send + '_;

  // ── Churches ──────────────────────────────────────────────────────────

  /// All churches with their events, ordered by id.
  fn list_churches(
    &self,
  ) -> impl Future<Output = Result<Vec<Church>, Self::Error>> + Send + '_;

  fn get_church(
    &self,
    church_id: i64,
  ) -> impl Future<Output = Result<Option<Church>, Self::Error>> + Send + '_;

  /// Replace the verse currently displayed for a church.
  fn set_displayed_verse(
    &self,
    church_id: i64,
    displayed: DisplayedVerse,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}
