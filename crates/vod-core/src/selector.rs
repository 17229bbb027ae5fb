//! [`VerseOfDaySelector`], the orchestrator behind `pick_for_church`.
//!
//! Pipeline: cache check → exclusions → candidate contexts in priority order
//! → first non-empty pick → atomic persist. If every context is exhausted the
//! whole corpus is tried again without exclusions; only an empty corpus is
//! an error.

use std::{collections::HashSet, sync::Arc};

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::{
  Error, Result,
  church::Church,
  context::{ContextKey, ContextResolver},
  corpus::{PoolFilter, resolve_version},
  daily::{NewDailyVerse, ResolvedVerse},
  picker::{Seed, pick},
  repetition::RepetitionGuard,
  rules::ContextRules,
  store::VerseStore,
  verse::BibleVerse,
};

pub const DEFAULT_VERSION: &str = "LSG";
pub const DEFAULT_LANGUAGE: &str = "fr";

/// Selects and caches the verse of the day per church.
pub struct VerseOfDaySelector<S> {
  store:    Arc<S>,
  resolver: ContextResolver,
  guard:    RepetitionGuard,
}

impl<S> Clone for VerseOfDaySelector<S> {
  fn clone(&self) -> Self {
    Self {
      store:    Arc::clone(&self.store),
      resolver: self.resolver.clone(),
      guard:    self.guard,
    }
  }
}

impl<S: VerseStore> VerseOfDaySelector<S> {
  pub fn new(store: Arc<S>, rules: ContextRules) -> Self {
    Self {
      store,
      resolver: ContextResolver::new(rules),
      guard: RepetitionGuard::default(),
    }
  }

  pub fn with_window_days(mut self, window_days: u32) -> Self {
    self.guard = RepetitionGuard::new(window_days);
    self
  }

  pub fn store(&self) -> &Arc<S> { &self.store }

  /// The verse of the day for `church`. Idempotent within a day: the first
  /// resolution is cached and every later call returns it verbatim.
  pub async fn pick_for_church(
    &self,
    church: &Church,
    on_date: NaiveDate,
    version_code: &str,
    language: &str,
  ) -> Result<ResolvedVerse> {
    if let Some(cached) = self
      .store
      .get_daily_verse(church.church_id, on_date)
      .await
      .map_err(Error::store)?
    {
      debug!(church = church.church_id, %on_date, "daily verse cache hit");
      return Ok(cached.into());
    }

    let chosen = self
      .compute_for_church(church, on_date, version_code, language)
      .await?;
    let stored = self
      .store
      .commit_resolution(chosen, false)
      .await
      .map_err(Error::store)?;
    info!(
      church = church.church_id,
      %on_date,
      context = %stored.context_key,
      reference = %stored.reference,
      "resolved verse of the day"
    );
    Ok(stored.into())
  }

  /// Ignore the cache, select again, and overwrite the `(date, church)` row.
  pub async fn recompute_for_church(
    &self,
    church: &Church,
    on_date: NaiveDate,
    version_code: &str,
    language: &str,
  ) -> Result<ResolvedVerse> {
    let chosen = self
      .compute_for_church(church, on_date, version_code, language)
      .await?;
    let stored = self
      .store
      .commit_resolution(chosen, true)
      .await
      .map_err(Error::store)?;
    info!(
      church = church.church_id,
      %on_date,
      context = %stored.context_key,
      reference = %stored.reference,
      "recomputed verse of the day"
    );
    Ok(stored.into())
  }

  /// What `pick_for_church` would return, without writing anything.
  pub async fn preview_for_church(
    &self,
    church: &Church,
    on_date: NaiveDate,
    version_code: &str,
    language: &str,
  ) -> Result<ResolvedVerse> {
    if let Some(cached) = self
      .store
      .get_daily_verse(church.church_id, on_date)
      .await
      .map_err(Error::store)?
    {
      return Ok(cached.into());
    }
    let chosen = self
      .compute_for_church(church, on_date, version_code, language)
      .await?;
    Ok(ResolvedVerse::from(&chosen))
  }

  /// Run the selection pipeline against the current usage history. Reads
  /// only; nothing is cached or recorded.
  pub async fn compute_for_church(
    &self,
    church: &Church,
    on_date: NaiveDate,
    version_code: &str,
    language: &str,
  ) -> Result<NewDailyVerse> {
    let store = self.store.as_ref();
    let version = resolve_version(store, version_code).await?;
    let exclude = self
      .guard
      .exclusions_for(store, church.church_id, on_date)
      .await?;

    let mut default_pool: Option<Vec<BibleVerse>> = None;

    for candidate in self.resolver.candidates(church, on_date) {
      let context_key = candidate.key.to_string();
      let pool = store
        .verses_for(&version.code, &candidate.filter)
        .await
        .map_err(Error::store)?;

      let seed = Seed {
        on_date,
        version_code: &version.code,
        language,
        context_key: &context_key,
        church_id: church.church_id,
      };
      if let Some(verse) = pick(&pool, &seed, &exclude) {
        return Ok(resolution(church, on_date, language, context_key, verse));
      }

      debug!(
        church = church.church_id,
        context = %context_key,
        pool = pool.len(),
        excluded = exclude.len(),
        "context pool exhausted"
      );
      if candidate.key == ContextKey::Default {
        default_pool = Some(pool);
      }
    }

    // Every pool is exhausted by exclusions: ignore them.
    let pool = match default_pool {
      Some(pool) => pool,
      None => store
        .verses_for(&version.code, &PoolFilter::unfiltered())
        .await
        .map_err(Error::store)?,
    };
    let context_key = ContextKey::Default.to_string();
    let seed = Seed {
      on_date,
      version_code: &version.code,
      language,
      context_key: &context_key,
      church_id: church.church_id,
    };
    let verse = pick(&pool, &seed, &HashSet::new())
      .ok_or_else(|| Error::NoVersesAvailable(version.code.clone()))?;
    debug!(
      church = church.church_id,
      "repetition window exhausted the corpus, ignoring exclusions"
    );
    Ok(resolution(church, on_date, language, context_key, verse))
  }
}

fn resolution(
  church: &Church,
  on_date: NaiveDate,
  language: &str,
  context_key: String,
  verse: &BibleVerse,
) -> NewDailyVerse {
  NewDailyVerse {
    date: on_date,
    church_id: church.church_id,
    version_code: verse.version_code.clone(),
    language: language.to_owned(),
    context_key,
    text: verse.text.clone(),
    reference: verse.reference(),
    key: verse.key(),
  }
}
