//! The daily batch: resolve every church, refresh its displayed verse and
//! notify members when it changed.
//!
//! Failures are isolated per church. Notifications are dispatched only after
//! every church's writes have committed, so nothing is ever announced that
//! could still be rolled back.

use std::{collections::BTreeMap, future::Future};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
  Error, Result,
  church::{Church, DisplayedVerse},
  daily::ResolvedVerse,
  selector::VerseOfDaySelector,
  store::VerseStore,
};

// ─── Notification sink ───────────────────────────────────────────────────────

/// Delivers a verse to a church's members (push topic, e-mail, ...).
pub trait Notifier: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn notify<'a>(
    &'a self,
    church: &'a Church,
    verse: &'a ResolvedVerse,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}

// ─── Options & summary ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOptions {
  /// Recompute the cached verse and rewrite the displayed verse even when
  /// nothing changed.
  pub force_update: bool,
  /// Notify even when the displayed verse did not change.
  pub force_notify: bool,
  /// Compute and count only: no writes, no notifications.
  pub dry_run:      bool,
}

impl BatchOptions {
  /// Recompute and re-notify everything.
  pub fn forced() -> Self {
    Self {
      force_update: true,
      force_notify: true,
      dry_run:      false,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChurchFailure {
  pub church_id: i64,
  pub error:     String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
  pub total:              usize,
  /// Churches whose displayed verse was (or, in a dry run, would be)
  /// rewritten.
  pub updated_count:      usize,
  /// Notifications delivered (or, in a dry run, that would be sent).
  pub notified_count:     usize,
  pub notify_failures:    usize,
  /// Resolved churches per context key.
  pub per_context_counts: BTreeMap<String, usize>,
  pub failures:           Vec<ChurchFailure>,
}

// ─── Batch ───────────────────────────────────────────────────────────────────

/// Collapse runs of whitespace so formatting noise is not seen as a change.
fn normalize(s: &str) -> String { s.split_whitespace().collect::<Vec<_>>().join(" ") }

/// `true` if `displayed` differs from `resolved` for `on_date`.
pub fn displayed_changed(
  displayed: Option<&DisplayedVerse>,
  resolved: &ResolvedVerse,
  on_date: NaiveDate,
) -> bool {
  match displayed {
    None => true,
    Some(d) => {
      d.date != on_date
        || normalize(&d.reference) != normalize(&resolved.reference)
        || normalize(&d.text) != normalize(&resolved.text)
    }
  }
}

struct Outcome {
  resolved: ResolvedVerse,
  updated:  bool,
  notify:   bool,
}

async fn process_church<S>(
  selector: &VerseOfDaySelector<S>,
  church: &Church,
  version_code: &str,
  language: &str,
  on_date: NaiveDate,
  options: BatchOptions,
) -> Result<Outcome>
where
  S: VerseStore,
{
  let resolved = if options.dry_run {
    selector
      .preview_for_church(church, on_date, version_code, language)
      .await?
  } else if options.force_update {
    selector
      .recompute_for_church(church, on_date, version_code, language)
      .await?
  } else {
    selector
      .pick_for_church(church, on_date, version_code, language)
      .await?
  };

  let changed = displayed_changed(church.displayed.as_ref(), &resolved, on_date);
  let updated = changed || options.force_update;
  let notify = changed || options.force_notify;

  if updated && !options.dry_run {
    selector
      .store()
      .set_displayed_verse(church.church_id, DisplayedVerse {
        date:      on_date,
        text:      resolved.text.clone(),
        reference: resolved.reference.clone(),
      })
      .await
      .map_err(Error::store)?;
  }

  Ok(Outcome { resolved, updated, notify })
}

/// Resolve the verse of the day for every church and notify those whose
/// displayed verse changed.
///
/// Fails only if the church list itself cannot be read; per-church errors
/// are collected in [`BatchSummary::failures`].
pub async fn update_all_churches<S, N>(
  selector: &VerseOfDaySelector<S>,
  notifier: &N,
  version_code: &str,
  language: &str,
  on_date: NaiveDate,
  options: BatchOptions,
) -> Result<BatchSummary>
where
  S: VerseStore,
  N: Notifier,
{
  let churches = selector
    .store()
    .list_churches()
    .await
    .map_err(Error::store)?;

  let mut summary = BatchSummary { total: churches.len(), ..BatchSummary::default() };
  let mut to_notify: Vec<(&Church, ResolvedVerse)> = Vec::new();

  for church in &churches {
    match process_church(selector, church, version_code, language, on_date, options).await {
      Ok(outcome) => {
        *summary
          .per_context_counts
          .entry(outcome.resolved.context_key.clone())
          .or_default() += 1;
        if outcome.updated {
          summary.updated_count += 1;
        }
        if outcome.notify {
          to_notify.push((church, outcome.resolved));
        }
      }
      Err(e) => {
        warn!(church = church.church_id, error = %e, "verse of the day resolution failed");
        summary.failures.push(ChurchFailure {
          church_id: church.church_id,
          error:     e.to_string(),
        });
      }
    }
  }

  if options.dry_run {
    summary.notified_count = to_notify.len();
  } else {
    for (church, verse) in &to_notify {
      match notifier.notify(church, verse).await {
        Ok(()) => summary.notified_count += 1,
        Err(e) => {
          summary.notify_failures += 1;
          warn!(church = church.church_id, error = %e, "notification failed");
        }
      }
    }
  }

  let contexts = summary
    .per_context_counts
    .iter()
    .map(|(k, v)| format!("{k}={v}"))
    .collect::<Vec<_>>()
    .join(", ");
  info!(
    dry_run = options.dry_run,
    total = summary.total,
    updated = summary.updated_count,
    notified = summary.notified_count,
    notify_failed = summary.notify_failures,
    failed = summary.failures.len(),
    %contexts,
    "daily verse batch finished"
  );

  Ok(summary)
}
