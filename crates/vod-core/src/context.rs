//! Context resolution: which pools to try, in which order, for a church on a
//! given date.
//!
//! Priority is fixed: event themes, then the liturgical season, then the day
//! of the week, then the whole corpus. [`ContextResolver::candidates`] yields
//! them lazily so later pools are never built when an earlier one wins.

use std::{collections::VecDeque, fmt, sync::Arc};

use chrono::{Datelike, Days, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::{church::Church, corpus::PoolFilter, rules::ContextRules};

/// Events starting this many days before the date still count.
pub const EVENT_LOOKBACK_DAYS: u64 = 7;
/// The event window ends this many days after the date (exclusive).
pub const EVENT_LOOKAHEAD_DAYS: u64 = 1;
/// Only the most recent events in the window are considered.
pub const MAX_EVENTS: usize = 3;

// ─── Context key ─────────────────────────────────────────────────────────────

/// Identifies the selection rule that produced a verse. Rendered as
/// `EVENT:<theme>`, `SEASON:<name>`, `WEEKDAY:<n>` or `DEFAULT`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ContextKey {
  Event(String),
  Season(String),
  /// 0 = Monday … 6 = Sunday.
  Weekday(u8),
  Default,
}

impl fmt::Display for ContextKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Event(theme) => write!(f, "EVENT:{theme}"),
      Self::Season(name) => write!(f, "SEASON:{name}"),
      Self::Weekday(n) => write!(f, "WEEKDAY:{n}"),
      Self::Default => f.write_str("DEFAULT"),
    }
  }
}

/// One context to try: its key and the pool it selects from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
  pub key:    ContextKey,
  pub filter: PoolFilter,
}

// ─── Resolver ────────────────────────────────────────────────────────────────

/// Enumerates candidate contexts from an injected rule set.
///
/// Cloning is cheap; the rules are reference-counted.
#[derive(Debug, Clone)]
pub struct ContextResolver {
  rules: Arc<ContextRules>,
}

impl Default for ContextResolver {
  fn default() -> Self { Self::new(ContextRules::default()) }
}

impl ContextResolver {
  pub fn new(rules: ContextRules) -> Self { Self { rules: Arc::new(rules) } }

  pub fn rules(&self) -> &ContextRules { &self.rules }

  /// Candidates for `church` on `date`, highest priority first. The last
  /// candidate is always [`ContextKey::Default`] with no filter.
  pub fn candidates<'a>(&'a self, church: &'a Church, date: NaiveDate) -> Candidates<'a> {
    Candidates {
      rules: &self.rules,
      church,
      date,
      stage: Stage::Events,
      themes: VecDeque::new(),
    }
  }

  /// Matched event themes for `church` around `date`, deduplicated, in
  /// priority order.
  pub fn event_themes(&self, church: &Church, date: NaiveDate) -> Vec<String> {
    event_themes(&self.rules, church, date).into()
  }
}

fn event_themes(rules: &ContextRules, church: &Church, date: NaiveDate) -> VecDeque<String> {
  let start = (date - Days::new(EVENT_LOOKBACK_DAYS)).and_time(NaiveTime::MIN);
  let end = (date + Days::new(EVENT_LOOKAHEAD_DAYS)).and_time(NaiveTime::MIN);

  let mut themes = VecDeque::new();
  for event in church.events_in_window(start, end).into_iter().take(MAX_EVENTS) {
    for tag in &event.tags {
      let tag = tag.trim().to_lowercase();
      if rules.theme(&tag).is_some() && !themes.contains(&tag) {
        themes.push_back(tag);
      }
    }
  }
  themes
}

// ─── Lazy iteration ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
  Events,
  EventThemes,
  Season,
  Weekday,
  Default,
  Done,
}

/// Iterator returned by [`ContextResolver::candidates`].
#[derive(Debug)]
pub struct Candidates<'a> {
  rules:  &'a ContextRules,
  church: &'a Church,
  date:   NaiveDate,
  stage:  Stage,
  themes: VecDeque<String>,
}

impl Iterator for Candidates<'_> {
  type Item = Candidate;

  fn next(&mut self) -> Option<Candidate> {
    loop {
      match self.stage {
        Stage::Events => {
          self.themes = event_themes(self.rules, self.church, self.date);
          self.stage = Stage::EventThemes;
        }
        Stage::EventThemes => {
          let Some(theme) = self.themes.pop_front() else {
            self.stage = Stage::Season;
            continue;
          };
          let Some(rule) = self.rules.theme(&theme) else {
            continue;
          };
          let filter = PoolFilter::books(rule.books.iter().cloned())
            .with_keywords(rule.keywords.iter().cloned())
            .with_length(self.rules.text_length);
          return Some(Candidate { key: ContextKey::Event(theme), filter });
        }
        Stage::Season => {
          self.stage = Stage::Weekday;
          if let Some(season) = self.rules.season_for(self.date) {
            let filter = PoolFilter::books(season.books.iter().cloned())
              .with_length(self.rules.text_length);
            return Some(Candidate {
              key: ContextKey::Season(season.name.clone()),
              filter,
            });
          }
        }
        Stage::Weekday => {
          self.stage = Stage::Default;
          let weekday = self.date.weekday().num_days_from_monday() as u8;
          if let Some(books) = self.rules.weekday_books(weekday) {
            let filter = PoolFilter::books(books.iter().cloned())
              .with_length(self.rules.text_length);
            return Some(Candidate { key: ContextKey::Weekday(weekday), filter });
          }
        }
        Stage::Default => {
          self.stage = Stage::Done;
          return Some(Candidate {
            key:    ContextKey::Default,
            filter: PoolFilter::unfiltered(),
          });
        }
        Stage::Done => return None,
      }
    }
  }
}
