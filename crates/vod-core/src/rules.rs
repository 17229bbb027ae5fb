//! Rule tables driving context resolution.
//!
//! The tables are plain data handed to [`crate::context::ContextResolver`] at
//! construction. [`ContextRules::default`] carries the built-in French tables;
//! deployments may load their own from TOML.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

// ─── Themes ──────────────────────────────────────────────────────────────────

/// Pool criteria for an event theme: the verse must come from one of `books`
/// and contain at least one of `keywords` (case-insensitive).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemeRule {
  #[serde(default)]
  pub books:    Vec<String>,
  #[serde(default)]
  pub keywords: Vec<String>,
}

// ─── Seasons ─────────────────────────────────────────────────────────────────

/// A month/day pair, independent of the year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MonthDay {
  pub month: u32,
  pub day:   u32,
}

impl MonthDay {
  pub const fn new(month: u32, day: u32) -> Self { Self { month, day } }

  pub fn of(date: NaiveDate) -> Self { Self::new(date.month(), date.day()) }
}

/// A fixed liturgical window, inclusive at both ends. A window whose `start`
/// is after its `end` wraps over the new year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonWindow {
  pub name:  String,
  pub start: MonthDay,
  pub end:   MonthDay,
  pub books: Vec<String>,
}

impl SeasonWindow {
  pub fn contains(&self, date: NaiveDate) -> bool {
    let md = MonthDay::of(date);
    if self.start <= self.end {
      self.start <= md && md <= self.end
    } else {
      md >= self.start || md <= self.end
    }
  }
}

// ─── Weekdays ────────────────────────────────────────────────────────────────

/// Book allow-list for one day of the week (0 = Monday … 6 = Sunday).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekdayPool {
  pub weekday: u8,
  pub books:   Vec<String>,
}

// ─── Text length ─────────────────────────────────────────────────────────────

/// Inclusive bounds on verse length, in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LengthBounds {
  pub min: usize,
  pub max: usize,
}

impl LengthBounds {
  pub fn contains(&self, text: &str) -> bool {
    let n = text.chars().count();
    self.min <= n && n <= self.max
  }
}

// ─── Rule set ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextRules {
  #[serde(default)]
  pub themes:      BTreeMap<String, ThemeRule>,
  /// Checked in order; the first window containing the date wins.
  #[serde(default)]
  pub seasons:     Vec<SeasonWindow>,
  #[serde(default)]
  pub weekdays:    Vec<WeekdayPool>,
  /// Applied to every themed, seasonal and weekday pool. The default pool is
  /// never length-filtered.
  #[serde(default)]
  pub text_length: Option<LengthBounds>,
}

impl ContextRules {
  /// Rules with no themes, seasons or weekday pools: every resolution falls
  /// straight through to the default pool.
  pub fn empty() -> Self {
    Self {
      themes:      BTreeMap::new(),
      seasons:     Vec::new(),
      weekdays:    Vec::new(),
      text_length: None,
    }
  }

  pub fn theme(&self, tag: &str) -> Option<&ThemeRule> { self.themes.get(tag) }

  pub fn season_for(&self, date: NaiveDate) -> Option<&SeasonWindow> {
    self.seasons.iter().find(|s| s.contains(date))
  }

  pub fn weekday_books(&self, weekday: u8) -> Option<&[String]> {
    self
      .weekdays
      .iter()
      .find(|w| w.weekday == weekday)
      .map(|w| w.books.as_slice())
  }
}

fn strings(items: &[&str]) -> Vec<String> {
  items.iter().map(|s| (*s).to_owned()).collect()
}

fn theme(books: &[&str], keywords: &[&str]) -> ThemeRule {
  ThemeRule {
    books:    strings(books),
    keywords: strings(keywords),
  }
}

fn season(name: &str, start: MonthDay, end: MonthDay, books: &[&str]) -> SeasonWindow {
  SeasonWindow {
    name: name.to_owned(),
    start,
    end,
    books: strings(books),
  }
}

impl Default for ContextRules {
  fn default() -> Self {
    let themes = BTreeMap::from([
      (
        "mariage".to_owned(),
        theme(
          &["1 Corinthiens", "Genèse", "Cantique des Cantiques", "Éphésiens"],
          &["amour", "époux", "épouse", "union"],
        ),
      ),
      (
        "bapteme".to_owned(),
        theme(
          &["Actes", "Matthieu", "Marc"],
          &["baptême", "baptiser", "eau", "repentance"],
        ),
      ),
      (
        "jeunesse".to_owned(),
        theme(
          &["Proverbes", "1 Timothée"],
          &["jeune", "enfant", "jeunesse", "instruction"],
        ),
      ),
      (
        "deuil".to_owned(),
        theme(
          &["Psaumes", "1 Thessaloniciens", "Jean", "Apocalypse"],
          &["consolation", "espérance", "larmes", "mort", "résurrection"],
        ),
      ),
      (
        "mission".to_owned(),
        theme(
          &["Matthieu", "Actes", "Romains"],
          &["mission", "envoyer", "évangile", "nations"],
        ),
      ),
    ]);

    let seasons = vec![
      season(
        "ADVENT",
        MonthDay::new(12, 1),
        MonthDay::new(12, 31),
        &["Ésaïe", "Luc", "Matthieu", "Psaumes"],
      ),
      season(
        "CHRISTMAS",
        MonthDay::new(1, 1),
        MonthDay::new(1, 6),
        &["Luc", "Matthieu", "Ésaïe", "Jean", "Psaumes"],
      ),
      season(
        "LENT",
        MonthDay::new(2, 15),
        MonthDay::new(3, 31),
        &["Psaumes", "Ésaïe", "Matthieu", "Marc", "Luc"],
      ),
      season(
        "EASTER",
        MonthDay::new(3, 31),
        MonthDay::new(4, 30),
        &["Jean", "Luc", "Matthieu", "Actes", "1 Corinthiens", "Psaumes"],
      ),
      season(
        "PENTECOST",
        MonthDay::new(5, 19),
        MonthDay::new(5, 19),
        &["Actes", "Jean", "Romains", "Galates"],
      ),
    ];

    let weekdays = [
      (0, &["Proverbes"][..]),
      (1, &["Proverbes", "Jacques"][..]),
      (2, &["Proverbes", "Romains"][..]),
      (3, &["Proverbes", "Éphésiens"][..]),
      (4, &["Proverbes", "Philippiens", "Colossiens"][..]),
      (5, &["Psaumes", "Marc"][..]),
      (6, &["Psaumes", "Jean", "Actes"][..]),
    ]
    .into_iter()
    .map(|(weekday, books)| WeekdayPool { weekday, books: strings(books) })
    .collect();

    Self {
      themes,
      seasons,
      weekdays,
      text_length: Some(LengthBounds { min: 40, max: 240 }),
    }
  }
}
