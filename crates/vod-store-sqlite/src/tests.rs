//! Integration tests for `SqliteStore` and the selection pipeline against an
//! in-memory database.

use std::{collections::HashSet, sync::Mutex};

use chrono::{Days, NaiveDate, NaiveDateTime};
use vod_core::{
  Error as CoreError,
  batch::{BatchOptions, Notifier, update_all_churches},
  church::{Church, ChurchEvent, DisplayedVerse},
  corpus::{PoolFilter, resolve_version},
  daily::{DailyVerse, NewDailyVerse, ResolvedVerse, VerseUsageRecord},
  picker::Seed,
  rules::ContextRules,
  selector::VerseOfDaySelector,
  store::VerseStore,
  verse::{BibleVerse, BibleVersion, NewVerse, NewVersion, VerseKey},
};

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn d(y: i32, m: u32, day: u32) -> NaiveDate { NaiveDate::from_ymd_opt(y, m, day).unwrap() }

fn at(date: NaiveDate, h: u32) -> NaiveDateTime { date.and_hms_opt(h, 0, 0).unwrap() }

/// A Tuesday outside every default season window.
fn tuesday() -> NaiveDate { d(2025, 7, 8) }

fn lsg() -> NewVersion {
  NewVersion {
    code:     "LSG".into(),
    name:     "Louis Segond 1910".into(),
    language: "fr".into(),
  }
}

fn new_verse(book: &str, chapter: u32, verse: u32, text: &str) -> NewVerse {
  NewVerse {
    book: book.into(),
    chapter,
    verse,
    text: text.into(),
  }
}

/// `n` Jude verses, each long enough for the default length bounds.
fn jude(n: u32) -> Vec<NewVerse> {
  (1..=n)
    .map(|v| {
      new_verse(
        "Jude",
        1,
        v,
        &format!("Verset {v} : que la miséricorde, la paix et la charité vous soient multipliées."),
      )
    })
    .collect()
}

fn selector(store: &SqliteStore) -> VerseOfDaySelector<SqliteStore> {
  VerseOfDaySelector::new(std::sync::Arc::new(store.clone()), ContextRules::default())
}

// ─── Corpus ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn import_maintains_total_and_etag() {
  let s = store().await;
  let v1 = s.import_version(lsg(), jude(3)).await.unwrap();
  assert_eq!(v1.total_verses, 3);
  assert_eq!(v1.etag.len(), 64);

  // Same content again: nothing changes.
  let again = s.import_version(lsg(), jude(3)).await.unwrap();
  assert_eq!(again.etag, v1.etag);

  // A text correction keeps the count and the order but changes the etag.
  let corrected = s
    .import_version(lsg(), vec![new_verse("Jude", 1, 2, "Texte corrigé du deuxième verset de Jude, assez long.")])
    .await
    .unwrap();
  assert_eq!(corrected.total_verses, 3);
  assert_ne!(corrected.etag, v1.etag);

  let all = s.verses_for("LSG", &PoolFilter::unfiltered()).await.unwrap();
  let order: Vec<u32> = all.iter().map(|v| v.verse).collect();
  assert_eq!(order, vec![1, 2, 3]);
  assert!(all[1].text.starts_with("Texte corrigé"));
}

#[tokio::test]
async fn verses_for_filters_books_keywords_and_keeps_order() {
  let s = store().await;
  s.import_version(lsg(), vec![
    new_verse("Actes", 8, 36, "Voici de l'eau ; qu'est-ce qui empêche que je sois baptisé ?"),
    new_verse("Jean", 3, 16, "Car Dieu a tant aimé le monde qu'il a donné son Fils unique."),
    new_verse("Actes", 2, 38, "Pierre leur dit : Repentez-vous, et que chacun de vous soit baptisé."),
    new_verse("Matthieu", 3, 16, "Dès que Jésus eut été baptisé, il sortit de l'EAU."),
  ])
  .await
  .unwrap();

  let actes = s.verses_for("LSG", &PoolFilter::books(["Actes"])).await.unwrap();
  let refs: Vec<String> = actes.iter().map(BibleVerse::reference).collect();
  assert_eq!(refs, vec!["Actes 8:36", "Actes 2:38"]);

  let water = s
    .verses_for("LSG", &PoolFilter::books(["Actes", "Matthieu"]).with_keywords(["eau"]))
    .await
    .unwrap();
  let refs: Vec<String> = water.iter().map(BibleVerse::reference).collect();
  assert_eq!(refs, vec!["Actes 8:36", "Matthieu 3:16"]);

  assert!(s.verses_for("BDS", &PoolFilter::unfiltered()).await.unwrap().is_empty());
}

#[tokio::test]
async fn unknown_version_falls_back_to_first_code() {
  let s = store().await;
  s.import_version(lsg(), jude(1)).await.unwrap();
  s.import_version(
    NewVersion { code: "BDS".into(), name: "Bible du Semeur".into(), language: "fr".into() },
    jude(1),
  )
  .await
  .unwrap();

  assert!(s.version_exists("LSG").await.unwrap());
  assert!(!s.version_exists("KJV").await.unwrap());

  let resolved: BibleVersion = resolve_version(&s, "KJV").await.unwrap();
  assert_eq!(resolved.code, "BDS");
  assert_eq!(resolve_version(&s, "LSG").await.unwrap().code, "LSG");
}

// ─── Selection ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn tiny_corpus_falls_through_to_default() {
  let s = store().await;
  s.import_version(lsg(), jude(3)).await.unwrap();
  let sel = selector(&s);
  let church = s.add_church("Abidjan Centre").await.unwrap();

  let got = sel.pick_for_church(&church, tuesday(), "LSG", "fr").await.unwrap();
  assert_eq!(got.context_key, "DEFAULT");

  let seed = Seed {
    on_date:      tuesday(),
    version_code: "LSG",
    language:     "fr",
    context_key:  "DEFAULT",
    church_id:    church.church_id,
  };
  let expected = (seed.value() % 3) as u32 + 1;
  assert_eq!(got.reference, format!("Jude 1:{expected}"));
}

#[tokio::test]
async fn weekday_pool_is_used_when_it_has_verses() {
  let s = store().await;
  let mut verses = jude(3);
  verses.push(new_verse(
    "Proverbes",
    3,
    5,
    "Confie-toi en l'Éternel de tout ton cœur, et ne t'appuie pas sur ta sagesse.",
  ));
  s.import_version(lsg(), verses).await.unwrap();
  let church = s.add_church("Yopougon").await.unwrap();

  // 2025-07-07 is a Monday: Proverbes only.
  let got = selector(&s)
    .pick_for_church(&church, d(2025, 7, 7), "LSG", "fr")
    .await
    .unwrap();
  assert_eq!(got.context_key, "WEEKDAY:0");
  assert_eq!(got.reference, "Proverbes 3:5");
}

#[tokio::test]
async fn season_beats_weekday() {
  let s = store().await;
  let mut verses = jude(3);
  verses.push(new_verse(
    "Ésaïe",
    9,
    5,
    "Car un enfant nous est né, un fils nous est donné, et la domination reposera sur son épaule.",
  ));
  verses.push(new_verse(
    "Psaumes",
    23,
    1,
    "L'Éternel est mon berger : je ne manquerai de rien. Il me fait reposer.",
  ));
  s.import_version(lsg(), verses).await.unwrap();
  let church = s.add_church("Cocody").await.unwrap();

  // Sunday in Advent; Sunday's weekday pool (Psaumes) also matches.
  let got = selector(&s)
    .pick_for_church(&church, d(2025, 12, 14), "LSG", "fr")
    .await
    .unwrap();
  assert_eq!(got.context_key, "SEASON:ADVENT");
}

#[tokio::test]
async fn event_theme_has_priority() {
  let s = store().await;
  let mut verses = jude(5);
  verses.push(new_verse(
    "Actes",
    8,
    36,
    "Comme ils continuaient leur chemin, ils rencontrèrent de l'eau. Et l'eunuque dit : Voici de l'eau.",
  ));
  s.import_version(lsg(), verses).await.unwrap();
  let church = s.add_church("Marcory").await.unwrap();
  s.add_event(church.church_id, ChurchEvent {
    title:     "Baptêmes au fleuve".into(),
    starts_at: at(d(2025, 7, 6), 9),
    ends_at:   at(d(2025, 7, 6), 12),
    tags:      vec!["bapteme".into()],
  })
  .await
  .unwrap();
  let church = s.get_church(church.church_id).await.unwrap().unwrap();

  let got = selector(&s)
    .pick_for_church(&church, tuesday(), "LSG", "fr")
    .await
    .unwrap();
  assert_eq!(got.context_key, "EVENT:bapteme");
  assert_eq!(got.reference, "Actes 8:36");
}

#[tokio::test]
async fn exhausted_event_pool_falls_through() {
  let s = store().await;
  s.import_version(lsg(), jude(5)).await.unwrap();
  let church = s.add_church("Treichville").await.unwrap();
  s.add_event(church.church_id, ChurchEvent {
    title:     "Mariage".into(),
    starts_at: at(tuesday(), 14),
    ends_at:   at(tuesday(), 18),
    tags:      vec!["mariage".into()],
  })
  .await
  .unwrap();
  let church = s.get_church(church.church_id).await.unwrap().unwrap();

  let got = selector(&s)
    .pick_for_church(&church, tuesday(), "LSG", "fr")
    .await
    .unwrap();
  assert_eq!(got.context_key, "DEFAULT");
}

#[tokio::test]
async fn computed_pick_is_deterministic() {
  let s = store().await;
  s.import_version(lsg(), jude(30)).await.unwrap();
  let sel = selector(&s);
  let church = s.add_church("Plateau").await.unwrap();

  let picked = sel.pick_for_church(&church, tuesday(), "LSG", "fr").await.unwrap();
  // Recompute from scratch, ignoring the cache row just written.
  let computed = sel
    .compute_for_church(&church, tuesday(), "LSG", "fr")
    .await
    .unwrap();
  assert_eq!(ResolvedVerse::from(&computed), picked);

  // A fresh store with the same corpus and history picks the same verse.
  let other = store().await;
  other.import_version(lsg(), jude(30)).await.unwrap();
  let same_church = other.add_church("Plateau").await.unwrap();
  assert_eq!(same_church.church_id, church.church_id);
  let again = selector(&other)
    .pick_for_church(&same_church, tuesday(), "LSG", "fr")
    .await
    .unwrap();
  assert_eq!(again, picked);
}

#[tokio::test]
async fn cache_hit_returns_the_original_resolution() {
  let s = store().await;
  s.import_version(lsg(), jude(30)).await.unwrap();
  let sel = selector(&s);
  let church = s.add_church("Bingerville").await.unwrap();

  let first = sel.pick_for_church(&church, tuesday(), "LSG", "fr").await.unwrap();
  let cached: DailyVerse = s.get_daily_verse(church.church_id, tuesday()).await.unwrap().unwrap();
  assert_eq!(cached.text, first.text);
  assert_eq!(cached.reference, first.reference);
  assert_eq!(cached.context_key, first.context_key);

  // Even a different requested language is served from the cache that day.
  for _ in 0..3 {
    let again = sel.pick_for_church(&church, tuesday(), "LSG", "en").await.unwrap();
    assert_eq!(again, first);
  }
  assert_eq!(s.daily_verse_history(church.church_id, 10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn no_repetition_over_consecutive_days() {
  let s = store().await;
  s.import_version(lsg(), jude(20)).await.unwrap();
  let sel = selector(&s);
  let church = s.add_church("Adjamé").await.unwrap();

  let mut seen = HashSet::new();
  for offset in 0..10 {
    let day = d(2025, 7, 1) + Days::new(offset);
    let got = sel.pick_for_church(&church, day, "LSG", "fr").await.unwrap();
    assert!(seen.insert(got.reference.clone()), "{} repeated on {day}", got.reference);
  }

  let usage: Vec<VerseUsageRecord> = s
    .usage_between(church.church_id, d(2025, 7, 1), d(2025, 7, 11))
    .await
    .unwrap();
  assert_eq!(usage.len(), 10);
}

#[tokio::test]
async fn days_resolved_in_reverse_do_not_repeat() {
  let s = store().await;
  s.import_version(lsg(), jude(20)).await.unwrap();
  let sel = selector(&s);
  let church = s.add_church("Attécoubé").await.unwrap();

  let mut seen = HashSet::new();
  for offset in (0..10).rev() {
    let day = d(2025, 7, 1) + Days::new(offset);
    let got = sel.pick_for_church(&church, day, "LSG", "fr").await.unwrap();
    assert!(seen.insert(got.reference.clone()), "{} repeated on {day}", got.reference);
  }
}

#[tokio::test]
async fn later_usage_is_excluded_but_not_the_same_day() {
  let s = store().await;
  s.import_version(lsg(), jude(20)).await.unwrap();
  let sel = selector(&s);
  let church = s.add_church("Abobo-Baoulé").await.unwrap();

  let later = sel
    .pick_for_church(&church, tuesday() + Days::new(5), "LSG", "fr")
    .await
    .unwrap();
  let today = sel.pick_for_church(&church, tuesday(), "LSG", "fr").await.unwrap();
  assert_ne!(today.reference, later.reference);

  // Recomputing a day sees the same history and lands on the same verse.
  let recomputed = sel
    .recompute_for_church(&church, tuesday(), "LSG", "fr")
    .await
    .unwrap();
  assert_eq!(recomputed.reference, today.reference);
}

#[tokio::test]
async fn repetition_is_tracked_across_versions() {
  let s = store().await;
  s.import_version(lsg(), jude(2)).await.unwrap();
  s.import_version(
    NewVersion { code: "BDS".into(), name: "Bible du Semeur".into(), language: "fr".into() },
    jude(2),
  )
  .await
  .unwrap();
  let sel = selector(&s);
  let church = s.add_church("Koumassi").await.unwrap();

  let first = sel.pick_for_church(&church, tuesday(), "LSG", "fr").await.unwrap();
  let second = sel
    .pick_for_church(&church, tuesday() + Days::new(1), "BDS", "fr")
    .await
    .unwrap();
  assert_ne!(first.reference, second.reference);
}

#[tokio::test]
async fn exhausted_window_reuses_the_corpus() {
  let s = store().await;
  s.import_version(lsg(), jude(1)).await.unwrap();
  let sel = selector(&s);
  let church = s.add_church("Abobo").await.unwrap();

  let day1 = sel.pick_for_church(&church, tuesday(), "LSG", "fr").await.unwrap();
  let day2 = sel
    .pick_for_church(&church, tuesday() + Days::new(1), "LSG", "fr")
    .await
    .unwrap();
  assert_eq!(day2.context_key, "DEFAULT");
  assert_eq!(day1.reference, day2.reference);
}

#[tokio::test]
async fn usage_outside_window_is_forgotten() {
  let s = store().await;
  s.import_version(lsg(), jude(2)).await.unwrap();
  let sel = selector(&s).with_window_days(1);
  let church = s.add_church("Port-Bouët").await.unwrap();

  let first = sel.pick_for_church(&church, tuesday(), "LSG", "fr").await.unwrap();
  let exclusions = vod_core::repetition::RepetitionGuard::new(1)
    .exclusions_for(&s, church.church_id, tuesday() + Days::new(2))
    .await
    .unwrap();
  assert!(exclusions.is_empty());

  let next_day = vod_core::repetition::RepetitionGuard::new(1)
    .exclusions_for(&s, church.church_id, tuesday() + Days::new(1))
    .await
    .unwrap();
  let key = VerseKey {
    book:    "Jude".into(),
    chapter: 1,
    verse:   first.reference.trim_start_matches("Jude 1:").parse().unwrap(),
  };
  assert_eq!(next_day, HashSet::from([key]));
}

#[tokio::test]
async fn empty_version_is_fatal() {
  let s = store().await;
  let church = Church::new(1, "Nowhere");

  let err = selector(&s)
    .pick_for_church(&church, tuesday(), "LSG", "fr")
    .await
    .unwrap_err();
  assert!(matches!(err, CoreError::NoVersionAvailable));

  s.import_version(lsg(), vec![]).await.unwrap();
  let err = selector(&s)
    .pick_for_church(&church, tuesday(), "LSG", "fr")
    .await
    .unwrap_err();
  assert!(matches!(err, CoreError::NoVersesAvailable(code) if code == "LSG"));
  assert!(s.get_daily_verse(1, tuesday()).await.unwrap().is_none());
}

// ─── Persistence contract ────────────────────────────────────────────────────

fn manual_resolution(church_id: i64, context_key: &str, verse: u32) -> NewDailyVerse {
  NewDailyVerse {
    date: tuesday(),
    church_id,
    version_code: "LSG".into(),
    language: "fr".into(),
    context_key: context_key.into(),
    text: format!("texte {verse}"),
    reference: format!("Jude 1:{verse}"),
    key: VerseKey { book: "Jude".into(), chapter: 1, verse },
  }
}

#[tokio::test]
async fn get_or_create_keeps_the_first_writer() {
  let s = store().await;

  let first = s.commit_resolution(manual_resolution(7, "DEFAULT", 1), false).await.unwrap();
  let second = s.commit_resolution(manual_resolution(7, "WEEKDAY:1", 2), false).await.unwrap();
  assert_eq!(second, first);
  assert_eq!(second.context_key, "DEFAULT");

  let history = s.daily_verse_history(7, 10).await.unwrap();
  assert_eq!(history.len(), 1);
  let usage = s.usage_between(7, tuesday(), tuesday() + Days::new(1)).await.unwrap();
  assert_eq!(usage.len(), 1);
  assert_eq!(usage[0].key.verse, 1);
}

#[tokio::test]
async fn overwrite_replaces_the_row_in_place() {
  let s = store().await;

  let first = s.commit_resolution(manual_resolution(7, "DEFAULT", 1), false).await.unwrap();
  let forced = s.commit_resolution(manual_resolution(7, "EVENT:deuil", 2), true).await.unwrap();
  assert_eq!(forced.context_key, "EVENT:deuil");
  assert_eq!(forced.reference, "Jude 1:2");
  assert_eq!(forced.created_at, first.created_at);

  assert_eq!(s.daily_verse_history(7, 10).await.unwrap().len(), 1);
  let usage = s.usage_between(7, tuesday(), tuesday() + Days::new(1)).await.unwrap();
  assert_eq!(usage.len(), 2);
}

#[tokio::test]
async fn concurrent_resolutions_agree() {
  let s = store().await;
  s.import_version(lsg(), jude(30)).await.unwrap();
  let sel = selector(&s);
  let church = s.add_church("Anyama").await.unwrap();

  let (a, b) = tokio::join!(
    sel.pick_for_church(&church, tuesday(), "LSG", "fr"),
    sel.pick_for_church(&church, tuesday(), "LSG", "fr"),
  );
  assert_eq!(a.unwrap(), b.unwrap());
  assert_eq!(s.daily_verse_history(church.church_id, 10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn recompute_overwrites_cached_row() {
  let s = store().await;
  s.import_version(lsg(), jude(30)).await.unwrap();
  let church = s.add_church("Songon").await.unwrap();
  s.commit_resolution(manual_resolution(church.church_id, "SEASON:BOGUS", 99), false)
    .await
    .unwrap();

  let sel = selector(&s);
  let cached = sel.pick_for_church(&church, tuesday(), "LSG", "fr").await.unwrap();
  assert_eq!(cached.context_key, "SEASON:BOGUS");

  let recomputed = sel
    .recompute_for_church(&church, tuesday(), "LSG", "fr")
    .await
    .unwrap();
  assert_eq!(recomputed.context_key, "DEFAULT");
  assert_eq!(sel.pick_for_church(&church, tuesday(), "LSG", "fr").await.unwrap(), recomputed);
  assert_eq!(s.daily_verse_history(church.church_id, 10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn history_is_newest_first_and_limited() {
  let s = store().await;
  s.import_version(lsg(), jude(30)).await.unwrap();
  let sel = selector(&s);
  let church = s.add_church("Grand-Bassam").await.unwrap();

  for offset in 0..5 {
    sel
      .pick_for_church(&church, tuesday() + Days::new(offset), "LSG", "fr")
      .await
      .unwrap();
  }
  let history = s.daily_verse_history(church.church_id, 3).await.unwrap();
  let dates: Vec<NaiveDate> = history.iter().map(|h| h.date).collect();
  assert_eq!(dates, vec![
    tuesday() + Days::new(4),
    tuesday() + Days::new(3),
    tuesday() + Days::new(2),
  ]);
}

// ─── Churches ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn churches_roundtrip_with_events_and_displayed_verse() {
  let s = store().await;
  let a = s.add_church("A").await.unwrap();
  let b = s.add_church("B").await.unwrap();
  s.add_event(b.church_id, ChurchEvent {
    title:     "Culte de jeunesse".into(),
    starts_at: at(tuesday(), 18),
    ends_at:   at(tuesday(), 20),
    tags:      vec!["jeunesse".into(), "louange".into()],
  })
  .await
  .unwrap();

  let displayed = DisplayedVerse {
    date:      tuesday(),
    text:      "Que personne ne méprise ta jeunesse.".into(),
    reference: "1 Timothée 4:12".into(),
  };
  s.set_displayed_verse(a.church_id, displayed.clone()).await.unwrap();

  let all = s.list_churches().await.unwrap();
  assert_eq!(all.len(), 2);
  assert_eq!(all[0].displayed.as_ref(), Some(&displayed));
  assert!(all[0].events.is_empty());
  assert_eq!(all[1].events.len(), 1);
  assert_eq!(all[1].events[0].tags, vec!["jeunesse".to_owned(), "louange".to_owned()]);
  assert_eq!(all[1].displayed, None);

  assert!(s.get_church(999).await.unwrap().is_none());
}

#[tokio::test]
async fn missing_church_is_reported() {
  let s = store().await;
  let displayed = DisplayedVerse {
    date:      tuesday(),
    text:      "x".into(),
    reference: "Jude 1:1".into(),
  };
  assert!(matches!(
    s.set_displayed_verse(42, displayed).await,
    Err(Error::ChurchNotFound(42))
  ));

  let event = ChurchEvent {
    title:     "x".into(),
    starts_at: at(tuesday(), 1),
    ends_at:   at(tuesday(), 2),
    tags:      vec![],
  };
  assert!(matches!(s.add_event(42, event).await, Err(Error::ChurchNotFound(42))));
}

// ─── Batch ───────────────────────────────────────────────────────────────────

/// Records every delivery. With `store` set, also checks that the verse being
/// sent is already committed and displayed.
#[derive(Default)]
struct RecordingNotifier {
  sent:    Mutex<Vec<(i64, String)>>,
  fail_on: Option<i64>,
  store:   Option<SqliteStore>,
}

impl RecordingNotifier {
  fn sent(&self) -> Vec<(i64, String)> { self.sent.lock().unwrap().clone() }

  fn checking(store: &SqliteStore) -> Self {
    Self { store: Some(store.clone()), ..Self::default() }
  }
}

impl Notifier for RecordingNotifier {
  type Error = std::io::Error;

  async fn notify(&self, church: &Church, verse: &ResolvedVerse) -> Result<(), Self::Error> {
    if self.fail_on == Some(church.church_id) {
      return Err(std::io::Error::other("push topic unavailable"));
    }
    if let Some(store) = &self.store {
      let cached = store
        .get_daily_verse(church.church_id, verse.date)
        .await
        .unwrap()
        .expect("verse committed before notification");
      assert_eq!(cached.reference, verse.reference);

      let displayed = store
        .get_church(church.church_id)
        .await
        .unwrap()
        .and_then(|c| c.displayed)
        .expect("displayed verse written before notification");
      assert_eq!(displayed.reference, verse.reference);
      assert_eq!(displayed.date, verse.date);
    }
    self
      .sent
      .lock()
      .unwrap()
      .push((church.church_id, verse.reference.clone()));
    Ok(())
  }
}

async fn two_churches() -> (SqliteStore, VerseOfDaySelector<SqliteStore>) {
  let s = store().await;
  s.import_version(lsg(), jude(30)).await.unwrap();
  s.add_church("Riviera").await.unwrap();
  s.add_church("Angré").await.unwrap();
  let sel = selector(&s);
  (s, sel)
}

#[tokio::test]
async fn batch_notifies_only_on_change() {
  let (s, sel) = two_churches().await;
  let notifier = RecordingNotifier::checking(&s);

  let first = update_all_churches(&sel, &notifier, "LSG", "fr", tuesday(), BatchOptions::default())
    .await
    .unwrap();
  assert_eq!(first.total, 2);
  assert_eq!(first.updated_count, 2);
  assert_eq!(first.notified_count, 2);
  assert_eq!(first.per_context_counts.get("DEFAULT"), Some(&2));
  assert!(first.failures.is_empty());

  for church in s.list_churches().await.unwrap() {
    let cached = s.get_daily_verse(church.church_id, tuesday()).await.unwrap().unwrap();
    let displayed = church.displayed.unwrap();
    assert_eq!(displayed.reference, cached.reference);
    assert_eq!(displayed.date, tuesday());
  }

  let second = update_all_churches(&sel, &notifier, "LSG", "fr", tuesday(), BatchOptions::default())
    .await
    .unwrap();
  assert_eq!(second.updated_count, 0);
  assert_eq!(second.notified_count, 0);
  assert_eq!(notifier.sent().len(), 2);
}

#[tokio::test]
async fn batch_force_flags() {
  let (s, sel) = two_churches().await;
  let notifier = RecordingNotifier::checking(&s);
  update_all_churches(&sel, &notifier, "LSG", "fr", tuesday(), BatchOptions::default())
    .await
    .unwrap();

  let renotify = BatchOptions { force_notify: true, ..BatchOptions::default() };
  let summary = update_all_churches(&sel, &notifier, "LSG", "fr", tuesday(), renotify)
    .await
    .unwrap();
  assert_eq!(summary.updated_count, 0);
  assert_eq!(summary.notified_count, 2);

  let forced = update_all_churches(&sel, &notifier, "LSG", "fr", tuesday(), BatchOptions::forced())
    .await
    .unwrap();
  assert_eq!(forced.updated_count, 2);
  assert_eq!(forced.notified_count, 2);
  assert_eq!(notifier.sent().len(), 6);

  // Recomputation is deterministic, so the same verses were re-sent.
  let sent = notifier.sent();
  assert_eq!(sent[0..2], sent[4..6]);
}

#[tokio::test]
async fn batch_dry_run_writes_nothing() {
  let (s, sel) = two_churches().await;
  let notifier = RecordingNotifier::default();

  let dry = BatchOptions { dry_run: true, ..BatchOptions::default() };
  let summary = update_all_churches(&sel, &notifier, "LSG", "fr", tuesday(), dry)
    .await
    .unwrap();
  assert_eq!(summary.updated_count, 2);
  assert_eq!(summary.notified_count, 2);
  assert!(notifier.sent().is_empty());

  for church in s.list_churches().await.unwrap() {
    assert!(church.displayed.is_none());
    assert!(s.get_daily_verse(church.church_id, tuesday()).await.unwrap().is_none());
  }
}

#[tokio::test]
async fn batch_notification_failure_is_counted() {
  let (s, sel) = two_churches().await;
  let failing = s.list_churches().await.unwrap()[0].church_id;
  let notifier = RecordingNotifier { fail_on: Some(failing), ..RecordingNotifier::default() };

  let summary = update_all_churches(&sel, &notifier, "LSG", "fr", tuesday(), BatchOptions::default())
    .await
    .unwrap();
  assert_eq!(summary.notified_count, 1);
  assert_eq!(summary.notify_failures, 1);
  assert_eq!(summary.updated_count, 2);
}

/// Delegates to [`SqliteStore`] but fails cache reads for one church.
struct FlakyStore {
  inner:   SqliteStore,
  fail_on: i64,
}

impl VerseStore for FlakyStore {
  type Error = Error;

  async fn get_version(&self, code: &str) -> Result<Option<BibleVersion>, Error> {
    self.inner.get_version(code).await
  }

  async fn first_version(&self) -> Result<Option<BibleVersion>, Error> {
    self.inner.first_version().await
  }

  async fn verses_for(&self, version_code: &str, filter: &PoolFilter) -> Result<Vec<BibleVerse>, Error> {
    self.inner.verses_for(version_code, filter).await
  }

  async fn get_daily_verse(&self, church_id: i64, date: NaiveDate) -> Result<Option<DailyVerse>, Error> {
    if church_id == self.fail_on {
      return Err(Error::ChurchNotFound(church_id));
    }
    self.inner.get_daily_verse(church_id, date).await
  }

  async fn commit_resolution(&self, input: NewDailyVerse, overwrite: bool) -> Result<DailyVerse, Error> {
    self.inner.commit_resolution(input, overwrite).await
  }

  async fn daily_verse_history(&self, church_id: i64, limit: usize) -> Result<Vec<DailyVerse>, Error> {
    self.inner.daily_verse_history(church_id, limit).await
  }

  async fn usage_between(
    &self,
    church_id: i64,
    from: NaiveDate,
    until: NaiveDate,
  ) -> Result<Vec<VerseUsageRecord>, Error> {
    self.inner.usage_between(church_id, from, until).await
  }

  async fn list_churches(&self) -> Result<Vec<Church>, Error> { self.inner.list_churches().await }

  async fn get_church(&self, church_id: i64) -> Result<Option<Church>, Error> {
    self.inner.get_church(church_id).await
  }

  async fn set_displayed_verse(&self, church_id: i64, displayed: DisplayedVerse) -> Result<(), Error> {
    self.inner.set_displayed_verse(church_id, displayed).await
  }
}

#[tokio::test]
async fn batch_isolates_per_church_failures() {
  let (s, _) = two_churches().await;
  let churches = s.list_churches().await.unwrap();
  let flaky = FlakyStore { inner: s.clone(), fail_on: churches[0].church_id };
  let sel = VerseOfDaySelector::new(std::sync::Arc::new(flaky), ContextRules::default());
  let notifier = RecordingNotifier::default();

  let summary = update_all_churches(&sel, &notifier, "LSG", "fr", tuesday(), BatchOptions::default())
    .await
    .unwrap();
  assert_eq!(summary.total, 2);
  assert_eq!(summary.failures.len(), 1);
  assert_eq!(summary.failures[0].church_id, churches[0].church_id);
  assert_eq!(summary.updated_count, 1);
  assert_eq!(notifier.sent().len(), 1);
  assert_eq!(notifier.sent()[0].0, churches[1].church_id);
}
