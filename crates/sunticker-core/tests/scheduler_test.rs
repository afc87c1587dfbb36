#![allow(clippy::unwrap_used)]
// Integration tests for `RotationScheduler` on a paused tokio clock.
//
// Displays record every call into a shared log; providers are in-memory
// tables with optional latency.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::NaiveTime;
use futures_util::future::BoxFuture;
use pretty_assertions::assert_eq;

use sunticker_core::{
    Absence, Brightness, BrightnessPolicy, Clock, DataProvider, DisplayError, MatrixDisplay,
    Measurement, Reading, RotationScheduler, SchedulerConfig, SchedulerParts, SegmentDisplay,
    SegmentValue, SourceDescriptor, SourceSequence,
};

// ── Recording displays ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Event {
    Label(String, String),
    MatrixLevel(u8),
    Value(SegmentValue),
    SegmentLevel(u8),
}

type Log = Arc<Mutex<Vec<Event>>>;

struct RecordingMatrix(Log);

impl MatrixDisplay for RecordingMatrix {
    fn render(&mut self, label: &str, caption: &str) -> Result<(), DisplayError> {
        self.0
            .lock()
            .unwrap()
            .push(Event::Label(label.into(), caption.into()));
        Ok(())
    }

    fn set_brightness(&mut self, level: Brightness) -> Result<(), DisplayError> {
        self.0.lock().unwrap().push(Event::MatrixLevel(level.level()));
        Ok(())
    }
}

struct RecordingSegment(Log);

impl SegmentDisplay for RecordingSegment {
    fn digits(&self) -> usize {
        8
    }

    fn render(&mut self, value: &SegmentValue) -> Result<(), DisplayError> {
        self.0.lock().unwrap().push(Event::Value(*value));
        Ok(())
    }

    fn set_brightness(&mut self, level: Brightness) -> Result<(), DisplayError> {
        self.0.lock().unwrap().push(Event::SegmentLevel(level.level()));
        Ok(())
    }
}

// ── Providers ───────────────────────────────────────────────────────

struct TableProvider {
    values: HashMap<String, Reading>,
    latency: Duration,
    calls: AtomicU32,
}

impl TableProvider {
    fn new(values: &[(&str, Reading)]) -> Self {
        Self {
            values: values
                .iter()
                .map(|(k, v)| ((*k).to_owned(), v.clone()))
                .collect(),
            latency: Duration::ZERO,
            calls: AtomicU32::new(0),
        }
    }

    fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl DataProvider for TableProvider {
    fn name(&self) -> &str {
        "table"
    }

    fn get_value<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Reading> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }
            self.values
                .get(key)
                .cloned()
                .unwrap_or_else(|| Err(Absence::UnknownKey { key: key.into() }))
        })
    }
}

/// Returns 1, 2, 3, ... on successive calls.
#[derive(Default)]
struct CountingProvider {
    calls: AtomicU32,
}

impl DataProvider for CountingProvider {
    fn name(&self) -> &str {
        "counting"
    }

    fn get_value<'a>(&'a self, _key: &'a str) -> BoxFuture<'a, Reading> {
        Box::pin(async move {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(Measurement::new(f64::from(n)))
        })
    }
}

struct FixedClock(Mutex<NaiveTime>);

impl FixedClock {
    fn at(h: u32, m: u32) -> Arc<Self> {
        Arc::new(Self(Mutex::new(NaiveTime::from_hms_opt(h, m, 0).unwrap())))
    }

    fn set(&self, h: u32, m: u32) {
        *self.0.lock().unwrap() = NaiveTime::from_hms_opt(h, m, 0).unwrap();
    }
}

impl Clock for FixedClock {
    fn time_of_day(&self) -> NaiveTime {
        *self.0.lock().unwrap()
    }
}

// ── Harness ─────────────────────────────────────────────────────────

fn source(key: &str, is_remote: bool, dwell_secs: u64) -> SourceDescriptor {
    SourceDescriptor {
        key: key.into(),
        display_name: format!("{key}-name"),
        alias_label: format!("{key} W"),
        is_remote,
        dwell_secs,
    }
}

fn number(v: f64) -> SegmentValue {
    SegmentValue::Number(Measurement::new(v))
}

struct Rig {
    scheduler: RotationScheduler,
    log: Log,
    clock: Arc<FixedClock>,
}

impl Rig {
    fn new(
        sources: Vec<SourceDescriptor>,
        remote: Arc<dyn DataProvider>,
        local: Arc<dyn DataProvider>,
    ) -> Self {
        let log: Log = Arc::default();
        let clock = FixedClock::at(12, 0);
        let scheduler = RotationScheduler::new(
            SchedulerParts {
                sources: SourceSequence::new(sources).unwrap(),
                remote,
                local,
                matrix: Box::new(RecordingMatrix(Arc::clone(&log))),
                segment: Box::new(RecordingSegment(Arc::clone(&log))),
                clock: clock.clone(),
            },
            SchedulerConfig::default(),
        );
        Self {
            scheduler,
            log,
            clock,
        }
    }

    /// Remote `a` (5 s, 640 W) and local `b` (20 s, 21.5).
    fn two_sources() -> Self {
        let remote = TableProvider::new(&[("a", Ok(Measurement::new(640.0)))]);
        let local = TableProvider::new(&[("b", Ok(Measurement::new(21.5)))]);
        Self::new(
            vec![source("a", true, 5), source("b", false, 20)],
            Arc::new(remote),
            Arc::new(local),
        )
    }

    fn events(&self) -> Vec<Event> {
        self.log.lock().unwrap().clone()
    }

    fn clear(&self) {
        self.log.lock().unwrap().clear();
    }

    fn last_label(&self) -> Option<Event> {
        self.events()
            .into_iter()
            .rev()
            .find(|e| matches!(e, Event::Label(..)))
    }

    fn last_value(&self) -> Option<SegmentValue> {
        self.events().into_iter().rev().find_map(|e| match e {
            Event::Value(v) => Some(v),
            _ => None,
        })
    }
}

async fn advance_clock(millis: u64) {
    tokio::time::sleep(Duration::from_millis(millis)).await;
}

// ── Rotation ────────────────────────────────────────────────────────

#[tokio::test]
async fn advance_cycles_through_sources() {
    let rig = Rig::two_sources();
    assert_eq!(rig.scheduler.current_index().await, 0);

    rig.scheduler.advance().await;
    assert_eq!(rig.scheduler.current_index().await, 1);
    assert_eq!(rig.scheduler.current_source().await.key, "b");

    rig.scheduler.advance().await;
    assert_eq!(rig.scheduler.current_index().await, 0);
}

#[tokio::test]
async fn single_source_advance_stays_on_it() {
    let local = TableProvider::new(&[("only", Ok(Measurement::new(3.0)))]);
    let rig = Rig::new(
        vec![source("only", false, 5)],
        Arc::new(TableProvider::new(&[])),
        Arc::new(local),
    );

    rig.scheduler.advance().await;
    assert_eq!(rig.scheduler.current_index().await, 0);
    assert_eq!(
        rig.events(),
        vec![
            Event::Value(SegmentValue::Blank),
            Event::Label("only-name".into(), "only W".into()),
            Event::Value(number(3.0)),
        ]
    );
}

#[tokio::test]
async fn switch_clears_value_before_new_label() {
    let rig = Rig::two_sources();
    rig.scheduler.advance().await;

    assert_eq!(
        rig.events(),
        vec![
            Event::Value(SegmentValue::Blank),
            Event::Label("b-name".into(), "b W".into()),
            Event::Value(number(21.5)),
        ]
    );
}

#[tokio::test]
async fn absent_value_shows_no_data() {
    let local = TableProvider::new(&[("b", Err(Absence::SensorAbsent))]);
    let rig = Rig::new(
        vec![source("a", true, 5), source("b", false, 20)],
        Arc::new(TableProvider::new(&[])),
        Arc::new(local),
    );

    rig.scheduler.refresh_display().await;
    assert_eq!(rig.last_value(), Some(SegmentValue::NoData));

    rig.scheduler.advance().await;
    assert_eq!(rig.last_value(), Some(SegmentValue::NoData));
}

#[tokio::test]
async fn sources_are_routed_by_remote_flag() {
    let remote = Arc::new(TableProvider::new(&[("a", Ok(Measurement::new(1.0)))]));
    let local = Arc::new(TableProvider::new(&[("b", Ok(Measurement::new(2.0)))]));
    let rig = Rig::new(
        vec![source("a", true, 5), source("b", false, 5)],
        remote.clone(),
        local.clone(),
    );

    rig.scheduler.refresh_display().await;
    rig.scheduler.advance().await;
    rig.scheduler.refresh_value().await;

    assert_eq!(remote.calls(), 1);
    assert_eq!(local.calls(), 2);
}

// ── Lifecycle ───────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn start_renders_first_source_and_applies_brightness() {
    let rig = Rig::two_sources();
    rig.scheduler.start().await;
    assert!(rig.scheduler.is_running().await);

    let events = rig.events();
    assert_eq!(
        events[..5].to_vec(),
        vec![
            Event::Value(SegmentValue::Blank),
            Event::Label("a-name".into(), "a W".into()),
            Event::Value(number(640.0)),
            Event::MatrixLevel(1),
            Event::SegmentLevel(4),
        ]
    );

    rig.scheduler.stop().await;
}

#[tokio::test(start_paused = true)]
async fn rotation_honours_each_dwell_time() {
    let rig = Rig::two_sources();
    rig.scheduler.start().await;

    advance_clock(4_900).await;
    assert_eq!(rig.scheduler.current_index().await, 0);

    advance_clock(200).await;
    assert_eq!(rig.scheduler.current_index().await, 1);
    assert_eq!(
        rig.last_label(),
        Some(Event::Label("b-name".into(), "b W".into()))
    );

    // b dwells 20 s.
    advance_clock(19_800).await;
    assert_eq!(rig.scheduler.current_index().await, 1);

    advance_clock(200).await;
    assert_eq!(rig.scheduler.current_index().await, 0);

    rig.scheduler.stop().await;
}

#[tokio::test(start_paused = true)]
async fn refresh_updates_value_every_period() {
    let counting = Arc::new(CountingProvider::default());
    let rig = Rig::new(
        vec![source("a", true, 60)],
        counting.clone(),
        Arc::new(TableProvider::new(&[])),
    );
    rig.scheduler.start().await;
    rig.clear();

    advance_clock(3_500).await;

    // start() read once; refresh ran at 0, 1, 2, and 3 s.
    assert_eq!(counting.calls.load(Ordering::SeqCst), 5);
    let values: Vec<_> = rig
        .events()
        .into_iter()
        .filter(|e| matches!(e, Event::Value(_)))
        .collect();
    assert_eq!(
        values,
        vec![
            Event::Value(number(2.0)),
            Event::Value(number(3.0)),
            Event::Value(number(4.0)),
            Event::Value(number(5.0)),
        ]
    );
    assert!(
        !rig.events().iter().any(|e| matches!(e, Event::Label(..))),
        "refresh must not touch the matrix"
    );

    rig.scheduler.stop().await;
}

#[tokio::test(start_paused = true)]
async fn stale_value_is_not_drawn_after_switch() {
    // Reading `a` takes 3 s; `a` only dwells 1 s.
    let slow = TableProvider::new(&[("a", Ok(Measurement::new(111.0)))])
        .with_latency(Duration::from_secs(3));
    let local = TableProvider::new(&[("b", Ok(Measurement::new(222.0)))]);
    let rig = Rig::new(
        vec![source("a", true, 1), source("b", false, 100)],
        Arc::new(slow),
        Arc::new(local),
    );

    rig.scheduler.start().await;
    advance_clock(10_000).await;

    assert_eq!(rig.scheduler.current_index().await, 1);
    let events = rig.events();
    let b_label = events
        .iter()
        .position(|e| *e == Event::Label("b-name".into(), "b W".into()))
        .unwrap();
    assert!(
        !events[b_label..].contains(&Event::Value(number(111.0))),
        "value of the previous source drawn under the new label: {events:?}"
    );
    assert_eq!(rig.last_value(), Some(number(222.0)));

    rig.scheduler.stop().await;
}

#[tokio::test(start_paused = true)]
async fn stop_ends_all_display_writes() {
    let rig = Rig::two_sources();
    rig.scheduler.start().await;
    advance_clock(2_000).await;

    rig.scheduler.stop().await;
    assert!(!rig.scheduler.is_running().await);
    let written = rig.events().len();

    advance_clock(60_000).await;
    assert_eq!(rig.events().len(), written);
    assert_eq!(rig.scheduler.current_index().await, 0);
}

#[tokio::test(start_paused = true)]
async fn start_twice_is_a_noop() {
    let rig = Rig::two_sources();
    rig.scheduler.start().await;
    let written = rig.events().len();

    rig.scheduler.start().await;
    assert_eq!(rig.events().len(), written);

    rig.scheduler.stop().await;
}

// ── Pause ───────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn pause_holds_source_then_advances_promptly() {
    let rig = Rig::two_sources();
    rig.scheduler.start().await;
    advance_clock(1_000).await;

    let pauser = rig.scheduler.clone();
    let pause = tokio::spawn(async move { pauser.pause(Duration::from_secs(30)).await });

    // Two dwell periods of `a` pass while paused.
    advance_clock(10_000).await;
    assert!(rig.scheduler.is_paused().await);
    assert_eq!(rig.scheduler.current_index().await, 0);

    advance_clock(19_900).await;
    assert_eq!(rig.scheduler.current_index().await, 0);

    // Pause ends at 31 s; the switch follows without waiting for a dwell.
    advance_clock(200).await;
    pause.await.unwrap();
    assert!(!rig.scheduler.is_paused().await);
    assert_eq!(rig.scheduler.current_index().await, 1);

    rig.scheduler.stop().await;
}

#[tokio::test(start_paused = true)]
async fn values_keep_refreshing_while_paused() {
    let counting = Arc::new(CountingProvider::default());
    let rig = Rig::new(
        vec![source("a", true, 2), source("b", true, 2)],
        counting.clone(),
        Arc::new(TableProvider::new(&[])),
    );
    rig.scheduler.start().await;

    let pauser = rig.scheduler.clone();
    tokio::spawn(async move { pauser.pause(Duration::from_secs(10)).await });
    advance_clock(5_500).await;

    assert_eq!(rig.scheduler.current_index().await, 0);
    assert!(counting.calls.load(Ordering::SeqCst) >= 6);

    rig.scheduler.stop().await;
}

#[tokio::test(start_paused = true)]
async fn pause_while_stopped_renders_nothing() {
    let rig = Rig::two_sources();
    rig.scheduler.pause(Duration::from_secs(5)).await;
    assert!(!rig.scheduler.is_paused().await);
    assert!(rig.events().is_empty());
}

#[tokio::test(start_paused = true)]
async fn overlapping_pauses_hold_until_the_last_one_ends() {
    let rig = Rig::two_sources();
    rig.scheduler.start().await;
    advance_clock(1_000).await;

    let first = {
        let pauser = rig.scheduler.clone();
        tokio::spawn(async move { pauser.pause(Duration::from_secs(30)).await })
    };
    advance_clock(20_000).await;
    let second = {
        let pauser = rig.scheduler.clone();
        tokio::spawn(async move { pauser.pause(Duration::from_secs(30)).await })
    };

    // The first pause ends at 31 s, the second still holds until 51 s.
    advance_clock(10_500).await;
    first.await.unwrap();
    assert!(rig.scheduler.is_paused().await);
    assert_eq!(rig.scheduler.current_index().await, 0);

    advance_clock(19_300).await;
    assert_eq!(rig.scheduler.current_index().await, 0);

    advance_clock(400).await;
    second.await.unwrap();
    assert!(!rig.scheduler.is_paused().await);
    assert_eq!(rig.scheduler.current_index().await, 1);

    rig.scheduler.stop().await;
}

#[tokio::test(start_paused = true)]
async fn shorter_pause_inside_longer_one_does_not_resume() {
    let rig = Rig::two_sources();
    rig.scheduler.start().await;

    let long = {
        let pauser = rig.scheduler.clone();
        tokio::spawn(async move { pauser.pause(Duration::from_secs(30)).await })
    };
    advance_clock(1_000).await;
    rig.scheduler.pause(Duration::from_secs(5)).await;

    advance_clock(10_000).await;
    assert!(rig.scheduler.is_paused().await);
    assert_eq!(rig.scheduler.current_index().await, 0);

    advance_clock(19_500).await;
    long.await.unwrap();
    assert_eq!(rig.scheduler.current_index().await, 1);

    rig.scheduler.stop().await;
}

#[tokio::test(start_paused = true)]
async fn pause_ended_while_stopped_does_not_cut_next_dwell() {
    let rig = Rig::two_sources();
    rig.scheduler.pause(Duration::from_secs(1)).await;

    rig.scheduler.start().await;
    advance_clock(4_900).await;
    assert_eq!(rig.scheduler.current_index().await, 0);

    advance_clock(200).await;
    assert_eq!(rig.scheduler.current_index().await, 1);

    rig.scheduler.stop().await;
}

// ── Brightness ──────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn brightness_follows_night_window() {
    let rig = Rig::two_sources();
    rig.clock.set(19, 59);
    rig.scheduler.apply_brightness_policy().await;
    assert_eq!(
        rig.events(),
        vec![Event::MatrixLevel(1), Event::SegmentLevel(4)]
    );

    rig.clear();
    rig.clock.set(20, 0);
    rig.scheduler.apply_brightness_policy().await;
    assert_eq!(
        rig.events(),
        vec![Event::MatrixLevel(0), Event::SegmentLevel(0)]
    );

    rig.clear();
    rig.clock.set(8, 1);
    rig.scheduler.apply_brightness_policy().await;
    assert_eq!(
        rig.events(),
        vec![Event::MatrixLevel(1), Event::SegmentLevel(4)]
    );
}

#[tokio::test(start_paused = true)]
async fn rotation_reapplies_brightness_each_cycle() {
    let rig = Rig::two_sources();
    rig.scheduler.start().await;
    rig.clock.set(21, 30);
    rig.clear();

    advance_clock(5_100).await;

    let events = rig.events();
    assert!(events.contains(&Event::MatrixLevel(0)));
    assert!(events.contains(&Event::SegmentLevel(0)));

    rig.scheduler.stop().await;
}

#[test]
fn custom_night_window_is_respected() {
    let policy = BrightnessPolicy::new(
        NaiveTime::from_hms_opt(22, 0, 0).unwrap(),
        NaiveTime::from_hms_opt(6, 0, 0).unwrap(),
    );
    let nominal = Brightness::new(9);
    assert_eq!(
        policy.level_for(NaiveTime::from_hms_opt(21, 0, 0).unwrap(), nominal),
        nominal
    );
    assert_eq!(
        policy.level_for(NaiveTime::from_hms_opt(23, 0, 0).unwrap(), nominal),
        Brightness::MIN
    );
}
