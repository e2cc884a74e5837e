//! Long-running simulations: many consecutive workdays driven by a fake clock.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use workday_core::{
    Clock, EngineEvent, FakeClock, ManualLockSource, MemoryPersistence, Persistence, Settings,
    WorkdayEngine,
};

fn at(date: NaiveDate, h: u32, m: u32) -> NaiveDateTime {
    date.and_hms_opt(h, m, 0).unwrap()
}

struct Harness {
    engine: WorkdayEngine,
    clock: FakeClock,
    lock: ManualLockSource,
    persistence: MemoryPersistence,
}

fn harness(start: NaiveDateTime) -> Harness {
    let clock = FakeClock::new(start);
    let lock = ManualLockSource::new();
    let persistence = MemoryPersistence::new();
    let engine = WorkdayEngine::new(
        Settings::default(),
        Box::new(persistence.clone()),
        Box::new(clock.clone()),
        &lock,
    )
    .expect("engine init");
    Harness {
        engine,
        clock,
        lock,
        persistence,
    }
}

/// 08:00 login, 45 min lunch via screen lock, pause on leaving at 16:45.
fn work_one_day(h: &mut Harness, date: NaiveDate) {
    h.clock.set(at(date, 10, 0));
    h.engine.tick().expect("tick");

    h.clock.set(at(date, 12, 5));
    h.lock.lock(h.clock.now());
    h.engine.tick().expect("tick");
    assert!(h.engine.is_on_lunch_break());

    h.clock.set(at(date, 12, 50));
    h.lock.unlock(h.clock.now());
    h.engine.tick().expect("tick");

    h.clock.set(at(date, 16, 45));
    let report = h.engine.tick().expect("tick");
    assert!(!report.overtime_started);
    assert_eq!(h.engine.total_effective_work_minutes(), 480.0);
    h.engine.pause();
}

#[test]
fn a_year_of_workdays_produces_one_history_entry_per_day() {
    let first = NaiveDate::from_ymd_opt(2023, 12, 30).unwrap();
    let mut h = harness(at(first, 8, 0));
    let events = h.engine.subscribe();

    let mut date = first;
    for day in 0..365 {
        if day > 0 {
            h.clock.set(at(date, 8, 0));
            assert!(h.engine.check_new_day().expect("rollover"));
            assert_eq!(h.engine.current_date(), date);
            assert_eq!(h.engine.total_paused_minutes(), 0.0);
            assert!(!h.engine.is_paused());
        }
        work_one_day(&mut h, date);
        date = date.succ_opt().unwrap();
    }
    h.clock.set(at(date, 8, 0));
    assert!(h.engine.check_new_day().expect("final rollover"));

    let history = h.engine.history();
    assert_eq!(history.len(), 365);
    let mut expected = first;
    for session in history {
        assert_eq!(session.date, expected);
        assert!(session.completed);
        assert_eq!(session.effective_minutes, 480.0);
        assert_eq!(session.lunch_minutes, 45.0);
        expected = expected.succ_opt().unwrap();
    }

    // Leap day and the year boundary are real entries.
    assert!(h
        .engine
        .history_for_date(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap())
        .is_some());
    assert!(h
        .engine
        .history_for_date(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
        .is_some());
    assert_eq!(h.engine.history_for_month(2024, 2).len(), 29);

    let rollovers = events
        .try_iter()
        .filter(|e| matches!(e, EngineEvent::DayRolledOver { .. }))
        .count();
    assert_eq!(rollovers, 365);

    let persisted = h.persistence.load_sessions();
    assert_eq!(persisted.history.len(), 365);
    assert_eq!(persisted.history[0].date_key(), "2023-12-30");
}

#[test]
fn three_years_of_rollovers_stay_dated_and_ordered() {
    let first = NaiveDate::from_ymd_opt(2027, 3, 1).unwrap();
    let clock = FakeClock::new(at(first, 8, 0));
    let persistence = MemoryPersistence::new();
    let mut engine = WorkdayEngine::new(
        Settings::default(),
        Box::new(persistence.clone()),
        Box::new(clock.clone()),
        &ManualLockSource::new(),
    )
    .unwrap();

    let mut date = first;
    for _ in 0..1095 {
        clock.set(at(date, 16, 0));
        engine.pause();
        date = date.succ_opt().unwrap();
        clock.set(at(date, 8, 0));
        assert!(engine.check_new_day().unwrap());
    }

    let history = engine.history();
    assert_eq!(history.len(), 1095);
    assert!(history
        .windows(2)
        .all(|pair| pair[1].date == pair[0].date.succ_opt().unwrap()));
    assert!(history.iter().all(|s| s.completed && s.effective_minutes == 480.0));
    assert!(history
        .iter()
        .any(|s| s.date == NaiveDate::from_ymd_opt(2028, 2, 29).unwrap()));
    assert_eq!(history.last().unwrap().date, date.pred_opt().unwrap());
    assert_eq!(
        history.iter().filter(|s| s.date.year() == 2028).count(),
        366
    );
    assert_eq!(persistence.load_sessions().history.len(), 1095);
}

#[test]
fn weekend_gap_does_not_backfill_skipped_days() {
    let friday = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
    let mut h = harness(at(friday, 8, 0));
    work_one_day(&mut h, friday);

    let monday = friday + Duration::days(3);
    h.clock.set(at(monday, 7, 45));
    assert!(h.engine.check_new_day().unwrap());
    assert!(!h.engine.check_new_day().unwrap());

    assert_eq!(h.engine.history().len(), 1);
    assert_eq!(h.engine.history()[0].date, friday);
    assert_eq!(h.engine.login_time(), at(monday, 7, 45));
    assert_eq!(h.engine.lunch_time_consumed(), Duration::zero());
}
