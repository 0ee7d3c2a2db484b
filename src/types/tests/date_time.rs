use chrono::{Duration, TimeZone, Utc};

use crate::types::tests::*;

#[test]
fn epoch() {
    let epoch = DateTime::epoch();
    assert_eq!(epoch.ticks(), 0);
    assert!(epoch.is_null());
}

#[test]
fn ticks_are_100ns_intervals() {
    let epoch = DateTime::epoch();
    let later = epoch + Duration::milliseconds(500);
    assert_eq!(later.ticks(), 500 * 10_000);
}

#[test]
fn from_ticks_round_trip() {
    let now = DateTime::now();
    let ticks = now.ticks();
    let dt = DateTime::from(ticks);
    assert_eq!(dt, now);
}

#[test]
fn known_instant() {
    // 1601-01-02 00:00:00 UTC is exactly one day of ticks
    let dt = DateTime::from(Utc.with_ymd_and_hms(1601, 1, 2, 0, 0, 0).unwrap());
    assert_eq!(dt.ticks(), 24 * 3600 * 10_000_000);
}

#[test]
fn encoding_date_time() {
    serialize_test(DateTime::epoch());
    serialize_test(DateTime::now());
}

#[test]
fn endtimes_checked_ticks() {
    let endtimes = DateTime::endtimes();
    assert_eq!(endtimes.checked_ticks(), i64::MAX);
}
