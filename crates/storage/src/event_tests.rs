// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use proptest::prelude::*;
use yare::parameterized;

#[test]
fn kind_codes_match_log_format() {
    assert_eq!(EventKind::Delete.code(), 1);
    assert_eq!(EventKind::Put.code(), 2);
    assert_eq!(EventKind::from_code(2), Some(EventKind::Put));
    assert_eq!(EventKind::from_code(0), None);
}

#[test]
fn plain_record_without_checksum() {
    let event = Event::put(1, "x", "42");
    assert_eq!(event.to_line(false), "1\t2\tx\t42");
}

#[test]
fn delete_record_has_empty_value() {
    let event = Event::delete(2, "x");
    assert_eq!(event.to_line(false), "2\t1\tx\t");
}

#[test]
fn parses_baseline_records() {
    let put = Event::from_line("1\t2\tx\t42").unwrap();
    assert_eq!(put, Event::put(1, "x", "42"));

    let delete = Event::from_line("2\t1\tx\t").unwrap();
    assert_eq!(delete, Event::delete(2, "x"));
}

#[test]
fn value_with_delimiters_stays_on_one_line() {
    let event = Event::put(7, "k\tey", "line one\nline\ttwo\r\n100%");
    let line = event.to_line(true);

    assert!(!line.contains('\n'));
    assert!(!line.contains('\r'));
    assert_eq!(line.split('\t').count(), 5);
    assert_eq!(Event::from_line(&line).unwrap(), event);
}

#[test]
fn empty_put_value_is_preserved() {
    let event = Event::put(3, "blank", "");
    let decoded = Event::from_line(&event.to_line(true)).unwrap();
    assert_eq!(decoded.value, "");
    assert_eq!(decoded.kind, EventKind::Put);
}

#[test]
fn checksum_detects_tampering() {
    let line = Event::put(1, "rob", "was here").to_line(true);
    let tampered = line.replace("was here", "was there");

    assert!(matches!(
        Event::from_line(&tampered),
        Err(DecodeError::ChecksumMismatch { .. })
    ));
}

#[test]
fn delete_ignores_stray_value() {
    let event = Event::from_line("4\t1\tgone\tleftover").unwrap();
    assert_eq!(event.kind, EventKind::Delete);
    assert_eq!(event.value, "");
}

#[test]
fn unescape_accepts_lowercase_and_foreign_escapes() {
    assert_eq!(unescape("a%0ab").unwrap(), "a\nb");
    assert_eq!(unescape("%41%42").unwrap(), "AB");
    assert_eq!(unescape("caf%C3%A9").unwrap(), "café");
}

#[test]
fn escape_borrows_when_nothing_to_do() {
    assert!(matches!(escape("plain value"), Cow::Borrowed(_)));
    assert!(matches!(unescape("plain value").unwrap(), Cow::Borrowed(_)));
}

#[parameterized(
    too_few_fields = { "1\t2\tx" },
    too_many_fields = { "1\t2\tx\ty\t00000000\textra" },
    non_numeric_sequence = { "one\t2\tx\ty" },
    negative_sequence = { "-1\t2\tx\ty" },
    unknown_kind = { "1\t3\tx\ty" },
    non_numeric_kind = { "1\tput\tx\ty" },
    empty_key = { "1\t2\t\ty" },
    truncated_escape = { "1\t2\tx\tab%4" },
    bad_hex_escape = { "1\t2\tx\t%zz" },
    invalid_utf8_escape = { "1\t2\tx\t%ff" },
    short_checksum = { "1\t2\tx\ty\tabc" },
    non_hex_checksum = { "1\t2\tx\ty\tnothexxx" },
)]
fn rejects_malformed_records(line: &str) {
    assert!(Event::from_line(line).is_err(), "accepted {:?}", line);
}

proptest! {
    #[test]
    fn escaped_text_never_contains_framing(raw in any::<String>()) {
        let escaped = escape(&raw);
        prop_assert!(!escaped.contains('\t'));
        prop_assert!(!escaped.contains('\n'));
        prop_assert!(!escaped.contains('\r'));
        prop_assert_eq!(unescape(&escaped).unwrap(), raw.as_str());
    }

    #[test]
    fn records_survive_the_line_codec(
        sequence in 1u64..,
        key in ".+",
        value in any::<String>(),
    ) {
        let event = Event::put(sequence, key, value);
        prop_assert_eq!(Event::from_line(&event.to_line(true)).unwrap(), event);
    }
}
