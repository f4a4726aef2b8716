//! End-to-end correlation over the default 16×9 grid:
//! derive keys → render a graph payload → decode → extract tags → correlate.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use gm_core::{
    AddressingScheme, Cancellation, Coordinate, CoreError, Correlator, Never, Tag, decode_nodes,
    derive_key, extract_tags,
};

fn key(namespace: &str, second: u64, row: u32, column: u32) -> String {
    derive_key(namespace, Coordinate::new(row, column, second).unwrap()).unwrap()
}

fn graph_payload(entries: &[(String, &str)]) -> String {
    let mut text = String::from("digraph tags {\n");
    for (i, (pubkey, memo)) in entries.iter().enumerate() {
        text.push_str(&format!("  \"n{i}\" [pubkey=\"{pubkey}\" memo=\"{memo}\"];\n"));
    }
    text.push_str("  \"n0\" -> \"n1\";\n}\n");
    text
}

/// Cancels itself after a fixed number of checks.
struct CancelAfter {
    remaining: AtomicUsize,
}

impl Cancellation for CancelAfter {
    fn is_cancelled(&self) -> bool {
        self.remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_err()
    }
}

#[test]
fn correlation_recovers_both_points_sorted() {
    let payload = graph_payload(&[
        (key("ns", 11, 9, 1), "later note"),
        (key("ns", 3, 2, 5), "early note"),
        ("c29tZXRoaW5nIGVsc2U=".to_string(), "unrelated"),
    ]);
    let tags = extract_tags(&decode_nodes(&payload));
    assert_eq!(tags.len(), 3);

    let result = Correlator::new().correlate("ns", 15, &tags, &Never).unwrap();
    assert_eq!(result.points.len(), 2);

    let first = &result.points[0];
    assert_eq!(first.time, 3.0);
    assert_eq!((first.row, first.column), (3, 6));
    assert_eq!(first.note, "early note");
    assert!(first.read_only);

    let second = &result.points[1];
    assert_eq!(second.time, 11.0);
    assert_eq!((second.row, second.column), (10, 2));
    assert_eq!(second.note, "later note");

    // The unrelated tag keeps the index non-empty, so every second is walked.
    assert_eq!(result.stats.grids_derived, 16);
    assert_eq!(result.stats.unmatched, 1);
}

#[test]
fn correlation_exits_early_when_tags_exhausted() {
    let tags = vec![
        Tag::new(key("ns", 0, 4, 4), "zero"),
        Tag::new(key("ns", 1, 0, 8), "one"),
    ];
    let result = Correlator::new().correlate("ns", 1000, &tags, &Never).unwrap();
    assert_eq!(result.points.len(), 2);
    assert!(result.stats.grids_derived <= 2);
    assert_eq!(result.stats.keys_derived, 2 * 144);
}

#[test]
fn correlation_stops_promptly_on_cancel() {
    let tags = vec![Tag::new("never-matches", "x")];
    let cancel = CancelAfter {
        remaining: AtomicUsize::new(3),
    };
    let correlator = Correlator::with_grid(1, 1).unwrap();
    let result = correlator.correlate("ns", 1000, &tags, &cancel);
    assert!(matches!(result, Err(CoreError::Cancelled)));
}

#[test]
fn correlation_cancel_flag_shared_across_threads() {
    let flag = Arc::new(AtomicBool::new(false));
    let tags = vec![Tag::new("never-matches", "x")];
    let correlator = Correlator::with_grid(1, 1).unwrap();

    let worker_flag = Arc::clone(&flag);
    let handle = std::thread::spawn(move || correlator.correlate("ns", u64::MAX, &tags, &worker_flag));
    flag.store(true, Ordering::Release);
    assert!(matches!(handle.join().unwrap(), Err(CoreError::Cancelled)));
}

#[test]
fn explicit_scheme_from_decoded_graph() {
    let payload = r#"
        "a" [pubkey="k-a" memo="ns/T+42s/3x7/Hello"];
        "b" [pubkey="k-b" memo="elsewhere/T+1s/1x1/ignored"];
        "c" [pubkey="k-c" memo="ns/T+abcs/3x7/x"];
        "d" [memo="ns/T+1s/1x1/no key"];
    "#;
    let tags = extract_tags(&decode_nodes(payload));
    let correlator = Correlator::new().with_scheme(AddressingScheme::Explicit);
    let result = correlator.correlate("ns", 100, &tags, &Never).unwrap();

    assert_eq!(result.points.len(), 1);
    let p = &result.points[0];
    assert_eq!((p.time, p.column, p.row), (42.0, 3, 7));
    assert!(p.note.contains("Hello"));
    assert_eq!(p.id, "k-a");
}

#[test]
fn parallel_workers_agree_with_sequential() {
    let tags = vec![
        Tag::new(key("ns", 2, 0, 0), "a"),
        Tag::new(key("ns", 5, 15, 8), "b"),
    ];
    let sequential = Correlator::new().correlate("ns", 8, &tags, &Never).unwrap();
    let parallel = Correlator::new()
        .with_workers(4)
        .correlate("ns", 8, &tags, &Never)
        .unwrap();
    assert_eq!(sequential.points, parallel.points);
}
