//! Cross-module scenarios exercising `Database`, `QueryEngine`, and
//! `Coordinator` together rather than any one module in isolation.

use std::fs;
use std::sync::mpsc;
use std::sync::Mutex;
use std::time::Duration;

use fsearch_core::{
    CancellationToken, Coordinator, Database, FilterKind, IncludePath, Query, QueryEngine,
    QueryFilterSpec, QueryFlags, QueryObserver, SearchResult,
};
use tempfile::tempdir;

fn isolate_xdg_data_home(dir: &std::path::Path) {
    // Safety: test-only; no other thread reads/writes this env var concurrently.
    unsafe { std::env::set_var("XDG_DATA_HOME", dir) };
}

#[test]
fn scan_small_tree_sorts_folders_first_and_assigns_contiguous_pos() {
    let data_home = tempdir().unwrap();
    isolate_xdg_data_home(data_home.path());
    let root = tempdir().unwrap();
    fs::write(root.path().join("a.txt"), b"1").unwrap();
    fs::create_dir(root.path().join("b")).unwrap();
    fs::write(root.path().join("b/c.txt"), b"22").unwrap();

    let db = Database::new(vec![IncludePath::new(root.path().to_path_buf())], vec![], vec![], false);
    let cancel = CancellationToken::noop();
    assert!(db.scan(&cancel, |_| {}).unwrap());

    let snapshot = db.snapshot();
    assert_eq!(snapshot.array.len(), 3);
    let names: Vec<_> = snapshot
        .array
        .as_slice()
        .iter()
        .map(|r| String::from_utf8_lossy(&snapshot.entry(*r).name).into_owned())
        .collect();
    assert_eq!(names, vec!["b", "a.txt", "c.txt"]);
    for (i, entry_ref) in snapshot.array.as_slice().iter().enumerate() {
        assert_eq!(snapshot.entry(*entry_ref).pos as usize, i);
    }
}

#[test]
fn exclude_hidden_toggle_changes_entry_count() {
    let data_home = tempdir().unwrap();
    isolate_xdg_data_home(data_home.path());
    let root = tempdir().unwrap();
    fs::write(root.path().join("a.txt"), b"1").unwrap();
    fs::write(root.path().join(".hidden"), b"1").unwrap();

    let mut include = IncludePath::new(root.path().to_path_buf());
    let db = Database::new(vec![include.clone()], vec![], vec![], true);
    let cancel = CancellationToken::noop();
    db.scan(&cancel, |_| {}).unwrap();
    assert_eq!(db.snapshot().num_entries, 1);

    include.update = true;
    let db_visible = Database::new(vec![include], vec![], vec![], false);
    db_visible.scan(&cancel, |_| {}).unwrap();
    assert_eq!(db_visible.snapshot().num_entries, 2);
}

#[test]
fn multi_token_and_narrows_to_entries_matching_every_token() {
    let data_home = tempdir().unwrap();
    isolate_xdg_data_home(data_home.path());
    let root = tempdir().unwrap();
    fs::write(root.path().join("alpha.log"), b"").unwrap();
    fs::write(root.path().join("alpha.txt"), b"").unwrap();
    fs::write(root.path().join("beta.log"), b"").unwrap();

    let db = Database::new(vec![IncludePath::new(root.path().to_path_buf())], vec![], vec![], false);
    let cancel = CancellationToken::noop();
    db.scan(&cancel, |_| {}).unwrap();
    let snapshot = db.snapshot();

    let engine = QueryEngine::new();
    let result = engine
        .run("alpha log", QueryFlags::default(), None, 0, &snapshot, &cancel)
        .unwrap()
        .unwrap();
    assert_eq!(result.matches.len(), 1);
    assert_eq!(result.num_files, 1);
    assert_eq!(result.num_folders, 0);
    assert_eq!(snapshot.entry(result.matches[0]).name, b"alpha.log");
}

#[test]
fn regex_flag_gates_whether_a_dotted_pattern_is_literal_or_wildcard() {
    let data_home = tempdir().unwrap();
    isolate_xdg_data_home(data_home.path());
    let root = tempdir().unwrap();
    for name in ["abc", "a1c", "axc"] {
        fs::write(root.path().join(name), b"").unwrap();
    }

    let db = Database::new(vec![IncludePath::new(root.path().to_path_buf())], vec![], vec![], false);
    let cancel = CancellationToken::noop();
    db.scan(&cancel, |_| {}).unwrap();
    let snapshot = db.snapshot();
    let engine = QueryEngine::new();

    let mut regex_flags = QueryFlags::default();
    regex_flags.enable_regex = true;
    let result = engine
        .run("a.c", regex_flags, None, 0, &snapshot, &cancel)
        .unwrap()
        .unwrap();
    assert_eq!(result.matches.len(), 3);

    let literal_result = engine
        .run("a.c", QueryFlags::default(), None, 0, &snapshot, &cancel)
        .unwrap()
        .unwrap();
    assert!(literal_result.matches.is_empty());
}

#[test]
fn folders_only_filter_on_empty_query_returns_just_the_directory() {
    let data_home = tempdir().unwrap();
    isolate_xdg_data_home(data_home.path());
    let root = tempdir().unwrap();
    fs::write(root.path().join("a.txt"), b"1").unwrap();
    fs::create_dir(root.path().join("b")).unwrap();
    fs::write(root.path().join("b/c.txt"), b"22").unwrap();

    let db = Database::new(vec![IncludePath::new(root.path().to_path_buf())], vec![], vec![], false);
    let cancel = CancellationToken::noop();
    db.scan(&cancel, |_| {}).unwrap();
    let snapshot = db.snapshot();

    let engine = QueryEngine::new();
    let mut flags = QueryFlags::default();
    flags.pass_on_empty = true;
    let spec = QueryFilterSpec {
        kind: FilterKind::FoldersOnly,
        query: String::new(),
        search_in_path: false,
    };
    let result = engine
        .run("", flags, Some(&spec), 0, &snapshot, &cancel)
        .unwrap()
        .unwrap();
    assert_eq!(result.matches.len(), 1);
    assert!(snapshot.entry(result.matches[0]).is_dir);
}

struct ChannelObserver(Mutex<mpsc::Sender<ObservedOutcome>>);

enum ObservedOutcome {
    Result(SearchResult),
    Cancelled,
}

impl QueryObserver for ChannelObserver {
    fn on_result(&self, result: SearchResult) {
        let _ = self.0.lock().unwrap().send(ObservedOutcome::Result(result));
    }
    fn on_cancelled(&self) {
        let _ = self.0.lock().unwrap().send(ObservedOutcome::Cancelled);
    }
}

/// Submitting a second query while the first is still sitting unclaimed in
/// the coordinator's mailbox evicts (and cancels) the first. This races the
/// worker thread's wakeup against two back-to-back submits from this test
/// thread: most runs land the eviction, occasionally the worker claims the
/// first query before the second submit arrives and both run to completion.
/// Either way exactly one terminal callback fires per query, in submission
/// order when eviction happens.
#[test]
fn submitting_a_second_query_before_the_first_completes_settles_both_queries() {
    let data_home = tempdir().unwrap();
    isolate_xdg_data_home(data_home.path());
    let root = tempdir().unwrap();
    for i in 0..2000 {
        fs::write(root.path().join(format!("entry-{i}.txt")), b"").unwrap();
    }
    let db = Database::new(vec![IncludePath::new(root.path().to_path_buf())], vec![], vec![], false);
    let cancel = CancellationToken::noop();
    db.scan(&cancel, |_| {}).unwrap();

    let coordinator = Coordinator::new();
    let (tx1, rx1) = mpsc::channel();
    let (tx2, rx2) = mpsc::channel();
    let make_query = |tx| Query {
        text: "entry".to_string(),
        database: db.clone(),
        flags: QueryFlags::default(),
        filter: None,
        max_results: 0,
        observer: Box::new(ChannelObserver(Mutex::new(tx))),
    };
    coordinator.submit(make_query(tx1));
    coordinator.submit(make_query(tx2));

    let second = rx2.recv_timeout(Duration::from_secs(5)).unwrap();
    assert!(matches!(second, ObservedOutcome::Result(_)));
    let _first = rx1.recv_timeout(Duration::from_secs(5)).unwrap();
}
