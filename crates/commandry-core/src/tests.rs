use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use super::*;

const BEGIN: &str = "# >>> a >>>";
const END: &str = "# <<< a <<<";

static TEST_ROOT_COUNTER: AtomicU64 = AtomicU64::new(0);

fn test_root(label: &str) -> PathBuf {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system time")
        .as_nanos();
    let sequence = TEST_ROOT_COUNTER.fetch_add(1, Ordering::Relaxed);
    let root = std::env::temp_dir().join(format!(
        "commandry-core-tests-{label}-{}-{nanos}-{sequence}",
        std::process::id()
    ));
    fs::create_dir_all(&root).expect("must create test root");
    root
}

fn block(body: &str) -> String {
    format!("{BEGIN}\n{body}\n{END}")
}

#[test]
fn upsert_is_idempotent() {
    let first = upsert("hello\n", BEGIN, END, &block("X")).expect("must upsert");
    assert!(first.changed);

    let second = upsert(&first.content, BEGIN, END, &block("X")).expect("must upsert again");
    assert!(!second.changed, "second upsert must be a no-op");
    assert_eq!(second.content, first.content);
}

#[test]
fn upsert_appends_with_single_blank_line_separation() {
    let edit = upsert("hello\n\n\n", BEGIN, END, &block("X")).expect("must upsert");
    assert_eq!(edit.content, format!("hello\n\n{}\n", block("X")));

    let edit = upsert("hello", BEGIN, END, &block("X")).expect("must upsert");
    assert_eq!(edit.content, format!("hello\n\n{}\n", block("X")));
}

#[test]
fn upsert_on_empty_content_yields_block_with_trailing_newline() {
    let edit = upsert("", BEGIN, END, &block("X")).expect("must upsert");
    assert!(edit.changed);
    assert_eq!(edit.content, format!("{}\n", block("X")));
}

#[test]
fn upsert_replaces_differing_block_in_place() {
    let content = format!("before\n\n{}\n\nafter\n", block("old"));
    let edit = upsert(&content, BEGIN, END, &block("new")).expect("must upsert");
    assert!(edit.changed);
    assert_eq!(edit.content, format!("before\n\n{}\n\nafter\n", block("new")));
}

#[test]
fn upsert_adds_terminator_when_block_ends_file() {
    let content = format!("before\n\n{}", block("old"));
    let edit = upsert(&content, BEGIN, END, &block("new")).expect("must upsert");
    assert_eq!(edit.content, format!("before\n\n{}\n", block("new")));
}

#[test]
fn upsert_ignores_line_ending_differences() {
    let content = format!("{BEGIN}\r\nX\r\n{END}\r\n");
    let edit = upsert(&content, BEGIN, END, &block("X")).expect("must upsert");
    assert!(!edit.changed, "CRLF copy of the same block must compare equal");
    assert_eq!(edit.content, content);
}

#[test]
fn remove_rejects_end_marker_without_begin() {
    let err = remove(&format!("x\n{END}\n"), BEGIN, END).expect_err("must reject");
    assert_eq!(err, TextBlockError::MalformedMarkers);
}

#[test]
fn locate_rejects_duplicate_begin() {
    let content = format!("{BEGIN}\n1\n{BEGIN}\n2\n{END}");
    assert_eq!(
        locate(&content, BEGIN, END),
        Err(TextBlockError::MalformedMarkers)
    );
}

#[test]
fn locate_rejects_begin_without_end() {
    let content = format!("{BEGIN}\nunterminated\n");
    assert_eq!(
        locate(&content, BEGIN, END),
        Err(TextBlockError::MalformedMarkers)
    );
}

#[test]
fn locate_rejects_duplicate_pair_after_block() {
    let content = format!("{}\n{}\n", block("1"), block("2"));
    assert_eq!(
        locate(&content, BEGIN, END),
        Err(TextBlockError::MalformedMarkers)
    );

    let content = format!("{}\n{END}\n", block("1"));
    assert_eq!(
        locate(&content, BEGIN, END),
        Err(TextBlockError::MalformedMarkers)
    );
}

#[test]
fn locate_span_swallows_trailing_line_terminators() {
    let content = format!("a\n{}\r\n\nb", block("X"));
    let span = locate(&content, BEGIN, END)
        .expect("must locate")
        .expect("block must be found");
    assert_eq!(span.start, 2);
    assert_eq!(&content[span.end..], "b");
}

#[test]
fn malformed_upsert_leaves_no_partial_result() {
    let content = format!("keep\n{END}\n");
    assert_eq!(
        upsert(&content, BEGIN, END, &block("X")),
        Err(TextBlockError::MalformedMarkers)
    );
}

#[test]
fn remove_restores_content_around_block() {
    let content = format!("export A=1\n{}\nexport B=2\n", block("X"));
    let edit = remove(&content, BEGIN, END).expect("must remove");
    assert!(edit.changed);
    assert_eq!(edit.content, "export A=1\nexport B=2\n");
}

#[test]
fn remove_after_upsert_round_trips_original_content() {
    let original = "hello\n";
    let added = upsert(original, BEGIN, END, &block("X")).expect("must upsert");
    let removed = remove(&added.content, BEGIN, END).expect("must remove");
    assert_eq!(removed.content, original);
}

#[test]
fn remove_of_only_block_yields_empty_content() {
    let edit = remove(&format!("{}\n", block("X")), BEGIN, END).expect("must remove");
    assert!(edit.changed);
    assert_eq!(edit.content, "");
}

#[test]
fn remove_without_block_is_unchanged() {
    let edit = remove("plain\n", BEGIN, END).expect("must remove");
    assert!(!edit.changed);
    assert_eq!(edit.content, "plain\n");
}

#[test]
fn migrate_legacy_dir_moves_data_to_current() {
    let base = test_root("migrate");
    let legacy = base.join(LEGACY_DIR_NAME);
    let current = base.join(CURRENT_DIR_NAME);
    fs::create_dir_all(&legacy).expect("must create legacy dir");
    fs::write(legacy.join("config.yaml"), "policy:\n").expect("must write legacy config");

    let moved = migrate_legacy_dir(&legacy, &current).expect("must migrate");
    assert!(moved);
    assert!(!legacy.exists());
    let migrated = fs::read_to_string(current.join("config.yaml")).expect("must read migrated");
    assert_eq!(migrated, "policy:\n");

    let _ = fs::remove_dir_all(&base);
}

#[test]
fn migrate_legacy_dir_never_overwrites_current() {
    let base = test_root("no-overwrite");
    let legacy = base.join(LEGACY_DIR_NAME);
    let current = base.join(CURRENT_DIR_NAME);
    fs::create_dir_all(&legacy).expect("must create legacy dir");
    fs::create_dir_all(&current).expect("must create current dir");
    fs::write(legacy.join("marker"), "legacy").expect("must write legacy marker");

    let moved = migrate_legacy_dir(&legacy, &current).expect("must not fail");
    assert!(!moved);
    assert!(legacy.join("marker").exists(), "legacy data must stay put");
    assert!(!current.join("marker").exists());

    let _ = fs::remove_dir_all(&base);
}

#[test]
fn migrate_legacy_dir_is_noop_for_same_path() {
    let base = test_root("same-path");
    let dir = base.join(CURRENT_DIR_NAME);
    let alias = base.join(".").join(CURRENT_DIR_NAME);
    assert!(!migrate_legacy_dir(&dir, &alias).expect("must not fail"));

    let _ = fs::remove_dir_all(&base);
}

#[test]
fn config_root_prefers_current_then_legacy() {
    let base = test_root("resolve");
    assert_eq!(config_root_in(&base), base.join(CURRENT_DIR_NAME));
    assert!(
        !base.join(CURRENT_DIR_NAME).exists(),
        "resolver must not create the root eagerly"
    );

    fs::create_dir_all(base.join(LEGACY_DIR_NAME)).expect("must create legacy dir");
    assert_eq!(config_root_in(&base), base.join(CURRENT_DIR_NAME));
    assert!(base.join(CURRENT_DIR_NAME).is_dir());
    assert!(!base.join(LEGACY_DIR_NAME).exists());

    let _ = fs::remove_dir_all(&base);
}

#[test]
fn parse_config_reads_setup_and_log_tables() {
    let config = parse_config(
        r#"
[setup]
bin_dir = "/opt/me/bin"
no_path = true
profile = "/home/me/.zshrc"

[log]
level = "debug"
"#,
    )
    .expect("config should parse");

    assert_eq!(config.setup.bin_dir, Some(PathBuf::from("/opt/me/bin")));
    assert_eq!(config.setup.no_path, Some(true));
    assert_eq!(config.setup.profile, Some(PathBuf::from("/home/me/.zshrc")));
    assert_eq!(config.log.level.as_deref(), Some("debug"));
}

#[test]
fn parse_config_rejects_unknown_keys() {
    let err = parse_config("[setup]\nbindir = \"/x\"\n").expect_err("typo must be rejected");
    assert!(err.to_string().contains("bindir"), "unexpected error: {err}");
}

#[test]
fn load_config_defaults_when_missing_and_names_file_when_malformed() {
    let root = test_root("config");
    assert_eq!(load_config(&root).expect("missing is fine"), AppConfig::default());

    fs::write(config_path(&root), "[setup\n").expect("must write config");
    let err = load_config(&root).expect_err("malformed config must fail");
    assert!(
        err.to_string().contains("config.toml"),
        "unexpected error: {err}"
    );

    let _ = fs::remove_dir_all(&root);
}
