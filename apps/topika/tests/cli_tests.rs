//! Integration tests for the CLI command layer, exercised against the
//! file backend in temporary directories.

use std::path::PathBuf;
use tempfile::tempdir;
use topika::cli::{
    cmd_assoc, cmd_export, cmd_import, cmd_init, cmd_merge, cmd_name, cmd_occurrence, cmd_topic,
    load_or_create_map, resolve_topic,
};
use topika_core::{ConstructOps, IdentityOps, Locator, TopicMapError};

const BACKEND: &str = "file";

fn db_in(dir: &tempfile::TempDir) -> PathBuf {
    dir.path().join("map.tmap")
}

#[test]
fn init_refuses_to_overwrite_without_force() {
    let temp = tempdir().expect("temp dir");
    let db = db_in(&temp);

    cmd_init(&db, BACKEND, false).expect("init");
    assert!(db.exists());

    assert!(matches!(
        cmd_init(&db, BACKEND, false),
        Err(TopicMapError::Io(_))
    ));
    cmd_init(&db, BACKEND, true).expect("forced init");
}

#[test]
fn topic_command_is_idempotent_per_identifier() {
    let temp = tempdir().expect("temp dir");
    let db = db_in(&temp);

    cmd_topic(&db, BACKEND, false, Some("http://ex/alice"), None, None).expect("create");
    cmd_topic(&db, BACKEND, false, Some("http://ex/alice"), None, None).expect("re-run");

    let map = load_or_create_map(&db, BACKEND).expect("load");
    assert_eq!(map.topics().len(), 1);
}

#[test]
fn name_and_occurrence_attach_to_resolved_topic() {
    let temp = tempdir().expect("temp dir");
    let db = db_in(&temp);

    cmd_topic(&db, BACKEND, false, Some("http://ex/alice"), None, None).expect("topic");
    cmd_name(
        &db,
        BACKEND,
        false,
        "http://ex/alice",
        "http://psi.topicmaps.org/iso13250/model/topic-name",
        "Alice",
        &[],
    )
    .expect("name");
    cmd_occurrence(
        &db,
        BACKEND,
        false,
        "http://ex/alice",
        "http://ex/homepage",
        "http://alice.example.org",
        None,
        &["http://ex/web".to_string()],
    )
    .expect("occurrence");

    let map = load_or_create_map(&db, BACKEND).expect("load");
    let alice = resolve_topic(&map, "http://ex/alice").expect("resolve");
    assert_eq!(map.names_of(alice).expect("names").len(), 1);
    assert_eq!(map.occurrences_of(alice).expect("occurrences").len(), 1);
}

#[test]
fn unknown_topic_reference_is_an_error() {
    let map = topika_core::TopicMap::new();
    assert!(matches!(
        resolve_topic(&map, "http://ex/nobody"),
        Err(TopicMapError::InvalidValue(_))
    ));
}

#[test]
fn assoc_command_creates_roles_for_each_spec() {
    let temp = tempdir().expect("temp dir");
    let db = db_in(&temp);

    cmd_assoc(
        &db,
        BACKEND,
        false,
        "http://ex/employment",
        &[
            "http://ex/employer=http://ex/acme".to_string(),
            "http://ex/employee=http://ex/alice".to_string(),
        ],
        &[],
    )
    .expect("assoc");

    let map = load_or_create_map(&db, BACKEND).expect("load");
    assert_eq!(map.associations().len(), 1);
    let alice = resolve_topic(&map, "http://ex/alice").expect("resolve");
    assert_eq!(map.roles_played_by(alice).expect("roles").len(), 1);
}

#[test]
fn merge_command_absorbs_the_source() {
    let temp = tempdir().expect("temp dir");
    let db = db_in(&temp);

    cmd_topic(&db, BACKEND, false, Some("http://ex/a"), None, None).expect("topic a");
    cmd_topic(&db, BACKEND, false, Some("http://ex/b"), None, None).expect("topic b");
    cmd_merge(&db, BACKEND, false, "http://ex/a", "http://ex/b").expect("merge");

    let map = load_or_create_map(&db, BACKEND).expect("load");
    let a = map
        .topic_by_subject_identifier(&Locator::new("http://ex/a"))
        .expect("a");
    let b = map
        .topic_by_subject_identifier(&Locator::new("http://ex/b"))
        .expect("b");
    assert_eq!(a, b);
    assert_eq!(map.topics().len(), 1);
}

#[test]
fn export_then_import_restores_the_map() {
    let temp = tempdir().expect("temp dir");
    let db = db_in(&temp);
    let copy = temp.path().join("copy.tmap");
    let snapshot = temp.path().join("out.snapshot");

    cmd_topic(&db, BACKEND, false, Some("http://ex/alice"), None, None).expect("topic");
    cmd_export(&db, BACKEND, &snapshot, "snapshot").expect("export");
    cmd_import(&copy, BACKEND, &snapshot).expect("import");

    let map = load_or_create_map(&copy, BACKEND).expect("load");
    assert!(
        map.topic_by_subject_identifier(&Locator::new("http://ex/alice"))
            .is_some()
    );
}

#[test]
fn export_rejects_unknown_format() {
    let temp = tempdir().expect("temp dir");
    let db = db_in(&temp);
    cmd_init(&db, BACKEND, false).expect("init");

    assert!(matches!(
        cmd_export(&db, BACKEND, &temp.path().join("out"), "xml"),
        Err(TopicMapError::Serialization(_))
    ));
}
