//! End-to-end transaction scenarios against real scratch repositories.

use std::path::{Path, PathBuf};

use onyo_core::query::{self, ItemType, MatchExpr, Query, SortOrder};
use onyo_core::tsv;
use onyo_core::{CommitOptions, Document, Inventory, OnyoError, Transaction};
use onyo_git::ConfigScope;

fn scratch() -> (tempfile::TempDir, Inventory) {
    let dir = tempfile::tempdir().unwrap();
    let inv = Inventory::init(dir.path()).unwrap();
    inv.git()
        .config_set("user.name", "Test", &ConfigScope::Local)
        .unwrap();
    inv.git()
        .config_set("user.email", "test@example.com", &ConfigScope::Local)
        .unwrap();
    (dir, inv)
}

fn doc_from_pairs(pairs: &[(&str, &str)]) -> Document {
    let mut doc = Document::new();
    for (key, value) in pairs {
        doc.set_scalar(key, value, true, false).unwrap();
    }
    doc
}

fn mkdirs(inv: &Inventory, dirs: &[&str]) {
    let mut tx = Transaction::new(inv).unwrap();
    for dir in dirs {
        tx.add_directory(Path::new(dir)).unwrap();
    }
    tx.commit(&CommitOptions::with_verb("mkdir")).unwrap();
}

fn new_asset(inv: &Inventory, dir: &str, pairs: &[(&str, &str)]) -> PathBuf {
    let mut tx = Transaction::new(inv).unwrap();
    let path = tx
        .add_asset(Path::new(dir), doc_from_pairs(pairs), false)
        .unwrap();
    tx.commit(&CommitOptions::with_verb("new")).unwrap();
    path
}

const LAPTOP: &[(&str, &str)] = &[
    ("type", "laptop"),
    ("make", "apple"),
    ("model", "macbookpro"),
    ("serial", "867"),
];

#[test]
fn init_create_move_scenario() {
    let (dir, inv) = scratch();

    mkdirs(&inv, &["shelf", "user"]);
    let path = new_asset(&inv, "shelf", LAPTOP);
    assert_eq!(path, PathBuf::from("shelf/laptop_apple_macbookpro.867"));

    let mut tx = Transaction::new(&inv).unwrap();
    tx.move_asset(&path, Path::new("user")).unwrap();
    tx.commit(&CommitOptions::with_verb("mv")).unwrap();

    let moved = dir.path().join("user/laptop_apple_macbookpro.867");
    assert!(moved.is_file());
    assert!(!dir.path().join("shelf/laptop_apple_macbookpro.867").exists());
    assert_eq!(inv.git().commit_count().unwrap(), 4);

    let doc = inv
        .load_document(Path::new("user/laptop_apple_macbookpro.867"))
        .unwrap();
    for (key, value) in LAPTOP {
        assert_eq!(doc.get_text(key).as_deref(), Some(*value), "key {key}");
    }
}

#[test]
fn each_command_is_exactly_one_commit() {
    let (_dir, inv) = scratch();
    assert_eq!(inv.git().commit_count().unwrap(), 1); // init

    mkdirs(&inv, &["shelf", "user"]);
    assert_eq!(inv.git().commit_count().unwrap(), 2);

    new_asset(&inv, "shelf", LAPTOP);
    assert_eq!(inv.git().commit_count().unwrap(), 3);
}

#[test]
fn rename_collision_leaves_no_trace() {
    let (dir, inv) = scratch();
    mkdirs(&inv, &["shelf"]);
    let one = new_asset(&inv, "shelf", &[("type", "x"), ("make", "y"), ("model", "z"), ("serial", "1")]);
    new_asset(&inv, "shelf", &[("type", "x"), ("make", "y"), ("model", "z"), ("serial", "2")]);
    let commits = inv.git().commit_count().unwrap();
    let body_before = std::fs::read_to_string(dir.path().join(&one)).unwrap();

    let mut tx = Transaction::new(&inv).unwrap();
    let mut doc = inv.load_document(&one).unwrap();
    doc.set_scalar("serial", "2", false, false).unwrap();
    let err = tx.modify_asset(&one, doc, true).unwrap_err();
    assert!(matches!(err, OnyoError::NameCollision { .. }));
    drop(tx);

    assert_eq!(inv.git().commit_count().unwrap(), commits);
    assert_eq!(
        std::fs::read_to_string(dir.path().join(&one)).unwrap(),
        body_before
    );
    assert!(inv.git().is_clean().unwrap());
}

#[test]
fn bound_key_set_requires_rename() {
    let (dir, inv) = scratch();
    mkdirs(&inv, &["user"]);
    let path = new_asset(&inv, "user", LAPTOP);

    // Without rename permission the mutation is rejected.
    let mut tx = Transaction::new(&inv).unwrap();
    let mut doc = inv.load_document(&path).unwrap();
    doc.set_scalar("serial", "99", false, false).unwrap();
    let err = tx.modify_asset(&path, doc.clone(), false).unwrap_err();
    match err {
        OnyoError::BoundKeyMutation { key, .. } => assert_eq!(key, "serial"),
        other => panic!("expected BoundKeyMutation, got {other:?}"),
    }
    drop(tx);

    // With rename permission the file and the body move together.
    let mut tx = Transaction::new(&inv).unwrap();
    let renamed = tx.modify_asset(&path, doc, true).unwrap().unwrap();
    tx.commit(&CommitOptions::with_verb("set")).unwrap();

    assert_eq!(renamed, PathBuf::from("user/laptop_apple_macbookpro.99"));
    assert!(dir.path().join(&renamed).is_file());
    assert!(!dir.path().join(&path).exists());
    let doc = inv.load_document(&renamed).unwrap();
    assert_eq!(doc.get_text("serial").as_deref(), Some("99"));
}

#[test]
fn faux_serials_are_generated_and_distinct() {
    let (_dir, inv) = scratch();
    mkdirs(&inv, &["shelf"]);

    let cable = &[("type", "cable"), ("make", "generic"), ("model", "usb")];
    let first = new_asset(&inv, "shelf", cable);
    let second = new_asset(&inv, "shelf", cable);

    for path in [&first, &second] {
        let name = path.file_name().unwrap().to_string_lossy();
        let serial = name.rsplit('.').next().unwrap();
        assert!(
            serial.starts_with("faux") && serial.len() == 4 + 6,
            "unexpected serial in {name}"
        );
        assert!(serial["faux".len()..]
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }
    assert_ne!(first, second);

    // The generated serial is bound into the document body.
    let doc = inv.load_document(&first).unwrap();
    let name_serial = first
        .file_name()
        .unwrap()
        .to_string_lossy()
        .rsplit('.')
        .next()
        .unwrap()
        .to_owned();
    assert_eq!(doc.get_text("serial").unwrap(), name_serial);
}

#[test]
fn tsv_batch_is_one_commit_and_all_or_nothing() {
    let (_dir, inv) = scratch();
    mkdirs(&inv, &["shelf", "depot"]);
    let before = inv.git().commit_count().unwrap();

    let good = "type\tmake\tmodel\tserial\tdirectory\tdisplay\n\
                laptop\tapple\tmbp\t10\tshelf\t13\n\
                laptop\tapple\tmbp\t11\tshelf\t13\n\
                laptop\tdell\txps\t12\tdepot\t15\n\
                monitor\tdell\tu2720q\t13\tdepot\t27\n\
                cable\tgeneric\tusb\t14\tshelf\t\n";
    let records = tsv::parse(good).unwrap();
    assert_eq!(records.len(), 5);

    let mut tx = Transaction::new(&inv).unwrap();
    for record in &records {
        let mut doc = Document::new();
        for (key, value) in &record.keys {
            doc.set_scalar(key, value, true, false).unwrap();
        }
        let dir = record.directory.clone().unwrap();
        tx.add_asset(Path::new(&dir), doc, false).unwrap();
    }
    tx.commit(&CommitOptions::with_verb("new")).unwrap();
    assert_eq!(inv.git().commit_count().unwrap(), before + 1);
    assert_eq!(inv.view().unwrap().assets.len(), 5);

    // A batch with one invalid row (missing make) aborts before commit.
    let bad = "type\tmake\tmodel\tserial\tdirectory\n\
               printer\thp\tlaserjet\t20\tdepot\n\
               printer\t\tlaserjet\t21\tdepot\n";
    let records = tsv::parse(bad).unwrap();
    let mut tx = Transaction::new(&inv).unwrap();
    let mut failed = false;
    for record in &records {
        let mut doc = Document::new();
        for (key, value) in &record.keys {
            doc.set_scalar(key, value, true, false).unwrap();
        }
        let dir = record.directory.clone().unwrap();
        if tx.add_asset(Path::new(&dir), doc, false).is_err() {
            failed = true;
            break;
        }
    }
    assert!(failed);
    drop(tx);
    assert_eq!(inv.git().commit_count().unwrap(), before + 1);
    assert_eq!(inv.view().unwrap().assets.len(), 5);
}

#[test]
fn dirty_tree_refuses_to_commit() {
    let (dir, inv) = scratch();
    mkdirs(&inv, &["shelf", "user"]);
    let path = new_asset(&inv, "shelf", LAPTOP);
    let before = inv.git().commit_count().unwrap();

    std::fs::write(dir.path().join("stray.txt"), "untracked").unwrap();

    let mut tx = Transaction::new(&inv).unwrap();
    tx.move_asset(&path, Path::new("user")).unwrap();
    let err = tx.commit(&CommitOptions::with_verb("mv")).unwrap_err();
    assert!(matches!(err, OnyoError::DirtyWorkingTree { .. }));

    assert_eq!(inv.git().commit_count().unwrap(), before);
    assert!(dir.path().join(&path).is_file());
}

#[test]
fn set_is_idempotent() {
    let (_dir, inv) = scratch();
    mkdirs(&inv, &["shelf"]);
    let path = new_asset(&inv, "shelf", LAPTOP);

    let set_display = |expect_commit: bool| {
        let before = inv.git().commit_count().unwrap();
        let mut tx = Transaction::new(&inv).unwrap();
        let mut doc = inv.load_document(&path).unwrap();
        doc.set_scalar("display", "13.3", false, false).unwrap();
        tx.modify_asset(&path, doc, false).unwrap();
        let outcome = tx.commit(&CommitOptions::with_verb("set")).unwrap();
        assert_eq!(outcome.is_some(), expect_commit);
        assert_eq!(
            inv.git().commit_count().unwrap(),
            before + usize::from(expect_commit)
        );
    };

    set_display(true);
    set_display(false);
}

#[test]
fn move_there_and_back_is_byte_identical() {
    let (dir, inv) = scratch();
    mkdirs(&inv, &["shelf", "user"]);
    let path = new_asset(&inv, "shelf", LAPTOP);
    let original = std::fs::read(dir.path().join(&path)).unwrap();

    let mut tx = Transaction::new(&inv).unwrap();
    tx.move_asset(&path, Path::new("user")).unwrap();
    tx.commit(&CommitOptions::with_verb("mv")).unwrap();

    let away = PathBuf::from("user/laptop_apple_macbookpro.867");
    let mut tx = Transaction::new(&inv).unwrap();
    tx.move_asset(&away, Path::new("shelf")).unwrap();
    tx.commit(&CommitOptions::with_verb("mv")).unwrap();

    assert_eq!(std::fs::read(dir.path().join(&path)).unwrap(), original);
}

#[test]
fn commit_message_has_subject_and_grouped_sections() {
    let (_dir, inv) = scratch();
    mkdirs(&inv, &["shelf"]);
    new_asset(&inv, "shelf", LAPTOP);

    let message = inv.git().commit_message("HEAD").unwrap();
    let mut lines = message.lines();
    assert_eq!(
        lines.next().unwrap(),
        "new [1]: laptop_apple_macbookpro.867"
    );
    assert_eq!(lines.next().unwrap(), "");
    assert_eq!(lines.next().unwrap(), "--- Inventory Operations ---");
    assert!(message.contains("New assets:\n- shelf/laptop_apple_macbookpro.867"));

    let mkdir_message = inv.git().commit_message("HEAD~1").unwrap();
    assert!(mkdir_message.starts_with("mkdir [1]: shelf"));
    assert!(mkdir_message.contains("New directories:\n- shelf"));
}

#[test]
fn user_paragraphs_append_after_summary() {
    let (_dir, inv) = scratch();
    let mut tx = Transaction::new(&inv).unwrap();
    tx.add_directory(Path::new("shelf")).unwrap();
    let opts = CommitOptions {
        verb: Some("mkdir".to_owned()),
        paragraphs: vec!["bought new shelving".to_owned()],
        auto_message: true,
    };
    tx.commit(&opts).unwrap();

    let message = inv.git().commit_message("HEAD").unwrap();
    assert!(message.starts_with("mkdir [1]: shelf"));
    let summary_at = message.find("--- Inventory Operations ---").unwrap();
    let note_at = message.find("bought new shelving").unwrap();
    assert!(note_at > summary_at);
}

#[test]
fn no_auto_message_requires_paragraphs() {
    let (_dir, inv) = scratch();
    let mut tx = Transaction::new(&inv).unwrap();
    tx.add_directory(Path::new("shelf")).unwrap();
    let err = tx
        .commit(&CommitOptions {
            verb: None,
            paragraphs: vec![],
            auto_message: false,
        })
        .unwrap_err();
    assert!(matches!(err, OnyoError::InvalidOperation { .. }));

    let mut tx = Transaction::new(&inv).unwrap();
    tx.add_directory(Path::new("shelf")).unwrap();
    tx.commit(&CommitOptions {
        verb: None,
        paragraphs: vec!["manual subject".to_owned()],
        auto_message: false,
    })
    .unwrap();
    let message = inv.git().commit_message("HEAD").unwrap();
    assert_eq!(message.trim(), "manual subject");
}

#[test]
fn remove_directory_honours_recursive() {
    let (dir, inv) = scratch();
    mkdirs(&inv, &["shelf"]);
    new_asset(&inv, "shelf", LAPTOP);

    let mut tx = Transaction::new(&inv).unwrap();
    let err = tx.remove_directory(Path::new("shelf"), false).unwrap_err();
    assert!(matches!(err, OnyoError::NotEmpty { .. }));
    drop(tx);

    let mut tx = Transaction::new(&inv).unwrap();
    tx.remove_directory(Path::new("shelf"), true).unwrap();
    tx.commit(&CommitOptions::with_verb("rm")).unwrap();
    assert!(!dir.path().join("shelf").exists());
    assert!(inv.view().unwrap().assets.is_empty());
    assert!(inv.git().is_clean().unwrap());
}

#[test]
fn asset_directory_conversions_roundtrip() {
    let (dir, inv) = scratch();
    mkdirs(&inv, &["shelf"]);
    let path = new_asset(&inv, "shelf", LAPTOP);
    let body_before = std::fs::read_to_string(dir.path().join(&path)).unwrap();

    let mut tx = Transaction::new(&inv).unwrap();
    tx.convert_to_asset_dir(&path).unwrap();
    tx.commit(&CommitOptions::with_verb("mkdir")).unwrap();

    assert!(dir.path().join(&path).is_dir());
    assert!(dir.path().join(&path).join(".anchor").is_file());
    assert!(dir.path().join(&path).join(".onyo-asset-dir").is_file());
    let view = inv.view().unwrap();
    assert!(view.is_asset_dir(&path));
    assert_eq!(
        inv.load_document(&path).unwrap().get_text("serial").as_deref(),
        Some("867")
    );

    let mut tx = Transaction::new(&inv).unwrap();
    tx.convert_from_asset_dir(&path).unwrap();
    tx.commit(&CommitOptions::with_verb("rmdir")).unwrap();

    assert!(dir.path().join(&path).is_file());
    assert_eq!(
        std::fs::read_to_string(dir.path().join(&path)).unwrap(),
        body_before
    );
    assert!(inv.git().is_clean().unwrap());
    assert!(inv.fsck().unwrap().is_empty());
}

#[test]
fn asset_can_be_born_as_a_directory() {
    let (dir, inv) = scratch();
    mkdirs(&inv, &["rack"]);

    let mut tx = Transaction::new(&inv).unwrap();
    let pairs = &[("type", "server"), ("make", "dell"), ("model", "r640"), ("serial", "42")];
    let path = tx
        .add_asset(Path::new("rack"), doc_from_pairs(pairs), true)
        .unwrap();
    tx.commit(&CommitOptions::with_verb("new")).unwrap();

    assert!(dir.path().join(&path).is_dir());
    assert!(dir.path().join(&path).join(".onyo-asset-dir").is_file());
    let view = inv.view().unwrap();
    assert!(view.is_asset_dir(&path));
    assert_eq!(
        inv.load_document(&path).unwrap().get_text("serial").as_deref(),
        Some("42")
    );
}

#[test]
fn move_directory_relocates_contents() {
    let (dir, inv) = scratch();
    mkdirs(&inv, &["rooms/office", "depot"]);
    new_asset(&inv, "rooms/office", LAPTOP);

    let mut tx = Transaction::new(&inv).unwrap();
    tx.move_directory(Path::new("rooms/office"), Path::new("depot/office"))
        .unwrap();
    tx.commit(&CommitOptions::with_verb("mv")).unwrap();

    assert!(dir
        .path()
        .join("depot/office/laptop_apple_macbookpro.867")
        .is_file());
    assert!(!dir.path().join("rooms/office").exists());
    let view = inv.view().unwrap();
    assert!(view.is_dir(Path::new("depot/office")));
    assert!(view.is_asset(Path::new("depot/office/laptop_apple_macbookpro.867")));
}

#[test]
fn render_diff_shows_hunks_and_summary() {
    let (_dir, inv) = scratch();
    mkdirs(&inv, &["shelf"]);
    let path = new_asset(&inv, "shelf", LAPTOP);

    let mut tx = Transaction::new(&inv).unwrap();
    let mut doc = inv.load_document(&path).unwrap();
    doc.set_scalar("display", "13.3", false, false).unwrap();
    tx.modify_asset(&path, doc, false).unwrap();

    let diff = tx.render_diff();
    assert!(diff.contains("+display: 13.3"));
    assert!(diff.contains("--- Inventory Operations ---"));
    assert!(diff.contains("Modified assets:\n- shelf/laptop_apple_macbookpro.867"));
}

#[test]
fn query_matches_sorts_and_projects() {
    let (_dir, inv) = scratch();
    mkdirs(&inv, &["shelf", "depot"]);
    new_asset(&inv, "shelf", &[("type", "laptop"), ("make", "apple"), ("model", "mbp"), ("serial", "9")]);
    new_asset(&inv, "shelf", &[("type", "laptop"), ("make", "dell"), ("model", "xps"), ("serial", "300")]);
    new_asset(&inv, "depot", &[("type", "monitor"), ("make", "dell"), ("model", "u2720q"), ("serial", "5")]);

    let query = Query {
        matches: vec![MatchExpr::parse("type=laptop").unwrap()],
        keys: vec!["serial".into(), "make".into(), "nonexistent".into()],
        sort: vec![("serial".into(), SortOrder::Ascending)],
        ..Query::default()
    };
    let out = query::run(&inv, &query).unwrap();
    assert!(out.errors.is_empty());
    assert_eq!(out.rows.len(), 2);
    // Natural sort: 9 before 300.
    assert_eq!(out.rows[0].values, ["9", "apple", "[unset]"]);
    assert_eq!(out.rows[1].values, ["300", "dell", "[unset]"]);

    // Scoping by include path.
    let query = Query {
        include: vec![PathBuf::from("depot")],
        keys: vec!["type".into()],
        ..Query::default()
    };
    let out = query::run(&inv, &query).unwrap();
    assert_eq!(out.rows.len(), 1);
    assert_eq!(out.rows[0].values, ["monitor"]);

    // Directories show up when asked for.
    let query = Query {
        types: vec![ItemType::Directories],
        keys: vec!["path".into()],
        ..Query::default()
    };
    let out = query::run(&inv, &query).unwrap();
    assert!(out
        .rows
        .iter()
        .any(|r| r.path == PathBuf::from("shelf")));
}

#[test]
fn query_survives_malformed_assets() {
    let (_dir, inv) = scratch();
    mkdirs(&inv, &["shelf"]);
    new_asset(&inv, "shelf", LAPTOP);
    inv.git()
        .write_file(Path::new("shelf/broken_b_c.1"), b"---\n- top level list\n")
        .unwrap();
    inv.git().stage(&[PathBuf::from("shelf")]).unwrap();
    inv.git().commit("sneak in a broken file").unwrap();
    inv.invalidate();

    let out = query::run(&inv, &Query::default()).unwrap();
    assert_eq!(out.rows.len(), 1);
    assert_eq!(out.errors.len(), 1);
    assert!(out.errors[0].contains("broken_b_c.1"));
}

#[test]
fn fsck_passes_after_normal_operations() {
    let (_dir, inv) = scratch();
    mkdirs(&inv, &["shelf", "user"]);
    let path = new_asset(&inv, "shelf", LAPTOP);
    let mut tx = Transaction::new(&inv).unwrap();
    tx.move_asset(&path, Path::new("user")).unwrap();
    tx.commit(&CommitOptions::with_verb("mv")).unwrap();

    assert!(inv.fsck().unwrap().is_empty());
}
