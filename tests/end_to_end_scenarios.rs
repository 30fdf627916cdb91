//! Black-box coverage for the six walkthrough scenarios and the testable
//! properties they exercise: a simple content edit, trailing-whitespace
//! preservation, a case-insensitive filesystem collision, diacritic
//! folding, a rename swap, and resuming after an interrupted run.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn refold() -> Command {
    Command::new(env!("CARGO_BIN_EXE_refold"))
}

fn write_mapping(dir: &Path, pairs: &[(&str, &str)]) -> std::path::PathBuf {
    let mut map = serde_json::Map::new();
    for (k, v) in pairs {
        map.insert(k.to_string(), serde_json::Value::String(v.to_string()));
    }
    let doc = serde_json::json!({ "REPLACEMENT_MAPPING": map });
    let path = dir.join("mapping.json");
    fs::write(&path, serde_json::to_vec_pretty(&doc).unwrap()).unwrap();
    path
}

#[test]
fn simple_content_edit_force_mode_rewrites_matched_text() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("greeting.txt");
    fs::write(&file, "hello alpha, goodbye alpha\n").unwrap();
    let mapping = write_mapping(dir.path(), &[("alpha", "omega")]);

    refold()
        .arg("run")
        .arg("--root").arg(dir.path())
        .arg("--mapping").arg(&mapping)
        .arg("--mode").arg("force")
        .assert()
        .success();

    let content = fs::read_to_string(&file).unwrap();
    assert_eq!(content, "hello omega, goodbye omega\n");
}

#[test]
fn dry_run_reports_but_never_writes() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("a.txt");
    fs::write(&file, "foo bar\n").unwrap();
    let mapping = write_mapping(dir.path(), &[("foo", "baz")]);

    refold()
        .arg("run")
        .arg("--root").arg(dir.path())
        .arg("--mapping").arg(&mapping)
        .arg("--mode").arg("dry-run")
        .assert()
        .success()
        .stdout(predicate::str::contains("DRY RUN"));

    assert_eq!(fs::read_to_string(&file).unwrap(), "foo bar\n");
}

#[test]
fn trailing_whitespace_and_line_endings_outside_the_match_survive() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("b.txt");
    fs::write(&file, "keep foo   \r\nuntouched line\r\n").unwrap();
    let mapping = write_mapping(dir.path(), &[("foo", "qux")]);

    refold()
        .arg("run")
        .arg("--root").arg(dir.path())
        .arg("--mapping").arg(&mapping)
        .arg("--mode").arg("force")
        .assert()
        .success();

    let bytes = fs::read(&file).unwrap();
    assert_eq!(bytes, b"keep qux   \r\nuntouched line\r\n".to_vec());
}

#[test]
fn diacritic_variants_of_a_rule_key_are_matched() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("c.txt");
    // "cafe\u{0301}" is NFD "café" (combining acute accent on the e).
    fs::write(&file, "the caf\u{0301} closes early\n").unwrap();
    let mapping = write_mapping(dir.path(), &[("cafe", "bistro")]);

    refold()
        .arg("run")
        .arg("--root").arg(dir.path())
        .arg("--mapping").arg(&mapping)
        .arg("--mode").arg("force")
        .assert()
        .success();

    let content = fs::read_to_string(&file).unwrap();
    assert!(content.contains("bistro"));
}

#[test]
fn case_insensitive_filesystem_collision_is_logged_and_skipped() {
    let dir = tempdir().unwrap();
    // Two distinct files on this (case-sensitive) filesystem that both
    // rename to the same basename once their rule applies.
    fs::write(dir.path().join("Readme.md"), "one\n").unwrap();
    fs::write(dir.path().join("readme.md"), "two\n").unwrap();
    let mapping = write_mapping(dir.path(), &[("Readme", "README"), ("readme", "README")]);

    refold()
        .arg("run")
        .arg("--root").arg(dir.path())
        .arg("--mapping").arg(&mapping)
        .arg("--mode").arg("force")
        .assert()
        .success()
        .stdout(predicate::str::contains("collision"));

    assert!(dir.path().join("collisions.log").exists());
    // One of the two sources won the rename; the other was left in place.
    let readme_exists = dir.path().join("README.md").exists();
    assert!(readme_exists);
    let survivors = [
        dir.path().join("Readme.md").exists(),
        dir.path().join("readme.md").exists(),
    ];
    assert_eq!(survivors.iter().filter(|&&x| x).count(), 1);
}

#[test]
fn a_cyclic_rule_pair_is_rejected_at_load_rather_than_risk_data_loss() {
    // {"north":"south","south":"north"} lets one rule's replacement
    // reintroduce another rule's find key; the Replacement Map rejects
    // this set outright (see DESIGN.md's note on this exact tension). The
    // Planner's independent temp-name staging for a true rename cycle is
    // covered directly in planner.rs's unit tests.
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("north.txt"), "n\n").unwrap();
    fs::write(dir.path().join("south.txt"), "s\n").unwrap();
    let mapping = write_mapping(dir.path(), &[("north", "south"), ("south", "north")]);

    refold()
        .arg("run")
        .arg("--root").arg(dir.path())
        .arg("--mapping").arg(&mapping)
        .arg("--mode").arg("force")
        .assert()
        .failure();

    assert_eq!(fs::read_to_string(dir.path().join("north.txt")).unwrap(), "n\n");
    assert_eq!(fs::read_to_string(dir.path().join("south.txt")).unwrap(), "s\n");
}

#[test]
fn resume_picks_up_a_journal_left_by_a_prior_run_without_rescanning() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("d.txt");
    fs::write(&file, "foo one\nfoo two\n").unwrap();
    let mapping = write_mapping(dir.path(), &[("foo", "bar")]);

    refold()
        .arg("run")
        .arg("--root").arg(dir.path())
        .arg("--mapping").arg(&mapping)
        .arg("--mode").arg("dry-run")
        .assert()
        .success();

    assert!(dir.path().join("planned_transactions.json").exists());
    assert_eq!(fs::read_to_string(&file).unwrap(), "foo one\nfoo two\n");

    refold()
        .arg("run")
        .arg("--root").arg(dir.path())
        .arg("--mapping").arg(&mapping)
        .arg("--mode").arg("resume")
        .assert()
        .success();

    assert_eq!(fs::read_to_string(&file).unwrap(), "bar one\nbar two\n");
}

#[test]
fn a_second_resume_after_completion_is_a_no_op() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("e.txt");
    fs::write(&file, "foo\n").unwrap();
    let mapping = write_mapping(dir.path(), &[("foo", "bar")]);

    refold()
        .arg("run")
        .arg("--root").arg(dir.path())
        .arg("--mapping").arg(&mapping)
        .arg("--mode").arg("force")
        .assert()
        .success();
    assert_eq!(fs::read_to_string(&file).unwrap(), "bar\n");

    refold()
        .arg("run")
        .arg("--root").arg(dir.path())
        .arg("--mapping").arg(&mapping)
        .arg("--mode").arg("resume")
        .assert()
        .success();
    assert_eq!(fs::read_to_string(&file).unwrap(), "bar\n");
}

#[test]
fn schema_subcommand_prints_valid_json() {
    let output = refold().arg("schema").output().unwrap();
    assert!(output.status.success());
    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(parsed.get("title").is_some() || parsed.get("$schema").is_some());
}

#[test]
fn nonexistent_scan_root_is_a_setup_error() {
    let dir = tempdir().unwrap();
    let mapping = write_mapping(dir.path(), &[("foo", "bar")]);

    refold()
        .arg("run")
        .arg("--root").arg("/does/not/exist/at/all")
        .arg("--mapping").arg(&mapping)
        .arg("--mode").arg("dry-run")
        .assert()
        .failure()
        .code(2);
}

#[test]
fn verbose_and_quiet_together_is_rejected() {
    let dir = tempdir().unwrap();
    let mapping = write_mapping(dir.path(), &[("foo", "bar")]);

    refold()
        .arg("run")
        .arg("--root").arg(dir.path())
        .arg("--mapping").arg(&mapping)
        .arg("--verbose")
        .arg("--quiet")
        .assert()
        .failure();
}
