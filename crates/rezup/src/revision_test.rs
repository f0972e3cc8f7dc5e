// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;
use std::path::Path;

use rstest::rstest;

use super::*;
use crate::fixtures::{fixture_recipe, local_only, roots, TestRoots};

fn manifest_from(text: &str) -> Manifest {
    Manifest::from_toml(text, Path::new("test.toml")).unwrap()
}

fn create_at(container: &Container, dirname: &str, text: &str) -> Revision {
    let options = CreateOptions {
        dirname: Some(dirname.to_string()),
        pulled_from: None,
    };
    Revision::create(container, &manifest_from(text), options).unwrap()
}

#[rstest]
#[case("1700000000.123456", Some(1700000000.123456))]
#[case("12", Some(12.0))]
#[case("abc", None)]
#[case("inf", None)]
#[case("NaN", None)]
fn test_parse_dirname(#[case] dirname: &str, #[case] expected: Option<f64>) {
    assert_eq!(parse_dirname(dirname), expected);
}

#[rstest]
fn test_format_dirname_keeps_microseconds() {
    assert_eq!(format_dirname(1_700_000_000_000_042), "1700000000.000042");
    assert_eq!(format_dirname(5_000_000), "5.000000");
}

#[rstest]
fn test_validate_requires_name_and_metadata(local_only: TestRoots) {
    let container = Container::new("foo", &local_only.context).unwrap();
    let revisions = container.revisions_path();
    std::fs::create_dir_all(revisions.join("notatime")).unwrap();
    std::fs::write(revisions.join("notatime").join(METADATA_FILENAME), "{}").unwrap();
    std::fs::create_dir_all(revisions.join("10.000000")).unwrap();

    assert!(!Revision::new(container.clone(), "notatime").validate());

    let unfinished = Revision::new(container.clone(), "10.000000");
    assert!(!unfinished.is_valid());

    // validity is cached on the instance
    std::fs::write(revisions.join("10.000000").join(METADATA_FILENAME), "{}").unwrap();
    assert!(!unfinished.is_valid());
    assert!(Revision::new(container, "10.000000").is_valid());
}

#[rstest]
fn test_create_then_read_back(local_only: TestRoots) {
    let container = Container::new("foo", &local_only.context).unwrap();
    let revision = create_at(&container, "10.000000", &fixture_recipe("apple"));

    let read = Revision::new(container, "10.000000");
    assert!(read.is_valid());
    assert!(read.is_ready());
    assert_eq!(read.manifest().unwrap().description.as_deref(), Some("apple"));

    let metadata = read.metadata().unwrap();
    assert!(metadata.revision_path.is_absolute());
    assert!(metadata.revision_path.ends_with(Path::new("revisions").join("10.000000")));
    assert!(metadata.pulled_from.is_none());
    assert!(!read.is_pulled());
    assert_eq!(revision.datetime().unwrap().timestamp(), 10);
}

#[rstest]
fn test_create_refuses_published_dirname(local_only: TestRoots) {
    let container = Container::new("foo", &local_only.context).unwrap();
    let published = create_at(&container, "10.000000", &fixture_recipe("a"));

    let options = CreateOptions {
        dirname: Some("10.000000".to_string()),
        pulled_from: None,
    };
    let err = Revision::create(&container, &manifest_from(&fixture_recipe("b")), options)
        .unwrap_err();
    assert!(matches!(err, Error::RevisionPublished(_)));
    assert_eq!(
        published.manifest().unwrap().description.as_deref(),
        Some("a")
    );
}

#[rstest]
fn test_create_rebuilds_unfinished_dirname(local_only: TestRoots) {
    let container = Container::new("foo", &local_only.context).unwrap();
    let leftover = container.revisions_path().join("10.000000");
    std::fs::create_dir_all(leftover.join("venv").join("half")).unwrap();

    let revision = create_at(&container, "10.000000", &fixture_recipe("b"));
    assert!(revision.is_ready());
    assert!(!leftover.join("venv").join("half").exists());
    assert_eq!(local_only.installer.calls().len(), 1);
}

#[rstest]
fn test_create_rejects_invalid_manifest(local_only: TestRoots) {
    let container = Container::new("foo", &local_only.context).unwrap();
    let text = "[rez]\nname = \"rez\"\nurl = \"\"\n";
    let err = Revision::create(&container, &manifest_from(text), CreateOptions::default())
        .unwrap_err();
    assert!(matches!(err, Error::ValidationFailed(_)));
    assert!(container.is_empty());
}

#[rstest]
fn test_manifest_of_unready_revision(local_only: TestRoots) {
    let container = Container::new("foo", &local_only.context).unwrap();
    let revision = create_at(&container, "10.000000", &fixture_recipe("a"));
    std::fs::remove_file(revision.manifest_path()).unwrap();

    assert!(matches!(revision.manifest(), Err(Error::RevisionNotReady(_))));
}

#[rstest]
fn test_recipe_env_inline_block(local_only: TestRoots) {
    let text = format!("{}\n[env]\nbar = \"bee\"\n", fixture_recipe("env"));
    let container = Container::new("foo", &local_only.context).unwrap();
    let revision = create_at(&container, "10.000000", &text);

    let env = revision.recipe_env().unwrap();
    assert_eq!(env.get("bar").map(String::as_str), Some("bee"));
    assert_eq!(env.get(CONTAINER_ENV_VAR).map(String::as_str), Some("foo"));
    assert_eq!(env.get(USING_REMOTE_ENV_VAR).map(String::as_str), Some(""));
}

#[rstest]
fn test_recipe_env_layers_dotenv_then_inline_then_reserved(local_only: TestRoots) {
    let recipes = local_only.recipe_dir().to_path_buf();
    std::fs::create_dir_all(&recipes).unwrap();
    std::fs::write(recipes.join("common.env"), "A=from-dotenv\nB=from-dotenv\n").unwrap();

    let text = format!(
        "dotenv = [\"common.env\", \"missing.env\"]\n{}\n[env]\nB = \"inline\"\nREZUP_CONTAINER = \"spoofed\"\n",
        fixture_recipe("env")
    );
    let container = Container::new("foo", &local_only.context).unwrap();
    let revision = create_at(&container, "10.000000", &text);

    let env = revision.recipe_env().unwrap();
    assert_eq!(env["A"], "from-dotenv");
    assert_eq!(env["B"], "inline");
    assert_eq!(env[CONTAINER_ENV_VAR], "foo");
}

#[rstest]
fn test_remote_revision_reports_remote(roots: TestRoots) {
    let container = Container::new("foo", &roots.context).unwrap();
    let revision = create_at(&container, "10.000000", &fixture_recipe("remote"));

    let env = revision.recipe_env().unwrap();
    assert_eq!(env[USING_REMOTE_ENV_VAR], "1");
    assert!(revision.prompt().starts_with("(foo) - remote - "));
}

#[rstest]
fn test_prompt_for_local_revision(local_only: TestRoots) {
    let container = Container::new("foo", &local_only.context).unwrap();
    let revision = create_at(&container, "1700000000.000000", &fixture_recipe("a"));

    let prompt = revision.prompt();
    assert!(prompt.starts_with("(foo) - local - "));
    assert!(prompt.ends_with(' '));
    assert!(!prompt.contains('\n'));
    // mm/dd/yyyy hh:mm:ss
    let date = prompt.trim_start_matches("(foo) - local - ").trim_end();
    assert_eq!(date.len(), 19);
}

#[rstest]
fn test_production_bin_dirs_hide_sub_environments(local_only: TestRoots) {
    let text = format!(
        "{}\n[[extension]]\nname = \"iso\"\nurl = \"iso\"\nisolation = true\n\n[[extension]]\nname = \"plain\"\nurl = \"plain\"\n",
        fixture_recipe("ext")
    );
    let container = Container::new("foo", &local_only.context).unwrap();
    let revision = create_at(&container, "10.000000", &text);

    let dirs = revision.production_bin_dirs();
    assert_eq!(dirs, vec![revision.path().join("bin")]);
    assert!(dirs[0].join("rez").is_file());

    let venvs = revision.path().join("venv");
    let env = revision.compose_env(BTreeMap::new()).unwrap();
    for entry in std::env::split_paths(&env["PATH"]) {
        assert!(!entry.starts_with(&venvs), "{} is on PATH", entry.display());
    }
}

#[rstest]
fn test_compose_env_prepends_path(local_only: TestRoots) {
    let container = Container::new("foo", &local_only.context).unwrap();
    let revision = create_at(&container, "10.000000", &fixture_recipe("a"));

    let existing = if cfg!(windows) { r"C:\bin" } else { "/usr/bin" };
    let mut caller = BTreeMap::new();
    caller.insert("PATH".to_string(), existing.to_string());
    caller.insert("HOME_LIKE".to_string(), "kept".to_string());

    let env = revision.compose_env(caller).unwrap();
    let paths: Vec<_> = std::env::split_paths(&env["PATH"]).collect();
    assert_eq!(paths.len(), 2);
    assert_eq!(paths[0], revision.production_bin_dirs()[0]);
    assert_eq!(paths[1], Path::new(existing));
    assert_eq!(env["HOME_LIKE"], "kept");
    assert_eq!(env[CONTAINER_ENV_VAR], "foo");
}

#[rstest]
fn test_iter_backward_and_forward(local_only: TestRoots) {
    let container = Container::new("foo", &local_only.context).unwrap();
    for dirname in ["10.000000", "20.000000", "30.000000"] {
        create_at(&container, dirname, &fixture_recipe("a"));
    }
    let middle = Revision::new(container, "20.000000");

    let backward: Vec<_> = middle.iter_backward().map(|r| r.dirname().to_string()).collect();
    assert_eq!(backward, vec!["10.000000"]);
    let forward: Vec<_> = middle.iter_forward().map(|r| r.dirname().to_string()).collect();
    assert_eq!(forward, vec!["30.000000"]);
}

#[rstest]
fn test_purge_revision(local_only: TestRoots) {
    let container = Container::new("foo", &local_only.context).unwrap();
    let revision = create_at(&container, "10.000000", &fixture_recipe("a"));

    revision.purge().unwrap();
    assert!(!revision.path().exists());
    assert!(container.is_empty());
}

#[rstest]
fn test_use_rejects_invalid_and_unready(local_only: TestRoots) {
    let container = Container::new("foo", &local_only.context).unwrap();
    let target = LaunchTarget::Command("exit 0".to_string());

    let missing = Revision::new(container.clone(), "99.000000");
    let err = missing.use_revision(&target, &UseOptions::default()).unwrap_err();
    assert!(matches!(err, Error::InvalidRevision(_)));

    let revision = create_at(&container, "10.000000", &fixture_recipe("a"));
    std::fs::remove_file(revision.manifest_path()).unwrap();
    let err = revision.use_revision(&target, &UseOptions::default()).unwrap_err();
    assert!(matches!(err, Error::RevisionNotReady(_)));
}

#[cfg(unix)]
#[rstest]
fn test_use_runs_command_in_revision_env() {
    let tmp = tempfile::TempDir::new().unwrap();
    let installer = std::sync::Arc::new(crate::fixtures::RecordingInstaller::default());
    let settings = crate::Settings {
        local_root: Some(tmp.path().join("local")),
        remote_root: None,
        recipe_dir: Some(tmp.path().join("recipes")),
        default_shell: Some("sh".to_string()),
    };
    let context = crate::Context::with_installer(settings, installer).unwrap();
    let container = Container::new("foo", &context).unwrap();
    let text = format!("{}\n[env]\nbar = \"bee\"\n", fixture_recipe("a"));
    let revision = create_at(&container, "10.000000", &text);

    let target = LaunchTarget::Command(
        "test \"$bar\" = bee && test \"$REZUP_CONTAINER\" = foo && exit 5".to_string(),
    );
    let code = revision.use_revision(&target, &UseOptions::default()).unwrap();
    assert_eq!(code, 5);
}
