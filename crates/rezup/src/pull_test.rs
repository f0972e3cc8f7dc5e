// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

use std::path::Path;

use rstest::rstest;

use super::*;
use crate::fixtures::{fixture_recipe, roots, TestRoots};
use crate::{Container, Manifest, USING_REMOTE_ENV_VAR};

fn create_at(container: &Container, dirname: &str, description: &str) -> Revision {
    let manifest = Manifest::from_toml(&fixture_recipe(description), Path::new("test.toml")).unwrap();
    let options = CreateOptions {
        dirname: Some(dirname.to_string()),
        pulled_from: None,
    };
    Revision::create(container, &manifest, options).unwrap()
}

#[rstest]
fn test_pull_keeps_published_snapshot(roots: TestRoots) {
    roots.write_recipe("foo", &fixture_recipe("apple"));
    let remote = Container::new("foo", &roots.context).unwrap();
    assert!(remote.is_remote());
    remote.new_revision().unwrap();

    let local = Container::local("foo", &roots.context).unwrap();
    assert_eq!(local.iter_revision(true, true).count(), 0);

    // the recipe changes after publication
    roots.write_recipe("foo", &fixture_recipe("orange"));

    let latest = remote.get_latest_revision(true).unwrap();
    let pulled = latest.pull(true, false).unwrap().unwrap();

    let revisions: Vec<Revision> = local.iter_revision(true, true).collect();
    assert_eq!(revisions.len(), 1);
    assert_eq!(revisions[0].dirname(), latest.dirname());
    assert_eq!(
        revisions[0].manifest().unwrap().description.as_deref(),
        Some("apple")
    );
    assert!(!pulled.container().is_remote());
    assert_eq!(
        pulled.metadata().unwrap().pulled_from.as_deref(),
        Some(latest.path())
    );
}

#[rstest]
fn test_pull_twice_installs_once(roots: TestRoots) {
    let remote = Container::new("foo", &roots.context).unwrap();
    let revision = create_at(&remote, "10.000000", "apple");

    let first = revision.pull(true, false).unwrap().unwrap();
    let second = revision.pull(true, false).unwrap().unwrap();

    assert_eq!(first.path(), second.path());
    assert_eq!(roots.installer.calls().len(), 1);
    let local = Container::local("foo", &roots.context).unwrap();
    assert_eq!(local.iter_revision(true, true).count(), 1);
}

#[rstest]
fn test_failed_pull_can_be_retried(roots: TestRoots) {
    let remote = Container::new("foo", &roots.context).unwrap();
    let revision = create_at(&remote, "10.000000", "apple");

    roots.installer.set_fail(true);
    assert!(matches!(
        revision.pull(true, false),
        Err(Error::InstallFailed { .. })
    ));
    let local = Container::local("foo", &roots.context).unwrap();
    assert!(local.get_latest_revision(true).is_none());

    roots.installer.set_fail(false);
    let pulled = revision.require_local(true).unwrap();
    assert!(pulled.is_ready());
    assert_eq!(pulled.dirname(), "10.000000");
    assert_eq!(roots.installer.calls().len(), 2);
    assert_eq!(local.iter_revision(true, true).count(), 1);
}

#[rstest]
fn test_pull_without_check_out(roots: TestRoots) {
    let remote = Container::new("foo", &roots.context).unwrap();
    let revision = create_at(&remote, "10.000000", "apple");

    assert!(revision.pull(false, false).unwrap().is_none());
    assert!(roots.installer.calls().is_empty());

    revision.pull(true, false).unwrap();
    let found = revision.pull(false, false).unwrap().unwrap();
    assert_eq!(found.dirname(), "10.000000");
}

#[rstest]
fn test_pull_with_fallback_finds_older_local(roots: TestRoots) {
    let local = Container::local("foo", &roots.context).unwrap();
    create_at(&local, "10.000000", "old");
    let remote = Container::new("foo", &roots.context).unwrap();
    let revision = create_at(&remote, "20.000000", "new");

    assert!(revision.pull(false, false).unwrap().is_none());
    let closest = revision.pull(false, true).unwrap().unwrap();
    assert_eq!(closest.dirname(), "10.000000");
}

#[rstest]
fn test_pull_local_revision_is_identity(roots: TestRoots) {
    let local = Container::local("foo", &roots.context).unwrap();
    let revision = create_at(&local, "10.000000", "a");

    let pulled = revision.pull(true, false).unwrap().unwrap();
    assert_eq!(pulled.path(), revision.path());
    assert_eq!(roots.installer.calls().len(), 1);
}

#[rstest]
fn test_require_local_without_pull(roots: TestRoots) {
    let remote = Container::new("foo", &roots.context).unwrap();
    let revision = create_at(&remote, "10.000000", "a");

    let err = revision.require_local(false).unwrap_err();
    assert!(matches!(
        err,
        Error::NoLocalRevision { ref container, ref timestamp }
            if container == "foo" && timestamp == "10.000000"
    ));

    let local = revision.require_local(true).unwrap();
    assert!(!local.container().is_remote());
    assert!(local.is_ready());
    assert!(local.is_pulled());
    assert_eq!(local.recipe_env().unwrap()[USING_REMOTE_ENV_VAR], "1");
    assert!(local.prompt().starts_with("(foo) - remote - "));

    // once materialized, no pull is needed
    let again = revision.require_local(false).unwrap();
    assert_eq!(again.path(), local.path());
}

#[rstest]
fn test_require_local_rejects_unready(roots: TestRoots) {
    let remote = Container::new("foo", &roots.context).unwrap();
    let revision = create_at(&remote, "10.000000", "a");
    std::fs::remove_file(revision.manifest_path()).unwrap();

    assert!(matches!(
        revision.require_local(true),
        Err(Error::RevisionNotReady(_))
    ));
    assert!(roots.installer.calls().is_empty());
}
