// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

use std::path::Path;

use rstest::rstest;

use super::*;

#[rstest]
fn test_parse_dotenv_lines() {
    let vars = parse(
        r#"
# comment
FOO=bar
export SPAM = "eggs and ham"
QUOTED='single'
TRAILING=value # note
NOEQUALS
=nokey
EMPTY=
"#,
    );

    assert_eq!(vars["FOO"], "bar");
    assert_eq!(vars["SPAM"], "eggs and ham");
    assert_eq!(vars["QUOTED"], "single");
    assert_eq!(vars["TRAILING"], "value");
    assert_eq!(vars["EMPTY"], "");
    assert!(!vars.contains_key("NOEQUALS"));
    assert_eq!(vars.len(), 5);
}

#[rstest]
fn test_resolve_relative_and_absolute() {
    let base = Path::new("/base");
    assert_eq!(resolve_path("common.env", base), Path::new("/base/common.env"));
    if cfg!(unix) {
        assert_eq!(resolve_path("/etc/x.env", base), Path::new("/etc/x.env"));
    }
}

#[rstest]
fn test_load_missing_file_fails() {
    let tmp = tempfile::TempDir::new().unwrap();
    let err = load(&tmp.path().join("missing.env")).unwrap_err();
    assert!(matches!(err, crate::Error::ReadFailed { .. }));
}
