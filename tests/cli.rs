//! CLI surface tests

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;

const CONFIG: &str = r#"
[project]
name = "fixture"

[[chunks]]
name = "common/shared"
test = "^src/shared/"
min_entries = 2
priority = 8
kind = "shared"

[[chunks]]
name = "index/vendor"
test = "(^|/)node_modules/"
groups = ["index"]
priority = 10
kind = "vendor"
"#;

fn scaffold(root: &Path) {
    fs::write(root.join("pagepack.toml"), CONFIG).unwrap();

    for page in ["home", "admin"] {
        let dir = root.join(format!("src/modules/index/pages/{}", page));
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join(format!("{}.js", page)),
            "import util from '@/shared/util';\nconsole.log(util);\n",
        )
        .unwrap();
        fs::write(
            dir.join(format!("{}.html", page)),
            "<html><head></head><body></body></html>",
        )
        .unwrap();
    }

    let shared = root.join("src/shared");
    fs::create_dir_all(&shared).unwrap();
    fs::write(shared.join("util.js"), "export default 1;\n").unwrap();
}

#[test]
fn test_build_succeeds_with_zero_exit() {
    let tmp = tempfile::tempdir().unwrap();
    scaffold(tmp.path());

    Command::cargo_bin("pagepack")
        .unwrap()
        .current_dir(tmp.path())
        .arg("build")
        .assert()
        .success()
        .stderr(predicate::str::contains("Built 2 page(s)"));

    assert!(tmp.path().join("dist/index/home.html").is_file());
    assert!(tmp.path().join("dist/manifest.json").is_file());
}

#[test]
fn test_missing_template_yields_nonzero_exit() {
    let tmp = tempfile::tempdir().unwrap();
    scaffold(tmp.path());
    fs::remove_file(tmp.path().join("src/modules/index/pages/admin/admin.html")).unwrap();

    Command::cargo_bin("pagepack")
        .unwrap()
        .current_dir(tmp.path())
        .arg("build")
        .assert()
        .failure()
        .stderr(predicate::str::contains("index/admin"));

    // Siblings still built
    assert!(tmp.path().join("dist/index/home.html").is_file());
}

#[test]
fn test_unresolved_import_yields_nonzero_exit() {
    let tmp = tempfile::tempdir().unwrap();
    scaffold(tmp.path());
    fs::write(
        tmp.path().join("src/shared/util.js"),
        "import gone from './gone';\n",
    )
    .unwrap();

    Command::cargo_bin("pagepack")
        .unwrap()
        .current_dir(tmp.path())
        .arg("build")
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot resolve import"));
}

#[test]
fn test_analyze_flag_writes_report() {
    let tmp = tempfile::tempdir().unwrap();
    scaffold(tmp.path());

    Command::cargo_bin("pagepack")
        .unwrap()
        .current_dir(tmp.path())
        .args(["build", "--analyze"])
        .assert()
        .success();

    assert!(tmp.path().join("dist/report.json").is_file());
}
