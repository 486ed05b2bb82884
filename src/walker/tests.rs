use super::*;

use std::fs;

fn touch(path: &Path) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, "content").unwrap();
}

#[test]
fn finds_code_files_and_skips_others() {
    let dir = tempfile::tempdir().unwrap();
    touch(&dir.path().join("src/main.rs"));
    touch(&dir.path().join("src/util.py"));
    touch(&dir.path().join("README.md"));
    touch(&dir.path().join("data.bin"));

    let files = walk_source_files(dir.path(), &[], 1000).unwrap();
    let names: Vec<String> = files
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();

    assert_eq!(files.len(), 2);
    assert!(names.contains(&"main.rs".to_string()));
    assert!(names.contains(&"util.py".to_string()));
}

#[test]
fn default_excluded_dirs_are_pruned() {
    let dir = tempfile::tempdir().unwrap();
    touch(&dir.path().join("app.js"));
    touch(&dir.path().join("node_modules/lib/index.js"));
    touch(&dir.path().join("target/debug/build.rs"));
    touch(&dir.path().join("__pycache__/mod.py"));

    let files = walk_source_files(dir.path(), &[], 1000).unwrap();
    assert_eq!(files.len(), 1);
    assert!(files[0].ends_with("app.js"));
}

#[test]
fn hidden_dirs_are_pruned_except_the_data_dir() {
    let dir = tempfile::tempdir().unwrap();
    touch(&dir.path().join(".hidden/secret.py"));
    touch(&dir.path().join(".terminal_helper/hook.py"));
    touch(&dir.path().join("visible.py"));

    let files = walk_source_files(dir.path(), &[], 1000).unwrap();
    let names: Vec<String> = files
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();

    assert!(names.contains(&"visible.py".to_string()));
    assert!(names.contains(&"hook.py".to_string()));
    assert!(!names.contains(&"secret.py".to_string()));
}

#[test]
fn caller_excludes_are_unioned_with_defaults() {
    let dir = tempfile::tempdir().unwrap();
    touch(&dir.path().join("keep/a.rs"));
    touch(&dir.path().join("generated/b.rs"));

    let files = walk_source_files(dir.path(), &["generated".to_string()], 1000).unwrap();
    assert_eq!(files.len(), 1);
    assert!(files[0].ends_with("a.rs"));
}

#[test]
fn max_files_caps_the_walk() {
    let dir = tempfile::tempdir().unwrap();
    for i in 0..10 {
        touch(&dir.path().join(format!("f{i}.rs")));
    }

    let files = walk_source_files(dir.path(), &[], 3).unwrap();
    assert_eq!(files.len(), 3);
}

#[test]
fn walk_order_is_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    touch(&dir.path().join("b/two.rs"));
    touch(&dir.path().join("a/one.rs"));
    touch(&dir.path().join("zero.rs"));

    let first = walk_source_files(dir.path(), &[], 1000).unwrap();
    let second = walk_source_files(dir.path(), &[], 1000).unwrap();
    assert_eq!(first, second);

    let names: Vec<String> = first
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["one.rs", "two.rs", "zero.rs"]);
}

#[test]
fn missing_root_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("does-not-exist");
    assert!(walk_source_files(&missing, &[], 1000).is_err());
}

#[cfg(unix)]
#[test]
fn symlink_escaping_root_is_skipped() {
    let outside = tempfile::tempdir().unwrap();
    touch(&outside.path().join("escape.rs"));

    let dir = tempfile::tempdir().unwrap();
    touch(&dir.path().join("inside.rs"));
    std::os::unix::fs::symlink(outside.path().join("escape.rs"), dir.path().join("link.rs"))
        .unwrap();

    let files = walk_source_files(dir.path(), &[], 1000).unwrap();
    assert_eq!(files.len(), 1);
    assert!(files[0].ends_with("inside.rs"));
}

#[cfg(unix)]
#[test]
fn symlink_inside_root_is_kept() {
    let dir = tempfile::tempdir().unwrap();
    touch(&dir.path().join("real.rs"));
    std::os::unix::fs::symlink(dir.path().join("real.rs"), dir.path().join("alias.rs")).unwrap();

    let files = walk_source_files(dir.path(), &[], 1000).unwrap();
    assert_eq!(files.len(), 2);
}
