//! End-to-end scenarios: predicate compilation driving real walks over
//! temporary directory trees, including archive containers.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use arcfind::{compile, EntryKind, MatchRecord, Row, Value, WalkPolicy, Walker};
use tempfile::tempdir;

fn write_bytes(dir: &Path, name: &str, len: usize) -> PathBuf {
    let path = dir.join(name);
    let mut file = File::create(&path).unwrap();
    file.write_all(&vec![b'x'; len]).unwrap();
    path
}

fn make_zip(path: &Path, entries: &[(&str, usize)]) {
    let file = File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default();
    for (name, len) in entries {
        zip.start_file(*name, options).unwrap();
        zip.write_all(&vec![b'z'; *len]).unwrap();
    }
    zip.finish().unwrap();
}

fn make_tar_gz(path: &Path, entries: &[(&str, usize)]) {
    let file = File::create(path).unwrap();
    let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (name, len) in entries {
        let data = vec![b't'; *len];
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_mtime(1_700_000_000);
        header.set_cksum();
        builder.append_data(&mut header, *name, data.as_slice()).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap();
}

fn run_with(root: &Path, query: &str, policy: WalkPolicy) -> Vec<MatchRecord> {
    let filter = compile(query).unwrap();
    Walker::new([root], filter, policy)
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
}

fn run(root: &Path, query: &str) -> Vec<MatchRecord> {
    run_with(root, query, WalkPolicy::default())
}

fn names(records: &[MatchRecord]) -> Vec<&str> {
    records.iter().map(|r| r.name.as_str()).collect()
}

fn sink_policy(seen: &Arc<Mutex<Vec<String>>>) -> WalkPolicy {
    let seen = seen.clone();
    WalkPolicy {
        error_sink: Some(Box::new(move |msg| {
            seen.lock().unwrap().push(msg.to_string())
        })),
        ..WalkPolicy::default()
    }
}

#[test]
fn size_filter_selects_large_files() {
    let dir = tempdir().unwrap();
    write_bytes(dir.path(), "a.txt", 10);
    write_bytes(dir.path(), "b.log", 2000);

    let found = run(dir.path(), "size > 1K");
    assert_eq!(names(&found), ["b.log"]);
    assert_eq!(found[0].size, 2000);
}

#[test]
fn zip_members_are_candidates() {
    let dir = tempdir().unwrap();
    let zip_path = dir.path().join("p.zip");
    make_zip(&zip_path, &[("r.md", 5), ("s.md", 5000)]);

    let found = run(dir.path(), "ext = 'md' AND size > 1K");
    assert_eq!(found.len(), 1);
    let matched = &found[0];
    assert_eq!(matched.name, "s.md");
    assert_eq!(matched.path, format!("{}//s.md", zip_path.display()));
    assert_eq!(matched.container, zip_path.display().to_string());
    assert_eq!(matched.archive, "zip");
    assert_eq!(matched.entry_type, EntryKind::File);
}

#[test]
fn ilike_matches_case_insensitively() {
    let dir = tempdir().unwrap();
    write_bytes(dir.path(), "readme.txt", 1);
    write_bytes(dir.path(), "README.md", 1);
    write_bytes(dir.path(), "notes.txt", 1);

    let found = run(dir.path(), "name ILIKE 'README%'");
    assert_eq!(names(&found), ["README.md", "readme.txt"]);
}

#[test]
fn compound_extension_matching() {
    let dir = tempdir().unwrap();
    write_bytes(dir.path(), "data.tar.gz", 10);
    write_bytes(dir.path(), "data.tar", 10);
    write_bytes(dir.path(), "data.gz", 10);

    let policy = WalkPolicy {
        no_archive: true,
        ..WalkPolicy::default()
    };
    let found = run_with(dir.path(), "ext2 = 'tar.gz'", policy);
    assert_eq!(names(&found), ["data.tar.gz"]);

    let found = run_with(
        dir.path(),
        "ext = 'gz'",
        WalkPolicy {
            no_archive: true,
            ..WalkPolicy::default()
        },
    );
    assert_eq!(names(&found), ["data.gz", "data.tar.gz"]);
}

#[test]
fn today_matches_fresh_files_only() {
    let dir = tempdir().unwrap();
    write_bytes(dir.path(), "fresh.txt", 1);
    let old = write_bytes(dir.path(), "old.txt", 1);

    let three_days_ago = std::time::SystemTime::now() - std::time::Duration::from_secs(3 * 86_400);
    filetime::set_file_mtime(&old, filetime::FileTime::from_system_time(three_days_ago)).unwrap();

    let found = run(dir.path(), "date = today");
    assert_eq!(names(&found), ["fresh.txt"]);

    let found = run(dir.path(), "date < today");
    assert_eq!(names(&found), ["old.txt"]);
}

#[test]
fn set_and_range_filters_compose() {
    let dir = tempdir().unwrap();
    write_bytes(dir.path(), "a.jpg", 500);
    write_bytes(dir.path(), "b.jpg", 2000);
    write_bytes(dir.path(), "c.png", 2000);
    write_bytes(dir.path(), "d.gif", 5000);

    let found = run(
        dir.path(),
        "ext IN ('jpg', 'png') AND NOT (size BETWEEN 0 AND 1K)",
    );
    assert_eq!(names(&found), ["b.jpg", "c.png"]);
}

#[test]
fn literal_equality_roundtrip() {
    struct OneVar(&'static str, Value);
    impl Row for OneVar {
        fn value(&self, name: &str) -> Option<Value> {
            (name == self.0).then(|| self.1.clone())
        }
    }

    for (rendered, value) in [
        ("42", Value::Int(42)),
        ("-7", Value::Int(-7)),
        ("3.5", Value::Float(3.5)),
        ("'abc'", Value::text("abc")),
        ("TRUE", Value::Bool(true)),
        ("FALSE", Value::Bool(false)),
    ] {
        let filter = compile(&format!("x = {rendered}")).unwrap();
        assert!(filter.matches(&OneVar("x", value)).unwrap(), "{rendered}");
    }
}

#[test]
fn match_all_and_match_none() {
    let dir = tempdir().unwrap();
    write_bytes(dir.path(), "a.txt", 1);
    fs::create_dir(dir.path().join("sub")).unwrap();
    write_bytes(&dir.path().join("sub"), "b.txt", 1);

    // `1` is the canonical match-all: every entry, directories included
    let all = run(dir.path(), "1");
    assert_eq!(names(&all), ["a.txt", "sub", "b.txt"]);

    assert!(run(dir.path(), "0").is_empty());
}

#[test]
fn de_morgan_equivalence_on_walks() {
    let dir = tempdir().unwrap();
    write_bytes(dir.path(), "small.txt", 10);
    write_bytes(dir.path(), "large.txt", 5000);
    write_bytes(dir.path(), "large.log", 5000);

    let left = run(dir.path(), "NOT (ext = 'txt' AND size > 1K)");
    let right = run(dir.path(), "NOT ext = 'txt' OR NOT size > 1K");
    assert_eq!(left, right);
}

#[test]
fn null_propagates_through_logic() {
    struct Empty;
    impl Row for Empty {
        fn value(&self, _name: &str) -> Option<Value> {
            None
        }
    }

    let or_true = compile("x = 1 OR TRUE").unwrap();
    assert!(or_true.matches(&Empty).unwrap());

    let and_true = compile("x = 1 AND TRUE").unwrap();
    assert!(!and_true.matches(&Empty).unwrap());
    // Null, not false: the evaluator reports it as neither
    assert_eq!(and_true.eval(&Empty).unwrap(), None);

    let is_null = compile("x IS NULL").unwrap();
    assert!(is_null.matches(&Empty).unwrap());
}

#[test]
fn size_suffixes_are_decimal() {
    assert_eq!(arcfind::parse_size("1K"), Some(1000));
    assert_eq!(arcfind::parse_size("1M"), Some(1_000_000));
    assert_eq!(arcfind::parse_size("1.5K"), Some(1500));
    assert_eq!(arcfind::format_size(1500), "1.5K");

    let dir = tempdir().unwrap();
    write_bytes(dir.path(), "exact.bin", 1000);
    let found = run(dir.path(), "size = 1K");
    assert_eq!(names(&found), ["exact.bin"]);
}

#[test]
fn like_wildcards() {
    let dir = tempdir().unwrap();
    for name in ["ab", "axb", "aXb", "axc", "ba"] {
        write_bytes(dir.path(), name, 1);
    }

    // `%` spans any run, case-insensitively for `name`
    let found = run(dir.path(), "name LIKE 'a%b'");
    assert_eq!(names(&found), ["aXb", "ab", "axb"]);

    // `_` is exactly one character
    let found = run(dir.path(), "name LIKE 'a_b'");
    assert_eq!(names(&found), ["aXb", "axb"]);
}

#[cfg(unix)]
#[test]
fn symlink_cycle_terminates() {
    let dir = tempdir().unwrap();
    let a = dir.path().join("a");
    fs::create_dir(&a).unwrap();
    write_bytes(&a, "f.txt", 1);
    std::os::unix::fs::symlink(&a, a.join("self")).unwrap();

    let policy = WalkPolicy {
        follow_symlinks: true,
        ..WalkPolicy::default()
    };
    let found = run_with(dir.path(), "1", policy);
    // the cycle is broken after one visit: f.txt appears exactly once
    let count = found.iter().filter(|r| r.name == "f.txt").count();
    assert_eq!(count, 1);
}

#[cfg(unix)]
#[test]
fn unfollowed_symlinks_are_link_rows() {
    let dir = tempdir().unwrap();
    let target = write_bytes(dir.path(), "target.txt", 1);
    std::os::unix::fs::symlink(&target, dir.path().join("alias")).unwrap();

    let found = run(dir.path(), "type = 'link'");
    assert_eq!(names(&found), ["alias"]);
}

#[test]
fn member_path_uses_configured_separator() {
    let dir = tempdir().unwrap();
    let zip_path = dir.path().join("y.zip");
    make_zip(&zip_path, &[("inner.txt", 4)]);

    let found = run(dir.path(), "archive = 'zip'");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].path, format!("{}//inner.txt", zip_path.display()));

    let policy = WalkPolicy {
        archive_separator: "::".to_string(),
        ..WalkPolicy::default()
    };
    let found = run_with(dir.path(), "archive = 'zip'", policy);
    assert_eq!(found[0].path, format!("{}::inner.txt", zip_path.display()));
}

#[test]
fn container_and_members_both_appear() {
    let dir = tempdir().unwrap();
    let zip_path = dir.path().join("bundle.zip");
    make_zip(&zip_path, &[("one.txt", 3), ("two.txt", 3)]);

    let found = run(dir.path(), "1");
    assert_eq!(names(&found), ["bundle.zip", "one.txt", "two.txt"]);
    assert_eq!(found[0].archive, "");
    assert_eq!(found[1].archive, "zip");
}

#[test]
fn tar_gz_members_are_candidates() {
    let dir = tempdir().unwrap();
    let tar_path = dir.path().join("backup.tar.gz");
    make_tar_gz(&tar_path, &[("logs/app.log", 2000), ("note.txt", 10)]);

    let found = run(dir.path(), "archive = 'tar' AND size > 1K");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].name, "app.log");
    assert_eq!(
        found[0].path,
        format!("{}//logs/app.log", tar_path.display())
    );
    assert_eq!(found[0].container, tar_path.display().to_string());
}

#[test]
fn identical_runs_yield_identical_sequences() {
    let dir = tempdir().unwrap();
    write_bytes(dir.path(), "a.txt", 100);
    fs::create_dir(dir.path().join("sub")).unwrap();
    write_bytes(&dir.path().join("sub"), "b.txt", 200);
    make_zip(&dir.path().join("c.zip"), &[("m.txt", 50)]);

    let policy = || WalkPolicy {
        now: chrono::Local::now(),
        ..WalkPolicy::default()
    };
    let first = run_with(dir.path(), "1", policy());
    let second = run_with(dir.path(), "1", policy());
    assert_eq!(first, second);
}

#[test]
fn no_archive_skips_members() {
    let dir = tempdir().unwrap();
    make_zip(&dir.path().join("p.zip"), &[("m.md", 5000)]);

    let policy = WalkPolicy {
        no_archive: true,
        ..WalkPolicy::default()
    };
    let found = run_with(dir.path(), "ext = 'md'", policy);
    assert!(found.is_empty());
}

#[test]
fn archives_only_lists_containers() {
    let dir = tempdir().unwrap();
    write_bytes(dir.path(), "plain.txt", 10);
    make_zip(&dir.path().join("p.zip"), &[("m.md", 5000)]);

    let policy = WalkPolicy {
        archives_only: true,
        ..WalkPolicy::default()
    };
    let found = run_with(dir.path(), "1", policy);
    assert_eq!(names(&found), ["p.zip"]);
}

#[test]
fn directory_rows_have_zero_size() {
    let dir = tempdir().unwrap();
    fs::create_dir(dir.path().join("sub")).unwrap();
    write_bytes(&dir.path().join("sub"), "f.txt", 10);

    let found = run(dir.path(), "type = 'dir'");
    assert_eq!(names(&found), ["sub"]);
    assert_eq!(found[0].size, 0);
    assert_eq!(found[0].entry_type, EntryKind::Dir);
}

#[test]
fn corrupt_archive_is_reported_not_fatal() {
    let dir = tempdir().unwrap();
    // a zip in name only
    write_bytes(dir.path(), "broken.zip", 64);
    write_bytes(dir.path(), "fine.txt", 2000);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let found = run_with(dir.path(), "size > 1K", sink_policy(&seen));
    assert_eq!(names(&found), ["fine.txt"]);
    let messages = seen.lock().unwrap();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("broken.zip"), "{}", messages[0]);
}

#[cfg(not(feature = "sevenz"))]
#[test]
fn missing_backend_warns_once_per_walk() {
    let dir = tempdir().unwrap();
    write_bytes(dir.path(), "one.7z", 10);
    write_bytes(dir.path(), "two.7z", 10);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let found = run_with(dir.path(), "1", sink_policy(&seen));
    // the containers themselves still match
    assert_eq!(names(&found), ["one.7z", "two.7z"]);

    let messages = seen.lock().unwrap();
    let backend_warnings: Vec<_> = messages.iter().filter(|m| m.contains("7z")).collect();
    assert_eq!(backend_warnings.len(), 1, "{messages:?}");
}

#[cfg(unix)]
#[test]
fn unreadable_directory_is_skipped_with_warning() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir().unwrap();
    let locked = dir.path().join("locked");
    fs::create_dir(&locked).unwrap();
    write_bytes(dir.path(), "open.txt", 10);
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
    if fs::read_dir(&locked).is_ok() {
        // running with privileges that ignore permission bits
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        return;
    }

    let seen = Arc::new(Mutex::new(Vec::new()));
    let found = run_with(dir.path(), "type = 'file'", sink_policy(&seen));
    assert_eq!(names(&found), ["open.txt"]);
    assert!(!seen.lock().unwrap().is_empty());

    fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
}

#[cfg(unix)]
#[test]
fn stop_on_error_terminates_the_stream() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir().unwrap();
    let locked = dir.path().join("locked");
    fs::create_dir(&locked).unwrap();
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
    if fs::read_dir(&locked).is_ok() {
        // running with privileges that ignore permission bits
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        return;
    }

    let policy = WalkPolicy {
        stop_on_error: true,
        ..WalkPolicy::default()
    };
    let filter = compile("1").unwrap();
    let result: Result<Vec<_>, _> = Walker::new([dir.path()], filter, policy).collect();
    assert!(result.is_err());

    fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
}

#[test]
fn type_mismatch_terminates_the_stream() {
    let dir = tempdir().unwrap();
    write_bytes(dir.path(), "a.txt", 10);

    let filter = compile("size = 'big'").unwrap();
    let result: Result<Vec<_>, _> = Walker::new([dir.path()], filter, WalkPolicy::default()).collect();
    match result {
        Err(arcfind::Error::Eval(_)) => {}
        other => panic!("expected an evaluation error, got {other:?}"),
    }
}

#[test]
fn find_compiles_and_walks_in_one_call() {
    let dir = tempdir().unwrap();
    write_bytes(dir.path(), "a.csv", 10);
    write_bytes(dir.path(), "b.txt", 10);

    let walker = arcfind::find([dir.path()], "ext = 'csv'", WalkPolicy::default()).unwrap();
    let found: Vec<_> = walker.map(|r| r.unwrap().name).collect();
    assert_eq!(found, ["a.csv"]);

    assert!(arcfind::find([dir.path()], "ext =", WalkPolicy::default()).is_err());
}

#[test]
fn multiple_roots_in_caller_order() {
    let dir = tempdir().unwrap();
    let r1 = dir.path().join("r1");
    let r2 = dir.path().join("r2");
    fs::create_dir(&r1).unwrap();
    fs::create_dir(&r2).unwrap();
    write_bytes(&r1, "z.txt", 1);
    write_bytes(&r2, "a.txt", 1);

    let filter = compile("1").unwrap();
    let found: Vec<_> = Walker::new([&r2, &r1], filter, WalkPolicy::default())
        .map(|r| r.unwrap().name)
        .collect();
    assert_eq!(found, ["a.txt", "z.txt"]);
}
