//! End-to-end tests that drive the `fsext` binary.

use std::path::Path;
use std::process::{Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use fsext_config::testing::TestEnvironment;

fn fsext() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_fsext"));
    // Keep the developer's own config and log filters out of the tests.
    cmd.env_remove("FSEXT_LOG")
        .env_remove("RUST_LOG")
        .env_remove("FSEXT_LOCK_MODE")
        .env_remove("FSEXT_STATVFS_PATH");
    cmd
}

fn run(args: &[&str]) -> Output {
    fsext().args(args).output().expect("Failed to execute fsext")
}

fn path_arg(path: &Path) -> &str {
    path.to_str().expect("scratch paths are UTF-8")
}

fn wait_for_line(env: &TestEnvironment, line: &str) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        if env
            .log_lines()
            .map(|lines| lines.iter().any(|l| l == line))
            .unwrap_or(false)
        {
            return;
        }
        thread::sleep(Duration::from_millis(5));
    }
    panic!("{line:?} never appeared in the log");
}

// ========== Lock ==========

#[test]
fn test_lock_mutual_exclusion_across_processes() {
    let env = TestEnvironment::new().unwrap();
    let lock = path_arg(&env.lock_path).to_string();
    let log = path_arg(&env.log_path).to_string();

    let mut a = fsext()
        .args(["lock", &lock, "--mode", "ex", "--append", &log])
        .args(["--line", "A holds", "--hold-ms", "100"])
        .stdout(Stdio::null())
        .spawn()
        .unwrap();
    wait_for_line(&env, "A holds");

    let b = fsext()
        .args(["lock", &lock, "--mode", "ex", "--append", &log])
        .args(["--line", "B holds"])
        .output()
        .unwrap();

    assert!(a.wait().unwrap().success());
    assert!(b.status.success(), "{}", String::from_utf8_lossy(&b.stderr));
    assert_eq!(env.log_lines().unwrap(), vec!["A holds", "B holds"]);
}

#[test]
fn test_nonblocking_lock_conflict_exits_with_status_one() {
    let env = TestEnvironment::new().unwrap();
    let lock = path_arg(&env.lock_path).to_string();
    let log = path_arg(&env.log_path).to_string();

    let mut holder = fsext()
        .args(["lock", &lock, "--mode", "ex", "--append", &log, "--line", "held"])
        .args(["--hold-ms", "2000"])
        .spawn()
        .unwrap();
    wait_for_line(&env, "held");

    let contender = run(&["lock", &lock, "--mode", "exnb"]);
    assert_eq!(contender.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&contender.stderr).contains("locked"));

    // Shared non-blocking also conflicts with an exclusive holder.
    let shared = run(&["lock", &lock, "--mode", "shnb"]);
    assert_eq!(shared.status.code(), Some(1));

    holder.kill().unwrap();
    holder.wait().unwrap();
}

#[cfg(unix)]
#[test]
fn test_lock_runs_command_and_forwards_status() {
    let env = TestEnvironment::new().unwrap();
    let lock = path_arg(&env.lock_path).to_string();

    let ok = run(&["lock", &lock, "--", "true"]);
    assert!(ok.status.success());

    let failed = run(&["lock", &lock, "--", "sh", "-c", "exit 7"]);
    assert_eq!(failed.status.code(), Some(7));

    // The lock is free again afterwards.
    assert!(run(&["lock", &lock, "--mode", "exnb"]).status.success());
}

#[test]
fn test_lock_rejects_unknown_mode() {
    let env = TestEnvironment::new().unwrap();
    let output = run(&["lock", path_arg(&env.lock_path), "--mode", "exclusive"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Invalid lock mode"));
}

#[test]
fn test_lock_default_mode_from_environment() {
    let env = TestEnvironment::new().unwrap();
    let lock = path_arg(&env.lock_path).to_string();
    let log = path_arg(&env.log_path).to_string();

    let mut holder = fsext()
        .args(["lock", &lock, "--mode", "sh", "--append", &log, "--line", "reader"])
        .args(["--hold-ms", "2000"])
        .spawn()
        .unwrap();
    wait_for_line(&env, "reader");

    // shnb coexists with the shared holder; exnb does not.
    let shared = fsext()
        .env("FSEXT_LOCK_MODE", "shnb")
        .args(["lock", &lock])
        .output()
        .unwrap();
    assert!(shared.status.success());
    let exclusive = fsext()
        .env("FSEXT_LOCK_MODE", "exnb")
        .args(["lock", &lock])
        .output()
        .unwrap();
    assert_eq!(exclusive.status.code(), Some(1));

    holder.kill().unwrap();
    holder.wait().unwrap();
}

// ========== Seek / fcntl / utime ==========

#[test]
fn test_seek_prints_offset() {
    let env = TestEnvironment::new().unwrap();
    let file = env.create_file("data.bin", b"0123456789").unwrap();

    let output = run(&["seek", path_arg(&file), "-3", "--whence", "end"]);
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "7");

    let past_eof = run(&["seek", path_arg(&file), "100"]);
    assert_eq!(String::from_utf8_lossy(&past_eof.stdout).trim(), "100");
    assert_eq!(std::fs::metadata(&file).unwrap().len(), 10);

    let negative = run(&["seek", path_arg(&file), "-1"]);
    assert!(!negative.status.success());
}

#[cfg(unix)]
#[test]
fn test_fcntl_getlk_reports_unlock_when_free() {
    let env = TestEnvironment::new().unwrap();
    let output = run(&["fcntl", path_arg(&env.lock_path), "getlk"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let record: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(record["kind"], "unlock");
}

#[test]
fn test_fcntl_rejects_unknown_command() {
    let env = TestEnvironment::new().unwrap();
    let output = run(&["fcntl", path_arg(&env.lock_path), "dupfd"]);
    assert!(!output.status.success());
}

#[test]
fn test_utime_then_stat() {
    let env = TestEnvironment::new().unwrap();
    let file = env.create_file("stamped", b"x").unwrap();

    let output = run(&["utime", path_arg(&file), "1000000000", "1100000000"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let output = run(&["stat", path_arg(&file)]);
    let stats: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(stats["modified"]["secs"], 1_100_000_000);
    assert_eq!(stats["accessed"]["secs"], 1_000_000_000);
    assert_eq!(stats["kind"], "file");
}

#[cfg(unix)]
#[test]
fn test_stat_and_lstat_on_symlink() {
    let env = TestEnvironment::new().unwrap();
    env.create_file("dir/target", b"12345").unwrap();
    let link = env.create_symlink("target", "dir/link").unwrap();

    let followed = run(&["stat", path_arg(&link)]);
    let followed: serde_json::Value = serde_json::from_slice(&followed.stdout).unwrap();
    assert_eq!(followed["kind"], "file");
    assert_eq!(followed["size"], 5);

    let own = run(&["lstat", path_arg(&link)]);
    let own: serde_json::Value = serde_json::from_slice(&own.stdout).unwrap();
    assert_eq!(own["kind"], "symlink");
}

#[test]
fn test_chown_requires_owner_or_group() {
    let env = TestEnvironment::new().unwrap();
    let file = env.create_file("owned", b"x").unwrap();
    let output = run(&["chown", path_arg(&file)]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("owner or group"));
}

// ========== statvfs / constants / config ==========

#[test]
fn test_statvfs_prints_json() {
    let env = TestEnvironment::new().unwrap();
    let output = run(&["statvfs", path_arg(&env.root)]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let stats: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    for field in ["block_size", "fragment_size", "blocks", "files_free", "name_max"] {
        assert!(stats[field].is_u64(), "missing {field}");
    }
}

#[test]
fn test_statvfs_missing_path_fails() {
    let env = TestEnvironment::new().unwrap();
    let output = run(&["statvfs", path_arg(&env.path("absent"))]);
    assert!(!output.status.success());
}

#[test]
fn test_constants_listing() {
    let output = run(&["constants"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for name in ["LOCK_SH", "LOCK_EX", "LOCK_NB", "LOCK_UN", "F_SETLKW", "SEEK_END"] {
        assert!(stdout.contains(name), "missing {name}");
    }

    let output = run(&["constants", "--json"]);
    let rows: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(rows
        .as_array()
        .unwrap()
        .iter()
        .any(|row| row["name"] == "SEEK_SET" && row["value"] == 0));
}

#[test]
fn test_config_show_returns_valid_toml() {
    let output = run(&["config", "show"]);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    let parsed: fsext_config::Config = toml::from_str(&stdout).unwrap();
    assert!(parsed.stat.max_link_hops > 0);
    for section in ["[logging]", "[lock]", "[statvfs]", "[stat]"] {
        assert!(stdout.contains(section), "missing {section}");
    }
}

#[test]
fn test_config_path_lists_project_file() {
    let output = run(&["config", "path"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains(".fsext/config.toml"));
}
