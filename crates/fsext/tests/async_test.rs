//! The `*_async` forms on a live tokio runtime.

#![cfg(unix)]

use std::fs::{File, OpenOptions};
use std::os::unix::io::AsRawFd;
use std::path::Path;
use std::time::{Duration, Instant};

use fsext::constants::FD_CLOEXEC;
use fsext::{
    fcntl_async, flock, flock_async, platform_resolver, seek_async, statvfs_async, utime_async,
    Error, IdentityResolver, LockMode, SeekOrigin,
};
use fsext_config::testing::TestEnvironment;

fn open(path: &Path) -> File {
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_flock_async_completes_after_release() {
    let env = TestEnvironment::new().unwrap();
    let holder = open(&env.lock_path);
    let waiter = open(&env.lock_path);
    flock(holder.as_raw_fd(), LockMode::Exclusive).unwrap();

    let pending = flock_async(waiter.as_raw_fd(), "ex").unwrap();
    assert_eq!(pending.op(), "flock");
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!pending.is_finished());

    flock(holder.as_raw_fd(), LockMode::Unlock).unwrap();
    tokio::time::timeout(Duration::from_secs(5), pending)
        .await
        .expect("lock was not granted after release")
        .unwrap();

    assert!(matches!(
        flock(holder.as_raw_fd(), "exnb"),
        Err(Error::WouldBlock { .. })
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_dropped_completion_still_acquires() {
    let env = TestEnvironment::new().unwrap();
    let holder = open(&env.lock_path);
    let waiter = open(&env.lock_path);
    let observer = open(&env.lock_path);
    flock(holder.as_raw_fd(), LockMode::Exclusive).unwrap();

    let pending = flock_async(waiter.as_raw_fd(), LockMode::Exclusive).unwrap();
    drop(pending);
    flock(holder.as_raw_fd(), LockMode::Unlock).unwrap();

    // The detached call keeps running and ends up holding the lock.
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        match flock(observer.as_raw_fd(), LockMode::ExclusiveNonBlocking) {
            Err(Error::WouldBlock { .. }) => break,
            Ok(()) => {
                // Won the race against the detached call; hand it back.
                flock(observer.as_raw_fd(), LockMode::Unlock).unwrap();
            }
            Err(err) => panic!("unexpected error: {err}"),
        }
        assert!(Instant::now() < deadline, "detached lock never acquired");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn test_invalid_flags_fail_before_dispatch() {
    let env = TestEnvironment::new().unwrap();
    let file = open(&env.lock_path);

    assert!(matches!(
        flock_async(file.as_raw_fd(), "both"),
        Err(Error::UnknownFlag { family: "flock", .. })
    ));
    assert!(matches!(
        seek_async(file.as_raw_fd(), 0, "middle"),
        Err(Error::UnknownFlag { .. })
    ));
    assert!(matches!(
        fcntl_async(file.as_raw_fd(), "dup", None),
        Err(Error::UnknownFlag { .. })
    ));
}

#[tokio::test]
async fn test_seek_async_positions() {
    let env = TestEnvironment::new().unwrap();
    let path = env.create_file("data.bin", b"0123456789").unwrap();
    let file = open(&path);
    let fd = file.as_raw_fd();

    assert_eq!(seek_async(fd, 4, SeekOrigin::Start).unwrap().await.unwrap(), 4);
    assert_eq!(seek_async(fd, 2, "cur").unwrap().await.unwrap(), 6);
    assert_eq!(seek_async(fd, -1, "end").unwrap().await.unwrap(), 9);

    let err = seek_async(fd, -20, "set").unwrap().await.unwrap_err();
    assert_eq!(err.code(), "EINVAL");
}

/// A descriptor number that was open a moment ago and is now closed.
fn closed_descriptor() -> i32 {
    let file = tempfile::tempfile().unwrap();
    // SAFETY: F_DUPFD only reads its integer arguments.
    let fd = unsafe { libc::fcntl(file.as_raw_fd(), libc::F_DUPFD, 600) };
    assert!(fd >= 600);
    // SAFETY: fd is the duplicate made above and is closed exactly once.
    assert_eq!(unsafe { libc::close(fd) }, 0);
    fd
}

#[tokio::test]
async fn test_seek_async_closed_descriptor() {
    let fd = closed_descriptor();
    let err = seek_async(fd, 0, "set").unwrap().await.unwrap_err();
    assert!(matches!(err, Error::BadDescriptor { op: "seek", .. }));
    assert_eq!(err.code(), "EBADF");

    let err = seek_async(-1, 0, SeekOrigin::End).unwrap().await.unwrap_err();
    assert!(matches!(err, Error::BadDescriptor { fd: -1, .. }));
}

#[tokio::test]
async fn test_fcntl_async_cloexec() {
    let env = TestEnvironment::new().unwrap();
    let file = open(&env.lock_path);
    let fd = file.as_raw_fd();

    fcntl_async(fd, "setfd", Some(FD_CLOEXEC))
        .unwrap()
        .await
        .unwrap();
    let flags = fcntl_async(fd, "getfd", None).unwrap().await.unwrap();
    assert_eq!(flags & FD_CLOEXEC, FD_CLOEXEC);
}

#[tokio::test]
async fn test_bad_descriptor_reported_by_completion() {
    let err = flock_async(-1, "sh").unwrap().await.unwrap_err();
    assert!(matches!(err, Error::BadDescriptor { fd: -1, .. }));
    assert_eq!(err.code(), "EBADF");
}

#[tokio::test]
async fn test_statvfs_async_defaults_to_root() {
    let root = statvfs_async(None).unwrap().await.unwrap();
    assert!(root.block_size > 0);
    assert!(root.blocks > 0);

    let env = TestEnvironment::new().unwrap();
    let scratch = statvfs_async(Some(env.root.clone()))
        .unwrap()
        .await
        .unwrap();
    assert!(scratch.blocks_available <= scratch.blocks_free);

    let err = statvfs_async(Some(env.path("missing")))
        .unwrap()
        .await
        .unwrap_err();
    assert_eq!(err.code(), "ENOENT");
}

#[tokio::test]
async fn test_utime_async_sets_times() {
    let env = TestEnvironment::new().unwrap();
    let path = env.create_file("stamped", b"x").unwrap();

    utime_async(path.clone(), 1_000_000_000, 1_200_000_000)
        .unwrap()
        .await
        .unwrap();

    let stats = platform_resolver()
        .stat_async(path)
        .unwrap()
        .await
        .unwrap();
    assert_eq!(stats.accessed.secs, 1_000_000_000);
    assert_eq!(stats.modified.secs, 1_200_000_000);
}
