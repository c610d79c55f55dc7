//! Tests for acquisition and cleanup against the real filesystem.

use super::*;
use crate::error::LockrunError;
use crate::feedback::WaitFeedback;
use crate::lockfile::{LockFile, LockMode, SIGNATURE, SignatureState, TryLock};
use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// Feedback that counts calls and optionally signals when waiting starts.
#[derive(Default)]
struct Recorder {
    waits: usize,
    acquisitions: usize,
    on_wait: Option<mpsc::Sender<()>>,
}

impl WaitFeedback for Recorder {
    fn waiting(&mut self, _path: &Path) {
        self.waits += 1;
        if let Some(tx) = &self.on_wait {
            let _ = tx.send(());
        }
    }

    fn acquired(&mut self, _path: &Path) {
        self.acquisitions += 1;
    }
}

fn lock_path(dir: &TempDir) -> PathBuf {
    dir.path().join("job.lock")
}

fn request(mode: LockMode, wait: WaitPolicy) -> LockRequest {
    LockRequest {
        mode,
        wait,
        ..Default::default()
    }
}

fn unlinking(mode: LockMode, wait: WaitPolicy) -> LockRequest {
    LockRequest {
        create_unlink: true,
        ..request(mode, wait)
    }
}

fn hold(path: &Path, mode: LockMode) -> LockFile {
    let lock = LockFile::open(path, true).unwrap();
    lock.wait_lock(mode).unwrap();
    lock
}

#[test]
fn test_acquire_creates_file_and_holds_lock() {
    let dir = TempDir::new().unwrap();
    let path = lock_path(&dir);
    let mut feedback = Recorder::default();

    let held = acquire(&path, &LockRequest::default(), &mut feedback).unwrap();

    assert!(path.exists());
    assert_eq!(held.mode(), LockMode::Exclusive);
    assert_eq!(held.path(), path.as_path());
    assert_eq!(held.identity().ino, fs::metadata(&path).unwrap().ino());
    assert_eq!(feedback.waits, 0);
    assert_eq!(feedback.acquisitions, 1);

    let other = LockFile::open(&path, true).unwrap();
    assert_eq!(other.try_lock(LockMode::Shared).unwrap(), TryLock::WouldBlock);
}

#[test]
fn test_plain_mode_leaves_file_empty() {
    let dir = TempDir::new().unwrap();
    let path = lock_path(&dir);

    let held = acquire(&path, &LockRequest::default(), &mut Recorder::default()).unwrap();

    assert_eq!(held.signature(), SignatureState::Absent);
    assert_eq!(fs::metadata(&path).unwrap().len(), 0);
}

#[test]
fn test_no_wait_is_refused_when_held() {
    let dir = TempDir::new().unwrap();
    let path = lock_path(&dir);
    let _holder = hold(&path, LockMode::Exclusive);
    let mut feedback = Recorder::default();

    let err = acquire(
        &path,
        &request(LockMode::Exclusive, WaitPolicy::NonBlocking),
        &mut feedback,
    )
    .unwrap_err();

    assert!(matches!(err, LockrunError::AcquisitionRefused { .. }));
    assert_eq!(feedback.waits, 0);
    assert_eq!(feedback.acquisitions, 0);
}

#[test]
fn test_shared_no_wait_succeeds_alongside_shared_holder() {
    let dir = TempDir::new().unwrap();
    let path = lock_path(&dir);
    let _holder = hold(&path, LockMode::Shared);

    let held = acquire(
        &path,
        &request(LockMode::Shared, WaitPolicy::NonBlocking),
        &mut Recorder::default(),
    )
    .unwrap();

    assert_eq!(held.mode(), LockMode::Shared);
}

#[test]
fn test_deadline_expires_while_held() {
    let dir = TempDir::new().unwrap();
    let path = lock_path(&dir);
    let _holder = hold(&path, LockMode::Exclusive);
    let mut feedback = Recorder::default();
    let limit = Duration::from_millis(150);

    let start = Instant::now();
    let err = acquire(
        &path,
        &request(LockMode::Exclusive, WaitPolicy::BlockWithDeadline(limit)),
        &mut feedback,
    )
    .unwrap_err();
    let elapsed = start.elapsed();

    match err {
        LockrunError::AcquisitionTimedOut { path: p, timeout } => {
            assert_eq!(p, path);
            assert_eq!(timeout, limit);
        }
        other => panic!("expected timeout, got {other:?}"),
    }
    assert!(elapsed >= limit, "gave up early after {elapsed:?}");
    assert!(elapsed < Duration::from_secs(2), "overran to {elapsed:?}");
    assert_eq!(feedback.waits, 1);
    assert_eq!(feedback.acquisitions, 0);
}

#[test]
fn test_deadline_wait_succeeds_when_released() {
    let dir = TempDir::new().unwrap();
    let path = lock_path(&dir);
    let holder = hold(&path, LockMode::Exclusive);

    let releaser = thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        drop(holder);
    });

    let held = acquire(
        &path,
        &request(
            LockMode::Exclusive,
            WaitPolicy::BlockWithDeadline(Duration::from_secs(5)),
        ),
        &mut Recorder::default(),
    )
    .unwrap();
    releaser.join().unwrap();

    assert_eq!(held.mode(), LockMode::Exclusive);
}

#[test]
fn test_blocking_wait_reports_waiting_once() {
    let dir = TempDir::new().unwrap();
    let path = lock_path(&dir);
    let holder = hold(&path, LockMode::Exclusive);
    let (tx, rx) = mpsc::channel();

    let waiter_path = path.clone();
    let waiter = thread::spawn(move || {
        let mut feedback = Recorder {
            on_wait: Some(tx),
            ..Default::default()
        };
        let held = acquire(&waiter_path, &LockRequest::default(), &mut feedback).unwrap();
        (held.identity(), feedback.waits, feedback.acquisitions)
    });

    rx.recv_timeout(Duration::from_secs(5)).unwrap();
    drop(holder);

    let (_, waits, acquisitions) = waiter.join().unwrap();
    assert_eq!(waits, 1);
    assert_eq!(acquisitions, 1);
}

#[test]
fn test_replaced_file_is_detected_and_acquisition_restarts() {
    let dir = TempDir::new().unwrap();
    let path = lock_path(&dir);
    let holder = hold(&path, LockMode::Exclusive);
    let (tx, rx) = mpsc::channel();

    let waiter_path = path.clone();
    let waiter = thread::spawn(move || {
        let mut feedback = Recorder {
            on_wait: Some(tx),
            ..Default::default()
        };
        acquire(&waiter_path, &LockRequest::default(), &mut feedback)
            .unwrap()
            .identity()
    });

    // The waiter is queued on the old inode; swap the path to a new file.
    rx.recv_timeout(Duration::from_secs(5)).unwrap();
    fs::remove_file(&path).unwrap();
    fs::write(&path, b"").unwrap();
    let replacement = fs::metadata(&path).unwrap();
    drop(holder);

    let identity = waiter.join().unwrap();
    assert_eq!(identity.dev, replacement.dev());
    assert_eq!(identity.ino, replacement.ino());
}

#[test]
fn test_foreign_content_is_rejected_in_plain_mode() {
    let dir = TempDir::new().unwrap();
    let path = lock_path(&dir);
    fs::write(&path, b"hello").unwrap();
    let mut feedback = Recorder::default();

    let err = acquire(&path, &LockRequest::default(), &mut feedback).unwrap_err();

    assert!(matches!(err, LockrunError::SignatureMismatch { .. }));
    assert_eq!(fs::read(&path).unwrap(), b"hello");
    assert_eq!(feedback.acquisitions, 0);
}

#[test]
fn test_foreign_content_is_rejected_in_create_unlink_mode() {
    let dir = TempDir::new().unwrap();
    let path = lock_path(&dir);
    fs::write(&path, b"hello").unwrap();

    let err = acquire(
        &path,
        &unlinking(LockMode::Shared, WaitPolicy::BlockIndefinitely),
        &mut Recorder::default(),
    )
    .unwrap_err();

    assert!(matches!(err, LockrunError::SignatureMismatch { .. }));
    assert_eq!(fs::read(&path).unwrap(), b"hello");
}

#[test]
fn test_foreign_content_held_by_another_tool_is_rejected_without_waiting() {
    let dir = TempDir::new().unwrap();
    let path = lock_path(&dir);
    fs::write(&path, b"hello").unwrap();
    let _holder = hold(&path, LockMode::Shared);
    let mut feedback = Recorder::default();

    let start = Instant::now();
    let err = acquire(
        &path,
        &unlinking(
            LockMode::Exclusive,
            WaitPolicy::BlockWithDeadline(Duration::from_secs(5)),
        ),
        &mut feedback,
    )
    .unwrap_err();

    assert!(matches!(err, LockrunError::SignatureMismatch { .. }), "{err:?}");
    assert!(start.elapsed() < Duration::from_secs(1));
    assert_eq!(feedback.waits, 0);
    assert_eq!(fs::read(&path).unwrap(), b"hello");
}

#[test]
fn test_partial_signature_on_busy_file_defers_check() {
    let dir = TempDir::new().unwrap();
    let path = lock_path(&dir);
    fs::write(&path, &SIGNATURE[..5]).unwrap();
    let _holder = hold(&path, LockMode::Shared);

    // Deferred past the busy bootstrap, then rejected once the lock is held.
    let err = acquire(
        &path,
        &unlinking(LockMode::Shared, WaitPolicy::NonBlocking),
        &mut Recorder::default(),
    )
    .unwrap_err();

    assert!(matches!(err, LockrunError::SignatureMismatch { .. }));
}

#[test]
fn test_existing_signature_is_accepted_in_plain_mode() {
    let dir = TempDir::new().unwrap();
    let path = lock_path(&dir);
    fs::write(&path, SIGNATURE).unwrap();

    let held = acquire(&path, &LockRequest::default(), &mut Recorder::default()).unwrap();

    assert_eq!(held.signature(), SignatureState::Present);
}

#[test]
fn test_fail_if_missing_does_not_create() {
    let dir = TempDir::new().unwrap();
    let path = lock_path(&dir);
    let req = LockRequest {
        fail_if_missing: true,
        ..Default::default()
    };

    let err = acquire(&path, &req, &mut Recorder::default()).unwrap_err();

    assert!(matches!(err, LockrunError::LockFileMissing { .. }));
    assert!(!path.exists());
}

#[test]
fn test_fail_if_missing_uses_existing_file() {
    let dir = TempDir::new().unwrap();
    let path = lock_path(&dir);
    fs::write(&path, b"").unwrap();
    let req = LockRequest {
        fail_if_missing: true,
        ..Default::default()
    };

    assert!(acquire(&path, &req, &mut Recorder::default()).is_ok());
}

#[test]
fn test_create_unlink_writes_signature() {
    let dir = TempDir::new().unwrap();
    let path = lock_path(&dir);

    let held = acquire(
        &path,
        &unlinking(LockMode::Shared, WaitPolicy::BlockIndefinitely),
        &mut Recorder::default(),
    )
    .unwrap();

    assert_eq!(held.signature(), SignatureState::Present);
    assert_eq!(fs::read(&path).unwrap(), SIGNATURE);
}

#[test]
fn test_shared_holders_run_together_in_create_unlink_mode() {
    let dir = TempDir::new().unwrap();
    let path = lock_path(&dir);
    let req = unlinking(LockMode::Shared, WaitPolicy::NonBlocking);

    let first = acquire(&path, &req, &mut Recorder::default()).unwrap();
    let second = acquire(&path, &req, &mut Recorder::default()).unwrap();
    let third = acquire(&path, &req, &mut Recorder::default()).unwrap();

    assert_eq!(first.identity(), second.identity());
    assert_eq!(second.identity(), third.identity());
    assert_eq!(third.signature(), SignatureState::Present);
}

#[test]
fn test_busy_file_defers_signature_check() {
    let dir = TempDir::new().unwrap();
    let path = lock_path(&dir);
    // A plain-mode shared holder blocks the bootstrap's transient exclusive lock.
    let _holder = hold(&path, LockMode::Shared);

    let held = acquire(
        &path,
        &unlinking(LockMode::Shared, WaitPolicy::NonBlocking),
        &mut Recorder::default(),
    )
    .unwrap();

    // Shared holders never write, so the file stays unsigned.
    assert_eq!(held.signature(), SignatureState::Absent);
    assert_eq!(fs::metadata(&path).unwrap().len(), 0);
}

#[test]
fn test_deferred_check_writes_signature_for_exclusive_holder() {
    let dir = TempDir::new().unwrap();
    let path = lock_path(&dir);
    let holder = hold(&path, LockMode::Shared);

    let releaser = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        drop(holder);
    });

    // Bootstrap fails against the shared holder, then the real lock waits.
    let held = acquire(
        &path,
        &unlinking(LockMode::Exclusive, WaitPolicy::BlockIndefinitely),
        &mut Recorder::default(),
    )
    .unwrap();
    releaser.join().unwrap();

    assert_eq!(held.signature(), SignatureState::Present);
    assert_eq!(fs::read(&path).unwrap(), SIGNATURE);
}

#[test]
fn test_release_removes_file_for_last_holder() {
    let dir = TempDir::new().unwrap();
    let path = lock_path(&dir);
    let req = unlinking(LockMode::Exclusive, WaitPolicy::BlockIndefinitely);

    let held = acquire(&path, &req, &mut Recorder::default()).unwrap();
    let outcome = release(held, &req).unwrap();

    assert_eq!(outcome, CleanupOutcome::Removed);
    assert!(!path.exists());
}

#[test]
fn test_release_keeps_file_while_others_hold_it() {
    let dir = TempDir::new().unwrap();
    let path = lock_path(&dir);
    let req = unlinking(LockMode::Shared, WaitPolicy::NonBlocking);

    let first = acquire(&path, &req, &mut Recorder::default()).unwrap();
    let second = acquire(&path, &req, &mut Recorder::default()).unwrap();

    assert_eq!(release(first, &req).unwrap(), CleanupOutcome::InUse);
    assert!(path.exists());

    assert_eq!(release(second, &req).unwrap(), CleanupOutcome::Removed);
    assert!(!path.exists());
}

#[test]
fn test_release_in_plain_mode_keeps_file_and_unlocks() {
    let dir = TempDir::new().unwrap();
    let path = lock_path(&dir);
    let req = LockRequest::default();

    let held = acquire(&path, &req, &mut Recorder::default()).unwrap();
    assert_eq!(release(held, &req).unwrap(), CleanupOutcome::NotManaged);

    assert!(path.exists());
    let other = LockFile::open(&path, false).unwrap();
    assert_eq!(other.try_lock(LockMode::Exclusive).unwrap(), TryLock::Locked);
}

#[test]
fn test_release_keeps_unsigned_file() {
    let dir = TempDir::new().unwrap();
    let path = lock_path(&dir);
    let holder = hold(&path, LockMode::Shared);
    let req = unlinking(LockMode::Shared, WaitPolicy::NonBlocking);

    let held = acquire(&path, &req, &mut Recorder::default()).unwrap();
    drop(holder);

    assert_eq!(release(held, &req).unwrap(), CleanupOutcome::Unsigned);
    assert!(path.exists());
}

#[test]
fn test_release_never_removes_a_replacement_file() {
    let dir = TempDir::new().unwrap();
    let path = lock_path(&dir);
    let req = unlinking(LockMode::Exclusive, WaitPolicy::BlockIndefinitely);

    let held = acquire(&path, &req, &mut Recorder::default()).unwrap();
    fs::remove_file(&path).unwrap();
    fs::write(&path, SIGNATURE).unwrap();

    assert_eq!(release(held, &req).unwrap(), CleanupOutcome::Replaced);
    assert_eq!(fs::read(&path).unwrap(), SIGNATURE);
}

#[test]
fn test_sequential_create_unlink_runs_each_start_fresh() {
    let dir = TempDir::new().unwrap();
    let path = lock_path(&dir);
    let req = unlinking(LockMode::Exclusive, WaitPolicy::NonBlocking);

    for _ in 0..3 {
        let held = acquire(&path, &req, &mut Recorder::default()).unwrap();
        assert_eq!(held.signature(), SignatureState::Present);
        assert_eq!(release(held, &req).unwrap(), CleanupOutcome::Removed);
        assert!(!path.exists());
    }
}
