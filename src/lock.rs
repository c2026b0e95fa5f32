//! Reentrant, held-count locks (spec §5).
//!
//! Each folder owns one of these covering its in-memory arrays and
//! sidecar files; a single process-wide instance covers registry
//! membership and ordering (`folders_semaphore`). No pack example ships a
//! ready-made reentrant mutex with held-count semantics, so this is a
//! small hand-rolled wrapper over `std::sync::{Mutex, Condvar}`, in the
//! same spirit as the teacher's typed wrappers around low-level
//! primitives (e.g. its performance cache).

use std::sync::{Condvar, Mutex};
use std::thread::{self, ThreadId};
use std::time::Duration;

struct State {
    owner: Option<ThreadId>,
    depth: u32,
}

/// A reentrant, counting-held mutex. The same thread may acquire it
/// multiple times; it is released only once the outermost guard drops.
pub struct FolderLock {
    state: Mutex<State>,
    cv: Condvar,
}

impl Default for FolderLock {
    fn default() -> Self {
        Self::new()
    }
}

impl FolderLock {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                owner: None,
                depth: 0,
            }),
            cv: Condvar::new(),
        }
    }

    /// Block until the lock is acquired (or re-entered by the holder).
    pub fn lock(&self) -> FolderLockGuard<'_> {
        let me = thread::current().id();
        let mut state = self.state.lock().unwrap();
        loop {
            match state.owner {
                Some(owner) if owner == me => {
                    state.depth += 1;
                    break;
                }
                None => {
                    state.owner = Some(me);
                    state.depth = 1;
                    break;
                }
                Some(_) => {
                    state = self.cv.wait(state).unwrap();
                }
            }
        }
        FolderLockGuard { lock: self }
    }

    /// Non-blocking acquire (spec §5 "Try-lock"). Returns `None` if held
    /// by another thread.
    pub fn try_lock(&self) -> Option<FolderLockGuard<'_>> {
        let me = thread::current().id();
        let mut state = self.state.lock().unwrap();
        match state.owner {
            Some(owner) if owner == me => {
                state.depth += 1;
                Some(FolderLockGuard { lock: self })
            }
            None => {
                state.owner = Some(me);
                state.depth = 1;
                Some(FolderLockGuard { lock: self })
            }
            Some(_) => None,
        }
    }

    fn unlock_one(&self) {
        let mut state = self.state.lock().unwrap();
        state.depth -= 1;
        if state.depth == 0 {
            state.owner = None;
            drop(state);
            self.cv.notify_one();
        }
    }

    /// True if currently held by any thread (used by the registry's
    /// deletion path, which requires an *available* lock before it will
    /// remove a folder).
    pub fn is_held(&self) -> bool {
        self.state.lock().unwrap().owner.is_some()
    }
}

/// RAII guard released when dropped; nested guards on the same thread
/// decrement the held-count rather than releasing early.
pub struct FolderLockGuard<'a> {
    lock: &'a FolderLock,
}

impl Drop for FolderLockGuard<'_> {
    fn drop(&mut self) {
        self.lock.unlock_one();
    }
}

/// The process-wide registry lock (`folders_semaphore`). Acquisition
/// order is always registry-before-folder (spec §5): a thread holding a
/// folder lock must never acquire this one.
pub type RegistryLock = FolderLock;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn reentrant_lock_nests_on_same_thread() {
        let lock = FolderLock::new();
        let g1 = lock.lock();
        let g2 = lock.lock();
        drop(g2);
        assert!(lock.is_held());
        drop(g1);
        assert!(!lock.is_held());
    }

    #[test]
    fn try_lock_fails_when_held_by_other_thread() {
        let lock = Arc::new(FolderLock::new());
        let _g = lock.lock();
        let lock2 = Arc::clone(&lock);
        let handle = thread::spawn(move || lock2.try_lock().is_none());
        assert!(handle.join().unwrap());
    }

    #[test]
    fn blocking_lock_waits_for_release() {
        let lock = Arc::new(FolderLock::new());
        let g = lock.lock();
        let lock2 = Arc::clone(&lock);
        let handle = thread::spawn(move || {
            let _g2 = lock2.lock();
        });
        thread::sleep(Duration::from_millis(20));
        drop(g);
        handle.join().unwrap();
    }
}
