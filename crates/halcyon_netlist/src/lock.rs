//! The worker/observer lock discipline on a context.
//!
//! The core is single-threaded cooperative: one worker identity owns the
//! context at a time, and at most one observer (a UI) may request a
//! consistent snapshot. Two locks implement this. The *main* lock guards
//! all context state and records its owning thread; the *UI* lock is taken
//! by the observer before it asks for the main lock, and flashed by the
//! worker's [`yield_now`](ContextLock::yield_now) so the observer's wait is
//! bounded even during long-running loops.

use std::sync::{Condvar, Mutex};
use std::thread::ThreadId;

#[derive(Default)]
struct LockState {
    owner: Option<ThreadId>,
}

/// The paired main/UI locks of a context.
pub struct ContextLock {
    main: Mutex<LockState>,
    main_cv: Condvar,
    ui: Mutex<bool>,
    ui_cv: Condvar,
}

impl ContextLock {
    /// Creates an unlocked lock pair.
    pub fn new() -> Self {
        Self {
            main: Mutex::new(LockState::default()),
            main_cv: Condvar::new(),
            ui: Mutex::new(false),
            ui_cv: Condvar::new(),
        }
    }

    /// Acquires the main lock, blocking until it is free, and records the
    /// calling thread as owner.
    pub fn lock(&self) {
        let mut state = self.main.lock().unwrap();
        while state.owner.is_some() {
            state = self.main_cv.wait(state).unwrap();
        }
        state.owner = Some(std::thread::current().id());
    }

    /// Releases the main lock.
    ///
    /// # Panics
    ///
    /// Panics if the calling thread is not the recorded owner.
    pub fn unlock(&self) {
        let mut state = self.main.lock().unwrap();
        assert_eq!(
            state.owner,
            Some(std::thread::current().id()),
            "unlock() by a thread that does not hold the context"
        );
        state.owner = None;
        drop(state);
        self.main_cv.notify_one();
    }

    /// Returns whether the calling thread holds the main lock.
    pub fn held_by_current_thread(&self) -> bool {
        let state = self.main.lock().unwrap();
        state.owner == Some(std::thread::current().id())
    }

    fn lock_ui_flag(&self) {
        let mut held = self.ui.lock().unwrap();
        while *held {
            held = self.ui_cv.wait(held).unwrap();
        }
        *held = true;
    }

    fn unlock_ui_flag(&self) {
        let mut held = self.ui.lock().unwrap();
        *held = false;
        drop(held);
        self.ui_cv.notify_one();
    }

    /// Yields to a waiting observer.
    ///
    /// Releases the main lock, flashes the UI lock (which lets an observer
    /// blocked in [`lock_ui`](Self::lock_ui) run), and reacquires the main
    /// lock. This is the only suspension point; every binding mutation is
    /// atomic with respect to it. Call from long-running worker loops.
    pub fn yield_now(&self) {
        self.unlock();
        self.lock_ui_flag();
        self.unlock_ui_flag();
        self.lock();
    }

    /// Observer entry: takes the UI lock, then the main lock. While held,
    /// the observer reads consistent state.
    pub fn lock_ui(&self) {
        self.lock_ui_flag();
        self.lock();
    }

    /// Observer exit: releases in reverse order.
    pub fn unlock_ui(&self) {
        self.unlock();
        self.unlock_ui_flag();
    }
}

impl Default for ContextLock {
    fn default() -> Self {
        Self::new()
    }
}
