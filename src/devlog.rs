//! Per-operation benchmark lines (`{"bench":"query",...}`). They go to the
//! `shelfdb::dev` log target, which `logger` routes to `dev.log` when enabled,
//! and to a per-thread [`Capture`] so tests can read what a call emitted.

use std::cell::RefCell;

pub const DEV_TARGET: &str = "shelfdb::dev";

thread_local! {
    static CAPTURED: RefCell<Option<Vec<String>>> = const { RefCell::new(None) };
}

/// Collects `devlog!` lines emitted on this thread until dropped.
pub struct Capture {
    _not_send: std::marker::PhantomData<*const ()>,
}

impl Capture {
    /// Lines captured since the last `take`.
    #[must_use]
    pub fn take(&self) -> Vec<String> {
        CAPTURED.with(|c| c.borrow_mut().as_mut().map(std::mem::take).unwrap_or_default())
    }

    #[must_use]
    pub fn peek(&self) -> Vec<String> {
        CAPTURED.with(|c| c.borrow().clone().unwrap_or_default())
    }
}

impl Drop for Capture {
    fn drop(&mut self) {
        CAPTURED.with(|c| *c.borrow_mut() = None);
    }
}

/// Start capturing on the current thread. Other threads are unaffected.
#[must_use]
pub fn capture() -> Capture {
    CAPTURED.with(|c| *c.borrow_mut() = Some(Vec::new()));
    Capture { _not_send: std::marker::PhantomData }
}

#[doc(hidden)]
pub fn record(line: String) {
    log::trace!(target: DEV_TARGET, "{line}");
    CAPTURED.with(|c| {
        if let Some(lines) = c.borrow_mut().as_mut() {
            lines.push(line);
        }
    });
}

/// Format and emit one benchmark line.
#[macro_export]
macro_rules! devlog {
    ($($arg:tt)*) => {
        $crate::devlog::record(format!($($arg)*))
    };
}
