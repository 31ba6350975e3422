//! Route-transition window.
//!
//! Every path change opens a short window during which the shell reports
//! "not ready". A further change inside the window cancels the pending
//! close and starts a fresh window, so a burst of navigations yields one
//! window ending `window` after the last of them.
//!
//! ```text
//!   restart()      restart()                 close
//!      │──────────────│──────────────────────────│
//!      │   aborted    │         window           │
//!   pending=true                              pending=false
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionConfig {
    /// How long the shell stays "not ready" after a path change.
    /// Zero disables the window.
    pub window: Duration,
}

impl Default for TransitionConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_millis(500),
        }
    }
}

impl TransitionConfig {
    /// Longest accepted window.
    pub const MAX_WINDOW: Duration = Duration::from_secs(10);

    pub fn with_window(window: Duration) -> Self {
        Self { window }
    }

    /// Clamps `window` to [`Self::MAX_WINDOW`].
    ///
    /// Called automatically by [`TransitionTimer::new`].
    pub fn validated(mut self) -> Self {
        if self.window > Self::MAX_WINDOW {
            warn!(
                window_ms = self.window.as_millis() as u64,
                max_ms = Self::MAX_WINDOW.as_millis() as u64,
                "transition window exceeds maximum, clamping"
            );
            self.window = Self::MAX_WINDOW;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Timer
// ---------------------------------------------------------------------------

/// Owns at most one pending "close the window" task.
///
/// The pending flag is published on a `watch` channel so the shell can
/// await its changes alongside the sessions'.
pub struct TransitionTimer {
    window: Duration,
    pending: Arc<watch::Sender<bool>>,
    epoch: Arc<AtomicU64>,
    task: Option<JoinHandle<()>>,
}

impl TransitionTimer {
    pub fn new(config: TransitionConfig) -> Self {
        let config = config.validated();
        let (pending, _) = watch::channel(false);
        Self {
            window: config.window,
            pending: Arc::new(pending),
            epoch: Arc::new(AtomicU64::new(0)),
            task: None,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn is_pending(&self) -> bool {
        *self.pending.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.pending.subscribe()
    }

    /// Opens a fresh window, cancelling any pending close.
    ///
    /// Must be called from within a Tokio runtime to schedule the close.
    /// Without one the window is skipped and the flag stays clear.
    pub fn restart(&mut self) {
        self.abort_pending();

        let window = self.window;
        // The epoch moves under the channel lock so a close that already
        // woke up cannot interleave with this restart.
        let mut epoch = 0;
        self.pending.send_modify(|pending| {
            epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
            *pending = !window.is_zero();
        });
        if window.is_zero() {
            return;
        }

        let handle = match Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!("no tokio runtime, skipping transition window");
                self.pending.send_replace(false);
                return;
            }
        };

        debug!(epoch, window_ms = window.as_millis() as u64, "transition window opened");
        let pending = Arc::clone(&self.pending);
        let current = Arc::clone(&self.epoch);
        self.task = Some(handle.spawn(async move {
            time::sleep(window).await;
            pending.send_if_modified(|flag| {
                // A restart since this task was scheduled owns the flag now.
                if current.load(Ordering::SeqCst) != epoch || !*flag {
                    return false;
                }
                trace!(epoch, "transition window closed");
                *flag = false;
                true
            });
        }));
    }

    /// Closes the window now and drops the pending close.
    pub fn cancel(&mut self) {
        self.abort_pending();
        self.pending.send_if_modified(|pending| {
            self.epoch.fetch_add(1, Ordering::SeqCst);
            std::mem::replace(pending, false)
        });
    }

    fn abort_pending(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for TransitionTimer {
    fn drop(&mut self) {
        self.abort_pending();
    }
}

impl std::fmt::Debug for TransitionTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransitionTimer")
            .field("window", &self.window)
            .field("pending", &self.is_pending())
            .field("epoch", &self.epoch.load(Ordering::SeqCst))
            .finish()
    }
}
