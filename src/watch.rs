use crate::domain::{ASSAY_FILE, STUDY_FILE};
use crate::fs::WatchEvent;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::time::{Duration, Instant, sleep_until};
use tracing::debug;

pub const DEFAULT_QUIET_WINDOW: Duration = Duration::from_millis(300);

/// Only study and assay definition files drive reconciliation; everything
/// else the watcher reports is noise here.
pub fn is_definition_file(path: &Path) -> bool {
    let text = path.to_string_lossy();
    text.contains(STUDY_FILE) || text.contains(ASSAY_FILE)
}

/// Trailing-edge debounce between the filesystem watcher and the domain
/// reload. Every relevant event re-arms the quiet window; one reload signal
/// is emitted when the window expires undisturbed. While the suppression
/// flag is set (bulk writes in flight), incoming events are dropped so the
/// engine's own writes cannot trigger a reload of themselves.
pub struct ReloadDebouncer {
    events: UnboundedSender<WatchEvent>,
    suppress: Arc<AtomicBool>,
}

impl ReloadDebouncer {
    pub fn spawn(quiet: Duration) -> (Self, UnboundedReceiver<()>) {
        let (event_tx, mut event_rx) = unbounded_channel::<WatchEvent>();
        let (reload_tx, reload_rx) = unbounded_channel::<()>();
        let suppress = Arc::new(AtomicBool::new(false));
        let suppressed = suppress.clone();

        tokio::spawn(async move {
            let mut deadline: Option<Instant> = None;
            loop {
                tokio::select! {
                    event = event_rx.recv() => match event {
                        Some(event) => {
                            if suppressed.load(Ordering::SeqCst) {
                                continue;
                            }
                            if !is_definition_file(&event.path) {
                                continue;
                            }
                            debug!(path = %event.path.display(), "definition change, arming reload");
                            deadline = Some(Instant::now() + quiet);
                        }
                        None => break,
                    },
                    _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                        deadline = None;
                        if reload_tx.send(()).is_err() {
                            break;
                        }
                    }
                }
            }
        });

        (
            Self {
                events: event_tx,
                suppress,
            },
            reload_rx,
        )
    }

    /// Feeds one raw watcher event into the filter.
    pub fn notify(&self, event: WatchEvent) {
        let _ = self.events.send(event);
    }

    pub fn set_suppressed(&self, suppressed: bool) {
        self.suppress.store(suppressed, Ordering::SeqCst);
    }

    pub fn suppressed(&self) -> bool {
        self.suppress.load(Ordering::SeqCst)
    }

    /// Shared handle to the suppression flag, for callers that set it around
    /// their own write batches.
    pub fn suppression_flag(&self) -> Arc<AtomicBool> {
        self.suppress.clone()
    }
}
