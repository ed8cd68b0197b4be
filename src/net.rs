use serde_json::Value;
use std::future::Future;
use std::sync::Mutex;
use tokio::sync::oneshot;
use tokio::task::AbortHandle;

struct Pending {
    supersede: oneshot::Sender<()>,
    task: AbortHandle,
}

/// Holds at most one in-flight outbound request per channel. Issuing a new
/// request resolves the still-pending prior call with `Value::Null` and
/// tears its task down before the new one starts. Connectivity and task
/// failures also resolve to `Value::Null`; callers always get a usable
/// value back.
#[derive(Default)]
pub struct RequestSupervisor {
    slot: Mutex<Option<Pending>>,
}

impl RequestSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn dispatch<F>(&self, request: F) -> Value
    where
        F: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        let previous = self
            .slot
            .lock()
            .expect("request slot poisoned")
            .take();
        if let Some(previous) = previous {
            let _ = previous.supersede.send(());
            previous.task.abort();
        }

        let (supersede_tx, supersede_rx) = oneshot::channel();
        let handle = tokio::spawn(request);
        {
            let mut slot = self.slot.lock().expect("request slot poisoned");
            *slot = Some(Pending {
                supersede: supersede_tx,
                task: handle.abort_handle(),
            });
        }

        tokio::select! {
            _ = supersede_rx => Value::Null,
            joined = handle => match joined {
                Ok(Ok(value)) => value,
                _ => Value::Null,
            },
        }
    }
}
