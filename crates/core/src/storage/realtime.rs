use crate::storage::repo::{ChangeEvent, Table};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const DEFAULT_CAPACITY: usize = 256;

/// In-process fan-out of row change events. Stores publish; views subscribe per table.
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<ChangeEvent>,
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Returns how many subscribers saw the event.
    pub fn publish(&self, event: ChangeEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Runs `callback` for every event on `table` until the returned handle is
    /// unsubscribed or dropped. Events published after this call returns are delivered.
    pub fn subscribe<F>(&self, table: Table, callback: F) -> SubscriptionHandle
    where
        F: Fn(ChangeEvent) + Send + 'static,
    {
        let mut rx = self.tx.subscribe();
        let token = CancellationToken::new();
        let task_token = token.clone();

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = task_token.cancelled() => break,
                    msg = rx.recv() => match msg {
                        Ok(event) if event.table == table => callback(event),
                        Ok(_) => {}
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::warn!(%table, skipped, "change subscriber lagged; events dropped");
                        }
                        Err(RecvError::Closed) => break,
                    },
                }
            }
            tracing::debug!(%table, "change subscription ended");
        });

        SubscriptionHandle {
            table,
            token,
            task: Some(task),
        }
    }
}

/// Owns one subscription task. `unsubscribe` waits for the task to stop; dropping the
/// handle only signals it.
#[derive(Debug)]
pub struct SubscriptionHandle {
    table: Table,
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl SubscriptionHandle {
    pub fn table(&self) -> Table {
        self.table
    }

    pub fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    pub async fn unsubscribe(mut self) {
        self.token.cancel();
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                tracing::warn!(table = %self.table, error = %err, "change subscription task failed");
            }
        }
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
