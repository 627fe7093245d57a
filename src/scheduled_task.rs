use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rocket::tokio::{self, sync::Notify, task::JoinHandle, time::Duration};

/// A task scheduled for a specific point in the future. It executes
/// automatically at that point, or can be aborted.
pub struct ScheduledTask {
    task_handle: JoinHandle<()>,
    wait_handle: JoinHandle<()>,
}

impl ScheduledTask {
    /// Schedule `task` to run at `run_at`. A time in the past runs it
    /// immediately.
    pub fn new<Fut>(task: Fut, run_at: DateTime<Utc>) -> Self
    where
        Fut: Future<Output = ()> + Send + 'static,
    {
        let signal = Arc::new(Notify::new());

        // The task itself waits on the signal...
        let task_signal = signal.clone();
        let task_handle = tokio::spawn(async move {
            task_signal.notified().await;
            task.await;
        });

        // ...and a second task gives the signal at the right time.
        let sleep_duration = duration_until(run_at);
        let wait_signal = signal.clone();
        let wait_handle = tokio::spawn(async move {
            tokio::time::sleep(sleep_duration).await;
            wait_signal.notify_one();
        });

        Self {
            task_handle,
            wait_handle,
        }
    }

    /// Abort the task; it will not run unless it had already started.
    pub fn abort(self) {
        self.wait_handle.abort();
        self.task_handle.abort();
    }
}

/// Duration from now until `datetime`, saturating to zero for the past.
fn duration_until(datetime: DateTime<Utc>) -> Duration {
    let millis = datetime.timestamp_millis() - Utc::now().timestamp_millis();
    Duration::from_millis(u64::try_from(millis).unwrap_or(0))
}
