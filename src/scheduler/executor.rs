use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::time::MissedTickBehavior;

/// The work run on every period.
pub type Job = Box<dyn FnMut() + Send + 'static>;

/// Handle to a scheduled periodic job.
pub trait TaskHandle: Send {
    fn cancel(&self);
    fn is_cancelled(&self) -> bool;
    fn is_finished(&self) -> bool;
}

/// Runs a job at a fixed rate after an initial delay.
pub trait FixedRateExecutor: Send + Sync {
    type Handle: TaskHandle;

    fn schedule(&self, initial_delay: Duration, period: Duration, job: Job) -> Self::Handle;
}

/// Drives jobs from a tokio runtime. Each run happens on the blocking pool and the next one is
/// not started before it returns; late runs fire back-to-back to keep the rate.
#[derive(Debug, Clone)]
pub struct TokioExecutor {
    runtime: tokio::runtime::Handle,
}

impl TokioExecutor {
    pub fn new(runtime: tokio::runtime::Handle) -> Self {
        Self { runtime }
    }

    /// Uses the runtime of the calling task.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn current() -> Self {
        Self::new(tokio::runtime::Handle::current())
    }
}

#[derive(Debug)]
pub struct TokioTaskHandle {
    task: tokio::task::JoinHandle<()>,
    cancelled: AtomicBool,
}

impl TaskHandle for TokioTaskHandle {
    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.task.abort();
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl FixedRateExecutor for TokioExecutor {
    type Handle = TokioTaskHandle;

    fn schedule(&self, initial_delay: Duration, period: Duration, job: Job) -> TokioTaskHandle {
        let task = self.runtime.spawn(async move {
            let start = tokio::time::Instant::now() + initial_delay;
            let mut interval = tokio::time::interval_at(start, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Burst);

            let mut job = job;
            loop {
                interval.tick().await;
                let before = std::time::Instant::now();
                match tokio::task::spawn_blocking(move || {
                    job();
                    job
                })
                .await
                {
                    Ok(returned) => job = returned,
                    Err(err) => {
                        log::error!("Periodic job aborted, stopping schedule: {err}");
                        break;
                    }
                }
                log::trace!("Periodic job took {} ms", before.elapsed().as_millis());
            }
        });

        TokioTaskHandle {
            task,
            cancelled: AtomicBool::new(false),
        }
    }
}
