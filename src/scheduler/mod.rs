//! Lifecycle of the periodic sampling task.
//!
//! A [`MonitorScheduler`] detects the runtime environment once per
//! [`start`](MonitorScheduler::start), binds the matching sampler and hands a [`Tick`] to a
//! [`FixedRateExecutor`]. Everything it talks to is a trait object so tests can substitute
//! each collaborator. Tick failures are counted per scheduler, across restarts.
mod collaborators;
mod executor;
mod sink;
mod tick;

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

pub use collaborators::{EnabledFlag, IdentitySource, MonitorSwitch, StaticIdentity};
pub use executor::{FixedRateExecutor, Job, TaskHandle, TokioExecutor, TokioTaskHandle};
pub use sink::{FileSink, RecordSink, StdoutSink};
pub use tick::{FailureLog, MAX_LOGGED_FAILURES, Tick, TickOutcome};

use crate::environment;
use crate::sampler::SamplerFactory;

pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(5);
pub const DEFAULT_PERIOD: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct Schedule {
    pub initial_delay: Duration,
    pub period: Duration,
    /// Control-group descriptor inspected to tell host from container.
    pub cgroup_file: PathBuf,
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            initial_delay: DEFAULT_INITIAL_DELAY,
            period: DEFAULT_PERIOD,
            cgroup_file: PathBuf::from("/proc/1/cgroup"),
        }
    }
}

pub struct MonitorScheduler<E: FixedRateExecutor> {
    schedule: Schedule,
    samplers: Box<dyn SamplerFactory>,
    sink: Arc<dyn RecordSink>,
    switch: Arc<dyn MonitorSwitch>,
    identity: Arc<dyn IdentitySource>,
    executor: E,
    task: Mutex<Option<E::Handle>>,
    failures: Arc<FailureLog>,
}

impl<E: FixedRateExecutor> MonitorScheduler<E> {
    pub fn new(
        schedule: Schedule,
        samplers: Box<dyn SamplerFactory>,
        sink: Arc<dyn RecordSink>,
        switch: Arc<dyn MonitorSwitch>,
        identity: Arc<dyn IdentitySource>,
        executor: E,
    ) -> Self {
        Self {
            schedule,
            samplers,
            sink,
            switch,
            identity,
            executor,
            task: Mutex::new(None),
            failures: Arc::default(),
        }
    }

    /// Starts periodic sampling. Returns `false` without side effects if a task is already
    /// running.
    pub fn start(&self) -> bool {
        let mut task = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        if task.as_ref().is_some_and(is_active) {
            log::warn!("Resource monitor already running, ignoring start");
            return false;
        }

        let environment = environment::detect_runtime_environment(&self.schedule.cgroup_file);
        log::info!("Starting resource monitor in {environment:?} mode");

        let mut tick = Tick::new(
            self.samplers.build(environment),
            Arc::clone(&self.sink),
            Arc::clone(&self.switch),
            Arc::clone(&self.identity),
            Arc::clone(&self.failures),
        );
        let handle = self.executor.schedule(
            self.schedule.initial_delay,
            self.schedule.period,
            Box::new(move || {
                tick.run();
            }),
        );
        *task = Some(handle);
        true
    }

    /// Cancels the periodic task, if any. Safe to call before `start` and more than once.
    pub fn stop(&self) {
        let mut task = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = task.take() {
            if is_active(&handle) {
                handle.cancel();
                log::info!("Resource monitor stopped");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(is_active)
    }
}

fn is_active<H: TaskHandle>(handle: &H) -> bool {
    !handle.is_cancelled() && !handle.is_finished()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::RuntimeEnvironment;
    use crate::sampler::Sampler;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Clone, Default)]
    struct ManualHandle {
        cancelled: Arc<AtomicBool>,
    }

    impl TaskHandle for ManualHandle {
        fn cancel(&self) {
            self.cancelled.store(true, Ordering::SeqCst);
        }

        fn is_cancelled(&self) -> bool {
            self.cancelled.load(Ordering::SeqCst)
        }

        fn is_finished(&self) -> bool {
            false
        }
    }

    /// Records scheduled jobs so the test can run them by hand.
    #[derive(Default)]
    struct ManualExecutor {
        jobs: Mutex<Vec<(Duration, Duration, Job)>>,
        handles: Mutex<Vec<ManualHandle>>,
    }

    impl FixedRateExecutor for ManualExecutor {
        type Handle = ManualHandle;

        fn schedule(&self, initial_delay: Duration, period: Duration, job: Job) -> ManualHandle {
            let handle = ManualHandle::default();
            self.jobs.lock().unwrap().push((initial_delay, period, job));
            self.handles.lock().unwrap().push(handle.clone());
            handle
        }
    }

    struct CountingFactory {
        built: Arc<AtomicUsize>,
    }

    impl SamplerFactory for CountingFactory {
        fn build(&self, environment: RuntimeEnvironment) -> Box<dyn Sampler> {
            assert_eq!(environment, RuntimeEnvironment::Host);
            self.built.fetch_add(1, Ordering::SeqCst);
            Box::new(tick::tests::FixedSampler)
        }
    }

    fn scheduler() -> (
        MonitorScheduler<ManualExecutor>,
        Arc<tick::tests::MemorySink>,
        Arc<AtomicUsize>,
    ) {
        let sink = Arc::new(tick::tests::MemorySink::default());
        let built = Arc::new(AtomicUsize::new(0));
        let schedule = Schedule {
            cgroup_file: PathBuf::from("/definitely/does/not/exist"),
            ..Default::default()
        };
        let scheduler = MonitorScheduler::new(
            schedule,
            Box::new(CountingFactory {
                built: Arc::clone(&built),
            }),
            sink.clone(),
            Arc::new(EnabledFlag::new(true)),
            Arc::new(StaticIdentity::default()),
            ManualExecutor::default(),
        );
        (scheduler, sink, built)
    }

    #[test]
    fn test_start_schedules_with_defaults() {
        let (scheduler, sink, built) = scheduler();
        assert!(scheduler.start());
        assert!(scheduler.is_running());
        assert_eq!(built.load(Ordering::SeqCst), 1);

        let mut jobs = scheduler.executor.jobs.lock().unwrap();
        assert_eq!(jobs.len(), 1);
        let (delay, period, job) = &mut jobs[0];
        assert_eq!(*delay, Duration::from_secs(5));
        assert_eq!(*period, Duration::from_secs(1));

        job();
        job();
        assert_eq!(sink.0.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_second_start_is_rejected() {
        let (scheduler, _, built) = scheduler();
        assert!(scheduler.start());
        assert!(!scheduler.start());
        assert_eq!(built.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.executor.jobs.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_stop_before_start_and_twice() {
        let (scheduler, _, _) = scheduler();
        scheduler.stop();
        assert!(!scheduler.is_running());

        assert!(scheduler.start());
        scheduler.stop();
        scheduler.stop();
        assert!(!scheduler.is_running());
        let handles = scheduler.executor.handles.lock().unwrap();
        assert!(handles[0].is_cancelled());
    }

    struct FailingFactory;

    impl SamplerFactory for FailingFactory {
        fn build(&self, _environment: RuntimeEnvironment) -> Box<dyn Sampler> {
            Box::new(tick::tests::FailingSampler)
        }
    }

    #[test]
    fn test_failure_log_budget_survives_restart() {
        crate::testlog::capture();
        let schedule = Schedule {
            cgroup_file: PathBuf::from("/definitely/does/not/exist"),
            ..Default::default()
        };
        let scheduler = MonitorScheduler::new(
            schedule,
            Box::new(FailingFactory),
            Arc::new(tick::tests::MemorySink::default()),
            Arc::new(EnabledFlag::new(true)),
            Arc::new(StaticIdentity::default()),
            ManualExecutor::default(),
        );

        assert!(scheduler.start());
        {
            let mut jobs = scheduler.executor.jobs.lock().unwrap();
            for _ in 0..3 {
                (jobs[0].2)();
            }
        }
        scheduler.stop();
        assert!(scheduler.start());
        {
            let mut jobs = scheduler.executor.jobs.lock().unwrap();
            assert_eq!(jobs.len(), 2);
            for _ in 0..3 {
                (jobs[1].2)();
            }
        }

        assert_eq!(
            crate::testlog::count(log::Level::Error, "Resource sampling failed"),
            2
        );
        assert_eq!(scheduler.failures.count(), 6);
    }

    #[test]
    fn test_restart_after_stop() {
        let (scheduler, _, built) = scheduler();
        assert!(scheduler.start());
        scheduler.stop();
        assert!(scheduler.start());
        assert!(scheduler.is_running());
        assert_eq!(built.load(Ordering::SeqCst), 2);
    }
}
