use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use super::{IdentitySource, MonitorSwitch, RecordSink};
use crate::error::{Error, Result};
use crate::sampler::{RecordHeader, Sampler, format_record};

/// Tick failures logged at error level over a scheduler's lifetime; later ones are dropped.
pub const MAX_LOGGED_FAILURES: u32 = 2;

/// Tick failures seen by one scheduler, shared by every task it starts.
#[derive(Debug, Default)]
pub struct FailureLog {
    count: AtomicU32,
}

impl FailureLog {
    /// Counts one failure and reports whether it still falls within [`MAX_LOGGED_FAILURES`].
    pub fn record(&self) -> bool {
        let previous = self
            .count
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| {
                Some(n.saturating_add(1))
            })
            .unwrap_or_else(|n| n);
        previous < MAX_LOGGED_FAILURES
    }

    pub fn count(&self) -> u32 {
        self.count.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Monitoring was switched off.
    Skipped,
    Emitted,
    Failed { logged: bool },
}

/// One sample-format-emit cycle, together with the state carried between cycles.
pub struct Tick {
    sampler: Box<dyn Sampler>,
    sink: Arc<dyn RecordSink>,
    switch: Arc<dyn MonitorSwitch>,
    identity: Arc<dyn IdentitySource>,
    failures: Arc<FailureLog>,
}

impl Tick {
    pub fn new(
        sampler: Box<dyn Sampler>,
        sink: Arc<dyn RecordSink>,
        switch: Arc<dyn MonitorSwitch>,
        identity: Arc<dyn IdentitySource>,
        failures: Arc<FailureLog>,
    ) -> Self {
        Self {
            sampler,
            sink,
            switch,
            identity,
            failures,
        }
    }

    /// Runs one cycle. Never panics and never returns an error: failures, including panics in
    /// the sampler, are counted in the shared [`FailureLog`] and turned into
    /// [`TickOutcome::Failed`].
    pub fn run(&mut self) -> TickOutcome {
        if !self.switch.is_monitor_enabled() {
            log::trace!("Monitoring disabled, skipping tick");
            return TickOutcome::Skipped;
        }

        let started = Instant::now();
        let result = panic::catch_unwind(AssertUnwindSafe(|| self.sample_and_emit()))
            .unwrap_or_else(|payload| Err(Error::Panicked(panic_message(payload.as_ref()))));

        match result {
            Ok(()) => {
                log::trace!("Tick emitted in {} ms", started.elapsed().as_millis());
                TickOutcome::Emitted
            }
            Err(err) => {
                let logged = self.failures.record();
                if logged {
                    log::error!("Resource sampling failed: {err}");
                } else {
                    log::trace!("Resource sampling failed: {err}");
                }
                TickOutcome::Failed { logged }
            }
        }
    }

    fn sample_and_emit(&mut self) -> Result<()> {
        let header = RecordHeader {
            identity: self.identity.identity(),
            timestamp_secs: SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs(),
        };
        let snapshot = self.sampler.sample(header)?;
        self.sink.emit(&format_record(&snapshot));
        Ok(())
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::environment::RuntimeEnvironment;
    use crate::sampler::{FIELD_COUNT, Identity, MetricsSnapshot};
    use crate::scheduler::{EnabledFlag, StaticIdentity};
    use std::sync::Mutex;

    #[derive(Default)]
    pub(crate) struct MemorySink(pub Mutex<Vec<String>>);

    impl RecordSink for MemorySink {
        fn emit(&self, line: &str) {
            self.0.lock().unwrap().push(line.to_owned());
        }
    }

    pub(crate) struct FixedSampler;

    impl Sampler for FixedSampler {
        fn sample(&mut self, header: RecordHeader) -> Result<MetricsSnapshot> {
            let mut snap = MetricsSnapshot::new(header, RuntimeEnvironment::Host);
            snap.cpu_usage_percent = 25.0;
            Ok(snap)
        }
    }

    pub(crate) struct FailingSampler;

    impl Sampler for FailingSampler {
        fn sample(&mut self, _header: RecordHeader) -> Result<MetricsSnapshot> {
            Err(Error::ContainerStats(std::io::Error::other("cgroup gone")))
        }
    }

    struct PanickingSampler;

    impl Sampler for PanickingSampler {
        fn sample(&mut self, _header: RecordHeader) -> Result<MetricsSnapshot> {
            panic!("sampler exploded")
        }
    }

    fn tick(sampler: Box<dyn Sampler>, enabled: bool) -> (Tick, Arc<MemorySink>) {
        tick_sharing(sampler, enabled, Arc::default())
    }

    fn tick_sharing(
        sampler: Box<dyn Sampler>,
        enabled: bool,
        failures: Arc<FailureLog>,
    ) -> (Tick, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::default());
        let identity = StaticIdentity(Identity {
            app_name: "app".into(),
            ..Default::default()
        });
        let tick = Tick::new(
            sampler,
            sink.clone(),
            Arc::new(EnabledFlag::new(enabled)),
            Arc::new(identity),
            failures,
        );
        (tick, sink)
    }

    #[test]
    fn test_emits_one_record() {
        let (mut tick, sink) = tick(Box::new(FixedSampler), true);
        assert_eq!(tick.run(), TickOutcome::Emitted);

        let lines = sink.0.lock().unwrap();
        assert_eq!(lines.len(), 1);
        let fields: Vec<&str> = lines[0].trim_end().split('|').collect();
        assert_eq!(fields.len(), FIELD_COUNT);
        assert_eq!(fields[0], "app");
        assert!(fields[1].parse::<u64>().unwrap() > 0);
        assert_eq!(fields[6], "25.00");
    }

    #[test]
    fn test_disabled_switch_skips() {
        let (mut tick, sink) = tick(Box::new(FailingSampler), false);
        assert_eq!(tick.run(), TickOutcome::Skipped);
        assert!(sink.0.lock().unwrap().is_empty());
        assert_eq!(tick.failures.count(), 0);
    }

    #[test]
    fn test_only_first_two_failures_logged() {
        crate::testlog::capture();
        let (mut tick, sink) = tick(Box::new(FailingSampler), true);
        let outcomes: Vec<TickOutcome> = (0..5).map(|_| tick.run()).collect();

        assert_eq!(
            crate::testlog::count(log::Level::Error, "Resource sampling failed"),
            2
        );
        assert_eq!(
            crate::testlog::count(log::Level::Trace, "Resource sampling failed"),
            3
        );

        let logged = outcomes
            .iter()
            .filter(|o| matches!(o, TickOutcome::Failed { logged: true }))
            .count();
        assert_eq!(logged, 2);
        assert_eq!(outcomes[4], TickOutcome::Failed { logged: false });
        assert!(sink.0.lock().unwrap().is_empty());
    }

    #[test]
    fn test_failure_budget_is_shared_between_ticks() {
        let failures = Arc::new(FailureLog::default());
        let (mut first, _) = tick_sharing(Box::new(FailingSampler), true, Arc::clone(&failures));
        let (mut second, _) = tick_sharing(Box::new(FailingSampler), true, Arc::clone(&failures));

        assert_eq!(first.run(), TickOutcome::Failed { logged: true });
        assert_eq!(second.run(), TickOutcome::Failed { logged: true });
        assert_eq!(first.run(), TickOutcome::Failed { logged: false });
        assert_eq!(second.run(), TickOutcome::Failed { logged: false });
        assert_eq!(failures.count(), 4);
    }

    #[test]
    fn test_panic_is_contained() {
        let (mut tick, sink) = tick(Box::new(PanickingSampler), true);
        assert_eq!(tick.run(), TickOutcome::Failed { logged: true });
        assert!(sink.0.lock().unwrap().is_empty());
    }
}
