use core::fmt;
use std::{
    sync::Arc,
    thread::{self, JoinHandle},
};

use tracing::{error, trace};

use crate::{
    backoff,
    config::Config,
    error::{Error, Result},
    event::{Event, EventSink},
    interrupt::Interrupt,
    multi::{AcquireStats, MultiLockAcquirer},
    rwlock::ResourceLock,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Reader,
    Writer,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Reader => f.write_str("Reader"),
            Role::Writer => f.write_str("Writer"),
        }
    }
}

/// Where a worker is within one operation cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    AcquiringBoth,
    Working,
    ReleasingBoth,
    Done,
}

/// A reader or writer that repeatedly locks two resources in its own order.
///
/// Nothing coordinates the order across workers: giving two workers the same pair
/// in opposite orders is exactly how the deadlock hazard is provoked.
#[derive(Clone)]
pub struct Worker {
    role: Role,
    first: Arc<ResourceLock>,
    second: Arc<ResourceLock>,
    label: String,
    config: Config,
}

impl Worker {
    pub fn new(
        role: Role,
        first: Arc<ResourceLock>,
        second: Arc<ResourceLock>,
        name: impl fmt::Display,
    ) -> Self {
        Self {
            role,
            first,
            second,
            label: format!("{role}-{name}"),
            config: Config::default(),
        }
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// `Reader-<name>` or `Writer-<name>`.
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl fmt::Debug for Worker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Worker")
            .field("label", &self.label)
            .field("first", &self.first.id())
            .field("second", &self.second.id())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerReport {
    pub label: String,
    pub role: Role,
    pub operations: usize,
    pub stats: AcquireStats,
}

/// Run `worker` to completion on the current thread.
///
/// Each cycle idles, acquires both resources, reads or writes them, and releases
/// them. The only error is an interrupt observed during a timed wait, which ends
/// the run.
pub fn run(worker: Worker, sink: &dyn EventSink) -> Result<WorkerReport> {
    let Worker {
        role,
        first,
        second,
        label,
        config,
    } = worker;

    let mut acquirer = MultiLockAcquirer::new(&first, &second, &label, sink, config.backoff_unit);
    let mut phase = Phase::Idle;

    for operation in 0..config.operation_count {
        enter(&label, &mut phase, Phase::Idle);
        thread::sleep(backoff::idle(config.average_sleep));

        enter(&label, &mut phase, Phase::AcquiringBoth);
        match role {
            Role::Reader => {
                let (a, b) = acquirer.read_lock_all()?;

                enter(&label, &mut phase, Phase::Working);
                sink.record(Event::Snapshot {
                    worker: label.clone(),
                    first: a.describe(),
                    second: b.describe(),
                });

                enter(&label, &mut phase, Phase::ReleasingBoth);
                a.unlock();
                b.unlock();
            }
            Role::Writer => {
                let (mut a, mut b) = acquirer.write_lock_all()?;

                enter(&label, &mut phase, Phase::Working);
                a.perform_write();
                b.perform_write();

                enter(&label, &mut phase, Phase::ReleasingBoth);
                a.unlock();
                b.unlock();
            }
        }

        sink.record(Event::OperationComplete {
            worker: label.clone(),
            operation,
        });
    }

    enter(&label, &mut phase, Phase::Done);
    sink.record(Event::WorkerDone {
        worker: label.clone(),
    });

    Ok(WorkerReport {
        stats: acquirer.stats(),
        label,
        role,
        operations: config.operation_count,
    })
}

fn enter(label: &str, phase: &mut Phase, next: Phase) {
    trace!(worker = label, from = ?*phase, to = ?next, "phase");
    *phase = next;
}

/// Run `worker` on its own named OS thread.
///
/// The returned handle can interrupt the thread; the interrupt is observed at the
/// worker's next timed wait.
pub fn spawn(worker: Worker, sink: Arc<dyn EventSink>) -> Result<WorkerHandle> {
    let label = worker.label.clone();
    let interrupt = Interrupt::new();

    let thread = {
        let interrupt = interrupt.clone();
        let label = label.clone();
        thread::Builder::new().name(label.clone()).spawn(move || {
            let _guard = interrupt.install();
            run(worker, &*sink)
                .inspect_err(|e| error!(worker = %label, error = %e, "worker aborted"))
        })?
    };

    Ok(WorkerHandle {
        label,
        interrupt,
        thread,
    })
}

pub struct WorkerHandle {
    label: String,
    interrupt: Interrupt,
    thread: JoinHandle<Result<WorkerReport>>,
}

impl WorkerHandle {
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Deliver an interrupt to the worker thread.
    pub fn interrupt(&self) {
        self.interrupt.interrupt();
    }

    pub fn join(self) -> Result<WorkerReport> {
        let WorkerHandle { label, thread, .. } = self;
        thread.join().map_err(|_| Error::WorkerPanicked(label))?
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;
    use crate::event::Recorder;
    use core::time::Duration;

    fn fast(operations: usize) -> Config {
        Config {
            operation_count: operations,
            average_sleep: Duration::from_millis(1),
            wait_time_unit: Duration::from_micros(200),
            backoff_unit: Duration::from_millis(1),
            payload_len: 4,
        }
    }

    fn pair(config: &Config) -> (Arc<ResourceLock>, Arc<ResourceLock>) {
        (
            Arc::new(ResourceLock::from_config(config)),
            Arc::new(ResourceLock::from_config(config)),
        )
    }

    #[test]
    fn labels() {
        let (a, b) = pair(&fast(1));
        assert_eq!(Worker::new(Role::Reader, a.clone(), b.clone(), 1).label(), "Reader-1");
        assert_eq!(Worker::new(Role::Writer, b, a, "2").label(), "Writer-2");
    }

    #[test]
    fn writer_cycles() {
        let config = fast(3);
        let (a, b) = pair(&config);
        let recorder = Recorder::new();

        let report = run(
            Worker::new(Role::Writer, a.clone(), b.clone(), 1).with_config(config),
            &recorder,
        )
        .unwrap();

        assert_eq!(report.operations, 3);
        assert_eq!(report.stats, AcquireStats::default());
        assert_eq!(a.values(), vec![3; 4]);
        assert_eq!(b.values(), vec![3; 4]);

        let events = recorder.of("Writer-1");
        assert_eq!(
            events.last(),
            Some(&Event::WorkerDone {
                worker: "Writer-1".into()
            })
        );
        let completed: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                Event::OperationComplete { operation, .. } => Some(*operation),
                _ => None,
            })
            .collect();
        assert_eq!(completed, vec![0, 1, 2]);
    }

    #[test]
    fn reader_snapshots_both() {
        let config = fast(2);
        let (a, b) = pair(&config);
        let recorder = Recorder::new();

        run(
            Worker::new(Role::Reader, b.clone(), a.clone(), 7).with_config(config),
            &recorder,
        )
        .unwrap();

        let snapshots: Vec<_> = recorder
            .events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Snapshot { first, second, .. } => Some((first, second)),
                _ => None,
            })
            .collect();
        assert_eq!(snapshots.len(), 2);
        for (first, second) in snapshots {
            assert_eq!(first.id, b.id());
            assert_eq!(second.id, a.id());
            assert_eq!(first.readers, 1);
            assert!(first.same && second.same);
        }
        assert_eq!(a.reader_count(), 0);
    }

    #[test]
    fn zero_operations_finishes_immediately() {
        let config = fast(0);
        let (a, b) = pair(&config);
        let recorder = Recorder::new();

        let report = run(Worker::new(Role::Writer, a, b, 1).with_config(config), &recorder).unwrap();
        assert_eq!(report.operations, 0);
        assert_eq!(
            recorder.events(),
            vec![Event::WorkerDone {
                worker: "Writer-1".into()
            }]
        );
    }
}
