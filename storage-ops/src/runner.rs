// SPDX-License-Identifier: GPL-3.0-only

//! Applies the queued operations to the devices, one after another
//!
//! The stack's write lock is held only while a single operation runs, so readers
//! can look at the preview between operations. Holding the suspend mutex from
//! another thread pauses the runner before its next operation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use serde::{Deserialize, Serialize};
use storage_contracts::{CoreBackend, FileSystemTools, Report};
use tracing::{error, info, warn};

use crate::jobs::{JobContext, JobProgress};
use crate::operations::{Operation, OperationStatus};
use crate::stack::OperationStack;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunnerEvent {
    OpStarted { index: usize, description: String },
    OpFinished { index: usize, status: OperationStatus },
    Progress { index: usize, job: String, percent: u8 },
    /// Every operation succeeded
    Finished,
    /// Stopped on request before all operations ran
    Cancelled,
    /// An operation failed; later operations were not run
    Error,
}

pub struct OperationRunner {
    stack: Arc<OperationStack>,
    backend: Arc<dyn CoreBackend>,
    tools: Arc<dyn FileSystemTools>,
    cancel: Arc<AtomicBool>,
    suspend: Arc<Mutex<()>>,
}

impl OperationRunner {
    pub fn new(
        stack: Arc<OperationStack>,
        backend: Arc<dyn CoreBackend>,
        tools: Arc<dyn FileSystemTools>,
    ) -> Self {
        Self {
            stack,
            backend,
            tools,
            cancel: Arc::new(AtomicBool::new(false)),
            suspend: Arc::new(Mutex::new(())),
        }
    }

    pub fn cancel_switch(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn suspend_mutex(&self) -> Arc<Mutex<()>> {
        Arc::clone(&self.suspend)
    }

    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelling(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Run every pending operation on the calling thread
    ///
    /// Exactly one of `Finished`, `Cancelled` or `Error` is sent last.
    pub fn run(&self, events: &Sender<RunnerEvent>) -> Report {
        let mut root = Report::new("Apply pending operations");
        let count = self.stack.len();
        info!(operations = count, "applying pending operations");

        let mut failed = false;
        let mut cancelled = false;
        for index in 0..count {
            drop(lock_ignoring_poison(&self.suspend));
            if self.is_cancelling() {
                cancelled = true;
                break;
            }

            // Held for the whole operation: jobs edit the preview as they go and
            // readers must only ever see it between operations.
            let mut guard = self.stack.write();
            let (operations, devices) = guard.split_mut();
            let Some(operation) = operations.get_mut(index) else {
                break;
            };
            let operation = operation.as_operation_mut();
            let description = operation.description();
            match operation.status() {
                status if status.succeeded() => continue,
                OperationStatus::Error => {
                    root.line(format!("Operation failed in an earlier run: {description}"));
                    error!(operation = %description, "operation failed in an earlier run, stopping");
                    failed = true;
                    break;
                }
                _ => {}
            }

            operation.set_status(OperationStatus::Running);
            send(events, RunnerEvent::OpStarted {
                index,
                description: description.clone(),
            });

            let mut forward = |progress: JobProgress| {
                send(events, RunnerEvent::Progress {
                    index,
                    job: progress.job,
                    percent: progress.percent,
                });
            };
            let mut ctx = JobContext::new(
                self.backend.as_ref(),
                self.tools.as_ref(),
                devices,
                self.stack.config(),
                &mut forward,
            );
            let ok = operation.execute(&mut ctx, &mut root);
            let status = operation.status();
            drop(guard);

            send(events, RunnerEvent::OpFinished { index, status });
            if !ok {
                error!(operation = %description, "operation failed, stopping");
                failed = true;
                break;
            }
        }

        let last = if failed {
            root.set_status("Error");
            RunnerEvent::Error
        } else if cancelled {
            root.set_status("Cancelled");
            warn!("applying operations cancelled");
            RunnerEvent::Cancelled
        } else {
            root.set_status("Success");
            info!("all operations applied");
            RunnerEvent::Finished
        };
        send(events, last);
        root
    }

    /// Run on a dedicated thread
    pub fn spawn(self) -> RunnerHandle {
        let (sender, receiver) = mpsc::channel();
        let cancel = self.cancel_switch();
        let suspend = self.suspend_mutex();
        let thread = thread::spawn(move || self.run(&sender));
        RunnerHandle {
            events: receiver,
            cancel,
            suspend,
            thread,
        }
    }
}

fn send(events: &Sender<RunnerEvent>, event: RunnerEvent) {
    // The receiver may be gone; the run still completes and returns its report
    let _ = events.send(event);
}

fn lock_ignoring_poison(mutex: &Mutex<()>) -> MutexGuard<'_, ()> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A runner working on its own thread
pub struct RunnerHandle {
    events: Receiver<RunnerEvent>,
    cancel: Arc<AtomicBool>,
    suspend: Arc<Mutex<()>>,
    thread: JoinHandle<Report>,
}

impl RunnerHandle {
    pub fn events(&self) -> &Receiver<RunnerEvent> {
        &self.events
    }

    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    /// Keeps the runner from starting another operation while held
    pub fn suspend(&self) -> MutexGuard<'_, ()> {
        lock_ignoring_poison(&self.suspend)
    }

    /// Wait for the runner; `None` if its thread panicked
    pub fn join(self) -> Option<Report> {
        self.thread.join().ok()
    }
}
