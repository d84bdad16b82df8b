//! Runs one filter at a time on a background thread.
//!
//! The caller starts a run, then polls ([`FilterWorker::try_recv`]) or
//! blocks ([`FilterWorker::recv`], [`FilterWorker::wait`]) for
//! [`WorkerEvent`]s. Every event carries the generation of the run that
//! produced it. Starting a second run before the first one's
//! [`WorkerEvent::Finished`] has been received is rejected with
//! [`EngineError::WorkerBusy`].

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread::{self, JoinHandle};

use tracing::{debug, trace, warn};

use crate::diagnostics::{Clock, RunDiagnostics, SystemClock, run_with_diagnostics};
use crate::filter::BoxedFilter;
use crate::progress::{CancellationToken, Reporter};
use crate::types::{EngineError, PixelBuffer};

/// Message from a running filter.
#[derive(Debug)]
pub enum WorkerEvent {
    /// The filter reached `percent`.
    Progress {
        /// Run that reported.
        generation: u64,
        /// Progress in `[0, 100]`.
        percent: u8,
    },
    /// The run ended. Always the last event of a run.
    Finished {
        /// Run that ended.
        generation: u64,
        /// The new image, or `None` if the run was cancelled.
        result: Option<PixelBuffer>,
        /// Timing and outcome.
        diagnostics: RunDiagnostics,
    },
}

impl WorkerEvent {
    /// Generation of the run that sent this event.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        match self {
            Self::Progress { generation, .. } | Self::Finished { generation, .. } => *generation,
        }
    }
}

/// The run currently owned by a [`FilterWorker`].
struct InFlight {
    generation: u64,
    cancel: CancellationToken,
    events: Receiver<WorkerEvent>,
    handle: Option<JoinHandle<()>>,
}

/// Handle to a background filter thread.
pub struct FilterWorker<C = SystemClock> {
    clock: C,
    generation: u64,
    in_flight: Option<InFlight>,
}

impl FilterWorker {
    /// A worker timed by [`SystemClock`].
    #[must_use]
    pub const fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for FilterWorker {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> FilterWorker<C>
where
    C: Clock + Clone + Send + 'static,
{
    /// A worker timed by `clock`.
    pub const fn with_clock(clock: C) -> Self {
        Self {
            clock,
            generation: 0,
            in_flight: None,
        }
    }

    /// Generation of the most recently started run (0 before any run).
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether a run has started and its `Finished` event has not yet been
    /// received.
    #[must_use]
    pub const fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Start `filter` on `source` in a new thread.
    ///
    /// Returns the generation assigned to the run.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::WorkerBusy`] if a run is outstanding, or
    /// [`EngineError::WorkerDisconnected`] if the thread cannot be spawned.
    pub fn start(
        &mut self,
        mut filter: BoxedFilter,
        source: Arc<PixelBuffer>,
    ) -> Result<u64, EngineError> {
        if self.in_flight.is_some() {
            return Err(EngineError::WorkerBusy);
        }
        let generation = self.generation + 1;
        let cancel = CancellationToken::new();
        let (tx, rx) = mpsc::channel();
        let clock = self.clock.clone();
        let token = cancel.clone();
        debug!(generation, filter = filter.name(), "starting worker run");

        let handle = thread::Builder::new()
            .name(format!("pixfx-worker-{generation}"))
            .spawn(move || {
                let progress_tx = tx.clone();
                let publish = move |percent| {
                    let event = WorkerEvent::Progress {
                        generation,
                        percent,
                    };
                    if progress_tx.send(event).is_err() {
                        trace!(generation, "progress receiver dropped");
                    }
                };
                let mut reporter = Reporter::new().with_cancel(token).with_callback(publish);
                let (result, diagnostics) =
                    run_with_diagnostics(filter.as_mut(), &source, &mut reporter, &clock);
                if tx
                    .send(WorkerEvent::Finished {
                        generation,
                        result,
                        diagnostics,
                    })
                    .is_err()
                {
                    trace!(generation, "result receiver dropped");
                }
            })
            .map_err(|err| {
                warn!(%err, "failed to spawn filter worker");
                EngineError::WorkerDisconnected
            })?;

        self.generation = generation;
        self.in_flight = Some(InFlight {
            generation,
            cancel,
            events: rx,
            handle: Some(handle),
        });
        Ok(generation)
    }

    /// Ask the current run to stop at its next check point.
    ///
    /// The run still ends with a `Finished` event, carrying no result.
    pub fn cancel(&self) {
        if let Some(run) = &self.in_flight {
            debug!(generation = run.generation, "cancelling worker run");
            run.cancel.cancel();
        }
    }

    /// Next pending event without blocking.
    ///
    /// `Ok(None)` when nothing is pending or no run is in flight.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::WorkerDisconnected`] if the thread exited
    /// without sending `Finished`.
    pub fn try_recv(&mut self) -> Result<Option<WorkerEvent>, EngineError> {
        let Some(run) = &self.in_flight else {
            return Ok(None);
        };
        match run.events.try_recv() {
            Ok(event) => Ok(Some(self.observe(event))),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(self.disconnected()),
        }
    }

    /// Block until the next event.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::WorkerIdle`] if no run is in flight, or
    /// [`EngineError::WorkerDisconnected`] if the thread exited without
    /// sending `Finished`.
    pub fn recv(&mut self) -> Result<WorkerEvent, EngineError> {
        let Some(run) = &self.in_flight else {
            return Err(EngineError::WorkerIdle);
        };
        match run.events.recv() {
            Ok(event) => Ok(self.observe(event)),
            Err(_) => Err(self.disconnected()),
        }
    }

    /// Block until the current run finishes, passing every progress update
    /// to `on_progress`.
    ///
    /// # Errors
    ///
    /// As for [`recv`](Self::recv).
    pub fn wait(
        &mut self,
        mut on_progress: impl FnMut(u8),
    ) -> Result<(Option<PixelBuffer>, RunDiagnostics), EngineError> {
        loop {
            match self.recv()? {
                WorkerEvent::Progress { percent, .. } => on_progress(percent),
                WorkerEvent::Finished {
                    result,
                    diagnostics,
                    ..
                } => return Ok((result, diagnostics)),
            }
        }
    }

    /// Retire the run once its `Finished` event has been seen.
    fn observe(&mut self, event: WorkerEvent) -> WorkerEvent {
        if let WorkerEvent::Finished { generation, .. } = &event
            && self
                .in_flight
                .as_ref()
                .is_some_and(|run| run.generation == *generation)
        {
            self.retire();
        }
        event
    }

    fn disconnected(&mut self) -> EngineError {
        warn!(generation = self.generation, "filter worker disconnected");
        self.retire();
        EngineError::WorkerDisconnected
    }

    fn retire(&mut self) {
        if let Some(mut run) = self.in_flight.take()
            && let Some(handle) = run.handle.take()
            && handle.join().is_err()
        {
            warn!(generation = run.generation, "filter worker panicked");
        }
    }
}

impl<C> Drop for FilterWorker<C> {
    fn drop(&mut self) {
        if let Some(run) = &self.in_flight {
            run.cancel.cancel();
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::color::Invert;
    use crate::filter::Filter;
    use crate::progress::ProgressReporter;
    use crate::types::Pixel;

    fn source() -> Arc<PixelBuffer> {
        Arc::new(PixelBuffer::new(16, 8, Pixel::gray(40)).unwrap())
    }

    /// Blocks in its first progress check until cancelled.
    struct UntilCancelled;

    impl Filter for UntilCancelled {
        fn name(&self) -> &'static str {
            "until-cancelled"
        }

        fn run(
            &mut self,
            _source: &PixelBuffer,
            progress: &mut dyn ProgressReporter,
        ) -> Option<PixelBuffer> {
            progress.report(0);
            while !progress.is_cancelled() {
                thread::yield_now();
            }
            None
        }
    }

    #[test]
    fn completed_run_delivers_result() {
        let mut worker = FilterWorker::new();
        let generation = worker.start(Box::new(Invert), source()).unwrap();
        assert_eq!(generation, 1);
        assert!(worker.is_busy());
        let mut seen = Vec::new();
        let (result, diag) = worker.wait(|p| seen.push(p)).unwrap();
        assert_eq!(result.unwrap().get(0, 0), Some(Pixel::gray(215)));
        assert!(!diag.cancelled);
        assert_eq!(seen.len(), 16);
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert!(!worker.is_busy());
    }

    #[test]
    fn second_start_while_busy_is_rejected() {
        let mut worker = FilterWorker::new();
        worker.start(Box::new(UntilCancelled), source()).unwrap();
        assert_eq!(
            worker.start(Box::new(Invert), source()),
            Err(EngineError::WorkerBusy)
        );
        worker.cancel();
        let (result, diag) = worker.wait(|_| {}).unwrap();
        assert!(result.is_none());
        assert!(diag.cancelled);
        assert_eq!(worker.start(Box::new(Invert), source()), Ok(2));
        worker.wait(|_| {}).unwrap();
    }

    #[test]
    fn events_carry_generation() {
        let mut worker = FilterWorker::new();
        worker.start(Box::new(Invert), source()).unwrap();
        worker.wait(|_| {}).unwrap();
        let generation = worker.start(Box::new(Invert), source()).unwrap();
        loop {
            let event = worker.recv().unwrap();
            assert_eq!(event.generation(), generation);
            if matches!(event, WorkerEvent::Finished { .. }) {
                break;
            }
        }
    }

    #[test]
    fn idle_worker_reports_idle() {
        let mut worker = FilterWorker::new();
        assert_eq!(worker.recv().unwrap_err(), EngineError::WorkerIdle);
        assert!(worker.try_recv().unwrap().is_none());
        assert_eq!(worker.wait(|_| {}).unwrap_err(), EngineError::WorkerIdle);
    }

    #[test]
    fn cancel_without_run_is_noop() {
        let worker = FilterWorker::new();
        worker.cancel();
        assert!(!worker.is_busy());
        assert_eq!(worker.generation(), 0);
    }
}
