//! Background solving over message passing.
//!
//! A [`SolveWorker`] owns one thread. Requests go in as cube strings and come
//! back out as [`WorkerEvent`]s tagged with the same string. The thread owns
//! every cube, filter and search it touches; nothing is shared with the caller
//! except the cancellation flag handed out in [`WorkerEvent::Started`].
//!
//! Requests run strictly one at a time, in arrival order. Incoming messages
//! are only looked at between search slices.

use std::collections::VecDeque;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};
use log::{debug, error, info};
use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::cube::{CubeError, CubeState, SlotIssue};
use crate::filter::FilterCache;
use crate::solver::{CancelHandle, Search, SliceOutcome, Solution, SolverConfig, CANCELLED_NOTICE};

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("the solve worker has stopped")]
    Disconnected,
    #[error("the solve worker panicked")]
    Panicked,
    #[error("could not start the solve worker: {0}")]
    Spawn(#[from] std::io::Error),
    #[error(transparent)]
    Cube(#[from] CubeError),
}

#[derive(Debug)]
enum Request {
    Solve { key: String },
    Cancel { key: String },
    Shutdown,
}

/// Everything the worker reports. `key` is the cube string of the request.
#[derive(Clone, Debug)]
pub enum WorkerEvent {
    /// The search began. Cancelling `cancel` stops it at the next slice.
    Started { key: String, cancel: CancelHandle },
    Progress { key: String, status: String },
    Succeeded { key: String, solution: Solution },
    /// The cube cannot be solved; no search ran.
    Failed { key: String, errors: Vec<SlotIssue> },
    /// The request could not be read or searched.
    Rejected { key: String, reason: String },
}

impl WorkerEvent {
    pub fn key(&self) -> &str {
        match self {
            WorkerEvent::Started { key, .. }
            | WorkerEvent::Progress { key, .. }
            | WorkerEvent::Succeeded { key, .. }
            | WorkerEvent::Failed { key, .. }
            | WorkerEvent::Rejected { key, .. } => key,
        }
    }
}

/// Handle to a background solve thread. Dropping it stops the thread.
pub struct SolveWorker {
    requests: Sender<Request>,
    events: Receiver<WorkerEvent>,
    thread: Option<JoinHandle<()>>,
}

impl SolveWorker {
    pub fn spawn(config: SolverConfig) -> Result<Self, WorkerError> {
        let (request_tx, request_rx) = unbounded();
        let (event_tx, event_rx) = unbounded();
        let thread = thread::Builder::new()
            .name("cubesolve-worker".into())
            .spawn(move || Worker::new(config, event_tx).run(&request_rx))?;
        Ok(Self {
            requests: request_tx,
            events: event_rx,
            thread: Some(thread),
        })
    }

    /// Queues a cube string for solving. The string is also the request key.
    pub fn submit(&self, cube: &str) -> Result<(), WorkerError> {
        self.send(Request::Solve { key: cube.to_string() })
    }

    /// Queues cube `cube` of `state`, returning its key.
    pub fn submit_state(&self, state: &CubeState, cube: usize) -> Result<String, WorkerError> {
        let key = state.to_cube_string(cube)?;
        self.submit(&key)?;
        Ok(key)
    }

    /// Drops a queued request or stops the running one.
    pub fn cancel(&self, key: &str) -> Result<(), WorkerError> {
        self.send(Request::Cancel { key: key.to_string() })
    }

    pub fn events(&self) -> &Receiver<WorkerEvent> {
        &self.events
    }

    /// Stops the thread, abandoning anything queued, and waits for it.
    pub fn shutdown(mut self) -> Result<(), WorkerError> {
        self.stop()
    }

    fn send(&self, request: Request) -> Result<(), WorkerError> {
        self.requests.send(request).map_err(|_| WorkerError::Disconnected)
    }

    fn stop(&mut self) -> Result<(), WorkerError> {
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };
        // a finished thread has already dropped its receiver
        let _ = self.requests.send(Request::Shutdown);
        thread.join().map_err(|_| WorkerError::Panicked)
    }
}

impl Drop for SolveWorker {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            error!("{err}");
        }
    }
}

struct Running {
    key: String,
    search: Search,
}

/// State owned by the worker thread.
struct Worker {
    config: SolverConfig,
    cache: FilterCache,
    queue: VecDeque<String>,
    /// Cancellation flags of queued and running requests.
    registry: FxHashMap<String, CancelHandle>,
    running: Option<Running>,
    events: Sender<WorkerEvent>,
}

impl Worker {
    fn new(config: SolverConfig, events: Sender<WorkerEvent>) -> Self {
        Self {
            config,
            cache: FilterCache::new(),
            queue: VecDeque::new(),
            registry: FxHashMap::default(),
            running: None,
            events,
        }
    }

    fn run(mut self, requests: &Receiver<Request>) {
        info!("solve worker started");
        loop {
            let idle = self.running.is_none() && self.queue.is_empty();
            let request = if idle {
                match requests.recv() {
                    Ok(request) => Some(request),
                    Err(_) => break,
                }
            } else {
                match requests.try_recv() {
                    Ok(request) => Some(request),
                    Err(TryRecvError::Empty) => None,
                    Err(TryRecvError::Disconnected) => break,
                }
            };

            match request {
                Some(Request::Shutdown) => break,
                Some(request) => self.handle(request),
                None if self.running.is_some() => self.step(),
                None => self.start_next(),
            }
        }
        info!(
            "solve worker stopped with {} request(s) outstanding",
            self.queue.len() + usize::from(self.running.is_some())
        );
    }

    fn handle(&mut self, request: Request) {
        match request {
            Request::Solve { key } => {
                if self.registry.contains_key(&key) {
                    self.emit(WorkerEvent::Rejected {
                        key,
                        reason: "the same cube is already queued".into(),
                    });
                    return;
                }
                debug!("queued request {} behind {}", key, self.queue.len());
                self.registry.insert(key.clone(), CancelHandle::new());
                self.queue.push_back(key);
            }
            Request::Cancel { key } => {
                let Some(handle) = self.registry.remove(&key) else {
                    debug!("cancel for unknown request {key}");
                    return;
                };
                handle.cancel();
                let before = self.queue.len();
                self.queue.retain(|queued| *queued != key);
                if self.queue.len() < before {
                    self.emit(WorkerEvent::Progress {
                        key,
                        status: CANCELLED_NOTICE.into(),
                    });
                }
            }
            Request::Shutdown => {}
        }
    }

    fn start_next(&mut self) {
        let Some(key) = self.queue.pop_front() else {
            return;
        };
        match self.prepare(&key) {
            Ok(Prepared::Search(search)) => {
                let cancel = search.cancel_handle();
                self.registry.insert(key.clone(), cancel.clone());
                self.emit(WorkerEvent::Started {
                    key: key.clone(),
                    cancel,
                });
                self.running = Some(Running { key, search });
            }
            Ok(Prepared::Failed(errors)) => {
                self.registry.remove(&key);
                self.emit(WorkerEvent::Failed { key, errors });
            }
            Err(reason) => {
                self.registry.remove(&key);
                self.emit(WorkerEvent::Rejected { key, reason });
            }
        }
    }

    fn prepare(&mut self, key: &str) -> Result<Prepared, String> {
        let state = CubeState::from_cube_string(key).map_err(|err| err.to_string())?;
        let verification = state.verify(0).map_err(|err| err.to_string())?;
        if !verification.passed {
            return Ok(Prepared::Failed(verification.errors));
        }
        let search =
            Search::new(&state, 0, self.config.clone(), &mut self.cache).map_err(|err| err.to_string())?;
        Ok(Prepared::Search(search))
    }

    fn step(&mut self) {
        let Some(mut running) = self.running.take() else {
            return;
        };
        let key = running.key.clone();
        match running.search.run_slice() {
            Ok(SliceOutcome::Pending) => {
                let status = running.search.status();
                self.running = Some(running);
                self.emit(WorkerEvent::Progress { key, status });
            }
            Ok(SliceOutcome::Solved(solution)) => {
                self.registry.remove(&key);
                match solution.moves.moves_as_text(0) {
                    Ok(text) => self.emit(WorkerEvent::Progress {
                        key: key.clone(),
                        status: text,
                    }),
                    Err(err) => error!("could not render solution for {key}: {err}"),
                }
                self.emit(WorkerEvent::Succeeded { key, solution });
            }
            Ok(SliceOutcome::Cancelled) => {
                self.registry.remove(&key);
                self.emit(WorkerEvent::Progress {
                    key,
                    status: CANCELLED_NOTICE.into(),
                });
            }
            Err(err) => {
                self.registry.remove(&key);
                self.emit(WorkerEvent::Rejected {
                    key,
                    reason: err.to_string(),
                });
            }
        }
    }

    fn emit(&self, event: WorkerEvent) {
        if self.events.send(event).is_err() {
            debug!("event dropped: nobody is listening");
        }
    }
}

enum Prepared {
    Search(Search),
    Failed(Vec<SlotIssue>),
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::cube::Encoding;
    use crate::filter::Layout;
    use crate::geometry::Face;

    const WAIT: Duration = Duration::from_secs(60);

    fn scrambled_key(size: usize, moves: &[u32]) -> String {
        let mut cache = FilterCache::new();
        let mut state = CubeState::solved(size, Encoding::Surface).unwrap();
        cache
            .filter(size, Layout::Stickers, moves)
            .unwrap()
            .apply(&mut state, 0, 0)
            .unwrap();
        state.to_cube_string(0).unwrap()
    }

    /// Collects events until one matching `last` arrives.
    fn collect_until(worker: &SolveWorker, last: impl Fn(&WorkerEvent) -> bool) -> Vec<WorkerEvent> {
        let mut events = Vec::new();
        loop {
            let event = worker.events().recv_timeout(WAIT).unwrap();
            let done = last(&event);
            events.push(event);
            if done {
                return events;
            }
        }
    }

    #[test]
    fn test_solves_submitted_cube() {
        let worker = SolveWorker::spawn(SolverConfig::default()).unwrap();
        let key = scrambled_key(3, &[13, 15]);
        worker.submit(&key).unwrap();
        let events = collect_until(&worker, |e| matches!(e, WorkerEvent::Succeeded { .. }));

        assert!(matches!(&events[0], WorkerEvent::Started { .. }));
        assert!(events.iter().all(|e| e.key() == key));
        let Some(WorkerEvent::Succeeded { solution, .. }) = events.last() else {
            unreachable!();
        };
        assert_eq!(solution.moves.moves(0).unwrap(), vec![3, 1]);
        worker.shutdown().unwrap();
    }

    #[test]
    fn test_rejects_malformed_and_fails_unsolvable() {
        let worker = SolveWorker::spawn(SolverConfig::default()).unwrap();
        worker.submit("CBDTA:E:3:0").unwrap();
        let event = worker.events().recv_timeout(WAIT).unwrap();
        assert!(matches!(event, WorkerEvent::Rejected { ref key, .. } if key == "CBDTA:E:3:0"));

        let mut state = CubeState::solved(3, Encoding::Surface).unwrap();
        state.set_sticker(Face::Up, 1, 1, 0, 0).unwrap();
        let key = worker.submit_state(&state, 0).unwrap();
        match worker.events().recv_timeout(WAIT).unwrap() {
            WorkerEvent::Failed { key: failed, errors } => {
                assert_eq!(failed, key);
                assert!(!errors.is_empty());
            }
            other => panic!("expected a failure, got {other:?}"),
        }
    }

    #[test]
    fn test_undecodable_piece_is_failed_not_rejected() {
        let worker = SolveWorker::spawn(SolverConfig::default()).unwrap();
        let mut key = CubeState::solved(3, Encoding::Piece).unwrap().to_cube_string(0).unwrap();
        let centre = crate::geometry::piece_index((0, 1, 1), 3).unwrap();
        let data_start = "CBDTA:P:3:".len();
        key.replace_range(data_start + centre..data_start + centre + 1, "7");

        worker.submit(&key).unwrap();
        match worker.events().recv_timeout(WAIT).unwrap() {
            WorkerEvent::Failed { key: failed, errors } => {
                assert_eq!(failed, key);
                let slots: Vec<usize> = errors.iter().map(|issue| issue.slot).collect();
                assert_eq!(slots, vec![centre]);
            }
            other => panic!("expected a failure, got {other:?}"),
        }
    }

    #[test]
    fn test_cancel_queued_and_running() {
        let worker = SolveWorker::spawn(SolverConfig::default().with_cycles_per_slice(1)).unwrap();
        let long = scrambled_key(5, &[0, 7, 14, 21, 28, 35, 3, 10, 17, 24, 31, 2, 9, 16, 23]);
        let queued = scrambled_key(3, &[13, 15]);
        worker.submit(&long).unwrap();
        worker.submit(&queued).unwrap();
        worker.cancel(&queued).unwrap();

        let events = collect_until(&worker, |e| e.key() == queued);
        assert!(matches!(
            events.last(),
            Some(WorkerEvent::Progress { status, .. }) if status == CANCELLED_NOTICE
        ));

        worker.cancel(&long).unwrap();
        let events = collect_until(&worker, |e| {
            matches!(e, WorkerEvent::Progress { status, .. } if status == CANCELLED_NOTICE)
        });
        assert!(events.iter().all(|e| e.key() == long));
        assert!(!events.iter().any(|e| matches!(e, WorkerEvent::Succeeded { .. })));
        assert!(worker.events().recv_timeout(Duration::from_millis(200)).is_err());
    }

    #[test]
    fn test_duplicate_request_is_rejected() {
        let worker = SolveWorker::spawn(SolverConfig::default().with_cycles_per_slice(1)).unwrap();
        let long = scrambled_key(5, &[0, 7, 14, 21, 28, 35, 3, 10, 17, 24, 31, 2, 9, 16, 23]);
        worker.submit(&long).unwrap();
        worker.submit(&long).unwrap();
        let events = collect_until(&worker, |e| matches!(e, WorkerEvent::Rejected { .. }));
        assert!(events.iter().all(|e| e.key() == long));
        worker.cancel(&long).unwrap();
    }
}
