//! End-to-end checks through the public API.

use std::time::Duration;

use cubesolve::cube::{CubeState, Encoding, SlotIssue};
use cubesolve::filter::FilterCache;
use cubesolve::geometry::{piece_index, Face};
use cubesolve::moves::MoveSet;
use cubesolve::persistence;
use cubesolve::solver::{solve, CancelHandle, SolveCallbacks, SolveOutcome, SolverConfig, CANCELLED_NOTICE};
use cubesolve::worker::{SolveWorker, WorkerEvent};

#[derive(Default)]
struct Events {
    started: usize,
    progress: Vec<String>,
    successes: usize,
    failures: Vec<SlotIssue>,
    cancel_on_progress: bool,
    handle: Option<CancelHandle>,
}

impl SolveCallbacks for Events {
    fn on_start(&mut self, cancel: CancelHandle) {
        self.started += 1;
        self.handle = Some(cancel);
    }

    fn on_progress(&mut self, status: &str) {
        self.progress.push(status.to_string());
        if self.cancel_on_progress {
            if let Some(handle) = &self.handle {
                handle.cancel();
            }
        }
    }

    fn on_success(&mut self, _solution: &MoveSet, _elapsed: Duration, _visited: u64) {
        self.successes += 1;
    }

    fn on_failure(&mut self, errors: &[SlotIssue]) {
        self.failures.extend_from_slice(errors);
    }
}

fn scramble(size: usize, text: &str, encoding: Encoding) -> CubeState {
    let moves = MoveSet::parse_text(size, text).unwrap();
    let mut cache = FilterCache::new();
    let mut state = CubeState::solved(size, Encoding::Surface).unwrap().convert(encoding).unwrap();
    let filter = cache.filter_for(&moves, 0, encoding).unwrap();
    filter.apply(&mut state, 0, 0).unwrap();
    state
}

#[test]
fn scramble_solve_replay_reaches_solved() {
    for (size, text) in [(3, "R U"), (3, "L F2"), (2, "R U'"), (4, "2R U")] {
        let state = scramble(size, text, Encoding::Piece);
        assert!(!state.is_solved(0).unwrap(), "{text}");

        let mut cache = FilterCache::new();
        let mut events = Events::default();
        let outcome = solve(&state, 0, SolverConfig::default(), &mut cache, &mut events).unwrap();
        let SolveOutcome::Solved(solution) = outcome else {
            panic!("{size}x{size} {text}: expected a solution, got {outcome:?}");
        };
        assert_eq!(events.started, 1);
        assert_eq!(events.successes, 1);
        assert!((1..=4).contains(&solution.moves.length()), "{text}: {}", solution.moves);

        let mut replayed = state.clone();
        let filter = cache.filter_for(&solution.moves, 0, Encoding::Piece).unwrap();
        filter.apply(&mut replayed, 0, 0).unwrap();
        assert!(replayed.is_solved(0).unwrap(), "{text}: {}", solution.moves);
    }
}

#[test]
fn impossible_cube_goes_to_on_failure() {
    let mut state = scramble(3, "R", Encoding::Surface);
    // no real cube has two up-coloured centres
    state.set_sticker(Face::Down, 1, 1, 0, Face::Up.index() as u8).unwrap();

    let mut cache = FilterCache::new();
    let mut events = Events::default();
    let outcome = solve(&state, 0, SolverConfig::default(), &mut cache, &mut events).unwrap();
    assert!(matches!(outcome, SolveOutcome::Failed(_)));
    assert_eq!(events.started, 0);
    assert_eq!(events.successes, 0);
    assert!(!events.failures.is_empty());
    assert!(events.failures.iter().all(|issue| issue.cube == 0));
}

#[test]
fn undecodable_piece_string_goes_to_on_failure() {
    // a left centre carrying an edge code
    let centre = piece_index((0, 1, 1), 3).unwrap();
    let mut text = scramble(3, "R", Encoding::Piece).to_cube_string(0).unwrap();
    let at = "CBDTA:P:3:".len() + centre;
    text.replace_range(at..at + 1, "7");
    let state = CubeState::from_cube_string(&text).unwrap();

    let mut cache = FilterCache::new();
    let mut events = Events::default();
    let outcome = solve(&state, 0, SolverConfig::default(), &mut cache, &mut events).unwrap();
    assert!(matches!(outcome, SolveOutcome::Failed(_)));
    assert_eq!(events.started, 0);
    let slots: Vec<usize> = events.failures.iter().map(|issue| issue.slot).collect();
    assert_eq!(slots, vec![centre]);

    let worker = SolveWorker::spawn(SolverConfig::default()).unwrap();
    worker.submit(&text).unwrap();
    match worker.events().recv_timeout(Duration::from_secs(60)).unwrap() {
        WorkerEvent::Failed { errors, .. } => assert_eq!(errors, events.failures),
        other => panic!("expected a failure, got {other:?}"),
    }
}

#[test]
fn cancelling_mid_search_ends_with_notice() {
    let state = scramble(4, "R U 2F D' L2 B 2U R'", Encoding::Surface);
    let mut cache = FilterCache::new();
    let mut events = Events {
        cancel_on_progress: true,
        ..Events::default()
    };
    let config = SolverConfig::default().with_cycles_per_slice(1);
    let outcome = solve(&state, 0, config, &mut cache, &mut events).unwrap();
    assert_eq!(outcome, SolveOutcome::Cancelled);
    assert_eq!(events.progress.last().map(String::as_str), Some(CANCELLED_NOTICE));
    assert_eq!(events.successes, 0);
    assert!(events.failures.is_empty());
}

#[test]
fn saved_cubes_solve_on_the_worker() {
    let dir = std::env::temp_dir().join(format!("cubesolve-it-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("cubes.txt");

    let mut state = scramble(3, "R U", Encoding::Surface);
    state.append_cubes(&scramble(3, "F'", Encoding::Surface)).unwrap();
    persistence::save(&path, &state).unwrap();
    let loaded = persistence::load(&path).unwrap();
    assert_eq!(loaded.count(), 2);

    let worker = SolveWorker::spawn(SolverConfig::default()).unwrap();
    let keys: Vec<String> = (0..2).map(|cube| worker.submit_state(&loaded, cube).unwrap()).collect();
    let mut solved = Vec::new();
    while solved.len() < keys.len() {
        match worker.events().recv_timeout(Duration::from_secs(60)).unwrap() {
            WorkerEvent::Succeeded { key, solution } => solved.push((key, solution.moves.length())),
            WorkerEvent::Failed { key, .. } | WorkerEvent::Rejected { key, .. } => panic!("{key} not solved"),
            _ => {}
        }
    }
    // one request at a time, in order
    assert_eq!(solved, vec![(keys[0].clone(), 2), (keys[1].clone(), 1)]);
    worker.shutdown().unwrap();
    std::fs::remove_dir_all(&dir).unwrap();
}
