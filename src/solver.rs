//! Memory-bounded best-first search for a solving move sequence.
//!
//! Nodes live in a fixed-capacity arena. Each node owns one cube of a shared
//! [`CubeState`] and the move path that produced it. Active nodes form a
//! doubly linked chain, by index, ordered by ascending points, where
//!
//! ```text
//! points = (solved_score - score) + move_weight * path_len
//! ```
//!
//! Spent nodes return to a free list. When the arena is full and nothing is
//! free, the worst active node is evicted. The search runs in slices of a
//! fixed number of cycles so a caller can stay responsive and poll for
//! cancellation between them.

use std::cmp::Reverse;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, error, info};
use thiserror::Error;

use crate::cube::{solved_score, CubeError, CubeState, Encoding, SlotIssue};
use crate::filter::{FilterCache, FilterError, Layout, MoveFilter};
use crate::geometry::layer_count;
use crate::moves::{is_legal_next, MoveError, MoveSet};

pub const DEFAULT_CAPACITY: usize = 50_000;
pub const DEFAULT_CYCLES_PER_SLICE: usize = 100;
pub const DEFAULT_MOVE_WEIGHT: u32 = 2;
pub const DEFAULT_KEEP_TOP: usize = 12;

/// Progress text sent when a search stops on request.
pub const CANCELLED_NOTICE: &str = "the solve was cancelled";

const NIL: usize = usize::MAX;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SolverError {
    #[error("capacity {capacity} cannot hold one expansion ({needed} nodes)")]
    CapacityTooSmall { capacity: usize, needed: usize },
    #[error("cycles per slice must be at least 1")]
    EmptySlice,
    #[error("keep-top must be at least 1")]
    KeepNothing,
    #[error("node arena exhausted with no active node to evict")]
    ArenaExhausted,
    #[error("no active nodes left to expand")]
    EmptyFrontier,
    #[error(transparent)]
    Cube(#[from] CubeError),
    #[error(transparent)]
    Filter(#[from] FilterError),
    #[error(transparent)]
    Move(#[from] MoveError),
}

/// Search tuning.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SolverConfig {
    /// Maximum number of nodes (and arena cubes).
    pub capacity: usize,
    /// Cycles run between yields.
    pub cycles_per_slice: usize,
    /// Points charged per move already made.
    pub move_weight: u32,
    /// Children kept per expansion, best scores first.
    pub keep_top: usize,
    /// Children scoring below this are dropped.
    pub min_viable_score: u32,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            cycles_per_slice: DEFAULT_CYCLES_PER_SLICE,
            move_weight: DEFAULT_MOVE_WEIGHT,
            keep_top: DEFAULT_KEEP_TOP,
            min_viable_score: 0,
        }
    }
}

impl SolverConfig {
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_cycles_per_slice(mut self, cycles: usize) -> Self {
        self.cycles_per_slice = cycles;
        self
    }

    pub fn with_move_weight(mut self, weight: u32) -> Self {
        self.move_weight = weight;
        self
    }

    pub fn with_keep_top(mut self, keep: usize) -> Self {
        self.keep_top = keep;
        self
    }

    pub fn with_min_viable_score(mut self, score: u32) -> Self {
        self.min_viable_score = score;
        self
    }

    /// Checks the settings against a cube size. The arena must hold a parent
    /// and every child of one expansion at once.
    pub fn validate(&self, size: usize) -> Result<(), SolverError> {
        let needed = 3 * layer_count(size) + 1;
        if self.capacity < needed {
            return Err(SolverError::CapacityTooSmall {
                capacity: self.capacity,
                needed,
            });
        }
        if self.cycles_per_slice == 0 {
            return Err(SolverError::EmptySlice);
        }
        if self.keep_top == 0 {
            return Err(SolverError::KeepNothing);
        }
        Ok(())
    }
}

/// Shared flag asking a running search to stop at its next slice.
#[derive(Clone, Debug, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Receivers for the four kinds of solve events.
pub trait SolveCallbacks {
    /// The search is about to run; `cancel` stops it.
    fn on_start(&mut self, cancel: CancelHandle);
    /// Free-form status text.
    fn on_progress(&mut self, status: &str);
    fn on_success(&mut self, solution: &MoveSet, elapsed: Duration, visited: u64);
    /// The cube failed verification; the search never started.
    fn on_failure(&mut self, errors: &[SlotIssue]);
}

/// A finished search.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Solution {
    pub moves: MoveSet,
    pub elapsed: Duration,
    /// Nodes expanded.
    pub visited: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SliceOutcome {
    Pending,
    Solved(Solution),
    Cancelled,
}

/// How [`solve`] ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SolveOutcome {
    Solved(Solution),
    Failed(Vec<SlotIssue>),
    Cancelled,
}

#[derive(Clone, Debug)]
struct Node {
    prev: usize,
    next: usize,
    score: u32,
    points: u32,
    path: Vec<u32>,
}

impl Node {
    const fn unlinked() -> Self {
        Self {
            prev: NIL,
            next: NIL,
            score: 0,
            points: 0,
            path: Vec::new(),
        }
    }
}

/// One in-progress search.
pub struct Search {
    size: usize,
    config: SolverConfig,
    filters: Vec<MoveFilter>,
    arena: CubeState,
    nodes: Vec<Node>,
    free: Vec<usize>,
    head: usize,
    tail: usize,
    mid: usize,
    mid_rank: usize,
    active: usize,
    solved_score: u32,
    visited: u64,
    evicted: u64,
    cancel: CancelHandle,
    started: Instant,
}

impl Search {
    /// Prepares a search for cube `cube` of `state`.
    pub fn new(
        state: &CubeState,
        cube: usize,
        config: SolverConfig,
        cache: &mut FilterCache,
    ) -> Result<Self, SolverError> {
        let size = state.size();
        config.validate(size)?;
        let arena = state.extract(cube)?.convert(Encoding::Fast)?;
        let filters = cache.base_filters(size, Layout::Stickers)?.to_vec();

        let mut search = Self {
            size,
            config,
            filters,
            arena,
            nodes: vec![Node::unlinked()],
            free: Vec::new(),
            head: NIL,
            tail: NIL,
            mid: NIL,
            mid_rank: 0,
            active: 0,
            solved_score: solved_score(size),
            visited: 0,
            evicted: 0,
            cancel: CancelHandle::new(),
            started: Instant::now(),
        };
        let score = search.arena.score(0)?;
        search.nodes[0].score = score;
        search.nodes[0].points = search.points(score, 0);
        search.insert_sorted(0);
        info!(
            "searching size {size} cube: score {score}/{}, capacity {}",
            search.solved_score, search.config.capacity
        );
        Ok(search)
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn visited(&self) -> u64 {
        self.visited
    }

    /// Nodes currently waiting to be expanded.
    pub fn active(&self) -> usize {
        self.active
    }

    fn points(&self, score: u32, path_len: usize) -> u32 {
        (self.solved_score - score.min(self.solved_score)) + self.config.move_weight * path_len as u32
    }

    /// Runs up to one slice of cycles.
    pub fn run_slice(&mut self) -> Result<SliceOutcome, SolverError> {
        if self.cancel.is_cancelled() {
            info!("search cancelled after {} nodes", self.visited);
            return Ok(SliceOutcome::Cancelled);
        }
        for _ in 0..self.config.cycles_per_slice {
            let result = self.cycle();
            if let Err(err) = &result {
                error!("search invariant broken after {} nodes: {err}", self.visited);
            }
            if let Some(node) = result? {
                return Ok(SliceOutcome::Solved(self.solution(node)?));
            }
        }
        Ok(SliceOutcome::Pending)
    }

    /// Human-readable summary of the best node.
    pub fn status(&self) -> String {
        let Some(best) = self.nodes.get(self.head) else {
            return format!("{} nodes visited, nothing left to search", self.visited);
        };
        let top = MoveSet::from_moves(self.size, &best.path)
            .and_then(|set| set.moves_as_text(0))
            .unwrap_or_default();
        format!(
            "score {}/{}, points {}, {} nodes visited, {} active, top: {}",
            best.score, self.solved_score, best.points, self.visited, self.active, top
        )
    }

    fn solution(&self, node: usize) -> Result<Solution, SolverError> {
        let moves = MoveSet::from_moves(self.size, &self.nodes[node].path)?;
        let elapsed = self.started.elapsed();
        info!(
            "solved in {} moves after {} nodes ({} evicted) in {elapsed:?}",
            moves.length(),
            self.visited,
            self.evicted
        );
        Ok(Solution {
            moves,
            elapsed,
            visited: self.visited,
        })
    }

    /// Expands the best node. Returns it instead if it is already solved.
    fn cycle(&mut self) -> Result<Option<usize>, SolverError> {
        let best = self.head;
        if best == NIL {
            return Err(SolverError::EmptyFrontier);
        }
        if self.nodes[best].score == self.solved_score {
            return Ok(Some(best));
        }
        self.pop_head();
        self.visited += 1;

        let layers = layer_count(self.size);
        let path = std::mem::take(&mut self.nodes[best].path);
        let mut children = Vec::with_capacity(layers * 3);
        for layer in 0..layers as u32 {
            if !is_legal_next(self.size, &path, layer) {
                continue;
            }
            for direction in 0..3 {
                let id = layer + direction * layers as u32;
                let child = self.acquire()?;
                self.arena.copy_cube(best, child)?;
                self.filters[id as usize].apply(&mut self.arena, child, child)?;
                let score = self.arena.score(child)?;
                let node = &mut self.nodes[child];
                node.path.clear();
                node.path.extend_from_slice(&path);
                node.path.push(id);
                node.score = score;
                children.push(child);
            }
        }

        // stable: equal scores keep move order
        children.sort_by_key(|&child| Reverse(self.nodes[child].score));
        for (rank, &child) in children.iter().enumerate() {
            let score = self.nodes[child].score;
            if rank < self.config.keep_top && score >= self.config.min_viable_score {
                self.nodes[child].points = self.points(score, self.nodes[child].path.len());
                self.insert_sorted(child);
            } else {
                self.free.push(child);
            }
        }
        self.nodes[best].path = path;
        self.free.push(best);
        Ok(None)
    }

    /// A node slot for a new child: recycled, freshly allocated, or evicted.
    fn acquire(&mut self) -> Result<usize, SolverError> {
        if let Some(slot) = self.free.pop() {
            return Ok(slot);
        }
        if self.nodes.len() < self.config.capacity {
            let slot = self.nodes.len();
            if slot >= self.arena.count() {
                let extra = self.arena.count().min(self.config.capacity - self.arena.count());
                let blank = CubeState::solved_many(self.size, extra.max(1), Encoding::Fast)?;
                self.arena.append_cubes(&blank)?;
                debug!("arena grown to {} cubes", self.arena.count());
            }
            self.nodes.push(Node::unlinked());
            return Ok(slot);
        }
        let worst = self.tail;
        if worst == NIL {
            return Err(SolverError::ArenaExhausted);
        }
        self.pop_tail();
        self.evicted += 1;
        Ok(worst)
    }

    fn pop_head(&mut self) {
        let node = self.head;
        let next = self.nodes[node].next;
        self.head = next;
        if next == NIL {
            self.tail = NIL;
        } else {
            self.nodes[next].prev = NIL;
        }
        if node == self.mid {
            self.mid = next;
        } else {
            self.mid_rank -= 1;
        }
        self.detach(node);
    }

    fn pop_tail(&mut self) {
        let node = self.tail;
        let prev = self.nodes[node].prev;
        self.tail = prev;
        if prev == NIL {
            self.head = NIL;
        } else {
            self.nodes[prev].next = NIL;
        }
        if node == self.mid {
            self.mid = prev;
            self.mid_rank = self.mid_rank.saturating_sub(1);
        }
        self.detach(node);
    }

    fn detach(&mut self, node: usize) {
        self.nodes[node].prev = NIL;
        self.nodes[node].next = NIL;
        self.active -= 1;
        self.rebalance();
    }

    /// Links `node` after every active node with points not above its own,
    /// starting the scan at the midpoint when that is safe.
    fn insert_sorted(&mut self, node: usize) {
        let points = self.nodes[node].points;
        let from_mid = self.mid != NIL && self.nodes[self.mid].points <= points;
        let (mut prev, mut cursor) = if from_mid {
            (self.mid, self.nodes[self.mid].next)
        } else {
            (NIL, self.head)
        };
        while cursor != NIL && self.nodes[cursor].points <= points {
            prev = cursor;
            cursor = self.nodes[cursor].next;
        }

        self.nodes[node].prev = prev;
        self.nodes[node].next = cursor;
        if prev == NIL {
            self.head = node;
        } else {
            self.nodes[prev].next = node;
        }
        if cursor == NIL {
            self.tail = node;
        } else {
            self.nodes[cursor].prev = node;
        }

        if self.mid == NIL {
            self.mid = node;
            self.mid_rank = 0;
        } else if !from_mid {
            self.mid_rank += 1;
        }
        self.active += 1;
        self.rebalance();
    }

    /// Keeps the midpoint at rank `active / 2`.
    fn rebalance(&mut self) {
        if self.mid == NIL {
            self.mid_rank = 0;
            return;
        }
        let target = self.active / 2;
        while self.mid_rank < target && self.nodes[self.mid].next != NIL {
            self.mid = self.nodes[self.mid].next;
            self.mid_rank += 1;
        }
        while self.mid_rank > target && self.nodes[self.mid].prev != NIL {
            self.mid = self.nodes[self.mid].prev;
            self.mid_rank -= 1;
        }
    }
}

/// Verifies cube `cube`, then searches until solved or cancelled, yielding
/// the thread between slices.
///
/// A cube that fails verification goes straight to `on_failure`; neither
/// `on_start` nor `on_success` is called.
pub fn solve<C: SolveCallbacks>(
    state: &CubeState,
    cube: usize,
    config: SolverConfig,
    cache: &mut FilterCache,
    callbacks: &mut C,
) -> Result<SolveOutcome, SolverError> {
    let verification = state.verify(cube)?;
    if !verification.passed {
        info!("cube failed verification with {} issue(s)", verification.errors.len());
        callbacks.on_failure(&verification.errors);
        return Ok(SolveOutcome::Failed(verification.errors));
    }

    let mut search = Search::new(state, cube, config, cache)?;
    callbacks.on_start(search.cancel_handle());
    loop {
        match search.run_slice()? {
            SliceOutcome::Pending => {
                callbacks.on_progress(&search.status());
                std::thread::yield_now();
            }
            SliceOutcome::Solved(solution) => {
                callbacks.on_progress(&solution.moves.moves_as_text(0)?);
                callbacks.on_success(&solution.moves, solution.elapsed, solution.visited);
                return Ok(SolveOutcome::Solved(solution));
            }
            SliceOutcome::Cancelled => {
                callbacks.on_progress(CANCELLED_NOTICE);
                return Ok(SolveOutcome::Cancelled);
            }
        }
    }
}
