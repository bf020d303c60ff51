//! Move tables ("filters") and the cache that owns them.
//!
//! A filter is a plain table with one entry per destination value. For sticker
//! layouts entry `j` is the source sticker that lands on sticker `j`. For the
//! piece layout it is `source_slot + rotation * piece_count`, and the piece
//! taken from `source_slot` is rotated `rotation` steps on arrival.
//!
//! Single-move filters are derived geometrically, once per (size, layout), and
//! longer sequences are composed from them.

use std::sync::Arc;

use log::{debug, warn};
use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::cube::{slot_layout, CubeError, CubeState, Encoding};
use crate::geometry::{
    clockwise_faces, coords_3d, layer_count, piece_count, piece_index, rotate_coord, rotate_face,
    sticker_count, sticker_of, sticker_position, Layer,
};
use crate::moves::{Move, MoveError, MoveSet};
use crate::pieces::{Piece, PieceKind};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    #[error("{0:?} cubes cannot be turned")]
    UnsupportedEncoding(Encoding),
    #[error("filter built for size {filter} cannot turn a size {state} cube")]
    SizeMismatch { filter: usize, state: usize },
    #[error("filter built for {filter:?} data cannot turn {state:?} data")]
    LayoutMismatch { filter: Layout, state: Layout },
    #[error("cube range {start}..={end} is invalid for a state of {count} cubes")]
    CubeRange {
        start: usize,
        end: usize,
        count: usize,
    },
    #[error("move {0} has no table")]
    UnknownMove(u32),
    #[error("table entry for slot {0} does not map back to a piece")]
    Geometry(usize),
    #[error(transparent)]
    Move(#[from] MoveError),
    #[error(transparent)]
    Cube(#[from] CubeError),
}

/// Which table shape a filter uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Layout {
    /// One entry per sticker; Surface and Fast data.
    Stickers,
    /// One entry per piece slot with a rotation; Piece data.
    Pieces,
}

impl Layout {
    pub fn for_encoding(encoding: Encoding) -> Option<Self> {
        match encoding {
            Encoding::Surface | Encoding::Fast => Some(Layout::Stickers),
            Encoding::Piece => Some(Layout::Pieces),
            Encoding::Compact => None,
        }
    }

    fn entries(self, size: usize) -> usize {
        match self {
            Layout::Stickers => sticker_count(size),
            Layout::Pieces => piece_count(size),
        }
    }
}

/// The effect of a move sequence on one layout.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MoveFilter {
    size: usize,
    layout: Layout,
    table: Vec<u32>,
    moves: Vec<u32>,
    /// Kind of every piece slot; empty for sticker tables.
    kinds: Arc<[PieceKind]>,
}

fn slot_kinds(size: usize, layout: Layout) -> Arc<[PieceKind]> {
    match layout {
        Layout::Stickers => Arc::from(Vec::new()),
        Layout::Pieces => slot_layout(size).iter().map(|slot| slot.kind()).collect(),
    }
}

impl MoveFilter {
    fn identity(size: usize, layout: Layout) -> Self {
        Self {
            size,
            layout,
            table: (0..layout.entries(size) as u32).collect(),
            moves: Vec::new(),
            kinds: slot_kinds(size, layout),
        }
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// Move ids this filter performs, in order.
    pub fn moves(&self) -> &[u32] {
        &self.moves
    }

    pub fn table(&self) -> &[u32] {
        &self.table
    }

    /// The filter performing `self` and then `next`.
    pub fn then(&self, next: &MoveFilter) -> Result<MoveFilter, FilterError> {
        if next.size != self.size {
            return Err(FilterError::SizeMismatch {
                filter: next.size,
                state: self.size,
            });
        }
        if next.layout != self.layout {
            return Err(FilterError::LayoutMismatch {
                filter: next.layout,
                state: self.layout,
            });
        }
        let table = match self.layout {
            Layout::Stickers => next
                .table
                .iter()
                .map(|&src| self.table[src as usize])
                .collect(),
            Layout::Pieces => {
                let n = self.table.len();
                next.table
                    .iter()
                    .zip(self.kinds.iter())
                    .map(|(&entry, kind)| {
                        let (mid, second) = (entry as usize % n, entry as usize / n);
                        let earlier = self.table[mid] as usize;
                        let (src, first) = (earlier % n, earlier / n);
                        let faces = kind.face_count();
                        (src + ((first + second) % faces) * n) as u32
                    })
                    .collect()
            }
        };
        let mut moves = self.moves.clone();
        moves.extend_from_slice(&next.moves);
        Ok(MoveFilter {
            size: self.size,
            layout: self.layout,
            table,
            moves,
            kinds: Arc::clone(&self.kinds),
        })
    }

    fn check(&self, state: &CubeState, start: usize, end: usize) -> Result<(), FilterError> {
        let layout =
            Layout::for_encoding(state.encoding()).ok_or(FilterError::UnsupportedEncoding(state.encoding()))?;
        if state.size() != self.size {
            return Err(FilterError::SizeMismatch {
                filter: self.size,
                state: state.size(),
            });
        }
        if layout != self.layout {
            return Err(FilterError::LayoutMismatch {
                filter: self.layout,
                state: layout,
            });
        }
        if start > end || end >= state.count() {
            return Err(FilterError::CubeRange {
                start,
                end,
                count: state.count(),
            });
        }
        Ok(())
    }

    /// Applies the filter to cubes `start..=end`. The state's layout must
    /// match; [`FilterCache::apply`] adapts mismatched filters instead.
    pub fn apply(&self, state: &mut CubeState, start: usize, end: usize) -> Result<(), FilterError> {
        self.check(state, start, end)?;
        let per_cube = self.table.len();
        let data = state.data_mut();
        let mut old = Vec::with_capacity(per_cube);
        for cube in start..=end {
            let base = cube * per_cube;
            old.clear();
            old.extend((base..base + per_cube).map(|index| data.load(index)));
            match self.layout {
                Layout::Stickers => {
                    for (dest, &src) in self.table.iter().enumerate() {
                        data.store(base + dest, old[src as usize]);
                    }
                }
                Layout::Pieces => {
                    for (dest, (&entry, &kind)) in self.table.iter().zip(self.kinds.iter()).enumerate() {
                        let (src, turns) = (entry as usize % per_cube, entry / per_cube as u32);
                        let code = Piece::decode(kind, old[src]).rotate(turns).code();
                        data.store(base + dest, u32::from(code));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Sticker table for one move.
fn sticker_filter(size: usize, id: u32) -> Result<MoveFilter, FilterError> {
    let m = Move::from_id(id, layer_count(size)).ok_or(FilterError::UnknownMove(id))?;
    let layer = Layer::from_id(m.layer, size);
    let turns = m.direction.quarter_turns();
    let mut table: Vec<u32> = (0..sticker_count(size) as u32).collect();
    for src in 0..sticker_count(size) {
        let (face, fx, fy) = sticker_position(src, size);
        let coord = coords_3d(face, fx, fy, size);
        if !layer.contains(coord) {
            continue;
        }
        let dest_coord = rotate_coord(coord, layer.axis, turns, size);
        let dest_face = rotate_face(face, layer.axis, turns);
        table[sticker_of(dest_face, dest_coord, size)] = src as u32;
    }
    Ok(MoveFilter {
        size,
        layout: Layout::Stickers,
        table,
        moves: vec![id],
        kinds: slot_kinds(size, Layout::Stickers),
    })
}

/// Piece table derived from a sticker table by following each slot's home
/// sticker back to where it came from.
fn piece_filter(stickers: &MoveFilter) -> Result<MoveFilter, FilterError> {
    let size = stickers.size;
    let slots = slot_layout(size);
    let n = slots.len();
    let table = slots
        .iter()
        .enumerate()
        .map(|(index, slot)| {
            let home = sticker_of(slot.faces[0], slot.coord, size);
            let (face, fx, fy) = sticker_position(stickers.table[home] as usize, size);
            let src_coord = coords_3d(face, fx, fy, size);
            let src_slot = piece_index(src_coord, size).ok_or(FilterError::Geometry(index))?;
            let position = clockwise_faces(src_coord, size)
                .iter()
                .position(|&f| f == face)
                .ok_or(FilterError::Geometry(index))?;
            let faces = slot.faces.len();
            Ok((src_slot + ((faces - position) % faces) * n) as u32)
        })
        .collect::<Result<Vec<u32>, FilterError>>()?;
    Ok(MoveFilter {
        size,
        layout: Layout::Pieces,
        table,
        moves: stickers.moves.clone(),
        kinds: slots.iter().map(|slot| slot.kind()).collect(),
    })
}

/// Owns every single-move table built so far.
///
/// A new cache is empty; tables for a (size, layout) pair are built the first
/// time that pair is asked for and kept until [`FilterCache::clear`].
#[derive(Debug, Default)]
pub struct FilterCache {
    base: FxHashMap<(usize, Layout), Vec<MoveFilter>>,
    advised: bool,
}

impl FilterCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every table and re-arms the mismatch advisory.
    pub fn clear(&mut self) {
        self.base.clear();
        self.advised = false;
    }

    /// Number of (size, layout) pairs with tables built.
    pub fn len(&self) -> usize {
        self.base.len()
    }

    pub fn is_empty(&self) -> bool {
        self.base.is_empty()
    }

    /// The single-move filters for `size`, indexed by move id.
    pub fn base_filters(&mut self, size: usize, layout: Layout) -> Result<&[MoveFilter], FilterError> {
        let key = (size, layout);
        if !self.base.contains_key(&key) {
            let built = match layout {
                Layout::Stickers => {
                    let singles = MoveSet::self_indexed(size, 1)?;
                    let mut filters = Vec::with_capacity(singles.len());
                    for id in 0..singles.len() {
                        for m in singles.moves(id)? {
                            filters.push(sticker_filter(size, m)?);
                        }
                    }
                    filters
                }
                Layout::Pieces => self
                    .base_filters(size, Layout::Stickers)?
                    .iter()
                    .map(piece_filter)
                    .collect::<Result<Vec<_>, _>>()?,
            };
            debug!("built {} {layout:?} move tables for size {size}", built.len());
            self.base.insert(key, built);
        }
        Ok(self.base.get(&key).map(Vec::as_slice).unwrap_or(&[]))
    }

    /// The filter performing `moves` in order.
    pub fn filter(&mut self, size: usize, layout: Layout, moves: &[u32]) -> Result<MoveFilter, FilterError> {
        let base = self.base_filters(size, layout)?;
        let mut filter = MoveFilter::identity(size, layout);
        for &id in moves {
            let single = base.get(id as usize).ok_or(FilterError::UnknownMove(id))?;
            filter = filter.then(single)?;
        }
        Ok(filter)
    }

    /// The filter for sequence `id` of `set`, shaped for `encoding`.
    pub fn filter_for(
        &mut self,
        set: &MoveSet,
        id: usize,
        encoding: Encoding,
    ) -> Result<MoveFilter, FilterError> {
        let layout = Layout::for_encoding(encoding).ok_or(FilterError::UnsupportedEncoding(encoding))?;
        let moves = set.moves(id)?;
        self.filter(set.size(), layout, &moves)
    }

    /// Applies `filter` to cubes `start..=end` of `state`, rebuilding it for
    /// the state's layout when the two differ.
    pub fn apply(
        &mut self,
        filter: &MoveFilter,
        state: &mut CubeState,
        start: usize,
        end: usize,
    ) -> Result<(), FilterError> {
        let layout =
            Layout::for_encoding(state.encoding()).ok_or(FilterError::UnsupportedEncoding(state.encoding()))?;
        if layout == filter.layout {
            return filter.apply(state, start, end);
        }
        if !self.advised {
            warn!(
                "filter built for {:?} data applied to {:?} cubes; rebuilding it to match",
                filter.layout,
                state.encoding()
            );
            self.advised = true;
        }
        let rebuilt = self.filter(filter.size, layout, &filter.moves)?;
        rebuilt.apply(state, start, end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Face;
    use crate::moves::inverse_sequence;

    fn scrambled(size: usize, encoding: Encoding, moves: &[u32]) -> CubeState {
        let mut cache = FilterCache::new();
        let mut state = CubeState::solved(size, Encoding::Surface).unwrap();
        let filter = cache.filter(size, Layout::Stickers, moves).unwrap();
        filter.apply(&mut state, 0, 0).unwrap();
        state.convert(encoding).unwrap()
    }

    #[test]
    fn test_quarter_turn_four_times_is_identity() {
        let mut cache = FilterCache::new();
        for size in 2..=5 {
            let solved = CubeState::solved(size, Encoding::Surface).unwrap();
            for layer in 0..layer_count(size) as u32 {
                let mut state = solved.clone();
                let turn = cache.filter(size, Layout::Stickers, &[layer]).unwrap();
                for _ in 0..3 {
                    turn.apply(&mut state, 0, 0).unwrap();
                    assert_ne!(state, solved, "size {size} layer {layer}");
                }
                turn.apply(&mut state, 0, 0).unwrap();
                assert_eq!(state, solved, "size {size} layer {layer}");
            }
        }
    }

    #[test]
    fn test_move_then_inverse_restores() {
        let mut cache = FilterCache::new();
        for size in [2, 3, 4] {
            let start = scrambled(size, Encoding::Surface, &[0, 9, 4, 16]);
            for id in 0..(layer_count(size) * 3) as u32 {
                for layout in [Layout::Stickers, Layout::Pieces] {
                    let encoding = if layout == Layout::Stickers {
                        Encoding::Surface
                    } else {
                        Encoding::Piece
                    };
                    let mut state = start.convert(encoding).unwrap();
                    let before = state.clone();
                    cache.filter(size, layout, &[id]).unwrap().apply(&mut state, 0, 0).unwrap();
                    let undo = cache
                        .filter(size, layout, &inverse_sequence(size, &[id]))
                        .unwrap();
                    undo.apply(&mut state, 0, 0).unwrap();
                    assert_eq!(state, before, "size {size} move {id} {layout:?}");
                }
            }
        }
    }

    #[test]
    fn test_left_turn_moves_up_to_front() {
        let mut cache = FilterCache::new();
        let mut state = CubeState::solved(3, Encoding::Surface).unwrap();
        // L: clockwise seen from the left
        cache.filter(3, Layout::Stickers, &[0]).unwrap().apply(&mut state, 0, 0).unwrap();
        assert_eq!(state.sticker(Face::Front, 0, 1, 0).unwrap(), Face::Up.index() as u8);
        assert_eq!(state.sticker(Face::Down, 0, 1, 0).unwrap(), Face::Front.index() as u8);
        assert_eq!(state.sticker(Face::Front, 1, 1, 0).unwrap(), Face::Front.index() as u8);
        assert_eq!(state.sticker(Face::Left, 0, 0, 0).unwrap(), Face::Left.index() as u8);
    }

    #[test]
    fn test_piece_tables_agree_with_sticker_tables() {
        let mut cache = FilterCache::new();
        for size in [2, 3, 4, 5] {
            let layers = layer_count(size) as u32;
            let moves = [0, layers + 2, 2 * layers + 4, layers - 1, 3];
            let surface = scrambled(size, Encoding::Surface, &moves);
            let mut pieces = CubeState::solved(size, Encoding::Piece).unwrap();
            cache.filter(size, Layout::Pieces, &moves).unwrap().apply(&mut pieces, 0, 0).unwrap();
            assert_eq!(pieces.convert(Encoding::Surface).unwrap(), surface, "size {size}");
        }
    }

    #[test]
    fn test_composed_filter_matches_stepwise() {
        let mut cache = FilterCache::new();
        let moves = [1, 8, 15, 3];
        let composed = cache.filter(3, Layout::Pieces, &moves).unwrap();
        let mut once = CubeState::solved(3, Encoding::Piece).unwrap();
        composed.apply(&mut once, 0, 0).unwrap();
        let mut stepwise = CubeState::solved(3, Encoding::Piece).unwrap();
        for &m in &moves {
            cache.filter(3, Layout::Pieces, &[m]).unwrap().apply(&mut stepwise, 0, 0).unwrap();
        }
        assert_eq!(once, stepwise);
        assert_eq!(composed.moves(), &moves);
    }

    #[test]
    fn test_apply_rebuilds_mismatched_filter() {
        let mut cache = FilterCache::new();
        let sticker = cache.filter(3, Layout::Stickers, &[5, 7]).unwrap();
        let mut pieces = CubeState::solved(3, Encoding::Piece).unwrap();
        assert!(matches!(
            sticker.apply(&mut pieces, 0, 0),
            Err(FilterError::LayoutMismatch { .. })
        ));
        cache.apply(&sticker, &mut pieces, 0, 0).unwrap();
        assert_eq!(
            pieces.convert(Encoding::Surface).unwrap(),
            scrambled(3, Encoding::Surface, &[5, 7])
        );
        let mut compact = CubeState::solved(3, Encoding::Compact).unwrap();
        assert_eq!(
            cache.apply(&sticker, &mut compact, 0, 0),
            Err(FilterError::UnsupportedEncoding(Encoding::Compact))
        );
    }

    #[test]
    fn test_piece_filters_carry_slot_kinds() {
        let mut cache = FilterCache::new();
        let composed = cache.filter(4, Layout::Pieces, &[0, 5, 13, 22]).unwrap();
        let expected: Vec<PieceKind> = slot_layout(4).iter().map(|slot| slot.kind()).collect();
        assert_eq!(&composed.kinds[..], &expected[..]);
        assert!(cache.filter(4, Layout::Stickers, &[0]).unwrap().kinds.is_empty());

        // a batch turned at once matches each cube turned alone
        let mut batch = CubeState::solved_many(4, 3, Encoding::Piece).unwrap();
        cache.filter(4, Layout::Pieces, &[7]).unwrap().apply(&mut batch, 1, 1).unwrap();
        let mut single = batch.clone();
        composed.apply(&mut batch, 0, 2).unwrap();
        for cube in 0..3 {
            composed.apply(&mut single, cube, cube).unwrap();
        }
        assert_eq!(batch, single);
        assert!(batch.verify(1).unwrap().passed);
    }

    #[test]
    fn test_apply_to_cube_range() {
        let mut cache = FilterCache::new();
        let mut state = CubeState::solved_many(3, 3, Encoding::Fast).unwrap();
        let filter = cache.filter(3, Layout::Stickers, &[2]).unwrap();
        filter.apply(&mut state, 1, 2).unwrap();
        assert!(state.is_solved(0).unwrap());
        assert!(!state.is_solved(1).unwrap());
        assert_eq!(state.cube_values(1).unwrap(), state.cube_values(2).unwrap());
        assert!(matches!(
            filter.apply(&mut state, 2, 3),
            Err(FilterError::CubeRange { .. })
        ));
    }

    #[test]
    fn test_cache_lifecycle() {
        let mut cache = FilterCache::new();
        assert!(cache.is_empty());
        assert_eq!(cache.base_filters(3, Layout::Stickers).unwrap().len(), 18);
        cache.base_filters(3, Layout::Pieces).unwrap();
        assert_eq!(cache.len(), 2);
        cache.clear();
        assert!(cache.is_empty());
        let set = MoveSet::from_moves(3, &[0, 1]).unwrap();
        let filter = cache.filter_for(&set, 0, Encoding::Fast).unwrap();
        assert_eq!(filter.layout(), Layout::Stickers);
        assert_eq!(filter.moves(), &[0, 1]);
    }
}
