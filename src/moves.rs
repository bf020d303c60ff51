//! Move sequences stored in bulk.
//!
//! A move id is `layer + direction * layer_count`. A [`MoveSet`] holds many
//! sequences of one fixed length back to back in a [`PackedStore`]. Sets built
//! by [`MoveSet::self_indexed`] store only the layer of each sequence's final
//! move; sequence `id` then expands to base `id % count` with final direction
//! `id / count`, so the set answers for three times as many ids as it stores.

use std::fmt;

use thiserror::Error;

use crate::cube::{check_size, CubeError};
use crate::geometry::{layer_count, Axis, Face};
use crate::packed::{PackedStore, StoreError};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MoveError {
    #[error("sequence {id} does not exist (set holds {len})")]
    UnknownSequence { id: usize, len: usize },
    #[error("expected {expected} moves, got {found}")]
    WrongLength { expected: usize, found: usize },
    #[error("move {id} is outside 0..{limit}")]
    MoveOutOfRange { id: u32, limit: u32 },
    #[error("self-indexed sets accept no further sequences")]
    Sealed,
    #[error("cannot read move `{0}`")]
    Notation(String),
    #[error(transparent)]
    Cube(#[from] CubeError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Turn amount, seen from the low face (L, D or B) of the layer's axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    Clockwise = 0,
    Half = 1,
    CounterClockwise = 2,
}

impl Direction {
    pub const ALL: [Direction; 3] = [
        Direction::Clockwise,
        Direction::Half,
        Direction::CounterClockwise,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Direction::ALL.get(index).copied()
    }

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Quarter turns applied about the axis.
    #[inline]
    pub const fn quarter_turns(self) -> usize {
        self as usize + 1
    }

    pub const fn inverse(self) -> Self {
        match self {
            Direction::Clockwise => Direction::CounterClockwise,
            Direction::Half => Direction::Half,
            Direction::CounterClockwise => Direction::Clockwise,
        }
    }
}

/// One move as a (layer, direction) pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Move {
    pub layer: usize,
    pub direction: Direction,
}

impl Move {
    pub fn from_id(id: u32, layer_count: usize) -> Option<Self> {
        if layer_count == 0 {
            return None;
        }
        let id = id as usize;
        Some(Self {
            layer: id % layer_count,
            direction: Direction::from_index(id / layer_count)?,
        })
    }

    #[inline]
    pub fn id(&self, layer_count: usize) -> u32 {
        (self.layer + self.direction.index() * layer_count) as u32
    }
}

/// Whether `candidate` may follow `previous`.
///
/// Only layers matter. A move may not turn the layer just turned, and within
/// a run of parallel layers each must be higher than the one before, which
/// keeps exactly one ordering of commuting moves.
pub fn is_legal_next(size: usize, previous: &[u32], candidate: u32) -> bool {
    let layers = layer_count(size);
    if layers == 0 {
        return false;
    }
    let per_axis = layers / 3;
    let layer = candidate as usize % layers;
    let axis = layer / per_axis;

    for &earlier in previous.iter().rev() {
        let earlier_layer = earlier as usize % layers;
        if earlier_layer == layer {
            return false;
        }
        if earlier_layer / per_axis != axis {
            break;
        }
        if layer < earlier_layer {
            return false;
        }
    }
    true
}

/// The sequence undoing `moves`.
pub fn inverse_sequence(size: usize, moves: &[u32]) -> Vec<u32> {
    let layers = layer_count(size);
    moves
        .iter()
        .rev()
        .filter_map(|&id| Move::from_id(id, layers))
        .map(|m| {
            Move {
                layer: m.layer,
                direction: m.direction.inverse(),
            }
            .id(layers)
        })
        .collect()
}

/// Face letter and depth (1 = outermost) of a layer.
fn layer_face(layer: usize, layers: usize) -> (Face, usize, bool) {
    let per_axis = layers / 3;
    let per_face = per_axis / 2;
    let axis = Axis::ALL[layer / per_axis % 3];
    let within = layer % per_axis;
    if within < per_face {
        (axis.low_face(), within + 1, true)
    } else {
        (axis.high_face(), per_axis - within, false)
    }
}

/// Notation for one move: depth prefix, face letter, then `'` or `2`.
///
/// Directions are stored from the low face's point of view, so moves named by
/// a high face (R, U, F) read mirrored.
pub fn move_text(id: u32, size: usize) -> Option<String> {
    let layers = layer_count(size);
    let m = Move::from_id(id, layers)?;
    let (face, depth, low) = layer_face(m.layer, layers);
    let mut text = String::new();
    if depth > 1 {
        text.push_str(&depth.to_string());
    }
    text.push(face.letter());
    match (m.direction, low) {
        (Direction::Half, _) => text.push('2'),
        (Direction::CounterClockwise, true) | (Direction::Clockwise, false) => text.push('\''),
        _ => {}
    }
    Some(text)
}

/// Parses one move written by [`move_text`].
pub fn parse_move(token: &str, size: usize) -> Result<u32, MoveError> {
    let bad = || MoveError::Notation(token.to_string());
    let layers = layer_count(size);
    let per_axis = layers / 3;
    let per_face = per_axis / 2;

    let letter_at = token.find(|c: char| c.is_ascii_alphabetic()).ok_or_else(bad)?;
    let depth = match &token[..letter_at] {
        "" => 1,
        digits => digits.parse::<usize>().map_err(|_| bad())?,
    };
    let mut rest = token[letter_at..].chars();
    let face = rest.next().and_then(Face::from_letter).ok_or_else(bad)?;
    let suffix: String = rest.collect();
    if depth == 0 || depth > per_face {
        return Err(bad());
    }

    let axis = face.axis();
    let low = face.is_low();
    let within = if low { depth - 1 } else { per_axis - depth };
    let direction = match (suffix.as_str(), low) {
        ("2", _) => Direction::Half,
        ("", true) | ("'", false) => Direction::Clockwise,
        ("'", true) | ("", false) => Direction::CounterClockwise,
        _ => return Err(bad()),
    };
    Ok(Move {
        layer: axis.index() * per_axis + within,
        direction,
    }
    .id(layers))
}

/// Many move sequences of one length for one cube size.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MoveSet {
    size: usize,
    length: usize,
    count: usize,
    capacity: usize,
    compressed: bool,
    data: PackedStore,
}

impl MoveSet {
    /// An empty set for sequences of `length` moves with room for `capacity`
    /// of them before it has to grow.
    pub fn new(size: usize, length: usize, capacity: usize) -> Result<Self, MoveError> {
        check_size(size)?;
        let capacity = capacity.max(1);
        Ok(Self {
            size,
            length,
            count: 0,
            capacity,
            compressed: false,
            data: PackedStore::new(Self::max_id(size), capacity * length),
        })
    }

    /// A set holding one sequence.
    pub fn from_moves(size: usize, moves: &[u32]) -> Result<Self, MoveError> {
        let mut set = Self::new(size, moves.len(), 1)?;
        set.push(moves)?;
        Ok(set)
    }

    /// Every legal sequence of `length` moves, index-compressed.
    pub fn self_indexed(size: usize, length: usize) -> Result<Self, MoveError> {
        check_size(size)?;
        if length == 0 {
            return Err(MoveError::WrongLength {
                expected: 1,
                found: 0,
            });
        }
        let layers = layer_count(size);
        let mut flat = Vec::new();
        let mut prefix = Vec::with_capacity(length);
        collect_sequences(size, layers, length, &mut prefix, &mut flat);
        let count = flat.len() / length;
        log::debug!("self-indexed {count} base sequences of length {length} for size {size}");
        Ok(Self {
            size,
            length,
            count,
            capacity: count.max(1),
            compressed: true,
            data: PackedStore::with_values(Self::max_id(size), &flat, 0)?,
        })
    }

    fn max_id(size: usize) -> u32 {
        (layer_count(size) * 3) as u32
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Moves per sequence.
    #[inline]
    pub fn length(&self) -> usize {
        self.length
    }

    #[inline]
    pub fn layer_count(&self) -> usize {
        layer_count(self.size)
    }

    /// Number of addressable sequence ids.
    pub fn len(&self) -> usize {
        if self.compressed {
            self.count * 3
        } else {
            self.count
        }
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn is_compressed(&self) -> bool {
        self.compressed
    }

    /// Appends a sequence of move ids and returns its id.
    ///
    /// A full set grows by a tenth, reallocating its store.
    pub fn push(&mut self, moves: &[u32]) -> Result<usize, MoveError> {
        if self.compressed {
            return Err(MoveError::Sealed);
        }
        if moves.len() != self.length {
            return Err(MoveError::WrongLength {
                expected: self.length,
                found: moves.len(),
            });
        }
        let limit = Self::max_id(self.size);
        if let Some(&id) = moves.iter().find(|&&id| id >= limit) {
            return Err(MoveError::MoveOutOfRange { id, limit });
        }
        if self.count == self.capacity {
            let grown = (self.capacity + self.capacity.div_ceil(10)).max(self.capacity + 1);
            self.data = self.data.resized(grown * self.length);
            self.capacity = grown;
        }
        self.data.write_range(self.count * self.length, moves)?;
        self.count += 1;
        Ok(self.count - 1)
    }

    /// Appends a sequence given as (layer, direction) pairs.
    pub fn push_pairs(&mut self, moves: &[Move]) -> Result<usize, MoveError> {
        let layers = self.layer_count();
        if let Some(m) = moves.iter().find(|m| m.layer >= layers) {
            return Err(MoveError::MoveOutOfRange {
                id: m.layer as u32,
                limit: layers as u32,
            });
        }
        let ids: Vec<u32> = moves.iter().map(|m| m.id(layers)).collect();
        self.push(&ids)
    }

    /// Sequence `id` as move ids.
    pub fn moves(&self, id: usize) -> Result<Vec<u32>, MoveError> {
        if id >= self.len() {
            return Err(MoveError::UnknownSequence { id, len: self.len() });
        }
        if self.length == 0 {
            return Ok(Vec::new());
        }
        let (base, direction) = if self.compressed {
            (id % self.count, id / self.count)
        } else {
            (id, 0)
        };
        let start = base * self.length;
        let mut moves = self.data.read_range(start, start + self.length - 1)?;
        if let Some(last) = moves.last_mut() {
            *last += (direction * self.layer_count()) as u32;
        }
        Ok(moves)
    }

    /// Sequence `id` as (layer, direction) pairs.
    pub fn moves_paired(&self, id: usize) -> Result<Vec<Move>, MoveError> {
        let layers = self.layer_count();
        self.moves(id)?
            .into_iter()
            .map(|m| {
                Move::from_id(m, layers).ok_or(MoveError::MoveOutOfRange {
                    id: m,
                    limit: (layers * 3) as u32,
                })
            })
            .collect()
    }

    /// Sequence `id` in face notation, moves separated by `", "`.
    pub fn moves_as_text(&self, id: usize) -> Result<String, MoveError> {
        let texts: Vec<String> = self
            .moves(id)?
            .into_iter()
            .filter_map(|m| move_text(m, self.size))
            .collect();
        Ok(texts.join(", "))
    }

    /// Reads a single sequence from notation. Moves may be separated by
    /// commas, whitespace, or both.
    pub fn parse_text(size: usize, text: &str) -> Result<Self, MoveError> {
        check_size(size)?;
        let moves = text
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|token| !token.is_empty())
            .map(|token| parse_move(token, size))
            .collect::<Result<Vec<u32>, MoveError>>()?;
        Self::from_moves(size, &moves)
    }
}

impl fmt::Display for MoveSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for id in 0..self.len() {
            if id > 0 {
                writeln!(f)?;
            }
            match self.moves_as_text(id) {
                Ok(text) => write!(f, "{text}")?,
                Err(_) => return Err(fmt::Error),
            }
        }
        Ok(())
    }
}

/// Depth-first enumeration of legal sequences; the final move carries its
/// layer only.
fn collect_sequences(size: usize, layers: usize, length: usize, prefix: &mut Vec<u32>, out: &mut Vec<u32>) {
    if prefix.len() == length {
        out.extend_from_slice(prefix);
        return;
    }
    let choices = if prefix.len() + 1 == length {
        layers
    } else {
        layers * 3
    };
    for candidate in 0..choices as u32 {
        if is_legal_next(size, prefix, candidate) {
            prefix.push(candidate);
            collect_sequences(size, layers, length, prefix, out);
            prefix.pop();
        }
    }
}
