//! Cube state: one or more same-size cubes stored in a single [`PackedStore`].
//!
//! Cube `i` occupies values `i * per_cube .. (i + 1) * per_cube`. The meaning
//! of each value depends on the [`Encoding`]. Every mutating operation either
//! succeeds or leaves the previous contents untouched.

use std::fmt;

use log::debug;
use thiserror::Error;

use crate::geometry::{
    clockwise_faces, coords_3d, piece_coords, piece_count, piece_index, sticker_count,
    sticker_index, sticker_of, Coord, Face, FaceList,
};
use crate::packed::{PackedStore, StoreError};
use crate::pieces::{Piece, PieceKind, CODE_COUNT, INVALID};

/// Smallest supported edge length.
pub const MIN_SIZE: usize = 2;
/// Largest supported edge length.
pub const MAX_SIZE: usize = 32;

/// How a cube's values are laid out.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Encoding {
    /// One colour per sticker.
    Surface,
    /// Same layout as `Surface`, used for scratch copies inside searches.
    Fast,
    /// One piece code per piece slot.
    Piece,
    /// Corner codes only. Write-only: nothing converts back from it.
    Compact,
}

impl Encoding {
    pub const ALL: [Encoding; 4] = [
        Encoding::Surface,
        Encoding::Fast,
        Encoding::Piece,
        Encoding::Compact,
    ];

    /// Tag used in cube strings.
    pub const fn tag(self) -> char {
        match self {
            Encoding::Surface => 'S',
            Encoding::Fast => 'F',
            Encoding::Piece => 'P',
            Encoding::Compact => 'E',
        }
    }

    /// Store flag identifying data produced by this encoding.
    pub const fn flag(self) -> u8 {
        match self {
            Encoding::Surface => 0,
            Encoding::Fast => 1,
            Encoding::Piece => 2,
            Encoding::Compact => 3,
        }
    }

    pub fn from_flag(flag: u8) -> Option<Self> {
        Encoding::ALL.into_iter().find(|e| e.flag() == flag)
    }

    /// Values per cube.
    pub const fn per_cube(self, size: usize) -> usize {
        match self {
            Encoding::Surface | Encoding::Fast => sticker_count(size),
            Encoding::Piece => piece_count(size),
            Encoding::Compact => 8,
        }
    }

    /// Largest value the encoding produces.
    pub const fn max_value(self) -> u32 {
        match self {
            Encoding::Surface | Encoding::Fast => 5,
            Encoding::Piece | Encoding::Compact => INVALID as u32,
        }
    }

    /// Whether values are sticker colours (Surface and Fast share a layout).
    pub const fn is_sticker_layout(self) -> bool {
        matches!(self, Encoding::Surface | Encoding::Fast)
    }

    fn accepts(self, value: u32) -> bool {
        match self {
            Encoding::Surface | Encoding::Fast => value < 6,
            Encoding::Piece => value < u32::from(CODE_COUNT) || value == u32::from(INVALID),
            Encoding::Compact => value < u32::from(CODE_COUNT),
        }
    }
}

/// What went wrong with one piece slot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IssueKind {
    /// The slot's colours do not form any real piece.
    FailedConversion,
    /// The slot belongs to an orbit whose colour counts are wrong, and it
    /// holds at least one of the miscounted colours.
    OrbitCount { orbit: usize, colors: Vec<u8> },
}

/// A problem tied to a single piece slot, suitable for highlighting.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlotIssue {
    pub cube: usize,
    pub slot: usize,
    pub kind: IssueKind,
}

impl fmt::Display for SlotIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            IssueKind::FailedConversion => write!(
                f,
                "piece slot {} of cube {}: this piece cannot exist",
                self.slot, self.cube
            ),
            IssueKind::OrbitCount { orbit, colors } => {
                let letters: String = colors
                    .iter()
                    .filter_map(|&c| Face::from_index(c as usize))
                    .map(Face::letter)
                    .collect();
                write!(
                    f,
                    "piece slot {} of cube {}: orbit {} has the wrong number of {} stickers",
                    self.slot, self.cube, orbit, letters
                )
            }
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CubeError {
    #[error("cube size {0} is outside the supported range {min}..={max}", min = MIN_SIZE, max = MAX_SIZE)]
    UnsupportedSize(usize),
    #[error("`{operation}` is not available for {encoding:?} cubes")]
    UnsupportedEncoding {
        operation: &'static str,
        encoding: Encoding,
    },
    #[error("({x}, {y}, {z}) is not on the surface of a size {size} cube")]
    InteriorCoordinate {
        x: usize,
        y: usize,
        z: usize,
        size: usize,
    },
    #[error("sticker ({x}, {y}) is off a size {size} face")]
    StickerOutOfRange { x: usize, y: usize, size: usize },
    #[error("value {value} is not valid for {encoding:?} data")]
    InvalidValue { value: u32, encoding: Encoding },
    #[error("color {0} is not in 0..6")]
    InvalidColor(u32),
    #[error("cube {cube} does not exist (state holds {count})")]
    CubeOutOfRange { cube: usize, count: usize },
    #[error("a state must hold at least one cube")]
    NoCubes,
    #[error("cannot place a {piece:?} in a {slot:?} slot")]
    PieceKindMismatch { slot: PieceKind, piece: PieceKind },
    #[error("piece slot {slot} of cube {cube} holds an impossible piece")]
    InvalidPiece { cube: usize, slot: usize },
    #[error("cube sizes differ: {expected} and {found}")]
    SizeMismatch { expected: usize, found: usize },
    #[error("store holds {len} values, not a whole number of {per_cube}-value cubes")]
    RaggedStore { len: usize, per_cube: usize },
    #[error("{} piece slot(s) hold impossible pieces", .0.len())]
    IllegalPieces(Vec<SlotIssue>),
    #[error("malformed cube string: {0}")]
    Parse(String),
    #[error("value {value} at position {index} does not fit one base-24 digit")]
    Unencodable { index: usize, value: u32 },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A piece slot's grid position and clockwise face list.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Slot {
    pub coord: Coord,
    pub faces: FaceList,
}

impl Slot {
    pub fn kind(&self) -> PieceKind {
        // every surface cell touches between one and three faces
        PieceKind::from_face_count(self.faces.len()).unwrap_or(PieceKind::Center)
    }
}

/// Slot geometry for every piece index of a size.
pub(crate) fn slot_layout(size: usize) -> Vec<Slot> {
    (0..piece_count(size))
        .map(|index| {
            let coord = piece_coords(index, size);
            Slot {
                coord,
                faces: clockwise_faces(coord, size),
            }
        })
        .collect()
}

pub fn check_size(size: usize) -> Result<(), CubeError> {
    if (MIN_SIZE..=MAX_SIZE).contains(&size) {
        Ok(())
    } else {
        Err(CubeError::UnsupportedSize(size))
    }
}

/// One or more cubes of equal size and encoding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CubeState {
    size: usize,
    count: usize,
    encoding: Encoding,
    data: PackedStore,
}

impl CubeState {
    /// A single solved cube.
    pub fn solved(size: usize, encoding: Encoding) -> Result<Self, CubeError> {
        Self::solved_many(size, 1, encoding)
    }

    /// `count` solved cubes.
    pub fn solved_many(size: usize, count: usize, encoding: Encoding) -> Result<Self, CubeError> {
        check_size(size)?;
        if count == 0 {
            return Err(CubeError::NoCubes);
        }
        let one = solved_values(size, encoding);
        let per_cube = one.len();
        let mut data = PackedStore::new(encoding.max_value(), per_cube * count).flagged(encoding.flag());
        for cube in 0..count {
            data.write_range(cube * per_cube, &one)?;
        }
        Ok(Self {
            size,
            count,
            encoding,
            data,
        })
    }

    /// Wraps raw values as a state of `encoding`.
    ///
    /// When the store's flag names a different encoding the values are read
    /// as that encoding and converted. An unflagged store is taken to already
    /// be in `encoding`.
    pub fn from_store(size: usize, encoding: Encoding, store: &PackedStore) -> Result<Self, CubeError> {
        check_size(size)?;
        let source = store
            .flag()
            .and_then(Encoding::from_flag)
            .unwrap_or(encoding);
        let per_cube = source.per_cube(size);
        if store.is_empty() || store.len() % per_cube != 0 {
            return Err(CubeError::RaggedStore {
                len: store.len(),
                per_cube,
            });
        }
        let values = store.to_vec();
        if let Some(&value) = values.iter().find(|&&v| !source.accepts(v)) {
            return Err(CubeError::InvalidValue {
                value,
                encoding: source,
            });
        }
        let data = PackedStore::with_values(source.max_value(), &values, 0)?.flagged(source.flag());
        let state = Self {
            size,
            count: values.len() / per_cube,
            encoding: source,
            data,
        };
        if source == encoding {
            Ok(state)
        } else {
            debug!("converting {source:?} store to {encoding:?}");
            state.convert(encoding)
        }
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of cubes held.
    #[inline]
    pub fn count(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Values per cube.
    #[inline]
    pub fn per_cube(&self) -> usize {
        self.encoding.per_cube(self.size)
    }

    pub fn data(&self) -> &PackedStore {
        &self.data
    }

    pub(crate) fn data_mut(&mut self) -> &mut PackedStore {
        &mut self.data
    }

    pub(crate) fn check_cube(&self, cube: usize) -> Result<(), CubeError> {
        if cube < self.count {
            Ok(())
        } else {
            Err(CubeError::CubeOutOfRange {
                cube,
                count: self.count,
            })
        }
    }

    /// Copy of one cube's values.
    pub fn cube_values(&self, cube: usize) -> Result<Vec<u32>, CubeError> {
        self.check_cube(cube)?;
        let per_cube = self.per_cube();
        Ok(self.data.read_range(cube * per_cube, (cube + 1) * per_cube - 1)?)
    }

    /// A new single-cube state holding a copy of `cube`.
    pub fn extract(&self, cube: usize) -> Result<CubeState, CubeError> {
        let values = self.cube_values(cube)?;
        let data = PackedStore::with_values(self.encoding.max_value(), &values, 0)?
            .flagged(self.encoding.flag());
        Ok(Self {
            size: self.size,
            count: 1,
            encoding: self.encoding,
            data,
        })
    }

    fn check_sticker(&self, x: usize, y: usize) -> Result<(), CubeError> {
        if x < self.size && y < self.size {
            Ok(())
        } else {
            Err(CubeError::StickerOutOfRange {
                x,
                y,
                size: self.size,
            })
        }
    }

    fn check_coord(&self, coord: Coord) -> Result<usize, CubeError> {
        piece_index(coord, self.size).ok_or(CubeError::InteriorCoordinate {
            x: coord.0,
            y: coord.1,
            z: coord.2,
            size: self.size,
        })
    }

    /// Colour of the sticker at face-local `(x, y)` on `face`.
    pub fn sticker(&self, face: Face, x: usize, y: usize, cube: usize) -> Result<u8, CubeError> {
        self.check_cube(cube)?;
        self.check_sticker(x, y)?;
        match self.encoding {
            Encoding::Surface | Encoding::Fast => {
                let index = cube * self.per_cube() + sticker_index(face, x, y, self.size);
                Ok(self.data.read(index)? as u8)
            }
            Encoding::Piece => {
                let coord = coords_3d(face, x, y, self.size);
                let slot = self.check_coord(coord)?;
                let piece = self.cubie(coord, cube)?;
                if !piece.is_valid() {
                    return Err(CubeError::InvalidPiece { cube, slot });
                }
                let faces = clockwise_faces(coord, self.size);
                faces
                    .iter()
                    .position(|&f| f == face)
                    .and_then(|position| piece.color_at(position))
                    .ok_or(CubeError::InvalidPiece { cube, slot })
            }
            Encoding::Compact => Err(CubeError::UnsupportedEncoding {
                operation: "sticker",
                encoding: self.encoding,
            }),
        }
    }

    /// Sets one sticker. Only sticker-layout states accept this; use
    /// [`CubeState::set_sticker_converting`] to edit a piece-encoded state.
    pub fn set_sticker(
        &mut self,
        face: Face,
        x: usize,
        y: usize,
        cube: usize,
        color: u8,
    ) -> Result<(), CubeError> {
        if !self.encoding.is_sticker_layout() {
            return Err(CubeError::UnsupportedEncoding {
                operation: "set_sticker",
                encoding: self.encoding,
            });
        }
        self.check_cube(cube)?;
        self.check_sticker(x, y)?;
        if color >= 6 {
            return Err(CubeError::InvalidColor(u32::from(color)));
        }
        let index = cube * self.per_cube() + sticker_index(face, x, y, self.size);
        self.data.write(index, u32::from(color))?;
        Ok(())
    }

    /// Sets one sticker on a state of any convertible encoding by editing a
    /// sticker-layout copy and converting it back.
    ///
    /// Fails without touching `self` if the edit produces an impossible piece.
    pub fn set_sticker_converting(
        &mut self,
        face: Face,
        x: usize,
        y: usize,
        cube: usize,
        color: u8,
    ) -> Result<(), CubeError> {
        if self.encoding.is_sticker_layout() {
            return self.set_sticker(face, x, y, cube, color);
        }
        let mut surface = self.convert(Encoding::Surface)?;
        surface.set_sticker(face, x, y, cube, color)?;
        *self = surface.convert(self.encoding)?;
        Ok(())
    }

    /// The piece occupying the surface cell at `coord`.
    pub fn cubie(&self, coord: Coord, cube: usize) -> Result<Piece, CubeError> {
        self.check_cube(cube)?;
        let slot = self.check_coord(coord)?;
        let faces = clockwise_faces(coord, self.size);
        let kind = PieceKind::from_face_count(faces.len()).ok_or(CubeError::InteriorCoordinate {
            x: coord.0,
            y: coord.1,
            z: coord.2,
            size: self.size,
        })?;
        match self.encoding {
            Encoding::Surface | Encoding::Fast => {
                let base = cube * self.per_cube();
                let mut colors = [INVALID; 3];
                for (color, &face) in colors.iter_mut().zip(faces.iter()) {
                    *color = self.data.read(base + sticker_of(face, coord, self.size))? as u8;
                }
                Ok(Piece::new(kind, &colors))
            }
            Encoding::Piece => {
                let code = self.data.read(cube * self.per_cube() + slot)?;
                Ok(Piece::decode(kind, code))
            }
            Encoding::Compact => Err(CubeError::UnsupportedEncoding {
                operation: "cubie",
                encoding: self.encoding,
            }),
        }
    }

    /// Places `piece` at the surface cell `coord`.
    pub fn set_cubie(&mut self, coord: Coord, cube: usize, piece: &Piece) -> Result<(), CubeError> {
        self.check_cube(cube)?;
        let slot = self.check_coord(coord)?;
        let faces = clockwise_faces(coord, self.size);
        let slot_kind = PieceKind::from_face_count(faces.len()).unwrap_or(PieceKind::Center);
        if slot_kind != piece.kind() {
            return Err(CubeError::PieceKindMismatch {
                slot: slot_kind,
                piece: piece.kind(),
            });
        }
        match self.encoding {
            Encoding::Surface | Encoding::Fast => {
                if let Some(&bad) = piece.colors().iter().find(|&&c| c >= 6) {
                    return Err(CubeError::InvalidColor(u32::from(bad)));
                }
                let base = cube * self.per_cube();
                for (&face, &color) in faces.iter().zip(piece.colors()) {
                    self.data
                        .write(base + sticker_of(face, coord, self.size), u32::from(color))?;
                }
                Ok(())
            }
            Encoding::Piece => {
                self.data
                    .write(cube * self.per_cube() + slot, u32::from(piece.code()))?;
                Ok(())
            }
            Encoding::Compact => Err(CubeError::UnsupportedEncoding {
                operation: "set_cubie",
                encoding: self.encoding,
            }),
        }
    }

    /// Returns a copy of this state in another encoding.
    ///
    /// Every slot is examined; all impossible pieces are reported together.
    pub fn convert(&self, to: Encoding) -> Result<CubeState, CubeError> {
        use Encoding::*;
        if self.encoding == to {
            return Ok(self.clone());
        }
        match (self.encoding, to) {
            (Surface | Fast, Surface | Fast) => Ok(self.relabelled(to)),
            (Surface | Fast, Piece) => self.stickers_to_pieces(),
            (Piece, Surface | Fast) => self.pieces_to_stickers(to),
            (Piece, Compact) => self.pieces_to_compact(),
            (Surface | Fast, Compact) => self.stickers_to_pieces()?.pieces_to_compact(),
            (Piece, Piece) => Ok(self.clone()),
            (Compact, _) => Err(CubeError::UnsupportedEncoding {
                operation: "convert",
                encoding: Compact,
            }),
        }
    }

    fn relabelled(&self, to: Encoding) -> CubeState {
        let mut state = self.clone();
        state.encoding = to;
        state.data.set_flag(Some(to.flag()));
        state
    }

    fn stickers_to_pieces(&self) -> Result<CubeState, CubeError> {
        let layout = slot_layout(self.size);
        let from_per_cube = self.per_cube();
        let to_per_cube = layout.len();
        let mut data =
            PackedStore::new(Encoding::Piece.max_value(), to_per_cube * self.count).flagged(Encoding::Piece.flag());
        let mut issues = Vec::new();

        for cube in 0..self.count {
            let base = cube * from_per_cube;
            for (index, slot) in layout.iter().enumerate() {
                let mut colors = [INVALID; 3];
                for (color, &face) in colors.iter_mut().zip(slot.faces.iter()) {
                    *color = self.data.load(base + sticker_of(face, slot.coord, self.size)) as u8;
                }
                let code = Piece::new(slot.kind(), &colors).code();
                if code == INVALID {
                    issues.push(SlotIssue {
                        cube,
                        slot: index,
                        kind: IssueKind::FailedConversion,
                    });
                }
                data.store(cube * to_per_cube + index, u32::from(code));
            }
        }

        if !issues.is_empty() {
            return Err(CubeError::IllegalPieces(issues));
        }
        Ok(Self {
            size: self.size,
            count: self.count,
            encoding: Encoding::Piece,
            data,
        })
    }

    fn pieces_to_stickers(&self, to: Encoding) -> Result<CubeState, CubeError> {
        let layout = slot_layout(self.size);
        let from_per_cube = self.per_cube();
        let to_per_cube = to.per_cube(self.size);
        let mut data = PackedStore::new(to.max_value(), to_per_cube * self.count).flagged(to.flag());
        let mut issues = Vec::new();

        for cube in 0..self.count {
            for (index, slot) in layout.iter().enumerate() {
                let piece = Piece::decode(slot.kind(), self.data.load(cube * from_per_cube + index));
                if !piece.is_valid() {
                    issues.push(SlotIssue {
                        cube,
                        slot: index,
                        kind: IssueKind::FailedConversion,
                    });
                    continue;
                }
                for (&face, &color) in slot.faces.iter().zip(piece.colors()) {
                    data.store(
                        cube * to_per_cube + sticker_of(face, slot.coord, self.size),
                        u32::from(color),
                    );
                }
            }
        }

        if !issues.is_empty() {
            return Err(CubeError::IllegalPieces(issues));
        }
        Ok(Self {
            size: self.size,
            count: self.count,
            encoding: to,
            data,
        })
    }

    fn pieces_to_compact(&self) -> Result<CubeState, CubeError> {
        let corners: Vec<usize> = slot_layout(self.size)
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.faces.len() == 3)
            .map(|(index, _)| index)
            .collect();
        let from_per_cube = self.per_cube();
        let mut data = PackedStore::new(Encoding::Compact.max_value(), corners.len() * self.count)
            .flagged(Encoding::Compact.flag());
        let mut issues = Vec::new();

        for cube in 0..self.count {
            for (position, &slot) in corners.iter().enumerate() {
                let code = self.data.load(cube * from_per_cube + slot);
                if code >= u32::from(CODE_COUNT) {
                    issues.push(SlotIssue {
                        cube,
                        slot,
                        kind: IssueKind::FailedConversion,
                    });
                    continue;
                }
                data.store(cube * corners.len() + position, code);
            }
        }

        if !issues.is_empty() {
            return Err(CubeError::IllegalPieces(issues));
        }
        Ok(Self {
            size: self.size,
            count: self.count,
            encoding: Encoding::Compact,
            data,
        })
    }

    /// Brings `other` into this state's encoding, checking sizes.
    fn matching(&self, other: &CubeState) -> Result<CubeState, CubeError> {
        if other.size != self.size {
            return Err(CubeError::SizeMismatch {
                expected: self.size,
                found: other.size,
            });
        }
        other.convert(self.encoding)
    }

    /// Appends every cube of `other`, converting it first if its encoding
    /// differs. Returns the index of the first appended cube.
    pub fn append_cubes(&mut self, other: &CubeState) -> Result<usize, CubeError> {
        let other = self.matching(other)?;
        let first = self.count;
        let per_cube = self.per_cube();
        let mut data = self.data.resized((self.count + other.count) * per_cube);
        data.write_range(first * per_cube, &other.data.to_vec())?;
        self.data = data;
        self.count += other.count;
        Ok(first)
    }

    /// Overwrites cube `cube` with cube `source_cube` of `source`.
    pub fn replace_cube(
        &mut self,
        cube: usize,
        source: &CubeState,
        source_cube: usize,
    ) -> Result<(), CubeError> {
        self.check_cube(cube)?;
        let source = self.matching(&source.extract(source_cube)?)?;
        self.data
            .write_range(cube * self.per_cube(), &source.data.to_vec())?;
        Ok(())
    }

    /// Copies cube `src` over cube `dst` inside this state.
    pub fn copy_cube(&mut self, src: usize, dst: usize) -> Result<(), CubeError> {
        self.check_cube(src)?;
        self.check_cube(dst)?;
        let per_cube = self.per_cube();
        self.data.copy_within(src * per_cube, dst * per_cube, per_cube)?;
        Ok(())
    }

    /// All of one cube's sticker colours in sticker-index order.
    pub fn stickers(&self, cube: usize) -> Result<Vec<u8>, CubeError> {
        match self.encoding {
            Encoding::Surface | Encoding::Fast => {
                Ok(self.cube_values(cube)?.into_iter().map(|v| v as u8).collect())
            }
            Encoding::Piece => {
                let single = self.extract(cube)?.convert(Encoding::Surface)?;
                single.stickers(0)
            }
            Encoding::Compact => Err(CubeError::UnsupportedEncoding {
                operation: "stickers",
                encoding: self.encoding,
            }),
        }
    }

    /// Counts, for every sticker, its same-coloured neighbours on the same
    /// face. Each matching pair therefore scores twice.
    pub fn score(&self, cube: usize) -> Result<u32, CubeError> {
        if self.encoding.is_sticker_layout() {
            self.check_cube(cube)?;
            let base = cube * self.per_cube();
            return Ok(score_with(self.size, |i| self.data.load(base + i)));
        }
        let stickers = self.stickers(cube)?;
        Ok(score_with(self.size, |i| u32::from(stickers[i])))
    }

    /// Whether every face of `cube` shows a single colour.
    pub fn is_solved(&self, cube: usize) -> Result<bool, CubeError> {
        Ok(self.score(cube)? == solved_score(self.size))
    }
}

/// Score of a cube whose faces are each a single colour.
pub const fn solved_score(size: usize) -> u32 {
    (24 * size * (size - 1)) as u32
}

fn score_with(size: usize, color: impl Fn(usize) -> u32) -> u32 {
    let mut score = 0;
    for face in Face::ALL {
        for y in 0..size {
            for x in 0..size {
                let here = color(sticker_index(face, x, y, size));
                if x + 1 < size && color(sticker_index(face, x + 1, y, size)) == here {
                    score += 2;
                }
                if y + 1 < size && color(sticker_index(face, x, y + 1, size)) == here {
                    score += 2;
                }
            }
        }
    }
    score
}

fn solved_values(size: usize, encoding: Encoding) -> Vec<u32> {
    match encoding {
        Encoding::Surface | Encoding::Fast => (0..sticker_count(size))
            .map(|i| (i / (size * size)) as u32)
            .collect(),
        Encoding::Piece => slot_layout(size)
            .iter()
            .map(|slot| {
                Piece::solved(&slot.faces)
                    .map_or(u32::from(INVALID), |p| u32::from(p.code()))
            })
            .collect(),
        Encoding::Compact => slot_layout(size)
            .iter()
            .filter(|slot| slot.faces.len() == 3)
            .filter_map(|slot| Piece::solved(&slot.faces))
            .map(|p| u32::from(p.code()))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solved_roundtrips_through_every_encoding() {
        for size in 2..=5 {
            let surface = CubeState::solved(size, Encoding::Surface).unwrap();
            let piece = surface.convert(Encoding::Piece).unwrap();
            assert_eq!(piece, CubeState::solved(size, Encoding::Piece).unwrap());
            let fast = piece.convert(Encoding::Fast).unwrap();
            assert_eq!(fast.convert(Encoding::Surface).unwrap(), surface);
            assert_eq!(fast.convert(Encoding::Piece).unwrap(), piece);
        }
    }

    #[test]
    fn test_convert_to_own_encoding_is_a_copy() {
        for encoding in [Encoding::Surface, Encoding::Fast, Encoding::Piece, Encoding::Compact] {
            let state = CubeState::solved_many(3, 2, encoding).unwrap();
            assert_eq!(state.convert(encoding).unwrap(), state, "{encoding:?}");
        }
    }

    #[test]
    fn test_solved_piece_codes_are_home_codes() {
        let state = CubeState::solved(3, Encoding::Piece).unwrap();
        let layout = slot_layout(3);
        for (index, slot) in layout.iter().enumerate() {
            let piece = state.cubie(slot.coord, 0).unwrap();
            let home = Piece::solved(slot.faces.as_slice()).unwrap();
            assert!(piece.is_valid(), "slot {index}");
            assert_eq!(piece, home, "slot {index}");
            assert_eq!(piece.piece_code(), piece.code(), "slot {index}");
            assert_eq!(piece.piece_code(), home.code(), "slot {index}");
            assert_eq!(state.data().read(index).unwrap(), u32::from(home.code()));
        }
        // left-down-back corner: home L, partner D
        assert_eq!(state.data().read(0).unwrap(), 0);
    }

    #[test]
    fn test_sticker_agrees_across_encodings() {
        let mut surface = CubeState::solved(4, Encoding::Surface).unwrap();
        surface
            .set_cubie((0, 0, 0), 0, &Piece::new(PieceKind::Corner, &[2, 0, 1]))
            .unwrap();
        let piece = surface.convert(Encoding::Piece).unwrap();
        for face in Face::ALL {
            for y in 0..4 {
                for x in 0..4 {
                    assert_eq!(
                        surface.sticker(face, x, y, 0).unwrap(),
                        piece.sticker(face, x, y, 0).unwrap(),
                        "{face:?} ({x}, {y})"
                    );
                }
            }
        }
        assert_eq!(surface.sticker(Face::Left, 0, 0, 0).unwrap(), 2);
    }

    #[test]
    fn test_set_sticker_rejects_piece_encoding() {
        let mut piece = CubeState::solved(3, Encoding::Piece).unwrap();
        assert!(matches!(
            piece.set_sticker(Face::Up, 1, 1, 0, 0),
            Err(CubeError::UnsupportedEncoding { .. })
        ));
        // a lone centre recolour is a legal piece
        piece
            .set_sticker_converting(Face::Up, 1, 1, 0, 0)
            .unwrap();
        assert_eq!(piece.sticker(Face::Up, 1, 1, 0).unwrap(), 0);
        assert_eq!(piece.encoding(), Encoding::Piece);
    }

    #[test]
    fn test_impossible_edit_leaves_state_intact() {
        let mut piece = CubeState::solved(3, Encoding::Piece).unwrap();
        let before = piece.clone();
        // left and right colours can never share an edge
        let err = piece
            .set_sticker_converting(Face::Down, 0, 1, 0, 5)
            .unwrap_err();
        assert!(matches!(err, CubeError::IllegalPieces(ref issues) if issues.len() == 1));
        assert_eq!(piece, before);
    }

    #[test]
    fn test_conversion_collects_every_bad_slot() {
        let mut surface = CubeState::solved(3, Encoding::Surface).unwrap();
        surface.set_sticker(Face::Left, 0, 0, 0, 5).unwrap();
        surface.set_sticker(Face::Right, 2, 2, 0, 0).unwrap();
        match surface.convert(Encoding::Piece) {
            Err(CubeError::IllegalPieces(issues)) => {
                let slots: Vec<usize> = issues.iter().map(|i| i.slot).collect();
                assert_eq!(slots, vec![0, 25]);
            }
            other => panic!("expected illegal pieces, got {other:?}"),
        }
    }

    #[test]
    fn test_coordinate_and_range_errors() {
        let state = CubeState::solved(3, Encoding::Surface).unwrap();
        assert!(matches!(
            state.cubie((1, 1, 1), 0),
            Err(CubeError::InteriorCoordinate { .. })
        ));
        assert!(matches!(
            state.sticker(Face::Up, 3, 0, 0),
            Err(CubeError::StickerOutOfRange { .. })
        ));
        assert_eq!(
            state.sticker(Face::Up, 0, 0, 1),
            Err(CubeError::CubeOutOfRange { cube: 1, count: 1 })
        );
        assert_eq!(CubeState::solved(1, Encoding::Surface), Err(CubeError::UnsupportedSize(1)));
    }

    #[test]
    fn test_append_converts_and_replace_overwrites() {
        let mut state = CubeState::solved(3, Encoding::Surface).unwrap();
        let mut other = CubeState::solved(3, Encoding::Piece).unwrap();
        other
            .set_cubie((0, 0, 0), 0, &Piece::new(PieceKind::Corner, &[1, 2, 0]))
            .unwrap();
        assert_eq!(state.append_cubes(&other).unwrap(), 1);
        assert_eq!(state.count(), 2);
        assert_eq!(state.sticker(Face::Left, 0, 0, 1).unwrap(), 1);
        state.replace_cube(0, &state.clone(), 1).unwrap();
        assert_eq!(state.cube_values(0).unwrap(), state.cube_values(1).unwrap());
        let wrong_size = CubeState::solved(4, Encoding::Surface).unwrap();
        assert!(matches!(
            state.append_cubes(&wrong_size),
            Err(CubeError::SizeMismatch { .. })
        ));
    }

    #[test]
    fn test_from_store_honours_flag() {
        let piece = CubeState::solved(3, Encoding::Piece).unwrap();
        let state = CubeState::from_store(3, Encoding::Surface, piece.data()).unwrap();
        assert_eq!(state, CubeState::solved(3, Encoding::Surface).unwrap());
        let unflagged = PackedStore::with_values(5, &[0; 54], 0).unwrap();
        let state = CubeState::from_store(3, Encoding::Surface, &unflagged).unwrap();
        assert_eq!(state.count(), 1);
        let ragged = PackedStore::with_values(5, &[0; 50], 0).unwrap();
        assert!(matches!(
            CubeState::from_store(3, Encoding::Surface, &ragged),
            Err(CubeError::RaggedStore { .. })
        ));
    }

    #[test]
    fn test_compact_is_write_only() {
        let compact = CubeState::solved(3, Encoding::Piece)
            .unwrap()
            .convert(Encoding::Compact)
            .unwrap();
        assert_eq!(compact, CubeState::solved(3, Encoding::Compact).unwrap());
        assert_eq!(compact.per_cube(), 8);
        assert!(compact.convert(Encoding::Surface).is_err());
    }

    #[test]
    fn test_score() {
        for size in 2..=4 {
            let state = CubeState::solved(size, Encoding::Surface).unwrap();
            assert_eq!(state.score(0).unwrap(), solved_score(size));
            assert!(state.is_solved(0).unwrap());
        }
        let mut state = CubeState::solved(3, Encoding::Surface).unwrap();
        state.set_sticker(Face::Front, 1, 1, 0, 4).unwrap();
        // the centre loses four neighbours, each pair counted twice
        assert_eq!(state.score(0).unwrap(), solved_score(3) - 8);
        assert!(!state.is_solved(0).unwrap());
    }

    #[test]
    fn test_slot_issue_display() {
        let issue = SlotIssue {
            cube: 0,
            slot: 4,
            kind: IssueKind::OrbitCount {
                orbit: 0,
                colors: vec![0, 5],
            },
        };
        assert_eq!(
            issue.to_string(),
            "piece slot 4 of cube 0: orbit 0 has the wrong number of LR stickers"
        );
    }
}
