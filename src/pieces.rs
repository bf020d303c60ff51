//! Single piece ("cubie") contents and their integer codes.
//!
//! A piece stores the colour showing on each of its 1 to 3 faces, listed
//! clockwise from its home face. Edges and corners pack into a code
//! `home · 4 + partner`, where `partner` indexes the four colours that can sit
//! next to `home`. A corner's third colour is implied by the first two.

use crate::geometry::Face;

/// Code and colour marker for an impossible piece.
pub const INVALID: u8 = 255;

/// Number of distinct edge/corner codes.
pub const CODE_COUNT: u8 = 24;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PieceKind {
    Center,
    Edge,
    Corner,
}

impl PieceKind {
    /// Kind of a slot touching `faces` outer faces.
    pub fn from_face_count(faces: usize) -> Option<Self> {
        match faces {
            1 => Some(PieceKind::Center),
            2 => Some(PieceKind::Edge),
            3 => Some(PieceKind::Corner),
            _ => None,
        }
    }

    #[inline]
    pub const fn face_count(self) -> usize {
        match self {
            PieceKind::Center => 1,
            PieceKind::Edge => 2,
            PieceKind::Corner => 3,
        }
    }
}

/// The four colours adjacent to `home`, in L, D, B, F, U, R order.
pub const fn partners(home: Face) -> [Face; 4] {
    match home {
        Face::Left | Face::Right => [Face::Down, Face::Back, Face::Front, Face::Up],
        Face::Down | Face::Up => [Face::Left, Face::Back, Face::Front, Face::Right],
        Face::Back | Face::Front => [Face::Left, Face::Down, Face::Up, Face::Right],
    }
}

/// The colour that completes a clockwise corner starting `first, second`.
///
/// Clockwise triples have normals with determinant −1, so the third normal is
/// the negated cross product of the first two. Returns `None` when the two
/// faces are not adjacent.
pub fn corner_third(first: Face, second: Face) -> Option<Face> {
    let [ax, ay, az] = first.normal();
    let [bx, by, bz] = second.normal();
    let cross = [ay * bz - az * by, az * bx - ax * bz, ax * by - ay * bx];
    Face::from_normal([-cross[0], -cross[1], -cross[2]])
}

/// One slot's contents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Piece {
    kind: PieceKind,
    colors: [u8; 3],
}

impl Piece {
    /// Builds a piece from its colours, clockwise from the home face.
    ///
    /// Extra colours beyond the kind's face count are ignored; missing ones
    /// are filled with [`INVALID`].
    pub fn new(kind: PieceKind, colors: &[u8]) -> Self {
        let mut packed = [INVALID; 3];
        for (slot, &color) in packed.iter_mut().zip(colors).take(kind.face_count()) {
            *slot = color;
        }
        Self {
            kind,
            colors: packed,
        }
    }

    /// The solved piece for a slot whose clockwise faces are `faces`.
    pub fn solved(faces: &[Face]) -> Option<Self> {
        let kind = PieceKind::from_face_count(faces.len())?;
        let colors: Vec<u8> = faces.iter().map(|face| face.index() as u8).collect();
        Some(Self::new(kind, &colors))
    }

    /// Expands a code back into colours.
    ///
    /// Codes outside the kind's range yield an invalid piece instead of
    /// failing.
    pub fn decode(kind: PieceKind, code: u32) -> Self {
        let invalid = Self {
            kind,
            colors: [INVALID; 3],
        };
        match kind {
            PieceKind::Center => match Face::from_index(code as usize) {
                Some(face) => Self::new(kind, &[face.index() as u8]),
                None => invalid,
            },
            PieceKind::Edge | PieceKind::Corner => {
                if code >= u32::from(CODE_COUNT) {
                    return invalid;
                }
                let Some(home) = Face::from_index(code as usize / 4) else {
                    return invalid;
                };
                let partner = partners(home)[code as usize % 4];
                if kind == PieceKind::Edge {
                    return Self::new(kind, &[home.index() as u8, partner.index() as u8]);
                }
                match corner_third(home, partner) {
                    Some(third) => Self::new(
                        kind,
                        &[home.index() as u8, partner.index() as u8, third.index() as u8],
                    ),
                    None => invalid,
                }
            }
        }
    }

    #[inline]
    pub fn kind(&self) -> PieceKind {
        self.kind
    }

    /// Colours clockwise from the home face.
    #[inline]
    pub fn colors(&self) -> &[u8] {
        &self.colors[..self.kind.face_count()]
    }

    fn faces(&self) -> Option<[Face; 3]> {
        let mut faces = [Face::Left; 3];
        for (face, &color) in faces.iter_mut().zip(self.colors()) {
            *face = Face::from_index(color as usize)?;
        }
        Some(faces)
    }

    /// Whether the colours form a piece that exists on a real cube.
    pub fn is_valid(&self) -> bool {
        let Some(faces) = self.faces() else {
            return false;
        };
        match self.kind {
            PieceKind::Center => true,
            PieceKind::Edge => faces[0] != faces[1] && faces[0] != faces[1].opposite(),
            PieceKind::Corner => corner_third(faces[0], faces[1]) == Some(faces[2]),
        }
    }

    /// The piece's code in its current orientation, or [`INVALID`].
    pub fn code(&self) -> u8 {
        if !self.is_valid() {
            return INVALID;
        }
        let home = self.colors[0];
        match self.kind {
            PieceKind::Center => home,
            PieceKind::Edge | PieceKind::Corner => {
                let Some(home_face) = Face::from_index(home as usize) else {
                    return INVALID;
                };
                let partner = partners(home_face)
                    .iter()
                    .position(|face| face.index() as u8 == self.colors[1]);
                match partner {
                    Some(partner) => home * 4 + partner as u8,
                    None => INVALID,
                }
            }
        }
    }

    /// The code with orientation stripped: the same piece turned so its
    /// smallest colour comes first.
    pub fn piece_code(&self) -> u8 {
        let smallest = self
            .colors()
            .iter()
            .enumerate()
            .min_by_key(|&(_, &color)| color)
            .map_or(0, |(position, _)| position);
        let n = self.kind.face_count();
        // rotate right by (n - smallest) to bring that colour to the front
        self.rotate(((n - smallest) % n) as u32).code()
    }

    /// Cycles the colours `times` steps; each step moves the last colour to
    /// the front.
    #[must_use]
    pub fn rotate(&self, times: u32) -> Self {
        let n = self.kind.face_count();
        let shift = times as usize % n;
        let mut colors = self.colors;
        colors[..n].rotate_right(shift);
        Self {
            kind: self.kind,
            colors,
        }
    }

    /// Colour on the `position`th face clockwise from home.
    #[inline]
    pub fn color_at(&self, position: usize) -> Option<u8> {
        self.colors().get(position).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_roundtrip() {
        for kind in [PieceKind::Edge, PieceKind::Corner] {
            for code in 0..CODE_COUNT {
                let piece = Piece::decode(kind, u32::from(code));
                assert!(piece.is_valid(), "{kind:?} {code}");
                assert_eq!(piece.code(), code, "{kind:?} {code}");
            }
        }
        for color in 0..6 {
            assert_eq!(Piece::decode(PieceKind::Center, color).code(), color as u8);
        }
    }

    #[test]
    fn test_out_of_range_codes_are_invalid() {
        assert_eq!(Piece::decode(PieceKind::Corner, 24).code(), INVALID);
        assert_eq!(Piece::decode(PieceKind::Edge, 1000).code(), INVALID);
        assert_eq!(Piece::decode(PieceKind::Center, 6).code(), INVALID);
        assert!(!Piece::decode(PieceKind::Center, 255).is_valid());
    }

    #[test]
    fn test_listed_corner_triples() {
        let triples = [[0, 1, 2], [0, 3, 1], [0, 2, 4], [0, 4, 3], [1, 5, 2], [1, 3, 5], [2, 5, 4], [3, 4, 5]];
        for colors in triples {
            let piece = Piece::new(PieceKind::Corner, &colors);
            assert!(piece.is_valid(), "{colors:?}");
            assert!(piece.rotate(1).is_valid());
            // a mirrored corner cannot exist
            let mirrored = Piece::new(PieceKind::Corner, &[colors[0], colors[2], colors[1]]);
            assert!(!mirrored.is_valid(), "{colors:?}");
        }
    }

    #[test]
    fn test_edge_validity() {
        assert!(Piece::new(PieceKind::Edge, &[0, 1]).is_valid());
        assert!(!Piece::new(PieceKind::Edge, &[0, 5]).is_valid());
        assert!(!Piece::new(PieceKind::Edge, &[3, 3]).is_valid());
        assert!(!Piece::new(PieceKind::Edge, &[3, 6]).is_valid());
    }

    #[test]
    fn test_rotate() {
        let corner = Piece::new(PieceKind::Corner, &[0, 1, 2]);
        assert_eq!(corner.rotate(1).colors(), &[2, 0, 1]);
        assert_eq!(corner.rotate(2).colors(), &[1, 2, 0]);
        assert_eq!(corner.rotate(3), corner);
        let edge = Piece::new(PieceKind::Edge, &[4, 5]);
        assert_eq!(edge.rotate(1).colors(), &[5, 4]);
        assert_eq!(edge.rotate(2), edge);
        let center = Piece::new(PieceKind::Center, &[3]);
        assert_eq!(center.rotate(7), center);
    }

    #[test]
    fn test_piece_code_strips_orientation() {
        let corner = Piece::new(PieceKind::Corner, &[2, 5, 4]);
        for turns in 0..3 {
            assert_eq!(corner.rotate(turns).piece_code(), corner.piece_code());
        }
        assert_eq!(corner.piece_code(), Piece::new(PieceKind::Corner, &[2, 5, 4]).code());
        let edge = Piece::new(PieceKind::Edge, &[4, 0]);
        assert_eq!(edge.piece_code(), Piece::new(PieceKind::Edge, &[0, 4]).code());
    }
}
