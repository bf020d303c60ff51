//! Coordinate geometry of a hollow N×N×N cube.
//!
//! Three index spaces are used throughout the crate:
//! - 3D grid coordinates `(x, y, z)`, each in `0..size`, with the origin at the
//!   left-bottom-back corner. Only cells touching an outer face exist.
//! - Sticker indices: `face * size² + fy * size + fx`, where `(fx, fy)` are the
//!   face-local coordinates returned by [`face_coords`].
//! - Piece-slot indices: the left face, then one ring per middle x-slice
//!   (bottom strip, back/front pairs, top strip), then the right face.
//!
//! Every move table is expressed against these orderings, so they must not
//! change.

/// A 3D grid coordinate.
pub type Coord = (usize, usize, usize);

/// The six faces in storage order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Face {
    Left = 0,
    Down = 1,
    Back = 2,
    Front = 3,
    Up = 4,
    Right = 5,
}

impl Face {
    pub const ALL: [Face; 6] = [
        Face::Left,
        Face::Down,
        Face::Back,
        Face::Front,
        Face::Up,
        Face::Right,
    ];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Face> {
        Face::ALL.get(index).copied()
    }

    pub const fn opposite(self) -> Face {
        Face::ALL[5 - self as usize]
    }

    pub const fn letter(self) -> char {
        match self {
            Face::Left => 'L',
            Face::Down => 'D',
            Face::Back => 'B',
            Face::Front => 'F',
            Face::Up => 'U',
            Face::Right => 'R',
        }
    }

    pub fn from_letter(letter: char) -> Option<Face> {
        Face::ALL.into_iter().find(|face| face.letter() == letter)
    }

    /// Outward unit normal.
    pub const fn normal(self) -> [i32; 3] {
        match self {
            Face::Left => [-1, 0, 0],
            Face::Right => [1, 0, 0],
            Face::Down => [0, -1, 0],
            Face::Up => [0, 1, 0],
            Face::Back => [0, 0, -1],
            Face::Front => [0, 0, 1],
        }
    }

    pub fn from_normal(normal: [i32; 3]) -> Option<Face> {
        Face::ALL.into_iter().find(|face| face.normal() == normal)
    }

    pub const fn axis(self) -> Axis {
        match self {
            Face::Left | Face::Right => Axis::X,
            Face::Down | Face::Up => Axis::Y,
            Face::Back | Face::Front => Axis::Z,
        }
    }

    /// Whether this face sits at the low end (coordinate 0) of its axis.
    pub const fn is_low(self) -> bool {
        matches!(self, Face::Left | Face::Down | Face::Back)
    }
}

/// A rotation axis. Layers perpendicular to `X` are the L/R slices, and so on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn low_face(self) -> Face {
        match self {
            Axis::X => Face::Left,
            Axis::Y => Face::Down,
            Axis::Z => Face::Back,
        }
    }

    pub const fn high_face(self) -> Face {
        self.low_face().opposite()
    }

    #[inline]
    pub const fn component(self, (x, y, z): Coord) -> usize {
        match self {
            Axis::X => x,
            Axis::Y => y,
            Axis::Z => z,
        }
    }

    /// Rotates a vector by a quarter turn about this axis.
    ///
    /// The turn is clockwise when seen from the low face (L, D or B), which is
    /// counter-clockwise from the high face.
    #[inline]
    pub const fn quarter_turn(self, [x, y, z]: [i32; 3]) -> [i32; 3] {
        match self {
            Axis::X => [x, -z, y],
            Axis::Y => [z, y, -x],
            Axis::Z => [-y, x, z],
        }
    }
}

/// Converts a grid coordinate to doubled coordinates centred on the cube.
///
/// Doubling keeps the centre integral for even sizes: `center_doubled = size - 1`.
#[inline]
const fn to_doubled((x, y, z): Coord, size: usize) -> [i32; 3] {
    let m = size as i32 - 1;
    [2 * x as i32 - m, 2 * y as i32 - m, 2 * z as i32 - m]
}

#[inline]
const fn from_doubled([x, y, z]: [i32; 3], size: usize) -> Coord {
    let m = size as i32 - 1;
    (
        ((x + m) / 2) as usize,
        ((y + m) / 2) as usize,
        ((z + m) / 2) as usize,
    )
}

/// Moves a grid coordinate `turns` quarter turns about `axis`.
pub fn rotate_coord(coord: Coord, axis: Axis, turns: usize, size: usize) -> Coord {
    let mut doubled = to_doubled(coord, size);
    for _ in 0..turns % 4 {
        doubled = axis.quarter_turn(doubled);
    }
    from_doubled(doubled, size)
}

/// Turns a face's normal `turns` quarter turns about `axis`.
pub fn rotate_face(face: Face, axis: Axis, turns: usize) -> Face {
    let mut normal = face.normal();
    for _ in 0..turns % 4 {
        normal = axis.quarter_turn(normal);
    }
    // rotations map unit axis vectors onto unit axis vectors
    Face::from_normal(normal).unwrap_or(face)
}

/// Up to three faces touched by one piece.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FaceList {
    faces: [Face; 3],
    len: u8,
}

impl FaceList {
    const EMPTY: Self = Self {
        faces: [Face::Left; 3],
        len: 0,
    };

    fn push(&mut self, face: Face) {
        if (self.len as usize) < self.faces.len() {
            self.faces[self.len as usize] = face;
            self.len += 1;
        }
    }

    #[inline]
    pub fn as_slice(&self) -> &[Face] {
        &self.faces[..self.len as usize]
    }

    fn swap_last_two(&mut self) {
        self.faces.swap(1, 2);
    }
}

impl std::ops::Deref for FaceList {
    type Target = [Face];

    fn deref(&self) -> &[Face] {
        self.as_slice()
    }
}

/// Stickers per cube: `6 · size²`.
#[inline]
pub const fn sticker_count(size: usize) -> usize {
    6 * size * size
}

/// Piece slots per cube: `size³ − (size − 2)³`.
#[inline]
pub const fn piece_count(size: usize) -> usize {
    if size < 2 {
        return size;
    }
    size * size * size - (size - 2) * (size - 2) * (size - 2)
}

/// Whether the coordinate lies inside the grid and on its outer shell.
pub const fn is_surface((x, y, z): Coord, size: usize) -> bool {
    let last = size - 1;
    x < size && y < size && z < size && (x == 0 || x == last || y == 0 || y == last || z == 0 || z == last)
}

/// Faces touched by the cell at `coord`, in L, D, B, F, U, R order.
pub fn touching_faces((x, y, z): Coord, size: usize) -> FaceList {
    let last = size - 1;
    let mut faces = FaceList::EMPTY;
    if x == 0 {
        faces.push(Face::Left);
    }
    if y == 0 {
        faces.push(Face::Down);
    }
    if z == 0 {
        faces.push(Face::Back);
    }
    if z == last {
        faces.push(Face::Front);
    }
    if y == last {
        faces.push(Face::Up);
    }
    if x == last {
        faces.push(Face::Right);
    }
    faces
}

/// Whether a corner's L-D-B ordered faces run counter-clockwise.
///
/// This happens for the front-left and back-right corner columns; `y` does not
/// matter.
#[inline]
pub const fn is_mirrored_corner((x, _, z): Coord, size: usize) -> bool {
    let last = size - 1;
    (x == 0 && z == last) || (x == last && z == 0)
}

/// Touching faces ordered clockwise starting from the home face.
pub fn clockwise_faces(coord: Coord, size: usize) -> FaceList {
    let mut faces = touching_faces(coord, size);
    if faces.len() == 3 && is_mirrored_corner(coord, size) {
        faces.swap_last_two();
    }
    faces
}

/// Face-local coordinates of a grid cell on `face`.
#[inline]
pub const fn face_coords(face: Face, (x, y, z): Coord) -> (usize, usize) {
    match face {
        Face::Left | Face::Right => (z, y),
        Face::Down | Face::Up => (x, z),
        Face::Back | Face::Front => (x, y),
    }
}

/// Inverse of [`face_coords`].
#[inline]
pub const fn coords_3d(face: Face, fx: usize, fy: usize, size: usize) -> Coord {
    let last = size - 1;
    match face {
        Face::Left => (0, fy, fx),
        Face::Right => (last, fy, fx),
        Face::Down => (fx, 0, fy),
        Face::Up => (fx, last, fy),
        Face::Back => (fx, fy, 0),
        Face::Front => (fx, fy, last),
    }
}

#[inline]
pub const fn sticker_index(face: Face, fx: usize, fy: usize, size: usize) -> usize {
    face.index() * size * size + fy * size + fx
}

/// Inverse of [`sticker_index`] for one cube.
#[inline]
pub fn sticker_position(index: usize, size: usize) -> (Face, usize, usize) {
    let face_size = size * size;
    let face = Face::ALL[(index / face_size) % 6];
    let within = index % face_size;
    (face, within % size, within / size)
}

/// Sticker index of the sticker on `face` belonging to the cell at `coord`.
#[inline]
pub fn sticker_of(face: Face, coord: Coord, size: usize) -> usize {
    let (fx, fy) = face_coords(face, coord);
    sticker_index(face, fx, fy, size)
}

/// Cells in one middle x-slice ring.
#[inline]
const fn ring_len(size: usize) -> usize {
    4 * size - 4
}

/// Grid coordinate of a piece slot.
pub fn piece_coords(index: usize, size: usize) -> Coord {
    let face_size = size * size;
    let ring = ring_len(size);
    let right_start = face_size + ring * (size - 2);
    let last = size - 1;

    if index < face_size {
        (0, index / size, index % size)
    } else if index >= right_start {
        let offset = index - right_start;
        (last, offset / size, offset % size)
    } else {
        let offset = index - face_size;
        let x = offset / ring + 1;
        let in_ring = offset % ring;
        if in_ring < size {
            // bottom strip
            (x, 0, in_ring)
        } else if in_ring >= ring - size {
            // top strip
            (x, last, in_ring - (ring - size))
        } else {
            // back/front pairs, one pair per middle row
            let pair = in_ring - size;
            (x, pair / 2 + 1, (pair % 2) * last)
        }
    }
}

/// Piece slot of a grid coordinate, or `None` for interior or out-of-range cells.
pub fn piece_index(coord: Coord, size: usize) -> Option<usize> {
    if !is_surface(coord, size) {
        return None;
    }
    let (x, y, z) = coord;
    let face_size = size * size;
    let ring = ring_len(size);
    let last = size - 1;

    let index = if x == 0 {
        y * size + z
    } else if x == last {
        face_size + ring * (size - 2) + y * size + z
    } else {
        let ring_start = face_size + ring * (x - 1);
        if y == 0 {
            ring_start + z
        } else if y == last {
            ring_start + ring - size + z
        } else if z == 0 {
            ring_start + size + (y - 1) * 2
        } else {
            ring_start + size + (y - 1) * 2 + 1
        }
    };
    Some(index)
}

/// The `n`th triangle number.
#[inline]
pub const fn triangle(n: usize) -> usize {
    n * (n + 1) / 2
}

pub fn is_triangle(n: usize) -> bool {
    let mut k = 0;
    while triangle(k) < n {
        k += 1;
    }
    triangle(k) == n
}

/// Distance of one face-local coordinate from the centre line.
///
/// For even sizes the two middle rows are both at distance zero.
#[inline]
const fn centre_offset(v: usize, size: usize) -> usize {
    let center = size / 2;
    if size % 2 == 1 {
        v.abs_diff(center)
    } else if v < center {
        center - 1 - v
    } else {
        v - center
    }
}

/// Orbit of a face-local cell.
///
/// The orbit is the triangle number of the cell's onion layer (its ring
/// counted outward from the face centre) plus its distance from the nearest
/// centre line. Cells with different orbit numbers can never exchange
/// stickers.
pub const fn face_cell_orbit(fx: usize, fy: usize, size: usize) -> usize {
    let dx = centre_offset(fx, size);
    let dy = centre_offset(fy, size);
    let (layer, from_mid) = if dx > dy { (dx, dy) } else { (dy, dx) };
    triangle(layer) + from_mid
}

/// Orbit number of a piece slot, measured on its home face.
pub fn orbit_number(index: usize, size: usize) -> usize {
    let coord = piece_coords(index, size);
    let home = touching_faces(coord, size)[0];
    let (fx, fy) = face_coords(home, coord);
    face_cell_orbit(fx, fy, size)
}

/// Number of distinct orbit numbers on a cube of `size`.
pub const fn orbit_count(size: usize) -> usize {
    triangle(size.div_ceil(2))
}

/// How many stickers of each colour an orbit must contain across the cube.
pub fn expected_orbit_colors(orbit: usize, size: usize) -> usize {
    let odd = size % 2 == 1;
    if is_triangle(orbit) {
        match (odd, orbit == 0) {
            (true, true) => 1,
            (true, false) => 4,
            (false, true) => 4,
            (false, false) => 8,
        }
    } else if is_triangle(orbit + 1) {
        // corner-like orbit on the diagonal
        4
    } else {
        8
    }
}

/// Number of turnable layers: every slice except the fixed middle of odd cubes.
pub const fn layer_count(size: usize) -> usize {
    if size % 2 == 0 {
        3 * size
    } else {
        3 * (size - 1)
    }
}

/// A turnable slice: the axis it turns about and its coordinate on that axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Layer {
    pub axis: Axis,
    pub slice: usize,
}

impl Layer {
    /// Decodes a layer id in `0..layer_count(size)`.
    pub fn from_id(id: usize, size: usize) -> Layer {
        let per_axis = layer_count(size) / 3;
        let axis = Axis::ALL[(id / per_axis) % 3];
        let mut slice = id % per_axis;
        if size % 2 == 1 && slice >= (size - 1) / 2 {
            // skip the fixed middle slice
            slice += 1;
        }
        Layer { axis, slice }
    }

    #[inline]
    pub fn contains(&self, coord: Coord) -> bool {
        self.axis.component(coord) == self.slice
    }
}
