//! Text rendering of a cube as an unfolded net.
//!
//! The net is laid out as a cross, four faces wide and three tall:
//!
//! ```text
//! .U..
//! LFRB
//! .D..
//! ```
//!
//! Each face is drawn as seen from outside the cube with the front face
//! straight ahead, so neighbouring edges line up across the fold. Every sticker
//! is printed as the letter of the face its colour belongs to and unused cells
//! are filled with '.'.

use crate::cube::{CubeError, CubeState};
use crate::geometry::{sticker_index, Face};

/// Net position `(column, row)` of each face, in face squares.
const fn square(face: Face) -> (usize, usize) {
    match face {
        Face::Up => (1, 0),
        Face::Left => (0, 1),
        Face::Front => (1, 1),
        Face::Right => (2, 1),
        Face::Back => (3, 1),
        Face::Down => (1, 2),
    }
}

/// Face-local coordinates of the cell drawn at `(col, row)` of a face square.
const fn local(face: Face, col: usize, row: usize, size: usize) -> (usize, usize) {
    let last = size - 1;
    match face {
        // rows run from the back edge towards the front
        Face::Up => (col, row),
        Face::Down => (col, last - row),
        Face::Front | Face::Left => (col, last - row),
        Face::Right | Face::Back => (last - col, last - row),
    }
}

/// Renders cube `cube` of `state` as a net, one line per sticker row.
pub fn format_net(state: &CubeState, cube: usize) -> Result<String, CubeError> {
    let size = state.size();
    let stickers = state.stickers(cube)?;

    let width = 4 * size;
    let mut rows = vec![vec!['.'; width]; 3 * size];
    for face in Face::ALL {
        let (across, down) = square(face);
        for row in 0..size {
            for col in 0..size {
                let (fx, fy) = local(face, col, row, size);
                let color = stickers[sticker_index(face, fx, fy, size)];
                let letter = Face::from_index(color as usize).map_or('?', Face::letter);
                rows[down * size + row][across * size + col] = letter;
            }
        }
    }

    let mut output = String::with_capacity(rows.len() * (width + 1));
    for row in rows {
        output.extend(row);
        output.push('\n');
    }
    Ok(output)
}
