//! Solvability checks on a single cube.
//!
//! Stickers can only ever move between cells of the same orbit, so a cube that
//! came from a real puzzle always shows each colour a fixed number of times in
//! every orbit. A failed check names every slot that could be to blame.

use log::debug;

use crate::cube::{slot_layout, CubeError, CubeState, Encoding, IssueKind, SlotIssue};
use crate::geometry::{expected_orbit_colors, face_cell_orbit, orbit_count, orbit_number, Face};

/// Result of [`CubeState::verify`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Verification {
    pub passed: bool,
    pub errors: Vec<SlotIssue>,
}

impl Verification {
    fn failed(errors: Vec<SlotIssue>) -> Self {
        Self {
            passed: false,
            errors,
        }
    }
}

impl CubeState {
    /// Checks that `cube` could have been produced by turning a solved cube.
    ///
    /// Impossible pieces are reported first; the orbit counts are only checked
    /// once every piece is real.
    pub fn verify(&self, cube: usize) -> Result<Verification, CubeError> {
        let single = self.extract(cube)?;
        // piece data may hold codes no piece has; those only surface when the
        // pieces are laid back out as stickers
        let converted = single
            .convert(Encoding::Piece)
            .and_then(|pieces| Ok((pieces.convert(Encoding::Surface)?, pieces)));
        let (surface, pieces) = match converted {
            Ok(both) => both,
            Err(CubeError::IllegalPieces(issues)) => {
                return Ok(Verification::failed(relabel(issues, cube)));
            }
            Err(err) => return Err(err),
        };
        let stickers = surface.stickers(0)?;
        let size = self.size();

        // counts[orbit][color]
        let mut counts = vec![[0usize; 6]; orbit_count(size)];
        for (index, &color) in stickers.iter().enumerate() {
            let within = index % (size * size);
            let orbit = face_cell_orbit(within % size, within / size, size);
            counts[orbit][color as usize] += 1;
        }

        let layout = slot_layout(size);
        let mut errors = Vec::new();
        for (orbit, per_color) in counts.iter().enumerate() {
            let expected = expected_orbit_colors(orbit, size);
            let wrong: Vec<u8> = Face::ALL
                .iter()
                .filter(|face| per_color[face.index()] != expected)
                .map(|face| face.index() as u8)
                .collect();
            if wrong.is_empty() {
                continue;
            }
            debug!("orbit {orbit} miscounts colours {wrong:?}: {per_color:?}");
            for (slot, geometry) in layout.iter().enumerate() {
                if orbit_number(slot, size) != orbit {
                    continue;
                }
                let piece = pieces.cubie(geometry.coord, 0)?;
                let implicated: Vec<u8> = wrong
                    .iter()
                    .copied()
                    .filter(|color| piece.colors().contains(color))
                    .collect();
                if !implicated.is_empty() {
                    errors.push(SlotIssue {
                        cube,
                        slot,
                        kind: IssueKind::OrbitCount {
                            orbit,
                            colors: implicated,
                        },
                    });
                }
            }
        }

        Ok(Verification {
            passed: errors.is_empty(),
            errors,
        })
    }
}

/// Issues from a single-cube copy carry cube 0; point them back at `cube`.
fn relabel(issues: Vec<SlotIssue>, cube: usize) -> Vec<SlotIssue> {
    issues
        .into_iter()
        .map(|issue| SlotIssue { cube, ..issue })
        .collect()
}
