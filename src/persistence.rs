//! Cube strings and cube files.
//!
//! A cube string is `CBDTA:<tag>:<size in hex>:<data>`, where `<tag>` is `S`,
//! `F` or `P` and `<data>` has one base-24 digit per stored value. The string
//! carries no width information; the element count is re-derived from the
//! size and tag. Compact data is written with the tag `E`, which nothing
//! accepts back.
//!
//! A cube file holds one cube string per line.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use thiserror::Error;

use crate::cube::{check_size, CubeError, CubeState, Encoding};
use crate::packed::PackedStore;

const HEADER: &str = "CBDTA";
const RADIX: u32 = 24;

#[derive(Error, Debug)]
pub enum PersistError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("line {line}: {source}")]
    Line { line: usize, source: CubeError },
    #[error("{0} holds no cubes")]
    Empty(String),
}

impl CubeState {
    /// Renders cube `cube` as a cube string.
    pub fn to_cube_string(&self, cube: usize) -> Result<String, CubeError> {
        let values = self.cube_values(cube)?;
        let mut text = format!("{HEADER}:{}:{:x}:", self.encoding().tag(), self.size());
        text.reserve(values.len());
        for (index, &value) in values.iter().enumerate() {
            let digit = char::from_digit(value, RADIX).ok_or(CubeError::Unencodable { index, value })?;
            text.push(digit);
        }
        Ok(text)
    }

    /// Parses a single-cube state from a cube string.
    pub fn from_cube_string(text: &str) -> Result<CubeState, CubeError> {
        let parts: Vec<&str> = text.trim().split(':').collect();
        let [header, tag, size, data] = parts.as_slice() else {
            return Err(CubeError::Parse(format!(
                "expected 4 ':'-separated fields, found {}",
                parts.len()
            )));
        };
        if *header != HEADER {
            return Err(CubeError::Parse(format!("unknown header `{header}`")));
        }
        let encoding = match *tag {
            "S" => Encoding::Surface,
            "F" => Encoding::Fast,
            "P" => Encoding::Piece,
            other => return Err(CubeError::Parse(format!("unreadable encoding `{other}`"))),
        };
        let size = usize::from_str_radix(size, 16)
            .map_err(|_| CubeError::Parse(format!("size `{size}` is not hexadecimal")))?;
        check_size(size)?;

        let expected = encoding.per_cube(size);
        let values = data
            .chars()
            .map(|c| {
                c.to_digit(RADIX)
                    .ok_or_else(|| CubeError::Parse(format!("`{c}` is not a base-24 digit")))
            })
            .collect::<Result<Vec<u32>, CubeError>>()?;
        if values.len() != expected {
            return Err(CubeError::Parse(format!(
                "expected {expected} values for a size {size} {encoding:?} cube, found {}",
                values.len()
            )));
        }

        let store = PackedStore::with_values(encoding.max_value(), &values, 0)?.flagged(encoding.flag());
        CubeState::from_store(size, encoding, &store)
    }
}

/// Writes every cube of `state` to `path`, one cube string per line.
pub fn save(path: &Path, state: &CubeState) -> Result<(), PersistError> {
    let mut file = File::create(path)?;
    for cube in 0..state.count() {
        let line = state
            .to_cube_string(cube)
            .map_err(|source| PersistError::Line { line: cube + 1, source })?;
        writeln!(file, "{line}")?;
    }
    Ok(())
}

/// Reads a cube file into one state. Cubes after the first are converted to
/// the first cube's encoding.
pub fn load(path: &Path) -> Result<CubeState, PersistError> {
    let reader = BufReader::new(File::open(path)?);
    let mut state: Option<CubeState> = None;
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let at_line = |source| PersistError::Line {
            line: index + 1,
            source,
        };
        let cube = CubeState::from_cube_string(&line).map_err(at_line)?;
        state = Some(match state.take() {
            None => cube,
            Some(mut loaded) => {
                loaded.append_cubes(&cube).map_err(at_line)?;
                loaded
            }
        });
    }
    state.ok_or_else(|| PersistError::Empty(path.display().to_string()))
}

/// Counts the cube strings in a file without decoding them.
pub fn count(path: &Path) -> Result<usize, PersistError> {
    let text = fs::read_to_string(path)?;
    Ok(text
        .lines()
        .filter(|line| line.trim_start().starts_with(HEADER))
        .count())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Face;

    #[test]
    fn test_solved_cube_strings() {
        let surface = CubeState::solved(2, Encoding::Surface).unwrap();
        assert_eq!(
            surface.to_cube_string(0).unwrap(),
            "CBDTA:S:2:000011112222333344445555"
        );
        let piece = CubeState::solved(2, Encoding::Piece).unwrap();
        let text = piece.to_cube_string(0).unwrap();
        assert!(text.starts_with("CBDTA:P:2:"));
        assert_eq!(CubeState::from_cube_string(&text).unwrap(), piece);
    }

    #[test]
    fn test_hex_size_and_roundtrip() {
        let mut state = CubeState::solved(11, Encoding::Surface).unwrap();
        state.set_sticker(Face::Up, 3, 4, 0, 2).unwrap();
        let text = state.to_cube_string(0).unwrap();
        assert!(text.starts_with("CBDTA:S:b:"));
        assert_eq!(CubeState::from_cube_string(&text).unwrap(), state);
    }

    #[test]
    fn test_rejects_malformed_strings() {
        for bad in [
            "",
            "CBDTA:S:2",
            "CUBE:S:2:000011112222333344445555",
            "CBDTA:E:2:00000000",
            "CBDTA:Q:2:000011112222333344445555",
            "CBDTA:S:zz:000011112222333344445555",
            "CBDTA:S:2:00001111222233334444555",
            "CBDTA:S:2:0000111122223333444455555",
            "CBDTA:S:2:00001111222233334444555?",
            "CBDTA:S:2:000011112222333344445556",
            "CBDTA:S:1:000000",
        ] {
            assert!(CubeState::from_cube_string(bad).is_err(), "{bad:?}");
        }
    }

    #[test]
    fn test_compact_writes_error_tag() {
        let compact = CubeState::solved(3, Encoding::Compact).unwrap();
        let text = compact.to_cube_string(0).unwrap();
        assert!(text.starts_with("CBDTA:E:3:"));
        assert!(CubeState::from_cube_string(&text).is_err());
    }

    #[test]
    fn test_invalid_piece_is_unencodable() {
        let mut piece = CubeState::solved(3, Encoding::Piece).unwrap();
        piece.data_mut().write(0, 255).unwrap();
        assert_eq!(
            piece.to_cube_string(0),
            Err(CubeError::Unencodable { index: 0, value: 255 })
        );
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = std::env::temp_dir().join(format!("cubesolve-persist-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("cubes.txt");

        let mut state = CubeState::solved_many(3, 2, Encoding::Surface).unwrap();
        state.set_sticker(Face::Front, 1, 1, 1, 4).unwrap();
        save(&path, &state).unwrap();
        assert_eq!(count(&path).unwrap(), 2);
        assert_eq!(load(&path).unwrap(), state);

        fs::write(&path, "\n").unwrap();
        assert!(matches!(load(&path), Err(PersistError::Empty(_))));
        fs::write(&path, "CBDTA:S:2:000011112222333344445555\nnonsense\n").unwrap();
        assert!(matches!(load(&path), Err(PersistError::Line { line: 2, .. })));
        fs::remove_dir_all(&dir).unwrap();
    }
}
