use thiserror::Error;

/// Bytes per cell on disk: floor, west wall, north wall, content.
pub const QUAD_BYTES: usize = 4;
pub const HEADER_BYTES: usize = 3;

#[derive(Debug, Error)]
pub enum MapFileError {
    #[error("map data of {actual} bytes, header promises {expected}")]
    CorruptFile { expected: usize, actual: usize },
}

/// Raw MAP file contents: dimensions plus one 4-byte group per cell in
/// level-major, row-major, column-major order. Part bytes are catalog id + 2,
/// 0 for blank.
pub struct MapFile {
    pub rows: u8,
    pub cols: u8,
    pub levs: u8,
    pub quads: Vec<[u8; QUAD_BYTES]>,
}

impl MapFile {
    pub fn read(bytes: &[u8]) -> Result<Self, MapFileError> {
        if bytes.len() < HEADER_BYTES {
            return Err(MapFileError::CorruptFile {
                expected: HEADER_BYTES,
                actual: bytes.len(),
            });
        }

        let (rows, cols, levs) = (bytes[0], bytes[1], bytes[2]);
        let cells = rows as usize * cols as usize * levs as usize;
        let expected = HEADER_BYTES + cells * QUAD_BYTES;
        if bytes.len() != expected {
            return Err(MapFileError::CorruptFile {
                expected,
                actual: bytes.len(),
            });
        }

        let quads = bytes[HEADER_BYTES..]
            .chunks_exact(QUAD_BYTES)
            .map(|q| [q[0], q[1], q[2], q[3]])
            .collect();

        Ok(MapFile { rows, cols, levs, quads })
    }

    pub fn write(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(HEADER_BYTES + self.quads.len() * QUAD_BYTES);
        bytes.push(self.rows);
        bytes.push(self.cols);
        bytes.push(self.levs);
        for quad in &self.quads {
            bytes.extend_from_slice(quad);
        }
        bytes
    }
}
