//! Binary serialization of feature matrices
//!
//! Format: 4-byte magic, u32 LE rows, u32 LE cols, then rows*cols f32 LE
//! values in row-major order. Round-trip is exact; a 0-row matrix is valid.

use ndarray::Array2;

use crate::error::{Error, Result};

const MAGIC: &[u8; 4] = b"TDM1";
const HEADER_LEN: usize = 12;

pub fn encode(matrix: &Array2<f32>) -> Vec<u8> {
    let (rows, cols) = matrix.dim();
    let mut out = Vec::with_capacity(HEADER_LEN + rows * cols * 4);
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&(rows as u32).to_le_bytes());
    out.extend_from_slice(&(cols as u32).to_le_bytes());
    for value in matrix.iter() {
        out.extend_from_slice(&value.to_le_bytes());
    }
    out
}

pub fn decode(bytes: &[u8]) -> Result<Array2<f32>> {
    if bytes.len() < HEADER_LEN {
        return Err(Error::Matrix("truncated header".to_string()));
    }
    if &bytes[..4] != MAGIC {
        return Err(Error::Matrix("bad magic".to_string()));
    }

    let rows = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;
    let cols = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize;

    let payload = &bytes[HEADER_LEN..];
    if payload.len() != rows * cols * 4 {
        return Err(Error::Matrix(format!(
            "payload is {} bytes, expected {} for {}x{}",
            payload.len(),
            rows * cols * 4,
            rows,
            cols
        )));
    }

    let values: Vec<f32> = payload
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();

    Array2::from_shape_vec((rows, cols), values).map_err(|e| Error::Matrix(e.to_string()))
}
