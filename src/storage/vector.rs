//! Vector encoding and the `cosine_distance` SQL function
//!
//! Vectors are stored as little-endian `f32` blobs. Nearest-neighbour queries
//! order rows with `cosine_distance(embedding, ?)` inside SQLite, so every
//! pooled connection registers the function on checkout.

use rusqlite::functions::FunctionFlags;
use rusqlite::Connection;
use thiserror::Error;

/// Name of the registered scalar function
pub const COSINE_DISTANCE_FN: &str = "cosine_distance";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum VectorError {
    #[error("vector blob of {0} bytes is not a whole number of f32 values")]
    InvalidBlob(usize),

    #[error("cannot compare vectors of dimension {0} and {1}")]
    DimensionMismatch(usize, usize),

    #[error("vector component {0} is not a finite number")]
    NonFinite(usize),
}

/// Index of the first NaN or infinite component, if any
pub fn first_non_finite(vector: &[f32]) -> Option<usize> {
    vector.iter().position(|v| !v.is_finite())
}

/// Encode a vector as a little-endian f32 blob
pub fn encode_vector(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Decode a little-endian f32 blob
pub fn decode_vector(bytes: &[u8]) -> Result<Vec<f32>, VectorError> {
    if bytes.len() % 4 != 0 {
        return Err(VectorError::InvalidBlob(bytes.len()));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

/// Cosine distance in `[0, 2]`; 0 means same direction
///
/// A zero vector has no direction and sits at distance 1 from everything.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> Result<f32, VectorError> {
    if a.len() != b.len() {
        return Err(VectorError::DimensionMismatch(a.len(), b.len()));
    }
    if let Some(index) = first_non_finite(a).or_else(|| first_non_finite(b)) {
        return Err(VectorError::NonFinite(index));
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(1.0);
    }

    let similarity = (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0);
    Ok((1.0 - similarity) as f32)
}

/// Register `cosine_distance(blob, blob) -> REAL` on a connection
pub fn register_functions(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        COSINE_DISTANCE_FN,
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let a: Vec<u8> = ctx.get(0)?;
            let b: Vec<u8> = ctx.get(1)?;
            let distance = decode_vector(&a)
                .and_then(|a| decode_vector(&b).and_then(|b| cosine_distance(&a, &b)))
                .map_err(|e| rusqlite::Error::UserFunctionError(Box::new(e)))?;
            Ok(distance as f64)
        },
    )
}
