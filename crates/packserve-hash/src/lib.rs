//! Object ids and streaming SHA-1 hashing.
//!
//! Everything in the receive-pack pipeline is addressed by the SHA-1 of its
//! canonical encoding. This crate provides the id type, a streaming hasher
//! with collision detection, and a reader wrapper that hashes every byte it
//! delivers (used to verify pack trailers).

pub mod hasher;
pub mod hex;
mod oid;
pub mod reader;

pub use hasher::Hasher;
pub use oid::ObjectId;
pub use reader::HashingReader;

/// Length in bytes of a SHA-1 digest.
pub const DIGEST_LEN: usize = 20;

/// Length in characters of the lowercase hex form.
pub const HEX_LEN: usize = 40;

/// Errors produced by hashing and id parsing.
#[derive(Debug, thiserror::Error)]
pub enum HashError {
    #[error("invalid hash length: expected {expected}, got {actual}")]
    InvalidHashLength { expected: usize, actual: usize },

    #[error("invalid hex length: expected {expected}, got {actual}")]
    InvalidHexLength { expected: usize, actual: usize },

    #[error("invalid hex character '{character}' at position {position}")]
    InvalidHex { position: usize, character: char },

    #[error("sha-1 collision attack detected")]
    Sha1Collision,
}
