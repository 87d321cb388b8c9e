//! Reed-Solomon erasure coding over GF(2^8).
//!
//! A codec is built for a fixed split into `data_shards` data shards and
//! `parity_shards` parity shards (at most 256 in total). It can compute
//! parity ([`ReedSolomon::encode`]), check it ([`ReedSolomon::verify`]),
//! and recover any missing shards from at least `data_shards` survivors
//! ([`ReedSolomon::reconstruct`], [`ReedSolomon::reconstruct_data`]).
//! [`ReedSolomon::split`] and [`ReedSolomon::join`] (plus their
//! interleaved `_multi` variants) move flat byte buffers in and out of
//! shard form.
//!
//! Erasure coding recovers *missing* shards, it does not detect
//! corruption. Integrity checking (hashes, Merkle roots) is the caller's
//! job; corrupted shards must be marked missing before reconstruction.
//!
//! ```
//! use reed_solomon_gf256::ReedSolomon;
//!
//! let rs = ReedSolomon::new(4, 2)?;
//! let mut shards = rs.split(b"some payload to protect")?;
//! rs.encode(&mut shards)?;
//!
//! // Lose up to two shards, anywhere.
//! shards[1] = Vec::new();
//! shards[4] = Vec::new();
//!
//! rs.reconstruct(&mut shards)?;
//! assert!(rs.verify(&shards)?);
//! # Ok::<(), reed_solomon_gf256::Error>(())
//! ```

mod codec;
mod errors;
mod galois;
mod inversion_tree;
mod matrix;
mod options;

pub use codec::{ReedSolomon, MAX_SHARD_COUNT};
pub use errors::{Error, Result};
pub use options::{CodecOptions, MatrixKind};
