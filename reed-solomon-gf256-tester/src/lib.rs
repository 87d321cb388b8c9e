//! Shared helpers for tests and benches: a fixed RNG seed, a blob of
//! pseudo-random payload bytes generated at build time, and shard
//! construction/drop utilities. Kept free of a dependency on the codec
//! crate so both its unit tests and its benches can use them.

use rand::prelude::*;

pub static SMALL_RNG_SEED: [u8; 32] = [
	11, 0, 4, 0xA7, 19, 88, 3, 0x5C, 61, 7, 0x42, 0, 23, 0b101, 97, 44, 2, 71, 30, 0xF0, 5, 5, 1,
	0, 8, 16, 32, 64, 128, 255, 13, 37,
];

/// Demo payload bytes, generated via `build.rs`.
pub const BYTES: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/rand_data.bin"));

/// Build a full shard array: data shards filled from `payload` (cycled as
/// needed), parity shards zeroed and ready for encoding.
pub fn build_shards(
	data_shards: usize,
	parity_shards: usize,
	shard_size: usize,
	payload: &[u8],
) -> Vec<Vec<u8>> {
	assert!(!payload.is_empty(), "payload must not be empty");
	let mut cycle = payload.iter().copied().cycle();
	let mut shards = Vec::with_capacity(data_shards + parity_shards);
	for _ in 0..data_shards {
		shards.push((&mut cycle).take(shard_size).collect());
	}
	for _ in 0..parity_shards {
		shards.push(vec![0u8; shard_size]);
	}
	shards
}

/// Build a full shard array with random data shards drawn from `rng`.
pub fn random_shards(
	data_shards: usize,
	parity_shards: usize,
	shard_size: usize,
	rng: &mut impl Rng,
) -> Vec<Vec<u8>> {
	let mut shards = Vec::with_capacity(data_shards + parity_shards);
	for _ in 0..data_shards {
		let mut shard = vec![0u8; shard_size];
		rng.fill_bytes(&mut shard);
		shards.push(shard);
	}
	for _ in 0..parity_shards {
		shards.push(vec![0u8; shard_size]);
	}
	shards
}

/// Mark the shards at `indices` as missing (empty buffers).
pub fn clear_shards(shards: &mut [Vec<u8>], indices: &[usize]) {
	for &index in indices {
		shards[index] = Vec::new();
	}
}

/// Drop `max_drop` shards deterministically: half at the front, the rest
/// at the back. Returns the dropped indices.
pub fn deterministic_drop_shards(shards: &mut [Vec<u8>], max_drop: usize) -> Vec<usize> {
	assert!(max_drop <= shards.len());
	let total = shards.len();
	let front = max_drop / 2;
	let mut dropped = Vec::with_capacity(max_drop);
	for i in 0..front {
		shards[i] = Vec::new();
		dropped.push(i);
	}
	for i in (total - (max_drop - front))..total {
		shards[i] = Vec::new();
		dropped.push(i);
	}
	dropped
}

/// Drop exactly `max_drop` shards at random positions. Returns the dropped
/// indices, sorted.
pub fn drop_random_max(shards: &mut [Vec<u8>], max_drop: usize, rng: &mut impl Rng) -> Vec<usize> {
	let mut dropped: Vec<usize> = rand::seq::index::sample(rng, shards.len(), max_drop).into_iter().collect();
	dropped.sort_unstable();
	for &index in &dropped {
		shards[index] = Vec::new();
	}
	dropped
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn payload_is_generated() {
		assert_eq!(BYTES.len(), 1_000_000);
	}

	#[test]
	fn deterministic_drop_spreads_front_and_back() {
		let mut shards = build_shards(4, 2, 8, &[1, 2, 3]);
		let dropped = deterministic_drop_shards(&mut shards, 3);
		assert_eq!(dropped, vec![0, 4, 5]);
		for (i, shard) in shards.iter().enumerate() {
			assert_eq!(shard.is_empty(), dropped.contains(&i));
		}
	}

	#[test]
	fn random_drop_drops_exactly_n() {
		let mut rng = SmallRng::from_seed(SMALL_RNG_SEED);
		let mut shards = build_shards(10, 4, 8, &[9]);
		let dropped = drop_random_max(&mut shards, 4, &mut rng);
		assert_eq!(dropped.len(), 4);
		assert_eq!(shards.iter().filter(|s| s.is_empty()).count(), 4);
	}
}
