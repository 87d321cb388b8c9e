//! The coder: matrix construction, encode/verify/reconstruct and the
//! split/join helpers, plus the byte-axis parallel dispatch feeding the
//! slice-multiply kernels.
//!
//! Shard arrays are `Vec<u8>` buffers owned by the caller; an empty
//! buffer marks a missing shard. All non-empty shards in one call must
//! share the same length.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use smallvec::SmallVec;
use tracing::debug;

use crate::errors::*;
use crate::galois::{self, Kernel};
use crate::inversion_tree::InversionTree;
use crate::matrix::Matrix;
use crate::options::{CodecOptions, MatrixKind};

/// The order of GF(2^8) bounds the total shard count.
pub const MAX_SHARD_COUNT: usize = 256;

type ShardRefs<'a> = SmallVec<[&'a [u8]; 32]>;
type ShardRefsMut<'a> = SmallVec<[&'a mut [u8]; 32]>;
type Indices = SmallVec<[usize; 32]>;

/// Reed-Solomon codec for one `(data_shards, parity_shards)` split.
///
/// Built once and reused; `encode`, `verify` and the reconstruct calls are
/// safe to run concurrently as long as each call works on its own shard
/// array. The decode-matrix cache tolerates concurrent readers and
/// writers internally.
#[derive(Debug)]
pub struct ReedSolomon {
	data_shards: usize,
	parity_shards: usize,
	total_shards: usize,
	matrix: Matrix,
	tree: InversionTree,
	options: CodecOptions,
	kernel: Kernel,
}

/// The default coding matrix: a Vandermonde matrix normalised by the
/// inverse of its top square. The top becomes the identity (so encoding
/// leaves the data shards untouched) while every square subset of rows
/// stays invertible.
fn build_matrix(data_shards: usize, total_shards: usize) -> Result<Matrix> {
	let vm = Matrix::vandermonde(total_shards, data_shards)?;
	let top = vm.sub_matrix(0, 0, data_shards, data_shards)?;
	vm.multiply(&top.invert()?)
}

fn build_matrix_cauchy(data_shards: usize, total_shards: usize) -> Result<Matrix> {
	let mut m = Matrix::new(total_shards, data_shards)?;
	for r in 0..total_shards {
		if r < data_shards {
			m.set(r, r, 1);
		} else {
			for c in 0..data_shards {
				// r >= data_shards > c, so r ^ c is never zero here.
				m.set(r, c, galois::gal_inverse((r ^ c) as u8));
			}
		}
	}
	Ok(m)
}

/// The PARv1 construction: identity on top, a transposed Vandermonde
/// starting at 1 below. Reproduced exactly as the format specifies it,
/// including its known failure to guarantee recovery.
fn build_matrix_par1(data_shards: usize, total_shards: usize) -> Result<Matrix> {
	let mut m = Matrix::new(total_shards, data_shards)?;
	for r in 0..total_shards {
		if r < data_shards {
			m.set(r, r, 1);
		} else {
			for c in 0..data_shards {
				m.set(r, c, galois::gal_exp((c + 1) as u8, r - data_shards));
			}
		}
	}
	Ok(m)
}

/// First non-empty shard length, or 0 when every shard is empty.
fn shard_size(shards: &[Vec<u8>]) -> usize {
	shards.iter().map(Vec::len).find(|&len| len != 0).unwrap_or(0)
}

/// All non-empty shards must share one non-zero length; empty shards are
/// only tolerated when `allow_empty` is set (reconstruction input).
/// Returns the common length.
fn check_shards(shards: &[Vec<u8>], allow_empty: bool) -> Result<usize> {
	let size = shard_size(shards);
	if size == 0 {
		return Err(Error::NoShardData);
	}
	for shard in shards {
		if shard.len() != size && (!shard.is_empty() || !allow_empty) {
			return Err(Error::ShardSizeMismatch);
		}
	}
	Ok(size)
}

impl ReedSolomon {
	pub fn new(data_shards: usize, parity_shards: usize) -> Result<Self> {
		Self::with_options(data_shards, parity_shards, CodecOptions::default())
	}

	pub fn with_options(
		data_shards: usize,
		parity_shards: usize,
		options: CodecOptions,
	) -> Result<Self> {
		if data_shards == 0 || parity_shards == 0 {
			return Err(Error::InvalidShardCount);
		}
		let total_shards = data_shards + parity_shards;
		if total_shards > MAX_SHARD_COUNT {
			return Err(Error::TooManyShards);
		}

		let matrix = match options.matrix_kind {
			MatrixKind::Vandermonde => build_matrix(data_shards, total_shards)?,
			MatrixKind::Cauchy => build_matrix_cauchy(data_shards, total_shards)?,
			MatrixKind::Par1 => build_matrix_par1(data_shards, total_shards)?,
		};
		let tree = InversionTree::new(data_shards, parity_shards)?;
		let kernel = options.kernel();
		debug!(data_shards, parity_shards, kind = ?options.matrix_kind, ?kernel, "created codec");

		Ok(Self { data_shards, parity_shards, total_shards, matrix, tree, options, kernel })
	}

	pub fn data_shard_count(&self) -> usize {
		self.data_shards
	}

	pub fn parity_shard_count(&self) -> usize {
		self.parity_shards
	}

	pub fn total_shard_count(&self) -> usize {
		self.total_shards
	}

	#[cfg(test)]
	pub(crate) fn coding_matrix(&self) -> &Matrix {
		&self.matrix
	}

	/// View of the bottom `parity_shards` rows of the coding matrix.
	fn parity_rows(&self) -> ShardRefs<'_> {
		(self.data_shards..self.total_shards).map(|r| self.matrix.row(r)).collect()
	}

	/// Compute the parity shards from the data shards, overwriting
	/// `shards[data_shards..]`. The data shards are left untouched.
	pub fn encode(&self, shards: &mut [Vec<u8>]) -> Result<()> {
		if shards.len() != self.total_shards {
			return Err(Error::TooFewShards);
		}
		let size = check_shards(shards, false)?;

		let (data, parity) = shards.split_at_mut(self.data_shards);
		let inputs: ShardRefs<'_> = data.iter().map(|shard| shard.as_slice()).collect();
		let mut outputs: ShardRefsMut<'_> =
			parity.iter_mut().map(|shard| shard.as_mut_slice()).collect();

		self.code_some_shards(&self.parity_rows(), &inputs, &mut outputs, size);
		Ok(())
	}

	/// Check that the parity shards match the data shards. Nothing is
	/// modified; the check bails out at the first mismatching segment.
	pub fn verify(&self, shards: &[Vec<u8>]) -> Result<bool> {
		if shards.len() != self.total_shards {
			return Err(Error::TooFewShards);
		}
		let size = check_shards(shards, false)?;

		let inputs: ShardRefs<'_> =
			shards[..self.data_shards].iter().map(|shard| shard.as_slice()).collect();
		let to_check: ShardRefs<'_> =
			shards[self.data_shards..].iter().map(|shard| shard.as_slice()).collect();

		Ok(self.check_some_shards(&self.parity_rows(), &inputs, &to_check, size))
	}

	/// Recreate all missing shards, data and parity. Missing shards are
	/// empty buffers; their existing capacity is reused where it suffices.
	/// The result is complete but unauthenticated, use `verify` to check it.
	pub fn reconstruct(&self, shards: &mut [Vec<u8>]) -> Result<()> {
		self.reconstruct_internal(shards, false)
	}

	/// Recreate only the missing data shards. Missing parity shards are
	/// left empty, so `verify` on the result may fail.
	pub fn reconstruct_data(&self, shards: &mut [Vec<u8>]) -> Result<()> {
		self.reconstruct_internal(shards, true)
	}

	fn reconstruct_internal(&self, shards: &mut [Vec<u8>], data_only: bool) -> Result<()> {
		if shards.len() != self.total_shards {
			return Err(Error::TooFewShards);
		}
		let shard_size = check_shards(shards, true)?;

		let present: SmallVec<[bool; 32]> = shards.iter().map(|shard| !shard.is_empty()).collect();
		let number_present = present.iter().filter(|&&p| p).count();
		let data_present = present[..self.data_shards].iter().filter(|&&p| p).count();
		if number_present == self.total_shards || (data_only && data_present == self.data_shards) {
			return Ok(());
		}
		if number_present < self.data_shards {
			return Err(Error::TooFewShards);
		}

		// The surviving set is the first data_shards present rows. Rows
		// found missing before that set is complete form the cache key for
		// the decode matrix.
		let mut valid_indices: Indices = SmallVec::new();
		let mut invalid_indices: Indices = SmallVec::new();
		for row in 0..self.total_shards {
			if valid_indices.len() == self.data_shards {
				break;
			}
			if present[row] {
				valid_indices.push(row);
			} else {
				invalid_indices.push(row);
			}
		}

		let decode_matrix = self.data_decode_matrix(&valid_indices, &invalid_indices)?;

		// Recreate the missing data shards: the decode matrix row i maps the
		// surviving set back to original data shard i.
		for i in 0..self.data_shards {
			if !present[i] {
				shards[i].resize(shard_size, 0);
			}
		}
		{
			let mut sub_shards: ShardRefs<'_> = SmallVec::new();
			let mut outputs: ShardRefsMut<'_> = SmallVec::new();
			let mut matrix_rows: ShardRefs<'_> = SmallVec::new();
			for (i, shard) in shards.iter_mut().enumerate() {
				if present[i] {
					if sub_shards.len() < self.data_shards {
						sub_shards.push(shard.as_slice());
					}
				} else if i < self.data_shards {
					outputs.push(shard.as_mut_slice());
					matrix_rows.push(decode_matrix.row(i));
				}
			}
			self.code_some_shards(&matrix_rows, &sub_shards, &mut outputs, shard_size);
		}

		if data_only {
			return Ok(());
		}

		// With the data shards whole again, recompute missing parity from
		// the parity rows of the coding matrix.
		for i in self.data_shards..self.total_shards {
			if !present[i] {
				shards[i].resize(shard_size, 0);
			}
		}
		let (data, parity) = shards.split_at_mut(self.data_shards);
		let inputs: ShardRefs<'_> = data.iter().map(|shard| shard.as_slice()).collect();
		let mut outputs: ShardRefsMut<'_> = SmallVec::new();
		let mut matrix_rows: ShardRefs<'_> = SmallVec::new();
		for (j, shard) in parity.iter_mut().enumerate() {
			if !present[self.data_shards + j] {
				outputs.push(shard.as_mut_slice());
				matrix_rows.push(self.matrix.row(self.data_shards + j));
			}
		}
		self.code_some_shards(&matrix_rows, &inputs, &mut outputs, shard_size);
		Ok(())
	}

	fn data_decode_matrix(
		&self,
		valid_indices: &[usize],
		invalid_indices: &[usize],
	) -> Result<Arc<Matrix>> {
		if let Some(cached) = self.tree.get_inverted_matrix(invalid_indices) {
			return Ok(cached);
		}

		debug!(?invalid_indices, "decode matrix cache miss, inverting sub-matrix");
		let mut sub_matrix = Matrix::new(self.data_shards, self.data_shards)?;
		for (sub_row, &valid) in valid_indices.iter().enumerate() {
			for c in 0..self.data_shards {
				sub_matrix.set(sub_row, c, self.matrix.get(valid, c));
			}
		}
		let decode_matrix = Arc::new(sub_matrix.invert()?);

		// A racing reconstruction of the same invalid set may have inserted
		// already; the cache keeps whichever landed first and both results
		// are identical anyway.
		self.tree.insert_inverted_matrix(invalid_indices, decode_matrix.clone(), self.total_shards)?;
		Ok(decode_matrix)
	}

	/// Multiply `matrix_rows` into the input shards, writing one output
	/// shard per row. Inputs-outer, outputs-inner keeps the active input
	/// segment hot in cache; the first input column overwrites, the rest
	/// accumulate.
	fn code_some_shards(
		&self,
		matrix_rows: &[&[u8]],
		inputs: &[&[u8]],
		outputs: &mut [&mut [u8]],
		byte_count: usize,
	) {
		if outputs.is_empty() || byte_count == 0 {
			return;
		}
		let seg = self.segment_size(byte_count, 32);
		if self.options.max_parallelism <= 1 || seg >= byte_count {
			self.code_segment(matrix_rows, inputs, outputs, 0);
			return;
		}

		// Carve every output into the same byte segments; each worker owns
		// one segment across all outputs and never touches another's bytes.
		let mut segments: Vec<(usize, Vec<&mut [u8]>)> = Vec::new();
		let mut rest: Vec<&mut [u8]> = Vec::with_capacity(outputs.len());
		for output in outputs.iter_mut() {
			rest.push(&mut output[..]);
		}
		let mut start = 0;
		while start < byte_count {
			let len = seg.min(byte_count - start);
			let mut heads = Vec::with_capacity(rest.len());
			let mut tails = Vec::with_capacity(rest.len());
			for output in std::mem::take(&mut rest) {
				let (head, tail) = output.split_at_mut(len);
				heads.push(head);
				tails.push(tail);
			}
			rest = tails;
			segments.push((start, heads));
			start += len;
		}

		segments.into_par_iter().for_each(|(start, mut segment_outputs)| {
			self.code_segment(matrix_rows, inputs, &mut segment_outputs, start);
		});
	}

	fn code_segment(
		&self,
		matrix_rows: &[&[u8]],
		inputs: &[&[u8]],
		outputs: &mut [&mut [u8]],
		start: usize,
	) {
		let len = outputs[0].len();
		for (c, input) in inputs.iter().enumerate() {
			let input = &input[start..start + len];
			for (r, output) in outputs.iter_mut().enumerate() {
				if c == 0 {
					galois::mul_slice(matrix_rows[r][c], input, output, self.kernel);
				} else {
					galois::mul_slice_xor(matrix_rows[r][c], input, output, self.kernel);
				}
			}
		}
	}

	/// Compute parity into scratch segments and compare against `to_check`.
	/// A shared flag lets every worker stop at the next input-column
	/// boundary once any of them saw a mismatch.
	fn check_some_shards(
		&self,
		matrix_rows: &[&[u8]],
		inputs: &[&[u8]],
		to_check: &[&[u8]],
		byte_count: usize,
	) -> bool {
		let same = AtomicBool::new(true);
		let seg = self.segment_size(byte_count, 16);
		if self.options.max_parallelism <= 1 || byte_count <= self.options.min_split_size {
			return self.check_segment(matrix_rows, inputs, to_check, 0, byte_count, &same);
		}

		let mut ranges: Vec<(usize, usize)> = Vec::new();
		let mut start = 0;
		while start < byte_count {
			let len = seg.min(byte_count - start);
			ranges.push((start, len));
			start += len;
		}
		ranges.into_par_iter().for_each(|(start, len)| {
			if !same.load(Ordering::Acquire) {
				return;
			}
			if !self.check_segment(matrix_rows, inputs, to_check, start, len, &same) {
				same.store(false, Ordering::Release);
			}
		});
		same.load(Ordering::Acquire)
	}

	fn check_segment(
		&self,
		matrix_rows: &[&[u8]],
		inputs: &[&[u8]],
		to_check: &[&[u8]],
		start: usize,
		len: usize,
		same: &AtomicBool,
	) -> bool {
		let mut scratch: Vec<Vec<u8>> = (0..to_check.len()).map(|_| vec![0u8; len]).collect();
		for (c, input) in inputs.iter().enumerate() {
			if !same.load(Ordering::Acquire) {
				// Another worker already found a mismatch; the overall answer
				// is settled, so this segment's result no longer matters.
				return true;
			}
			let input = &input[start..start + len];
			for (r, out) in scratch.iter_mut().enumerate() {
				galois::mul_slice_xor(matrix_rows[r][c], input, out, self.kernel);
			}
		}
		scratch
			.iter()
			.zip(to_check.iter())
			.all(|(calc, check)| calc[..] == check[start..start + len])
	}

	/// Segment length for one parallel worker: an even share of the byte
	/// count, no smaller than `min_split_size`, rounded up to `align` so
	/// vector kernels see full lanes everywhere but the final segment.
	fn segment_size(&self, byte_count: usize, align: usize) -> usize {
		let per_worker = byte_count / self.options.max_parallelism.max(1);
		let per_worker = per_worker.max(self.options.min_split_size);
		(per_worker + align - 1) & !(align - 1)
	}

	/// Split `data` into `total_shards` equally sized shards: the data
	/// spread over the first `data_shards`, the tail zero-padded, and empty
	/// parity shards allocated ready for `encode`.
	pub fn split(&self, data: &[u8]) -> Result<Vec<Vec<u8>>> {
		if data.is_empty() {
			return Err(Error::ShortData);
		}
		let per_shard = data.len().div_ceil(self.data_shards);
		let mut chunks = data.chunks(per_shard);
		let mut shards = Vec::with_capacity(self.total_shards);
		for _ in 0..self.total_shards {
			let mut shard = Vec::with_capacity(per_shard);
			if let Some(chunk) = chunks.next() {
				shard.extend_from_slice(chunk);
			}
			shard.resize(per_shard, 0);
			shards.push(shard);
		}
		Ok(shards)
	}

	/// Interleave consecutive `subsize`-byte chunks of `data` across the
	/// data shards (chunk 0 to shard 0, chunk 1 to shard 1, and so on,
	/// wrapping to the next offset). Every given shard is re-lengthened to
	/// the common shard size inside its existing capacity; parity shards
	/// are zeroed ready for `encode`. The final round is zero-padded.
	pub fn split_multi(&self, data: &[u8], shards: &mut [Vec<u8>], subsize: usize) -> Result<()> {
		if subsize == 0 {
			return Err(Error::InvalidInput);
		}
		if shards.len() < self.data_shards {
			return Err(Error::TooFewShards);
		}
		let round_size = self.data_shards * subsize;
		let num_rounds = data.len().div_ceil(round_size);
		let shard_size = num_rounds * subsize;

		for shard in shards.iter_mut() {
			if shard.capacity() < shard_size {
				return Err(Error::InvalidInput);
			}
			shard.clear();
			shard.resize(shard_size, 0);
		}

		for (chunk_index, chunk) in data.chunks(subsize).enumerate() {
			let shard = &mut shards[chunk_index % self.data_shards];
			let offset = (chunk_index / self.data_shards) * subsize;
			shard[offset..offset + chunk.len()].copy_from_slice(chunk);
		}
		Ok(())
	}

	/// Concatenate the first `data_shards` shards into `dst`, writing
	/// exactly `out_size` bytes.
	pub fn join<W: Write>(&self, dst: &mut W, shards: &[Vec<u8>], out_size: usize) -> Result<()> {
		if shards.len() < self.data_shards {
			return Err(Error::TooFewShards);
		}
		let shards = &shards[..self.data_shards];

		let mut available = 0usize;
		for shard in shards {
			if shard.is_empty() {
				return Err(Error::ReconstructRequired);
			}
			available += shard.len();
			if available >= out_size {
				break;
			}
		}
		if available < out_size {
			return Err(Error::ShortData);
		}

		let mut remaining = out_size;
		for shard in shards {
			if remaining < shard.len() {
				dst.write_all(&shard[..remaining])?;
				return Ok(());
			}
			dst.write_all(shard)?;
			remaining -= shard.len();
		}
		Ok(())
	}

	/// Join shards produced by `split_multi`: read the data shards as an
	/// interleaved stream of `subsize` chunks in shard-major order, skip
	/// the first `skip` bytes of that stream and write `write_len` bytes.
	pub fn join_multi<W: Write>(
		&self,
		dst: &mut W,
		shards: &[Vec<u8>],
		subsize: usize,
		skip: usize,
		write_len: usize,
	) -> Result<()> {
		if subsize == 0 {
			return Err(Error::InvalidInput);
		}
		if shards.len() < self.data_shards {
			return Err(Error::TooFewShards);
		}
		let shards = &shards[..self.data_shards];

		let mut available = 0usize;
		for shard in shards {
			if shard.is_empty() {
				return Err(Error::ReconstructRequired);
			}
			available += shard.len();
			if available >= skip + write_len {
				break;
			}
		}
		if available < skip + write_len {
			return Err(Error::ShortData);
		}

		let mut skip = skip;
		let mut remaining = write_len;
		let mut offset = 0;
		while remaining > 0 {
			for shard in shards {
				if offset + subsize > shard.len() {
					return Err(Error::ShortData);
				}
				let mut chunk = &shard[offset..offset + subsize];
				if skip >= chunk.len() {
					skip -= chunk.len();
					continue;
				}
				if skip > 0 {
					chunk = &chunk[skip..];
					skip = 0;
				}
				if remaining < chunk.len() {
					chunk = &chunk[..remaining];
				}
				dst.write_all(chunk)?;
				remaining -= chunk.len();
				if remaining == 0 {
					break;
				}
			}
			offset += subsize;
		}
		Ok(())
	}
}
