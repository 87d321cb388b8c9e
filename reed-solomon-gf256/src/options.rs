//! Construction-time knobs for the codec. Options are resolved once in
//! `ReedSolomon::with_options` and immutable afterwards; in particular the
//! CPU feature checks run at construction and the chosen kernel is stored
//! per codec.

use crate::galois::Kernel;

/// Which coding matrix construction to use. The non-default constructions
/// exist for interoperability and must be picked explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatrixKind {
	/// Vandermonde matrix normalised so the top square is the identity.
	/// Any `data_shards` rows of it form an invertible matrix.
	#[default]
	Vandermonde,
	/// Cauchy construction; same recoverability guarantee as the default.
	Cauchy,
	/// The legacy PARv1 construction. Known to admit unrecoverable
	/// configurations within its nominal parity budget; kept bit-for-bit
	/// for compatibility with the external PAR1 format.
	Par1,
}

#[derive(Debug, Clone)]
pub struct CodecOptions {
	pub(crate) max_parallelism: usize,
	pub(crate) min_split_size: usize,
	pub(crate) use_ssse3: bool,
	pub(crate) use_avx2: bool,
	pub(crate) matrix_kind: MatrixKind,
}

impl Default for CodecOptions {
	fn default() -> Self {
		Self {
			max_parallelism: rayon::current_num_threads().max(1),
			min_split_size: 512,
			use_ssse3: detect_ssse3(),
			use_avx2: detect_avx2(),
			matrix_kind: MatrixKind::Vandermonde,
		}
	}
}

impl CodecOptions {
	/// Upper bound on parallel workers per call. Clamped to at least one.
	pub fn with_max_parallelism(mut self, workers: usize) -> Self {
		self.max_parallelism = workers.max(1);
		self
	}

	/// Lower bound on the byte-segment size handed to one worker.
	pub fn with_min_split_size(mut self, bytes: usize) -> Self {
		self.min_split_size = bytes.max(1);
		self
	}

	pub fn with_matrix_kind(mut self, kind: MatrixKind) -> Self {
		self.matrix_kind = kind;
		self
	}

	/// Enable or disable the SIMD kernels. Requests are intersected with
	/// what the CPU actually supports, so enabling on unsupported hardware
	/// quietly falls back to the scalar kernel.
	pub fn with_simd(mut self, use_ssse3: bool, use_avx2: bool) -> Self {
		self.use_ssse3 = use_ssse3 && detect_ssse3();
		self.use_avx2 = use_avx2 && detect_avx2();
		self
	}

	pub(crate) fn kernel(&self) -> Kernel {
		if self.use_avx2 {
			Kernel::Avx2
		} else if self.use_ssse3 {
			Kernel::Ssse3
		} else {
			Kernel::Scalar
		}
	}
}

fn detect_ssse3() -> bool {
	#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
	{
		is_x86_feature_detected!("ssse3")
	}
	#[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
	{
		false
	}
}

fn detect_avx2() -> bool {
	#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
	{
		is_x86_feature_detected!("avx2")
	}
	#[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
	{
		false
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults_are_sane() {
		let opts = CodecOptions::default();
		assert!(opts.max_parallelism >= 1);
		assert!(opts.min_split_size >= 1);
		assert_eq!(opts.matrix_kind, MatrixKind::Vandermonde);
	}

	#[test]
	fn builders_clamp() {
		let opts = CodecOptions::default().with_max_parallelism(0).with_min_split_size(0);
		assert_eq!(opts.max_parallelism, 1);
		assert_eq!(opts.min_split_size, 1);
	}

	#[test]
	fn simd_off_means_scalar() {
		let opts = CodecOptions::default().with_simd(false, false);
		assert_eq!(opts.kernel(), crate::galois::Kernel::Scalar);
	}

	#[test]
	fn simd_requests_respect_detection() {
		// Whatever the host supports, a request never enables more than that.
		let opts = CodecOptions::default().with_simd(true, true);
		let detected = CodecOptions::default();
		assert_eq!(opts.use_ssse3, detected.use_ssse3);
		assert_eq!(opts.use_avx2, detected.use_avx2);
	}
}
