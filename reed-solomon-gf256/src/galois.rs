//! GF(2^8) arithmetic under the AES polynomial x^8+x^4+x^3+x+1 (0x11d).
//!
//! All tables are built at compile time from the generator `0xe5`. Single
//! element operations go through the log/exp tables; the slice kernels use
//! a full 256x256 product table (scalar path) or 16-entry nibble tables
//! (`pshufb`/`vpshufb` paths).

use crate::errors::*;

pub(crate) const FIELD_SIZE: usize = 256;

const GENERATOR: u8 = 0xe5;
const POLYNOMIAL: u16 = 0x11d;

/// Carry-less shift-and-add product, reduced by the field polynomial.
/// Only used to bootstrap the tables; runtime multiplies are table lookups.
const fn poly_mul(a: u8, b: u8) -> u8 {
	let mut a = a as u16;
	let mut b = b as u16;
	let mut r = 0u16;
	while b != 0 {
		if b & 1 != 0 {
			r ^= a;
		}
		a <<= 1;
		if a & 0x100 != 0 {
			a ^= POLYNOMIAL;
		}
		b >>= 1;
	}
	r as u8
}

const fn build_log_exp() -> ([u8; FIELD_SIZE], [u8; FIELD_SIZE * 2]) {
	let mut log = [0u8; FIELD_SIZE];
	let mut exp = [0u8; FIELD_SIZE * 2];
	let mut x: u8 = 1;
	let mut i = 0;
	while i < 255 {
		exp[i] = x;
		// Mirrored so that exp[log a + log b] needs no reduction mod 255.
		exp[i + 255] = x;
		log[x as usize] = i as u8;
		x = poly_mul(x, GENERATOR);
		i += 1;
	}
	(log, exp)
}

const fn build_mul_table() -> [[u8; FIELD_SIZE]; FIELD_SIZE] {
	let mut table = [[0u8; FIELD_SIZE]; FIELD_SIZE];
	let mut a = 0;
	while a < FIELD_SIZE {
		let mut b = 0;
		while b < FIELD_SIZE {
			table[a][b] = poly_mul(a as u8, b as u8);
			b += 1;
		}
		a += 1;
	}
	table
}

/// Per-coefficient partial product tables for the nibble-shuffle kernel:
/// `LOW[c][n] = c * n` and `HIGH[c][n] = c * (n << 4)`, so a full product
/// is `LOW[c][x & 0xf] ^ HIGH[c][x >> 4]`.
const fn build_nibble_tables() -> ([[u8; 16]; FIELD_SIZE], [[u8; 16]; FIELD_SIZE]) {
	let mut low = [[0u8; 16]; FIELD_SIZE];
	let mut high = [[0u8; 16]; FIELD_SIZE];
	let mut c = 0;
	while c < FIELD_SIZE {
		let mut n = 0;
		while n < 16 {
			low[c][n] = poly_mul(c as u8, n as u8);
			high[c][n] = poly_mul(c as u8, (n << 4) as u8);
			n += 1;
		}
		c += 1;
	}
	(low, high)
}

const fn build_inv_table(log: &[u8; FIELD_SIZE], exp: &[u8; FIELD_SIZE * 2]) -> [u8; FIELD_SIZE] {
	let mut inv = [0u8; FIELD_SIZE];
	let mut x = 1;
	while x < FIELD_SIZE {
		inv[x] = exp[255 - log[x] as usize];
		x += 1;
	}
	inv
}

const LOG_EXP: ([u8; FIELD_SIZE], [u8; FIELD_SIZE * 2]) = build_log_exp();
const NIBBLES: ([[u8; 16]; FIELD_SIZE], [[u8; 16]; FIELD_SIZE]) = build_nibble_tables();

static LOG_TABLE: [u8; FIELD_SIZE] = LOG_EXP.0;
static EXP_TABLE: [u8; FIELD_SIZE * 2] = LOG_EXP.1;
static MUL_TABLE: [[u8; FIELD_SIZE]; FIELD_SIZE] = build_mul_table();
static MUL_TABLE_LOW: [[u8; 16]; FIELD_SIZE] = NIBBLES.0;
static MUL_TABLE_HIGH: [[u8; 16]; FIELD_SIZE] = NIBBLES.1;
static INV_TABLE: [u8; FIELD_SIZE] = build_inv_table(&LOG_EXP.0, &LOG_EXP.1);

#[inline(always)]
pub(crate) fn gal_add(a: u8, b: u8) -> u8 {
	a ^ b
}

#[inline(always)]
pub(crate) fn gal_mul(a: u8, b: u8) -> u8 {
	MUL_TABLE[a as usize][b as usize]
}

pub(crate) fn gal_div(a: u8, b: u8) -> Result<u8> {
	if b == 0 {
		return Err(Error::DivisionByZero);
	}
	if a == 0 {
		return Ok(0);
	}
	let log_a = LOG_TABLE[a as usize] as usize;
	let log_b = LOG_TABLE[b as usize] as usize;
	Ok(EXP_TABLE[log_a + 255 - log_b])
}

/// `a` raised to the `n`th power. `gal_exp(a, 0) == 1` for every `a`.
pub(crate) fn gal_exp(a: u8, n: usize) -> u8 {
	if n == 0 {
		return 1;
	}
	if a == 0 {
		return 0;
	}
	let log_a = LOG_TABLE[a as usize] as usize;
	EXP_TABLE[(log_a * n) % 255]
}

/// Multiplicative inverse, table backed. `gal_inverse(0)` is 0 by convention
/// and must never be relied on.
#[inline(always)]
pub(crate) fn gal_inverse(a: u8) -> u8 {
	INV_TABLE[a as usize]
}

/// Resolved slice-multiply kernel. Picked once per codec at construction;
/// the SIMD variants are only ever selected after a runtime feature check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Kernel {
	Scalar,
	Ssse3,
	Avx2,
}

/// `out[i] = c * input[i]` over the whole slice.
pub(crate) fn mul_slice(c: u8, input: &[u8], out: &mut [u8], kernel: Kernel) {
	debug_assert_eq!(input.len(), out.len());
	match kernel {
		Kernel::Scalar => mul_slice_scalar(c, input, out),
		#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
		// Safety: `Kernel::Ssse3`/`Kernel::Avx2` are only constructed after
		// `is_x86_feature_detected!` confirmed the feature.
		Kernel::Ssse3 => unsafe { mul_slice_ssse3(c, input, out) },
		#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
		Kernel::Avx2 => unsafe { mul_slice_avx2(c, input, out) },
		#[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
		_ => mul_slice_scalar(c, input, out),
	}
}

/// `out[i] ^= c * input[i]` over the whole slice.
pub(crate) fn mul_slice_xor(c: u8, input: &[u8], out: &mut [u8], kernel: Kernel) {
	debug_assert_eq!(input.len(), out.len());
	match kernel {
		Kernel::Scalar => mul_slice_xor_scalar(c, input, out),
		#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
		Kernel::Ssse3 => unsafe { mul_slice_xor_ssse3(c, input, out) },
		#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
		Kernel::Avx2 => unsafe { mul_slice_xor_avx2(c, input, out) },
		#[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
		_ => mul_slice_xor_scalar(c, input, out),
	}
}

fn mul_slice_scalar(c: u8, input: &[u8], out: &mut [u8]) {
	let mt = &MUL_TABLE[c as usize];
	for (o, i) in out.iter_mut().zip(input.iter()) {
		*o = mt[*i as usize];
	}
}

fn mul_slice_xor_scalar(c: u8, input: &[u8], out: &mut [u8]) {
	let mt = &MUL_TABLE[c as usize];
	for (o, i) in out.iter_mut().zip(input.iter()) {
		*o ^= mt[*i as usize];
	}
}

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
mod x86 {
	#[cfg(target_arch = "x86")]
	use core::arch::x86::*;
	#[cfg(target_arch = "x86_64")]
	use core::arch::x86_64::*;

	use super::{mul_slice_scalar, mul_slice_xor_scalar, MUL_TABLE_HIGH, MUL_TABLE_LOW};

	#[target_feature(enable = "ssse3")]
	pub(super) unsafe fn mul_slice_ssse3(c: u8, input: &[u8], out: &mut [u8]) {
		let low_tbl = _mm_loadu_si128(MUL_TABLE_LOW[c as usize].as_ptr() as *const __m128i);
		let high_tbl = _mm_loadu_si128(MUL_TABLE_HIGH[c as usize].as_ptr() as *const __m128i);
		let low_mask = _mm_set1_epi8(0x0f);

		let len = input.len();
		let mut i = 0;
		while i + 16 <= len {
			let v = _mm_loadu_si128(input.as_ptr().add(i) as *const __m128i);
			let lo = _mm_and_si128(v, low_mask);
			let hi = _mm_and_si128(_mm_srli_epi16(v, 4), low_mask);
			let prod = _mm_xor_si128(_mm_shuffle_epi8(low_tbl, lo), _mm_shuffle_epi8(high_tbl, hi));
			_mm_storeu_si128(out.as_mut_ptr().add(i) as *mut __m128i, prod);
			i += 16;
		}
		mul_slice_scalar(c, &input[i..], &mut out[i..]);
	}

	#[target_feature(enable = "ssse3")]
	pub(super) unsafe fn mul_slice_xor_ssse3(c: u8, input: &[u8], out: &mut [u8]) {
		let low_tbl = _mm_loadu_si128(MUL_TABLE_LOW[c as usize].as_ptr() as *const __m128i);
		let high_tbl = _mm_loadu_si128(MUL_TABLE_HIGH[c as usize].as_ptr() as *const __m128i);
		let low_mask = _mm_set1_epi8(0x0f);

		let len = input.len();
		let mut i = 0;
		while i + 16 <= len {
			let v = _mm_loadu_si128(input.as_ptr().add(i) as *const __m128i);
			let lo = _mm_and_si128(v, low_mask);
			let hi = _mm_and_si128(_mm_srli_epi16(v, 4), low_mask);
			let prod = _mm_xor_si128(_mm_shuffle_epi8(low_tbl, lo), _mm_shuffle_epi8(high_tbl, hi));
			let prev = _mm_loadu_si128(out.as_ptr().add(i) as *const __m128i);
			_mm_storeu_si128(out.as_mut_ptr().add(i) as *mut __m128i, _mm_xor_si128(prev, prod));
			i += 16;
		}
		mul_slice_xor_scalar(c, &input[i..], &mut out[i..]);
	}

	#[target_feature(enable = "avx2")]
	pub(super) unsafe fn mul_slice_avx2(c: u8, input: &[u8], out: &mut [u8]) {
		let low_tbl = _mm256_broadcastsi128_si256(_mm_loadu_si128(
			MUL_TABLE_LOW[c as usize].as_ptr() as *const __m128i,
		));
		let high_tbl = _mm256_broadcastsi128_si256(_mm_loadu_si128(
			MUL_TABLE_HIGH[c as usize].as_ptr() as *const __m128i,
		));
		let low_mask = _mm256_set1_epi8(0x0f);

		let len = input.len();
		let mut i = 0;
		while i + 32 <= len {
			let v = _mm256_loadu_si256(input.as_ptr().add(i) as *const __m256i);
			let lo = _mm256_and_si256(v, low_mask);
			let hi = _mm256_and_si256(_mm256_srli_epi16(v, 4), low_mask);
			let prod = _mm256_xor_si256(
				_mm256_shuffle_epi8(low_tbl, lo),
				_mm256_shuffle_epi8(high_tbl, hi),
			);
			_mm256_storeu_si256(out.as_mut_ptr().add(i) as *mut __m256i, prod);
			i += 32;
		}
		mul_slice_scalar(c, &input[i..], &mut out[i..]);
	}

	#[target_feature(enable = "avx2")]
	pub(super) unsafe fn mul_slice_xor_avx2(c: u8, input: &[u8], out: &mut [u8]) {
		let low_tbl = _mm256_broadcastsi128_si256(_mm_loadu_si128(
			MUL_TABLE_LOW[c as usize].as_ptr() as *const __m128i,
		));
		let high_tbl = _mm256_broadcastsi128_si256(_mm_loadu_si128(
			MUL_TABLE_HIGH[c as usize].as_ptr() as *const __m128i,
		));
		let low_mask = _mm256_set1_epi8(0x0f);

		let len = input.len();
		let mut i = 0;
		while i + 32 <= len {
			let v = _mm256_loadu_si256(input.as_ptr().add(i) as *const __m256i);
			let lo = _mm256_and_si256(v, low_mask);
			let hi = _mm256_and_si256(_mm256_srli_epi16(v, 4), low_mask);
			let prod = _mm256_xor_si256(
				_mm256_shuffle_epi8(low_tbl, lo),
				_mm256_shuffle_epi8(high_tbl, hi),
			);
			let prev = _mm256_loadu_si256(out.as_ptr().add(i) as *const __m256i);
			_mm256_storeu_si256(
				out.as_mut_ptr().add(i) as *mut __m256i,
				_mm256_xor_si256(prev, prod),
			);
			i += 32;
		}
		mul_slice_xor_scalar(c, &input[i..], &mut out[i..]);
	}
}

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
use x86::{mul_slice_avx2, mul_slice_ssse3, mul_slice_xor_avx2, mul_slice_xor_ssse3};

#[cfg(test)]
mod tests {
	use super::*;

	use assert_matches::assert_matches;
	use rand::rngs::SmallRng;
	use rand::{Rng, SeedableRng};
	use reed_solomon_gf256_tester::SMALL_RNG_SEED;

	#[test]
	fn field_axioms() {
		for a in 0..=255u8 {
			assert_eq!(gal_mul(a, 1), a);
			assert_eq!(gal_mul(a, 0), 0);
			assert_eq!(gal_mul(0, a), 0);
			assert_eq!(gal_add(a, a), 0);
			if a != 0 {
				assert_eq!(gal_mul(a, gal_inverse(a)), 1, "a={}", a);
			}
		}
	}

	#[test]
	fn mul_matches_shift_and_add() {
		for a in 0..=255u8 {
			for b in 0..=255u8 {
				assert_eq!(gal_mul(a, b), poly_mul(a, b));
				assert_eq!(gal_mul(a, b), gal_mul(b, a));
			}
		}
	}

	#[test]
	fn log_exp_agree_with_mul_table() {
		for a in 1..=255u8 {
			for b in 1..=255u8 {
				let log_sum = LOG_TABLE[a as usize] as usize + LOG_TABLE[b as usize] as usize;
				assert_eq!(EXP_TABLE[log_sum], gal_mul(a, b));
			}
		}
	}

	#[test]
	fn div_inverts_mul() {
		for a in 0..=255u8 {
			for b in 1..=255u8 {
				let q = gal_div(a, b).unwrap();
				assert_eq!(gal_mul(q, b), a, "a={} b={}", a, b);
			}
		}
		assert_matches!(gal_div(7, 0), Err(Error::DivisionByZero));
	}

	#[test]
	fn exp_is_repeated_mul() {
		for a in 0..=255u8 {
			assert_eq!(gal_exp(a, 0), 1);
			let mut acc = 1u8;
			for n in 1..10usize {
				acc = gal_mul(acc, a);
				assert_eq!(gal_exp(a, n), acc, "a={} n={}", a, n);
			}
		}
		// Exponents past the group order must wrap.
		assert_eq!(gal_exp(2, 255), 1);
		assert_eq!(gal_exp(2, 256), 2);
	}

	#[test]
	fn generator_hits_every_nonzero_element() {
		let mut seen = [false; FIELD_SIZE];
		let mut x = 1u8;
		for _ in 0..255 {
			assert!(!seen[x as usize], "0xe5 is not a generator");
			seen[x as usize] = true;
			x = poly_mul(x, GENERATOR);
		}
		assert_eq!(x, 1);
	}

	#[test]
	fn scalar_kernels() {
		let mut rng = SmallRng::from_seed(SMALL_RNG_SEED);
		for len in [0usize, 1, 15, 16, 31, 32, 100, 1024] {
			let input: Vec<u8> = (&mut rng).sample_iter(rand::distributions::Standard).take(len).collect();
			for c in [0u8, 1, 2, 0x8e, 255] {
				let mut out = vec![0u8; len];
				mul_slice_scalar(c, &input, &mut out);
				for (o, i) in out.iter().zip(input.iter()) {
					assert_eq!(*o, gal_mul(c, *i));
				}
				let mut acc = input.clone();
				mul_slice_xor_scalar(c, &input, &mut acc);
				for (a, i) in acc.iter().zip(input.iter()) {
					assert_eq!(*a, gal_add(*i, gal_mul(c, *i)));
				}
			}
		}
	}

	#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
	#[test]
	fn simd_kernels_match_scalar() {
		let mut rng = SmallRng::from_seed(SMALL_RNG_SEED);
		let mut kernels = Vec::new();
		if is_x86_feature_detected!("ssse3") {
			kernels.push(Kernel::Ssse3);
		}
		if is_x86_feature_detected!("avx2") {
			kernels.push(Kernel::Avx2);
		}
		for kernel in kernels {
			// Odd lengths exercise the scalar tail after the vector body.
			for len in [1usize, 16, 17, 31, 32, 33, 64, 1000, 4096, 4097] {
				let input: Vec<u8> =
					(&mut rng).sample_iter(rand::distributions::Standard).take(len).collect();
				let base: Vec<u8> =
					(&mut rng).sample_iter(rand::distributions::Standard).take(len).collect();
				for c in [0u8, 1, 3, 0x1d, 0xe5, 255] {
					let mut expect = vec![0u8; len];
					let mut got = vec![0u8; len];
					mul_slice_scalar(c, &input, &mut expect);
					mul_slice(c, &input, &mut got, kernel);
					assert_eq!(expect, got, "kernel={:?} c={} len={}", kernel, c, len);

					let mut expect = base.clone();
					let mut got = base.clone();
					mul_slice_xor_scalar(c, &input, &mut expect);
					mul_slice_xor(c, &input, &mut got, kernel);
					assert_eq!(expect, got, "xor kernel={:?} c={} len={}", kernel, c, len);
				}
			}
		}
	}
}
