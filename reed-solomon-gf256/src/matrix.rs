//! Dense row-major matrices over GF(2^8), just large enough for building
//! coding matrices and inverting the sub-matrices picked out during
//! reconstruction. Inversion is Gauss-Jordan on the augmented `[A | I]`;
//! it is the only operation that can report a singular matrix, everything
//! else only validates shapes.

use crate::errors::*;
use crate::galois;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Matrix {
	rows: usize,
	cols: usize,
	data: Vec<u8>,
}

impl Matrix {
	pub fn new(rows: usize, cols: usize) -> Result<Self> {
		if rows == 0 || cols == 0 {
			return Err(Error::ShapeMismatch);
		}
		Ok(Self { rows, cols, data: vec![0; rows * cols] })
	}

	pub fn identity(size: usize) -> Result<Self> {
		let mut m = Self::new(size, size)?;
		for i in 0..size {
			m.set(i, i, 1);
		}
		Ok(m)
	}

	/// `vandermonde[r][c] = r^c`, the starting point of the default coding
	/// matrix. Any square subset of its rows is invertible.
	pub fn vandermonde(rows: usize, cols: usize) -> Result<Self> {
		let mut m = Self::new(rows, cols)?;
		for r in 0..rows {
			for c in 0..cols {
				m.set(r, c, galois::gal_exp(r as u8, c));
			}
		}
		Ok(m)
	}

	pub fn rows(&self) -> usize {
		self.rows
	}

	pub fn cols(&self) -> usize {
		self.cols
	}

	pub fn is_square(&self) -> bool {
		self.rows == self.cols
	}

	#[inline]
	pub fn get(&self, r: usize, c: usize) -> u8 {
		self.data[r * self.cols + c]
	}

	#[inline]
	pub fn set(&mut self, r: usize, c: usize, value: u8) {
		self.data[r * self.cols + c] = value;
	}

	pub fn row(&self, r: usize) -> &[u8] {
		&self.data[r * self.cols..][..self.cols]
	}

	pub fn swap_rows(&mut self, r1: usize, r2: usize) -> Result<()> {
		if r1 >= self.rows || r2 >= self.rows {
			return Err(Error::ShapeMismatch);
		}
		if r1 == r2 {
			return Ok(());
		}
		for c in 0..self.cols {
			self.data.swap(r1 * self.cols + c, r2 * self.cols + c);
		}
		Ok(())
	}

	/// Matrix product `self * rhs`; shapes `n x k` times `k x e` give `n x e`.
	pub fn multiply(&self, rhs: &Matrix) -> Result<Matrix> {
		if self.cols != rhs.rows {
			return Err(Error::ShapeMismatch);
		}
		let mut out = Matrix::new(self.rows, rhs.cols)?;
		for r in 0..self.rows {
			for c in 0..rhs.cols {
				let mut acc = 0u8;
				for k in 0..self.cols {
					acc = galois::gal_add(acc, galois::gal_mul(self.get(r, k), rhs.get(k, c)));
				}
				out.set(r, c, acc);
			}
		}
		Ok(out)
	}

	/// Horizontal concatenation `[self | rhs]`.
	pub fn augment(&self, rhs: &Matrix) -> Result<Matrix> {
		if self.rows != rhs.rows {
			return Err(Error::ShapeMismatch);
		}
		let mut out = Matrix::new(self.rows, self.cols + rhs.cols)?;
		for r in 0..self.rows {
			for c in 0..self.cols {
				out.set(r, c, self.get(r, c));
			}
			for c in 0..rhs.cols {
				out.set(r, self.cols + c, rhs.get(r, c));
			}
		}
		Ok(out)
	}

	/// Copy of the half-open region `[rmin, rmax) x [cmin, cmax)`.
	pub fn sub_matrix(&self, rmin: usize, cmin: usize, rmax: usize, cmax: usize) -> Result<Matrix> {
		if rmax > self.rows || cmax > self.cols || rmin >= rmax || cmin >= cmax {
			return Err(Error::ShapeMismatch);
		}
		let mut out = Matrix::new(rmax - rmin, cmax - cmin)?;
		for r in rmin..rmax {
			for c in cmin..cmax {
				out.set(r - rmin, c - cmin, self.get(r, c));
			}
		}
		Ok(out)
	}

	pub fn invert(&self) -> Result<Matrix> {
		if !self.is_square() {
			return Err(Error::ShapeMismatch);
		}
		let mut work = self.augment(&Matrix::identity(self.rows)?)?;
		work.gaussian_elimination()?;
		work.sub_matrix(0, self.rows, self.rows, self.rows * 2)
	}

	fn gaussian_elimination(&mut self) -> Result<()> {
		let rows = self.rows;
		for r in 0..rows {
			// Zero pivot: swap in a lower row with a non-zero entry in this
			// column, or the matrix is singular.
			if self.get(r, r) == 0 {
				match (r + 1..rows).find(|&below| self.get(below, r) != 0) {
					Some(below) => self.swap_rows(r, below)?,
					None => return Err(Error::SingularMatrix),
				}
			}
			let pivot = self.get(r, r);
			if pivot != 1 {
				// The pivot is non-zero here, so the division cannot fail.
				let scale = galois::gal_div(1, pivot)?;
				for c in 0..self.cols {
					self.set(r, c, galois::gal_mul(self.get(r, c), scale));
				}
			}
			for other in 0..rows {
				let factor = self.get(other, r);
				if other == r || factor == 0 {
					continue;
				}
				for c in 0..self.cols {
					let v = galois::gal_mul(factor, self.get(r, c));
					self.set(other, c, galois::gal_add(self.get(other, c), v));
				}
			}
		}
		Ok(())
	}
}
