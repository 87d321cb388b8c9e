//! Cache of decode matrices keyed by the ordered list of invalid row
//! indices. Laid out as a trie: each level branches on the next invalid
//! index, stored relative to the previous one so child arrays shrink as
//! the path descends. The root holds the identity matrix (the empty
//! invalid set needs no decoding).
//!
//! Readers share an `RwLock` read guard and clone out an `Arc`, so a
//! cached matrix can be used long after the guard is gone. A key, once
//! inserted, never changes value; racing writers keep the first insert.

use std::sync::{Arc, RwLock};

use crate::errors::*;
use crate::matrix::Matrix;

#[derive(Debug)]
pub(crate) struct InversionTree {
	root: RwLock<Node>,
	max_invalid_count: usize,
}

#[derive(Debug)]
struct Node {
	matrix: Option<Arc<Matrix>>,
	children: Vec<Option<Node>>,
}

fn empty_children(count: usize) -> Vec<Option<Node>> {
	let mut children = Vec::with_capacity(count);
	children.resize_with(count, || None);
	children
}

impl InversionTree {
	pub fn new(data_shards: usize, parity_shards: usize) -> Result<Self> {
		Ok(Self {
			root: RwLock::new(Node {
				matrix: Some(Arc::new(Matrix::identity(data_shards)?)),
				children: empty_children(data_shards + parity_shards),
			}),
			max_invalid_count: parity_shards,
		})
	}

	/// Cached decode matrix for this invalid set, or `None` on a miss.
	/// `invalid_indices` must be sorted ascending.
	pub fn get_inverted_matrix(&self, invalid_indices: &[usize]) -> Option<Arc<Matrix>> {
		let root = self.root.read().expect("inversion tree lock poisoned; qed");
		if invalid_indices.is_empty() {
			return root.matrix.clone();
		}
		root.get(invalid_indices, 0)
	}

	/// Insert a freshly computed decode matrix. Rejects empty keys, keys
	/// longer than the parity count (the tree depth bound) and indices
	/// outside `[0, total_shards)`. The first insert for a key wins.
	pub fn insert_inverted_matrix(
		&self,
		invalid_indices: &[usize],
		matrix: Arc<Matrix>,
		total_shards: usize,
	) -> Result<()> {
		if invalid_indices.is_empty() || invalid_indices.len() > self.max_invalid_count {
			return Err(Error::InvalidInput);
		}
		if invalid_indices.iter().any(|&index| index >= total_shards) {
			return Err(Error::InvalidInput);
		}
		if !matrix.is_square() {
			return Err(Error::ShapeMismatch);
		}
		debug_assert!(invalid_indices.windows(2).all(|w| w[0] < w[1]));

		let mut root = self.root.write().expect("inversion tree lock poisoned; qed");
		root.insert(invalid_indices, matrix, total_shards, 0);
		Ok(())
	}
}

impl Node {
	fn get(&self, invalid_indices: &[usize], parent: usize) -> Option<Arc<Matrix>> {
		let first = invalid_indices[0];
		let node = self.children.get(first.checked_sub(parent)?)?.as_ref()?;
		if invalid_indices.len() > 1 {
			node.get(&invalid_indices[1..], first + 1)
		} else {
			node.matrix.clone()
		}
	}

	fn insert(&mut self, invalid_indices: &[usize], matrix: Arc<Matrix>, total_shards: usize, parent: usize) {
		let first = invalid_indices[0];
		let node = self.children[first - parent].get_or_insert_with(|| Node {
			matrix: None,
			children: empty_children(total_shards - first),
		});
		if invalid_indices.len() > 1 {
			node.insert(&invalid_indices[1..], matrix, total_shards, first + 1);
		} else if node.matrix.is_none() {
			node.matrix = Some(matrix);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	use assert_matches::assert_matches;

	#[test]
	fn empty_set_yields_identity() {
		let tree = InversionTree::new(3, 2).unwrap();
		let m = tree.get_inverted_matrix(&[]).unwrap();
		assert_eq!(*m, Matrix::identity(3).unwrap());
	}

	#[test]
	fn insert_then_get() {
		let tree = InversionTree::new(3, 2).unwrap();
		assert!(tree.get_inverted_matrix(&[1]).is_none());

		let m = Arc::new(Matrix::vandermonde(3, 3).unwrap());
		tree.insert_inverted_matrix(&[1], m.clone(), 5).unwrap();
		let cached = tree.get_inverted_matrix(&[1]).unwrap();
		assert!(Arc::ptr_eq(&m, &cached));

		// A key differing in any element is an independent entry.
		assert!(tree.get_inverted_matrix(&[2]).is_none());
		assert!(tree.get_inverted_matrix(&[1, 2]).is_none());
	}

	#[test]
	fn deep_keys_are_independent() {
		let tree = InversionTree::new(8, 4).unwrap();
		let a = Arc::new(Matrix::identity(8).unwrap());
		let b = Arc::new(Matrix::vandermonde(8, 8).unwrap());
		tree.insert_inverted_matrix(&[1, 3, 7], a.clone(), 12).unwrap();
		tree.insert_inverted_matrix(&[1, 3, 8], b.clone(), 12).unwrap();
		assert!(Arc::ptr_eq(&a, &tree.get_inverted_matrix(&[1, 3, 7]).unwrap()));
		assert!(Arc::ptr_eq(&b, &tree.get_inverted_matrix(&[1, 3, 8]).unwrap()));
		// The shared prefix alone has no matrix.
		assert!(tree.get_inverted_matrix(&[1, 3]).is_none());
		assert!(tree.get_inverted_matrix(&[1]).is_none());
	}

	#[test]
	fn first_insert_wins() {
		let tree = InversionTree::new(4, 2).unwrap();
		let first = Arc::new(Matrix::identity(4).unwrap());
		let second = Arc::new(Matrix::vandermonde(4, 4).unwrap());
		tree.insert_inverted_matrix(&[0], first.clone(), 6).unwrap();
		tree.insert_inverted_matrix(&[0], second, 6).unwrap();
		assert!(Arc::ptr_eq(&first, &tree.get_inverted_matrix(&[0]).unwrap()));
	}

	#[test]
	fn insert_bounds() {
		let tree = InversionTree::new(3, 2).unwrap();
		let m = Arc::new(Matrix::identity(3).unwrap());
		assert_matches!(tree.insert_inverted_matrix(&[], m.clone(), 5), Err(Error::InvalidInput));
		assert_matches!(
			tree.insert_inverted_matrix(&[0, 1, 2], m.clone(), 5),
			Err(Error::InvalidInput)
		);
		assert_matches!(tree.insert_inverted_matrix(&[5], m.clone(), 5), Err(Error::InvalidInput));
		let rect = Arc::new(Matrix::new(2, 3).unwrap());
		assert_matches!(tree.insert_inverted_matrix(&[1], rect, 5), Err(Error::ShapeMismatch));
	}

	#[test]
	fn concurrent_readers_and_writer() {
		let tree = Arc::new(InversionTree::new(4, 3).unwrap());
		let m = Arc::new(Matrix::identity(4).unwrap());
		std::thread::scope(|scope| {
			for i in 0..3usize {
				let tree = Arc::clone(&tree);
				let m = Arc::clone(&m);
				scope.spawn(move || {
					for _ in 0..100 {
						tree.insert_inverted_matrix(&[i, i + 2], m.clone(), 7).unwrap();
						let _ = tree.get_inverted_matrix(&[i, i + 2]);
					}
				});
			}
		});
		for i in 0..3usize {
			assert!(tree.get_inverted_matrix(&[i, i + 2]).is_some());
		}
	}
}
