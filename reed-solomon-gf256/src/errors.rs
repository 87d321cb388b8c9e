#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("cannot create a codec with zero data or parity shards")]
	InvalidShardCount,

	#[error("cannot create a codec with more than 256 data+parity shards")]
	TooManyShards,

	#[error("wrong number of shards given, or too few shards to reconstruct")]
	TooFewShards,

	#[error("all given shards are empty")]
	NoShardData,

	#[error("shard sizes do not match")]
	ShardSizeMismatch,

	#[error("not enough data to fill the requested shards or output")]
	ShortData,

	#[error("reconstruction required, one or more required data shards are empty")]
	ReconstructRequired,

	#[error("invalid input parameters")]
	InvalidInput,

	#[error("matrix is singular")]
	SingularMatrix,

	#[error("matrix dimensions do not allow this operation")]
	ShapeMismatch,

	#[error("division by zero in GF(2^8)")]
	DivisionByZero,

	#[error("failed writing to the output sink: {0}")]
	Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
