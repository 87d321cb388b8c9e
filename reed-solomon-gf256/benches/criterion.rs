use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use rand::rngs::SmallRng;
use rand::SeedableRng;
use reed_solomon_gf256::ReedSolomon;
use reed_solomon_gf256_tester::{drop_random_max, BYTES, SMALL_RNG_SEED};

const DATA_SHARDS: usize = 10;
const PARITY_SHARDS: usize = 4;

fn bench_encode(crit: &mut Criterion) {
	let rs = ReedSolomon::new(DATA_SHARDS, PARITY_SHARDS).unwrap();

	let mut group = crit.benchmark_group("encode");
	for payload_size in [10_000usize, 100_000, 1_000_000] {
		let shards = rs.split(&BYTES[..payload_size]).unwrap();
		group.bench_with_input(BenchmarkId::from_parameter(payload_size), &shards, |b, shards| {
			b.iter(|| {
				let mut shards = shards.clone();
				rs.encode(black_box(&mut shards)).unwrap();
			})
		});
	}
	group.finish();
}

fn bench_verify(crit: &mut Criterion) {
	let rs = ReedSolomon::new(DATA_SHARDS, PARITY_SHARDS).unwrap();

	let mut group = crit.benchmark_group("verify");
	for payload_size in [10_000usize, 100_000, 1_000_000] {
		let mut shards = rs.split(&BYTES[..payload_size]).unwrap();
		rs.encode(&mut shards).unwrap();
		group.bench_with_input(BenchmarkId::from_parameter(payload_size), &shards, |b, shards| {
			b.iter(|| {
				assert!(rs.verify(black_box(shards)).unwrap());
			})
		});
	}
	group.finish();
}

fn bench_reconstruct(crit: &mut Criterion) {
	let rs = ReedSolomon::new(DATA_SHARDS, PARITY_SHARDS).unwrap();

	let mut group = crit.benchmark_group("reconstruct");
	for payload_size in [10_000usize, 100_000, 1_000_000] {
		let mut shards = rs.split(&BYTES[..payload_size]).unwrap();
		rs.encode(&mut shards).unwrap();
		let mut rng = SmallRng::from_seed(SMALL_RNG_SEED);
		group.bench_with_input(BenchmarkId::from_parameter(payload_size), &shards, |b, shards| {
			b.iter(|| {
				let mut damaged = shards.clone();
				drop_random_max(&mut damaged, PARITY_SHARDS, &mut rng);
				rs.reconstruct(black_box(&mut damaged)).unwrap();
			})
		});
	}
	group.finish();
}

criterion_group!(benches, bench_encode, bench_verify, bench_reconstruct);
criterion_main!(benches);
