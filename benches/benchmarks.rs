//! Benchmarks for blocksync operations.

use criterion::{
    black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput,
};

use blocksync::{checksum_list, ApplyOptions, Digest, ReceivedFile, ServedFile};

fn patterned(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

fn bench_digest(c: &mut Criterion) {
    let mut group = c.benchmark_group("digest");

    for size in [64, 512, 2048, 8192, 65536].iter() {
        let data = vec![42u8; *size];

        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::new("compute", size), &data, |b, data| {
            b.iter(|| Digest::compute(black_box(data)));
        });
    }

    group.finish();
}

fn bench_checksum_list(c: &mut Criterion) {
    let mut group = c.benchmark_group("checksum_list");
    let dir = tempfile::tempdir().unwrap();

    for size in [1024, 10240, 102400, 1024000].iter() {
        let path = dir.path().join(format!("data-{size}.bin"));
        std::fs::write(&path, patterned(*size)).unwrap();

        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::new("block_2048", size), &path, |b, path| {
            b.iter(|| checksum_list(black_box(path), 2048));
        });
    }

    group.finish();
}

fn bench_diff(c: &mut Criterion) {
    let mut group = c.benchmark_group("diff");
    let dir = tempfile::tempdir().unwrap();

    for size in [10240, 102400].iter() {
        let path = dir.path().join(format!("identical-{size}.bin"));
        std::fs::write(&path, patterned(*size)).unwrap();

        let served = ServedFile::open(&path, 2048).unwrap();
        let peer = checksum_list(&path, 2048).unwrap();

        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::new("identical", size), &peer, |b, peer| {
            b.iter(|| served.diff(black_box(peer)));
        });
    }

    // Worst case: no block in common, everything becomes a literal.
    for size in [10240, 102400].iter() {
        let basis_path = dir.path().join(format!("basis-{size}.bin"));
        let source_path = dir.path().join(format!("source-{size}.bin"));
        std::fs::write(&basis_path, vec![0u8; *size]).unwrap();
        std::fs::write(&source_path, vec![1u8; *size]).unwrap();

        let served = ServedFile::open(&source_path, 2048).unwrap();
        let peer = checksum_list(&basis_path, 2048).unwrap();

        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::new("different", size), &peer, |b, peer| {
            b.iter(|| served.diff(black_box(peer)));
        });
    }

    group.finish();
}

fn bench_apply(c: &mut Criterion) {
    let mut group = c.benchmark_group("apply");

    for size in [10240, 102400].iter() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source.bin");
        std::fs::write(&source, patterned(*size)).unwrap();

        let served = ServedFile::open(&source, 2048).unwrap();
        let ops = served.diff(&[]).unwrap();
        let received = ReceivedFile::new(dir.path().join("target.bin"), 2048).unwrap();

        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::new("all_literal", size), &ops, |b, ops| {
            b.iter(|| received.apply(black_box(ops), served.digest(), ApplyOptions::default()));
        });
    }

    // Mostly reuse: the peer already holds everything except an appended
    // block, so the rebuild is dominated by local copying.
    for size in [10240, 102400].iter() {
        let dir = tempfile::tempdir().unwrap();
        let basis = patterned(*size);
        let mut source_data = basis.clone();
        source_data.extend(std::iter::repeat(7u8).take(2048));

        let source = dir.path().join("source.bin");
        let target = dir.path().join("target.bin");
        std::fs::write(&source, &source_data).unwrap();
        std::fs::write(&target, &basis).unwrap();

        let served = ServedFile::open(&source, 2048).unwrap();
        let received = ReceivedFile::new(&target, 2048).unwrap();
        let ops = served.diff(&received.checksums().unwrap()).unwrap();

        group.throughput(Throughput::Bytes(source_data.len() as u64));
        group.bench_with_input(BenchmarkId::new("mostly_reuse", size), &ops, |b, ops| {
            b.iter(|| received.apply(black_box(ops), served.digest(), ApplyOptions::default()));
        });
    }

    group.finish();
}

fn bench_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline");
    group.sample_size(20);

    for size in [10240, 102400].iter() {
        let dir = tempfile::tempdir().unwrap();
        let basis = patterned(*size);

        // Flip one byte in every tenth block.
        let mut source_data = basis.clone();
        for i in (0..source_data.len()).step_by(10 * 2048) {
            source_data[i] ^= 0xFF;
        }

        let source = dir.path().join("source.bin");
        let target = dir.path().join("target.bin");
        std::fs::write(&source, &source_data).unwrap();

        let served = ServedFile::open(&source, 2048).unwrap();

        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(
            BenchmarkId::new("sparse_change", size),
            &basis,
            |b, basis| {
                b.iter_batched(
                    || {
                        std::fs::write(&target, basis).unwrap();
                        ReceivedFile::new(&target, 2048).unwrap()
                    },
                    |received| {
                        let ops = served.diff(&received.checksums().unwrap()).unwrap();
                        received
                            .apply(&ops, served.digest(), ApplyOptions::default())
                            .unwrap()
                    },
                    BatchSize::PerIteration,
                );
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_digest,
    bench_checksum_list,
    bench_diff,
    bench_apply,
    bench_pipeline,
);

criterion_main!(benches);
