//! Benchmarks for directory archiving and store registration.
//!
//! These measure the work done when a plain directory is copied into the
//! store: serialising the tree, hashing it and restoring it.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use path_fetcher::archive;
use path_fetcher::store::{LocalStore, Store};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Creates a source tree with `num_files` files spread over subdirectories.
fn create_tree(root: &Path, num_files: usize) {
    for i in 0..num_files {
        let dir = root.join(format!("src/module{}", i / 100));
        fs::create_dir_all(&dir).unwrap();
        let content = format!("// File {}\nfn main() {{}}\n", i);
        fs::write(dir.join(format!("file{}.rs", i)), content).unwrap();
    }
}

fn bench_dump(c: &mut Criterion) {
    let mut group = c.benchmark_group("archive_dump");

    for count in [10, 100, 1000] {
        let temp = TempDir::new().unwrap();
        create_tree(temp.path(), count);

        group.bench_with_input(BenchmarkId::new("files", count), &count, |b, _| {
            b.iter(|| {
                let mut sink = Vec::new();
                archive::dump_path_and_get_mtime(
                    black_box(temp.path()),
                    &mut sink,
                    &archive::default_path_filter,
                )
                .unwrap();
                sink
            })
        });
    }

    group.finish();
}

fn bench_add_to_store(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_add");

    for count in [10, 100] {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        create_tree(&src, count);
        let dump = archive::dump_path(&src, &archive::default_path_filter).unwrap();

        group.bench_with_input(BenchmarkId::new("fresh", count), &dump, |b, dump| {
            b.iter(|| {
                let store_dir = TempDir::new().unwrap();
                let store = LocalStore::open(store_dir.path()).unwrap();
                store
                    .add_to_store_from_dump(&mut black_box(dump.as_slice()), "source")
                    .unwrap()
            })
        });

        let store_dir = TempDir::new().unwrap();
        let store = LocalStore::open(store_dir.path()).unwrap();
        group.bench_with_input(BenchmarkId::new("already_valid", count), &dump, |b, dump| {
            b.iter(|| {
                store
                    .add_to_store_from_dump(&mut black_box(dump.as_slice()), "source")
                    .unwrap()
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_dump, bench_add_to_store);
criterion_main!(benches);
