//! Pipeline benchmarks using Criterion

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use luaguard_benchmarks::generate_script;
use luaguard_core::{LanguageVariant, ObfuscationRequest, Pipeline, Preset, Seed};

fn pipeline_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline");
    let pipeline = Pipeline::with_defaults();
    let seed = Seed::from_u64(42);

    for functions in [10, 200] {
        let source = generate_script(functions);
        group.throughput(Throughput::Bytes(source.len() as u64));
        for preset in Preset::ALL {
            let request = ObfuscationRequest::new(source.clone(), LanguageVariant::Luau, preset);
            group.bench_with_input(
                BenchmarkId::new(preset.as_str(), functions),
                &request,
                |b, request| b.iter(|| black_box(pipeline.obfuscate_with_seed(request, &seed).unwrap())),
            );
        }
    }

    group.finish();
}

criterion_group!(benches, pipeline_benchmarks);
criterion_main!(benches);
