use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use phantom_cine_rs::cine_pipeline::fixture::CineFixture;
use phantom_cine_rs::cine_pipeline::frames::{pack_12bit, unpack_12bit};
use phantom_cine_rs::cine_pipeline::{
    CineToDocumentPipeline, ConversionConfig, TiffCompression, decode_headers,
};

fn benchmark_unpack_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("unpack_by_size");

    let sizes = vec![(256, 256, "256x256"), (1024, 1024, "1024x1024")];

    for (width, height, label) in sizes {
        let pixels: Vec<u16> = (0..width * height).map(|i| (i % 4096) as u16).collect();
        let packed = pack_12bit(&pixels);

        group.throughput(Throughput::Bytes(packed.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(label), &packed, |b, data| {
            b.iter(|| unpack_12bit(black_box(data)));
        });
    }

    group.finish();
}

fn benchmark_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_recording");
    let bytes = CineFixture::new(512, 512).frames(16).build();

    group.throughput(Throughput::Bytes(bytes.len() as u64));
    group.bench_function("headers", |b| {
        b.iter(|| decode_headers(black_box(&bytes)));
    });
    group.bench_function("document", |b| {
        let pipeline = CineToDocumentPipeline::new(ConversionConfig::default());
        b.iter(|| pipeline.decode(black_box(&bytes)));
    });

    group.finish();
}

fn benchmark_compression_methods(c: &mut Criterion) {
    let mut group = c.benchmark_group("compression_methods");
    let bytes = CineFixture::new(512, 512).frames(8).build();
    let dir = tempfile::tempdir().expect("temp dir");

    let compressions = vec![
        (TiffCompression::None, "none"),
        (TiffCompression::Lzw, "lzw"),
        (TiffCompression::DeflateFast, "deflate_fast"),
    ];

    for (compression, label) in compressions {
        group.bench_with_input(BenchmarkId::from_parameter(label), &bytes, |b, data| {
            let config = ConversionConfig::builder()
                .compression(compression)
                .progress_interval(0)
                .build();
            let pipeline = CineToDocumentPipeline::new(config);
            let output = dir.path().join(label);

            b.iter(|| {
                let _ = pipeline.convert(black_box(data), &output);
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_unpack_sizes,
    benchmark_decode,
    benchmark_compression_methods
);
criterion_main!(benches);
