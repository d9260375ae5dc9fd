use bytes::BytesMut;
use core::hint::black_box;
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use rowlink::{
    LookupClient, MemoryCache, Pipeline, PipelineConfig, Record, RecordCodec, SearchHit,
    SearchOptions,
};
use std::time::Instant;
use tokio::runtime::Builder;
use tokio_util::codec::{Decoder, Encoder, FramedRead};
use tokio_util::sync::CancellationToken;

// Records per benchmark iteration.
const TOTAL_RECORDS: usize = 4096;

/// Lookup that resolves immediately, so pipeline runs measure scheduling and
/// sequencing overhead rather than lookup latency.
struct InstantLookup;

impl LookupClient for InstantLookup {
    type Error = core::convert::Infallible;

    async fn search(
        &self,
        key: &str,
        _options: &SearchOptions,
    ) -> Result<Vec<SearchHit>, Self::Error> {
        Ok(vec![SearchHit::new(format!("link:{key}"))])
    }
}

fn corpus(records: usize) -> String {
    let mut input = String::with_capacity(records * 28);
    for n in 0..records {
        input.push_str(&format!("key{n:05},\"field,{n}\",tail\n"));
    }
    input
}

fn bench_decode(c: &mut Criterion) {
    let input = corpus(TOTAL_RECORDS);
    let mut group = c.benchmark_group("codec/decode");
    group.throughput(Throughput::Bytes(input.len() as u64));

    group.bench_function(format!("records/{TOTAL_RECORDS}"), |b| {
        b.iter_custom(|iters| {
            let start = Instant::now();

            for _ in 0..iters {
                let mut codec = RecordCodec::default();
                let mut buf = BytesMut::from(input.as_bytes());
                while let Some(record) = codec.decode(&mut buf).expect("decode") {
                    black_box(record);
                }
            }

            start.elapsed()
        });
    });

    group.finish();
}

fn bench_encode(c: &mut Criterion) {
    let records: Vec<Record> = (0..TOTAL_RECORDS)
        .map(|n| {
            Record::new(vec![
                format!("key{n:05}"),
                format!("field,{n}"),
                "tail".to_string(),
            ])
        })
        .collect();
    let mut group = c.benchmark_group("codec/encode");
    group.throughput(Throughput::Elements(TOTAL_RECORDS as u64));

    group.bench_function(format!("records/{TOTAL_RECORDS}"), |b| {
        b.iter_custom(|iters| {
            let start = Instant::now();

            for _ in 0..iters {
                let mut codec = RecordCodec::default();
                let mut buf = BytesMut::with_capacity(TOTAL_RECORDS * 32);
                for record in &records {
                    codec.encode(record.clone(), &mut buf).expect("encode");
                }
                black_box(&buf);
            }

            start.elapsed()
        });
    });

    group.finish();
}

fn bench_pipeline(c: &mut Criterion) {
    let input = corpus(TOTAL_RECORDS);
    let rt = Builder::new_multi_thread().enable_all().build().unwrap();

    let mut group = c.benchmark_group("pipeline/run");
    group.throughput(Throughput::Elements(TOTAL_RECORDS as u64));

    for concurrency in [1, 10, 100] {
        group.bench_function(format!("records/{TOTAL_RECORDS}/conc/{concurrency}"), |b| {
            b.to_async(&rt).iter_custom(|iters| {
                let input = input.clone();
                async move {
                    let start = Instant::now();

                    for _ in 0..iters {
                        let config = PipelineConfig {
                            concurrency,
                            ..PipelineConfig::default()
                        };
                        let records =
                            FramedRead::new(input.as_bytes(), RecordCodec::new(config.delimiter));
                        let mut output = Vec::with_capacity(input.len() * 2);
                        let summary = Pipeline::new(
                            InstantLookup,
                            None::<MemoryCache>,
                            config,
                            CancellationToken::new(),
                        )
                        .run(records, &mut output)
                        .await
                        .expect("pipeline run");
                        assert_eq!(summary.emitted, TOTAL_RECORDS as u64);
                        black_box(&output);
                    }

                    start.elapsed()
                }
            });
        });
    }

    group.finish();
}

fn bench_pipeline_cached(c: &mut Criterion) {
    // Every record shares one key, so after the first resolution each task
    // is a cache hit.
    let input: String = (0..TOTAL_RECORDS).map(|_| "key00000\n").collect();
    let rt = Builder::new_multi_thread().enable_all().build().unwrap();

    let mut group = c.benchmark_group("pipeline/run_cached");
    group.throughput(Throughput::Elements(TOTAL_RECORDS as u64));

    group.bench_function(format!("records/{TOTAL_RECORDS}"), |b| {
        b.to_async(&rt).iter_custom(|iters| {
            let input = input.clone();
            async move {
                let start = Instant::now();

                for _ in 0..iters {
                    let config = PipelineConfig::default();
                    let records =
                        FramedRead::new(input.as_bytes(), RecordCodec::new(config.delimiter));
                    let mut output = Vec::with_capacity(input.len() * 2);
                    let summary = Pipeline::new(
                        InstantLookup,
                        Some(MemoryCache::new()),
                        config,
                        CancellationToken::new(),
                    )
                    .run(records, &mut output)
                    .await
                    .expect("pipeline run");
                    assert_eq!(summary.emitted, TOTAL_RECORDS as u64);
                    black_box(&output);
                }

                start.elapsed()
            }
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_decode,
    bench_encode,
    bench_pipeline,
    bench_pipeline_cached
);
criterion_main!(benches);
