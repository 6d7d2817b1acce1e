use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use join_ring::{LocalConfig, MpmcRing, MpscRing, SpscRing};
use std::sync::Arc;
use std::thread;

const MSG_PER_PRODUCER: u64 = 2_000_000;

fn bench_spsc(c: &mut Criterion) {
    let mut group = c.benchmark_group("spsc");
    group.throughput(Throughput::Elements(MSG_PER_PRODUCER));

    group.bench_function("single_producer_consumer", |b| {
        b.iter(|| {
            let ring = Arc::new(SpscRing::<u32>::new_local(LocalConfig::new(1 << 16)));
            let producer = ring.clone();

            let producer_handle = thread::spawn(move || {
                for i in 0..MSG_PER_PRODUCER {
                    producer.push(i as u32).unwrap();
                }
            });

            let mut count = 0u64;
            while count < MSG_PER_PRODUCER {
                if let Ok(v) = ring.pop() {
                    black_box(v);
                    count += 1;
                }
            }
            producer_handle.join().unwrap();
        });
    });

    group.finish();
}

fn bench_mpsc(c: &mut Criterion) {
    let mut group = c.benchmark_group("mpsc");

    for producers in [2usize, 4, 8] {
        group.throughput(Throughput::Elements(MSG_PER_PRODUCER));
        group.bench_with_input(BenchmarkId::from_parameter(producers), &producers, |b, &producers| {
            b.iter(|| {
                let ring = Arc::new(MpscRing::<u32>::new_local(LocalConfig::new(1 << 16)));
                let per_producer = MSG_PER_PRODUCER / producers as u64;

                let handles: Vec<_> = (0..producers)
                    .map(|_| {
                        let ring = ring.clone();
                        thread::spawn(move || {
                            for i in 0..per_producer {
                                ring.push(i as u32).unwrap();
                            }
                        })
                    })
                    .collect();

                let total = per_producer * producers as u64;
                let mut count = 0u64;
                while count < total {
                    if let Ok(v) = ring.pop() {
                        black_box(v);
                        count += 1;
                    }
                }
                for h in handles {
                    h.join().unwrap();
                }
            });
        });
    }

    group.finish();
}

fn bench_mpmc_contention(c: &mut Criterion) {
    let mut group = c.benchmark_group("mpmc_contention");

    for producers in [4usize, 8] {
        group.bench_with_input(BenchmarkId::from_parameter(producers), &producers, |b, &producers| {
            b.iter(|| {
                let ring = Arc::new(MpmcRing::<u32>::new_local(LocalConfig::new(4096)));
                let per_producer = 200_000u64;

                let handles: Vec<_> = (0..producers)
                    .map(|_| {
                        let ring = ring.clone();
                        thread::spawn(move || {
                            for i in 0..per_producer {
                                ring.push(i as u32).unwrap();
                            }
                        })
                    })
                    .collect();

                let consumer_handles: Vec<_> = (0..producers)
                    .map(|_| {
                        let ring = ring.clone();
                        thread::spawn(move || {
                            let mut popped = 0u64;
                            while popped < per_producer {
                                if let Ok(v) = ring.pop() {
                                    black_box(v);
                                    popped += 1;
                                }
                            }
                        })
                    })
                    .collect();

                for h in handles {
                    h.join().unwrap();
                }
                for h in consumer_handles {
                    h.join().unwrap();
                }
            });
        });
    }

    group.finish();
}

fn bench_zero_copy_payload(c: &mut Criterion) {
    let mut group = c.benchmark_group("zero_copy");
    group.throughput(Throughput::Elements(MSG_PER_PRODUCER));

    group.bench_function("u64x8_payload", |b| {
        b.iter(|| {
            let ring = Arc::new(SpscRing::<[u64; 8]>::new_local(LocalConfig::new(1 << 14)));
            let producer = ring.clone();

            let handle = thread::spawn(move || {
                for i in 0..MSG_PER_PRODUCER {
                    let mut r = producer.reserve_with_backoff().unwrap();
                    r.write([i; 8]);
                    r.commit();
                }
            });

            let mut count = 0u64;
            while count < MSG_PER_PRODUCER {
                if let Ok(v) = ring.pop() {
                    black_box(v);
                    count += 1;
                }
            }
            handle.join().unwrap();
        });
    });

    group.finish();
}

criterion_group!(benches, bench_spsc, bench_mpsc, bench_mpmc_contention, bench_zero_copy_payload);
criterion_main!(benches);
