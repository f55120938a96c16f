use criterion::{Criterion, black_box, criterion_group, criterion_main};

use lazyval::{Function, PString, Marker, Record, Sequence, Session, Symbol, Thunk, Value};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

fn build_overlays(session: &Session, count: usize) -> (Vec<Symbol>, Vec<Record>) {
    // Seeded for determinism across runs
    let mut rng = ChaCha20Rng::seed_from_u64(0x42);
    let keys: Vec<Symbol> = (0..256).map(|i| session.intern(&format!("k{i}"))).collect();
    let overlays = (0..count)
        .map(|step| {
            let mut picked: Vec<Symbol> = (0..rng.random_range(1..8))
                .map(|_| keys[rng.random_range(0..keys.len())])
                .collect();
            picked.sort();
            picked.dedup();
            Record::from_bindings(
                picked
                    .into_iter()
                    .map(|k| (k, Thunk::ready(Value::Int(step as i64)))),
            )
            .unwrap()
        })
        .collect();
    (keys, overlays)
}

fn bench_update_chain(c: &mut Criterion) {
    let session = Session::default();
    let (keys, overlays) = build_overlays(&session, 1_000);

    c.bench_function("record_update_chain_1000", |b| {
        b.iter(|| {
            let mut record = Record::empty();
            for overlay in &overlays {
                record = record.update(overlay);
            }
            black_box(record)
        })
    });

    let mut chained = Record::empty();
    for overlay in &overlays {
        chained = chained.update(overlay);
    }
    c.bench_function("record_lookup_after_chain", |b| {
        b.iter(|| {
            for key in &keys {
                black_box(chained.lookup(*key));
            }
        })
    });
}

fn bench_sequence(c: &mut Criterion) {
    let left = Sequence::from_values((0..10_000).map(Value::Int));
    let right = Sequence::from_values((0..10_000).map(Value::Int));
    let inc = Function::new(|x| Ok(Value::Int(x.force()?.as_int()? + 1)));

    c.bench_function("sequence_concat_10k", |b| {
        b.iter(|| black_box(left.concat(&right).len()))
    });
    c.bench_function("sequence_map_and_force_10k", |b| {
        b.iter(|| black_box(left.map(&inc).force_all().unwrap().len()))
    });
}

fn bench_context_union(c: &mut Criterion) {
    let parts: Vec<PString> = (0..512)
        .map(|i| PString::with_context("part", [Marker::new(format!("marker-{}", i % 64))]))
        .collect();

    c.bench_function("pstring_concat_many_512", |b| {
        b.iter(|| black_box(PString::concat_many(&parts).context().len()))
    });
}

criterion_group!(benches, bench_update_chain, bench_sequence, bench_context_union);
criterion_main!(benches);
