//! Randomized update chains checked against a `BTreeMap` model.
use std::collections::BTreeMap;

use lazyval::{Record, Session, Symbol, Thunk, Value};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

const KEY_SPACE: usize = 24;

fn random_overlay(rng: &mut impl Rng, keys: &[Symbol], stamp: i64) -> BTreeMap<Symbol, i64> {
    let size = rng.random_range(0..=6);
    (0..size)
        .map(|_| (keys[rng.random_range(0..keys.len())], stamp))
        .collect()
}

fn to_record(model: &BTreeMap<Symbol, i64>) -> Record {
    Record::from_bindings(
        model
            .iter()
            .map(|(k, v)| (*k, Thunk::ready(Value::Int(*v)))),
    )
    .unwrap()
}

fn check(record: &Record, model: &BTreeMap<Symbol, i64>, keys: &[Symbol]) {
    assert_eq!(record.len(), model.len());
    for key in keys {
        let got = record
            .get(*key)
            .unwrap()
            .map(|v| v.as_int().unwrap());
        assert_eq!(got, model.get(key).copied(), "mismatch on {key}");
        assert_eq!(record.contains(*key), model.contains_key(key));
    }
    let flat_keys: Vec<Symbol> = record.flatten().keys().collect();
    assert_eq!(flat_keys, model.keys().copied().collect::<Vec<_>>());
}

#[test]
fn random_chains_agree_with_model() {
    let session = Session::default();
    let keys: Vec<Symbol> = (0..KEY_SPACE)
        .map(|i| session.intern(&format!("attr{i}")))
        .collect();

    for seed in 0..32u64 {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let mut model: BTreeMap<Symbol, i64> = BTreeMap::new();
        let mut record = Record::empty();

        for step in 0..40 {
            let overlay = random_overlay(&mut rng, &keys, step);
            record = record.update(&to_record(&overlay));
            model.extend(overlay);
            assert!(record.depth() <= lazyval::config::DEFAULT_MAX_LAYER_DEPTH);

            if rng.random_bool(0.25) {
                check(&record, &model, &keys);
            }
        }
        check(&record, &model, &keys);
    }
}

#[test]
fn shared_bases_diverge_independently() {
    let session = Session::default();
    let keys: Vec<Symbol> = (0..KEY_SPACE)
        .map(|i| session.intern(&format!("attr{i}")))
        .collect();
    let mut rng = ChaCha20Rng::seed_from_u64(0x42);

    let mut base_model = BTreeMap::new();
    let mut base = Record::empty();
    for step in 0..10 {
        let overlay = random_overlay(&mut rng, &keys, step);
        base = base.update(&to_record(&overlay));
        base_model.extend(overlay);
    }

    for branch in 0..4 {
        let mut model = base_model.clone();
        let mut record = base.clone();
        for step in 0..12 {
            let overlay = random_overlay(&mut rng, &keys, 100 * (branch + 1) + step);
            record = record.update(&to_record(&overlay));
            model.extend(overlay);
        }
        check(&record, &model, &keys);
    }
    check(&base, &base_model, &keys);
}
