use std::fs;
use std::path::PathBuf;

use chrono::Duration;
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};

use ewschart::model::request::{EncounterJson, ObservationSetJson, TrustomerJson};
use ewschart::model::{ObservationSet, ScoreSystemChangeEvent};
use ewschart::timeline::{build_timeline, paginate};

fn fixture<T: serde::de::DeserializeOwned>(name: &str) -> T {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name);
    let text = fs::read_to_string(&path).expect("fixture readable");
    serde_json::from_str(&text).expect("fixture parses")
}

/// The sample sets repeated a month apart, `copies` times over.
fn observation_sets(copies: i64) -> (Vec<ObservationSet>, Vec<ScoreSystemChangeEvent>) {
    let sets: Vec<ObservationSetJson> = fixture("sample_observations.json");
    let encounter: EncounterJson = fixture("sample_encounter.json");
    let trustomer: TrustomerJson = fixture("sample_trustomer.json");
    let send_config = trustomer.send_config.expect("sample send_config");

    let mut observation_sets = Vec::new();
    for copy in 0..copies {
        let shift = Duration::days(90 * copy);
        for json in &sets {
            let mut set = ObservationSet::from_json(json, &send_config);
            set.record_time = set.record_time.map(|time| time + shift);
            observation_sets.push(set);
        }
    }
    let events = encounter
        .score_system_history
        .iter()
        .map(ScoreSystemChangeEvent::from_history)
        .collect();
    (observation_sets, events)
}

fn bench_timeline(c: &mut Criterion) {
    let (sample, events) = observation_sets(1);
    c.bench_function("timeline_sample", |b| {
        b.iter_batched(
            || (sample.clone(), events.clone()),
            |(sets, events)| black_box(paginate(build_timeline(sets, events))),
            BatchSize::SmallInput,
        )
    });

    let (large, events) = observation_sets(50);
    c.bench_function("timeline_950_sets", |b| {
        b.iter_batched(
            || (large.clone(), events.clone()),
            |(sets, events)| black_box(paginate(build_timeline(sets, events))),
            BatchSize::LargeInput,
        )
    });
}

criterion_group!(benches, bench_timeline);
criterion_main!(benches);
