//! End-to-end scenarios over the in-memory store with a fixed clock.

use chrono::{Duration, TimeZone, Utc};
use graviton_core::{
    BatchMetrics, BatchState, Clock, FixedClock, Graviton, GravitonError, MemoryStore, NewBatch,
    NewReading, ViewDetail, attenuation,
};
use std::sync::{Arc, Barrier};
use std::thread;

fn graviton() -> (Graviton<MemoryStore>, Arc<FixedClock>) {
    let clock = Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2017, 11, 1, 12, 0, 0)
            .single()
            .expect("fixed time"),
    ));
    (Graviton::with_clock(MemoryStore::new(), clock.clone()), clock)
}

#[test]
fn flue_season_from_start_to_archive() {
    let (graviton, clock) = graviton();
    let mut green = graviton
        .hydrometers()
        .create("Green Hydrometer", "A fake hydrometer with green plastic.")
        .expect("create hydrometer");
    let mut flue = graviton
        .batches()
        .create(NewBatch::new("Flue Season", "20171101-flueseason"))
        .expect("create batch");
    graviton
        .assignments()
        .assign_hydrometer(&mut flue, &mut green)
        .expect("assign");

    // Posted out of order: the 60 minute sample arrives last.
    let t0 = clock.now();
    for (minutes, gravity) in [(0, 1.077), (30, 1.075), (90, 1.071), (60, 1.074)] {
        graviton
            .batches()
            .add_reading(
                &mut flue,
                NewReading::new(t0 + Duration::minutes(minutes), gravity, 68.8, 3.7),
            )
            .expect("add reading");
    }
    let gravities: Vec<f64> = flue.readings.iter().map(|r| r.gravity).collect();
    assert_eq!(gravities, vec![1.077, 1.075, 1.074, 1.071]);

    let metrics = BatchMetrics::for_batch(&flue);
    assert_eq!(metrics.attenuation, attenuation(1.077, 1.071));
    let expected = 1.0 - ((1.077 - 1.0) - (1.077 - 1.071)) / (1.077 - 1.0);
    assert!((metrics.attenuation - expected).abs() < 1e-12);

    let view = graviton
        .batch_view(&flue, ViewDetail::Full)
        .expect("full view");
    assert_eq!(view.readings.as_ref().map(Vec::len), Some(4));
    assert_eq!(
        view.hydrometer.as_ref().map(|h| h.name.as_str()),
        Some("Green Hydrometer")
    );

    clock.advance(Duration::days(14));
    graviton.lifecycle().finish(&mut flue).expect("finish");
    graviton.lifecycle().archive(&mut flue).expect("archive");

    let stored = graviton.batches().require(&flue.id).expect("stored batch");
    assert!(!stored.active);
    assert!(stored.archived);
    assert_eq!(stored.state(), BatchState::Archived);
    assert_eq!(stored.hydrometer, Some(green.id));
    let green = graviton
        .hydrometers()
        .require(&green.id)
        .expect("stored hydrometer");
    assert!(green.is_unassigned());
    assert!(graviton.reconcile(true).expect("scan").is_clean());
}

#[test]
fn hydrometer_moves_between_batches_only_after_finish() {
    let (graviton, _) = graviton();
    let mut green = graviton
        .hydrometers()
        .create("Green Hydrometer", "")
        .expect("create hydrometer");
    let mut flue = graviton
        .start_batch(NewBatch::new("Flue Season", "20171101-flueseason"), Some(&green.id))
        .expect("start flue season");
    green = graviton.hydrometers().require(&green.id).expect("reload");
    let mut hop = graviton
        .batches()
        .create(NewBatch::new("Hop Forward", "20171101-hopforward"))
        .expect("create hop forward");

    let err = graviton
        .assignments()
        .assign_hydrometer(&mut hop, &mut green)
        .expect_err("still held by flue season");
    assert!(matches!(err, GravitonError::Conflict(_)));
    assert!(!hop.has_hydrometer());

    graviton.lifecycle().finish(&mut flue).expect("finish");
    green = graviton.hydrometers().require(&green.id).expect("reload");
    graviton
        .assignments()
        .assign_hydrometer(&mut hop, &mut green)
        .expect("free after finish");
    assert_eq!(green.current_batch, Some(hop.id));
    assert_eq!(flue.hydrometer, Some(green.id));
}

#[test]
fn concurrent_assignment_has_exactly_one_winner() {
    let (graviton, _) = graviton();
    let graviton = Arc::new(graviton);
    let green = graviton
        .hydrometers()
        .create("Green Hydrometer", "")
        .expect("create hydrometer");
    let batches = [
        ("Flue Season", "20171101-flueseason"),
        ("Hop Forward", "20171101-hopforward"),
    ]
    .map(|(recipe, unique_id)| {
        graviton
            .batches()
            .create(NewBatch::new(recipe, unique_id))
            .expect("create batch")
    });

    let barrier = Arc::new(Barrier::new(batches.len()));
    let handles: Vec<_> = batches
        .into_iter()
        .map(|mut batch| {
            let graviton = Arc::clone(&graviton);
            let barrier = Arc::clone(&barrier);
            let mut green = green.clone();
            thread::spawn(move || {
                barrier.wait();
                graviton
                    .assignments()
                    .assign_hydrometer(&mut batch, &mut green)
                    .map(|()| batch.id)
            })
        })
        .collect();

    let outcomes: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().expect("worker should join"))
        .collect();
    let winners: Vec<_> = outcomes.iter().filter_map(|o| o.as_ref().ok()).collect();
    assert_eq!(winners.len(), 1, "outcomes: {outcomes:?}");
    assert!(
        outcomes
            .iter()
            .filter_map(|o| o.as_ref().err())
            .all(|err| matches!(err, GravitonError::Conflict(_)))
    );

    let holders = graviton.batches().holders_of(&green.id).expect("holders");
    assert_eq!(holders.len(), 1);
    assert_eq!(&holders[0].id, winners[0]);
    let green = graviton.hydrometers().require(&green.id).expect("reload");
    assert_eq!(green.current_batch.as_ref(), Some(winners[0]));
}
