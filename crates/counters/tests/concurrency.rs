use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use counters::{Category, CounterRegistry, Level, WorkerCounter, WorkerCounters, WorkerValues};

/// Sweeps until `done` is set, then once more, returning the total per slot.
fn sweep_until(registry: &CounterRegistry, done: &AtomicBool) -> (u64, u64, Vec<WorkerValues>) {
    let mut tx_total = 0;
    let mut latency_total = 0;
    let mut sweeps = Vec::new();

    loop {
        let finished = done.load(Ordering::Acquire);

        let mut acc = WorkerValues::new();
        registry.aggregate_workers(&mut acc);
        tx_total += acc[WorkerCounter::TxP];
        latency_total += acc[WorkerCounter::Latency];
        sweeps.push(acc);

        if finished {
            break;
        }
        thread::yield_now();
    }

    (tx_total, latency_total, sweeps)
}

#[test]
fn test_no_increment_is_lost_or_counted_twice() {
    const THREADS: usize = 4;
    const INCREMENTS: u64 = 50_000;

    let registry = Arc::new(CounterRegistry::new(Level::Release));
    let done = Arc::new(AtomicBool::new(false));

    // Producers stay registered until every sweep is over
    let producers: Vec<_> = (0..THREADS)
        .map(|_| Arc::new(WorkerCounters::new(&registry)))
        .collect();
    let start = Arc::new(Barrier::new(THREADS + 1));

    let sweeper = {
        let registry = registry.clone();
        let done = done.clone();
        let start = start.clone();
        thread::spawn(move || {
            start.wait();
            sweep_until(&registry, &done)
        })
    };

    let workers: Vec<_> = producers
        .iter()
        .map(|counters| {
            let counters = counters.clone();
            let start = start.clone();
            thread::spawn(move || {
                start.wait();
                for _ in 0..INCREMENTS {
                    counters.incr(WorkerCounter::TxP);
                    counters.incr_by(WorkerCounter::Latency, 3);
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }
    done.store(true, Ordering::Release);

    let (tx_total, latency_total, sweeps) = sweeper.join().unwrap();
    assert_eq!(tx_total, THREADS as u64 * INCREMENTS);
    assert_eq!(latency_total, 3 * THREADS as u64 * INCREMENTS);
    assert!(!sweeps.is_empty());
}

#[test]
fn test_deregistering_producer_is_fully_included_or_absent() {
    const PRODUCERS: u64 = 2_000;

    let registry = Arc::new(CounterRegistry::new(Level::Release));
    let done = Arc::new(AtomicBool::new(false));

    let sweeper = {
        let registry = registry.clone();
        let done = done.clone();
        thread::spawn(move || sweep_until(&registry, &done))
    };

    let churn = {
        let registry = registry.clone();
        thread::spawn(move || {
            for _ in 0..PRODUCERS {
                // Both slots are written before the drop, so a sweep sees
                // both or neither
                let counters = WorkerCounters::new(&registry);
                counters.incr(WorkerCounter::TxP);
                counters.incr(WorkerCounter::Latency);
                drop(counters);
            }
        })
    };

    churn.join().unwrap();
    done.store(true, Ordering::Release);

    let (tx_total, latency_total, sweeps) = sweeper.join().unwrap();
    for acc in &sweeps {
        assert_eq!(acc[WorkerCounter::TxP], acc[WorkerCounter::Latency]);
    }
    assert_eq!(tx_total, latency_total);
    assert!(tx_total <= PRODUCERS);
    assert_eq!(registry.producer_count(Category::Worker), 0);
}

#[test]
fn test_registration_from_many_threads() {
    let registry = Arc::new(CounterRegistry::new(Level::Release));
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let registry = registry.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                let counters = WorkerCounters::new(&registry);
                counters.incr_by(WorkerCounter::SsdPagesRead, 2);
                barrier.wait();
                counters
            })
        })
        .collect();

    let producers: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(registry.producer_count(Category::Worker), 8);

    let mut acc = WorkerValues::new();
    assert_eq!(registry.aggregate_workers(&mut acc), 8);
    assert_eq!(acc[WorkerCounter::SsdPagesRead], 16);

    drop(producers);
    assert_eq!(registry.producer_count(Category::Worker), 0);
}
