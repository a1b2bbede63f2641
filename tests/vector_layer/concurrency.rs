//! Concurrency Tests
//!
//! One cloned handle shared by many threads.

use crate::*;
use std::sync::{Arc, Barrier};
use std::thread;

#[test]
fn test_concurrent_first_writers_create_once() {
    test_across_backends("concurrent_create", |layer| {
        const NUM_THREADS: usize = 8;

        let barrier = Arc::new(Barrier::new(NUM_THREADS));
        let handles: Vec<_> = (0..NUM_THREADS)
            .map(|i| {
                let layer = layer.clone();
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    let item = VectorItem::new(
                        id(&format!("writer-{}", i)),
                        vec![1.0, i as f32],
                        format!("writer {}", i),
                    );
                    layer.upsert("shared", &[item])
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap().expect("every first writer succeeds");
        }

        assert_eq!(layer.list_collections().unwrap(), vec!["shared"]);
        assert_eq!(found(layer.get("shared")).len(), NUM_THREADS);
    });
}

#[test]
fn test_concurrent_reads_and_writes() {
    let layer = VectorLayer::ephemeral();
    layer.upsert("docs", &circle(10, "seed")).unwrap();

    const NUM_THREADS: usize = 4;
    const OPS_PER_THREAD: usize = 50;

    let barrier = Arc::new(Barrier::new(NUM_THREADS * 2));
    let mut handles = Vec::new();
    for i in 0..NUM_THREADS {
        let writer = layer.clone();
        let barrier_w = Arc::clone(&barrier);
        handles.push(thread::spawn(move || {
            barrier_w.wait();
            for j in 0..OPS_PER_THREAD {
                let item = VectorItem::new(format!("w{}-{}", i, j), vec![j as f32, 1.0], "w");
                writer.upsert("docs", &[item]).unwrap();
            }
        }));

        let reader = layer.clone();
        let barrier_r = Arc::clone(&barrier);
        handles.push(thread::spawn(move || {
            barrier_r.wait();
            for _ in 0..OPS_PER_THREAD {
                let result = found(reader.search("docs", &[vec![1.0, 0.0]], Some(5)));
                assert_eq!(result.first_ids().len(), 5);
            }
        }));
    }

    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(found(layer.get("docs")).len(), 10 + NUM_THREADS * OPS_PER_THREAD);
}
