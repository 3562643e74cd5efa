use std::sync::{Arc, Barrier};
use std::thread;

use veldt_chunk::ChunkStore;
use veldt_world::ChunkCoord;

#[test]
fn racing_callers_share_one_placeholder_per_key() {
    let store = Arc::new(ChunkStore::new());
    let threads = 8;
    let barrier = Arc::new(Barrier::new(threads));
    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let mut seen = Vec::new();
                for cz in -5..5 {
                    for cx in -5..5 {
                        let c = store.get_or_create(ChunkCoord::new(cx, cz));
                        seen.push(Arc::as_ptr(&c) as usize);
                    }
                }
                seen
            })
        })
        .collect();
    let results: Vec<Vec<usize>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(store.len(), 100);
    assert_eq!(store.created(), 100);
    for other in &results[1..] {
        assert_eq!(other, &results[0]);
    }
}

#[test]
fn only_one_caller_begins_loading() {
    let store = Arc::new(ChunkStore::new());
    let threads = 8;
    let barrier = Arc::new(Barrier::new(threads));
    let winners: usize = (0..threads)
        .map(|_| {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                store.get_or_create(ChunkCoord::new(0, 0)).try_begin_loading() as usize
            })
        })
        .collect::<Vec<_>>()
        .into_iter()
        .map(|h| h.join().unwrap())
        .sum();
    assert_eq!(winners, 1);
}
