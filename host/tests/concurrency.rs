//! One cache shared by many threads, each call with its own capabilities.

mod common;

use std::sync::Arc;
use std::thread;

use vmbridge_host::{execute, get_metrics, query, store_code};
use vmbridge_hostapi::{HostGasMeter, MockQuerier, Storage};

use common::*;

const THREADS: usize = 8;
const CALLS_PER_THREAD: usize = 10;

#[test]
fn test_parallel_queries_share_one_cache() {
    let (_dir, cache, checksum) = setup(KV);
    let cache = Arc::new(cache);

    let handles: Vec<_> = (0..THREADS)
        .map(|i| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                let value = format!("value-{}", i);
                let mut store = store_with(&[("key", value.as_str())]);
                let querier = MockQuerier::new();
                for _ in 0..CALLS_PER_THREAD {
                    let mut meter = HostGasMeter::new(GAS_LIMIT);
                    let (result, _) = query(
                        &cache,
                        &checksum,
                        &env(),
                        b"key",
                        &mut meter,
                        caps(&mut store, &querier),
                        GAS_LIMIT,
                        false,
                    );
                    assert_eq!(result.unwrap(), value.as_bytes().to_vec());
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let metrics = get_metrics(&cache).unwrap();
    assert_eq!(metrics.elements_memory, 1);
    assert_eq!(
        metrics.hits_memory as usize + metrics.hits_fs as usize,
        THREADS * CALLS_PER_THREAD
    );
}

#[test]
fn test_parallel_iterators_stay_in_their_frame() {
    let (_dir, cache, checksum) = setup(ITER);
    let cache = Arc::new(cache);

    let handles: Vec<_> = (0..THREADS)
        .map(|i| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                let mut store = vmbridge_hostapi::MemStore::new();
                for n in 0..=i {
                    store.insert(vec![b'a' + n as u8], b"v".to_vec());
                }
                let querier = MockQuerier::new();
                for _ in 0..CALLS_PER_THREAD {
                    let mut meter = HostGasMeter::new(GAS_LIMIT);
                    let (count, _) = query(
                        &cache,
                        &checksum,
                        &env(),
                        b"{}",
                        &mut meter,
                        caps(&mut store, &querier),
                        GAS_LIMIT,
                        false,
                    );
                    assert_eq!(count.unwrap(), vec![(i + 1) as u8]);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn test_store_while_executing() {
    let dir = tempfile::tempdir().unwrap();
    let cache = Arc::new(new_cache(&dir));
    let kv = store_code(&cache, &wasm(KV)).unwrap();

    let writer = {
        let cache = Arc::clone(&cache);
        thread::spawn(move || {
            let mut store = vmbridge_hostapi::MemStore::new();
            let querier = MockQuerier::new();
            for n in 0..CALLS_PER_THREAD {
                let mut meter = HostGasMeter::new(GAS_LIMIT);
                let msg = format!("payload-{}", n);
                let (result, _) = execute(
                    &cache,
                    &kv,
                    &env(),
                    &info("creator", vec![]),
                    msg.as_bytes(),
                    &mut meter,
                    caps(&mut store, &querier),
                    GAS_LIMIT,
                    false,
                );
                result.unwrap();
                assert_eq!(store.get(b"data").unwrap(), Some(msg.into_bytes()));
            }
        })
    };

    let codes = [ITER, ADDR, QUERIER, IBC];
    let storers: Vec<_> = codes
        .iter()
        .map(|wat| {
            let cache = Arc::clone(&cache);
            let code = wasm(wat);
            thread::spawn(move || store_code(&cache, &code).unwrap())
        })
        .collect();

    writer.join().unwrap();
    for storer in storers {
        storer.join().unwrap();
    }
    assert!(get_metrics(&cache).unwrap().elements_memory >= 1);
}
