//! Demo driver: spawns a producer thread pool and one consumer thread
//! against either engine and reports average per-event latency. Mirrors
//! `original_source`'s `EventProcessorApp::main.cpp`, with the engine
//! choice and producer count taken from argv instead of hardcoded, and a
//! `Counter` payload standing in for the original's static `Event`
//! counters.
//!
//! Usage: `driver [lockfree|mutex] [producers] [max_events]`

use eventring::{Config, EventPayload, LockFreeEngine, MutexEngine};
use std::env;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

const CAPACITY: u64 = 1024;
const DEFAULT_PRODUCERS: usize = 3;
const DEFAULT_MAX_EVENTS: u64 = 1_000_000;

/// The driver's payload: increments a shared counter on execution, the
/// in-repo equivalent of `original_source`'s static `Event::consumed`.
struct Counter {
    consumed: Arc<AtomicU64>,
}

impl EventPayload for Counter {
    fn execute(&self) {
        self.consumed.fetch_add(1, Ordering::Relaxed);
    }
}

enum Engine {
    LockFree(LockFreeEngine<Counter>),
    Mutex(MutexEngine<Counter>),
}

impl Engine {
    fn name(&self) -> &'static str {
        match self {
            Engine::LockFree(_) => "LockFreeEngine<Counter>",
            Engine::Mutex(_) => "MutexEngine<Counter>",
        }
    }

    fn reserve(&self, consumed: Arc<AtomicU64>) {
        match self {
            Engine::LockFree(e) => {
                e.reserve(|| Counter { consumed });
            }
            Engine::Mutex(e) => {
                e.reserve(|| Counter { consumed });
            }
        }
    }

    fn commit(&self, seq: u64) {
        match self {
            Engine::LockFree(e) => e.commit(seq),
            Engine::Mutex(e) => e.commit(seq),
        }
    }
}

fn run_event_processing(engine: Engine, producers_count: usize, max_events: u64) {
    let line = "-".repeat(60);
    println!("{line}");
    println!("{}", engine.name());
    println!("{line}");
    println!("Producers: {producers_count}");
    println!("Consumer: 1");
    println!("Max Events: {max_events}");

    let engine = Arc::new(engine);
    let start = Arc::new(AtomicBool::new(false));
    let produced = Arc::new(AtomicU64::new(0));
    let consumed = Arc::new(AtomicU64::new(0));

    let producers: Vec<_> = (0..producers_count)
        .map(|_| {
            let engine = Arc::clone(&engine);
            let start = Arc::clone(&start);
            let produced = Arc::clone(&produced);
            let consumed = Arc::clone(&consumed);
            thread::spawn(move || {
                while !start.load(Ordering::Acquire) {
                    thread::yield_now();
                }
                while produced.load(Ordering::Relaxed) < max_events {
                    produced.fetch_add(1, Ordering::Relaxed);
                    engine.reserve(Arc::clone(&consumed));
                }
            })
        })
        .collect();

    let consumer = {
        let engine = Arc::clone(&engine);
        let start = Arc::clone(&start);
        let consumed = Arc::clone(&consumed);
        thread::spawn(move || {
            while !start.load(Ordering::Acquire) {
                thread::yield_now();
            }
            let mut seq = 0u64;
            while consumed.load(Ordering::Relaxed) < max_events {
                engine.commit(seq);
                seq += 1;
            }
        })
    };

    start.store(true, Ordering::Release);
    let begin = Instant::now();

    for producer in producers {
        producer.join().expect("producer thread panicked");
    }
    consumer.join().expect("consumer thread panicked");

    let elapsed = begin.elapsed();
    let avg_ns = elapsed.as_nanos() / u128::from(max_events);
    println!("AVG per event: {avg_ns}ns");
}

fn main() {
    let mut args = env::args().skip(1);
    let engine_kind = args.next().unwrap_or_else(|| "mutex".to_string());
    let producers_count = args
        .next()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_PRODUCERS);
    let max_events = args
        .next()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_MAX_EVENTS);

    let engine = match engine_kind.as_str() {
        "lockfree" | "lock-free" => {
            Engine::LockFree(LockFreeEngine::with_config(Config::new(CAPACITY)))
        }
        _ => Engine::Mutex(MutexEngine::with_config(Config::new(CAPACITY))),
    };

    run_event_processing(engine, producers_count, max_events);
}
