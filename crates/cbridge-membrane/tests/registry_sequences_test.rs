use cbridge_membrane::{
    BoundaryConfig, BoundaryContext, BoundaryError, ForeignBuffer, Gateway, LogEmitter, LogLevel,
    Origin, RecordHandle, ResourceKind, ViolationMode,
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

#[derive(Clone, Copy, Debug)]
struct XorShift64 {
    state: u64,
}

impl XorShift64 {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next_u64(&mut self) -> u64 {
        // xorshift64*
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545_F491_4F6C_DD1D)
    }

    fn gen_range_usize(&mut self, low: usize, high_inclusive: usize) -> usize {
        assert!(low <= high_inclusive);
        let span = high_inclusive - low + 1;
        low + (self.next_u64() as usize % span)
    }
}

enum Slot {
    Empty,
    Buffer(ForeignBuffer),
    Record(RecordHandle),
    Released(ForeignBuffer),
}

#[test]
fn deterministic_acquire_release_sequences_end_with_empty_registry() {
    const SEEDS: [u64; 4] = [1, 2, 3, 4];
    const STEPS: usize = 1_500;
    const SLOTS: usize = 24;

    for seed in SEEDS {
        let ctx = BoundaryContext::new(BoundaryConfig::default().with_violations(ViolationMode::Report));
        let gw = Gateway::open(&ctx, cbridge_abi::surface());
        let mut rng = XorShift64::new(seed);
        let mut slots: Vec<Slot> = (0..SLOTS).map(|_| Slot::Empty).collect();
        let mut expected_live = 0usize;

        for step in 0..STEPS {
            let i = rng.gen_range_usize(0, SLOTS - 1);
            let slot = std::mem::replace(&mut slots[i], Slot::Empty);
            slots[i] = match (slot, rng.gen_range_usize(0, 3)) {
                (Slot::Empty | Slot::Released(_), 0) => {
                    expected_live += 1;
                    Slot::Record(gw.new_record().expect("new_record"))
                }
                (Slot::Empty | Slot::Released(_), _) => {
                    let size = rng.gen_range_usize(1, 512);
                    let buf = if rng.next_u64() % 2 == 0 {
                        gw.allocate(size).expect("allocate")
                    } else {
                        gw.native_buffer(vec![0xA5; size])
                    };
                    expected_live += 1;
                    Slot::Buffer(buf)
                }
                (Slot::Buffer(mut buf), 0) => {
                    // Wrong deallocator first: refused, buffer untouched.
                    let wrong = match buf.origin() {
                        Origin::Native => Origin::Foreign,
                        Origin::Foreign => Origin::Native,
                    };
                    assert!(
                        matches!(
                            buf.release_with(wrong),
                            Err(BoundaryError::AllocatorMismatch { .. })
                        ),
                        "seed={seed} step={step}"
                    );
                    assert!(buf.is_live());
                    Slot::Buffer(buf)
                }
                (Slot::Buffer(mut buf), _) => {
                    buf.release().expect("release buffer");
                    expected_live -= 1;
                    Slot::Released(buf)
                }
                (Slot::Record(handle), 0) => {
                    gw.process_record(&handle).expect("process");
                    assert!(gw.read_record(&handle).expect("read").processed);
                    Slot::Record(handle)
                }
                (Slot::Record(mut handle), _) => {
                    let id = handle.id();
                    handle.release().expect("release record");
                    assert_eq!(
                        handle.release().unwrap_err(),
                        BoundaryError::DoubleRelease { id },
                        "seed={seed} step={step}"
                    );
                    expected_live -= 1;
                    Slot::Empty
                }
            };

            if let Slot::Released(buf) = &slots[i] {
                let id = buf.id();
                assert_eq!(
                    buf.as_slice().unwrap_err(),
                    BoundaryError::UseAfterRelease { id }
                );
                assert!(!ctx.registry().contains(id));
            }
            assert_eq!(
                ctx.registry().live_count(),
                expected_live,
                "seed={seed} step={step}"
            );
        }

        drop(slots);
        let leaks = ctx.leak_report();
        assert!(
            leaks.is_empty(),
            "{}",
            json!({ "seed": seed, "leaks": leaks })
        );
        assert!(ctx.registry().high_water() <= SLOTS);
    }
}

#[test]
fn token_ids_are_never_reused() {
    let ctx = BoundaryContext::new(BoundaryConfig::default());
    let gw = Gateway::open(&ctx, cbridge_abi::surface());
    let mut seen = std::collections::BTreeSet::new();
    for _ in 0..64 {
        let mut buf = gw.allocate(16).unwrap();
        assert!(seen.insert(buf.id()));
        buf.release().unwrap();
    }
    let handle = gw.new_record().unwrap();
    assert!(seen.insert(handle.id()));
    let meta = ctx.registry().lookup(handle.id()).unwrap();
    assert_eq!(meta.kind, ResourceKind::Handle);
}

#[test]
fn two_threads_acquire_and_release_concurrently() {
    const PER_THREAD: usize = 500;
    const MAX_HELD: usize = 8;

    let ctx = BoundaryContext::with_log(
        BoundaryConfig::default(),
        LogEmitter::to_buffer("threads", LogLevel::Debug),
    );
    let gw = Arc::new(Gateway::open(&ctx, cbridge_abi::surface()));
    let barrier = Arc::new(Barrier::new(3));
    // Bumped before each acquisition and after each release.
    let acquired = Arc::new(AtomicUsize::new(0));
    let released = Arc::new(AtomicUsize::new(0));
    let running = Arc::new(AtomicUsize::new(2));

    let workers: Vec<_> = (0..2u64)
        .map(|t| {
            let gw = Arc::clone(&gw);
            let barrier = Arc::clone(&barrier);
            let acquired = Arc::clone(&acquired);
            let released = Arc::clone(&released);
            let running = Arc::clone(&running);
            thread::spawn(move || {
                let mut rng = XorShift64::new(0x5EED + t);
                barrier.wait();
                let mut held = Vec::new();
                for _ in 0..PER_THREAD {
                    if held.len() < MAX_HELD && rng.next_u64() % 3 != 0 {
                        acquired.fetch_add(1, Ordering::SeqCst);
                        held.push(gw.allocate(rng.gen_range_usize(1, 128)).unwrap());
                    } else if let Some(mut buf) = held.pop() {
                        buf.release().unwrap();
                        released.fetch_add(1, Ordering::SeqCst);
                    }
                    acquired.fetch_add(1, Ordering::SeqCst);
                    let mut rec = gw.new_record().unwrap();
                    rec.release().unwrap();
                    released.fetch_add(1, Ordering::SeqCst);
                }
                for mut buf in held {
                    buf.release().unwrap();
                    released.fetch_add(1, Ordering::SeqCst);
                }
                running.fetch_sub(1, Ordering::SeqCst);
            })
        })
        .collect();

    let sampler = {
        let ctx = Arc::clone(&ctx);
        let barrier = Arc::clone(&barrier);
        let acquired = Arc::clone(&acquired);
        let released = Arc::clone(&released);
        let running = Arc::clone(&running);
        thread::spawn(move || {
            barrier.wait();
            let mut samples = 0usize;
            loop {
                let finished = running.load(Ordering::SeqCst) == 0;
                // Releases read first, acquisitions last: an upper bound on
                // what was outstanding while the snapshot was taken.
                let before = released.load(Ordering::SeqCst);
                let live = ctx.registry().snapshot().len();
                let outstanding = acquired.load(Ordering::SeqCst) - before;
                assert!(
                    live <= outstanding,
                    "{}",
                    json!({ "live": live, "outstanding": outstanding, "sample": samples })
                );
                samples += 1;
                if finished {
                    break samples;
                }
            }
        })
    };

    for worker in workers {
        worker.join().unwrap();
    }
    assert!(sampler.join().unwrap() > 0);

    assert!(ctx.registry().is_empty());
    let high_water = ctx.registry().high_water();
    assert!(
        (1..=2 * (MAX_HELD + 1)).contains(&high_water),
        "high_water={high_water}"
    );
    assert_eq!(acquired.load(Ordering::SeqCst), released.load(Ordering::SeqCst));
    let snap = ctx.metrics().snapshot();
    assert_eq!(snap.handles_acquired, snap.handles_released);
    assert_eq!(snap.buffers_wrapped, snap.buffers_released);
    assert_eq!(snap.violations(), 0);

    // Every log line parses and carries a unique trace id.
    let entries = ctx.log().entries();
    let ids: std::collections::HashSet<_> = entries.iter().map(|e| e.trace_id.clone()).collect();
    assert_eq!(ids.len(), entries.len());
}
