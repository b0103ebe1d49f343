//! Concurrent acquire/release pressure against one shared gateway.

use std::sync::{Arc, Barrier};
use std::thread;

use cbridge_membrane::{BoundaryContext, BoundaryError, ForeignSurface, Gateway, now_utc};

use crate::error::{HarnessError, Result};
use crate::report::LeakCheckReport;

/// Buffers each worker may hold at once.
const MAX_HELD: usize = 16;

/// Per-thread sequence: deterministic for a given thread index.
fn worker(gw: &Gateway, index: usize, iterations: usize) -> std::result::Result<(), BoundaryError> {
    let mut state = 0x9E37_79B9_7F4A_7C15_u64 ^ (index as u64 + 1);
    let mut held = Vec::with_capacity(MAX_HELD);
    for i in 0..iterations {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        if held.len() < MAX_HELD && state % 3 != 0 {
            held.push(gw.allocate(1 + (state % 256) as usize)?);
        } else if let Some(mut buf) = held.pop() {
            buf.release()?;
        }
        if i % 4 == 0 {
            let mut record = gw.new_record()?;
            gw.process_record(&record)?;
            record.release()?;
        }
    }
    for mut buf in held {
        buf.release()?;
    }
    Ok(())
}

/// Run `threads` workers for `iterations` steps each.
pub fn run_leak_check(
    ctx: &Arc<BoundaryContext>,
    surface: ForeignSurface,
    threads: usize,
    iterations: usize,
) -> Result<LeakCheckReport> {
    if threads == 0 {
        return Err(HarnessError::InvalidArgument("threads must be at least 1".into()));
    }
    let gw = Arc::new(Gateway::open(ctx, surface));
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|index| {
            let gw = Arc::clone(&gw);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                worker(&gw, index, iterations)
            })
        })
        .collect();

    let mut first_error = None;
    for handle in handles {
        match handle.join() {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                first_error.get_or_insert(HarnessError::Boundary(err));
            }
            Err(_) => {
                first_error.get_or_insert(HarnessError::InvalidArgument(
                    "leak-check worker panicked".into(),
                ));
            }
        }
    }
    drop(gw);
    if let Some(err) = first_error {
        return Err(err);
    }

    let registry = ctx.registry();
    Ok(LeakCheckReport {
        timestamp: now_utc(),
        threads,
        iterations,
        high_water: registry.high_water(),
        live: registry.live_count(),
        leaks: ctx.leak_report(),
        metrics: ctx.metrics().snapshot(),
        log_sha256: None,
    })
}
