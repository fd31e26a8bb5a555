//! Stress tests for cadledger.
//!
//! These tests verify behavior under long histories and concurrent readers.

use cadledger_core::{CommandReport, CoreResult, Dimension, Domain, Point3, Session};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Successful operations.
    pub successful_ops: usize,
    /// Failed operations.
    pub failed_ops: usize,
    /// Total duration.
    pub duration: Duration,
    /// Operations per second.
    pub ops_per_second: f64,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(successful: usize, failed: usize, duration: Duration) -> Self {
        let total = successful + failed;
        let ops_per_second = if duration.as_secs_f64() > 0.0 {
            total as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            total_ops: total,
            successful_ops: successful,
            failed_ops: failed,
            duration,
            ops_per_second,
        }
    }

    /// Prints a summary of the test.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {} ===", name);
        println!("Total operations: {}", self.total_ops);
        println!("Successful: {}", self.successful_ops);
        println!("Failed: {}", self.failed_ops);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} ops/sec", self.ops_per_second);
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of edits to perform.
    pub operations: usize,
    /// Number of concurrent reader threads.
    pub threads: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            operations: 2_000,
            threads: 4,
        }
    }
}

fn grid_point(i: usize) -> Point3 {
    Point3::new((i % 97) as f64, (i / 97) as f64, 0.0)
}

/// Creates vertices and segments between consecutive ones.
pub fn stress_sequential_edits(session: &Session, config: &StressConfig) -> StressTestResult {
    let start = Instant::now();
    let mut successful = 0usize;
    let mut failed = 0usize;
    let mut last: Option<String> = None;

    for i in 0..config.operations {
        let report = match session.geometry().create_vertex(grid_point(i)) {
            Ok(report) => report,
            Err(_) => {
                failed += 1;
                continue;
            }
        };
        successful += 1;
        let name = session.names_of(&report.output.created).remove(0);
        if let Some(previous) = last.replace(name.clone()) {
            match session.geometry().create_segment(&previous, &name) {
                Ok(_) => successful += 1,
                Err(_) => failed += 1,
            }
        }
    }

    StressTestResult::new(successful, failed, start.elapsed())
}

type HistoryMove = fn(&Session) -> CoreResult<Option<CommandReport>>;

/// Walks the whole history back and forth.
pub fn stress_history_walk(session: &Session) -> StressTestResult {
    let start = Instant::now();
    let mut successful = 0usize;
    let mut failed = 0usize;

    let moves: [HistoryMove; 2] = [Session::undo, Session::redo];
    for step in moves {
        loop {
            match step(session) {
                Ok(Some(_)) => successful += 1,
                Ok(None) => break,
                Err(_) => {
                    failed += 1;
                    break;
                }
            }
        }
    }

    StressTestResult::new(successful, failed, start.elapsed())
}

/// Edits on one thread while readers check that every snapshot they see
/// has a segment for each pair of consecutive vertices.
pub fn stress_concurrent_readers(session: Arc<Session>, config: &StressConfig) -> StressTestResult {
    let done = Arc::new(AtomicBool::new(false));
    let reads = Arc::new(AtomicUsize::new(0));
    let torn = Arc::new(AtomicUsize::new(0));
    let start = Instant::now();

    let readers: Vec<_> = (0..config.threads)
        .map(|_| {
            let session = Arc::clone(&session);
            let done = Arc::clone(&done);
            let reads = Arc::clone(&reads);
            let torn = Arc::clone(&torn);
            thread::spawn(move || {
                while !done.load(Ordering::Acquire) {
                    let world = session.world();
                    let vertices = world.store(Domain::Geometry).live_count(Dimension::D0);
                    let curves = world.store(Domain::Geometry).live_count(Dimension::D1);
                    // each segment follows the vertex it ends at
                    if curves > vertices.saturating_sub(1) || curves + 2 < vertices {
                        torn.fetch_add(1, Ordering::Relaxed);
                    }
                    reads.fetch_add(1, Ordering::Relaxed);
                }
            })
        })
        .collect();

    let writes = stress_sequential_edits(&session, config);
    done.store(true, Ordering::Release);
    for reader in readers {
        reader.join().expect("Thread panicked");
    }

    StressTestResult::new(
        writes.successful_ops + reads.load(Ordering::Relaxed),
        writes.failed_ops + torn.load(Ordering::Relaxed),
        start.elapsed(),
    )
}
