//! Composable simulation completion criteria.
//!
//! A criterion decides when the simulation has sampled enough. Leaves count
//! committed histories or accumulate running wall time; criteria compose
//! with AND/OR combinators (also available as the `&` and `|` operators).
//!
//! Each criterion is a small state machine: not started, running, or
//! stopped. Commits are only counted while running, and stopping freezes
//! the wall-time accumulation without discarding it, so a criterion can be
//! restarted across simulation batches.

use std::fmt;
use std::io::{self, Write};
use std::ops::{BitAnd, BitOr};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::info;
use transport_core::{Communicator, CommunicatorError};

/// Criterion construction failure.
#[derive(Debug, Error, PartialEq)]
pub enum CriterionError {
    #[error("history count wall must be positive")]
    ZeroHistoryWall,

    #[error("wall time limit must be positive")]
    NonPositiveTimeWall,
}

struct HistoryCountState {
    wall: u64,
    count: AtomicU64,
    running: AtomicBool,
    /// Commits observed since the last completion check.
    uncommitted: AtomicBool,
}

struct WallTimeState {
    wall: Duration,
    running: AtomicBool,
    /// Accumulated running time from earlier start/stop intervals plus the
    /// reference point of the current interval.
    clock: Mutex<WallTimeClock>,
}

#[derive(Clone, Copy)]
struct WallTimeClock {
    accumulated: Duration,
    started_at: Option<Instant>,
}

impl WallTimeState {
    fn elapsed(&self) -> Duration {
        let clock = match self.clock.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        match clock.started_at {
            Some(start) => clock.accumulated + start.elapsed(),
            None => clock.accumulated,
        }
    }
}

enum Node {
    HistoryCount(HistoryCountState),
    WallTime(WallTimeState),
    And(Box<Node>, Box<Node>),
    Or(Box<Node>, Box<Node>),
}

impl Node {
    fn start(&self) {
        match self {
            Node::HistoryCount(state) => {
                state.running.store(true, Ordering::SeqCst);
            }
            Node::WallTime(state) => {
                let mut clock = match state.clock.lock() {
                    Ok(guard) => guard,
                    Err(poisoned) => poisoned.into_inner(),
                };
                clock.started_at = Some(Instant::now());
                state.running.store(true, Ordering::SeqCst);
            }
            Node::And(a, b) | Node::Or(a, b) => {
                a.start();
                b.start();
            }
        }
    }

    fn stop(&self) {
        match self {
            Node::HistoryCount(state) => {
                state.running.store(false, Ordering::SeqCst);
            }
            Node::WallTime(state) => {
                state.running.store(false, Ordering::SeqCst);
                let mut clock = match state.clock.lock() {
                    Ok(guard) => guard,
                    Err(poisoned) => poisoned.into_inner(),
                };
                if let Some(start) = clock.started_at.take() {
                    clock.accumulated += start.elapsed();
                }
            }
            Node::And(a, b) | Node::Or(a, b) => {
                a.stop();
                b.stop();
            }
        }
    }

    fn commit(&self) {
        match self {
            Node::HistoryCount(state) => {
                if state.running.load(Ordering::SeqCst) {
                    state.count.fetch_add(1, Ordering::SeqCst);
                    state.uncommitted.store(true, Ordering::SeqCst);
                }
            }
            Node::WallTime(_) => {}
            Node::And(a, b) | Node::Or(a, b) => {
                a.commit();
                b.commit();
            }
        }
    }

    fn is_complete(&self) -> bool {
        match self {
            Node::HistoryCount(state) => {
                state.uncommitted.store(false, Ordering::SeqCst);
                state.count.load(Ordering::SeqCst) >= state.wall
            }
            Node::WallTime(state) => state.elapsed() >= state.wall,
            Node::And(a, b) => {
                // Evaluate both so each leaf sees the completion check.
                let left = a.is_complete();
                let right = b.is_complete();
                left && right
            }
            Node::Or(a, b) => {
                let left = a.is_complete();
                let right = b.is_complete();
                left || right
            }
        }
    }

    fn has_uncommitted(&self) -> bool {
        match self {
            Node::HistoryCount(state) => state.uncommitted.load(Ordering::SeqCst),
            Node::WallTime(state) => state.running.load(Ordering::SeqCst),
            Node::And(a, b) | Node::Or(a, b) => a.has_uncommitted() || b.has_uncommitted(),
        }
    }

    fn extend_flat(&self, f64_buffer: &mut Vec<f64>, u64_buffer: &mut Vec<u64>) {
        match self {
            Node::HistoryCount(state) => {
                u64_buffer.push(state.count.load(Ordering::SeqCst));
            }
            Node::WallTime(state) => {
                f64_buffer.push(state.elapsed().as_secs_f64());
            }
            Node::And(a, b) | Node::Or(a, b) => {
                a.extend_flat(f64_buffer, u64_buffer);
                b.extend_flat(f64_buffer, u64_buffer);
            }
        }
    }

    fn absorb_flat(&self, f64_buffer: &[f64], u64_buffer: &[u64]) -> (usize, usize) {
        match self {
            Node::HistoryCount(state) => {
                state.count.store(u64_buffer[0], Ordering::SeqCst);
                (0, 1)
            }
            Node::WallTime(state) => {
                let mut clock = match state.clock.lock() {
                    Ok(guard) => guard,
                    Err(poisoned) => poisoned.into_inner(),
                };
                clock.accumulated = Duration::from_secs_f64(f64_buffer[0]);
                if clock.started_at.is_some() {
                    clock.started_at = Some(Instant::now());
                }
                (1, 0)
            }
            Node::And(a, b) | Node::Or(a, b) => {
                let (fa, ua) = a.absorb_flat(f64_buffer, u64_buffer);
                let (fb, ub) = b.absorb_flat(&f64_buffer[fa..], &u64_buffer[ua..]);
                (fa + fb, ua + ub)
            }
        }
    }

    fn write_summary(&self, w: &mut dyn Write, indent: usize) -> io::Result<()> {
        let pad = " ".repeat(indent);
        match self {
            Node::HistoryCount(state) => writeln!(
                w,
                "{}histories committed: {} / {}",
                pad,
                state.count.load(Ordering::SeqCst),
                state.wall
            ),
            Node::WallTime(state) => writeln!(
                w,
                "{}wall time elapsed: {:.1}s / {:.1}s",
                pad,
                state.elapsed().as_secs_f64(),
                state.wall.as_secs_f64()
            ),
            Node::And(a, b) => {
                writeln!(w, "{}all of:", pad)?;
                a.write_summary(w, indent + 2)?;
                b.write_summary(w, indent + 2)
            }
            Node::Or(a, b) => {
                writeln!(w, "{}any of:", pad)?;
                a.write_summary(w, indent + 2)?;
                b.write_summary(w, indent + 2)
            }
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::HistoryCount(state) => f
                .debug_struct("HistoryCount")
                .field("wall", &state.wall)
                .field("count", &state.count.load(Ordering::SeqCst))
                .finish(),
            Node::WallTime(state) => f
                .debug_struct("WallTime")
                .field("wall", &state.wall)
                .field("elapsed", &state.elapsed())
                .finish(),
            Node::And(a, b) => f.debug_tuple("And").field(a).field(b).finish(),
            Node::Or(a, b) => f.debug_tuple("Or").field(a).field(b).finish(),
        }
    }
}

/// A composable criterion deciding when the simulation is complete.
#[derive(Debug)]
pub struct CompletionCriterion {
    node: Node,
}

impl CompletionCriterion {
    /// Complete after `wall` committed histories.
    pub fn history_count(wall: u64) -> Result<Self, CriterionError> {
        if wall == 0 {
            return Err(CriterionError::ZeroHistoryWall);
        }
        Ok(Self {
            node: Node::HistoryCount(HistoryCountState {
                wall,
                count: AtomicU64::new(0),
                running: AtomicBool::new(false),
                uncommitted: AtomicBool::new(false),
            }),
        })
    }

    /// Complete after `wall` of accumulated running time.
    pub fn wall_time(wall: Duration) -> Result<Self, CriterionError> {
        if wall.is_zero() {
            return Err(CriterionError::NonPositiveTimeWall);
        }
        Ok(Self {
            node: Node::WallTime(WallTimeState {
                wall,
                running: AtomicBool::new(false),
                clock: Mutex::new(WallTimeClock {
                    accumulated: Duration::ZERO,
                    started_at: None,
                }),
            }),
        })
    }

    /// Complete after either `histories` committed histories or `wall` of
    /// running time, whichever comes first.
    pub fn mixed(histories: u64, wall: Duration) -> Result<Self, CriterionError> {
        Ok(Self::history_count(histories)? | Self::wall_time(wall)?)
    }

    /// Enters the running state; commits start counting and the wall-time
    /// reference point resets. Previously accumulated time is kept.
    pub fn start(&self) {
        self.node.start();
    }

    /// Leaves the running state; further commits are ignored and wall time
    /// stops accumulating.
    pub fn stop(&self) {
        self.node.stop();
    }

    /// Counts one committed history. Ignored unless running. Thread-safe.
    pub fn commit_history_contribution(&self) {
        self.node.commit();
    }

    /// Returns true once the criterion is satisfied.
    ///
    /// Before the first `start()` this reports not complete. Checking also
    /// acknowledges commits for
    /// [`has_uncommitted_history_contribution`](Self::has_uncommitted_history_contribution).
    pub fn is_simulation_complete(&self) -> bool {
        self.node.is_complete()
    }

    /// Returns true if progress has been made since the last completion
    /// check (or, for a running wall-time leaf, while time still advances).
    pub fn has_uncommitted_history_contribution(&self) -> bool {
        self.node.has_uncommitted()
    }

    /// Sums committed counts and elapsed time across ranks onto the root.
    /// Non-root ranks are reset. Collective and blocking.
    pub fn reduce_data(
        &self,
        comm: &dyn Communicator,
        root: usize,
    ) -> Result<(), CommunicatorError> {
        if comm.size() == 1 {
            return if root == 0 {
                Ok(())
            } else {
                Err(CommunicatorError::InvalidRoot { root, size: 1 })
            };
        }

        let mut f64_buffer = Vec::new();
        let mut u64_buffer = Vec::new();
        self.node.extend_flat(&mut f64_buffer, &mut u64_buffer);

        comm.reduce_sum_f64(&mut f64_buffer, root)?;
        comm.reduce_sum_u64(&mut u64_buffer, root)?;

        self.node.absorb_flat(&f64_buffer, &u64_buffer);
        Ok(())
    }

    /// Writes a human-readable progress report. No side effects.
    pub fn print_summary(&self, w: &mut dyn Write) -> io::Result<()> {
        self.node.write_summary(w, 0)
    }

    /// Logs the progress report.
    pub fn log_summary(&self) {
        let mut buffer = Vec::new();
        if self.print_summary(&mut buffer).is_ok() {
            for line in String::from_utf8_lossy(&buffer).lines() {
                info!("{}", line.trim_start());
            }
        }
    }
}

impl BitOr for CompletionCriterion {
    type Output = CompletionCriterion;

    fn bitor(self, rhs: CompletionCriterion) -> CompletionCriterion {
        CompletionCriterion {
            node: Node::Or(Box::new(self.node), Box::new(rhs.node)),
        }
    }
}

impl BitAnd for CompletionCriterion {
    type Output = CompletionCriterion;

    fn bitand(self, rhs: CompletionCriterion) -> CompletionCriterion {
        CompletionCriterion {
            node: Node::And(Box::new(self.node), Box::new(rhs.node)),
        }
    }
}
