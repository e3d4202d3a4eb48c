//! Background tick loop.
//!
//! [`SimulationRunner::spawn`] moves a [`Simulation`] onto its own thread and
//! ticks it at a fixed wall-clock interval. Hosts talk to it through the
//! returned [`SimulationHandle`]: control commands go in over a channel and
//! are applied between ticks, and the latest [`WorldSnapshot`] comes out
//! through a [`SnapshotBoard`] that readers can poll without blocking the
//! loop.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tracing::{info, warn};

use crate::control::ControlCommand;
use crate::simulation::Simulation;
use crate::snapshot::WorldSnapshot;
use crate::EngineError;

/// Latest published snapshot.
#[derive(Debug)]
pub struct SnapshotBoard {
    latest: RwLock<Arc<WorldSnapshot>>,
}

impl SnapshotBoard {
    pub fn new(initial: WorldSnapshot) -> Self {
        Self {
            latest: RwLock::new(Arc::new(initial)),
        }
    }

    pub fn publish(&self, snapshot: WorldSnapshot) {
        *self.latest.write() = Arc::new(snapshot);
    }

    pub fn latest(&self) -> Arc<WorldSnapshot> {
        Arc::clone(&self.latest.read())
    }
}

/// Commands applied in one late gap before the runner ticks anyway.
pub const MAX_COMMANDS_PER_TICK: usize = 1024;

enum RunnerMessage {
    Control(ControlCommand),
    Stop,
}

pub struct SimulationRunner;

impl SimulationRunner {
    /// Start ticking `sim` every `interval` on a new thread.
    pub fn spawn(sim: Simulation, interval: Duration) -> SimulationHandle {
        let (tx, rx) = mpsc::channel();
        let board = Arc::new(SnapshotBoard::new(sim.snapshot()));
        let ticks = Arc::new(AtomicU64::new(0));

        let thread_board = Arc::clone(&board);
        let thread_ticks = Arc::clone(&ticks);
        let join = thread::spawn(move || {
            let mut sim = sim;
            run_loop(&mut sim, &rx, interval, &thread_board, &thread_ticks);
            sim
        });
        info!(interval_ms = interval.as_secs_f64() * 1e3, "simulation runner started");

        SimulationHandle {
            tx,
            board,
            ticks,
            join: Some(join),
        }
    }
}

fn run_loop(
    sim: &mut Simulation,
    rx: &mpsc::Receiver<RunnerMessage>,
    interval: Duration,
    board: &SnapshotBoard,
    ticks: &AtomicU64,
) {
    let mut deadline = Instant::now() + interval;
    loop {
        let wait = deadline.saturating_duration_since(Instant::now());
        match rx.recv_timeout(wait) {
            Ok(RunnerMessage::Control(command)) => {
                apply_command(sim, command);
                if Instant::now() < deadline {
                    continue;
                }
                // Due: take what is already queued, then tick.
                if !drain_pending(sim, rx) {
                    break;
                }
            }
            Ok(RunnerMessage::Stop) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }

        let diagnostics = sim.tick();
        if !diagnostics.paused {
            ticks.fetch_add(1, Ordering::Release);
        }
        board.publish(sim.snapshot());

        deadline += interval;
        let now = Instant::now();
        if now > deadline {
            warn!(
                tick = sim.tick_count(),
                behind_ms = (now - deadline).as_secs_f64() * 1e3,
                "tick overran its interval"
            );
            deadline = now + interval;
        }
    }
    info!(ticks = sim.tick_count(), "simulation runner stopped");
}

fn apply_command(sim: &mut Simulation, command: ControlCommand) {
    if let Err(err) = sim.control(command) {
        warn!(error = %err, "control command rejected");
    }
}

/// Apply at most [`MAX_COMMANDS_PER_TICK`] queued commands without waiting.
/// Returns `false` once the runner must stop.
fn drain_pending(sim: &mut Simulation, rx: &mpsc::Receiver<RunnerMessage>) -> bool {
    for _ in 0..MAX_COMMANDS_PER_TICK {
        match rx.try_recv() {
            Ok(RunnerMessage::Control(command)) => apply_command(sim, command),
            Ok(RunnerMessage::Stop) | Err(TryRecvError::Disconnected) => return false,
            Err(TryRecvError::Empty) => break,
        }
    }
    true
}

/// Owner-side handle of a running simulation.
pub struct SimulationHandle {
    tx: mpsc::Sender<RunnerMessage>,
    board: Arc<SnapshotBoard>,
    ticks: Arc<AtomicU64>,
    join: Option<JoinHandle<Simulation>>,
}

impl SimulationHandle {
    /// Queue a command for the next gap between ticks.
    pub fn send(&self, command: ControlCommand) -> Result<(), EngineError> {
        self.tx
            .send(RunnerMessage::Control(command))
            .map_err(|_| EngineError::RunnerStopped)
    }

    pub fn latest(&self) -> Arc<WorldSnapshot> {
        self.board.latest()
    }

    pub fn board(&self) -> Arc<SnapshotBoard> {
        Arc::clone(&self.board)
    }

    /// Ticks run by the loop since it started.
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Acquire)
    }

    /// Stop the loop and take the simulation back.
    pub fn stop(mut self) -> Result<Simulation, EngineError> {
        let _ = self.tx.send(RunnerMessage::Stop);
        let join = self.join.take().ok_or(EngineError::RunnerStopped)?;
        join.join().map_err(|_| EngineError::RunnerStopped)
    }
}

impl Drop for SimulationHandle {
    fn drop(&mut self) {
        if let Some(join) = self.join.take() {
            let _ = self.tx.send(RunnerMessage::Stop);
            if join.join().is_err() {
                warn!("simulation thread panicked");
            }
        }
    }
}
