//! The two-processor machine.
//!
//! Processor 1 runs on the caller's thread. Processor 2, when installed,
//! lives on its own thread and waits for commands; IP2 on processor 1 sends
//! it [`P2Command::Initiate`]. Both processors share one [`Memory`], one
//! Central Control and one I/O subsystem. Processor 2 reports back when it
//! halts or fails.

use crate::control::{lock, CentralControl, ProcessorId};
use crate::cpu::{Memory, Processor, ProcessorError};
use crate::io::SharedIo;
use crate::word::RoundingMode;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Syllables processor 2 executes between checks of its command channel.
const P2_SLICE: u64 = 256;

/// Default syllables between real-time clock ticks.
pub const DEFAULT_TICK_INTERVAL: u64 = 1000;

/// Commands to the processor 2 thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum P2Command {
    /// Restore the context named by the initiate word in cell 8 and run.
    Initiate,
    /// Stop at the next syllable boundary.
    Stop,
    /// Leave the thread.
    Shutdown,
}

/// Reports from the processor 2 thread.
#[derive(Debug, Clone, PartialEq, Eq)]
enum P2Event {
    Halted { cycles: u64 },
    Failed(ProcessorError),
}

#[derive(Debug, Error)]
pub enum MachineError {
    #[error("processor 1: {0}")]
    Processor(#[from] ProcessorError),

    #[error("processor 2: {0}")]
    Processor2(ProcessorError),

    #[error("processor 2 is not installed")]
    NoProcessor2,

    #[error("processor 2 thread is gone")]
    Processor2Lost,

    #[error("failed to start processor 2 thread: {0}")]
    Spawn(#[from] std::io::Error),
}

struct P2Handle {
    commands: Sender<P2Command>,
    events: Receiver<P2Event>,
    thread: Option<thread::JoinHandle<Processor>>,
}

/// Two processors sharing memory, Central Control and I/O.
pub struct Machine {
    memory: Arc<Memory>,
    control: Arc<Mutex<CentralControl>>,
    io: SharedIo,
    p1: Processor,
    p2: Option<P2Handle>,
    /// Syllable count from a processor 2 halt not yet waited for.
    p2_halted: Option<u64>,
    rounding: RoundingMode,
    tick_interval: u64,
    since_tick: u64,
}

impl Machine {
    /// A machine with processor 1 only.
    pub fn new(memory: Memory, io: SharedIo, rounding: RoundingMode) -> Self {
        let memory = Arc::new(memory);
        let control = Arc::new(Mutex::new(CentralControl::new()));
        let p1 = Processor::new(ProcessorId::P1, Arc::clone(&memory), Arc::clone(&control), Arc::clone(&io))
            .with_rounding(rounding);
        Self {
            memory,
            control,
            io,
            p1,
            p2: None,
            p2_halted: None,
            rounding,
            tick_interval: DEFAULT_TICK_INTERVAL,
            since_tick: 0,
        }
    }

    /// Set how many processor 1 syllables make one clock tick.
    pub fn with_tick_interval(mut self, syllables: u64) -> Self {
        self.tick_interval = syllables.max(1);
        self
    }

    /// Install processor 2 on its own thread.
    pub fn install_processor2(&mut self) -> Result<(), MachineError> {
        if self.p2.is_some() {
            return Ok(());
        }
        let (command_tx, command_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let p2 = Processor::new(
            ProcessorId::P2,
            Arc::clone(&self.memory),
            Arc::clone(&self.control),
            Arc::clone(&self.io),
        )
        .with_rounding(self.rounding);

        let thread = thread::Builder::new()
            .name("processor-2".into())
            .spawn(move || processor2_loop(p2, command_rx, event_tx))?;

        self.p1.set_p2_link(command_tx.clone());
        lock(&self.control).p2_present = true;
        self.p2 = Some(P2Handle { commands: command_tx, events: event_rx, thread: Some(thread) });
        info!("processor 2 installed");
        Ok(())
    }

    pub fn memory(&self) -> &Arc<Memory> {
        &self.memory
    }

    pub fn processor1(&self) -> &Processor {
        &self.p1
    }

    pub fn processor1_mut(&mut self) -> &mut Processor {
        &mut self.p1
    }

    /// Snapshot of Central Control.
    pub fn central_control(&self) -> CentralControl {
        lock(&self.control).clone()
    }

    /// Cold-start processor 1 at `address` and set it running.
    pub fn preset(&mut self, address: u16) {
        self.p1.preset(address);
        self.p1.start();
    }

    /// Run processor 1 for at most `budget` syllables, ticking the clock
    /// as it goes. Returns the number executed.
    pub fn run(&mut self, budget: u64) -> Result<u64, MachineError> {
        if budget == 0 {
            return Err(ProcessorError::ZeroBudget.into());
        }
        let mut executed = 0;
        while executed < budget && self.p1.is_running() {
            let slice = (budget - executed).min(self.tick_interval - self.since_tick);
            let done = self.p1.run(slice)?;
            executed += done;
            self.since_tick += done;
            if self.since_tick >= self.tick_interval {
                self.since_tick = 0;
                lock(&self.control).tick();
            }
            self.poll_processor2()?;
        }
        Ok(executed)
    }

    /// Drain processor 2 reports. A processor 2 failure is returned.
    fn poll_processor2(&mut self) -> Result<(), MachineError> {
        let Some(p2) = &self.p2 else {
            return Ok(());
        };
        loop {
            match p2.events.try_recv() {
                Ok(P2Event::Halted { cycles }) => self.p2_halted = Some(cycles),
                Ok(P2Event::Failed(e)) => return Err(MachineError::Processor2(e)),
                Err(TryRecvError::Empty) => return Ok(()),
                Err(TryRecvError::Disconnected) => return Err(MachineError::Processor2Lost),
            }
        }
    }

    /// Block until processor 2 reports that it has halted, or `timeout`
    /// passes. Returns processor 2's total syllable count if it halted.
    pub fn wait_processor2(&mut self, timeout: Duration) -> Result<Option<u64>, MachineError> {
        let p2 = self.p2.as_ref().ok_or(MachineError::NoProcessor2)?;
        if let Some(cycles) = self.p2_halted.take() {
            return Ok(Some(cycles));
        }
        match p2.events.recv_timeout(timeout) {
            Ok(P2Event::Halted { cycles }) => Ok(Some(cycles)),
            Ok(P2Event::Failed(e)) => Err(MachineError::Processor2(e)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(MachineError::Processor2Lost),
        }
    }

    /// Ask processor 2 to stop at its next syllable boundary.
    pub fn stop_processor2(&self) -> Result<(), MachineError> {
        let p2 = self.p2.as_ref().ok_or(MachineError::NoProcessor2)?;
        p2.commands.send(P2Command::Stop).map_err(|_| MachineError::Processor2Lost)
    }

    /// Stop the processor 2 thread and hand back its final state.
    pub fn shutdown(&mut self) -> Result<Option<Processor>, MachineError> {
        let Some(mut p2) = self.p2.take() else {
            return Ok(None);
        };
        // The thread may already have exited; joining reports that.
        let _ = p2.commands.send(P2Command::Shutdown);
        let Some(thread) = p2.thread.take() else {
            return Ok(None);
        };
        let p2 = thread.join().map_err(|_| MachineError::Processor2Lost)?;
        lock(&self.control).p2_present = false;
        Ok(Some(p2))
    }
}

impl Drop for Machine {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!(error = %e, "processor 2 did not shut down cleanly");
        }
    }
}

impl std::fmt::Debug for Machine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Machine")
            .field("p1", &self.p1)
            .field("processor2", &self.p2.is_some())
            .field("tick_interval", &self.tick_interval)
            .finish()
    }
}

/// Body of the processor 2 thread.
fn processor2_loop(mut p2: Processor, commands: Receiver<P2Command>, events: Sender<P2Event>) -> Processor {
    loop {
        match commands.recv() {
            Ok(P2Command::Initiate) => {}
            Ok(P2Command::Stop) => {
                p2.stop();
                continue;
            }
            Ok(P2Command::Shutdown) | Err(_) => return p2,
        }

        if let Err(e) = p2.initiate_p2() {
            warn!(error = %e, "processor 2 initiate failed");
            p2.stop();
            let _ = events.send(P2Event::Failed(e));
            continue;
        }
        debug!(c = p2.regs.c, s = p2.regs.s, "processor 2 running");

        while p2.is_running() {
            if let Err(e) = p2.run(P2_SLICE) {
                let _ = events.send(P2Event::Failed(e));
                break;
            }
            match commands.try_recv() {
                Ok(P2Command::Stop) => p2.stop(),
                Ok(P2Command::Shutdown) | Err(TryRecvError::Disconnected) => return p2,
                Ok(P2Command::Initiate) | Err(TryRecvError::Empty) => {}
            }
        }
        debug!(cycles = p2.cycles, "processor 2 halted");
        let _ = events.send(P2Event::Halted { cycles: p2.cycles });
    }
}
