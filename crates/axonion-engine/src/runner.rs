//! Timer-driven background thread around a shared [`SimulationEngine`]
//!
//! The runner thread is the only writer. Control messages are queued and
//! applied at the start of the next tick; readers take the lock just long
//! enough to copy a snapshot.

use crate::acquisition::Sample;
use crate::alerts::Alert;
use crate::config::RunnerConfig;
use crate::engine::SimulationEngine;
use crate::stimulus::StimulusProtocol;
use axonion_core::{validate_time_step, AxonionError, Result, Time};
use axonion_neuron::{NeuronState, SpikeEvent};
use crossbeam::channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Commands accepted by a running engine
#[derive(Debug, Clone, PartialEq)]
pub enum ControlMessage {
    SetProtocol(StimulusProtocol),
    SetTimeStep(Time),
    Reset,
    Kill,
}

impl ControlMessage {
    /// Reject invalid commands before they reach the queue.
    pub fn validate(&self) -> Result<()> {
        match self {
            ControlMessage::SetProtocol(protocol) => protocol.validate(),
            ControlMessage::SetTimeStep(dt) => validate_time_step(*dt),
            ControlMessage::Reset | ControlMessage::Kill => Ok(()),
        }
    }

    fn apply(self, engine: &mut SimulationEngine) {
        let result = match self {
            ControlMessage::SetProtocol(protocol) => engine.set_protocol(protocol),
            ControlMessage::SetTimeStep(dt) => engine.set_time_step(dt),
            ControlMessage::Reset => {
                engine.reset();
                Ok(())
            }
            ControlMessage::Kill => {
                engine.kill();
                Ok(())
            }
        };
        if let Err(e) = result {
            warn!("Control message rejected: {}", e);
        }
    }
}

fn apply_pending(engine: &mut SimulationEngine, control_rx: &Receiver<ControlMessage>) {
    for message in control_rx.try_iter() {
        message.apply(engine);
    }
}

pub struct EngineRunner {
    engine: Arc<Mutex<SimulationEngine>>,
    control_tx: Sender<ControlMessage>,
    control_rx: Receiver<ControlMessage>,
    running: Arc<AtomicBool>,
    thread_handle: Option<thread::JoinHandle<()>>,
    config: RunnerConfig,
}

impl EngineRunner {
    pub fn new(engine: SimulationEngine) -> Self {
        let config = engine.config().runner;
        let (control_tx, control_rx) = unbounded();
        Self {
            engine: Arc::new(Mutex::new(engine)),
            control_tx,
            control_rx,
            running: Arc::new(AtomicBool::new(false)),
            thread_handle: None,
            config,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Shared handle for callers that need more than the snapshot accessors
    pub fn engine(&self) -> Arc<Mutex<SimulationEngine>> {
        Arc::clone(&self.engine)
    }

    pub fn start(&mut self) -> Result<()> {
        if self.is_running() {
            return Ok(());
        }
        self.running.store(true, Ordering::Release);

        let engine = Arc::clone(&self.engine);
        let running = Arc::clone(&self.running);
        let control_rx = self.control_rx.clone();
        let config = self.config;
        let tick = Duration::from_millis(config.tick_interval_ms);

        let spawned = thread::Builder::new()
            .name("axonion-engine".to_string())
            .spawn(move || {
                info!(
                    "Engine runner started (tick {} ms, speed {}x)",
                    config.tick_interval_ms, config.speed
                );

                while running.load(Ordering::Acquire) {
                    let tick_start = Instant::now();
                    {
                        let mut engine = engine.lock();
                        apply_pending(&mut engine, &control_rx);
                        let steps = config.steps_per_tick(engine.dt());
                        engine.run_steps(steps);
                    }

                    if let Some(remaining) = tick.checked_sub(tick_start.elapsed()) {
                        thread::sleep(remaining);
                    }
                }

                info!("Engine runner stopped");
            });

        match spawned {
            Ok(handle) => {
                self.thread_handle = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::Release);
                Err(AxonionError::IoError(e))
            }
        }
    }

    /// Stop at the next tick boundary and wait for the thread to exit.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                warn!("Engine runner thread panicked");
            }
        }
        apply_pending(&mut self.engine.lock(), &self.control_rx);
    }

    /// Queue a command for the next tick, or apply it now when stopped.
    pub fn send(&self, message: ControlMessage) -> Result<()> {
        message.validate()?;
        if self.is_running() {
            self.control_tx
                .send(message)
                .map_err(|e| AxonionError::Configuration(format!("control queue closed: {}", e)))
        } else {
            let mut engine = self.engine.lock();
            apply_pending(&mut engine, &self.control_rx);
            message.apply(&mut engine);
            Ok(())
        }
    }

    pub fn set_protocol(&self, protocol: StimulusProtocol) -> Result<()> {
        self.send(ControlMessage::SetProtocol(protocol))
    }

    pub fn set_time_step(&self, dt: Time) -> Result<()> {
        self.send(ControlMessage::SetTimeStep(dt))
    }

    pub fn reset(&self) -> Result<()> {
        self.send(ControlMessage::Reset)
    }

    pub fn kill(&self) -> Result<()> {
        self.send(ControlMessage::Kill)
    }

    pub fn current_live_window(&self) -> Vec<Sample> {
        self.engine.lock().live_window()
    }

    pub fn query_history(&self, t0: Time, t1: Time) -> Vec<Sample> {
        self.engine.lock().query_history(t0, t1)
    }

    pub fn drain_spikes(&self) -> Vec<SpikeEvent> {
        self.engine.lock().drain_spikes()
    }

    pub fn drain_alerts(&self) -> Vec<Alert> {
        self.engine.lock().drain_alerts()
    }

    pub fn state(&self) -> NeuronState {
        *self.engine.lock().state()
    }
}

impl Drop for EngineRunner {
    fn drop(&mut self) {
        self.stop();
    }
}
