use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anc350_transport::Transport;
use tracing::{debug, info};

use crate::axis::AxisStatus;
use crate::controller::Controller;
use crate::error::Result;

/// Receiver for axis statuses published by updates and motion commands.
pub trait StatusSink: Send + Sync {
    fn publish(&self, status: &AxisStatus);
}

impl<F> StatusSink for F
where
    F: Fn(&AxisStatus) + Send + Sync,
{
    fn publish(&self, status: &AxisStatus) {
        self(status)
    }
}

/// Why [`PollSignal::wait`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    /// A command asked for an immediate update.
    Event,
    Timeout,
    Stop,
}

#[derive(Debug, Default)]
struct SignalState {
    pending: bool,
    stopped: bool,
}

/// Wake-up event between motion commands and the poller.
#[derive(Debug, Default)]
pub struct PollSignal {
    state: Mutex<SignalState>,
    cond: Condvar,
}

impl PollSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wake the poller. Notifications before the next wait coalesce.
    pub fn notify(&self) {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).pending = true;
        self.cond.notify_all();
    }

    pub fn stop(&self) {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).stopped = true;
        self.cond.notify_all();
    }

    fn restart(&self) {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).stopped = false;
    }

    /// Wait up to `timeout` for a notification or stop request.
    pub fn wait(&self, timeout: Duration) -> Wake {
        let guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let (mut state, _) = self
            .cond
            .wait_timeout_while(guard, timeout, |s| !s.pending && !s.stopped)
            .unwrap_or_else(PoisonError::into_inner);
        if state.stopped {
            Wake::Stop
        } else if state.pending {
            state.pending = false;
            Wake::Event
        } else {
            Wake::Timeout
        }
    }
}

/// Decides which reads are due in a poll cycle.
///
/// Moving axes are read every cycle. Axes at rest, and the global status,
/// are read every `ratio` cycles.
#[derive(Debug, Clone)]
pub struct PollSchedule {
    ratio: u32,
    global: u32,
    axes: Vec<u32>,
}

impl PollSchedule {
    pub fn new(ratio: u32, axes: usize) -> Self {
        Self {
            ratio: ratio.max(1),
            global: 0,
            axes: vec![0; axes],
        }
    }

    pub fn global_due(&mut self) -> bool {
        Self::due(&mut self.global, self.ratio, false)
    }

    pub fn axis_due(&mut self, axis: usize, moving: bool) -> bool {
        match self.axes.get_mut(axis) {
            Some(countdown) => Self::due(countdown, self.ratio, moving),
            None => false,
        }
    }

    fn due(countdown: &mut u32, ratio: u32, moving: bool) -> bool {
        if moving || *countdown == 0 {
            *countdown = ratio - 1;
            true
        } else {
            *countdown -= 1;
            false
        }
    }
}

/// Run one poll cycle. `woken` forces every axis to be read.
pub fn poll_cycle<T: Transport>(controller: &Controller<T>, schedule: &mut PollSchedule, woken: bool) {
    if schedule.global_due() {
        if let Err(err) = controller.refresh_global() {
            debug!(error = %err, "global status update failed");
        }
    }
    for axis in 0..controller.axes() {
        let moving = woken || !controller.is_done(axis);
        if schedule.axis_due(axis, moving) {
            if let Err(err) = controller.update_axis(axis) {
                debug!(axis = axis + 1, error = %err, "axis status update failed");
            }
        }
    }
}

/// Background status poller for one controller.
///
/// Stops when [`stop`](Self::stop) is called or the handle is dropped.
pub struct Poller {
    signal: Arc<PollSignal>,
    handle: Option<JoinHandle<()>>,
}

impl Poller {
    pub fn spawn<T: Transport + 'static>(controller: Arc<Controller<T>>) -> Result<Self> {
        let signal = Arc::clone(controller.signal());
        signal.restart();

        let handle = thread::Builder::new()
            .name("anc350-poller".to_string())
            .spawn(move || run(&controller))?;

        Ok(Self {
            signal,
            handle: Some(handle),
        })
    }

    /// Stop the poller and wait for the current cycle to finish.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.signal.stop();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run<T: Transport>(controller: &Controller<T>) {
    let config = controller.config().poller.clone();
    let mut schedule = PollSchedule::new(config.idle_ratio(), controller.axes());
    info!(
        axes = controller.axes(),
        moving_ms = config.moving_period.as_millis() as u64,
        idle_ms = config.idle_period.as_millis() as u64,
        "poller started"
    );

    loop {
        match controller.signal().wait(config.moving_period) {
            Wake::Stop => break,
            wake => poll_cycle(controller, &mut schedule, wake == Wake::Event),
        }
    }
    info!("poller stopped");
}
