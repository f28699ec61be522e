use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use anc350_telegram::address::{self, ACTORPS_SAVE_CLEAR, ACTORPS_SAVE_STORE};
use anc350_telegram::{Ack, Parameter, Scope, SensorUnit, Telegram};
use anc350_transport::{ControllerStream, TcpEndpoint, Transport};
use tracing::{debug, info, warn};

use crate::axis::{AxisState, AxisStatus, StatusFlags};
use crate::config::ControllerConfig;
use crate::correlation::CorrelationAllocator;
use crate::engine::TransactionEngine;
use crate::error::{ControllerError, Result};
use crate::health::CommHealth;
use crate::poller::{PollSignal, StatusSink};

/// One controller on one connection.
///
/// Every transaction holds the link lock from send to matched reply, so
/// requests never interleave on the wire. Axis operations additionally hold
/// that axis's lock for their whole sequence of transactions. Locks are
/// always taken axis first, then link.
///
/// Axes are addressed 0-based here; [`AxisStatus::axis`] carries the
/// 1-based number operators see.
pub struct Controller<T> {
    link: Mutex<T>,
    engine: TransactionEngine,
    health: CommHealth,
    axes: Vec<Mutex<AxisState>>,
    signal: Arc<PollSignal>,
    problem: AtomicBool,
    sinks: RwLock<Vec<Box<dyn StatusSink>>>,
    config: ControllerConfig,
}

impl Controller<ControllerStream> {
    /// Connect over TCP and read the initial state of every axis.
    pub fn connect(addr: &str, config: ControllerConfig) -> Result<Self> {
        config.validate()?;
        let stream = TcpEndpoint::connect(addr, config.connect_timeout)?;
        stream.set_write_timeout(Some(config.engine.write_timeout))?;
        info!(addr, axes = config.axes, "connected to controller");

        let controller = Self::with_link(stream, config)?;
        controller.initialize();
        Ok(controller)
    }
}

impl<T: Transport> Controller<T> {
    /// Wrap an already connected link. No I/O is performed.
    pub fn with_link(link: T, config: ControllerConfig) -> Result<Self> {
        Self::with_allocator(link, config, Arc::new(CorrelationAllocator::new()))
    }

    /// Like [`with_link`](Self::with_link), drawing correlation numbers from
    /// a shared allocator.
    pub fn with_allocator(
        link: T,
        config: ControllerConfig,
        correlation: Arc<CorrelationAllocator>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            link: Mutex::new(link),
            engine: TransactionEngine::with_allocator(config.engine.clone(), correlation),
            health: CommHealth::new(&config.health),
            axes: (0..config.axes)
                .map(|index| Mutex::new(AxisState::new(index)))
                .collect(),
            signal: Arc::new(PollSignal::new()),
            problem: AtomicBool::new(false),
            sinks: RwLock::new(Vec::new()),
            config,
        })
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Number of configured axes.
    pub fn axes(&self) -> usize {
        self.axes.len()
    }

    pub fn health(&self) -> &CommHealth {
        &self.health
    }

    pub fn correlation(&self) -> &Arc<CorrelationAllocator> {
        self.engine.correlation()
    }

    /// Wake signal shared with the poller.
    pub fn signal(&self) -> &Arc<PollSignal> {
        &self.signal
    }

    /// Register a receiver for published axis statuses.
    ///
    /// Sinks run with the axis lock held and must not call back into the
    /// controller.
    pub fn subscribe(&self, sink: impl StatusSink + 'static) {
        self.sinks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(sink));
    }

    fn lock_link(&self) -> MutexGuard<'_, T> {
        self.link.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_axis(&self, axis: usize) -> Result<MutexGuard<'_, AxisState>> {
        let slot = self.axes.get(axis).ok_or(ControllerError::InvalidAxis {
            axis,
            axes: self.axes.len(),
        })?;
        Ok(slot.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// One transaction under the link lock, feeding the health counter.
    fn transact(&self, request: Telegram) -> Result<Ack> {
        let header = *request.header();
        let result = {
            let mut link = self.lock_link();
            self.engine.execute(&mut *link, request)
        };

        match result {
            Ok(ack) => {
                self.health.record_success();
                let reason = ack.reason();
                if reason.is_ok() {
                    Ok(ack)
                } else {
                    debug!(address = header.address, index = header.index, %reason, "request rejected");
                    Err(ControllerError::Reason {
                        address: header.address,
                        index: header.index,
                        reason,
                    })
                }
            }
            Err(err) => {
                if err.is_comm_failure() {
                    let failures = self.health.record_failure();
                    warn!(
                        address = header.address,
                        index = header.index,
                        failures,
                        error = %err,
                        "transaction failed"
                    );
                }
                Err(err)
            }
        }
    }

    fn read(&self, address: i32, index: i32) -> Result<i32> {
        self.transact(Telegram::get(address, index))?
            .value()
            .ok_or(ControllerError::UnexpectedReply { address, index })
    }

    fn write(&self, address: i32, index: i32, value: i32) -> Result<()> {
        self.transact(Telegram::set(address, index, value)).map(|_| ())
    }

    fn check_axis(&self, axis: usize) -> Result<()> {
        if axis < self.axes.len() {
            Ok(())
        } else {
            Err(ControllerError::InvalidAxis {
                axis,
                axes: self.axes.len(),
            })
        }
    }

    /// Read a parameter on behalf of `axis`.
    ///
    /// Controller-wide objects are read at index 0 under the link lock
    /// only; everything else is read at the axis index under the axis lock.
    pub fn get(&self, axis: usize, address: i32) -> Result<i32> {
        if is_controller_scoped(address) {
            self.check_axis(axis)?;
            return self.get_indexed(address, 0);
        }
        let _axis = self.lock_axis(axis)?;
        self.read(address, axis as i32)
    }

    /// Write a parameter on behalf of `axis`, routed like [`get`](Self::get).
    pub fn set(&self, axis: usize, address: i32, value: i32) -> Result<()> {
        if is_controller_scoped(address) {
            self.check_axis(axis)?;
            return self.set_indexed(address, 0, value);
        }
        let _axis = self.lock_axis(axis)?;
        self.write(address, axis as i32, value)
    }

    /// Read with an explicit index, for controller-global (index 0) and
    /// trigger objects. Takes only the link lock.
    pub fn get_indexed(&self, address: i32, index: i32) -> Result<i32> {
        self.read(address, index)
    }

    /// Write with an explicit index. Takes only the link lock.
    pub fn set_indexed(&self, address: i32, index: i32, value: i32) -> Result<()> {
        self.write(address, index, value)
    }

    /// Enable or disable unsolicited Tell telegrams.
    pub fn set_events(&self, enabled: bool) -> Result<()> {
        self.write(address::ASYNC_EN, 0, i32::from(enabled))
    }

    /// Store the current parameters in controller flash.
    pub fn save_parameters(&self) -> Result<()> {
        info!("saving parameters to controller flash");
        self.write(address::ACTORPS_SAVE, 0, ACTORPS_SAVE_STORE)
    }

    /// Erase stored parameters from controller flash.
    pub fn clear_parameters(&self) -> Result<()> {
        info!("clearing parameters from controller flash");
        self.write(address::ACTORPS_SAVE, 0, ACTORPS_SAVE_CLEAR)
    }

    /// Sensor reference voltage in mV.
    pub fn sensor_voltage(&self) -> Result<i32> {
        self.read(address::SENSOR_VOLT, 0)
    }

    pub fn set_sensor_voltage(&self, millivolts: i32) -> Result<()> {
        self.write(address::SENSOR_VOLT, 0, millivolts)
    }

    /// `false` while the controller reports over-temperature.
    pub fn temperature_ok(&self) -> Result<bool> {
        Ok(self.read(address::TEMP_STATUS, 0)? != 0)
    }

    /// Re-read controller-global status into the `problem` flag.
    pub fn refresh_global(&self) -> Result<bool> {
        let ok = self.temperature_ok()?;
        if !self.problem.swap(!ok, Ordering::AcqRel) && !ok {
            warn!("controller reports over-temperature");
        }
        Ok(ok)
    }

    /// Whether the controller has a global problem (over-temperature).
    pub fn problem(&self) -> bool {
        self.problem.load(Ordering::Acquire)
    }

    /// Read the initial state of every axis. Failures are logged; the
    /// poller picks the axes up later.
    pub fn initialize(&self) {
        if let Err(err) = self.refresh_global() {
            warn!(error = %err, "initial global status unavailable");
        }
        for axis in 0..self.axes() {
            if let Err(err) = self.initialize_axis(axis) {
                warn!(axis = axis + 1, error = %err, "initial axis status incomplete");
            }
        }
    }

    fn initialize_axis(&self, axis: usize) -> Result<()> {
        {
            let mut state = self.lock_axis(axis)?;
            let index = axis as i32;
            state.status.has_encoder = true;

            let bits = self.read(address::STATUS, index)?;
            state.status.homed = StatusFlags::from_bits(bits).reference_valid;

            match self.read(address::UNIT, index) {
                Ok(code) => state.set_sensor_unit(SensorUnit::from_code(code)),
                Err(err) => debug!(axis = axis + 1, error = %err, "sensor unit unavailable"),
            }
            self.publish(&mut state);
        }
        self.update_axis(axis).map(|_| ())
    }

    /// Read status, amplitude and position of one axis, publish the result
    /// and return it.
    ///
    /// Every read is attempted even if an earlier one fails; the state is
    /// published either way and the first failure is returned.
    pub fn update_axis(&self, axis: usize) -> Result<AxisStatus> {
        let mut state = self.lock_axis(axis)?;
        let index = axis as i32;
        let mut failure = None;

        let mut hump = false;
        match self.read(address::STATUS, index) {
            Ok(bits) => {
                let flags = StatusFlags::from_bits(bits);
                state.status.flags = flags;
                state.status.done = !flags.running;
                if !flags.reference_valid {
                    state.status.homed = false;
                } else if state.reference_search {
                    state.reference_search = false;
                    debug!(axis = axis + 1, "reference found, stopping");
                    if let Err(err) = self.write(address::SGL_FWD, index, 1) {
                        failure.get_or_insert(err);
                    }
                    state.status.done = true;
                    state.status.homed = true;
                }
                hump = flags.hump;
            }
            Err(err) => {
                failure.get_or_insert(err);
            }
        }

        match self.read(address::AMPL, index) {
            Ok(millivolts) => state.status.amplitude = f64::from(millivolts) / 1000.0,
            Err(err) => {
                failure.get_or_insert(err);
            }
        }

        let reference = match self.read(address::REFCOUNTER, index) {
            Ok(reference) => reference,
            Err(err) => {
                failure.get_or_insert(err);
                state.status.reference
            }
        };

        match self.read(address::COUNTER, index) {
            Ok(counter) => state.apply_position(counter, reference),
            Err(err) => {
                failure.get_or_insert(err);
            }
        }

        state.apply_limits(hump);
        self.publish(&mut state);

        match failure {
            Some(err) => Err(err),
            None => Ok(state.status.clone()),
        }
    }

    /// Cached done flag of an axis; unknown axes count as done.
    pub fn is_done(&self, axis: usize) -> bool {
        self.lock_axis(axis).map_or(true, |state| state.status.done)
    }

    /// Last published status of one axis, without any I/O.
    pub fn snapshot(&self, axis: usize) -> Result<AxisStatus> {
        let mut state = self.lock_axis(axis)?;
        self.refresh_health(&mut state);
        Ok(state.status.clone())
    }

    /// Snapshots of every axis.
    pub fn report(&self) -> Vec<AxisStatus> {
        (0..self.axes())
            .filter_map(|axis| self.snapshot(axis).ok())
            .collect()
    }

    /// Wake the poller for a full update without issuing a command.
    pub fn request_update(&self) {
        self.signal.notify();
    }

    /// Move to `target` device units. Absolute targets are relative to the
    /// reference position; relative targets are added to the counter.
    pub fn move_to(&self, axis: usize, target: i32, relative: bool) -> Result<()> {
        let mut state = self.lock_axis(axis)?;
        let index = axis as i32;
        self.motion_preamble(index)?;

        // Unlike the legacy driver, relative demands are not offset by the
        // reference: RUN_RELATIVE already moves from the current counter.
        let (demand, command) = if relative {
            (target, address::RUN_RELATIVE)
        } else {
            (
                target.wrapping_add(state.status.reference),
                address::RUN_TARGET,
            )
        };
        self.write(address::TARGET, index, demand)?;
        self.write(command, index, 1)?;

        // The legacy driver derived direction from the sign of the current
        // position; comparing against the target gives the actual heading.
        state.status.forward = if relative {
            target >= 0
        } else {
            target >= state.status.position
        };
        debug!(axis = axis + 1, target, relative, demand, "move started");
        self.begin_motion(state);
        Ok(())
    }

    /// Run continuously until the reference mark is found, then stop.
    pub fn home(&self, axis: usize, forwards: bool) -> Result<()> {
        let mut state = self.lock_axis(axis)?;
        let index = axis as i32;
        self.motion_preamble(index)?;

        let command = if forwards {
            address::CONT_FWD
        } else {
            address::CONT_BKWD
        };
        self.write(command, index, 1)?;

        state.status.forward = forwards;
        state.reference_search = true;
        debug!(axis = axis + 1, forwards, "reference search started");
        self.begin_motion(state);
        Ok(())
    }

    /// Run continuously in the direction of `velocity`'s sign.
    pub fn jog(&self, axis: usize, velocity: f64) -> Result<()> {
        let mut state = self.lock_axis(axis)?;
        let index = axis as i32;
        self.motion_preamble(index)?;

        let forwards = velocity > 0.0;
        let command = if forwards {
            address::CONT_FWD
        } else {
            address::CONT_BKWD
        };
        self.write(command, index, 1)?;

        state.status.forward = forwards;
        debug!(axis = axis + 1, forwards, "jog started");
        self.begin_motion(state);
        Ok(())
    }

    /// Halt the axis with a single step in its current direction.
    pub fn stop(&self, axis: usize) -> Result<()> {
        let mut state = self.lock_axis(axis)?;
        let command = if state.status.forward {
            address::SGL_FWD
        } else {
            address::SGL_BKWD
        };
        self.write(command, axis as i32, 1)?;

        state.reference_search = false;
        state.status.done = true;
        debug!(axis = axis + 1, "stopped");
        self.publish(&mut state);
        drop(state);
        self.signal.notify();
        Ok(())
    }

    /// Hump detection on, amplitude control in closed loop.
    fn motion_preamble(&self, index: i32) -> Result<()> {
        self.write(address::STOP_EN, index, 1)?;
        self.write(address::REGSPD_SELSP, index, 1)
    }

    fn begin_motion(&self, mut state: MutexGuard<'_, AxisState>) {
        state.status.done = false;
        self.publish(&mut state);
        drop(state);
        self.signal.notify();
    }

    fn refresh_health(&self, state: &mut AxisState) {
        state.status.comm_error = self.health.flagged();
        state.status.comm_failures = self.health.failures();
        state.status.problem = self.problem();
    }

    fn publish(&self, state: &mut AxisState) {
        self.refresh_health(state);
        let sinks = self.sinks.read().unwrap_or_else(PoisonError::into_inner);
        for sink in sinks.iter() {
            sink.publish(&state.status);
        }
    }
}

impl<T> std::fmt::Debug for Controller<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("axes", &self.axes.len())
            .field("health", &self.health)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn is_controller_scoped(address: i32) -> bool {
    Parameter::lookup(address).is_some_and(|p| p.scope == Scope::Controller)
}

#[cfg(test)]
mod tests {
    use std::thread;

    use anc350_telegram::address::status;
    use anc350_telegram::Reason;

    use super::*;
    use crate::config::HealthConfig;
    use crate::sim::{Fault, SimLink, Simulator};

    fn controller(axes: usize) -> (Simulator, Controller<SimLink>) {
        let sim = Simulator::new(axes);
        let config = ControllerConfig {
            axes,
            ..ControllerConfig::default()
        };
        let controller = Controller::with_link(sim.link(), config).unwrap();
        (sim, controller)
    }

    #[test]
    fn get_and_set_round_trip() {
        let (sim, controller) = controller(3);
        controller.set(2, address::TARGET, -42_000).unwrap();
        assert_eq!(sim.register(address::TARGET, 2), -42_000);
        assert_eq!(controller.get(2, address::TARGET).unwrap(), -42_000);
    }

    #[test]
    fn invalid_axis_is_rejected_without_io() {
        let (sim, controller) = controller(2);
        let err = controller.get(2, address::STATUS).unwrap_err();
        assert!(matches!(err, ControllerError::InvalidAxis { axis: 2, axes: 2 }));
        assert_eq!(sim.requests(), 0);
    }

    #[test]
    fn position_is_counter_minus_reference() {
        let (sim, controller) = controller(1);
        sim.set_register(address::COUNTER, 0, 125_000);
        sim.set_register(address::REFCOUNTER, 0, 25_000);

        let status = controller.update_axis(0).unwrap();
        assert_eq!(status.position, 100_000);
        assert_eq!(status.amplitude, 30.0);
        assert!(status.forward);
    }

    #[test]
    fn running_and_reference_valid_status() {
        let (sim, controller) = controller(1);
        sim.set_register(address::STATUS, 0, 0x0801);

        let status = controller.update_axis(0).unwrap();
        assert!(status.flags.running);
        assert!(!status.flags.hump);
        assert!(status.flags.reference_valid);
        assert!(!status.done);
        assert!(!status.high_limit && !status.low_limit);
    }

    #[test]
    fn comm_failures_count_and_reset() {
        let (sim, controller) = controller(1);
        for _ in 0..3 {
            sim.inject(Fault::Silence);
            let err = controller.get(0, address::STATUS).unwrap_err();
            assert!(matches!(err, ControllerError::Timeout { .. }));
        }
        assert_eq!(controller.health().failures(), 3);
        assert!(!controller.health().flagged());

        controller.get(0, address::STATUS).unwrap();
        assert_eq!(controller.health().failures(), 0);
    }

    #[test]
    fn persistent_comm_error_after_threshold() {
        let (sim, controller) = controller(1);
        for _ in 0..201 {
            sim.inject(Fault::Silence);
            let _ = controller.get(0, address::STATUS);
        }
        assert!(controller.health().flagged());
        assert!(controller.snapshot(0).unwrap().comm_error);

        controller.update_axis(0).unwrap();
        assert!(!controller.health().flagged());
        assert!(!controller.snapshot(0).unwrap().comm_error);
    }

    #[test]
    fn rejections_are_not_comm_failures() {
        let (_sim, controller) = controller(1);
        let err = controller.set(0, address::COUNTER, 1).unwrap_err();
        assert!(matches!(
            err,
            ControllerError::Reason {
                reason: Reason::Ignored,
                ..
            }
        ));
        assert!(!err.is_comm_failure());
        assert_eq!(controller.health().failures(), 0);
    }

    #[test]
    fn stray_reply_to_get_is_sent_again() {
        let (sim, controller) = controller(1);
        sim.inject(Fault::WrongCorrelation);
        let before = sim.requests();

        assert_eq!(controller.get(0, address::AMPL).unwrap(), 30_000);
        assert_eq!(sim.requests() - before, 2);
        assert_eq!(controller.health().failures(), 0);
    }

    #[test]
    fn repeated_stray_replies_surface_as_mismatch() {
        let (sim, controller) = controller(1);
        sim.inject(Fault::WrongCorrelation);
        sim.inject(Fault::WrongCorrelation);

        assert!(matches!(
            controller.get(0, address::AMPL),
            Err(ControllerError::CorrelationMismatch { .. })
        ));
        assert_eq!(controller.health().failures(), 1);
        assert_eq!(controller.get(0, address::AMPL).unwrap(), 30_000);
    }

    #[test]
    fn stray_reply_to_set_is_a_mismatch_without_resend() {
        let (sim, controller) = controller(1);
        sim.inject(Fault::WrongCorrelation);
        let before = sim.requests();

        assert!(matches!(
            controller.set(0, address::TARGET, 5_000),
            Err(ControllerError::CorrelationMismatch { .. })
        ));
        assert_eq!(sim.requests() - before, 1);
        assert_eq!(sim.register(address::TARGET, 0), 5_000);
    }

    #[test]
    fn controller_parameters_ignore_the_axis_index() {
        let (sim, controller) = controller(3);

        assert_eq!(controller.get(1, address::TEMP_STATUS).unwrap(), 1);
        assert_eq!(controller.get(2, address::SENSOR_VOLT).unwrap(), 2_000);

        controller.set(1, address::SENSOR_VOLT, 1_500).unwrap();
        assert_eq!(sim.register(address::SENSOR_VOLT, 0), 1_500);
        assert_eq!(sim.register(address::SENSOR_VOLT, 1), 0);

        assert!(matches!(
            controller.get(5, address::TEMP_STATUS),
            Err(ControllerError::InvalidAxis { axis: 5, axes: 3 })
        ));
    }

    #[test]
    fn absolute_move_is_offset_by_reference() {
        let (sim, controller) = controller(1);
        sim.set_register(address::REFCOUNTER, 0, 25_000);
        sim.set_register(address::COUNTER, 0, 35_000);
        controller.update_axis(0).unwrap();

        controller.move_to(0, 5_000, false).unwrap();
        assert_eq!(sim.register(address::STOP_EN, 0), 1);
        assert_eq!(sim.register(address::REGSPD_SELSP, 0), 1);
        assert_eq!(sim.register(address::TARGET, 0), 30_000);
        assert_eq!(sim.register(address::RUN_TARGET, 0), 1);

        let moving = controller.snapshot(0).unwrap();
        assert!(!moving.done);
        assert!(!moving.forward, "5000 is below the current 10000");

        let settled = controller.update_axis(0).unwrap();
        assert!(settled.done);
        assert_eq!(settled.position, 5_000);
    }

    #[test]
    fn relative_move_is_not_offset() {
        let (sim, controller) = controller(1);
        sim.set_register(address::REFCOUNTER, 0, 25_000);
        sim.set_register(address::COUNTER, 0, 25_000);
        controller.update_axis(0).unwrap();

        controller.move_to(0, -2_000, true).unwrap();
        assert_eq!(sim.register(address::TARGET, 0), -2_000);
        assert_eq!(sim.register(address::RUN_RELATIVE, 0), 1);
        assert!(!controller.snapshot(0).unwrap().forward);

        assert_eq!(controller.update_axis(0).unwrap().position, -2_000);
    }

    #[test]
    fn home_stops_once_reference_is_found() {
        let (sim, controller) = controller(2);
        sim.set_register(address::COUNTER, 1, 7_000);

        controller.home(1, true).unwrap();
        assert_eq!(sim.register(address::CONT_FWD, 1), 1);
        assert!(!controller.snapshot(1).unwrap().done);

        let status = controller.update_axis(1).unwrap();
        assert_eq!(sim.register(address::SGL_FWD, 1), 1);
        assert_eq!(sim.register(address::STATUS, 1) & status::RUNNING, 0);
        assert!(status.done);
        assert!(status.homed);
        assert_eq!(status.reference, 7_000);
        assert_eq!(status.position, 0);

        // Search is disarmed: the next update does not step again.
        sim.set_register(address::SGL_FWD, 1, 0);
        controller.update_axis(1).unwrap();
        assert_eq!(sim.register(address::SGL_FWD, 1), 0);
    }

    #[test]
    fn stop_steps_in_the_last_direction() {
        let (sim, controller) = controller(1);
        controller.jog(0, -3.5).unwrap();
        assert_eq!(sim.register(address::CONT_BKWD, 0), 1);

        controller.stop(0).unwrap();
        assert_eq!(sim.register(address::SGL_BKWD, 0), 1);
        assert_eq!(sim.register(address::SGL_FWD, 0), 0);
        assert!(controller.snapshot(0).unwrap().done);
    }

    #[test]
    fn hump_sets_the_limit_on_the_moving_side() {
        let (sim, controller) = controller(1);
        sim.set_register(address::STATUS, 0, status::ENABLE | status::HUMP);
        sim.set_register(address::COUNTER, 0, 10_000);

        let status = controller.update_axis(0).unwrap();
        assert!(status.forward);
        assert!(status.high_limit);
        assert!(!status.low_limit);
    }

    #[test]
    fn over_temperature_is_published_as_problem() {
        let (sim, controller) = controller(1);
        sim.set_register(address::TEMP_STATUS, 0, 0);

        assert!(!controller.refresh_global().unwrap());
        assert!(controller.problem());
        assert!(controller.update_axis(0).unwrap().problem);

        sim.set_register(address::TEMP_STATUS, 0, 1);
        assert!(controller.refresh_global().unwrap());
        assert!(!controller.problem());
    }

    #[test]
    fn global_operations() {
        let (sim, controller) = controller(1);
        controller.save_parameters().unwrap();
        assert_eq!(sim.register(address::ACTORPS_SAVE, 0), 1234);
        controller.clear_parameters().unwrap();
        assert_eq!(sim.register(address::ACTORPS_SAVE, 0), 4321);
        controller.set_events(true).unwrap();
        assert_eq!(sim.register(address::ASYNC_EN, 0), 1);
        assert_eq!(controller.sensor_voltage().unwrap(), 2_000);
        controller.set_sensor_voltage(2_500).unwrap();
        assert_eq!(controller.sensor_voltage().unwrap(), 2_500);
        assert!(controller.temperature_ok().unwrap());
    }

    #[test]
    fn initialize_reads_every_axis() {
        let (sim, controller) = controller(2);
        sim.set_register(address::STATUS, 1, status::ENABLE | status::REF_VALID);
        sim.set_register(address::UNIT, 1, 0x14);

        let published = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&published);
        controller.subscribe(move |status: &AxisStatus| {
            sink.lock().unwrap().push(status.axis);
        });

        controller.initialize();
        let report = controller.report();
        assert_eq!(report.len(), 2);
        assert!(report.iter().all(|s| s.has_encoder));
        assert!(!report[0].homed);
        assert!(report[1].homed);
        assert_eq!(report[0].unit, Some("nm"));
        assert_eq!(report[1].unit, Some("deg"));

        // Initial publish plus one full update per axis.
        assert_eq!(*published.lock().unwrap(), vec![1, 1, 2, 2]);
    }

    #[test]
    fn concurrent_callers_share_one_link() {
        let sim = Simulator::new(4);
        for index in 0..4 {
            sim.set_register(address::TARGET, index, (index + 1) * 1_000);
        }
        let controller = Arc::new(
            Controller::with_link(
                sim.link().with_chunk(3),
                ControllerConfig {
                    axes: 4,
                    ..ControllerConfig::default()
                },
            )
            .unwrap(),
        );

        let workers: Vec<_> = (0..4)
            .map(|axis| {
                let controller = Arc::clone(&controller);
                thread::spawn(move || {
                    for _ in 0..200 {
                        let value = controller.get(axis, address::TARGET).unwrap();
                        assert_eq!(value, (axis as i32 + 1) * 1_000);
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }
        assert_eq!(controller.health().failures(), 0);
        assert_eq!(sim.requests(), 800);
    }

    #[test]
    fn shared_allocator_spans_controllers() {
        let ids = Arc::new(CorrelationAllocator::with_last(9_999));
        let config = ControllerConfig {
            axes: 1,
            health: HealthConfig::default(),
            ..ControllerConfig::default()
        };
        let a = Controller::with_allocator(Simulator::new(1).link(), config.clone(), Arc::clone(&ids))
            .unwrap();
        let b = Controller::with_allocator(Simulator::new(1).link(), config, Arc::clone(&ids)).unwrap();

        a.get(0, address::STATUS).unwrap();
        b.get(0, address::STATUS).unwrap();
        assert_eq!(ids.last(), 1);
    }
}
