use anc350_telegram::address::status;
use anc350_telegram::SensorUnit;
use serde::Serialize;

/// Position change (device units) below which the direction estimate holds.
pub const DIRECTION_DEADBAND: i32 = 500;

/// Decoded `ID_ANC_STATUS` word.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusFlags {
    pub running: bool,
    pub hump: bool,
    pub sensor_error: bool,
    pub disconnected: bool,
    pub reference_valid: bool,
    pub enabled: bool,
}

impl StatusFlags {
    pub fn from_bits(bits: i32) -> Self {
        Self {
            running: bits & status::RUNNING != 0,
            hump: bits & status::HUMP != 0,
            sensor_error: bits & status::SENS_ERR != 0,
            disconnected: bits & status::DISCONN != 0,
            reference_valid: bits & status::REF_VALID != 0,
            enabled: bits & status::ENABLE != 0,
        }
    }

    pub fn bits(&self) -> i32 {
        [
            (self.running, status::RUNNING),
            (self.hump, status::HUMP),
            (self.sensor_error, status::SENS_ERR),
            (self.disconnected, status::DISCONN),
            (self.reference_valid, status::REF_VALID),
            (self.enabled, status::ENABLE),
        ]
        .iter()
        .filter(|(set, _)| *set)
        .fold(0, |bits, (_, mask)| bits | mask)
    }
}

/// Snapshot of one axis as published to status sinks.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AxisStatus {
    /// Axis number as shown to operators (1-based).
    pub axis: usize,
    /// Counter minus reference counter, in device units.
    pub position: i32,
    /// Raw `ID_ANC_COUNTER`.
    pub counter: i32,
    /// Last known `ID_ANC_REFCOUNTER`.
    pub reference: i32,
    /// Drive amplitude in volts.
    pub amplitude: f64,
    /// Direction estimate: true while moving towards larger counts.
    pub forward: bool,
    pub done: bool,
    pub homed: bool,
    pub high_limit: bool,
    pub low_limit: bool,
    pub flags: StatusFlags,
    /// The persistent comm-error flag of the controller link.
    pub comm_error: bool,
    /// Consecutive failed transactions on the controller link.
    pub comm_failures: u32,
    /// Controller reports over-temperature.
    pub problem: bool,
    pub has_encoder: bool,
    pub unit: Option<&'static str>,
}

impl AxisStatus {
    pub(crate) fn new(index: usize) -> Self {
        Self {
            axis: index + 1,
            position: 0,
            counter: 0,
            reference: 0,
            amplitude: 0.0,
            forward: false,
            done: true,
            homed: false,
            high_limit: false,
            low_limit: false,
            flags: StatusFlags::default(),
            comm_error: false,
            comm_failures: 0,
            problem: false,
            has_encoder: false,
            unit: None,
        }
    }

    /// 0-based index used on the wire.
    pub fn index(&self) -> usize {
        self.axis - 1
    }

    /// Position in the sensor unit (device units are thousandths of it).
    pub fn position_in_unit(&self) -> f64 {
        f64::from(self.position) / 1000.0
    }
}

/// Mutable per-axis state, guarded by the axis lock.
#[derive(Debug)]
pub(crate) struct AxisState {
    pub status: AxisStatus,
    pub reference_search: bool,
    pub sensor_unit: Option<SensorUnit>,
}

impl AxisState {
    pub fn new(index: usize) -> Self {
        Self {
            status: AxisStatus::new(index),
            reference_search: false,
            sensor_unit: None,
        }
    }

    /// Take a new counter sample. The direction estimate only changes when
    /// the position moved more than the dead-band since the last sample.
    pub fn apply_position(&mut self, counter: i32, reference: i32) {
        let position = counter.wrapping_sub(reference);
        let delta = i64::from(position) - i64::from(self.status.position);
        if delta > i64::from(DIRECTION_DEADBAND) {
            self.status.forward = true;
        } else if delta < -i64::from(DIRECTION_DEADBAND) {
            self.status.forward = false;
        }
        self.status.counter = counter;
        self.status.reference = reference;
        self.status.position = position;
    }

    /// Hump detection is the only limit signal; which side it is on
    /// follows the direction estimate.
    pub fn apply_limits(&mut self, hump: bool) {
        self.status.high_limit = hump && self.status.forward;
        self.status.low_limit = hump && !self.status.forward;
    }

    pub fn set_sensor_unit(&mut self, unit: Option<SensorUnit>) {
        self.sensor_unit = unit;
        self.status.unit = unit.map(SensorUnit::symbol);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_running_and_reference_valid() {
        let flags = StatusFlags::from_bits(0x0801);
        assert!(flags.running);
        assert!(!flags.hump);
        assert!(flags.reference_valid);
        assert!(!flags.enabled);
        assert_eq!(flags.bits(), 0x0801);
    }

    #[test]
    fn decodes_every_bit() {
        let flags = StatusFlags::from_bits(0x1D03);
        assert_eq!(
            flags,
            StatusFlags {
                running: true,
                hump: true,
                sensor_error: true,
                disconnected: true,
                reference_valid: true,
                enabled: true,
            }
        );
    }

    #[test]
    fn position_is_counter_minus_reference() {
        let mut state = AxisState::new(0);
        state.apply_position(125_000, 25_000);
        assert_eq!(state.status.position, 100_000);
        assert_eq!(state.status.counter, 125_000);
        assert_eq!(state.status.reference, 25_000);
        assert_eq!(state.status.position_in_unit(), 100.0);
    }

    #[test]
    fn direction_has_a_deadband() {
        let mut state = AxisState::new(0);
        state.apply_position(1_000, 0);
        assert!(state.status.forward);

        state.apply_position(600, 0);
        assert!(state.status.forward, "-400 is inside the dead-band");

        state.apply_position(99, 0);
        assert!(!state.status.forward);

        state.apply_position(599, 0);
        assert!(!state.status.forward, "+500 is not beyond the dead-band");

        state.apply_position(1_100, 0);
        assert!(state.status.forward);
    }

    #[test]
    fn hump_limit_side_follows_direction() {
        let mut state = AxisState::new(2);
        state.status.forward = true;
        state.apply_limits(true);
        assert!(state.status.high_limit && !state.status.low_limit);

        state.status.forward = false;
        state.apply_limits(true);
        assert!(!state.status.high_limit && state.status.low_limit);

        state.apply_limits(false);
        assert!(!state.status.high_limit && !state.status.low_limit);
        assert_eq!(state.status.axis, 3);
        assert_eq!(state.status.index(), 2);
    }
}
