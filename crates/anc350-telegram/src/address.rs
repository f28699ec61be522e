//! ANC350 parameter address table.
//!
//! These are the controller firmware's object ids, reproduced verbatim. Most
//! objects are selected per axis or per trigger through the telegram `index`;
//! controller-global objects only accept index 0.

use std::fmt;

/// Maximum index for selecting an axis.
pub const MAX_AXIS_INDEX: i32 = 0x06;
/// Maximum index for selecting a trigger.
pub const MAX_TRIGGER_INDEX: i32 = 0x05;

pub const ASYNC_EN: i32 = 0x0145;
pub const STATUS: i32 = 0x0404;
pub const TEMP_STATUS: i32 = 0x0560;
pub const COUNTER: i32 = 0x0415;
pub const ROTCOUNT: i32 = 0x0516;
pub const REFCOUNTER: i32 = 0x0407;
pub const REFROTCOUNT: i32 = 0x0517;
pub const LEFT_LIMIT: i32 = 0x0441;
pub const RIGHT_LIMIT: i32 = 0x0442;
pub const POS_RESET: i32 = 0x044F;
pub const TARGET: i32 = 0x0408;
pub const TGTROTCNT: i32 = 0x0518;
pub const RUN_TARGET: i32 = 0x040D;
pub const RUN_RELATIVE: i32 = 0x0418;
pub const MOVE_REF: i32 = 0x0444;
pub const SGL_FWD: i32 = 0x0410;
pub const SGL_BKWD: i32 = 0x0411;
pub const CONT_FWD: i32 = 0x040E;
pub const CONT_BKWD: i32 = 0x040F;
pub const AMPL: i32 = 0x0400;
pub const REGSPD_SETP: i32 = 0x0542;
pub const REGSPD_SETPS: i32 = 0x0549;
pub const ACT_AMPL: i32 = 0x0514;
pub const FAST_FREQ: i32 = 0x0401;
pub const RELAIS: i32 = 0x0447;
pub const CAP_START: i32 = 0x051E;
pub const CAP_VALUE: i32 = 0x0569;
pub const SENSOR_VOLT: i32 = 0x0526;
pub const ACTORPS_SAVE: i32 = 0x050C;
pub const TRG_LOW: i32 = 0x0530;
pub const TRG_HIGH: i32 = 0x0531;
pub const TRG_POL: i32 = 0x0532;
pub const TRG_AXIS: i32 = 0x0533;
pub const TRG_EPS: i32 = 0x0534;
pub const TRG_UNIT: i32 = 0x0535;
pub const BW_LIMIT: i32 = 0x0568;
pub const DCIN_EN: i32 = 0x0561;
pub const INT_EN: i32 = 0x0563;
pub const ACIN_EN: i32 = 0x0562;
pub const DIST_SLOW: i32 = 0x0554;
pub const SPD_GAIN: i32 = 0x054B;
pub const SPD_ENABLE: i32 = 0x054C;
pub const LOOP_OFFS: i32 = 0x054D;
pub const LOOP_GAIN: i32 = 0x054E;
pub const MAX_AMP: i32 = 0x054F;
pub const SEN_DIR: i32 = 0x0551;
pub const PERIOD: i32 = 0x0553;
pub const REGSPD_AVG: i32 = 0x0544;
pub const REGPOS_AVG: i32 = 0x0545;
pub const REGSPD_KI: i32 = 0x053F;
pub const REGPOS_KP: i32 = 0x0540;
pub const SLOW_SPEED: i32 = 0x053D;
pub const ACTOR_DIR: i32 = 0x053A;
pub const SCALE_MODE: i32 = 0x0539;
pub const RES_ANGLEMIN: i32 = 0x0559;
pub const RES_ANGLEMAX: i32 = 0x055A;
pub const SENSOR_GAIN: i32 = 0x0527;
pub const MAX_FREQU: i32 = 0x0515;
pub const ACT_ROTARY: i32 = 0x0452;
pub const SGLCIRCLE: i32 = 0x0519;
pub const STOP_EN: i32 = 0x0450;
pub const UNIT: i32 = 0x041D;
pub const SEN_AVG: i32 = 0x0558;
pub const REGSPD_SELSP: i32 = 0x054A;
pub const DIST_STOP: i32 = 0x0555;
pub const TARGET_TIME: i32 = 0x044B;
pub const REF_OFFS: i32 = 0x053B;
pub const SENSOR_RES: i32 = 0x0567;

/// Data value for [`ACTORPS_SAVE`] that stores all parameters in flash.
pub const ACTORPS_SAVE_STORE: i32 = 1234;
/// Data value for [`ACTORPS_SAVE`] that clears all parameters from flash.
pub const ACTORPS_SAVE_CLEAR: i32 = 4321;

/// Bit masks of the [`STATUS`] word.
pub mod status {
    pub const RUNNING: i32 = 0x0001;
    pub const HUMP: i32 = 0x0002;
    pub const SENS_ERR: i32 = 0x0100;
    pub const DISCONN: i32 = 0x0400;
    pub const REF_VALID: i32 = 0x0800;
    pub const ENABLE: i32 = 0x1000;
}

/// What the `index` field selects for an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Axis,
    Trigger,
    /// Only index 0 is valid.
    Controller,
}

/// How an object may be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    ReadOnly,
    ReadWrite,
    /// Writing starts an action; the written value is a trigger.
    Command,
    /// Delivered by Tell telegrams only.
    EventOnly,
}

impl Access {
    pub fn name(self) -> &'static str {
        match self {
            Self::ReadOnly => "ro",
            Self::ReadWrite => "rw",
            Self::Command => "cmd",
            Self::EventOnly => "event",
        }
    }
}

/// One controller object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Parameter {
    pub address: i32,
    /// Firmware identifier, e.g. `ID_ANC_COUNTER`.
    pub name: &'static str,
    /// Name used in actor parameter (`.aps`) files.
    pub aps_name: Option<&'static str>,
    pub scope: Scope,
    pub access: Access,
    /// Fixed-point factor between the wire value and `unit`.
    pub scale: i32,
    /// Physical unit; "unit" means the axis sensor unit ([`UNIT`]).
    pub unit: &'static str,
}

#[allow(clippy::too_many_arguments)]
const fn param(
    address: i32,
    name: &'static str,
    aps_name: Option<&'static str>,
    scope: Scope,
    access: Access,
    scale: i32,
    unit: &'static str,
) -> Parameter {
    Parameter {
        address,
        name,
        aps_name,
        scope,
        access,
        scale,
        unit,
    }
}

use Access::{Command, EventOnly, ReadOnly, ReadWrite};
use Scope::{Axis, Controller, Trigger};

/// Every object the controller understands.
pub static PARAMETERS: &[Parameter] = &[
    param(ASYNC_EN, "ID_ASYNC_EN", None, Controller, ReadWrite, 1, ""),
    param(STATUS, "ID_ANC_STATUS", None, Axis, ReadOnly, 1, "bits"),
    param(TEMP_STATUS, "ID_ANC_TEMP_STATUS", None, Controller, ReadOnly, 1, ""),
    param(COUNTER, "ID_ANC_COUNTER", None, Axis, ReadOnly, 1000, "unit"),
    param(ROTCOUNT, "ID_ANC_ROTCOUNT", None, Axis, EventOnly, 1, "rotations"),
    param(REFCOUNTER, "ID_ANC_REFCOUNTER", None, Axis, ReadOnly, 1000, "unit"),
    param(REFROTCOUNT, "ID_ANC_REFROTCOUNT", None, Axis, EventOnly, 1, "rotations"),
    param(LEFT_LIMIT, "ID_ANC_LEFT_LIMIT", None, Axis, ReadWrite, 1000, "unit"),
    param(RIGHT_LIMIT, "ID_ANC_RIGHT_LIMIT", None, Axis, ReadWrite, 1000, "unit"),
    param(POS_RESET, "ID_ANC_POS_RESET", None, Axis, Command, 1, ""),
    param(TARGET, "ID_ANC_TARGET", None, Axis, ReadWrite, 1000, "unit"),
    param(TGTROTCNT, "ID_ANC_TGTROTCNT", None, Axis, ReadWrite, 1, "rotations"),
    param(RUN_TARGET, "ID_ANC_RUN_TARGET", None, Axis, Command, 1, ""),
    param(RUN_RELATIVE, "ID_ANC_RUN_RELATIVE", None, Axis, Command, 1, ""),
    param(MOVE_REF, "ID_ANC_MOVE_REF", None, Axis, Command, 1, ""),
    param(SGL_FWD, "ID_ANC_SGL_FWD", None, Axis, Command, 1, ""),
    param(SGL_BKWD, "ID_ANC_SGL_BKWD", None, Axis, Command, 1, ""),
    param(CONT_FWD, "ID_ANC_CONT_FWD", None, Axis, Command, 1, ""),
    param(CONT_BKWD, "ID_ANC_CONT_BKWD", None, Axis, Command, 1, ""),
    param(AMPL, "ID_ANC_AMPL", None, Axis, ReadWrite, 1, "mV"),
    param(REGSPD_SETP, "ID_ANC_REGSPD_SETP", None, Axis, ReadOnly, 1000, "unit/s"),
    param(REGSPD_SETPS, "ID_ANC_REGSPD_SETPS", None, Axis, ReadOnly, 1000, "unit"),
    param(ACT_AMPL, "ID_ANC_ACT_AMPL", None, Axis, ReadWrite, 1, "mV"),
    param(FAST_FREQ, "ID_ANC_FAST_FREQ", None, Axis, ReadWrite, 1, "Hz"),
    param(RELAIS, "ID_ANC_RELAIS", None, Axis, ReadWrite, 1, ""),
    param(CAP_START, "ID_ANC_CAP_START", None, Axis, Command, 1, ""),
    param(CAP_VALUE, "ID_ANC_CAP_VALUE", None, Axis, ReadOnly, 1, ""),
    param(SENSOR_VOLT, "ID_ANC_SENSOR_VOLT", None, Controller, ReadWrite, 1, "mV"),
    param(ACTORPS_SAVE, "ID_ANC_ACTORPS_SAVE", None, Controller, Command, 1, ""),
    param(TRG_LOW, "ID_ANC_TRG_LOW", None, Trigger, ReadWrite, 1000, "trigger unit"),
    param(TRG_HIGH, "ID_ANC_TRG_HIGH", None, Trigger, ReadWrite, 1000, "trigger unit"),
    param(TRG_POL, "ID_ANC_TRG_POL", None, Trigger, ReadWrite, 1, ""),
    param(TRG_AXIS, "ID_ANC_TRG_AXIS", None, Trigger, ReadWrite, 1, ""),
    param(TRG_EPS, "ID_ANC_TRG_EPS", None, Trigger, ReadWrite, 1000, "trigger unit"),
    param(TRG_UNIT, "ID_ANC_TRG_UNIT", None, Trigger, ReadOnly, 1, ""),
    param(BW_LIMIT, "ID_ANC_BW_LIMIT", None, Axis, ReadWrite, 1, ""),
    param(DCIN_EN, "ID_ANC_DCIN_EN", None, Axis, ReadWrite, 1, ""),
    param(INT_EN, "ID_ANC_INT_EN", None, Axis, ReadWrite, 1, ""),
    param(ACIN_EN, "ID_ANC_ACIN_EN", None, Axis, ReadWrite, 1, ""),
    param(DIST_SLOW, "ID_ANC_DIST_SLOW", Some("poslooprange"), Axis, ReadWrite, 1000, "unit"),
    param(SPD_GAIN, "ID_ANC_SPD_GAIN", Some("speedgain"), Axis, ReadWrite, 1000, "1/s"),
    param(SPD_ENABLE, "ID_ANC_SPD_ENABLE", Some("adaptsetpctrl"), Axis, ReadWrite, 1, ""),
    param(LOOP_OFFS, "ID_ANC_LOOP_OFFS", Some("actoroffset"), Axis, ReadWrite, 1, "mV"),
    param(LOOP_GAIN, "ID_ANC_LOOP_GAIN", Some("actorgain"), Axis, ReadWrite, 1_000_000, "unit/V"),
    param(MAX_AMP, "ID_ANC_MAX_AMP", Some("maxampl"), Axis, ReadWrite, 1, "mV"),
    param(SEN_DIR, "ID_ANC_SEN_DIR", Some("sensordir"), Axis, ReadWrite, 1, ""),
    param(PERIOD, "ID_ANC_PERIOD", Some("period"), Axis, ReadWrite, 1, "1/unit"),
    param(REGSPD_AVG, "ID_ANC_REGSPD_AVG", Some("amplctrlavg"), Axis, ReadWrite, 1, ""),
    param(REGPOS_AVG, "ID_ANC_REGPOS_AVG", Some("targetctrlavg"), Axis, ReadWrite, 1, ""),
    param(REGSPD_KI, "ID_ANC_REGSPD_KI", Some("amplctrlsensitivity"), Axis, ReadWrite, 1000, ""),
    param(REGPOS_KP, "ID_ANC_REGPOS_KP", Some("targetctrlsensitivity"), Axis, ReadWrite, 1000, ""),
    param(SLOW_SPEED, "ID_ANC_SLOW_SPEED", Some("slowspeed"), Axis, ReadWrite, 1_000_000, "unit/s"),
    param(ACTOR_DIR, "ID_ANC_ACTOR_DIR", Some("actordir"), Axis, ReadWrite, 1, ""),
    param(SCALE_MODE, "ID_ANC_SCALE_MODE", Some("transfertype"), Axis, ReadWrite, 1, ""),
    param(RES_ANGLEMIN, "ID_ANC_RES_ANGLEMIN", Some("positionmin"), Axis, ReadWrite, 1000, "unit"),
    param(RES_ANGLEMAX, "ID_ANC_RES_ANGLEMAX", Some("positionmax"), Axis, ReadWrite, 1000, "unit"),
    param(SENSOR_GAIN, "ID_ANC_SENSOR_GAIN", Some("transfergain"), Axis, ReadWrite, 1000, "unit/V"),
    param(MAX_FREQU, "ID_ANC_MAX_FREQU", Some("maxfrequ"), Axis, ReadWrite, 1, "Hz"),
    param(ACT_ROTARY, "ID_ANC_ACT_ROTARY", Some("rotary"), Axis, ReadWrite, 1, ""),
    param(SGLCIRCLE, "ID_ANC_SGLCIRCLE", Some("singlecircle"), Axis, ReadWrite, 1, ""),
    param(STOP_EN, "ID_ANC_STOP_EN", Some("humpenable"), Axis, ReadWrite, 1, ""),
    param(UNIT, "ID_ANC_UNIT", Some("sensorunit"), Axis, ReadWrite, 1, ""),
    param(SEN_AVG, "ID_ANC_SEN_AVG", Some("sensoravg"), Axis, ReadWrite, 1, ""),
    param(REGSPD_SELSP, "ID_ANC_REGSPD_SELSP", Some("amplctrl"), Axis, ReadWrite, 1, ""),
    param(DIST_STOP, "ID_ANC_DIST_STOP", Some("targetrange"), Axis, ReadWrite, 1000, "unit"),
    param(TARGET_TIME, "ID_ANC_TARGET_TIME", Some("targettime"), Axis, ReadWrite, 1, "ms"),
    param(REF_OFFS, "ID_ANC_REF_OFFS", Some("refoffset"), Axis, ReadWrite, 1000, "unit"),
    param(SENSOR_RES, "ID_ANC_SENSOR_RES", Some("sensorres"), Axis, ReadWrite, 1, ""),
];

impl Parameter {
    /// Find the object with the given address.
    pub fn lookup(address: i32) -> Option<&'static Parameter> {
        PARAMETERS.iter().find(|p| p.address == address)
    }

    /// Find an object by firmware name (`ID_ANC_COUNTER`, `COUNTER`) or
    /// `.aps` name (`humpenable`), ignoring case.
    pub fn by_name(name: &str) -> Option<&'static Parameter> {
        PARAMETERS.iter().find(|p| {
            p.name.eq_ignore_ascii_case(name)
                || short_name(p.name).eq_ignore_ascii_case(name)
                || p.aps_name.is_some_and(|aps| aps.eq_ignore_ascii_case(name))
        })
    }

    /// Convert a wire value to the physical unit.
    pub fn to_physical(&self, raw: i32) -> f64 {
        f64::from(raw) / f64::from(self.scale)
    }

    /// Convert a physical value to the wire value, rounding to nearest.
    pub fn to_raw(&self, physical: f64) -> i32 {
        (physical * f64::from(self.scale)).round() as i32
    }

    /// Name without the `ID_ANC_` / `ID_` prefix.
    pub fn short_name(&self) -> &'static str {
        short_name(self.name)
    }
}

fn short_name(name: &'static str) -> &'static str {
    name.strip_prefix("ID_ANC_")
        .or_else(|| name.strip_prefix("ID_"))
        .unwrap_or(name)
}

/// Resolve an address given by name or as a number (`0x0404`, `1028`).
pub fn parse_address(input: &str) -> Option<i32> {
    let input = input.trim();
    if let Some(hex) = input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
    {
        return i32::from_str_radix(hex, 16).ok();
    }
    if let Ok(value) = input.parse::<i32>() {
        return Some(value);
    }
    Parameter::by_name(input).map(|p| p.address)
}

/// Sensor unit selected with [`UNIT`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorUnit {
    Millimetre,
    Micrometre,
    Nanometre,
    Picometre,
    Degree,
    Millidegree,
    Microdegree,
}

impl SensorUnit {
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0x00 => Some(Self::Millimetre),
            0x01 => Some(Self::Micrometre),
            0x02 => Some(Self::Nanometre),
            0x03 => Some(Self::Picometre),
            0x14 => Some(Self::Degree),
            0x15 => Some(Self::Millidegree),
            0x16 => Some(Self::Microdegree),
            _ => None,
        }
    }

    pub fn code(self) -> i32 {
        match self {
            Self::Millimetre => 0x00,
            Self::Micrometre => 0x01,
            Self::Nanometre => 0x02,
            Self::Picometre => 0x03,
            Self::Degree => 0x14,
            Self::Millidegree => 0x15,
            Self::Microdegree => 0x16,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Millimetre => "mm",
            Self::Micrometre => "um",
            Self::Nanometre => "nm",
            Self::Picometre => "pm",
            Self::Degree => "deg",
            Self::Millidegree => "mdeg",
            Self::Microdegree => "udeg",
        }
    }

    pub fn is_rotary(self) -> bool {
        matches!(self, Self::Degree | Self::Millidegree | Self::Microdegree)
    }
}

impl fmt::Display for SensorUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}
