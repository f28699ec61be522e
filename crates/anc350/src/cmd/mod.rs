use std::path::PathBuf;
use std::time::Duration;

use anc350_controller::{Controller, ControllerConfig};
use anc350_telegram::address::parse_address;
use anc350_telegram::{Parameter, Scope};
use anc350_transport::ControllerStream;
use clap::{Args, Subcommand};

use crate::exit::{controller_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod motion;
pub mod params;
pub mod poll;
pub mod register;
pub mod simulate;
pub mod status;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Read a parameter.
    Get(GetArgs),
    /// Write a parameter.
    Set(SetArgs),
    /// Read and print axis status.
    Status(StatusArgs),
    /// Move an axis to a target position.
    Move(MoveArgs),
    /// Run an axis until the reference mark is found.
    Home(HomeArgs),
    /// Run an axis continuously in the direction of the velocity.
    Jog(JogArgs),
    /// Stop an axis.
    Stop(StopArgs),
    /// Run the status poller and print published statuses.
    Poll(PollArgs),
    /// List the controller's parameter addresses.
    Params(ParamsArgs),
    /// Serve a simulated controller.
    Simulate(SimulateArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Get(args) => register::get(args, format),
        Command::Set(args) => register::set(args, format),
        Command::Status(args) => status::run(args, format),
        Command::Move(args) => motion::move_to(args, format),
        Command::Home(args) => motion::home(args, format),
        Command::Jog(args) => motion::jog(args, format),
        Command::Stop(args) => motion::stop(args, format),
        Command::Poll(args) => poll::run(args, format),
        Command::Params(args) => params::run(args, format),
        Command::Simulate(args) => simulate::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// How to reach the controller.
#[derive(Args, Debug)]
pub struct ConnectArgs {
    /// Controller address (host:port).
    #[arg(env = "ANC350_ADDR")]
    pub addr: String,
    /// JSON file with controller settings.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
    /// Number of axes in use (1-7).
    #[arg(long)]
    pub axes: Option<usize>,
    /// Per-read reply timeout (e.g. 100ms, 1s).
    #[arg(long)]
    pub timeout: Option<String>,
    /// TCP connect timeout (e.g. 5s).
    #[arg(long)]
    pub connect_timeout: Option<String>,
}

#[derive(Args, Debug)]
pub struct GetArgs {
    #[command(flatten)]
    pub conn: ConnectArgs,
    /// Parameter name (counter, ID_ANC_COUNTER, amplitude) or address (0x0407).
    pub param: String,
    /// Axis number, starting at 1.
    #[arg(long, short = 'a', conflicts_with = "index")]
    pub axis: Option<usize>,
    /// Raw telegram index, for trigger and controller parameters.
    #[arg(long, short = 'i')]
    pub index: Option<i32>,
}

#[derive(Args, Debug)]
pub struct SetArgs {
    #[command(flatten)]
    pub conn: ConnectArgs,
    /// Parameter name or address.
    pub param: String,
    /// Value to write. Raw device value unless --physical is given.
    #[arg(allow_hyphen_values = true)]
    pub value: String,
    /// Interpret the value in the parameter's physical unit.
    #[arg(long)]
    pub physical: bool,
    /// Axis number, starting at 1.
    #[arg(long, short = 'a', conflicts_with = "index")]
    pub axis: Option<usize>,
    /// Raw telegram index, for trigger and controller parameters.
    #[arg(long, short = 'i')]
    pub index: Option<i32>,
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    #[command(flatten)]
    pub conn: ConnectArgs,
    /// Only this axis (starting at 1). Default: every axis.
    #[arg(long, short = 'a')]
    pub axis: Option<usize>,
}

/// Axis selection and completion wait shared by the motion commands.
#[derive(Args, Debug)]
pub struct MotionArgs {
    #[command(flatten)]
    pub conn: ConnectArgs,
    /// Axis number, starting at 1.
    #[arg(long, short = 'a', default_value_t = 1)]
    pub axis: usize,
}

#[derive(Args, Debug)]
pub struct MoveArgs {
    #[command(flatten)]
    pub motion: MotionArgs,
    /// Target in device units (sensor unit / 1000).
    #[arg(allow_hyphen_values = true)]
    pub target: i32,
    /// Move by the target instead of to it.
    #[arg(long)]
    pub relative: bool,
    /// Wait until the axis reports done.
    #[arg(long)]
    pub wait: bool,
    /// Maximum time to wait when --wait is set (e.g. 30s).
    #[arg(long, default_value = "30s")]
    pub wait_timeout: String,
}

#[derive(Args, Debug)]
pub struct HomeArgs {
    #[command(flatten)]
    pub motion: MotionArgs,
    /// Search in the negative direction.
    #[arg(long)]
    pub backward: bool,
    /// Wait until the reference mark is found.
    #[arg(long)]
    pub wait: bool,
    /// Maximum time to wait when --wait is set (e.g. 60s).
    #[arg(long, default_value = "60s")]
    pub wait_timeout: String,
}

#[derive(Args, Debug)]
pub struct JogArgs {
    #[command(flatten)]
    pub motion: MotionArgs,
    /// Velocity; only the sign is used.
    #[arg(allow_hyphen_values = true)]
    pub velocity: f64,
}

#[derive(Args, Debug)]
pub struct StopArgs {
    #[command(flatten)]
    pub motion: MotionArgs,
}

#[derive(Args, Debug)]
pub struct PollArgs {
    #[command(flatten)]
    pub conn: ConnectArgs,
    /// Poll period while an axis is moving (e.g. 500ms).
    #[arg(long)]
    pub moving_period: Option<String>,
    /// Poll period for axes at rest (e.g. 1s).
    #[arg(long)]
    pub idle_period: Option<String>,
    /// Exit after printing N statuses.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct ParamsArgs {
    /// Only parameters whose name contains this text.
    #[arg(long)]
    pub filter: Option<String>,
}

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Address to listen on.
    #[arg(default_value = "127.0.0.1:2101")]
    pub bind: String,
    /// Number of simulated axes.
    #[arg(long, default_value_t = 3)]
    pub axes: usize,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Build the controller configuration from `--config` and the override flags.
pub fn load_config(args: &ConnectArgs) -> CliResult<ControllerConfig> {
    let mut config = match &args.config {
        Some(path) => ControllerConfig::from_json_file(path)
            .map_err(|err| controller_error("config load failed", err))?,
        None => ControllerConfig::default(),
    };
    if let Some(axes) = args.axes {
        config.axes = axes;
    }
    if let Some(timeout) = &args.timeout {
        config.engine.read_timeout = parse_duration(timeout)?;
    }
    if let Some(timeout) = &args.connect_timeout {
        config.connect_timeout = parse_duration(timeout)?;
    }
    Ok(config)
}

pub fn connect(args: &ConnectArgs) -> CliResult<Controller<ControllerStream>> {
    let config = load_config(args)?;
    connect_with(args, config)
}

pub fn connect_with(
    args: &ConnectArgs,
    config: ControllerConfig,
) -> CliResult<Controller<ControllerStream>> {
    Controller::connect(&args.addr, config).map_err(|err| controller_error("connect failed", err))
}

/// Convert a 1-based axis number to the wire index.
pub fn axis_index(axis: usize) -> CliResult<usize> {
    axis.checked_sub(1)
        .ok_or_else(|| CliError::new(USAGE, "axis numbers start at 1"))
}

/// Where a parameter access goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Through the axis session (0-based axis).
    Axis(usize),
    /// Straight to the telegram index, controller lock only.
    Index(i32),
}

impl Target {
    pub fn wire_index(self) -> i32 {
        match self {
            Target::Axis(axis) => axis as i32,
            Target::Index(index) => index,
        }
    }
}

/// Resolve a parameter and the index it is addressed with.
pub fn resolve(
    param: &str,
    axis: Option<usize>,
    index: Option<i32>,
) -> CliResult<(i32, Option<&'static Parameter>, Target)> {
    let address = parse_address(param)
        .ok_or_else(|| CliError::new(USAGE, format!("unknown parameter: {param}")))?;
    let info = Parameter::lookup(address);

    let target = match (axis, index) {
        (_, Some(index)) => Target::Index(index),
        (Some(axis), None) => Target::Axis(axis_index(axis)?),
        (None, None) => match info.map(|p| p.scope) {
            Some(Scope::Controller) => Target::Index(0),
            Some(Scope::Trigger) => {
                return Err(CliError::new(
                    USAGE,
                    format!("{param} is a trigger parameter; pass --index"),
                ))
            }
            Some(Scope::Axis) | None => Target::Axis(0),
        },
    };
    Ok((address, info, target))
}

/// Parse a duration such as `500ms`, `2s` or a bare number of seconds.
pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let value = input.trim();
    if value.is_empty() {
        return Err(CliError::new(USAGE, "duration cannot be empty"));
    }

    let duration = if let Some(ms) = value.strip_suffix("ms") {
        let millis = ms
            .trim()
            .parse::<u64>()
            .map_err(|_| CliError::new(USAGE, format!("invalid duration: {input}")))?;
        Duration::from_millis(millis)
    } else if let Some(s) = value.strip_suffix('s') {
        let secs = s
            .trim()
            .parse::<u64>()
            .map_err(|_| CliError::new(USAGE, format!("invalid duration: {input}")))?;
        Duration::from_secs(secs)
    } else {
        let secs = value
            .parse::<u64>()
            .map_err(|_| CliError::new(USAGE, format!("invalid duration: {input}")))?;
        Duration::from_secs(secs)
    };

    if duration.is_zero() {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(duration)
}
