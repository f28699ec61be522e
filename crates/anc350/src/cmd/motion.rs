use std::thread;
use std::time::{Duration, Instant};

use anc350_controller::{AxisStatus, Controller};
use anc350_transport::ControllerStream;
use tracing::debug;

use crate::cmd::{axis_index, connect, parse_duration, HomeArgs, JogArgs, MoveArgs, StopArgs};
use crate::exit::{controller_error, CliError, CliResult, SUCCESS, TIMEOUT};
use crate::output::{print_statuses, OutputFormat};

pub fn move_to(args: MoveArgs, format: OutputFormat) -> CliResult<i32> {
    let axis = axis_index(args.motion.axis)?;
    let wait = args.wait.then(|| parse_duration(&args.wait_timeout)).transpose()?;
    let controller = connect(&args.motion.conn)?;

    controller
        .move_to(axis, args.target, args.relative)
        .map_err(|err| controller_error("move failed", err))?;

    let status = match wait {
        Some(timeout) => wait_until(&controller, axis, timeout, |s| s.done)?,
        None => current(&controller, axis)?,
    };
    print_statuses(&[status], format);
    Ok(SUCCESS)
}

pub fn home(args: HomeArgs, format: OutputFormat) -> CliResult<i32> {
    let axis = axis_index(args.motion.axis)?;
    let wait = args.wait.then(|| parse_duration(&args.wait_timeout)).transpose()?;
    let controller = connect(&args.motion.conn)?;

    controller
        .home(axis, !args.backward)
        .map_err(|err| controller_error("home failed", err))?;

    let status = match wait {
        Some(timeout) => wait_until(&controller, axis, timeout, |s| s.homed && s.done)?,
        None => current(&controller, axis)?,
    };
    print_statuses(&[status], format);
    Ok(SUCCESS)
}

pub fn jog(args: JogArgs, format: OutputFormat) -> CliResult<i32> {
    let axis = axis_index(args.motion.axis)?;
    let controller = connect(&args.motion.conn)?;

    controller
        .jog(axis, args.velocity)
        .map_err(|err| controller_error("jog failed", err))?;

    print_statuses(&[current(&controller, axis)?], format);
    Ok(SUCCESS)
}

pub fn stop(args: StopArgs, format: OutputFormat) -> CliResult<i32> {
    let axis = axis_index(args.motion.axis)?;
    let controller = connect(&args.motion.conn)?;

    controller
        .stop(axis)
        .map_err(|err| controller_error("stop failed", err))?;

    print_statuses(&[current(&controller, axis)?], format);
    Ok(SUCCESS)
}

fn current(controller: &Controller<ControllerStream>, axis: usize) -> CliResult<AxisStatus> {
    controller
        .snapshot(axis)
        .map_err(|err| controller_error("status failed", err))
}

/// Update the axis at the moving poll rate until `done` holds.
fn wait_until(
    controller: &Controller<ControllerStream>,
    axis: usize,
    timeout: Duration,
    done: impl Fn(&AxisStatus) -> bool,
) -> CliResult<AxisStatus> {
    let period = controller.config().poller.moving_period;
    let deadline = Instant::now() + timeout;
    loop {
        let status = controller
            .update_axis(axis)
            .map_err(|err| controller_error("status failed", err))?;
        if done(&status) {
            return Ok(status);
        }
        debug!(axis = status.axis, position = status.position, "waiting for axis");
        if Instant::now() >= deadline {
            return Err(CliError::new(
                TIMEOUT,
                format!("axis {} still moving after {timeout:?}", status.axis),
            ));
        }
        thread::sleep(period);
    }
}
