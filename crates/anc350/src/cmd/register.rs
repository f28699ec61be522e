use anc350_controller::Controller;
use anc350_telegram::Parameter;
use anc350_transport::ControllerStream;

use crate::cmd::{connect, resolve, GetArgs, SetArgs, Target};
use crate::exit::{controller_error, CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{print_value, OutputFormat, ValueOutput};

pub fn get(args: GetArgs, format: OutputFormat) -> CliResult<i32> {
    let (address, info, target) = resolve(&args.param, args.axis, args.index)?;
    let controller = connect(&args.conn)?;

    let raw = match target {
        Target::Axis(axis) => controller.get(axis, address),
        Target::Index(index) => controller.get_indexed(address, index),
    }
    .map_err(|err| controller_error("get failed", err))?;

    print_value(&value_output(address, info, target, raw), format);
    Ok(SUCCESS)
}

pub fn set(args: SetArgs, format: OutputFormat) -> CliResult<i32> {
    let (address, info, target) = resolve(&args.param, args.axis, args.index)?;
    let raw = parse_value(&args.value, args.physical, info)?;
    let controller = connect(&args.conn)?;

    write(&controller, address, target, raw)
        .map_err(|err| controller_error("set failed", err))?;

    print_value(&value_output(address, info, target, raw), format);
    Ok(SUCCESS)
}

fn write(
    controller: &Controller<ControllerStream>,
    address: i32,
    target: Target,
    raw: i32,
) -> anc350_controller::Result<()> {
    match target {
        Target::Axis(axis) => controller.set(axis, address, raw),
        Target::Index(index) => controller.set_indexed(address, index, raw),
    }
}

fn parse_value(input: &str, physical: bool, info: Option<&Parameter>) -> CliResult<i32> {
    let invalid = || CliError::new(DATA_INVALID, format!("invalid value: {input}"));
    if physical {
        let value = input.trim().parse::<f64>().map_err(|_| invalid())?;
        if !value.is_finite() {
            return Err(invalid());
        }
        return Ok(match info {
            Some(info) => info.to_raw(value),
            None => value.round() as i32,
        });
    }
    let input = input.trim();
    match input.strip_prefix("0x").or_else(|| input.strip_prefix("0X")) {
        Some(hex) => i32::from_str_radix(hex, 16).map_err(|_| invalid()),
        None => input.parse::<i32>().map_err(|_| invalid()),
    }
}

fn value_output(
    address: i32,
    info: Option<&'static Parameter>,
    target: Target,
    raw: i32,
) -> ValueOutput<'static> {
    ValueOutput {
        address,
        name: info.map(|p| p.name),
        index: target.wire_index(),
        raw,
        value: info.map_or(f64::from(raw), |p| p.to_physical(raw)),
        unit: info.map_or("", |p| p.unit),
    }
}

#[cfg(test)]
mod tests {
    use anc350_telegram::address;

    use super::*;

    #[test]
    fn raw_values_accept_hex_and_negative() {
        assert_eq!(parse_value("0x1000", false, None).unwrap(), 0x1000);
        assert_eq!(parse_value("-2500", false, None).unwrap(), -2500);
        assert_eq!(parse_value("1.5", false, None).unwrap_err().code, DATA_INVALID);
    }

    #[test]
    fn physical_values_use_the_parameter_scale() {
        let target = Parameter::lookup(address::TARGET);
        assert_eq!(parse_value("1.5", true, target).unwrap(), 1500);
        assert_eq!(parse_value("-0.0004", true, target).unwrap(), 0);
        assert_eq!(parse_value("nan", true, target).unwrap_err().code, DATA_INVALID);
    }

    #[test]
    fn output_carries_scaled_value() {
        let info = Parameter::lookup(address::COUNTER);
        let out = value_output(address::COUNTER, info, Target::Axis(1), 2500);
        assert_eq!(out.index, 1);
        assert_eq!(out.value, 2.5);
        assert_eq!(out.name, Some("ID_ANC_COUNTER"));
    }
}
