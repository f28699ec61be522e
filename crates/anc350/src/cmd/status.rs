use crate::cmd::{axis_index, connect, StatusArgs};
use crate::exit::{controller_error, CliResult, SUCCESS};
use crate::output::{print_statuses, OutputFormat};

pub fn run(args: StatusArgs, format: OutputFormat) -> CliResult<i32> {
    let controller = connect(&args.conn)?;

    let statuses = match args.axis {
        Some(axis) => {
            let status = controller
                .update_axis(axis_index(axis)?)
                .map_err(|err| controller_error("status failed", err))?;
            vec![status]
        }
        // connecting already ran a full update of every axis
        None => controller.report(),
    };

    print_statuses(&statuses, format);
    Ok(SUCCESS)
}
