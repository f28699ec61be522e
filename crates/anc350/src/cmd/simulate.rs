use anc350_controller::Simulator;
use anc350_transport::TcpEndpoint;
use serde::Serialize;

use crate::cmd::SimulateArgs;
use crate::exit::{controller_error, transport_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::OutputFormat;

#[derive(Serialize)]
struct Listening {
    listening: String,
    axes: usize,
}

pub fn run(args: SimulateArgs, format: OutputFormat) -> CliResult<i32> {
    if args.axes == 0 || args.axes > anc350_controller::MAX_AXES {
        return Err(CliError::new(
            USAGE,
            format!("axes must be between 1 and {}", anc350_controller::MAX_AXES),
        ));
    }

    let endpoint =
        TcpEndpoint::bind(&args.bind).map_err(|err| transport_error("bind failed", err))?;
    let sim = Simulator::new(args.axes);

    let out = Listening {
        listening: endpoint.local_addr().to_string(),
        axes: args.axes,
    };
    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
        ),
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("listening on {} ({} axes)", out.listening, out.axes);
        }
    }

    sim.serve(&endpoint)
        .map_err(|err| controller_error("simulator failed", err))?;
    Ok(SUCCESS)
}
