use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use anc350_controller::{AxisStatus, Controller, Poller};

use crate::cmd::{connect_with, load_config, parse_duration, PollArgs};
use crate::exit::{controller_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_statuses, OutputFormat};

pub fn run(args: PollArgs, format: OutputFormat) -> CliResult<i32> {
    let mut config = load_config(&args.conn)?;
    if let Some(period) = &args.moving_period {
        config.poller.moving_period = parse_duration(period)?;
    }
    if let Some(period) = &args.idle_period {
        config.poller.idle_period = parse_duration(period)?;
    }
    let controller: Arc<Controller<_>> = Arc::new(connect_with(&args.conn, config)?);

    let (tx, rx) = mpsc::channel::<AxisStatus>();
    controller.subscribe(move |status: &AxisStatus| {
        let _ = tx.send(status.clone());
    });

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let poller =
        Poller::spawn(controller.clone()).map_err(|err| controller_error("poller failed", err))?;

    let mut printed = 0usize;
    while running.load(Ordering::SeqCst) {
        let status = match rx.recv_timeout(Duration::from_millis(200)) {
            Ok(status) => status,
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        };

        print_statuses(&[status], format);
        printed = printed.saturating_add(1);

        if let Some(count) = args.count {
            if printed >= count {
                break;
            }
        }
    }

    poller.stop();
    Ok(SUCCESS)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
