use std::io::IsTerminal;

use anc350_controller::AxisStatus;
use anc350_telegram::Parameter;
use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// One parameter value read from (or written to) the controller.
#[derive(Debug, Serialize)]
pub struct ValueOutput<'a> {
    pub address: i32,
    pub name: Option<&'a str>,
    pub index: i32,
    pub raw: i32,
    pub value: f64,
    pub unit: &'a str,
}

pub fn print_value(out: &ValueOutput<'_>, format: OutputFormat) {
    match format {
        OutputFormat::Json => println!("{}", to_json(out)),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["ADDRESS", "NAME", "INDEX", "RAW", "VALUE", "UNIT"])
                .add_row(vec![
                    format!("{:#06x}", out.address),
                    out.name.unwrap_or("-").to_string(),
                    out.index.to_string(),
                    out.raw.to_string(),
                    out.value.to_string(),
                    out.unit.to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "{}[{}] ({:#06x}) = {} {} (raw {})",
                out.name.unwrap_or("?"),
                out.index,
                out.address,
                out.value,
                out.unit,
                out.raw
            );
        }
    }
}

pub fn print_statuses(statuses: &[AxisStatus], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            for status in statuses {
                println!("{}", to_json(status));
            }
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec![
                    "AXIS", "POSITION", "UNIT", "DONE", "HOMED", "DIR", "LIMIT", "AMPL V",
                    "COMM",
                ]);
            for status in statuses {
                table.add_row(vec![
                    status.axis.to_string(),
                    status.position_in_unit().to_string(),
                    status.unit.unwrap_or("-").to_string(),
                    yes_no(status.done).to_string(),
                    yes_no(status.homed).to_string(),
                    direction(status).to_string(),
                    limit(status).to_string(),
                    status.amplitude.to_string(),
                    comm(status),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for status in statuses {
                println!(
                    "axis={} position={} {} done={} homed={} dir={} limit={} comm={}",
                    status.axis,
                    status.position_in_unit(),
                    status.unit.unwrap_or("counts"),
                    status.done,
                    status.homed,
                    direction(status),
                    limit(status),
                    comm(status)
                );
            }
        }
    }
}

#[derive(Serialize)]
struct ParameterRow<'a> {
    address: i32,
    name: &'a str,
    aps_name: Option<&'a str>,
    scope: &'a str,
    access: &'a str,
    scale: i32,
    unit: &'a str,
}

pub fn print_parameters(parameters: &[&Parameter], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let rows: Vec<ParameterRow<'_>> = parameters
                .iter()
                .map(|p| ParameterRow {
                    address: p.address,
                    name: p.name,
                    aps_name: p.aps_name,
                    scope: p.scope.name(),
                    access: p.access.name(),
                    scale: p.scale,
                    unit: p.unit,
                })
                .collect();
            println!("{}", serde_json::to_string(&rows).unwrap_or_else(|_| "[]".to_string()));
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["ADDRESS", "NAME", "APS", "SCOPE", "ACCESS", "SCALE", "UNIT"]);
            for p in parameters {
                table.add_row(vec![
                    format!("{:#06x}", p.address),
                    p.name.to_string(),
                    p.aps_name.unwrap_or("").to_string(),
                    p.scope.name().to_string(),
                    p.access.name().to_string(),
                    p.scale.to_string(),
                    p.unit.to_string(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for p in parameters {
                println!(
                    "{:#06x} {} scope={} access={} scale={} unit={}",
                    p.address,
                    p.name,
                    p.scope.name(),
                    p.access.name(),
                    p.scale,
                    p.unit
                );
            }
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

fn direction(status: &AxisStatus) -> &'static str {
    if status.forward {
        "+"
    } else {
        "-"
    }
}

fn limit(status: &AxisStatus) -> &'static str {
    match (status.high_limit, status.low_limit) {
        (true, _) => "high",
        (_, true) => "low",
        _ => "-",
    }
}

fn comm(status: &AxisStatus) -> String {
    if status.comm_error {
        format!("error ({})", status.comm_failures)
    } else if status.comm_failures > 0 {
        format!("retrying ({})", status.comm_failures)
    } else {
        "ok".to_string()
    }
}
