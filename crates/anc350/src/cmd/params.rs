use anc350_telegram::{Parameter, PARAMETERS};

use crate::cmd::ParamsArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::output::{print_parameters, OutputFormat};

pub fn run(args: ParamsArgs, format: OutputFormat) -> CliResult<i32> {
    let selected = select(args.filter.as_deref());
    print_parameters(&selected, format);
    Ok(SUCCESS)
}

fn select(filter: Option<&str>) -> Vec<&'static Parameter> {
    let needle = filter.map(str::to_ascii_lowercase);
    PARAMETERS
        .iter()
        .filter(|p| match &needle {
            Some(needle) => {
                p.name.to_ascii_lowercase().contains(needle.as_str())
                    || p.aps_name
                        .is_some_and(|aps| aps.to_ascii_lowercase().contains(needle.as_str()))
            }
            None => true,
        })
        .collect()
}
