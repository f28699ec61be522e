mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "anc350", version, about = "ANC350 piezo controller CLI")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "warn", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_get_subcommand() {
        let cli = Cli::try_parse_from([
            "anc350",
            "get",
            "192.168.1.2:2101",
            "counter",
            "--axis",
            "2",
            "--timeout",
            "250ms",
        ])
        .expect("get args should parse");

        let Command::Get(args) = cli.command else {
            panic!("expected get");
        };
        assert_eq!(args.param, "counter");
        assert_eq!(args.axis, Some(2));
        assert_eq!(args.conn.timeout.as_deref(), Some("250ms"));
    }

    #[test]
    fn rejects_axis_with_index() {
        let err = Cli::try_parse_from([
            "anc350",
            "get",
            "192.168.1.2:2101",
            "trg_low",
            "--axis",
            "1",
            "--index",
            "4",
        ])
        .expect_err("conflicting args should fail");

        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn accepts_negative_targets() {
        let cli = Cli::try_parse_from([
            "anc350",
            "move",
            "192.168.1.2:2101",
            "-2500",
            "--relative",
        ])
        .expect("negative target should parse");

        let Command::Move(args) = cli.command else {
            panic!("expected move");
        };
        assert_eq!(args.target, -2500);
        assert!(args.relative);
        assert_eq!(args.motion.axis, 1);
    }

    #[test]
    fn accepts_negative_velocity() {
        let cli = Cli::try_parse_from(["anc350", "jog", "host:2101", "-0.5", "--axis", "3"])
            .expect("negative velocity should parse");

        let Command::Jog(args) = cli.command else {
            panic!("expected jog");
        };
        assert_eq!(args.velocity, -0.5);
        assert_eq!(args.motion.axis, 3);
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "anc350",
            "params",
            "--format",
            "json",
            "--log-level",
            "debug",
        ])
        .expect("global flags should parse");

        assert!(matches!(cli.format, Some(OutputFormat::Json)));
        assert!(matches!(cli.log_level, LogLevel::Debug));
    }
}
