//! `varscreen` command-line entry point.

use std::io::{self, IsTerminal};

use clap::{ColorChoice, Parser};
use tracing::level_filters::LevelFilter;
use varscreen_cli::cli::{Cli, Command, LogFormatArg, LogLevelArg};
use varscreen_cli::commands::{run_all, run_encode, run_merge, run_predict, run_screen};
use varscreen_cli::logging::{LogConfig, LogFormat, init_logging};

mod summary;

use crate::summary::{
    print_encode_summary, print_merge_summary, print_prediction, print_run_summary,
    print_screen_summary,
};

fn main() {
    let cli = Cli::parse();
    cli.color.write_global();
    let log_config = log_config_from_cli(&cli);
    if let Err(error) = init_logging(&log_config) {
        eprintln!("error: failed to initialize logging: {error}");
        std::process::exit(1);
    }
    let exit_code = match &cli.command {
        Command::Screen(args) => report(run_screen(args), args.strict, |r| {
            print_screen_summary(r);
            r.has_errors()
        }),
        Command::Merge(args) => report(run_merge(args), args.strict, |r| {
            print_merge_summary(r);
            r.has_errors()
        }),
        Command::Encode(args) => report(run_encode(args), args.study.strict, |r| {
            print_encode_summary(r);
            false
        }),
        Command::Run(args) => report(run_all(args), args.study.strict, |r| {
            print_run_summary(r);
            r.has_errors()
        }),
        Command::Predict(args) => report(run_predict(args), false, |r| {
            print_prediction(r);
            false
        }),
    };
    std::process::exit(exit_code);
}

/// Print a stage result and map it to an exit code.
///
/// Recoverable errors only fail the process under `--strict`.
fn report<T>(result: anyhow::Result<T>, strict: bool, print: impl FnOnce(&T) -> bool) -> i32 {
    match result {
        Ok(value) => {
            let has_errors = print(&value);
            if strict && has_errors { 1 } else { 0 }
        }
        Err(error) => {
            eprintln!("error: {error:#}");
            1
        }
    }
}

/// Build logging configuration from CLI flags with consistent precedence.
fn log_config_from_cli(cli: &Cli) -> LogConfig {
    let mut config = LogConfig {
        level_filter: cli.verbosity.tracing_level_filter(),
        ..LogConfig::default()
    };
    config.use_env_filter = !(cli.verbosity.is_present() || cli.log_level.is_some());
    if let Some(level) = cli.log_level {
        config.level_filter = match level {
            LogLevelArg::Error => LevelFilter::ERROR,
            LogLevelArg::Warn => LevelFilter::WARN,
            LogLevelArg::Info => LevelFilter::INFO,
            LogLevelArg::Debug => LevelFilter::DEBUG,
            LogLevelArg::Trace => LevelFilter::TRACE,
        };
    }
    config.format = match cli.log_format {
        LogFormatArg::Pretty => LogFormat::Pretty,
        LogFormatArg::Compact => LogFormat::Compact,
        LogFormatArg::Json => LogFormat::Json,
    };
    config.log_file = cli.log_file.clone();
    config.log_data = cli.log_data;
    config.with_ansi = match cli.color.color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => cli.log_file.is_none() && io::stderr().is_terminal(),
    };
    config
}
