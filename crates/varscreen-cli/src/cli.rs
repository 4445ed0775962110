//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;

#[derive(Parser)]
#[command(
    name = "varscreen",
    version,
    about = "Screen survey variables against a follow-up outcome cohort",
    long_about = "Screen survey domain tables for usable baseline predictors.\n\n\
                  Stages: cohort selection, variable screening, baseline merge,\n\
                  imputation and encoding. `predict` scores a single respondent\n\
                  against persisted encoding artifacts."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Adjust log verbosity (-v for info, -vv for debug, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,

    /// Allow subject identifiers in log output.
    #[arg(long = "log-data", global = true)]
    pub log_data: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Select the cohort and screen every configured domain.
    Screen(StudyArgs),

    /// Merge screened variables onto the cohort's baseline rows.
    Merge(StudyArgs),

    /// Impute and encode the merged table into a feature matrix.
    Encode(EncodeArgs),

    /// Run screen, merge and encode in one pass.
    Run(EncodeArgs),

    /// Score one respondent with persisted artifacts.
    Predict(PredictArgs),
}

#[derive(Args, Clone)]
pub struct StudyArgs {
    /// Study configuration file.
    #[arg(long = "config", value_name = "PATH", default_value = "study.toml")]
    pub config: PathBuf,

    /// Directory the configured data paths are relative to.
    #[arg(long = "data-root", value_name = "DIR")]
    pub data_root: Option<PathBuf>,

    /// Output directory (overrides `output.dir`).
    #[arg(long = "output-dir", value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Exit with an error when any file or variable had to be skipped.
    #[arg(long = "strict")]
    pub strict: bool,
}

#[derive(Args, Clone)]
pub struct EncodeArgs {
    #[command(flatten)]
    pub study: StudyArgs,

    /// Drop collinear variables before encoding.
    #[arg(long = "prune")]
    pub prune: bool,

    /// Collinearity threshold on |rho| (overrides `pruning.threshold`).
    #[arg(long = "prune-threshold", value_name = "RHO", requires = "prune")]
    pub prune_threshold: Option<f64>,
}

#[derive(Args, Clone)]
pub struct PredictArgs {
    /// Feature list written by `encode`.
    #[arg(long = "features", value_name = "PATH")]
    pub features: PathBuf,

    /// Encoding catalog written by `encode`, or a hand-authored one.
    #[arg(long = "catalog", value_name = "PATH")]
    pub catalog: PathBuf,

    /// Logistic model artifact.
    #[arg(long = "model", value_name = "PATH")]
    pub model: PathBuf,

    /// One answer as VARIABLE=VALUE; repeatable.
    #[arg(long = "answer", value_name = "VARIABLE=VALUE", value_parser = parse_answer)]
    pub answers: Vec<(String, String)>,

    /// JSON object of answers; `--answer` entries take precedence.
    #[arg(long = "answers", value_name = "PATH")]
    pub answers_file: Option<PathBuf>,
}

fn parse_answer(raw: &str) -> Result<(String, String), String> {
    let (variable, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected VARIABLE=VALUE, got '{raw}'"))?;
    let variable = variable.trim();
    if variable.is_empty() {
        return Err(format!("missing variable name in '{raw}'"));
    }
    Ok((variable.to_string(), value.trim().to_string()))
}

/// CLI log level choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn answers_split_on_first_equals() {
        assert_eq!(
            parse_answer("note=a=b").unwrap(),
            ("note".to_string(), "a=b".to_string())
        );
        assert!(parse_answer("no_value").is_err());
        assert!(parse_answer("=1").is_err());
    }

    #[test]
    fn run_accepts_prune_flags() {
        let cli = Cli::try_parse_from([
            "varscreen",
            "run",
            "--config",
            "study.toml",
            "--prune",
            "--prune-threshold",
            "0.8",
            "--strict",
        ])
        .unwrap();
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert!(args.prune);
        assert!(args.study.strict);
        assert_eq!(args.prune_threshold, Some(0.8));
    }
}
