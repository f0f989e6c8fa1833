//! pm-core binary entry point.

use clap::Parser;
use pm_common::OutputFormat;
use pm_core::cli::{run, Cli};
use pm_core::exit_codes::ExitCode;
use pm_core::logging::init_logging;
use serde_json::json;

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_json);

    let code = match run(&cli) {
        Ok(code) => code,
        Err(err) => {
            match cli.format {
                OutputFormat::Json => eprintln!(
                    "{}",
                    json!({ "error": err.to_string(), "code": err.code() })
                ),
                OutputFormat::Text => eprintln!("error: {err}"),
            }
            ExitCode::for_error(&err)
        }
    };
    std::process::exit(code.as_i32());
}
