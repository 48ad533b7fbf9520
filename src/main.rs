//! stackcache - content-hash keyed result cache
//!
//! Entry point for the stackcache CLI application.

use clap::Parser;
use stackcache::{
    cli::Cli,
    error::{ExitCode, StructuredError},
    logging::init_logging,
};

fn main() {
    let cli = Cli::parse();
    let json_errors = cli.json_errors;

    init_logging(cli.verbose, cli.quiet);

    match stackcache::run_app(cli) {
        Ok(code) => std::process::exit(code.as_i32()),
        Err(err) => {
            let exit_code = ExitCode::for_error(&err);

            if json_errors {
                let structured = StructuredError::new(&err, exit_code);
                if let Ok(json) = serde_json::to_string_pretty(&structured) {
                    eprintln!("{}", json);
                } else {
                    eprintln!("[{}] Error: {:#}", exit_code.code_prefix(), err);
                }
            } else {
                eprintln!("[{}] Error: {:#}", exit_code.code_prefix(), err);
            }

            std::process::exit(exit_code.as_i32());
        }
    }
}
