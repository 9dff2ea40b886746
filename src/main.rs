use std::process::ExitCode;

use sponge::output as out;
use sponge::{ReplaceError, describe};

mod app;
mod logging;

fn main() -> ExitCode {
    let args = sponge::cli::parse();
    match app::run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let msg = match e.downcast_ref::<ReplaceError>() {
                Some(re) => describe(re),
                None => format!("{e:#}"),
            };
            out::print_error(&msg);
            ExitCode::FAILURE
        }
    }
}
