//! Application orchestrator.
//! Loads/merges config, initializes logging, installs the interrupt handler,
//! soaks up standard input and hands it to the selected sink.

use anyhow::{Context, Result, bail};
use std::io::{self, Read};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};
use tracing_appender::non_blocking::WorkerGuard;

use sponge::cli::Args;
use sponge::output as out;
use sponge::{Config, ReplaceError, Sink, SinkTarget, load_config, shutdown};

use crate::logging::init_tracing;

type GuardSlot = Arc<Mutex<Option<WorkerGuard>>>;

/// Run the CLI application.
pub fn run(args: Args) -> Result<()> {
    // Config file values first, then CLI overrides (CLI wins).
    let mut cfg = load_config()?;
    args.apply_overrides(&mut cfg);

    let guard_opt = init_tracing(&cfg.log_level, cfg.log_file.as_deref(), args.json)
        .context("initialize logging")?;

    // Guard needs to be dropped on SIGINT to flush logs
    let guard_slot: GuardSlot = Arc::new(Mutex::new(guard_opt));
    install_interrupt_handler(Arc::clone(&guard_slot))?;

    debug!(?args, ?cfg, "starting sponge");

    let result = soak(&args, &cfg);
    if let Err(e) = &result {
        log_failure(e);
    }

    // Ensure logs are flushed before exit
    if let Ok(mut g) = guard_slot.lock() {
        let _ = g.take();
    }
    result
}

fn install_interrupt_handler(guard_slot: GuardSlot) -> Result<()> {
    ctrlc::set_handler(move || {
        shutdown::request();
        if shutdown::claim_immediate_exit() {
            // Still reading input: nothing exists on disk yet.
            if let Ok(mut g) = guard_slot.lock() {
                let _ = g.take();
            }
            std::process::exit(shutdown::INTERRUPTED_EXIT_CODE);
        }
        out::print_warn("interrupted; output will be discarded");
    })
    .context("install interrupt handler")
}

fn soak(args: &Args, cfg: &Config) -> Result<()> {
    let mut input = Vec::new();
    io::stdin()
        .lock()
        .read_to_end(&mut input)
        .context("read standard input")?;
    debug!(bytes = input.len(), "standard input exhausted");

    let target = args.sink_target();
    if !shutdown::enter_sink_phase() {
        bail!("interrupted");
    }
    let sink = Sink::open(&target, &cfg.replace_options())?;
    let sink = sink.write_all_or_abort(&input)?;

    if shutdown::is_requested() {
        sink.abort()?;
        bail!("interrupted; output discarded");
    }

    let dest = sink.path().map(Path::to_path_buf);
    sink.commit()?;
    match (&target, dest) {
        (SinkTarget::Atomic { append, .. }, Some(p)) => {
            info!(target = %p.display(), bytes = input.len(), append, "replaced atomically")
        }
        (SinkTarget::Plain { append, .. }, Some(p)) => {
            info!(target = %p.display(), bytes = input.len(), append, "wrote file")
        }
        _ => debug!(bytes = input.len(), "wrote standard output"),
    }
    Ok(())
}

/// Structured record of a failure; the user-facing line is printed by `main`.
fn log_failure(e: &anyhow::Error) {
    match e.downcast_ref::<ReplaceError>() {
        Some(re) => {
            let cause = re.primary();
            debug!(
                kind = re.kind(),
                primary = cause.kind(),
                errors = re.errors().len(),
                os_code = re.io_error().and_then(io::Error::raw_os_error),
                error = %re,
                "replacement failed"
            );
        }
        None => debug!(kind = "front_end", error = %format!("{e:#}"), "sponge failed"),
    }
}
