//! Tracing initialization for the binary.
//!
//! One fmt layer always writes to stderr (stdout carries the soaked-up data). A second,
//! non-blocking layer is added when a log file is configured and passes the symlink
//! check. Both share the same format: compact text, or JSON with `--json`.

use anyhow::Result;
use chrono::Local;
use sponge::output as out;
use sponge::platform::open_log_file_secure_append;
use sponge::{LogLevel, path_has_symlink_ancestor};
use std::fmt as stdfmt;
use std::io;
use std::path::Path;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{Layer, Registry, fmt as tsfmt, registry};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// DD/MM/YY HH:MM:SS in local time.
struct LocalHumanTime;
impl FormatTime for LocalHumanTime {
    fn format_time(&self, w: &mut Writer<'_>) -> stdfmt::Result {
        write!(w, "{}", Local::now().format("%d/%m/%y %H:%M:%S"))
    }
}

fn level_filter(lvl: &LogLevel) -> LevelFilter {
    match lvl {
        LogLevel::Quiet => LevelFilter::ERROR,
        LogLevel::Normal => LevelFilter::WARN,
        LogLevel::Info => LevelFilter::INFO,
        LogLevel::Debug => LevelFilter::TRACE,
    }
}

/// How one sink renders events.
#[derive(Clone, Copy)]
struct Style {
    json: bool,
    ansi: bool,
    target: bool,
}

fn fmt_layer<W>(writer: W, style: Style) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let base = tsfmt::layer()
        .with_writer(writer)
        .with_timer(LocalHumanTime)
        .with_level(true)
        .with_target(style.target);
    if style.json {
        base.json().boxed()
    } else {
        base.compact().with_ansi(style.ansi).boxed()
    }
}

/// Non-blocking writer for `path`, or None (with a warning) if it must not or cannot be used.
fn log_file_writer(path: &Path) -> Option<(NonBlocking, WorkerGuard)> {
    let refusal = match path_has_symlink_ancestor(path) {
        Ok(false) => match open_log_file_secure_append(path) {
            Ok(file) => return Some(tracing_appender::non_blocking(file)),
            Err(e) => format!("cannot open log file {}: {e}", path.display()),
        },
        Ok(true) => format!(
            "refusing file logging: an ancestor of {} is a symlink",
            path.display()
        ),
        Err(e) => format!("cannot check log path {} for symlinks: {e}", path.display()),
    };
    out::print_warn(&format!("{refusal}; logs continue on stderr only"));
    None
}

/// Install the global subscriber. The returned guard flushes the file layer when dropped.
pub fn init_tracing(
    lvl: &LogLevel,
    log_file: Option<&Path>,
    json: bool,
) -> Result<Option<WorkerGuard>> {
    let mut layers: Vec<BoxedLayer> = vec![fmt_layer(
        io::stderr,
        Style {
            json,
            ansi: atty::is(atty::Stream::Stderr),
            target: json,
        },
    )];

    let guard = log_file.and_then(log_file_writer).map(|(writer, guard)| {
        layers.push(fmt_layer(
            writer,
            Style {
                json,
                ansi: false,
                target: true,
            },
        ));
        guard
    });

    let filter = EnvFilter::new(level_filter(lvl).to_string());
    registry().with(layers).with(filter).try_init()?;
    Ok(guard)
}
