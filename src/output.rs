use owo_colors::OwoColorize;

/// Small wrapper around stderr printing to provide consistent, colored
/// user-facing messages. Standard output is reserved for soaked-up data.
/// Colors are enabled only when stderr is a TTY.
fn is_tty() -> bool {
    atty::is(atty::Stream::Stderr)
}

const PROG: &str = "sponge:";

pub fn print_warn(msg: &str) {
    if is_tty() {
        eprintln!("{PROG} {} {}", "warning:".yellow().bold(), msg);
    } else {
        eprintln!("{PROG} warning: {msg}");
    }
}

pub fn print_error(msg: &str) {
    if is_tty() {
        eprintln!("{PROG} {} {}", "error:".red().bold(), msg);
    } else {
        eprintln!("{PROG} error: {msg}");
    }
}
