pub mod collectors;

use clap::{Arg, ArgAction, ColorChoice, Command, builder::ValueParser};
use std::time::Duration;

#[must_use]
pub fn new() -> Command {
    let styles = clap::builder::styling::Styles::styled()
        .header(clap::builder::styling::AnsiColor::Yellow.on_default() | clap::builder::styling::Effects::BOLD)
        .usage(clap::builder::styling::AnsiColor::Green.on_default() | clap::builder::styling::Effects::BOLD)
        .literal(clap::builder::styling::AnsiColor::Blue.on_default() | clap::builder::styling::Effects::BOLD)
        .placeholder(clap::builder::styling::AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(crate::version().into_boxed_str());

    let cmd = Command::new("mysqld_exporter")
        .about("Prometheus exporter for MySQL server metrics")
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value("9104")
                .env("MYSQLD_EXPORTER_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("listen")
                .short('l')
                .long("listen")
                .help("Address to listen on, defaults to [::] with a fallback to 0.0.0.0")
                .env("MYSQLD_EXPORTER_LISTEN"),
        )
        .arg(
            Arg::new("dsn")
                .long("dsn")
                .help("Data source name")
                .default_value("mysql:///mysql?socket=/var/run/mysqld/mysqld.sock")
                .env("MYSQLD_EXPORTER_DSN")
                .hide_env_values(true),
        )
        .arg(
            Arg::new("timeout-offset")
                .long("timeout-offset")
                .help("Seconds subtracted from the Prometheus scrape timeout")
                .default_value("0.25")
                .env("MYSQLD_EXPORTER_TIMEOUT_OFFSET")
                .value_parser(ValueParser::new(parse_offset)),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Increase verbosity, -vv for debug")
                .action(ArgAction::Count),
        );

    collectors::add_collectors_args(cmd)
}

fn parse_offset(raw: &str) -> Result<f64, String> {
    let offset: f64 = raw.parse().map_err(|e| format!("invalid offset {raw:?}: {e}"))?;
    if Duration::try_from_secs_f64(offset).is_ok() {
        Ok(offset)
    } else {
        Err(format!("offset must be a non-negative number of seconds, got {raw}"))
    }
}
