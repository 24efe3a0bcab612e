//! Provides [init] to set up logging for the CLI.
use env_logger::fmt::Color;
use std::io::Write as _;

/// Initializes [env_logger] from `RUST_LOG` (default `warn`) with a compact formatter.
pub fn init() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format(format_record)
        .target(env_logger::Target::Stderr)
        .init();
}

fn format_record(
    formatter: &mut env_logger::fmt::Formatter,
    record: &log::Record,
) -> std::io::Result<()> {
    let context = format!(
        "{time} {level:<5} {target}",
        time = formatter.timestamp_millis(),
        level = record.level(),
        target = record.target(),
    );

    writeln!(
        formatter,
        "{context}  {msg}",
        context = formatter
            .style()
            // Using black with `set_intense(true)` results in grey output.
            .set_color(Color::Black)
            .set_intense(true)
            .value(context),
        msg = record.args()
    )
}
