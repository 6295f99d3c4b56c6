use std::io::Write;

use colored::Colorize;
use env_logger::Builder;
use log::{Level, LevelFilter};

pub fn init() {
    let mut builder = Builder::new();
    builder
        .format(|buf, record| {
            let level = match record.level() {
                Level::Error => "ERROR".red().bold(),
                Level::Warn => " WARN".yellow().bold(),
                Level::Info => " INFO".green(),
                Level::Debug => "DEBUG".blue(),
                Level::Trace => "TRACE".normal().dimmed(),
            };
            writeln!(
                buf,
                "{} {} {}",
                chrono::Local::now().format("%H:%M:%S%.3f"),
                level,
                record.args()
            )
        })
        .filter_level(LevelFilter::Info)
        .parse_default_env();

    // The binary and the test harness may both try to install a logger.
    _ = builder.try_init();
}
