//! Console and file logger. Debug output is kept for this crate, everything else is filtered
//! down to `info`.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use colored::{Color, Colorize};
use log::{Level, LevelFilter, Log, Metadata, Record};
use time::macros;

struct Logger {
    file: Option<Mutex<BufWriter<File>>>,
}

impl Logger {
    fn new(path: &Path) -> Self {
        log::set_max_level(LevelFilter::Debug);

        let file = match File::create(path) {
            Ok(file) => Some(Mutex::new(BufWriter::new(file))),
            Err(err) => {
                println!("cannot open log file {}: {err}", path.display());
                None
            }
        };

        Self { file }
    }
}

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.target().split("::").next() == Some(env!("CARGO_CRATE_NAME"))
            || metadata.level() <= Level::Info
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let timestamp = time::OffsetDateTime::now_utc()
            .format(macros::format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"))
            .unwrap_or_default();
        let target = record.target();
        let level = record.level().as_str();
        let args = record.args();

        let color = match record.level() {
            Level::Error => Color::BrightRed,
            Level::Warn => Color::BrightYellow,
            Level::Info => Color::BrightCyan,
            Level::Debug => Color::Magenta,
            Level::Trace => Color::Green,
        };

        println!("{} {} {args}", timestamp.color(Color::BrightBlack), level.color(color));

        if let Some(file) = &self.file {
            let mut file = file.lock().unwrap_or_else(PoisonError::into_inner);
            writeln!(file, "{timestamp} [{target} {level}] {args}").ok();
        }
    }

    fn flush(&self) {
        if let Some(file) = &self.file {
            file.lock().unwrap_or_else(PoisonError::into_inner).flush().ok();
        }
    }
}

pub fn init(path: &Path) {
    if log::set_boxed_logger(Box::new(Logger::new(path))).is_err() {
        println!("a logger is already installed");
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn metadata(target: &str, level: Level) -> Metadata<'_> {
        Metadata::builder().target(target).level(level).build()
    }

    #[test]
    fn test_foreign_targets_are_filtered() {
        let logger = Logger { file: None };

        assert!(logger.enabled(&metadata("meme_collage::collage::renderer", Level::Debug)));
        assert!(logger.enabled(&metadata("tokio::runtime", Level::Warn)));
        assert!(!logger.enabled(&metadata("tokio::runtime", Level::Debug)));
    }

    #[test]
    fn test_unwritable_log_file() {
        let dir = tempfile::tempdir().unwrap();
        let logger = Logger::new(&dir.path().join("missing").join("app.log"));

        assert!(logger.file.is_none());
    }
}
