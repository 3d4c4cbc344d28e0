use colored::Colorize;
use log::{Level, LevelFilter, Log, Metadata, Record};
use std::io::{self, Write};
use std::sync::Mutex;

pub struct CocoonLogger {
    level: Mutex<LevelFilter>,
}

impl CocoonLogger {
    pub fn new(level: LevelFilter) -> &'static Self {
        Box::leak(Box::new(Self {
            level: Mutex::new(level),
        }))
    }

    pub fn init(&'static self) -> Result<&'static Self, log::SetLoggerError> {
        log::set_logger(self)?;
        log::set_max_level(LevelFilter::Trace);
        Ok(self)
    }

    pub fn set_level(&self, level: LevelFilter) {
        *self.level.lock().expect("Failed to lock level") = level;
    }
}

impl Log for CocoonLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= *self.level.lock().expect("Failed to lock level")
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let color = match record.level() {
            Level::Error => colored::Color::Red,
            Level::Warn => colored::Color::Yellow,
            Level::Info => colored::Color::White,
            Level::Debug => colored::Color::Blue,
            Level::Trace => colored::Color::BrightBlack,
        };
        let line = format!(
            "[{}] {}: {}",
            record.level(),
            record.target(),
            record.args()
        )
        .color(color);
        let _ = writeln!(io::stderr(), "{}", line);
    }

    fn flush(&self) {
        let _ = io::stderr().flush();
    }
}
