mod common;

use std::sync::Mutex;

use log::{Level, LevelFilter, Log, Metadata, Record};
use staycast_classifiers::config::ModelConfig;
use staycast_classifiers::preprocessing::Recipe;
use staycast_classifiers::search::refit;

/// Keeps every `info` (and above) message so tests can look for seeds.
struct CaptureLogger {
    lines: Mutex<Vec<String>>,
}

impl Log for CaptureLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= Level::Info
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            self.lines.lock().unwrap().push(record.args().to_string());
        }
    }

    fn flush(&self) {}
}

static LOGGER: CaptureLogger = CaptureLogger { lines: Mutex::new(Vec::new()) };

#[test]
fn test_refit_logs_model_seed_at_info() {
    log::set_logger(&LOGGER).unwrap();
    log::set_max_level(LevelFilter::Info);

    let data = common::synthetic_bookings(120, 3);
    let forest = ModelConfig::RandomForest { trees: 5, mtry: Some(2), min_samples_split: 10, max_depth: Some(3) };
    refit(&Recipe::default(), &data, &forest, None, 8675309).unwrap();

    let lines = LOGGER.lines.lock().unwrap();
    assert!(
        lines.iter().any(|l| l.starts_with("Refit") && l.contains("model seed 8675309")),
        "{:?}",
        *lines
    );
}
