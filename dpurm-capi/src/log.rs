// Copyright 2024 Google LLC
// SPDX-License-Identifier: MIT

use log::{LevelFilter, Log, Metadata, Record};
use std::sync::{Mutex, Once};

pub type LogCallback = Box<dyn Fn(&Record) + Send>;

struct Logger {
    callback: Mutex<Option<LogCallback>>,
}

impl Log for Logger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, rec: &Record) {
        let callback = self.callback.lock().unwrap();
        if let Some(callback) = callback.as_ref() {
            callback(rec);
        }
    }

    fn flush(&self) {}
}

static LOGGER: Logger = Logger {
    callback: Mutex::new(None),
};

pub fn init(filter: LevelFilter, callback: LogCallback) {
    static ONCE: Once = Once::new();
    ONCE.call_once(|| {
        let _ = log::set_logger(&LOGGER);
    });

    let mut cb = LOGGER.callback.lock().unwrap();
    *cb = Some(callback);

    log::set_max_level(filter);
}
