use env_logger::Builder;
use log::{Level, LevelFilter};

use crate::core::MessageHandler;

/// Default diagnostic sink: forwards fetch messages to the `log` facade.
pub struct LogMessageHandler {
    target: String,
}

impl Default for LogMessageHandler {
    fn default() -> Self {
        Self::new("pingfetch::fetch")
    }
}

impl LogMessageHandler {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }
}

impl MessageHandler for LogMessageHandler {
    fn message(&self, level: Level, msg: &str) {
        log::log!(target: self.target.as_str(), level, "{}", msg);
    }
}

/// Initialize `env_logger`, `RUST_LOG` overrides `level`.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_env_logger(level: LevelFilter) {
    let _ = Builder::new()
        .filter(None, level)
        .parse_default_env()
        .try_init();
}
