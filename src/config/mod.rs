mod settings;

pub use settings::{LogSettings, QueueSettings, Settings};
