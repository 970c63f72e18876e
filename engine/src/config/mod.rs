mod config;

pub use config::QueueFileConfig;
