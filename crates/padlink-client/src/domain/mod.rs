pub mod config;

pub use config::{ClientConfig, TransportConfig, DEFAULT_SERVER_URL};
