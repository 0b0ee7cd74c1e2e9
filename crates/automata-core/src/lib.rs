pub mod config;
pub mod error;
pub mod event;
pub mod payload;
pub mod traits;
pub mod types;

pub use config::AppConfig;
pub use error::{AutomataError, Result};
pub use event::EventBus;
pub use payload::Payload;
pub use types::*;
