pub mod error;
pub mod types;

pub mod engine;
pub mod mutation;
pub mod reactive;
pub mod remote;
pub mod selection;
pub mod settings;
pub mod store;
pub mod view;

pub use engine::{Engine, EngineConfig};
pub use error::{EngineError, RemoteError, Result};
pub use types::{Day, FieldPath, FilterPredicate, Record, Schedule, SettingsCategory, Stats};
