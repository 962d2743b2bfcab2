//! Local persistence: a JSON record arena over `SQLite`, plus sync settings.

mod migrations;
mod settings;
mod store;

pub use settings::SyncSettings;
pub use store::{ChangeEvent, ChangeOrigin, Store, WriteTransaction};
