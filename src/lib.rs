pub mod bootstrap;
pub mod config;
pub mod db;
pub mod ini;
pub mod model;
pub mod prefs;
pub mod store;
pub mod warnings;

pub use bootstrap::Layout;
pub use config::Credentials;
pub use model::{Filter, PrefsSnapshot, RecordId, SetOutcome};
pub use prefs::{PreferenceRecord, PrefsError};
pub use store::RecordStore;
