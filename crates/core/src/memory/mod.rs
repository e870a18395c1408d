pub mod history;
pub mod profile_store;

pub use history::{HistoryEntry, HistoryLog, TurnRole};
pub use profile_store::{LoadedProfile, ProfileOrigin, ProfileStore};
