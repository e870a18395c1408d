pub mod holo;
pub mod profile;
pub mod schema;
pub mod stage;

pub use holo::HoloState;
pub use profile::{Boundaries, Profile, ProfileUpdate};
