pub mod persona;
pub mod shaping;
pub mod souls;
pub mod turn;

pub use persona::{Immersion, Mode};
pub use souls::{NewSoul, Soul, SoulCreated, SoulError, SoulReply, SoulTalk};
pub use turn::{TurnEngine, TurnError, TurnReply, TurnRequest};
