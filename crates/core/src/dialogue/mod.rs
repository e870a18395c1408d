pub mod evolve;
pub mod signals;
