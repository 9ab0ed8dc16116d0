//! Domain models for the medpair system.

mod medication;
mod pair;
mod user_medication;

pub use medication::*;
pub use pair::*;
pub use user_medication::*;
