pub mod policy;
pub mod training;

pub use policy::{DEFAULT_HIDDEN, PolicyNetwork};
pub use training::{EliteBatch, PolicyTrainer};
