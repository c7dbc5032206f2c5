pub mod constants;
pub mod engine;
pub mod grid;
pub mod protocol;
pub mod rng;
pub mod types;
