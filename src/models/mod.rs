pub mod passenger;

pub use passenger::*;
