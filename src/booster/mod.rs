pub mod simulator;

pub use simulator::{ComposedPack, PackSimulator};
