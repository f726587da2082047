pub mod binder;
pub mod pack;
pub mod progress;

pub use binder::*;
pub use pack::*;
pub use progress::*;
