mod engine;
mod future;
mod improve;
mod integral;
mod nexts;
mod splice;

pub mod evaluate;

pub use engine::*;
pub use future::*;
pub use improve::*;
pub use integral::*;
pub use nexts::*;
pub use splice::*;
