mod emulator;
mod input;
mod machine;

pub use emulator::*;
pub use input::*;
pub use machine::*;

/// RAM snapshot taken after every emulator step
pub type Memory = Vec<u8>;
