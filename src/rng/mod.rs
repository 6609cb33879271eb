mod keystream;

pub use keystream::*;
