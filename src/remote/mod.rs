mod client;
mod protocol;
mod server;

pub use client::*;
pub use protocol::*;
pub use server::*;
