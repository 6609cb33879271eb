mod objectives;
mod token;

pub use objectives::*;
pub use token::*;
