mod key;
mod policy;
mod token;
mod user;

pub use key::*;
pub use policy::*;
pub use token::*;
pub use user::*;
