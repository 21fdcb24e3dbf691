mod claims;
mod device;
mod token;
mod user;

pub use claims::*;
pub use device::*;
pub use token::*;
pub use user::*;
