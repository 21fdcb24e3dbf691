mod device_session_service;
mod request_scope;
mod session_error;
mod session_service;

pub use device_session_service::*;
pub use request_scope::*;
pub use session_error::*;
pub use session_service::*;
