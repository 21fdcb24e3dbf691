mod audit;
mod device_session_issuer;
mod jti_ledger;
mod jwt_codec;
mod session_issuer;

#[cfg(test)]
pub(crate) mod test_support;

pub use device_session_issuer::*;
pub use jti_ledger::*;
pub use jwt_codec::*;
pub use session_issuer::*;
