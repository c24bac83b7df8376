//! Authentication strategies for hop sessions.
//!
//! Each hop is authenticated with an [`AuthChain`] built from its [`HopSpec`]: the password
//! first (when one is set), then the private key file (when `key_path` is set).
//!
//! [`HopSpec`]: crate::hop::types::HopSpec

mod chain;
mod key;
mod password;
mod traits;

pub use chain::AuthChain;
pub use key::KeyAuth;
pub use password::PasswordAuth;
pub use traits::AuthStrategy;
