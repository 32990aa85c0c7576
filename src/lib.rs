//! Gateway that serves the v4 kadmin protocol on top of a mask-driven
//! principal administration API.
//!
//! Each connection runs [`session::run_session`]: frames are read by
//! [`transport`], authenticated and decrypted by [`envelope`], executed by
//! [`protocol_engine`] through [`admin::AdminApi`], and answered with a
//! sealed record or a plaintext legacy error code.

pub mod admin;
pub mod config;
pub mod core;
pub mod envelope;
pub mod kadm_protocol;
pub mod key_management;
pub mod legacy;
pub mod legacy_codes;
pub mod logging;
pub mod protocol_engine;
pub mod server;
pub mod session;
pub mod transport;

#[cfg(test)]
mod test_support;

pub use admin::{AdminApi, AdminError, Mask, Principal, PrincipalEntry, Privilege};
pub use config::{ConfigError, GatewayConfig};
pub use envelope::{SessionCipher, TicketVerifier};
pub use key_management::ServiceKey;
pub use legacy_codes::LegacyCode;
pub use server::{GatewayServer, ServerError};
pub use session::GatewayContext;
