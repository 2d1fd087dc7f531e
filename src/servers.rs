//! Development transport servers.
//!
//! The real deployment talks to a broker; for development the daemon hosts a
//! line-delimited JSON bridge that plays the bus role itself.

mod json;
pub use json::{bind as bind_json, JsonServer, JsonServerError};
