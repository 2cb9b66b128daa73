pub mod client;
pub mod config;
pub mod error;
pub mod input;
pub mod protocol;
pub mod types;

pub use client::{ClientOptions, ConnectionState, VmClient, WeakVmClient};
pub use error::{ClientError, ProtocolError};
