//! Outer HTTP binding for the VAU tunnel.
//!
//! Provides:
//! - The [`HttpClient`] seam and plain request/response records
//! - [`Connector`]: runs the handshake over outer POSTs and validates the connection id
//! - [`TunnelClient`]: sends and receives application frames on an established tunnel
//! - The inner HTTP/1.1 [`codec`] and [`VauHttpClient`], which tunnels whole requests
//! - Header decorator and TLS downgrade wrappers
//! - `ReqwestHttpClient`, a blocking outer transport (feature `reqwest`, on by default)
//!
//! Everything is blocking. One tunnel serves one caller at a time.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod codec;
pub mod config;
pub mod connection;
pub mod decorator;
pub mod error;
pub mod exchange;
pub mod vau_client;

#[cfg(feature = "reqwest")]
pub mod reqwest_client;

pub use config::{ClientConfig, ConnectorBuilder};
pub use connection::{validate_connection_id, Connector, TunnelClient};
pub use decorator::{DowngradeHttpClient, HeaderDecoratorHttpClient};
pub use error::{Error, ErrorKind, Result};
pub use exchange::{HttpClient, HttpHeader, HttpRequest, HttpResponse};
pub use vau_client::VauHttpClient;

#[cfg(feature = "reqwest")]
pub use reqwest_client::ReqwestHttpClient;
