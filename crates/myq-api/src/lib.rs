// myq-api: Async Rust client for the MyQ cloud API (OAuth2 + device endpoints)

pub mod client;
pub mod devices;
pub mod endpoints;
pub mod error;
mod oauth;
pub mod transport;

pub use client::{DeviceAction, MyQClient};
pub use devices::{DeviceFamily, RemoteDevice};
pub use endpoints::ApiEndpoints;
pub use error::Error;
