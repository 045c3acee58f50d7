//! The blocking API.

mod connection;
mod server;

pub use self::{connection::Connection, server::Server};
