//! Outer adapters: the HTTP API and the CSV audit export.

pub mod csv;
pub mod http;
