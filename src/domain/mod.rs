//! Domain types and the ports the application layer depends on.

pub mod payment;
pub mod phone;
pub mod ports;
pub mod rating;
