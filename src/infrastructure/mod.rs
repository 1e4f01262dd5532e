//! Store and gateway adapters behind the domain ports.

pub mod in_memory;
pub mod mpesa;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
