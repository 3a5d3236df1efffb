//! MySQL implementation of the source database.

mod client;
mod values;

pub use client::MySqlSource;
