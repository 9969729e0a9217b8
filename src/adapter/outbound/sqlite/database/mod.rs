//! SQLite database modules.
//!
//! Connection setup, the load table schema and its Diesel row types.

pub mod connection;
pub mod model;
pub mod schema;
