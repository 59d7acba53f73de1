pub mod connection;
pub mod entities;
pub mod migrations;

pub use connection::*;
pub use entities::*;
