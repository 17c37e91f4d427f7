pub mod connection;
pub mod statement;

pub use connection::{Connection, ConnectionDefaults, TxHandle};
pub use statement::Statement;
