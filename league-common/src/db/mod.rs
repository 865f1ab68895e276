//! SQLite bootstrap shared by the league binaries

pub mod init;

pub use init::*;
