//! CLI command implementations

pub mod clear;
pub mod config;
pub mod get;
pub mod init;
pub mod list;
pub mod status;

pub use clear::execute as clear;
pub use config::execute as config;
pub use get::execute as get;
pub use init::execute as init;
pub use list::execute as list;
pub use status::execute as status;
