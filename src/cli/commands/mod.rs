//! CLI command implementations

pub mod activate;
pub mod config;
pub mod fetch;
pub mod install;
pub mod manifest;
pub mod message;
pub mod status;

pub use activate::execute as activate;
pub use config::execute as config;
pub use fetch::execute as fetch;
pub use install::execute as install;
pub use manifest::execute as manifest;
pub use message::execute as message;
pub use status::execute as status;
