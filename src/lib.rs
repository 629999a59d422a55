pub mod app;
pub mod concat;
pub mod config;
pub mod error;
pub mod location;
pub mod open;
pub mod output;
pub mod source;
pub mod transport;
