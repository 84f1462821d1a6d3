// Declare the modules that form the library's public API.
// The `server` and `watchdog` binaries pull everything from here.
pub mod config;
pub mod data_model;
pub mod dispatcher;
pub mod error;
pub mod monitor;
pub mod server;
pub mod utils;
pub mod watchdog;
pub mod worker;
