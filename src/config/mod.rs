pub mod server;
pub mod watchdog;

pub use server::Args as ServerArgs;
pub use watchdog::Args as WatchdogArgs;
