mod app;
mod config;
mod hubfile;
mod logging;
mod poller;
mod supervisor;
mod telemetry;

pub use app::run_from_args;
