pub mod cli;
pub mod config;
#[cfg(test)]
mod config_test;
pub mod db;
pub mod export;
pub mod logging;
pub mod orchestrator;
pub mod sync;
