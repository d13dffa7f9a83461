pub mod config;
pub mod logging;

pub mod checksum;
pub mod control;
pub mod cycle;
pub mod discovery;
pub mod failure_signal;
pub mod fetch;
pub mod job;
pub mod orchestrator;
pub mod reconcile;
pub mod report;
pub mod retention;
pub mod retry;
pub mod storage;
pub mod store;
pub mod url_model;

#[cfg(test)]
mod testing;
