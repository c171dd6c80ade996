//! FISIS quarterly statistics watcher.
//!
//! Library half of the `fisis-watch` binary: config, month arithmetic,
//! watermark persistence, the FISIS client, response classification,
//! ntfy alerts and the run orchestrator.

pub mod assess;
pub mod clock;
pub mod config;
pub mod fisis;
pub mod keepalive;
pub mod month;
pub mod monitor;
pub mod notify;
pub mod watermark;

#[cfg(test)]
mod test_support;
