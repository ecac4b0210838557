//! # vessel-runtime
//!
//! Container lifecycle management for the Vessel runtime: the container
//! record and its state machine, the JSON metadata store, named volumes,
//! log capture, host-port reservation, exec, and the orchestrating
//! [`engine::Engine`].

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod container;
pub mod engine;
pub mod exec;
pub mod logs;
pub mod ports;
pub mod store;
pub mod volume;
