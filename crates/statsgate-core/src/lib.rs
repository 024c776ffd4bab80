//! statsgate Core - Domain types and port definitions
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `Metric`, `Event`, `Tags`, `ReceiverStats`
//! - **Port definitions** - Traits for adapters: `IDispatchGateway`, `ILineLexer`
//! - **Configuration** - YAML-backed `Config` with validation and a builder
//!
//! # Architecture
//!
//! The domain module contains plain data with no I/O. Ports define the
//! trait interfaces the receiver depends on; their implementations live
//! in the receiver crate (the DogStatsD lexer) or in the daemon (dispatch
//! handlers).

pub mod config;
pub mod domain;
pub mod ports;
