//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! receiver. Ports are interfaces the receive loop depends on, but whose
//! implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`IDispatchGateway`] - Downstream consumer of metrics and events
//! - [`ILineLexer`] - Per-line protocol decoder

pub mod dispatch;
pub mod lexer;

pub use dispatch::{DispatchError, IDispatchGateway};
pub use lexer::{ILineLexer, Parsed};
