//! Core module containing the GPS link functionality
//!
//! This module provides:
//! - NMEA 0183 sentence codec and line framing
//! - Fix decoding (GGA/RMC) into channel updates
//! - Change-gated publishing to a state sink
//! - Serial transport abstraction
//! - Link state machine
//! - Link supervision: reconnects, baud rate detection, port tests

pub mod fix;
pub mod link;
pub mod protocol;
pub mod publisher;
pub mod sink;
pub mod state_machine;
pub mod transport;
