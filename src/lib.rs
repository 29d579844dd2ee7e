//! Tickwatch
//!
//! Client-side alert evaluation and trade execution engine for a crypto
//! price dashboard. Streams prices from the exchange, evaluates alert
//! conditions against each snapshot, runs recurring DCA buys on a
//! wall-clock schedule, and places signed spot/margin orders.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod persistence;
pub mod secrets;
