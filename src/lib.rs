//! capguard: position-risk and capital-protection engine
//!
//! This library provides the core components for:
//! - Exact fixed-point monetary arithmetic
//! - Pre-trade validation with fixed-order limit checks
//! - Kelly, fixed-fractional, and risk-parity position sizing
//! - Stop-loss lifecycle management with trailing ratchets
//! - Latched circuit breaker and emergency shutdown with an audit trail
//! - Portfolio exposure, VaR, and correlation-concentration metrics
//! - A single-writer engine loop fed by an intent queue
//! - Full observability stack

pub mod breaker;
pub mod cli;
pub mod config;
pub mod controller;
pub mod money;
pub mod portfolio;
pub mod position;
pub mod sizing;
pub mod stops;
pub mod telemetry;
