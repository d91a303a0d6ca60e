//! End-to-end tests for burngate.
//!
//! The gateway runs for real on an ephemeral port; upstream providers and
//! the burn-check RPC endpoint are served by a local mock upstream.

mod failover;
mod gate_properties;
mod gateway_flow;
mod harness;
mod upstream;
