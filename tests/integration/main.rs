//! dockgate integration test harness.
//!
//! Every test runs in-process: a hyper responder on a temporary unix socket
//! stands in for the docker daemon, and each front door is a real axum
//! server on an ephemeral loopback port. Membership events are applied
//! directly instead of through gossip.
//!
//!   cargo test --test integration

mod endpoints;
mod infra;
mod proxy;
mod routing;
