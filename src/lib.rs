//! Brewdispatch - HTTP dispatch gateway
//!
//! Accepts REST-style requests from browser and CLI clients, translates each
//! into a call against the brewery catalog's streaming gRPC interface, drains
//! the server stream into a single JSON payload, and reports liveness to the
//! orchestrator over `/healthz`.

pub mod bootstrap;
pub mod config;
pub mod gateway;
pub mod grpc;
pub mod health;
pub mod lifecycle;
pub mod middleware;
pub mod records;

pub mod proto {
    tonic::include_proto!("brewdispatch");
}
