//! graphlift: offloads ANN graph builds to a remote build service, falling
//! back to a local builder whenever the remote path fails.

pub mod config;
pub mod corpus;
pub mod error;
pub mod local;
pub mod metrics;
pub mod orchestrator;
pub mod service;
pub mod staging;
pub mod storage;
pub mod types;
