//! Domain model shared by the shipshape pipelines: alerts, metric samples,
//! retention and threshold policies, action outcomes and the run lifecycle.
//! Everything here is I/O-free; the CLI crate owns the transports.

pub mod alert;
pub mod metrics;
pub mod outcome;
pub mod policy;
pub mod run;
