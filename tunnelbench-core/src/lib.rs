#![forbid(unsafe_code)]

mod client;
mod error;
mod gate;
mod message;
mod run;
mod stats;
mod target;

pub use client::{RequestOutcome, TunnelClient, USER_AGENT};
pub use error::{Error, Result, TransportErrorKind};
pub use gate::{StopCondition, WorkGate};
pub use message::{BodyMode, HttpMessage, MessageReader};
pub use run::{Error as RunError, RunConfig, run_load};
pub use stats::{RunStats, RunSummary, percentile};
pub use target::TargetUrl;
