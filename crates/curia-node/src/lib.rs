/*!
# Curia Node

Process layer around the protocol crates.

[`CurationEngine`] serializes every operation behind one lock and turns the
token movements the core components imply into calls on the external
[`TokenService`](collaborators::TokenService): stakes and fungible task budgets
sit in a custody account, slashes move custody funds to the penalty pool, and
claims either transfer out of custody or mint platform receipt tokens. An
operation whose token effects fail leaves the protocol state untouched.

The crate also carries TOML configuration, tracing setup, Prometheus metrics and
the JSON scenario runner behind the `curia` binary.
*/

pub mod collaborators;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod scenario;

pub use collaborators::{
    ArbitrationAuthority, MemoryTokenService, MemoryUsageFeed, StaticAuthority, TokenService,
    UsageFeed,
};
pub use config::{LoggingConfig, MetricsConfig, NodeConfig};
pub use engine::{CurationEngine, EngineConfig, EngineStats, ProtocolState};
pub use error::{EngineError, Result};
pub use metrics::Metrics;
pub use scenario::{ReplayReport, Scenario};
