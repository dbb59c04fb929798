use thiserror::Error;

use crate::SwitchId;

/// Errors that invalidate a whole routing computation.
#[derive(Debug, Error)]
pub enum RoutingError {
    /// A link carries a delay or bandwidth that cannot be turned into a cost.
    #[error("malformed metric on link {src} -> {dst}: {reason}")]
    MalformedMetric {
        src: SwitchId,
        dst: SwitchId,
        #[source]
        reason: MetricError,
    },

    /// A switch declared in `networks` is not part of the topology.
    #[error("anchor switch {0} is unknown to the topology")]
    UnknownAnchor(SwitchId),

    /// The topology source could not produce a snapshot.
    #[error("topology unavailable: {0}")]
    TopologyUnavailable(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MetricError {
    #[error("delay '{0}' is missing the 'ms' unit suffix")]
    MissingUnit(String),

    #[error("delay '{0}' is not a non-negative number of milliseconds")]
    InvalidDelay(String),

    #[error("bandwidth {0} Mbit/s must be a positive number")]
    InvalidBandwidth(f64),

    #[error("bandwidth and delay must be supplied together")]
    Incomplete,
}

pub type Result<T> = std::result::Result<T, RoutingError>;
