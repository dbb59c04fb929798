use serde::{Deserialize, Serialize};

use crate::error::MetricError;

/// Cost of a link for which no bandwidth/delay was supplied.
pub const UNIT_COST: f64 = 1.0;

const MS_PER_SECOND: f64 = 1_000.0;
const BPS_PER_MBPS: f64 = 1_000_000.0;

/// Observed metrics of one link direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkMetrics {
    /// Propagation delay, written as `<decimal>ms`.
    pub delay: String,
    /// Bandwidth in Mbit/s.
    pub bandwidth: f64,
}

/// Edge cost for a link direction.
///
/// Without metrics every link costs [`UNIT_COST`], which makes the solver
/// minimise hop count. With metrics the cost is `delay[s] / bandwidth[bit/s]`,
/// so low latency and high bandwidth are both preferred.
pub fn link_cost(metrics: Option<&LinkMetrics>) -> Result<f64, MetricError> {
    let Some(metrics) = metrics else {
        return Ok(UNIT_COST);
    };

    let delay_s = parse_delay(&metrics.delay)? / MS_PER_SECOND;
    let bandwidth_bps = parse_bandwidth(metrics.bandwidth)? * BPS_PER_MBPS;

    Ok(delay_s / bandwidth_bps)
}

/// Parses a delay such as `"0.05ms"` into milliseconds.
pub fn parse_delay(delay: &str) -> Result<f64, MetricError> {
    let trimmed = delay.trim();
    let value = trimmed
        .strip_suffix("ms")
        .ok_or_else(|| MetricError::MissingUnit(delay.to_string()))?;

    let millis: f64 = value
        .trim()
        .parse()
        .map_err(|_| MetricError::InvalidDelay(delay.to_string()))?;

    if !millis.is_finite() || millis < 0.0 {
        return Err(MetricError::InvalidDelay(delay.to_string()));
    }
    Ok(millis)
}

fn parse_bandwidth(mbps: f64) -> Result<f64, MetricError> {
    if mbps.is_finite() && mbps > 0.0 {
        Ok(mbps)
    } else {
        Err(MetricError::InvalidBandwidth(mbps))
    }
}
