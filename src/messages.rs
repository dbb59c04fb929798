use serde::{Deserialize, Deserializer, Serialize};
use std::net::IpAddr;

use crate::error::MetricError;
use crate::network::metrics::LinkMetrics;
use crate::{SubnetId, SwitchId};

/// Body of a routing computation request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouteRequest {
    pub networks: Vec<NetworkEntity>,
    #[serde(default)]
    pub links: Vec<AnnotatedLink>,
}

/// A switch together with the subnets directly attached to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkEntity {
    pub switch_id: SwitchId,
    #[serde(default)]
    pub subnets: Vec<SubnetId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchEndpoint {
    pub id: SwitchId,
    #[serde(default, deserialize_with = "deserialize_endpoint_addr")]
    pub ip_addr: Option<IpAddr>,
}

/// A link as described by the caller: endpoint addresses plus optional
/// metrics for the `src_switch -> dst_switch` direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedLink {
    pub src_switch: SwitchEndpoint,
    pub dst_switch: SwitchEndpoint,
    /// Bandwidth in Mbit/s.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bw: Option<f64>,
    /// Propagation delay, e.g. `"2ms"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<String>,
}

impl AnnotatedLink {
    /// Metrics for this direction, `None` when the link is unweighted.
    pub fn metrics(&self) -> Result<Option<LinkMetrics>, MetricError> {
        match (&self.delay, self.bw) {
            (None, None) => Ok(None),
            (Some(delay), Some(bandwidth)) => Ok(Some(LinkMetrics {
                delay: delay.clone(),
                bandwidth,
            })),
            _ => Err(MetricError::Incomplete),
        }
    }
}

/// One entry of the computed routing table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteRecord {
    pub switch_id: SwitchId,
    pub destination: SubnetId,
    pub gateway: IpAddr,
}

// Switch interfaces are usually configured as "addr/prefix"; only the
// address part is usable as a gateway.
fn deserialize_endpoint_addr<'de, D>(deserializer: D) -> Result<Option<IpAddr>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    let Some(raw) = raw else {
        return Ok(None);
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }

    if let Ok(addr) = raw.parse::<IpAddr>() {
        return Ok(Some(addr));
    }
    raw.parse::<ipnet::IpNet>()
        .map(|net| Some(net.addr()))
        .map_err(|_| serde::de::Error::custom(format!("invalid endpoint address '{}'", raw)))
}
