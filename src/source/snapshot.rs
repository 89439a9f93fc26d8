//! Wire types for load-balancer state snapshots.
//!
//! These types match the JSON produced by the load balancer, both as the
//! `payload` of a push frame and as the body of the `/state` endpoint.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How the load balancer derives effective worker weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeightMode {
    #[default]
    Manual,
    Auto,
}

impl WeightMode {
    pub fn label(&self) -> &'static str {
        match self {
            WeightMode::Manual => "manual",
            WeightMode::Auto => "auto",
        }
    }
}

/// One point-in-time report of load-balancer state.
///
/// The three totals are cumulative since the balancer started (or since the
/// last experiment reset) and only ever grow between resets.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StateSnapshot {
    #[serde(default)]
    pub weight_mode: WeightMode,
    pub total_assigned: u64,
    pub total_ok: u64,
    pub total_fail: u64,
    #[serde(default)]
    pub workers: Vec<WorkerSnapshot>,
}

/// State of a single worker behind the balancer.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WorkerSnapshot {
    pub id: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub online: bool,

    #[serde(default)]
    pub reported_weight: f64,
    #[serde(default)]
    pub manual_weight: Option<f64>,
    #[serde(default)]
    pub auto_weight: Option<f64>,
    #[serde(default)]
    pub effective_weight: f64,

    #[serde(default)]
    pub assigned: u64,
    /// Share of all assignments, 0..100.
    #[serde(default)]
    pub assigned_pct: f64,
    #[serde(default)]
    pub ok: u64,
    #[serde(default)]
    pub fail: u64,
    #[serde(default)]
    pub avg_latency_ms: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Unix seconds of the last successful health probe.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<f64>,
}

/// Envelope of every frame sent over the push transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamMessage {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: Value,
}

impl StreamMessage {
    pub const STATE: &'static str = "state";

    /// Extract a state snapshot from a decoded frame.
    ///
    /// Returns `None` for any envelope that is not tagged `state`, or whose
    /// payload does not have the snapshot shape.
    pub fn into_state(value: Value) -> Option<StateSnapshot> {
        let message: StreamMessage = serde_json::from_value(value).ok()?;
        if message.kind != Self::STATE {
            return None;
        }
        serde_json::from_value(message.payload).ok()
    }
}
