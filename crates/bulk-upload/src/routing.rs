//! Destination routing by processed index.

use crate::sink::RemoteTier;
use chrono::{Duration, Utc};

/// Default share of the processing cap routed to the primary store only.
pub const DEFAULT_PRIMARY_ONLY_FRACTION: f64 = 0.10;

/// Where one payload goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub payload_name: String,
    /// `None` for primary-only payloads.
    pub remote: Option<RemoteTier>,
}

/// Splits records between primary-only and primary plus remote tier.
///
/// Records whose processed index falls in the last `primary_only_fraction` of the
/// processing cap stay primary-only; all others are also sent to `remote`.
#[derive(Debug, Clone)]
pub struct RoutingPolicy {
    pub primary_only_fraction: f64,
    pub primary_payload_name: String,
    pub tiered_payload_name: String,
    pub remote: RemoteTier,
}

impl Default for RoutingPolicy {
    fn default() -> Self {
        Self {
            primary_only_fraction: DEFAULT_PRIMARY_ONLY_FRACTION,
            primary_payload_name: "cover1.png".to_string(),
            tiered_payload_name: "cover2.png".to_string(),
            remote: RemoteTier::new("conf-identifier", Utc::now() - Duration::days(1)),
        }
    }
}

impl RoutingPolicy {
    /// First index that is routed primary-only for the given cap.
    ///
    /// An index is primary-only when `index >= cap * (1 - fraction)`; for
    /// integer indices that is the ceiling of the product.
    pub fn primary_only_from(&self, cap: u64) -> u64 {
        let boundary = cap as f64 * (1.0 - self.primary_only_fraction);
        (boundary.ceil().max(0.0) as u64).min(cap)
    }

    pub fn route(&self, index: u64, cap: u64) -> Destination {
        if index >= self.primary_only_from(cap) {
            Destination {
                payload_name: self.primary_payload_name.clone(),
                remote: None,
            }
        } else {
            Destination {
                payload_name: self.tiered_payload_name.clone(),
                remote: Some(self.remote.clone()),
            }
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.primary_only_fraction) {
            return Err(format!(
                "primary-only fraction must be within [0, 1], got {}",
                self.primary_only_fraction
            ));
        }
        if self.primary_payload_name.is_empty() || self.tiered_payload_name.is_empty() {
            return Err("payload names must not be empty".to_string());
        }
        Ok(())
    }
}
