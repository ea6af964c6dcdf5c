//! Health monitor mapping.

use std::fmt;

use lbaas_common::descriptor::attrs;
use lbaas_common::{Descriptor, LbaasError, LbaasResult, ResourceKey, ResourceKind};
use tracing::error;

use super::{ModelAdapter, MONITOR_NAME_PREFIX};
use crate::model::{HealthMonitor, LoadBalancer};

/// Status code accepted when none (or an unparsable one) is configured.
pub const DEFAULT_EXPECTED_CODE: u32 = 200;

/// Accepted HTTP status codes of a monitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpectedCodes {
    /// Explicit list, `"200,202"`
    List(Vec<u32>),
    /// Inclusive range, `"200-299"`
    Range(u32, u32),
    /// One code, `"200"`
    Single(u32),
}

impl ExpectedCodes {
    /// Parses the configured expected codes.
    ///
    /// A comma after the first character makes a list, a dash after the
    /// first character makes a range, anything else is a single code.
    pub fn parse(input: &str) -> LbaasResult<Self> {
        let parse_code = |s: &str| {
            s.trim().parse::<u32>().map_err(|e| {
                LbaasError::mapping("expected_codes", format!("'{}': {}", input, e))
            })
        };

        if input.find(',').is_some_and(|i| i > 0) {
            let codes = input
                .split(',')
                .map(parse_code)
                .collect::<LbaasResult<Vec<_>>>()?;
            return Ok(ExpectedCodes::List(codes));
        }

        if input.find('-').is_some_and(|i| i > 0) {
            let mut bounds = input.split('-');
            let low = parse_code(bounds.next().unwrap_or_default())?;
            let high = parse_code(bounds.next().unwrap_or_default())?;
            return Ok(ExpectedCodes::Range(low, high));
        }

        Ok(ExpectedCodes::Single(parse_code(input)?))
    }

    /// Parses the codes of a monitor, logging and falling back to the
    /// default code on failure.
    pub fn from_monitor(healthmonitor: &HealthMonitor) -> Self {
        let Some(input) = healthmonitor.expected_codes.as_deref() else {
            return ExpectedCodes::Single(DEFAULT_EXPECTED_CODE);
        };
        match Self::parse(input) {
            Ok(codes) => codes,
            Err(e) => {
                error!("Health monitor {}: {}", healthmonitor.id, e);
                ExpectedCodes::Single(DEFAULT_EXPECTED_CODE)
            }
        }
    }

    /// Returns the response pattern the device matches against.
    pub fn recv_pattern(&self) -> String {
        format!("HTTP/1.(0|1) {}", self)
    }

    /// Returns true if the status code is accepted.
    pub fn accepts(&self, code: u32) -> bool {
        match self {
            ExpectedCodes::List(codes) => codes.contains(&code),
            ExpectedCodes::Range(low, high) => (*low..=*high).contains(&code),
            ExpectedCodes::Single(expected) => *expected == code,
        }
    }
}

impl fmt::Display for ExpectedCodes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpectedCodes::List(codes) => {
                let joined: Vec<String> = codes.iter().map(u32::to_string).collect();
                write!(f, "({})", joined.join("|"))
            }
            ExpectedCodes::Range(low, high) => write!(f, "[{}-{}]", low, high),
            ExpectedCodes::Single(code) => write!(f, "{}", code),
        }
    }
}

/// Returns the device monitor kind for a monitor type.
pub fn monitor_kind(healthmonitor: &HealthMonitor) -> ResourceKind {
    match healthmonitor.monitor_type.as_deref() {
        Some("HTTPS") => ResourceKind::HttpsMonitor,
        Some("TCP") => ResourceKind::TcpMonitor,
        _ => ResourceKind::HttpMonitor,
    }
}

fn is_http(healthmonitor: &HealthMonitor) -> bool {
    matches!(healthmonitor.monitor_type.as_deref(), Some("HTTP") | Some("HTTPS"))
}

impl ModelAdapter {
    /// Returns the device key of a health monitor.
    pub fn monitor_key(&self, loadbalancer: &LoadBalancer, healthmonitor: &HealthMonitor) -> ResourceKey {
        ResourceKey::new(
            self.partition(loadbalancer),
            format!("{}{}", MONITOR_NAME_PREFIX, healthmonitor.id),
        )
    }

    /// Maps a health monitor.
    pub fn health_monitor(&self, loadbalancer: &LoadBalancer, healthmonitor: &HealthMonitor) -> Descriptor {
        let mut d = Descriptor::new()
            .with(attrs::NAME, format!("{}{}", MONITOR_NAME_PREFIX, healthmonitor.id))
            .with(attrs::PARTITION, self.partition(loadbalancer));

        if is_http(healthmonitor) {
            let path = healthmonitor.url_path.as_deref().unwrap_or("/");
            // Escapes are literal: the device expands them itself.
            d.insert("send", format!("GET {} HTTP/1.0\\r\\n\\r\\n", path));
            d.insert("recv", ExpectedCodes::from_monitor(healthmonitor).recv_pattern());
        }

        if let Some(delay) = healthmonitor.delay {
            d.insert("interval", delay);
        }

        if let (Some(retries), Some(timeout)) = (healthmonitor.max_retries, healthmonitor.timeout) {
            d.insert("timeout", u64::from(retries) * u64::from(timeout));
        }

        d
    }
}
