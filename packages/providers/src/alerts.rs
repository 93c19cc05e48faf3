//! NWS active alerts for a point.

use async_trait::async_trait;
use backcountry_signal_models::{
    AlertSeverity, AlertsSignal, Coordinate, OfficialAlert, SignalStatus,
};
use backcountry_source::retry;
use serde_json::Value;

use crate::{AlertsProvider, Endpoint, ProviderError, str_at, time_at};

#[derive(Debug, Clone)]
pub struct NwsAlerts {
    endpoint: Endpoint,
}

impl NwsAlerts {
    #[must_use]
    pub const fn new(endpoint: Endpoint) -> Self {
        Self { endpoint }
    }
}

#[async_trait]
impl AlertsProvider for NwsAlerts {
    async fn fetch_alerts(&self, coord: &Coordinate) -> Result<AlertsSignal, ProviderError> {
        let url = format!("{}/alerts/active", self.endpoint.base_url);
        let point = format!("{:.4},{:.4}", coord.lat, coord.lon);
        let client = &self.endpoint.client;
        let body = retry::send_json(
            || {
                client
                    .get(&url)
                    .query(&[("point", point.as_str())])
                    .header(reqwest::header::ACCEPT, "application/geo+json")
            },
            &self.endpoint.policy,
        )
        .await?;
        let signal = normalize_alerts(&body)?;
        log::debug!("{} active alerts for {coord}", signal.alerts.len());
        Ok(signal)
    }
}

/// Normalizes an alerts feature collection. An empty collection is `ok`
/// with no alerts.
///
/// # Errors
///
/// Returns [`ProviderError::Normalization`] if `features` is missing.
pub fn normalize_alerts(body: &Value) -> Result<AlertsSignal, ProviderError> {
    let features = body
        .get("features")
        .and_then(Value::as_array)
        .ok_or_else(|| ProviderError::missing("features"))?;

    let alerts = features
        .iter()
        .filter_map(|f| f.get("properties"))
        .filter_map(|p| {
            let event = str_at(p, "/event")?.to_string();
            Some(OfficialAlert {
                event,
                headline: str_at(p, "/headline").map(ToString::to_string),
                severity: str_at(p, "/severity")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(AlertSeverity::Unknown),
                onset: time_at(p, "/onset").or_else(|| time_at(p, "/effective")),
                expires: time_at(p, "/ends").or_else(|| time_at(p, "/expires")),
                sender: str_at(p, "/senderName").map(ToString::to_string),
            })
        })
        .collect();

    Ok(AlertsSignal {
        status: SignalStatus::Ok,
        alerts,
    })
}
