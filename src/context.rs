//! Ambient context: device location and local weather.
//!
//! Location, reverse geocode and weather are fetched as independent tasks
//! that each write their own slot. A failure leaves its slot empty; a
//! location denial leaves both empty for the rest of the session.
//! Subscribers are told about every write through a version counter.

use std::sync::{Arc, RwLock};

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::device::{GeoPosition, LocationProvider};
use crate::models::{LocationContext, PermissionKind, TemperatureUnit, WeatherContext};
use crate::permissions::PermissionGate;
use crate::weather::WeatherClient;

/// Point-in-time copy of both slots.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ContextSnapshot {
    pub location: Option<LocationContext>,
    pub weather: Option<WeatherContext>,
}

pub struct ContextTracker {
    location: RwLock<Option<LocationContext>>,
    weather: RwLock<Option<WeatherContext>>,
    version: watch::Sender<u64>,
}

impl Default for ContextTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextTracker {
    pub fn new() -> Self {
        let (version, _) = watch::channel(0);
        Self {
            location: RwLock::new(None),
            weather: RwLock::new(None),
            version,
        }
    }

    pub fn snapshot(&self) -> ContextSnapshot {
        ContextSnapshot {
            location: self.location.read().ok().and_then(|slot| slot.clone()),
            weather: self.weather.read().ok().and_then(|slot| slot.clone()),
        }
    }

    /// Receiver that changes whenever either slot is written.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }

    pub fn set_location(&self, location: LocationContext) {
        if let Ok(mut slot) = self.location.write() {
            *slot = Some(location);
        }
        self.bump();
    }

    pub fn set_weather(&self, weather: WeatherContext) {
        if let Ok(mut slot) = self.weather.write() {
            *slot = Some(weather);
        }
        self.bump();
    }

    fn bump(&self) {
        self.version.send_modify(|v| *v += 1);
    }

    /// Fetch position, then reverse geocode and weather concurrently.
    ///
    /// Never fails: every error is logged and leaves its slot as it was.
    pub async fn refresh(
        &self,
        gate: &PermissionGate,
        provider: &dyn LocationProvider,
        weather: Option<&WeatherClient>,
    ) {
        if !gate.request(PermissionKind::Location).await {
            return;
        }

        let position = match provider.current_position().await {
            Ok(position) => position,
            Err(e) => {
                tracing::warn!(error = %e, "Location fix failed");
                return;
            }
        };

        self.set_location(LocationContext {
            latitude: position.latitude,
            longitude: position.longitude,
            reverse_geocode: None,
        });

        tokio::join!(
            self.attach_address(provider, position),
            self.attach_weather(weather, position),
        );
    }

    async fn attach_address(&self, provider: &dyn LocationProvider, position: GeoPosition) {
        match provider.reverse_geocode(position).await {
            Ok(candidates) => {
                if let Some(address) = candidates.into_iter().next() {
                    self.set_location(LocationContext {
                        latitude: position.latitude,
                        longitude: position.longitude,
                        reverse_geocode: Some(address),
                    });
                }
            }
            Err(e) => tracing::warn!(error = %e, "Reverse geocode failed"),
        }
    }

    async fn attach_weather(&self, client: Option<&WeatherClient>, position: GeoPosition) {
        let Some(client) = client else {
            return;
        };
        match client
            .current(position.latitude, position.longitude, TemperatureUnit::Metric)
            .await
        {
            Ok(current) => self.set_weather(current.to_context()),
            Err(e) => tracing::warn!(error = %e, "Weather fetch failed"),
        }
    }

    /// Run [`ContextTracker::refresh`] in the background.
    pub fn spawn_refresh(
        self: &Arc<Self>,
        gate: Arc<PermissionGate>,
        provider: Arc<dyn LocationProvider>,
        weather: Option<Arc<WeatherClient>>,
    ) -> JoinHandle<()> {
        let tracker = self.clone();
        tokio::spawn(async move {
            tracker
                .refresh(&gate, provider.as_ref(), weather.as_deref())
                .await;
        })
    }
}
