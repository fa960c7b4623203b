//! Fetch orchestration for the dashboard view.
//!
//! The controller owns the view-facing state and guarantees three things the
//! presentation layer relies on:
//! - only the most recently requested fetch per target may update state
//!   (stale responses are discarded by a generation check),
//! - the loading flag only appears when a fetch outlives the loading delay,
//! - every failure resolves into a user-visible message, never a panic or an
//!   escaped error.

use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::{WeatherApi, WeatherQuery};
use crate::error::{ApiError, LocateError};
use crate::format::format_location_with_abbr;
use crate::history::SearchHistory;
use crate::locate::LocationSource;
use crate::model::{CurrentConditions, ForecastDay, Location, Units};
use crate::storage::Storage;

/// How long a fetch must stay outstanding before the loading indicator is
/// shown. Fetches that resolve sooner never flash a spinner.
pub const LOADING_DELAY: Duration = Duration::from_millis(2500);

/// Input silence required before an autocomplete query is dispatched.
pub const AUTOCOMPLETE_DEBOUNCE: Duration = Duration::from_millis(300);

const LOCATE_TIMEOUT: Duration = Duration::from_secs(10);

/// Everything the presentation layer renders.
#[derive(Debug, Clone, Default)]
pub struct DashboardState {
    pub city: String,
    pub conditions: Option<CurrentConditions>,
    pub forecast: Vec<ForecastDay>,
    pub loading_weather: bool,
    pub loading_forecast: bool,
    pub error_message: Option<String>,
}

enum LoadTarget {
    Weather,
    Forecast,
}

type ErrorCallback = dyn Fn(&str) + Send + Sync;

/// Enrich a raw geocoding result into the full shape persisted to history:
/// abbreviated display name, unabbreviated full name, lowercased search name.
pub fn enrich_location(mut raw: Location) -> Location {
    let display = format_location_with_abbr(Some(&raw));
    let search =
        if raw.name.is_empty() { display.to_lowercase() } else { raw.name.to_lowercase() };

    let mut full_parts = vec![raw.name.clone()];
    full_parts.extend(raw.state.clone());
    full_parts.extend(raw.country.clone());
    full_parts.retain(|part| !part.is_empty());

    raw.display_name = Some(display);
    raw.full_name = Some(full_parts.join(", "));
    raw.search_name = Some(search);
    raw
}

pub struct WeatherController {
    api: Arc<dyn WeatherApi>,
    locator: Arc<dyn LocationSource>,
    history: SearchHistory,
    storage: Storage,
    default_city: String,
    state: Arc<Mutex<DashboardState>>,
    weather_gen: Arc<AtomicU64>,
    forecast_gen: Arc<AtomicU64>,
    initialized: AtomicBool,
    debouncer: Debouncer,
    loading_delay: Duration,
    locate_timeout: Duration,
    on_error: Option<Box<ErrorCallback>>,
}

impl WeatherController {
    pub fn new(
        api: Arc<dyn WeatherApi>,
        locator: Arc<dyn LocationSource>,
        storage: Storage,
        default_city: impl Into<String>,
    ) -> Self {
        WeatherController {
            api,
            locator,
            history: SearchHistory::new(storage.clone()),
            storage,
            default_city: default_city.into(),
            state: Arc::new(Mutex::new(DashboardState::default())),
            weather_gen: Arc::new(AtomicU64::new(0)),
            forecast_gen: Arc::new(AtomicU64::new(0)),
            initialized: AtomicBool::new(false),
            debouncer: Debouncer::new(AUTOCOMPLETE_DEBOUNCE),
            loading_delay: LOADING_DELAY,
            locate_timeout: LOCATE_TIMEOUT,
            on_error: None,
        }
    }

    /// Override the loading-indicator delay. Used by tests.
    pub fn with_loading_delay(mut self, delay: Duration) -> Self {
        self.loading_delay = delay;
        self
    }

    /// Override the geolocation timeout. Used by tests.
    pub fn with_locate_timeout(mut self, timeout: Duration) -> Self {
        self.locate_timeout = timeout;
        self
    }

    /// Register a callback invoked with every user-facing error message, in
    /// addition to the message landing in [`DashboardState::error_message`].
    pub fn with_error_callback(
        mut self,
        callback: impl Fn(&str) + Send + Sync + 'static,
    ) -> Self {
        self.on_error = Some(Box::new(callback));
        self
    }

    /// Snapshot of the current view state.
    pub fn state(&self) -> DashboardState {
        self.state.lock().clone()
    }

    pub fn history(&self) -> &SearchHistory {
        &self.history
    }

    /// Dismiss the current error. Always clears fully, so a later error
    /// starts from a clean slate.
    pub fn clear_error(&self) {
        self.state.lock().error_message = None;
    }

    /// One-time startup flow: detect the device position, reverse-geocode it
    /// into the initial city, and record it. Any geolocation failure is
    /// non-fatal and falls back to the configured default city with an
    /// explanation. Returns the city the dashboard ends up showing.
    pub async fn initialize(&self, units: Units) -> String {
        if self.initialized.swap(true, Ordering::SeqCst) {
            return self.state.lock().city.clone();
        }

        match tokio::time::timeout(self.locate_timeout, self.locator.locate()).await {
            Ok(Ok((lat, lon))) => match self.api.reverse_geocode(lat, lon).await {
                Ok(raw) => {
                    info!(lat, lon, "geolocated device position");
                    let location = self.select_location(raw, units).await;
                    location.label().to_string()
                }
                Err(e) => self.fall_back_to_default(e.user_message(), units).await,
            },
            Ok(Err(e)) => self.fall_back_to_default(e.user_message(), units).await,
            Err(_) => {
                self.fall_back_to_default(LocateError::Timeout.user_message(), units).await
            }
        }
    }

    async fn fall_back_to_default(&self, reason: String, units: Units) -> String {
        let city = self.default_city.clone();
        let message = format!("{reason} Showing weather for {city} instead.");
        warn!(%city, "geolocation failed: {reason}");

        self.search(&city, units).await;

        {
            let mut state = self.state.lock();
            state.error_message = Some(match state.error_message.take() {
                // A fetch failure for the fallback city is worth keeping too.
                Some(existing) => format!("{message} {existing}"),
                None => message.clone(),
            });
        }
        if let Some(callback) = &self.on_error {
            callback(&message);
        }
        city
    }

    /// Fetch current conditions and forecast for a searched city name, and
    /// record the search in history when the lookup succeeds.
    pub async fn search(&self, city: &str, units: Units) {
        let (weather_ok, _) = tokio::join!(
            self.fetch_current_weather(city, units),
            self.fetch_five_day_forecast(city, units),
        );

        if weather_ok {
            if let Err(e) = self.history.add(city) {
                warn!(city, "could not record search in history: {e:#}");
            }
        }
    }

    /// The user picked a concrete geocoding result: enrich it, persist it as
    /// the last selected location and into history, then fetch by its
    /// coordinates. Returns the enriched location.
    pub async fn select_location(&self, raw: Location, units: Units) -> Location {
        let location = enrich_location(raw);

        if let Err(e) = self.storage.set_last_selected_location(&location) {
            warn!("could not persist last selected location: {e:#}");
        }
        if let Err(e) = self.history.add(location.clone()) {
            warn!("could not record selection in history: {e:#}");
        }

        let city = location.label().to_string();
        tokio::join!(
            self.fetch_current_weather(&city, units),
            self.fetch_five_day_forecast(&city, units),
        );

        location
    }

    /// Debounced autocomplete lookup. `None` means a newer query superseded
    /// this one before its debounce window elapsed; the caller should simply
    /// drop it.
    pub async fn suggest(
        &self,
        query: &str,
        limit: u8,
    ) -> Option<Result<Vec<Location>, ApiError>> {
        if !self.debouncer.acquire().await {
            return None;
        }
        Some(self.api.search_locations(query, limit).await)
    }

    /// Fetch current conditions for a city. Returns whether this fetch ended
    /// up owning the state update (false for failures and stale responses).
    pub async fn fetch_current_weather(&self, city: &str, units: Units) -> bool {
        let generation = self.weather_gen.fetch_add(1, Ordering::SeqCst) + 1;
        {
            let mut state = self.state.lock();
            state.city = city.to_string();
            state.loading_weather = false;
        }

        let timer = arm_loading_timer(
            Arc::clone(&self.state),
            Arc::clone(&self.weather_gen),
            generation,
            self.loading_delay,
            LoadTarget::Weather,
        );

        let result = self.api.current_weather(&self.query_for(city, units)).await;
        timer.abort();

        let mut state = self.state.lock();
        if self.weather_gen.load(Ordering::SeqCst) != generation {
            debug!(city, "discarding stale weather response");
            return false;
        }
        state.loading_weather = false;

        match result {
            Ok(conditions) => {
                state.conditions = Some(conditions);
                state.error_message = None;
                true
            }
            Err(e) => {
                warn!(city, error = %e, "weather fetch failed");
                state.conditions = None;
                let message = e.user_message();
                state.error_message = Some(message.clone());
                drop(state);
                if let Some(callback) = &self.on_error {
                    callback(&message);
                }
                false
            }
        }
    }

    /// Fetch the 5-day forecast for a city, under the same generation and
    /// loading rules as the current-weather target.
    pub async fn fetch_five_day_forecast(&self, city: &str, units: Units) -> bool {
        let generation = self.forecast_gen.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.lock().loading_forecast = false;

        let timer = arm_loading_timer(
            Arc::clone(&self.state),
            Arc::clone(&self.forecast_gen),
            generation,
            self.loading_delay,
            LoadTarget::Forecast,
        );

        let result = self.api.five_day_forecast(&self.query_for(city, units)).await;
        timer.abort();

        let mut state = self.state.lock();
        if self.forecast_gen.load(Ordering::SeqCst) != generation {
            debug!(city, "discarding stale forecast response");
            return false;
        }
        state.loading_forecast = false;

        match result {
            Ok(days) => {
                state.forecast = days;
                true
            }
            Err(e) => {
                warn!(city, error = %e, "forecast fetch failed");
                state.forecast = Vec::new();
                let message = e.user_message();
                state.error_message = Some(message.clone());
                drop(state);
                if let Some(callback) = &self.on_error {
                    callback(&message);
                }
                false
            }
        }
    }

    /// Build the provider query, opportunistically attaching coordinates from
    /// the last selected location when its display name matches the requested
    /// city. A mismatch silently falls back to a name lookup.
    fn query_for(&self, city: &str, units: Units) -> WeatherQuery {
        let mut query = WeatherQuery::by_name(city, units);

        if let Some(cached) = self.storage.last_selected_location() {
            if cached.display_name.as_deref() == Some(city) {
                if let Some((lat, lon)) = cached.coords() {
                    debug!(city, lat, lon, "using cached coordinates");
                    query = query.with_coords(lat, lon);
                }
            }
        }

        query
    }
}

fn arm_loading_timer(
    state: Arc<Mutex<DashboardState>>,
    counter: Arc<AtomicU64>,
    generation: u64,
    delay: Duration,
    target: LoadTarget,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        // Only the fetch that armed this timer may show its indicator.
        if counter.load(Ordering::SeqCst) != generation {
            return;
        }
        let mut state = state.lock();
        match target {
            LoadTarget::Weather => state.loading_weather = true,
            LoadTarget::Forecast => state.loading_forecast = true,
        }
    })
}

/// Generation-counted debounce: `acquire` resolves to true only for the most
/// recent caller once the quiet window has elapsed.
#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    generation: Arc<AtomicU64>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Debouncer { delay, generation: Arc::new(AtomicU64::new(0)) }
    }

    /// Wait out the quiet window. Returns false when a newer `acquire`
    /// superseded this one in the meantime.
    pub async fn acquire(&self) -> bool {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(self.delay).await;
        self.generation.load(Ordering::SeqCst) == generation
    }
}
