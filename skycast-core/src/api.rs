use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::ApiError;
use crate::model::{CurrentConditions, ForecastDay, Location, Units};

pub mod openweather;

/// One logical weather lookup.
///
/// When coordinates are present they take precedence over the city name,
/// being more precise than a name-based lookup. The name is kept for
/// display either way.
#[derive(Debug, Clone)]
pub struct WeatherQuery {
    pub city: String,
    pub coords: Option<(f64, f64)>,
    pub units: Units,
}

impl WeatherQuery {
    pub fn by_name(city: impl Into<String>, units: Units) -> Self {
        WeatherQuery { city: city.into(), coords: None, units }
    }

    pub fn with_coords(mut self, lat: f64, lon: f64) -> Self {
        self.coords = Some((lat, lon));
        self
    }
}

/// The weather/geocoding provider seam.
///
/// The controller talks to this trait, never to a concrete client, so tests
/// can substitute canned responses.
#[async_trait]
pub trait WeatherApi: Send + Sync {
    async fn current_weather(&self, query: &WeatherQuery)
    -> Result<CurrentConditions, ApiError>;

    async fn five_day_forecast(&self, query: &WeatherQuery)
    -> Result<Vec<ForecastDay>, ApiError>;

    /// Forward geocoding, used by the search box autocomplete.
    async fn search_locations(&self, query: &str, limit: u8) -> Result<Vec<Location>, ApiError>;

    /// Reverse geocoding, used after device geolocation.
    async fn reverse_geocode(&self, lat: f64, lon: f64) -> Result<Location, ApiError>;
}

/// Ordered credential pool with a rotation cursor.
///
/// Owned by a client instance rather than living in module scope, so multiple
/// independent clients (and tests) get their own cursor. The cursor is shared
/// across concurrent requests on one client; advancing it is deliberately not
/// atomic with respect to a whole request; interleaving can cost an extra
/// rotation, never a wrong result. The only contract is that one logical request
/// tries every key at most once before giving up.
#[derive(Debug)]
pub struct KeyPool {
    keys: Vec<String>,
    cursor: AtomicUsize,
}

impl KeyPool {
    /// Build a pool from credentials in priority order. Blank entries are
    /// filtered out; an empty pool is a fatal configuration error.
    pub fn new(keys: Vec<String>) -> Result<Self, ApiError> {
        let keys: Vec<String> = keys.into_iter().filter(|k| !k.trim().is_empty()).collect();
        if keys.is_empty() {
            return Err(ApiError::NoCredentials);
        }
        Ok(KeyPool { keys, cursor: AtomicUsize::new(0) })
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// The credential at the cursor.
    pub fn current(&self) -> &str {
        &self.keys[self.cursor.load(Ordering::Relaxed) % self.keys.len()]
    }

    /// Advance the cursor to the next credential, wrapping at the end.
    pub fn advance(&self) {
        self.cursor.fetch_add(1, Ordering::Relaxed);
    }

    /// Index of the credential currently at the cursor.
    pub fn position(&self) -> usize {
        self.cursor.load(Ordering::Relaxed) % self.keys.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_pool_is_a_fatal_error() {
        assert!(matches!(KeyPool::new(vec![]), Err(ApiError::NoCredentials)));
        assert!(matches!(
            KeyPool::new(vec![String::new(), "   ".to_string()]),
            Err(ApiError::NoCredentials)
        ));
    }

    #[test]
    fn blank_credentials_are_filtered_at_startup() {
        let pool = KeyPool::new(vec!["".into(), "KEY1".into(), "  ".into(), "KEY2".into()])
            .expect("two usable keys");
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.current(), "KEY1");
    }

    #[test]
    fn advance_wraps_around() {
        let pool = KeyPool::new(vec!["A".into(), "B".into(), "C".into()]).expect("pool");
        assert_eq!(pool.current(), "A");
        pool.advance();
        assert_eq!(pool.current(), "B");
        pool.advance();
        pool.advance();
        assert_eq!(pool.current(), "A");
        assert_eq!(pool.position(), 0);
    }

    #[test]
    fn cursor_persists_across_lookups() {
        let pool = KeyPool::new(vec!["A".into(), "B".into()]).expect("pool");
        pool.advance();
        // The next logical request starts from wherever the last one stopped.
        assert_eq!(pool.current(), "B");
        assert_eq!(pool.current(), "B");
    }

    #[test]
    fn coords_take_precedence_flag_is_carried() {
        let query = WeatherQuery::by_name("Kyiv", Units::Metric).with_coords(50.45, 30.52);
        assert_eq!(query.coords, Some((50.45, 30.52)));
        assert_eq!(query.city, "Kyiv");
    }
}
