//! Core library for the Skycast weather dashboard.
//!
//! This crate defines:
//! - Configuration & credential handling
//! - The OpenWeather client with key rotation and error classification
//! - Search history persistence and location formatting
//! - The controller orchestrating fetches for a dashboard view
//!
//! It is used by `skycast-cli`, but can also be reused by other front ends.

pub mod api;
pub mod config;
pub mod controller;
pub mod error;
pub mod format;
pub mod history;
pub mod locate;
pub mod model;
pub mod storage;

pub use api::openweather::OpenWeatherClient;
pub use api::{KeyPool, WeatherApi, WeatherQuery};
pub use config::Config;
pub use controller::{DashboardState, Debouncer, WeatherController, enrich_location};
pub use error::{ApiError, LocateError};
pub use format::{format_location_with_abbr, state_abbreviation};
pub use history::SearchHistory;
pub use locate::{IpLocator, LocationSource};
pub use model::{ConditionSummary, CurrentConditions, ForecastDay, Location, Theme, Units};
pub use storage::Storage;
