use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Timelike, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

use crate::api::{KeyPool, WeatherApi, WeatherQuery};
use crate::error::ApiError;
use crate::model::{ConditionSummary, CurrentConditions, ForecastDay, Location};

pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org";

const ICON_URL_BASE: &str = "https://openweathermap.org/img/wn";
const FORECAST_DAY_CAP: usize = 5;

/// OpenWeather client with credential rotation.
///
/// All four endpoints go through [`request`](Self::request), which retries a
/// logical request across the key pool before giving up.
#[derive(Debug)]
pub struct OpenWeatherClient {
    http: Client,
    keys: KeyPool,
    base_url: String,
}

impl OpenWeatherClient {
    pub fn new(keys: Vec<String>) -> Result<Self, ApiError> {
        Self::with_base_url(keys, DEFAULT_BASE_URL)
    }

    /// Point the client at a different host. Used by tests.
    pub fn with_base_url(keys: Vec<String>, base_url: impl Into<String>) -> Result<Self, ApiError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(OpenWeatherClient { http: Client::new(), keys: KeyPool::new(keys)?, base_url })
    }

    /// The credential pool, exposed so callers can observe rotation.
    pub fn keys(&self) -> &KeyPool {
        &self.keys
    }

    /// Execute one logical request, rotating credentials on rate limiting or
    /// transport failure. Returns the parsed body alongside the HTTP status;
    /// classification of structured errors is per-endpoint.
    async fn request(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<(StatusCode, serde_json::Value), ApiError> {
        let url = format!("{}{}", self.base_url, path);
        let mut last_error: Option<ApiError> = None;

        for attempt in 0..self.keys.len() {
            let key = self.keys.current().to_string();
            match self.attempt(&url, params, &key).await {
                Ok((status, body)) if is_rate_limited(status, &body) => {
                    debug!(attempt, "credential rate limited, rotating");
                    self.keys.advance();
                }
                Ok(ok) => return Ok(ok),
                Err(e) => {
                    debug!(attempt, error = %e, "request failed, rotating");
                    last_error = Some(e);
                    self.keys.advance();
                }
            }
        }

        Err(last_error.unwrap_or(ApiError::RateLimited))
    }

    async fn attempt(
        &self,
        url: &str,
        params: &[(&str, String)],
        key: &str,
    ) -> Result<(StatusCode, serde_json::Value), ApiError> {
        let response = self.http.get(url).query(params).query(&[("appid", key)]).send().await?;
        let status = response.status();
        let text = response.text().await?;

        let body = serde_json::from_str(&text)
            .map_err(|e| ApiError::InvalidResponse(format!("response was not JSON: {e}")))?;
        Ok((status, body))
    }
}

fn location_params(query: &WeatherQuery) -> Vec<(&'static str, String)> {
    // Coordinates beat the name when both are available.
    match query.coords {
        Some((lat, lon)) => vec![("lat", lat.to_string()), ("lon", lon.to_string())],
        None => vec![("q", query.city.clone())],
    }
}

/// OpenWeather signals its status both in the HTTP code and in a `cod` body
/// field that is a number on some endpoints and a string on others.
fn cod_of(body: &serde_json::Value) -> Option<u16> {
    let cod = body.get("cod")?;
    cod.as_u64()
        .map(|c| c as u16)
        .or_else(|| cod.as_str().and_then(|s| s.parse().ok()))
}

fn is_rate_limited(status: StatusCode, body: &serde_json::Value) -> bool {
    if status == StatusCode::TOO_MANY_REQUESTS || cod_of(body) == Some(429) {
        return true;
    }
    body.get("message")
        .and_then(|m| m.as_str())
        .is_some_and(|m| m.contains("limit"))
}

/// Classify a structured-but-unsuccessful weather/forecast body.
fn classify(status: StatusCode, body: &serde_json::Value) -> Result<(), ApiError> {
    let cod = cod_of(body);
    let succeeded = match cod {
        Some(code) => code == 200,
        None => status.is_success(),
    };
    if succeeded {
        return Ok(());
    }

    let code = cod.unwrap_or(status.as_u16());
    let message =
        body.get("message").and_then(|m| m.as_str()).unwrap_or_default().to_string();

    Err(match code {
        404 => ApiError::NotFound,
        401 => ApiError::Auth,
        429 => ApiError::RateLimited,
        _ => ApiError::Provider { code: code.to_string(), message },
    })
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    #[serde(default)]
    temp_min: Option<f64>,
    #[serde(default)]
    temp_max: Option<f64>,
    #[serde(default)]
    feels_like: f64,
    #[serde(default)]
    humidity: u8,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    main: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    icon: String,
}

#[derive(Debug, Deserialize, Default)]
struct OwWind {
    #[serde(default)]
    speed: f64,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    main: OwMain,
    weather: Vec<OwWeather>,
    #[serde(default)]
    wind: OwWind,
}

#[derive(Debug, Deserialize)]
struct OwForecastEntry {
    dt: i64,
    main: OwMain,
    weather: Vec<OwWeather>,
    #[serde(default)]
    wind: OwWind,
    /// Probability of precipitation, 0.0–1.0.
    #[serde(default)]
    pop: f64,
}

#[derive(Debug, Deserialize, Default)]
struct OwCity {
    /// Shift from UTC in seconds for the requested place.
    #[serde(default)]
    timezone: i32,
}

#[derive(Debug, Deserialize)]
struct OwForecastResponse {
    #[serde(default)]
    city: OwCity,
    list: Vec<OwForecastEntry>,
}

#[derive(Debug, Deserialize)]
struct OwGeoEntry {
    name: String,
    lat: f64,
    lon: f64,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    country: Option<String>,
}

impl From<OwGeoEntry> for Location {
    fn from(entry: OwGeoEntry) -> Self {
        Location {
            name: entry.name,
            state: entry.state,
            country: entry.country,
            lat: Some(entry.lat),
            lon: Some(entry.lon),
            ..Location::default()
        }
    }
}

fn condition_of(weather: &[OwWeather]) -> ConditionSummary {
    weather.first().map_or_else(ConditionSummary::default, |w| ConditionSummary {
        main: w.main.clone(),
        description: w.description.clone(),
        icon: w.icon.clone(),
    })
}

fn icon_url(icon: &str) -> String {
    if icon.is_empty() {
        String::new()
    } else {
        format!("{ICON_URL_BASE}/{icon}@2x.png")
    }
}

/// Fold the provider's 3-hour interval list into calendar days, using the
/// place's own UTC offset so day boundaries land on local midnight.
///
/// Per day: running max/min temperature, max wind, max precipitation
/// probability, and the condition of the entry nearest local noon.
fn group_into_days(entries: &[OwForecastEntry], tz_offset_secs: i32) -> Vec<ForecastDay> {
    struct DayFold {
        date: NaiveDate,
        temp_max: f64,
        temp_min: f64,
        wind_speed: f64,
        pop: f64,
        condition: ConditionSummary,
        noon_distance: i64,
    }

    let offset = FixedOffset::east_opt(tz_offset_secs).unwrap_or_else(|| Utc.fix());
    let mut days: Vec<DayFold> = Vec::new();

    for entry in entries {
        let Some(when) = DateTime::<Utc>::from_timestamp(entry.dt, 0) else {
            continue;
        };
        let local = when.with_timezone(&offset);
        let date = local.date_naive();
        let noon_distance =
            (i64::from(local.time().num_seconds_from_midnight()) - 43_200).abs();

        let high = entry.main.temp_max.unwrap_or(entry.main.temp);
        let low = entry.main.temp_min.unwrap_or(entry.main.temp);

        match days.iter_mut().find(|d| d.date == date) {
            Some(day) => {
                day.temp_max = day.temp_max.max(high);
                day.temp_min = day.temp_min.min(low);
                day.wind_speed = day.wind_speed.max(entry.wind.speed);
                day.pop = day.pop.max(entry.pop);
                if noon_distance < day.noon_distance {
                    day.condition = condition_of(&entry.weather);
                    day.noon_distance = noon_distance;
                }
            }
            None => days.push(DayFold {
                date,
                temp_max: high,
                temp_min: low,
                wind_speed: entry.wind.speed,
                pop: entry.pop,
                condition: condition_of(&entry.weather),
                noon_distance,
            }),
        }
    }

    days.truncate(FORECAST_DAY_CAP);
    days.into_iter()
        .map(|day| ForecastDay {
            date: day.date,
            temp_max: day.temp_max,
            temp_min: day.temp_min,
            condition: day.condition,
            wind_speed: day.wind_speed,
            precipitation_chance: (day.pop * 100.0).clamp(0.0, 100.0).round() as u8,
        })
        .collect()
}

#[async_trait]
impl WeatherApi for OpenWeatherClient {
    async fn current_weather(
        &self,
        query: &WeatherQuery,
    ) -> Result<CurrentConditions, ApiError> {
        let mut params = location_params(query);
        params.push(("units", query.units.as_str().to_string()));

        let (status, body) = self.request("/data/2.5/weather", &params).await?;
        classify(status, &body)?;

        let parsed: OwCurrentResponse = serde_json::from_value(body)
            .map_err(|e| ApiError::InvalidResponse(format!("current weather payload: {e}")))?;

        let condition = condition_of(&parsed.weather);
        Ok(CurrentConditions {
            temperature: parsed.main.temp,
            feels_like: parsed.main.feels_like,
            humidity: parsed.main.humidity,
            wind_speed: parsed.wind.speed,
            condition_main: condition.main,
            icon_url: icon_url(&condition.icon),
        })
    }

    async fn five_day_forecast(
        &self,
        query: &WeatherQuery,
    ) -> Result<Vec<ForecastDay>, ApiError> {
        let mut params = location_params(query);
        params.push(("units", query.units.as_str().to_string()));

        let (status, body) = self.request("/data/2.5/forecast", &params).await?;
        classify(status, &body)?;

        let parsed: OwForecastResponse = serde_json::from_value(body)
            .map_err(|e| ApiError::InvalidResponse(format!("forecast payload: {e}")))?;

        Ok(group_into_days(&parsed.list, parsed.city.timezone))
    }

    async fn search_locations(
        &self,
        query: &str,
        limit: u8,
    ) -> Result<Vec<Location>, ApiError> {
        let params = [("q", query.to_string()), ("limit", limit.to_string())];
        let (status, body) = self.request("/geo/1.0/direct", &params).await?;

        if !body.is_array() {
            classify(status, &body)?;
            return Err(ApiError::InvalidResponse("geocoding payload was not a list".into()));
        }

        let raw: Vec<OwGeoEntry> = serde_json::from_value(body)
            .map_err(|e| ApiError::InvalidResponse(format!("geocoding payload: {e}")))?;
        if raw.is_empty() {
            return Err(ApiError::NotFound);
        }

        Ok(raw.into_iter().map(Location::from).collect())
    }

    async fn reverse_geocode(&self, lat: f64, lon: f64) -> Result<Location, ApiError> {
        let params =
            [("lat", lat.to_string()), ("lon", lon.to_string()), ("limit", "1".to_string())];
        let (status, body) = self.request("/geo/1.0/reverse", &params).await?;

        if !body.is_array() {
            classify(status, &body)?;
            return Err(ApiError::InvalidResponse("geocoding payload was not a list".into()));
        }

        let mut raw: Vec<OwGeoEntry> = serde_json::from_value(body)
            .map_err(|e| ApiError::InvalidResponse(format!("geocoding payload: {e}")))?;
        if raw.is_empty() {
            return Err(ApiError::NoGeocodeMatch);
        }

        Ok(Location::from(raw.remove(0)))
    }
}
