use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Measurement system passed to the provider as the `units` query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    #[default]
    Metric,
    Imperial,
    Standard,
}

impl Units {
    pub fn as_str(&self) -> &'static str {
        match self {
            Units::Metric => "metric",
            Units::Imperial => "imperial",
            Units::Standard => "standard",
        }
    }

    /// Label for temperatures reported under this unit system.
    pub fn temperature_label(&self) -> &'static str {
        match self {
            Units::Metric => "°C",
            Units::Imperial => "°F",
            Units::Standard => "K",
        }
    }

    /// Label for wind speeds reported under this unit system.
    ///
    /// The provider switches wind units together with temperature: metric and
    /// standard report m/s, imperial reports mph.
    pub fn wind_speed_label(&self) -> &'static str {
        match self {
            Units::Imperial => "mph",
            Units::Metric | Units::Standard => "m/s",
        }
    }
}

impl std::fmt::Display for Units {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for Units {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "metric" => Ok(Units::Metric),
            "imperial" => Ok(Units::Imperial),
            "standard" => Ok(Units::Standard),
            _ => Err(anyhow::anyhow!(
                "Unknown unit system '{value}'. Supported: metric, imperial, standard."
            )),
        }
    }
}

/// A geocoded place.
///
/// Call sites populate different subsets of these fields: geocoding results
/// carry `name`/`state`/`country`/coordinates, history entries normalized
/// from a bare search string carry only the display fields. The controller
/// enriches a raw result into a full value before persisting it.
///
/// Field names serialize in camelCase so files written by earlier builds of
/// the dashboard keep deserializing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Location {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lon: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    /// Lowercased form of `name` (or `display_name`) used for equality checks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_name: Option<String>,
}

impl Location {
    /// Coordinates, when both axes are present.
    pub fn coords(&self) -> Option<(f64, f64)> {
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        }
    }

    /// The name shown to the user, falling back to the raw name.
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }

    /// Lowercased key used for history equality and removal.
    pub fn search_key(&self) -> String {
        if let Some(search) = &self.search_name {
            return search.to_lowercase();
        }
        if let Some(display) = &self.display_name {
            return display.to_lowercase();
        }
        self.name.to_lowercase()
    }
}

impl From<&str> for Location {
    /// Normalize a bare search string into a minimal history entry.
    fn from(input: &str) -> Self {
        Location {
            name: input.to_string(),
            display_name: Some(input.to_string()),
            full_name: Some(input.to_string()),
            search_name: Some(input.to_lowercase()),
            ..Location::default()
        }
    }
}

impl From<String> for Location {
    fn from(input: String) -> Self {
        Location::from(input.as_str())
    }
}

/// Current conditions for one place.
///
/// Fully replaced on every successful fetch and cleared on failure; never
/// merged with a previous snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentConditions {
    pub temperature: f64,
    pub feels_like: f64,
    pub humidity: u8,
    pub wind_speed: f64,
    pub condition_main: String,
    pub icon_url: String,
}

/// Condition summary attached to a forecast day.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConditionSummary {
    pub main: String,
    pub description: String,
    pub icon: String,
}

/// One calendar day folded out of the provider's 3-hour interval list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastDay {
    pub date: NaiveDate,
    pub temp_max: f64,
    pub temp_min: f64,
    pub condition: ConditionSummary,
    pub wind_speed: f64,
    /// Chance of precipitation, 0–100.
    pub precipitation_chance: u8,
}

/// Persisted theme preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }
}

impl TryFrom<&str> for Theme {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            _ => Err(anyhow::anyhow!("Unknown theme '{value}'. Supported: light, dark.")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn units_roundtrip_through_str() {
        for units in [Units::Metric, Units::Imperial, Units::Standard] {
            let parsed = Units::try_from(units.as_str()).expect("roundtrip should succeed");
            assert_eq!(units, parsed);
        }
    }

    #[test]
    fn imperial_wind_is_mph() {
        assert_eq!(Units::Imperial.wind_speed_label(), "mph");
        assert_eq!(Units::Metric.wind_speed_label(), "m/s");
        assert_eq!(Units::Standard.wind_speed_label(), "m/s");
    }

    #[test]
    fn bare_string_normalizes_into_minimal_location() {
        let loc = Location::from("Kyiv");
        assert_eq!(loc.name, "Kyiv");
        assert_eq!(loc.display_name.as_deref(), Some("Kyiv"));
        assert_eq!(loc.full_name.as_deref(), Some("Kyiv"));
        assert_eq!(loc.search_name.as_deref(), Some("kyiv"));
        assert!(loc.coords().is_none());
    }

    #[test]
    fn search_key_prefers_search_name() {
        let loc = Location {
            name: "Springfield".into(),
            display_name: Some("Springfield, IL, US".into()),
            search_name: Some("springfield".into()),
            ..Location::default()
        };
        assert_eq!(loc.search_key(), "springfield");
    }

    #[test]
    fn search_key_falls_back_to_display_then_name() {
        let with_display = Location {
            name: "Springfield".into(),
            display_name: Some("Springfield, IL, US".into()),
            ..Location::default()
        };
        assert_eq!(with_display.search_key(), "springfield, il, us");

        let bare = Location { name: "Springfield".into(), ..Location::default() };
        assert_eq!(bare.search_key(), "springfield");
    }

    #[test]
    fn location_serializes_with_camel_case_keys() {
        let loc = Location::from("Oslo");
        let json = serde_json::to_value(&loc).expect("serialize");
        assert!(json.get("displayName").is_some());
        assert!(json.get("searchName").is_some());
        assert!(json.get("display_name").is_none());
    }

    #[test]
    fn unknown_units_error_lists_supported() {
        let err = Units::try_from("nautical").unwrap_err();
        assert!(err.to_string().contains("metric, imperial, standard"));
    }
}
