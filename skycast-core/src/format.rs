//! Human-readable "City, Region, Country" formatting.
//!
//! The abbreviation tables must stay stable: the strings they produce are
//! persisted in search history, and changing them would orphan old entries.

use crate::model::Location;

const US_STATES: &[(&str, &str)] = &[
    ("alabama", "AL"),
    ("alaska", "AK"),
    ("arizona", "AZ"),
    ("arkansas", "AR"),
    ("california", "CA"),
    ("colorado", "CO"),
    ("connecticut", "CT"),
    ("delaware", "DE"),
    ("florida", "FL"),
    ("georgia", "GA"),
    ("hawaii", "HI"),
    ("idaho", "ID"),
    ("illinois", "IL"),
    ("indiana", "IN"),
    ("iowa", "IA"),
    ("kansas", "KS"),
    ("kentucky", "KY"),
    ("louisiana", "LA"),
    ("maine", "ME"),
    ("maryland", "MD"),
    ("massachusetts", "MA"),
    ("michigan", "MI"),
    ("minnesota", "MN"),
    ("mississippi", "MS"),
    ("missouri", "MO"),
    ("montana", "MT"),
    ("nebraska", "NE"),
    ("nevada", "NV"),
    ("new hampshire", "NH"),
    ("new jersey", "NJ"),
    ("new mexico", "NM"),
    ("new york", "NY"),
    ("north carolina", "NC"),
    ("north dakota", "ND"),
    ("ohio", "OH"),
    ("oklahoma", "OK"),
    ("oregon", "OR"),
    ("pennsylvania", "PA"),
    ("rhode island", "RI"),
    ("south carolina", "SC"),
    ("south dakota", "SD"),
    ("tennessee", "TN"),
    ("texas", "TX"),
    ("utah", "UT"),
    ("vermont", "VT"),
    ("virginia", "VA"),
    ("washington", "WA"),
    ("west virginia", "WV"),
    ("wisconsin", "WI"),
    ("wyoming", "WY"),
    ("district of columbia", "DC"),
];

const CANADIAN_PROVINCES: &[(&str, &str)] = &[
    ("alberta", "AB"),
    ("british columbia", "BC"),
    ("manitoba", "MB"),
    ("new brunswick", "NB"),
    ("newfoundland and labrador", "NL"),
    ("newfoundland", "NL"),
    ("labrador", "NL"),
    ("northwest territories", "NT"),
    ("nova scotia", "NS"),
    ("nunavut", "NU"),
    ("ontario", "ON"),
    ("prince edward island", "PE"),
    ("quebec", "QC"),
    ("saskatchewan", "SK"),
    ("yukon", "YT"),
];

const AUSTRALIAN_STATES: &[(&str, &str)] = &[
    ("australian capital territory", "ACT"),
    ("new south wales", "NSW"),
    ("northern territory", "NT"),
    ("queensland", "QLD"),
    ("south australia", "SA"),
    ("tasmania", "TAS"),
    ("victoria", "VIC"),
    ("western australia", "WA"),
];

const UK_COUNTRIES: &[(&str, &str)] = &[
    ("england", "ENG"),
    ("northern ireland", "NIR"),
    ("scotland", "SCT"),
    ("wales", "WLS"),
];

fn lookup(table: &[(&'static str, &'static str)], key: &str) -> Option<&'static str> {
    table.iter().find(|(name, _)| *name == key).map(|(_, abbr)| *abbr)
}

/// Abbreviate a state/province/territory name.
///
/// Dictionary hits are exact full-name matches (case-insensitive), tried in
/// order: US states, Canadian provinces, Australian states, UK countries.
/// Unknown multi-word names synthesize an abbreviation from the first letter
/// of every word; unknown single words fall back to their first two letters,
/// upper-cased.
pub fn state_abbreviation(state_name: &str) -> String {
    if state_name.is_empty() {
        return String::new();
    }

    let lower = state_name.to_lowercase();

    for table in [US_STATES, CANADIAN_PROVINCES, AUSTRALIAN_STATES, UK_COUNTRIES] {
        if let Some(abbr) = lookup(table, &lower) {
            return abbr.to_string();
        }
    }

    // Geocoders sometimes report US states as "State of X".
    if let Some(trimmed) = lower.strip_prefix("state of ") {
        if let Some(abbr) = lookup(US_STATES, trimmed) {
            return abbr.to_string();
        }
    }

    if state_name.contains(' ') {
        return state_name
            .split(' ')
            .filter_map(|word| word.chars().next())
            .map(|c| c.to_uppercase().to_string())
            .collect();
    }

    state_name.chars().take(2).flat_map(char::to_uppercase).collect()
}

/// Format a location as "City, Region, Country".
///
/// Pure and total: `None` or an empty location formats to `""`. The country
/// code is only appended when it is not already part of the formatted string.
pub fn format_location_with_abbr(location: Option<&Location>) -> String {
    let Some(location) = location else {
        return String::new();
    };

    let mut formatted = location.name.clone();

    if let Some(state) = location.state.as_deref() {
        let abbr = state_abbreviation(state);
        if !abbr.is_empty() {
            formatted.push_str(", ");
            formatted.push_str(&abbr);
        }
    }

    if let Some(country) = location.country.as_deref() {
        if !country.is_empty() && !formatted.contains(country) {
            formatted.push_str(", ");
            formatted.push_str(country);
        }
    }

    formatted
}
