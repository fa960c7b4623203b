//! End-to-end tests of the OpenWeather client against a stubbed HTTP server:
//! credential rotation, error classification, and payload mapping.

use serde_json::json;
use skycast_core::{ApiError, OpenWeatherClient, Units, WeatherApi, WeatherQuery};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer, keys: &[&str]) -> OpenWeatherClient {
    let keys = keys.iter().map(|k| k.to_string()).collect();
    OpenWeatherClient::with_base_url(keys, server.uri()).expect("client")
}

fn weather_body() -> serde_json::Value {
    json!({
        "cod": 200,
        "name": "Kyiv",
        "main": { "temp": 7.3, "feels_like": 4.1, "humidity": 81 },
        "weather": [{ "main": "Clouds", "description": "overcast clouds", "icon": "04d" }],
        "wind": { "speed": 5.2 }
    })
}

#[tokio::test]
async fn rotation_survives_rate_limited_credentials() {
    let server = MockServer::start().await;

    for limited in ["key1", "key2"] {
        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .and(query_param("appid", limited))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({
                "cod": 429, "message": "API calls limit exceeded"
            })))
            .mount(&server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .and(query_param("appid", "key3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(weather_body()))
        .mount(&server)
        .await;

    let client = client(&server, &["key1", "key2", "key3"]);
    let query = WeatherQuery::by_name("Kyiv", Units::Metric);

    let conditions = client.current_weather(&query).await.expect("third key succeeds");
    assert_eq!(conditions.temperature, 7.3);

    // The cursor rests on the credential that worked, so the next logical
    // request starts there instead of replaying the exhausted keys.
    assert_eq!(client.keys().position(), 2);
}

#[tokio::test]
async fn exhausting_every_credential_yields_a_usable_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "cod": 429, "message": "API calls limit exceeded"
        })))
        .mount(&server)
        .await;

    let client = client(&server, &["key1", "key2"]);
    let query = WeatherQuery::by_name("Kyiv", Units::Metric);

    let err = client.current_weather(&query).await.unwrap_err();
    assert!(matches!(err, ApiError::RateLimited));
    assert!(!err.user_message().is_empty());
}

#[tokio::test]
async fn provider_limit_message_also_triggers_rotation() {
    let server = MockServer::start().await;

    // 200-with-limit-message is how the provider sometimes reports quota.
    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .and(query_param("appid", "key1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "cod": 200, "message": "account limit reached"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .and(query_param("appid", "key2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(weather_body()))
        .mount(&server)
        .await;

    let client = client(&server, &["key1", "key2"]);
    let query = WeatherQuery::by_name("Kyiv", Units::Metric);

    let conditions = client.current_weather(&query).await.expect("second key succeeds");
    assert_eq!(conditions.humidity, 81);
}

#[tokio::test]
async fn unknown_city_classifies_as_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "cod": "404", "message": "city not found"
        })))
        .mount(&server)
        .await;

    let client = client(&server, &["key1"]);
    let err = client
        .current_weather(&WeatherQuery::by_name("Xyzzy", Units::Metric))
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::NotFound));
    assert!(err.user_message().contains("spelling"));
}

#[tokio::test]
async fn bad_credential_classifies_as_auth_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "cod": 401, "message": "Invalid API key"
        })))
        .mount(&server)
        .await;

    let client = client(&server, &["bad-key"]);
    let err = client
        .current_weather(&WeatherQuery::by_name("Kyiv", Units::Metric))
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::Auth));
    assert!(err.user_message().contains("try again later"));
}

#[tokio::test]
async fn current_weather_maps_the_payload() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .and(query_param("q", "Kyiv"))
        .and(query_param("units", "imperial"))
        .respond_with(ResponseTemplate::new(200).set_body_json(weather_body()))
        .mount(&server)
        .await;

    let client = client(&server, &["key1"]);
    let conditions = client
        .current_weather(&WeatherQuery::by_name("Kyiv", Units::Imperial))
        .await
        .expect("weather");

    assert_eq!(conditions.feels_like, 4.1);
    assert_eq!(conditions.wind_speed, 5.2);
    assert_eq!(conditions.condition_main, "Clouds");
    assert_eq!(conditions.icon_url, "https://openweathermap.org/img/wn/04d@2x.png");
}

#[tokio::test]
async fn coordinates_win_over_the_city_name() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .and(query_param("lat", "50.45"))
        .and(query_param("lon", "30.52"))
        .respond_with(ResponseTemplate::new(200).set_body_json(weather_body()))
        .mount(&server)
        .await;

    let client = client(&server, &["key1"]);
    let query = WeatherQuery::by_name("Kyiv", Units::Metric).with_coords(50.45, 30.52);

    // The mock only matches lat/lon params, so a name-based query would 404.
    client.current_weather(&query).await.expect("coordinate lookup");
}

#[tokio::test]
async fn forecast_groups_intervals_into_days() {
    let server = MockServer::start().await;

    // Two entries on Mar 1 (UTC), one on Mar 2.
    let body = json!({
        "cod": "200",
        "city": { "timezone": 0 },
        "list": [
            { "dt": 1_709_283_600i64, "main": { "temp": 10.0 },
              "weather": [{ "main": "Clouds", "description": "clouds", "icon": "03d" }],
              "wind": { "speed": 3.0 }, "pop": 0.1 },
            { "dt": 1_709_294_400i64, "main": { "temp": 15.0 },
              "weather": [{ "main": "Clear", "description": "clear sky", "icon": "01d" }],
              "wind": { "speed": 4.5 }, "pop": 0.3 },
            { "dt": 1_709_380_800i64, "main": { "temp": 8.0 },
              "weather": [{ "main": "Rain", "description": "light rain", "icon": "10d" }],
              "wind": { "speed": 6.0 }, "pop": 0.9 }
        ]
    });
    Mock::given(method("GET"))
        .and(path("/data/2.5/forecast"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&server)
        .await;

    let client = client(&server, &["key1"]);
    let days = client
        .five_day_forecast(&WeatherQuery::by_name("Kyiv", Units::Metric))
        .await
        .expect("forecast");

    assert_eq!(days.len(), 2);
    assert_eq!(days[0].temp_max, 15.0);
    assert_eq!(days[0].temp_min, 10.0);
    assert_eq!(days[0].condition.main, "Clear");
    assert_eq!(days[0].precipitation_chance, 30);
    assert_eq!(days[1].precipitation_chance, 90);
}

#[tokio::test]
async fn empty_forward_geocoding_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/geo/1.0/direct"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let client = client(&server, &["key1"]);
    let err = client.search_locations("Nowhereville", 5).await.unwrap_err();
    assert!(matches!(err, ApiError::NotFound));
}

#[tokio::test]
async fn empty_reverse_geocoding_asks_for_manual_search() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/geo/1.0/reverse"))
        .and(query_param("limit", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let client = client(&server, &["key1"]);
    let err = client.reverse_geocode(0.0, 0.0).await.unwrap_err();
    assert!(matches!(err, ApiError::NoGeocodeMatch));
    assert!(err.user_message().contains("manually"));
}

#[tokio::test]
async fn geocoding_results_map_into_locations() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/geo/1.0/direct"))
        .and(query_param("q", "Springfield"))
        .and(query_param("limit", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "name": "Springfield", "state": "Illinois", "country": "US",
              "lat": 39.7817, "lon": -89.6501 },
            { "name": "Springfield", "state": "Massachusetts", "country": "US",
              "lat": 42.1015, "lon": -72.5898 }
        ])))
        .mount(&server)
        .await;

    let client = client(&server, &["key1"]);
    let results = client.search_locations("Springfield", 5).await.expect("results");

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].state.as_deref(), Some("Illinois"));
    assert_eq!(results[0].coords(), Some((39.7817, -89.6501)));
    // Raw results are not yet enriched; the controller does that.
    assert!(results[0].display_name.is_none());
}

#[tokio::test]
async fn malformed_geocoding_payload_is_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/geo/1.0/reverse"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "lat": "oops" }])))
        .mount(&server)
        .await;

    let client = client(&server, &["key1"]);
    let err = client.reverse_geocode(1.0, 2.0).await.unwrap_err();
    assert!(matches!(err, ApiError::InvalidResponse(_)));
}
