use thiserror::Error;

/// Failures produced by the weather API client.
///
/// Every variant maps to a user-facing message via [`ApiError::user_message`];
/// the controller surfaces that message instead of letting the error escape
/// to the presentation layer.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The provider could not resolve the requested city.
    #[error("city not found")]
    NotFound,

    /// Reverse geocoding returned an empty result set.
    #[error("no geocoding match for the given coordinates")]
    NoGeocodeMatch,

    /// The provider rejected our credentials.
    #[error("authentication failed")]
    Auth,

    /// Every credential in the pool is rate limited.
    #[error("all credentials exhausted: rate limited")]
    RateLimited,

    /// Transport-level failure (DNS, TLS, connection reset, timeout).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The provider answered but the payload was not what we expect.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// A structured provider error we have no special handling for.
    #[error("provider error {code}: {message}")]
    Provider { code: String, message: String },

    /// The credential pool was empty after filtering out blank keys.
    #[error("no API credentials configured")]
    NoCredentials,
}

impl ApiError {
    /// User-facing message for this failure.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::NotFound => "City not found. Check the spelling, try the English name, \
                 or add a country code (e.g. \"Paris, FR\")."
                .to_string(),
            ApiError::NoGeocodeMatch => {
                "Could not determine your location. Try searching for your city manually."
                    .to_string()
            }
            ApiError::Auth => {
                "The weather service rejected the request. Please try again later.".to_string()
            }
            ApiError::RateLimited => {
                "Too many requests. Please try again in a little while.".to_string()
            }
            ApiError::Network(_) => {
                "Could not reach the weather service. Check your connection and try again."
                    .to_string()
            }
            ApiError::InvalidResponse(_) => {
                "The weather service returned an unexpected response.".to_string()
            }
            ApiError::Provider { message, .. } => {
                if message.is_empty() {
                    "Failed to fetch weather data.".to_string()
                } else {
                    message.clone()
                }
            }
            ApiError::NoCredentials => {
                "No API credentials configured. Run `skycast configure` first.".to_string()
            }
        }
    }
}

/// Failures while detecting the user's position.
///
/// These are always non-fatal: the controller falls back to the configured
/// default city and surfaces the reason.
#[derive(Debug, Error)]
pub enum LocateError {
    #[error("location permission denied")]
    Denied,

    #[error("location service unavailable")]
    Unavailable,

    #[error("location request timed out")]
    Timeout,

    #[error("location error: {0}")]
    Other(String),
}

impl LocateError {
    pub fn user_message(&self) -> String {
        match self {
            LocateError::Denied => "Location access was denied.".to_string(),
            LocateError::Unavailable => "Your location is currently unavailable.".to_string(),
            LocateError::Timeout => "Detecting your location took too long.".to_string(),
            LocateError::Other(msg) => format!("Could not detect your location: {msg}"),
        }
    }
}
