use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use inquire::{Select, Text};
use std::fmt;
use std::sync::Arc;

use skycast_core::{
    Config, DashboardState, IpLocator, Location, OpenWeatherClient, SearchHistory, Storage,
    Theme, Units, WeatherController, format_location_with_abbr,
};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "skycast", version, about = "Weather dashboard CLI")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Unit system: metric, imperial or standard. Defaults to the configured one.
    #[arg(long, global = true)]
    pub units: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Add an API credential to the rotation pool.
    Configure,

    /// Show current conditions and the 5-day forecast.
    ///
    /// Without a city, detects your location and falls back to the
    /// configured default city.
    Show {
        /// City name, e.g. "Kyiv" or "Springfield, IL, US".
        city: Option<String>,
    },

    /// Search for a location and pick which one to show.
    Search {
        /// Free-form query, e.g. "springfield".
        query: String,
    },

    /// List recent searches, or edit them.
    History {
        /// Remove one entry by name.
        #[arg(long)]
        remove: Option<String>,

        /// Drop the whole history.
        #[arg(long)]
        clear: bool,
    },

    /// Print the saved theme, or set it to "light" or "dark".
    Theme { value: Option<String> },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let config = Config::load()?;
        let units = match &self.units {
            Some(raw) => Units::try_from(raw.as_str())?,
            None => config.units,
        };

        match self.command {
            Command::Configure => configure(config),
            Command::Show { city } => show(&config, units, city).await,
            Command::Search { query } => search(&config, units, &query).await,
            Command::History { remove, clear } => history(remove, clear),
            Command::Theme { value } => theme(value),
        }
    }
}

fn build_controller(config: &Config) -> Result<WeatherController> {
    let client = OpenWeatherClient::new(config.credential_pool())
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;
    let locator = IpLocator::new().map_err(|e| anyhow::anyhow!(e.user_message()))?;
    let storage = Storage::open_default()?;

    Ok(WeatherController::new(
        Arc::new(client),
        Arc::new(locator),
        storage,
        config.default_city.clone(),
    ))
}

fn configure(mut config: Config) -> Result<()> {
    let key = Text::new("OpenWeather API key:").prompt()?;
    let key = key.trim().to_string();
    if key.is_empty() {
        bail!("No key entered; nothing saved.");
    }

    config.add_api_key(key);
    config.save()?;
    println!("Saved. {} credential(s) in the rotation pool.", config.api_keys.len());
    Ok(())
}

async fn show(config: &Config, units: Units, city: Option<String>) -> Result<()> {
    let controller = build_controller(config)?;

    match city {
        Some(city) => controller.search(&city, units).await,
        None => {
            controller.initialize(units).await;
        }
    }

    render_dashboard(&controller.state(), units);
    Ok(())
}

struct Candidate(Location);

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", format_location_with_abbr(Some(&self.0)))?;
        if let Some((lat, lon)) = self.0.coords() {
            write!(f, "  ({lat:.2}, {lon:.2})")?;
        }
        Ok(())
    }
}

async fn search(config: &Config, units: Units, query: &str) -> Result<()> {
    let controller = build_controller(config)?;

    let results = match controller.suggest(query, 5).await {
        // A one-shot query cannot be superseded.
        None => return Ok(()),
        Some(Ok(results)) => results,
        Some(Err(e)) => {
            eprintln!("! {}", e.user_message());
            return Ok(());
        }
    };

    let candidates: Vec<Candidate> = results.into_iter().map(Candidate).collect();
    let picked = Select::new("Which location?", candidates).prompt()?;

    let location = controller.select_location(picked.0, units).await;
    println!("Showing weather for {}.", location.label());
    render_dashboard(&controller.state(), units);
    Ok(())
}

fn history(remove: Option<String>, clear: bool) -> Result<()> {
    let history = SearchHistory::new(Storage::open_default()?);

    if clear {
        history.clear()?;
        println!("Search history cleared.");
        return Ok(());
    }

    if let Some(name) = remove {
        let entries = history.remove(&name)?;
        println!("Removed '{name}'. {} entries remaining.", entries.len());
        return Ok(());
    }

    let entries = history.get();
    if entries.is_empty() {
        println!("No recent searches.");
        return Ok(());
    }
    for (index, entry) in entries.iter().enumerate() {
        println!("{:>2}. {}", index + 1, entry.label());
    }
    Ok(())
}

fn theme(value: Option<String>) -> Result<()> {
    let storage = Storage::open_default()?;

    match value {
        Some(raw) => {
            let theme = Theme::try_from(raw.as_str())?;
            storage.set_theme(theme)?;
            println!("Theme set to {}.", theme.as_str());
        }
        None => println!("{}", storage.theme().as_str()),
    }
    Ok(())
}

fn render_dashboard(state: &DashboardState, units: Units) {
    if let Some(message) = &state.error_message {
        eprintln!("! {message}");
    }

    if let Some(now) = &state.conditions {
        println!("{}", state.city);
        println!(
            "  {:.1}{} (feels like {:.1}{})",
            now.temperature,
            units.temperature_label(),
            now.feels_like,
            units.temperature_label(),
        );
        println!(
            "  {} · humidity {}% · wind {:.1} {}",
            now.condition_main,
            now.humidity,
            now.wind_speed,
            units.wind_speed_label(),
        );
    }

    if !state.forecast.is_empty() {
        println!();
        println!("5-day forecast:");
        for day in &state.forecast {
            println!(
                "  {}  {:>5.1}{} / {:>5.1}{}  {:<12}  rain {:>3}%  wind {:.1} {}",
                day.date.format("%a %b %d"),
                day.temp_max,
                units.temperature_label(),
                day.temp_min,
                units.temperature_label(),
                day.condition.main,
                day.precipitation_chance,
                day.wind_speed,
                units.wind_speed_label(),
            );
        }
    }
}
