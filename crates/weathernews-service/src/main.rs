//! WeatherNews service - forecast cache sync and CLI.
//!
//! Run with: `cargo run -p weathernews-service`

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use time::Date;
use time::macros::format_description;
use tracing::info;

use weathernews_service::{App, Config, FileSettings};
use weathernews_types::{Coordinates, Location};

/// WeatherNews service - keeps a local forecast cache in sync.
#[derive(Parser, Debug)]
#[command(name = "weathernews-service")]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Database path (overrides config).
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    /// API key (overrides config).
    #[arg(long, global = true, env = "WEATHERNEWS_API_KEY", hide_env_values = true)]
    api_key: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the recurring sync in the foreground (default behavior).
    Run,

    /// Fetch forecasts once and update the cache.
    Sync,

    /// Print cached forecasts.
    Show {
        /// Only show this day (YYYY-MM-DD).
        #[arg(long, value_parser = parse_date)]
        date: Option<Date>,

        /// Output format.
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Print cache and sync status as JSON.
    Status,

    /// View or change user settings.
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

#[derive(Subcommand, Debug)]
enum SettingsAction {
    /// Print the current settings.
    Show,

    /// Set the forecast location.
    SetLocation {
        /// Place name understood by the provider, e.g. "Dhaka,BD".
        #[arg(required_unless_present_all = ["lat", "lon"], conflicts_with_all = ["lat", "lon"])]
        place: Option<String>,

        /// Latitude in degrees.
        #[arg(long, requires = "lon", allow_hyphen_values = true)]
        lat: Option<f64>,

        /// Longitude in degrees.
        #[arg(long, requires = "lat", allow_hyphen_values = true)]
        lon: Option<f64>,

        /// Fetch forecasts for the new location right away.
        #[arg(long)]
        sync: bool,
    },

    /// Turn forecast notifications on or off.
    Notifications {
        #[arg(value_enum)]
        state: Toggle,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Toggle {
    On,
    Off,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

fn parse_date(value: &str) -> Result<Date, String> {
    Date::parse(value, format_description!("[year]-[month]-[day]"))
        .map_err(|e| format!("invalid date '{}': {}", value, e))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("weathernews_service=info".parse()?)
                .add_directive("weathernews_core=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(&args)?;

    match args.command {
        Some(Command::Run) | None => run_service(config).await,
        Some(Command::Sync) => sync_once(config).await,
        Some(Command::Show { date, format }) => show_forecasts(config, date, format).await,
        Some(Command::Status) => print_status(config).await,
        Some(Command::Settings { action }) => handle_settings(config, action).await,
    }
}

fn load_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load_validated(path)?,
        None => Config::load_default().unwrap_or_default(),
    };

    if let Some(db_path) = &args.database {
        config.storage.path = db_path.clone();
    }
    if let Some(api_key) = &args.api_key {
        config.provider.api_key = api_key.clone();
    }

    Ok(config)
}

async fn run_service(config: Config) -> anyhow::Result<()> {
    config.provider.require_api_key()?;
    let app = App::from_config(config)?;

    info!("Starting forecast sync for {}", app.settings().snapshot().location);
    app.run(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
        }
    })
    .await?;

    Ok(())
}

async fn sync_once(config: Config) -> anyhow::Result<()> {
    config.provider.require_api_key()?;
    let app = App::from_config(config)?;

    let report = app.sync_now().await?;
    println!(
        "Stored {} forecast(s){}",
        report.stored,
        if report.notified { ", notified" } else { "" }
    );
    Ok(())
}

async fn show_forecasts(
    config: Config,
    date: Option<Date>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let app = App::from_config(config)?;

    match date {
        Some(date) => {
            let Some(record) = app.cached_forecast(date).await? else {
                println!("No forecast cached for {}", date);
                return Ok(());
            };
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&record)?),
                OutputFormat::Text => {
                    println!("{}", record.summary());
                    println!(
                        "  humidity {:.0}%  pressure {:.0} hPa  wind {:.1} m/s @ {:.0}°",
                        record.humidity,
                        record.pressure,
                        record.wind_speed,
                        record.wind_direction_degrees
                    );
                }
            }
        }
        None => {
            let forecasts = app.cached_forecasts().await?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&forecasts)?),
                OutputFormat::Text if forecasts.is_empty() => {
                    println!("No forecasts cached; run `weathernews-service sync`");
                }
                OutputFormat::Text => {
                    for summary in &forecasts {
                        println!("{}", summary);
                    }
                }
            }
        }
    }

    Ok(())
}

async fn print_status(config: Config) -> anyhow::Result<()> {
    let app = App::from_config(config)?;
    let status = app.status().await?;
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}

async fn handle_settings(config: Config, action: SettingsAction) -> anyhow::Result<()> {
    let settings = FileSettings::load(&config.storage.settings_path)?;

    match action {
        SettingsAction::Show => {
            println!("{}", toml::to_string_pretty(&settings.snapshot())?);
        }
        SettingsAction::Notifications { state } => {
            settings.set_notifications_enabled(state == Toggle::On)?;
            println!(
                "Notifications {}",
                if state == Toggle::On { "enabled" } else { "disabled" }
            );
        }
        SettingsAction::SetLocation {
            place,
            lat,
            lon,
            sync,
        } => {
            let location = match (place, lat, lon) {
                (Some(place), _, _) => Location::place(place),
                (None, Some(lat), Some(lon)) => Location::Coordinates(Coordinates::new(lat, lon)?),
                _ => anyhow::bail!("either a place name or --lat and --lon is required"),
            };
            settings.set_location(location.clone())?;
            println!("Location set to {}", location);

            if sync {
                config.provider.require_api_key()?;
                let app = App::from_config(config)?;
                let report = app.sync_now().await?;
                println!("Stored {} forecast(s) for {}", report.stored, location);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use time::macros::date;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(parse_date("2024-05-01"), Ok(date!(2024 - 05 - 01)));
        assert!(parse_date("01/05/2024").is_err());
    }

    #[test]
    fn test_set_location_by_coordinates() {
        let args = Args::parse_from([
            "weathernews-service",
            "settings",
            "set-location",
            "--lat",
            "-33.87",
            "--lon",
            "151.21",
        ]);
        match args.command {
            Some(Command::Settings {
                action: SettingsAction::SetLocation { place, lat, lon, sync },
            }) => {
                assert!(place.is_none());
                assert_eq!(lat, Some(-33.87));
                assert_eq!(lon, Some(151.21));
                assert!(!sync);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_set_location_requires_place_or_coordinates() {
        let result =
            Args::try_parse_from(["weathernews-service", "settings", "set-location"]);
        assert!(result.is_err());
    }
}
