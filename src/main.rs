//! skycast: current weather, forecast, favorites and search history from the terminal.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, FixedOffset};
use clap::{Parser, Subcommand};

use skycast_core::{App, AppError, ConfigError, Units};
use skycast_weather::forecast::format_temp;
use skycast_weather::{
    Coordinates, Dashboard, DashboardSnapshot, DashboardState, FavoriteToggle, FavoritesStore,
    FileStore, FixedLocation, LocationProvider, QueryCache, SearchHistoryStore, StaleTime,
    WeatherApi, WeatherQueries,
};

/// Weather dashboard for the terminal
#[derive(Parser)]
#[command(name = "skycast", version, about = "Weather dashboard for the terminal")]
struct Cli {
    /// Latitude of "my location"; overrides the config
    #[arg(long, global = true, allow_hyphen_values = true, requires = "lon")]
    lat: Option<f64>,

    /// Longitude of "my location"; overrides the config
    #[arg(long, global = true, allow_hyphen_values = true, requires = "lat")]
    lon: Option<f64>,

    /// Refetch even if cached data is fresh
    #[arg(long, global = true)]
    refresh: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Weather for my location (default)
    Dashboard,
    /// Weather for a named city at the given coordinates
    City {
        /// Display name, used when reverse geocoding finds nothing
        name: String,
    },
    /// Search locations by name
    Search {
        query: String,
        /// Open the Nth result (1-based) and record it in the history
        #[arg(long)]
        select: Option<usize>,
    },
    /// Manage favorite cities
    Favorites {
        #[command(subcommand)]
        action: Option<FavoritesAction>,
    },
    /// Manage recent searches
    History {
        #[command(subcommand)]
        action: Option<HistoryAction>,
    },
}

#[derive(Subcommand)]
enum FavoritesAction {
    List,
    /// Star or un-star the city at --lat/--lon
    Toggle,
    Remove { id: String },
    Clear,
}

#[derive(Subcommand)]
enum HistoryAction {
    List,
    Remove { id: String },
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    skycast_core::init()?;

    let app = App::new()?;
    app.initialize()?;
    for warning in &app.warnings().warnings {
        tracing::warn!(%warning, "Configuration warning");
    }

    let config = app.config();
    let cache = Arc::new(QueryCache::new());
    let queries = WeatherQueries::new(
        WeatherApi::new(&config.api)?,
        cache.clone(),
        StaleTime::After(Duration::from_secs(config.cache.weather_stale_secs)),
    );
    let store = FileStore::new(app.data_dir());
    let dashboard = Dashboard::new(
        queries,
        Arc::new(FavoritesStore::with_limit(
            store.clone(),
            cache.clone(),
            config.storage.favorites_limit,
        )),
        Arc::new(SearchHistoryStore::with_limit(
            store,
            cache,
            config.storage.history_limit,
        )),
    );

    let location = match (cli.lat, cli.lon) {
        (Some(lat), Some(lon)) => FixedLocation::new(Some(Coordinates::new(lat, lon))),
        _ => FixedLocation::from_config(&config.location),
    };
    let units = config.api.units;

    tracing::info!(data_dir = %app.data_dir().display(), "skycast started");

    match cli.command.unwrap_or(Command::Dashboard) {
        Command::Dashboard => {
            require_api_key(&app)?;
            let state = if cli.refresh {
                dashboard.refresh(&location).await
            } else {
                dashboard.load(&location).await
            };
            render(&state, units, None);
        }
        Command::City { name } => {
            require_api_key(&app)?;
            let coords = location.locate()?;
            let state = dashboard.city(coords).await;
            render(&state, units, Some(&name));
        }
        Command::Search { query, select } => {
            require_api_key(&app)?;
            let Some(results) = dashboard.search(&query).await.map_err(AppError::from)? else {
                println!("Type at least 3 characters to search.");
                return Ok(());
            };
            if results.is_empty() {
                println!("No locations found for \"{}\".", query.trim());
                return Ok(());
            }

            match select {
                Some(n) => {
                    let place = n
                        .checked_sub(1)
                        .and_then(|i| results.get(i))
                        .ok_or_else(|| anyhow::anyhow!("No result #{} for \"{}\"", n, query))?;
                    let coords = dashboard.select_location(query.trim(), place);
                    let state = dashboard.city(coords).await;
                    render(&state, units, Some(&place.display_name()));
                }
                None => {
                    for (i, place) in results.iter().enumerate() {
                        println!("{:>2}. {}  ({:.4}, {:.4})", i + 1, place.display_name(), place.lat, place.lon);
                    }
                }
            }
        }
        Command::Favorites { action } => match action.unwrap_or(FavoritesAction::List) {
            FavoritesAction::List => {
                let favorites = dashboard.favorites().list();
                if favorites.is_empty() {
                    println!("No favorite cities yet.");
                }
                for fav in favorites {
                    println!("{}  {}, {}", fav.id, fav.name, fav.country);
                }
            }
            FavoritesAction::Toggle => {
                require_api_key(&app)?;
                let coords = location.locate()?;
                let weather = dashboard
                    .queries()
                    .weather(coords)
                    .await
                    .map_err(AppError::from)?;
                match dashboard.toggle_favorite(&weather) {
                    FavoriteToggle::Added => println!("Added {} to favorites.", weather.name),
                    FavoriteToggle::Removed => println!("Removed {} from favorites.", weather.name),
                }
            }
            FavoritesAction::Remove { id } => {
                let left = dashboard.favorites().remove(&id);
                println!("{} favorite(s) left.", left.len());
            }
            FavoritesAction::Clear => {
                dashboard.favorites().clear();
                println!("Favorites cleared.");
            }
        },
        Command::History { action } => match action.unwrap_or(HistoryAction::List) {
            HistoryAction::List => {
                let history = dashboard.recent_searches();
                if history.is_empty() {
                    println!("No recent searches.");
                }
                for item in history {
                    println!("{}  \"{}\" -> {}", item.id, item.query, item.name);
                }
            }
            HistoryAction::Remove { id } => {
                let left = dashboard.history().remove(&id);
                println!("{} search(es) left.", left.len());
            }
            HistoryAction::Clear => {
                dashboard.clear_history();
                println!("Search history cleared.");
            }
        },
    }

    Ok(())
}

fn require_api_key(app: &App) -> Result<()> {
    if app.config().api.is_configured() {
        return Ok(());
    }
    let err = AppError::Config(ConfigError::MissingSetting(format!(
        "api.api_key (or {})",
        skycast_core::config::API_KEY_ENV
    )));
    eprintln!("{}", err.user_message());
    Err(err.into())
}

fn temperature(temp: f64, units: Units) -> String {
    match units {
        Units::Standard => format!("{}{}", temp.round(), units.temperature_suffix()),
        _ => format!("{}{}", format_temp(temp), units.temperature_suffix().trim_start_matches('°')),
    }
}

fn render(state: &DashboardState, units: Units, fallback_name: Option<&str>) {
    match state {
        DashboardState::LocationRequired => {
            println!("No location available. Pass --lat/--lon or set [location] in the config.");
        }
        DashboardState::LocationError(message) => println!("{}", message),
        DashboardState::FetchFailed(err) => println!("{}", err),
        DashboardState::Ready(snapshot) => render_snapshot(snapshot, units, fallback_name),
    }
}

fn render_snapshot(snapshot: &DashboardSnapshot, units: Units, fallback_name: Option<&str>) {
    let name = match (&snapshot.place, fallback_name) {
        (None, Some(name)) => name.to_string(),
        _ => snapshot.display_name(),
    };
    let weather = &snapshot.weather;
    let star = if snapshot.is_favorite { " *" } else { "" };
    println!("{}{}", name, star);

    if let Some(condition) = weather.condition() {
        println!("  {}", condition.description);
    }
    println!(
        "  {} (feels like {}), low {} / high {}",
        temperature(weather.main.temp, units),
        temperature(weather.main.feels_like, units),
        temperature(weather.main.temp_min, units),
        temperature(weather.main.temp_max, units),
    );
    println!("  humidity {}%, wind {}", weather.main.humidity, weather.wind.speed);

    let offset = FixedOffset::east_opt(weather.timezone);
    for (label, ts) in [("sunrise", weather.sys.sunrise), ("sunset", weather.sys.sunset)] {
        let local = offset.and_then(|o| DateTime::from_timestamp(ts, 0).map(|t| t.with_timezone(&o)));
        if let Some(local) = local.filter(|_| ts > 0) {
            println!("  {} {}", label, local.format("%H:%M"));
        }
    }

    let hourly = snapshot.hourly();
    if !hourly.is_empty() {
        println!("\nNext 24 hours");
        for slot in hourly {
            println!("  {}  {}", slot.time, temperature(slot.temp, units));
        }
    }

    let days = snapshot.next_days();
    if !days.is_empty() {
        println!("\nNext days");
        for day in days {
            let summary = day.weather.map(|w| w.main).unwrap_or_default();
            println!(
                "  {}  {} / {}  {}",
                day.date.format("%a %d %b"),
                temperature(day.temp_min, units),
                temperature(day.temp_max, units),
                summary
            );
        }
    }
}
