//! Single-query command-line front end for the freewheel routing engine.
//!
//! Prints exactly one JSON object to stdout: the route with its distance
//! summary on success, or `{"error": ...}` on failure. Diagnostics go to
//! stderr via `RUST_LOG`.

use clap::Parser;
use freewheel_router::{
    BicycleType, CostingOptions, Route, RouteError, RouteRequest, Router,
};
use geo::coord;
use serde_json::json;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

#[derive(Parser, Debug)]
#[command(name = "freewheel", author, version, about, long_about = None)]
struct Cli {
    /// Root of the tile directory tree.
    tiles_dir: PathBuf,

    #[arg(allow_negative_numbers = true)]
    from_lat: f64,
    #[arg(allow_negative_numbers = true)]
    from_lon: f64,
    #[arg(allow_negative_numbers = true)]
    to_lat: f64,
    #[arg(allow_negative_numbers = true)]
    to_lon: f64,

    /// Strongly penalize segments that require walking the bike (0 or 1).
    #[arg(default_value_t = 0)]
    avoid_pushing: u8,

    /// Penalize car-accessible roads by estimated traffic stress (0 or 1).
    #[arg(default_value_t = 0)]
    avoid_cars: u8,

    /// Willingness to ride on plain roads, 0 (avoid) to 1 (no penalty).
    #[arg(default_value_t = 0.25)]
    use_roads: f32,

    /// Bicycle type: 0=Road, 1=Cross, 2=Hybrid, 3=Mountain.
    #[arg(default_value_t = 3)]
    bike_type: u8,
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = f64::powi(10.0, decimals);
    (value * scale).round() / scale
}

fn render(route: &Route) -> serde_json::Value {
    let coords: Vec<_> = route
        .coords
        .iter()
        .map(|c| json!({"lat": round_to(c.y, 6), "lon": round_to(c.x, 6)}))
        .collect();
    json!({
        "coords": coords,
        "dist_car_free_km": round_to(route.summary.car_free_m / 1000.0, 2),
        "dist_separated_km": round_to(route.summary.separated_m / 1000.0, 2),
        "dist_with_cars_km": round_to(route.summary.with_cars_m / 1000.0, 2),
        "dist_pushing_km": round_to(route.summary.pushing_m / 1000.0, 2),
    })
}

fn error_code(error: &RouteError) -> &'static str {
    match error {
        RouteError::TileLoadFailed => "tile_load_failed",
        RouteError::NoNearbyRoad | RouteError::NoPath => "no_path",
    }
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        // Standard logger, configured via the RUST_LOG env variable
        .with(tracing_subscriber::fmt::layer().with_filter(EnvFilter::from_default_env()))
        .init();

    let cli = Cli::parse();

    let options = CostingOptions {
        bicycle_type: BicycleType::from_index(cli.bike_type.min(3)),
        use_roads: cli.use_roads.clamp(0.0, 1.0),
        avoid_pushing: cli.avoid_pushing != 0,
        avoid_cars: cli.avoid_cars != 0,
    };
    info!(?options, "Routing");

    let request = RouteRequest {
        from: coord! {x: cli.from_lon, y: cli.from_lat},
        to: coord! {x: cli.to_lon, y: cli.to_lat},
        options,
    };

    let mut router = Router::new(cli.tiles_dir);
    match router.route(&request) {
        Ok(route) => {
            info!(
                nodes = route.path.len(),
                total_km = route.summary.total_m() / 1000.0,
                "Route found"
            );
            println!("{}", render(&route));
            ExitCode::SUCCESS
        }
        Err(error) => {
            info!(%error, "Routing failed");
            println!("{}", json!({"error": error_code(&error)}));
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use freewheel_router::RouteSummary;

    #[test]
    fn test_error_codes() {
        assert_eq!(error_code(&RouteError::TileLoadFailed), "tile_load_failed");
        assert_eq!(error_code(&RouteError::NoNearbyRoad), "no_path");
        assert_eq!(error_code(&RouteError::NoPath), "no_path");
    }

    #[test]
    fn test_render_rounding() {
        let route = Route {
            path: vec![],
            coords: vec![coord! {x: 16.371_944_4, y: 48.208_255_6}],
            summary: RouteSummary {
                car_free_m: 633.0,
                separated_m: 0.0,
                with_cars_m: 1234.5,
                pushing_m: 0.0,
            },
        };
        let value = render(&route);
        assert_eq!(value["coords"][0]["lat"], 48.208_256);
        assert_eq!(value["coords"][0]["lon"], 16.371_944);
        assert_eq!(value["dist_car_free_km"], 0.63);
        assert_eq!(value["dist_with_cars_km"], 1.23);
    }

    #[test]
    fn test_argument_defaults() {
        let cli = Cli::parse_from(["freewheel", "/tiles", "48.2", "16.37", "48.21", "16.38"]);
        assert_eq!(cli.avoid_pushing, 0);
        assert_eq!(cli.avoid_cars, 0);
        assert!((cli.use_roads - 0.25).abs() < f32::EPSILON);
        assert_eq!(cli.bike_type, 3);
    }
}
