//! CLI tool to fly one simulated vehicle through a mission on the flight server.
//!
//! Each tick sends the vehicle position and a lidar scan of the ground below,
//! then moves the vehicle to the commanded position.

use anyhow::{bail, Context, Result};
use clap::Parser;
use flight_cli::sim::{Terrain, TickClient, TickPayload};
use flight_core::{FlightProfile, Point3};
use std::time::Duration;
use tokio::time;

/// Send a simulated mission to the flight server
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Flight server URL
    #[arg(long, default_value = "http://localhost:5000")]
    url: String,

    /// Mission key; changing it starts a new mission
    #[arg(long, default_value = "3DA")]
    mission: String,

    /// Vehicle channel
    #[arg(long, default_value = "default")]
    vehicle: String,

    /// Flight profile (phased, direct, survey); defaults to the key's prefix
    #[arg(long)]
    profile: Option<String>,

    /// Target as "x,y,z"; repeat for several
    #[arg(long = "target", value_parser = parse_point)]
    targets: Vec<Point3>,

    /// Launch position as "x,y,z"
    #[arg(long, default_value = "0,0,0", value_parser = parse_point)]
    start: Point3,

    /// Maximum ticks to send
    #[arg(long, default_value_t = 300)]
    ticks: u32,

    /// Tick rate in Hz
    #[arg(long, default_value_t = 5.0)]
    rate: f64,

    /// Raise the emergency flag after this many ticks
    #[arg(long)]
    emergency_after: Option<u32>,

    /// Lidar grid size (cells per side)
    #[arg(long, default_value_t = 5)]
    grid: usize,

    /// Lidar cell spacing
    #[arg(long, default_value_t = 25.0)]
    spacing: f64,

    /// Terrain seed
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

fn parse_point(raw: &str) -> Result<Point3, String> {
    let parts: Vec<f64> = raw
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .map_err(|e| format!("bad coordinate in '{}': {}", raw, e))?;
    match parts.as_slice() {
        [x, y, z] => Ok(Point3::new(*x, *y, *z)),
        _ => Err(format!("expected x,y,z but got '{}'", raw)),
    }
}

fn parse_profile(raw: &str) -> Result<FlightProfile> {
    serde_json::from_value(serde_json::Value::String(raw.to_ascii_lowercase()))
        .with_context(|| format!("unknown profile '{}'", raw))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    if !args.rate.is_finite() || args.rate <= 0.0 {
        bail!("--rate must be positive");
    }
    let profile = args.profile.as_deref().map(parse_profile).transpose()?;
    let targets = if args.targets.is_empty() {
        vec![
            Point3::new(400.0, 0.0, 150.0),
            Point3::new(-250.0, 0.0, 300.0),
            Point3::new(100.0, 0.0, -350.0),
        ]
    } else {
        args.targets.clone()
    };

    let terrain = Terrain::generate(args.seed, 2_000.0);
    let client = TickClient::new(&args.url);

    println!("Flying mission {} on vehicle {} via {}", args.mission, args.vehicle, client.url());
    println!("  Start: ({:.1}, {:.1}, {:.1})", args.start.x, args.start.y, args.start.z);
    println!("  Targets: {}", targets.len());
    if let Some(n) = args.emergency_after {
        println!("  Emergency after {} ticks", n);
    }
    println!();

    let mut interval = time::interval(Duration::from_secs_f64(1.0 / args.rate));
    let mut current = args.start;
    let mut idle_ticks = 0u32;
    let mut sent = 0u32;

    for tick in 0..args.ticks {
        interval.tick().await;

        let emergency = args.emergency_after.is_some_and(|n| tick >= n);
        let payload = TickPayload {
            test: args.mission.clone(),
            vehicle: args.vehicle.clone(),
            profile: if sent == 0 { profile } else { None },
            current,
            emergency_stop: emergency,
            targets: if sent == 0 { targets.clone() } else { Vec::new() },
            lidar_below_drone: Some(terrain.scan(current, args.grid, args.spacing)),
        };

        let next = match client.send(&payload).await {
            Ok(next) => next,
            Err(e) => {
                eprintln!("Error sending tick: {:#}", e);
                continue;
            }
        };
        sent += 1;

        let flag = if emergency { " EMERGENCY" } else { "" };
        println!(
            "[{:4}] ({:8.2}, {:7.2}, {:8.2}) -> ({:8.2}, {:7.2}, {:8.2}){}",
            tick, current.x, current.y, current.z, next.x, next.y, next.z, flag
        );

        idle_ticks = if next == current { idle_ticks + 1 } else { 0 };
        current = next;

        // Parked at home (or at the landing spot) for a while: done.
        if tick > 0 && idle_ticks >= 15 {
            break;
        }
    }

    println!("\nSimulation complete. Sent {} ticks.", sent);
    Ok(())
}
