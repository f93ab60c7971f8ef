use clap::{App, Arg};
use rovlink::{EngineConfig, RovEngine, SimDriver};
use std::time::Duration;
use tokio::time;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let matches = App::new("rovlink-vehicle")
        .version("0.1.0")
        .about("ROV vehicle-side control and communication engine")
        .arg(
            Arg::with_name("port")
                .short("p")
                .long("port")
                .value_name("PORT")
                .help("TCP port to listen on for the surface station")
                .takes_value(true)
                .default_value("65432"),
        )
        .arg(
            Arg::with_name("tick-ms")
                .long("tick-ms")
                .value_name("MS")
                .help("Control tick period in milliseconds")
                .takes_value(true)
                .default_value("200"),
        )
        .arg(
            Arg::with_name("watchdog-mult")
                .long("watchdog-mult")
                .value_name("N")
                .help("Watchdog deadline as a multiple of the tick period")
                .takes_value(true)
                .default_value("3"),
        )
        .get_matches();

    let config = EngineConfig {
        listen_port: matches.value_of("port").unwrap_or_default().parse()?,
        tick_period_ms: matches.value_of("tick-ms").unwrap_or_default().parse()?,
        watchdog_multiplier: matches
            .value_of("watchdog-mult")
            .unwrap_or_default()
            .parse()?,
    };

    println!("🌊 ROV Vehicle Engine");
    println!("=====================");

    let mut engine = RovEngine::new(config, SimDriver::new())?;

    // Poll well inside the tick period so inbound control stays snappy;
    // the engine runs the full tick only when one is due.
    let poll_ms = (engine.config().tick_period_ms / 4).max(10);
    let mut interval = time::interval(Duration::from_millis(poll_ms));

    loop {
        tokio::select! {
            _ = interval.tick() => {
                engine.poll();
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown requested");
                break;
            }
        }
    }

    println!("Vehicle engine stopped.");
    Ok(())
}
