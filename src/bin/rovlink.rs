use clap::{App, Arg, ArgMatches, SubCommand};
use colored::*;
use rovlink::protocol::{
    self, Control, Heartbeat, LightCommand, Message, SwitchCommand, ThrusterCommand,
    MAX_MESSAGE_LEN,
};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: &str = "65432";
const IO_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let matches = App::new("rovlink")
        .version("0.1.0")
        .about("🌊 Surface-station CLI for the ROV vehicle engine")
        .arg(
            Arg::with_name("host")
                .short("H")
                .long("host")
                .value_name("HOST")
                .help("Vehicle host address")
                .takes_value(true)
                .default_value(DEFAULT_HOST)
                .global(true),
        )
        .arg(
            Arg::with_name("port")
                .short("p")
                .long("port")
                .value_name("PORT")
                .help("Vehicle port")
                .takes_value(true)
                .default_value(DEFAULT_PORT)
                .global(true),
        )
        .arg(
            Arg::with_name("format")
                .short("f")
                .long("format")
                .value_name("FORMAT")
                .help("Output format")
                .takes_value(true)
                .possible_values(&["json", "table", "compact"])
                .default_value("table")
                .global(true),
        )
        .subcommand(
            SubCommand::with_name("arm")
                .about("🔓 Arm the vehicle (enable actuator output)"),
        )
        .subcommand(
            SubCommand::with_name("disarm")
                .about("🔒 Disarm the vehicle (force actuator output off)"),
        )
        .subcommand(
            SubCommand::with_name("thruster")
                .about("🚤 Command a thruster")
                .arg(
                    Arg::with_name("id")
                        .help("Thruster id (0-5)")
                        .required(true),
                )
                .arg(
                    Arg::with_name("velocity")
                        .help("Normalized velocity (-1.0 to 1.0)")
                        .required(true),
                )
                .arg(
                    Arg::with_name("off")
                        .long("off")
                        .help("Disable the thruster channel"),
                ),
        )
        .subcommand(
            SubCommand::with_name("switch")
                .about("🔌 Command a switched power bus")
                .arg(
                    Arg::with_name("id")
                        .help("Switch channel id (0-8)")
                        .required(true),
                )
                .arg(
                    Arg::with_name("state")
                        .help("Desired state")
                        .required(true)
                        .possible_values(&["on", "off"]),
                ),
        )
        .subcommand(
            SubCommand::with_name("light")
                .about("💡 Command a light")
                .arg(Arg::with_name("id").help("Light id (0-1)").required(true))
                .arg(
                    Arg::with_name("state")
                        .help("Desired state")
                        .required(true)
                        .possible_values(&["on", "off"]),
                ),
        )
        .subcommand(
            SubCommand::with_name("status")
                .about("📊 Fetch one heartbeat and display vehicle state"),
        )
        .subcommand(
            SubCommand::with_name("monitor")
                .about("📡 Stream heartbeats until interrupted"),
        )
        .get_matches();

    let host = matches.value_of("host").unwrap_or(DEFAULT_HOST).to_string();
    let port: u16 = matches.value_of("port").unwrap_or(DEFAULT_PORT).parse()?;
    let format = matches.value_of("format").unwrap_or("table").to_string();

    match matches.subcommand() {
        ("arm", Some(_)) => {
            let control = Control {
                master_enable: Some(true),
                ..Control::default()
            };
            send_control(&host, port, &control, &format, "arm").await
        }
        ("disarm", Some(_)) => {
            let control = Control {
                master_enable: Some(false),
                ..Control::default()
            };
            send_control(&host, port, &control, &format, "disarm").await
        }
        ("thruster", Some(sub)) => handle_thruster(sub, &host, port, &format).await,
        ("switch", Some(sub)) => handle_switch(sub, &host, port, &format).await,
        ("light", Some(sub)) => handle_light(sub, &host, port, &format).await,
        ("status", Some(_)) => handle_status(&host, port, &format).await,
        ("monitor", Some(_)) => handle_monitor(&host, port, &format).await,
        _ => {
            println!("{}", "No command specified. Use --help for usage.".yellow());
            Ok(())
        }
    }
}

async fn handle_thruster(
    matches: &ArgMatches<'_>,
    host: &str,
    port: u16,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let id: u8 = matches.value_of("id").unwrap_or_default().parse()?;
    let velocity: f32 = matches.value_of("velocity").unwrap_or_default().parse()?;
    let control = Control {
        thrusters: vec![ThrusterCommand {
            id,
            velocity,
            enabled: !matches.is_present("off"),
        }],
        ..Control::default()
    };
    send_control(host, port, &control, format, "thruster").await
}

async fn handle_switch(
    matches: &ArgMatches<'_>,
    host: &str,
    port: u16,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let id: u8 = matches.value_of("id").unwrap_or_default().parse()?;
    let enabled = matches.value_of("state") == Some("on");
    let control = Control {
        switches: vec![SwitchCommand { id, enabled }],
        ..Control::default()
    };
    send_control(host, port, &control, format, "switch").await
}

async fn handle_light(
    matches: &ArgMatches<'_>,
    host: &str,
    port: u16,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let id: u8 = matches.value_of("id").unwrap_or_default().parse()?;
    let on = matches.value_of("state") == Some("on");
    let control = Control {
        lights: vec![LightCommand { id, on }],
        ..Control::default()
    };
    send_control(host, port, &control, format, "light").await
}

async fn handle_status(
    host: &str,
    port: u16,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut stream = connect(host, port).await?;
    let heartbeat = read_heartbeat(&mut stream).await?;
    print_heartbeat(&heartbeat, format)?;
    Ok(())
}

async fn handle_monitor(
    host: &str,
    port: u16,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut stream = connect(host, port).await?;
    println!("{}", "Monitoring heartbeats, Ctrl+C to stop...".cyan());
    loop {
        tokio::select! {
            heartbeat = read_heartbeat(&mut stream) => {
                print_heartbeat(&heartbeat?, format)?;
            }
            _ = tokio::signal::ctrl_c() => {
                println!("{}", "Monitor stopped.".yellow());
                return Ok(());
            }
        }
    }
}

async fn send_control(
    host: &str,
    port: u16,
    control: &Control,
    format: &str,
    action: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut stream = connect(host, port).await?;
    let body = protocol::encode_control(control)?;
    timeout(IO_TIMEOUT, write_frame(&mut stream, &body)).await??;

    // The next heartbeat reflects the applied command.
    let heartbeat = read_heartbeat(&mut stream).await?;
    println!("{} {}", "✅".green(), format!("{action} sent").bold());
    print_heartbeat(&heartbeat, format)?;
    Ok(())
}

async fn connect(host: &str, port: u16) -> Result<TcpStream, Box<dyn std::error::Error>> {
    let addr = format!("{host}:{port}");
    match timeout(IO_TIMEOUT, TcpStream::connect(&addr)).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(e)) => {
            eprintln!(
                "{} {}",
                "❌ Failed to connect to vehicle at".red(),
                addr.red().bold()
            );
            Err(e.into())
        }
        Err(_) => Err(format!("connection to {addr} timed out").into()),
    }
}

async fn write_frame(
    stream: &mut TcpStream,
    body: &[u8],
) -> Result<(), Box<dyn std::error::Error>> {
    stream.write_all(&(body.len() as u32).to_be_bytes()).await?;
    stream.write_all(body).await?;
    stream.flush().await?;
    Ok(())
}

async fn read_heartbeat(stream: &mut TcpStream) -> Result<Heartbeat, Box<dyn std::error::Error>> {
    let mut header = [0u8; 4];
    timeout(IO_TIMEOUT, stream.read_exact(&mut header)).await??;
    let len = u32::from_be_bytes(header) as usize;
    if len > MAX_MESSAGE_LEN {
        return Err(format!("vehicle sent oversized frame ({len} bytes)").into());
    }
    let mut body = vec![0u8; len];
    timeout(IO_TIMEOUT, stream.read_exact(&mut body)).await??;
    match protocol::decode(&body)? {
        Message::Heartbeat(heartbeat) => Ok(heartbeat),
        Message::Control(_) => Err("unexpected control message from vehicle".into()),
    }
}

fn print_heartbeat(
    heartbeat: &Heartbeat,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        "json" => println!("{}", serde_json::to_string_pretty(heartbeat)?),
        "compact" => {
            let state = format!("{:?}", heartbeat.supervisor);
            println!(
                "#{} up={}ms state={} batt={:.1}V soc={}% rx={} tx={} err={}",
                heartbeat.sequence,
                heartbeat.uptime_ms,
                state,
                heartbeat.power_board.battery_voltage,
                heartbeat.power_board.state_of_charge,
                heartbeat.frames_rx,
                heartbeat.frames_tx,
                heartbeat.decode_errors,
            );
        }
        _ => print_heartbeat_table(heartbeat),
    }
    Ok(())
}

fn print_heartbeat_table(heartbeat: &Heartbeat) {
    let state = format!("{:?}", heartbeat.supervisor);
    let state_colored = match state.as_str() {
        "Armed" => state.green().bold(),
        "Failsafe" => state.red().bold(),
        _ => state.yellow().bold(),
    };

    println!("{}", "─".repeat(52));
    println!(
        "Heartbeat #{}  uptime {} ms  state {}",
        heartbeat.sequence.to_string().bold(),
        heartbeat.uptime_ms,
        state_colored
    );
    println!(
        "Battery: {:.1} V ({}%)   Main switch: {}   Temp: {:.1} °C",
        heartbeat.power_board.battery_voltage,
        heartbeat.power_board.state_of_charge,
        if heartbeat.power_board.main_switch_enabled {
            "on".green()
        } else {
            "off".red()
        },
        heartbeat.power_board.temperature,
    );
    if !heartbeat.power_board.is_connected {
        println!("{}", "⚠️  Power board not responding".red().bold());
    }

    println!("Thrusters:");
    for t in &heartbeat.thrusters {
        let measured = t
            .measured_velocity
            .map_or_else(|| "  n/a".to_string(), |v| format!("{v:+.2}"));
        let flag = if t.online { "".normal() } else { " OFFLINE".red() };
        println!(
            "  [{}] cmd {:+.2}  meas {}  {}{}",
            t.id,
            t.command_velocity,
            measured,
            if t.enabled { "enabled".green() } else { "disabled".yellow() },
            flag,
        );
    }

    let buses: Vec<String> = heartbeat
        .power_board
        .switches
        .iter()
        .map(|s| {
            if s.enabled {
                format!("{}", s.id.to_string().green())
            } else {
                s.id.to_string()
            }
        })
        .collect();
    println!("Buses on/off: [{}]", buses.join(" "));
    println!(
        "Lights: {:?}   Link: rx {} tx {} decode-errors {}",
        heartbeat.lights, heartbeat.frames_rx, heartbeat.frames_tx, heartbeat.decode_errors,
    );
    if let Some(depth) = heartbeat.environment.depth_m {
        println!("Depth: {depth:.2} m");
    }
    println!("{}", "─".repeat(52));
}
