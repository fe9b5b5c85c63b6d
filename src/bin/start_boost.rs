//! One-shot boost trigger
//!
//! Connects to the ventilation bridge, starts boost mode for the requested
//! duration and disconnects again.
//!
//! Exit codes: 1 on discovery/auth/command failure, 2 on bad arguments.

use std::env;
use std::net::{IpAddr, SocketAddr};
use std::process;
use std::time::Duration;

use vayulink::config::AppConfig;
use vayulink::discovery::{discover_at_address, discover_broadcast};
use vayulink::protocol::boost_start;
use vayulink::{BridgeIdentity, Error, LocalIdentity, Session, SessionOptions, BRIDGE_PORT};

/// This client's identity towards the bridge
const LOCAL_UUID: [u8; 16] = [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x05];
const LOCAL_NAME: &str = "vayulink";

/// Default boost duration: 30 minutes
const DEFAULT_DURATION_SECS: u64 = 1800;

/// Discovery wait per probe
const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(2);

struct Args {
    configfile: String,
    logfile: Option<String>,
    debug: bool,
    duration_secs: u64,
}

fn print_usage(program: &str) {
    eprintln!(
        "Usage: {} [--duration SECONDS] [--configfile PATH] [--logfile PATH] [--debug]",
        program
    );
}

fn parse_args() -> Args {
    let argv: Vec<String> = env::args().collect();
    let mut args = Args {
        configfile: "vayulink.toml".to_string(),
        logfile: None,
        debug: false,
        duration_secs: DEFAULT_DURATION_SECS,
    };

    let mut i = 1;
    while i < argv.len() {
        match argv[i].as_str() {
            "--duration" if i + 1 < argv.len() => {
                args.duration_secs = match argv[i + 1].parse() {
                    Ok(secs) => secs,
                    Err(_) => {
                        eprintln!("Invalid duration: {}", argv[i + 1]);
                        process::exit(2);
                    }
                };
                i += 2;
            }
            "--configfile" if i + 1 < argv.len() => {
                args.configfile = argv[i + 1].clone();
                i += 2;
            }
            "--logfile" if i + 1 < argv.len() => {
                args.logfile = Some(argv[i + 1].clone());
                i += 2;
            }
            "--debug" => {
                args.debug = true;
                i += 1;
            }
            other => {
                eprintln!("Unknown argument: {}", other);
                print_usage(&argv[0]);
                process::exit(2);
            }
        }
    }

    args
}

fn init_logging(args: &Args, config_level: &str) {
    // --debug wins over the configured level
    let default_level = if args.debug { "debug" } else { config_level };
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level));

    if let Some(path) = &args.logfile {
        match std::fs::File::create(path) {
            Ok(file) => {
                builder.target(env_logger::Target::Pipe(Box::new(file)));
            }
            Err(e) => eprintln!("Cannot open log file {}: {}", path, e),
        }
    }

    builder.init();
}

/// Direct-address discovery when configured, broadcast fallback otherwise
fn discover_bridge(config: &AppConfig) -> vayulink::Result<BridgeIdentity> {
    match &config.bridge.address {
        Some(address) => {
            let ip: IpAddr = address.parse().map_err(|_| {
                log::error!("Invalid bridge address in config: {}", address);
                Error::DiscoveryFailed
            })?;
            discover_at_address(SocketAddr::new(ip, BRIDGE_PORT), DISCOVERY_TIMEOUT)?
                .ok_or(Error::DiscoveryFailed)
        }
        None => discover_broadcast(DISCOVERY_TIMEOUT)?
            .into_iter()
            .next()
            .ok_or(Error::DiscoveryFailed),
    }
}

fn main() {
    let args = parse_args();

    let config = match AppConfig::from_file(&args.configfile) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config {}: {}", args.configfile, e);
            process::exit(1);
        }
    };

    init_logging(&args, &config.logging.level);

    log::info!(
        "vayulink boost trigger starting (duration {} s)",
        args.duration_secs
    );

    // Validate before touching the network
    let boost = match boost_start(args.duration_secs) {
        Ok(cmd) => cmd,
        Err(e) => {
            log::error!("Invalid boost duration {}: {}", args.duration_secs, e);
            process::exit(1);
        }
    };

    let bridge = match discover_bridge(&config) {
        Ok(bridge) => bridge,
        Err(e) => {
            log::error!("{}", e);
            process::exit(1);
        }
    };

    let local = LocalIdentity::new(LOCAL_UUID, LOCAL_NAME);
    let mut session = match Session::connect(
        bridge,
        local,
        config.bridge.pin,
        true, // evict any stale client
        Box::new(|sensor, value| log::debug!("{} = {}", sensor.name, value)),
        SessionOptions::default(),
    ) {
        Ok(session) => session,
        Err(e) => {
            log::error!("Failed to connect: {}", e);
            process::exit(1);
        }
    };

    match session.cmd_rmi_request(&boost) {
        Ok(_) => log::info!("Boost started for {} seconds", args.duration_secs),
        Err(e) => {
            log::error!("Boost command failed: {}", e);
            session.disconnect();
            process::exit(1);
        }
    }

    log::info!("Disconnecting...");
    session.disconnect();
}
