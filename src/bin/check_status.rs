//! Continuous status forwarder
//!
//! Discovers the ventilation bridge, pairs with it, subscribes to the
//! status sensor set and forwards every decoded update as a `name=value`
//! UDP datagram to the target configured in the config file. Runs until
//! SIGINT/SIGTERM, then disconnects gracefully.
//!
//! Exit codes: 1 on discovery/auth failure or a mid-session error, 2 on
//! bad arguments.

use std::env;
use std::net::{IpAddr, SocketAddr, ToSocketAddrs, UdpSocket};
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;

use vayulink::config::AppConfig;
use vayulink::discovery::{discover_at_address, discover_broadcast};
use vayulink::sensors::{SensorCallback, SENSOR_FAN_SPEED_MODE};
use vayulink::{
    BridgeIdentity, Error, LocalIdentity, Session, SessionOptions, SessionState, BRIDGE_PORT,
};

/// This client's identity towards the bridge
const LOCAL_UUID: [u8; 16] = [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x05];
const LOCAL_NAME: &str = "vayulink";

/// Sensors forwarded by this tool
const STATUS_SENSORS: &[u16] = &[SENSOR_FAN_SPEED_MODE];

/// Discovery wait per probe
const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(2);

struct Args {
    configfile: String,
    logfile: Option<String>,
    debug: bool,
}

fn print_usage(program: &str) {
    eprintln!(
        "Usage: {} [--configfile PATH] [--logfile PATH] [--debug]",
        program
    );
}

fn parse_args() -> Args {
    let argv: Vec<String> = env::args().collect();
    let mut args = Args {
        configfile: "vayulink.toml".to_string(),
        logfile: None,
        debug: false,
    };

    let mut i = 1;
    while i < argv.len() {
        match argv[i].as_str() {
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

/// Fire-and-forget UDP sink for decoded sensor values
struct UdpForwarder {
    socket: UdpSocket,
    target: SocketAddr,
}

impl UdpForwarder {
    fn new(host: &str, port: u16) -> std::io::Result<Self> {
        let target = (host, port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "unresolvable host"))?;
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        Ok(Self { socket, target })
    }

    /// Send one `name=value` datagram; false means a fatal delivery problem
    fn forward(&self, name: &str, value: i64) -> bool {
        let datagram = format!("{}={}", name, value);
        match self.socket.send_to(datagram.as_bytes(), self.target) {
            Ok(n) if n == datagram.len() => {
                log::debug!("Forwarded {} to {}", datagram, self.target);
                true
            }
            Ok(n) => {
                log::error!(
                    "Sent bytes do not match - expected {}, got {}",
                    datagram.len(),
                    n
                );
                false
            }
            Err(e) => {
                log::error!("UDP send to {} failed: {}", self.target, e);
                false
            }
        }
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

    log::info!("vayulink status forwarder starting");
    log::info!("Using config file {}", args.configfile);

    if !config.bridge.enabled {
        log::info!("Disabled in config, exiting");
        return;
    }

    let forwarder =
        match UdpForwarder::new(&config.forward.target_host, config.forward.target_port) {
            Ok(forwarder) => forwarder,
            Err(e) => {
                log::error!(
                    "Cannot set up UDP forwarding to {}:{}: {}",
                    config.forward.target_host,
                    config.forward.target_port,
                    e
                );
                process::exit(1);
            }
        };

    // A delivery failure inside the callback must not block the read loop;
    // it raises this flag and the main loop exits.
    let fatal = Arc::new(AtomicBool::new(false));
    let callback_fatal = Arc::clone(&fatal);
    let callback: SensorCallback = Box::new(move |sensor, value| {
        log::info!("{} = {}", sensor.name, value);
        if !forwarder.forward(sensor.name, value) {
            callback_fatal.store(true, Ordering::Relaxed);
        }
    });

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
        callback,
        SessionOptions::default(),
    ) {
        Ok(session) => session,
        Err(e) => {
            log::error!("Failed to connect: {}", e);
            process::exit(1);
        }
    };

    match session.cmd_version_request() {
        Ok(version) => log::info!(
            "Bridge version {:#010x}, serial {}",
            version.gateway_version,
            version.serial
        ),
        Err(e) => log::warn!("Version request failed: {}", e),
    }

    for &sensor_id in STATUS_SENSORS {
        if let Err(e) = session.subscribe(sensor_id) {
            log::error!("Failed to subscribe sensor {}: {}", sensor_id, e);
            process::exit(1);
        }
    }

    let stop = Arc::new(AtomicBool::new(false));
    match Signals::new([SIGINT, SIGTERM]) {
        Ok(mut signals) => {
            let signal_stop = Arc::clone(&stop);
            thread::spawn(move || {
                if let Some(signal) = signals.forever().next() {
                    log::info!("Received signal {}, shutting down", signal);
                    signal_stop.store(true, Ordering::Relaxed);
                }
            });
        }
        Err(e) => log::warn!("Cannot install signal handler: {}", e),
    }

    log::info!("Forwarding sensor updates, press Ctrl+C to stop");

    while !stop.load(Ordering::Relaxed) {
        if fatal.load(Ordering::Relaxed) {
            log::error!("UDP forwarding failed, exiting");
            process::exit(1);
        }
        if session.state() != SessionState::Active {
            log::error!("Session lost (state {:?}), exiting", session.state());
            process::exit(1);
        }
        thread::sleep(Duration::from_millis(100));
    }

    log::info!("Disconnecting...");
    session.disconnect();
}
