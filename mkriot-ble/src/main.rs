//! Command line client for the MKR IoT Carrier
//!
//! Talks to the carrier's sensor firmware (telemetry, relays, buzzer, LEDs)
//! or its alarm-clock firmware (alarm time and melody) over BLE.

mod app;
mod config;

use std::time::Duration;

use chrono::Timelike;
use clap::{Parser, Subcommand, ValueEnum};
use mkriot_ble_controller::{
    AlarmSettings, BtleTransport, Central, CentralEvent, DiscoveryFilter, Relay, event_channel,
};
use mkriot_proto::{
    AlarmConfig, ClockTime, LedCommand, MAX_TEXT_LEN, Melody, Profile, TimeError, Value, WireType,
};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing_subscriber::EnvFilter;

use app::{AppState, format_reading};
use config::{Config, ProfileName};

#[derive(Parser)]
#[command(name = "mkriot-ble")]
#[command(about = "BLE client for the Arduino MKR IoT Carrier")]
struct Cli {
    /// Board firmware (defaults to the config file, then "sensor")
    #[arg(long, value_enum, global = true)]
    profile: Option<ProfileName>,
    /// Device name or address to connect to
    #[arg(short, long, global = true)]
    device: Option<String>,
    /// How long to scan when selecting a device
    #[arg(long, global = true)]
    scan_secs: Option<u64>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List nearby BLE devices
    Scan {
        /// Scan duration in seconds
        #[arg(short = 't', long)]
        duration: Option<u64>,
    },
    /// Connect and print telemetry as it arrives
    Monitor {
        /// Stop after this many seconds (default: until Ctrl-C)
        #[arg(short, long)]
        seconds: Option<u64>,
    },
    /// Switch a relay
    Relay { relay: Relay, state: Switch },
    /// Sound the buzzer at a frequency in Hz, 0 to silence it
    Buzzer { frequency: f64 },
    /// Set the colour of one LED
    #[command(allow_negative_numbers = true)]
    Led {
        index: u8,
        red: i32,
        green: i32,
        blue: i32,
    },
    /// Alarm clock firmware
    Alarm {
        #[command(subcommand)]
        command: AlarmCommand,
    },
    /// Melody tools that do not need a board
    Melody {
        #[command(subcommand)]
        command: MelodyCommand,
    },
}

#[derive(Subcommand)]
enum AlarmCommand {
    /// Program and arm the alarm, e.g. `alarm set 7:30 A4 C5@0.5 A4@2`
    Set {
        time: String,
        #[arg(required = true, num_args = 1..)]
        melody: Vec<String>,
    },
    /// Print the programmed alarm
    Show,
    /// Disarm the alarm
    Off,
    /// Set the board's clock to this computer's local time
    SyncTime,
}

#[derive(Subcommand)]
enum MelodyCommand {
    /// Validate a melody and print what would be sent
    Check {
        #[arg(required = true, num_args = 1..)]
        melody: Vec<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Switch {
    On,
    Off,
}

type CliResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

#[tokio::main]
async fn main() -> CliResult {
    let cli = Cli::parse();
    let config = Config::load()?.override_with(cli.profile, cli.device, cli.scan_secs);
    init_logging(&config.log);
    tracing::debug!(?config, "configuration loaded");

    match cli.command {
        Commands::Scan { duration } => scan(&config, duration).await,
        Commands::Monitor { seconds } => monitor(&config, seconds).await,
        Commands::Relay { relay, state } => {
            let session = Session::open(&config, ProfileName::Sensor).await?;
            let on = matches!(state, Switch::On);
            let result = session.central.set_relay(relay, on).await;
            session.finish(result.map(|()| println!("Relay {relay} {}", if on { "on" } else { "off" }))).await
        }
        Commands::Buzzer { frequency } => {
            let session = Session::open(&config, ProfileName::Sensor).await?;
            let result = session.central.set_buzzer(frequency).await;
            session.finish(result).await
        }
        Commands::Led { index, red, green, blue } => {
            let session = Session::open(&config, ProfileName::Sensor).await?;
            let command = LedCommand::masked(index, red, green, blue);
            let result = session.central.set_led(command).await;
            session.finish(result.map(|()| println!("{}", Value::Led(command)))).await
        }
        Commands::Alarm { command } => alarm(&config, command).await,
        Commands::Melody { command: MelodyCommand::Check { melody } } => check_melody(&melody.join(" ")),
    }
}

fn init_logging(fallback: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(fallback))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn local_now() -> Result<ClockTime, TimeError> {
    let now = chrono::Local::now();
    ClockTime::new(now.hour() as u8, now.minute() as u8)
}

fn filter_for(config: &Config, profile: &'static Profile) -> DiscoveryFilter {
    DiscoveryFilter::for_profile(profile).with_target(config.device.clone())
}

fn transport(config: &Config) -> BtleTransport {
    BtleTransport::new(Duration::from_secs(config.scan_secs))
}

async fn scan(config: &Config, duration: Option<u64>) -> CliResult {
    let secs = duration.unwrap_or(config.scan_secs);
    let profile = config.profile.profile();
    println!("Scanning for {} boards ({secs} seconds)...", profile.name);

    let devices = BtleTransport::new(Duration::from_secs(secs))
        .scan(&filter_for(config, profile))
        .await?;

    println!("\nFound {} devices:", devices.len());
    for device in devices {
        let rssi = device.rssi.map(|r| format!("{r} dBm")).unwrap_or_else(|| "N/A".to_string());
        let marker = if device.matches_profile { " [MATCH]" } else { "" };
        println!("  {} ({}) RSSI: {rssi}{marker}", device.name, device.address);
    }
    Ok(())
}

/// One connection, with its observer events folded into an [`AppState`]
struct Session {
    central: Central<BtleTransport>,
    profile: &'static Profile,
    events: UnboundedReceiver<CentralEvent>,
    state: AppState,
}

impl Session {
    /// Connect, printing progress. Alarm boards also get their clock set.
    async fn open(config: &Config, name: ProfileName) -> CliResult<Self> {
        let profile = name.profile();
        let (observer, events) = event_channel();
        let central = Central::with_filter(transport(config), profile, filter_for(config, profile), observer);
        let mut session = Session {
            central,
            profile,
            events,
            state: AppState::connecting(),
        };

        let central = session.central.clone();
        let connect = central.connect();
        tokio::pin!(connect);
        let result = loop {
            tokio::select! {
                result = &mut connect => break result,
                Some(event) = session.events.recv() => session.show(event),
            }
        };
        session.flush();
        result?;

        if name == ProfileName::Alarm {
            let now = local_now()?;
            if let Err(err) = session.central.set_local_time(now).await {
                session.central.disconnect().await;
                return Err(err.into());
            }
            println!("Board clock set to {now}");
        }
        Ok(session)
    }

    fn show(&mut self, event: CentralEvent) {
        if let CentralEvent::Status { text, .. } = &event {
            eprintln!("{text}");
        }
        self.state.apply(event);
    }

    fn flush(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            self.show(event);
        }
    }

    /// Disconnect, then report how the command went
    async fn finish<T>(mut self, result: Result<T, mkriot_ble_controller::Error>) -> CliResult {
        self.flush();
        self.central.disconnect().await;
        self.flush();
        result?;
        Ok(())
    }
}

async fn monitor(config: &Config, seconds: Option<u64>) -> CliResult {
    let mut session = Session::open(config, config.profile).await?;
    print!("{}", session.state.render(session.profile));

    let deadline = async {
        match seconds {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            _ = tokio::signal::ctrl_c() => break,
            event = session.events.recv() => match event {
                Some(CentralEvent::Value { channel, value }) => {
                    println!("{:<12} {}", channel.name(), format_reading(channel, &value));
                    session.state.apply(CentralEvent::Value { channel, value });
                }
                Some(CentralEvent::Disconnected) => {
                    session.show(CentralEvent::Disconnected);
                    break;
                }
                Some(other) => session.show(other),
                None => break,
            },
        }
    }

    if session.state.connected {
        println!();
        print!("{}", session.state.render(session.profile));
    }
    session.finish(Ok(())).await
}

async fn alarm(config: &Config, command: AlarmCommand) -> CliResult {
    match command {
        AlarmCommand::Set { time, melody } => {
            // reject bad input before touching the radio
            let alarm = AlarmConfig::parse(&time, &melody.join(" "))?;
            let session = Session::open(config, ProfileName::Alarm).await?;
            let result = session.central.configure_alarm(&alarm, local_now()?).await;
            session.finish(result.map(|()| println!("Alarm set for {}", alarm.time))).await
        }
        AlarmCommand::Show => {
            let session = Session::open(config, ProfileName::Alarm).await?;
            let result = session.central.read_settings().await;
            if let Ok(settings) = &result {
                print_settings(settings);
            }
            session.finish(result).await
        }
        AlarmCommand::Off => {
            let session = Session::open(config, ProfileName::Alarm).await?;
            let result = session.central.set_alarm_enabled(false).await;
            session.finish(result.map(|()| println!("Alarm disabled"))).await
        }
        AlarmCommand::SyncTime => {
            // opening the session already set the clock
            let session = Session::open(config, ProfileName::Alarm).await?;
            session.finish(Ok(())).await
        }
    }
}

fn print_settings(settings: &AlarmSettings) {
    let armed = if settings.enabled { "on" } else { "off" };
    println!("Alarm:  {} ({armed})", settings.time);
    println!("Melody: {}", settings.melody);
}

fn check_melody(input: &str) -> CliResult {
    let melody = Melody::parse(input)?;
    let wire = melody.to_wire();
    println!("Steps:    {}", melody.steps().len());
    println!("Editable: {melody}");
    println!("Wire:     {wire} ({} of {MAX_TEXT_LEN} bytes)", wire.len());
    WireType::Text.encode(&Value::Text(wire))?;
    Ok(())
}
