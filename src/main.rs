//! joylog CLI: log decoded joystick/gamepad reports to CSV or JSON-lines.

use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::error;

use joylog::config::Config;
use joylog::writer::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "joylog", version, about = "Raw Input joystick/gamepad logger")]
struct Cli {
    /// Output file path (default: joylog.csv).
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Output format.
    #[arg(short, long, value_enum)]
    format: Option<OutputFormat>,

    /// Only log devices whose name contains this substring
    /// (case-insensitive), e.g. "VID_044F" or "Thrustmaster".
    #[arg(short, long)]
    device: Option<String>,

    /// Print a one-line summary of each record to stdout.
    #[arg(short, long)]
    print: bool,

    /// List raw input devices and exit.
    #[arg(short, long)]
    list: bool,

    /// Optional TOML config file supplying defaults for the flags above.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

/// Effective settings after merging CLI flags over config-file defaults.
struct Settings {
    out: PathBuf,
    format: OutputFormat,
    device: Option<String>,
    print: bool,
}

impl Settings {
    fn merge(cli: &Cli, config: Config) -> Self {
        Self {
            out: cli
                .out
                .clone()
                .or(config.out)
                .unwrap_or_else(|| PathBuf::from("joylog.csv")),
            format: cli.format.or(config.format).unwrap_or_default(),
            device: cli.device.clone().or(config.device),
            print: cli.print || config.print.unwrap_or(false),
        }
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), Box<dyn Error>> {
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    let settings = Settings::merge(cli, config);
    run_platform(cli, &settings)
}

#[cfg(target_os = "windows")]
fn run_platform(cli: &Cli, settings: &Settings) -> Result<(), Box<dyn Error>> {
    use joylog::backends::windows::WinRawInputSource;
    use joylog::source::RawInputSource;
    use joylog::writer::EventWriter;
    use joylog::LogSession;

    let mut source = WinRawInputSource::new()?;

    let devices = source.devices();
    if devices.is_empty() {
        println!("No raw input devices found.");
    } else {
        println!("Raw input devices:");
        for entry in &devices {
            match entry.identity {
                Some(id) => println!(
                    "- handle={:#x} vid={:04x} pid={:04x} usage_page={:#04x} usage={:#04x} name={}",
                    entry.handle, id.vendor_id, id.product_id, id.usage_page, id.usage, entry.name
                ),
                None => println!("- handle={:#x} name={}", entry.handle, entry.name),
            }
        }
    }
    if cli.list {
        return Ok(());
    }

    let writer = EventWriter::create(&settings.out, settings.format)?;
    let mut session = LogSession::new(writer, settings.device.as_deref(), settings.print);
    println!(
        "Logging to {} ({:?}). Ctrl+C to stop.",
        settings.out.display(),
        settings.format
    );
    session.run(&mut source)?;
    Ok(())
}

#[cfg(not(target_os = "windows"))]
fn run_platform(_cli: &Cli, _settings: &Settings) -> Result<(), Box<dyn Error>> {
    Err("no raw input backend for this platform; only Windows is supported".into())
}
