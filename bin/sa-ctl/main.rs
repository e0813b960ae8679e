use clap::{Parser, Subcommand, ValueEnum};
use env_logger::Env;
use log::{error, info};
use rusty_span::{load_config_or_default, ScpiError, SpectrumAnalyzer, DEFAULT_TRACE};
use std::path::PathBuf;

/// Spectrum analyzer control tool
#[derive(Parser, Debug)]
#[command(name = "sa-ctl")]
#[command(about = "Control a Keysight MXA spectrum analyzer over SCPI", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Instrument address (host:port), overrides the configuration
    #[arg(short, long, value_name = "ADDR")]
    address: Option<String>,

    /// Override log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Identify the instrument and read back the core parameters
    Status,
    /// Read one parameter
    Get { param: Param },
    /// Set one parameter (frequency values in Hz, reference level in dBm)
    Set { param: Param, value: f64 },
    /// Measurement mode and trace setup
    Setup {
        /// Switch to the swept spectrum analyzer measurement mode
        #[arg(long)]
        san: bool,
        /// Put the active trace into averaging mode
        #[arg(long)]
        average: bool,
    },
    /// Marker peak search
    Peak {
        /// Search for the lowest peak instead of the highest
        #[arg(long)]
        low: bool,
    },
    /// Band power over the given span
    BandPower {
        /// Band span in Hz
        span_hz: f64,
    },
    /// Occupied bandwidth measurement
    Obw {
        /// Symbol rate in Ksps
        #[arg(long)]
        symbol_rate: Option<f64>,
        /// Spreading factor
        #[arg(long)]
        spread_factor: Option<u32>,
        /// Transmit roll-off factor
        #[arg(long)]
        roll_off: Option<f64>,
    },
    /// Fetch a trace and write it as CSV (or JSON)
    Trace {
        /// Trace register to fetch
        #[arg(long, default_value = DEFAULT_TRACE)]
        name: String,
        /// Output path
        #[arg(short, long, default_value = "spectrum_trace.csv")]
        output: PathBuf,
        /// Write JSON instead of CSV
        #[arg(long)]
        json: bool,
    },
    /// Capture the instrument screen to a local PNG
    Screenshot {
        /// Local output path (timestamped name when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Leave the remote copy in place instead of deleting it
        #[arg(long)]
        keep_remote: bool,
    },
    /// Delete a remote file left behind by a capture
    Delete {
        /// Exact remote path as returned by a capture
        remote_path: String,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Param {
    CenterFreq,
    Span,
    Rbw,
    RefLevel,
}

fn main() {
    let args = Args::parse();
    let mut config = load_config_or_default(args.config.as_deref());
    if let Some(address) = &args.address {
        config.instrument.address = address.clone();
    }

    let log_level = args
        .log_level
        .clone()
        .unwrap_or_else(|| config.logging.log_level.clone());
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    let mut analyzer = SpectrumAnalyzer::from_config(&config);
    info!("connecting to {}", config.instrument.address);
    if let Err(e) = analyzer.connect() {
        error!("connection failed: {e}");
        std::process::exit(1);
    }

    let outcome = run(&mut analyzer, &args.command);
    analyzer.disconnect();

    if let Err(e) = outcome {
        error!("{e}");
        std::process::exit(1);
    }
}

fn run(analyzer: &mut SpectrumAnalyzer, command: &Command) -> Result<(), ScpiError> {
    match command {
        Command::Status => {
            println!("identity:         {}", analyzer.identify()?);
            println!("center frequency: {} Hz", analyzer.get_center_frequency()?);
            println!("span:             {} Hz", analyzer.get_span()?);
            println!("rbw:              {} Hz", analyzer.get_rbw()?);
            println!("reference level:  {} dBm", analyzer.get_ref_level()?);
        }
        Command::Get { param } => {
            let value = match param {
                Param::CenterFreq => analyzer.get_center_frequency()?,
                Param::Span => analyzer.get_span()?,
                Param::Rbw => analyzer.get_rbw()?,
                Param::RefLevel => analyzer.get_ref_level()?,
            };
            println!("{value}");
        }
        Command::Set { param, value } => {
            match param {
                Param::CenterFreq => analyzer.set_center_frequency(*value)?,
                Param::Span => analyzer.set_span(*value)?,
                Param::Rbw => analyzer.set_rbw(*value)?,
                Param::RefLevel => analyzer.set_ref_level(*value)?,
            }
            info!("{param:?} set to {value}");
        }
        Command::Setup { san, average } => {
            if *san {
                analyzer.select_spectrum_analyzer_mode()?;
            }
            if *average {
                analyzer.set_trace_average()?;
            }
        }
        Command::Peak { low } => {
            let reading = if *low {
                analyzer.peak_low()?
            } else {
                analyzer.peak_high()?
            };
            println!("{reading}");
        }
        Command::BandPower { span_hz } => {
            println!("{}", analyzer.band_power(*span_hz)?);
        }
        Command::Obw {
            symbol_rate,
            spread_factor,
            roll_off,
        } => {
            println!(
                "{}",
                analyzer.occupied_bandwidth(*symbol_rate, *spread_factor, *roll_off)?
            );
        }
        Command::Trace { name, output, json } => {
            let trace = analyzer.fetch_trace(name)?;
            if *json {
                let rendered = serde_json::to_string_pretty(&trace)
                    .map_err(|e| ScpiError::Protocol(format!("serializing trace: {e}")))?;
                std::fs::write(output, rendered)
                    .map_err(|e| ScpiError::io(format!("writing {}", output.display()), e))?;
            } else {
                trace.write_csv(output)?;
            }
            info!("wrote {} points to {}", trace.len(), output.display());
        }
        Command::Screenshot {
            output,
            keep_remote,
        } => {
            let capture = analyzer.capture_screen(output.as_deref())?;
            println!("{}", capture.local_path.display());
            if !keep_remote && !analyzer.delete_remote_file(&capture.remote_path) {
                info!("remote copy left behind at {}", capture.remote_path);
            }
        }
        Command::Delete { remote_path } => {
            if !analyzer.delete_remote_file(remote_path) {
                return Err(ScpiError::Protocol(format!(
                    "delete of {remote_path} reported failure"
                )));
            }
        }
    }
    Ok(())
}
