use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{debug, error};
use uf2_core::device::VolumeScanner;
use uf2_core::family::{FamilyError, parse_u32};
use uf2_core::session::{FlashSession, SessionConfig};

mod console;

use console::ConsoleObserver;

#[derive(Parser, Debug)]
#[command(author, version, about = "Convert to UF2 or flash directly", long_about = None)]
struct Args {
    /// Input file (HEX, BIN or UF2)
    #[arg(value_name = "INPUT")]
    input: Option<PathBuf>,

    /// Base address of the application for BIN input (default: 0x2000)
    #[arg(short, long, value_parser = parse_address)]
    base: Option<u32>,

    /// Family ID, number or name (default: 0x0)
    #[arg(short, long)]
    family: Option<String>,

    /// Write output to this file; defaults to "flash.uf2" or "flash.bin" where sensible
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Flash this device path instead of searching
    #[arg(short, long)]
    device: Option<PathBuf>,

    /// List connected devices
    #[arg(short, long)]
    list: bool,

    /// Do not flash, just convert
    #[arg(short, long, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    convert: Option<bool>,

    /// Just flash, do not convert
    #[arg(short = 'D', long, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    deploy: Option<bool>,

    /// Wait for a device to flash
    #[arg(short, long, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    wait: Option<bool>,

    /// Convert a binary file to a C array, not UF2
    #[arg(short = 'C', long, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    carray: Option<bool>,

    /// Display header information from UF2, do not convert
    #[arg(short, long, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    info: Option<bool>,

    /// Load defaults from a TOML file; flags override it
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn parse_address(literal: &str) -> Result<u32, FamilyError> {
    parse_u32(literal)
}

impl Args {
    /// Overlay the command line onto a base configuration.
    fn into_config(self, mut config: SessionConfig) -> SessionConfig {
        if self.input.is_some() {
            config.input = self.input;
        }
        if let Some(base) = self.base {
            config.base = base;
        }
        if let Some(family) = self.family {
            config.family = family;
        }
        if self.output.is_some() {
            config.output = self.output;
        }
        if self.device.is_some() {
            config.device = self.device;
        }
        // `--flag=false` turns off a flag set in the config file
        let flags = [
            (self.convert, &mut config.convert),
            (self.deploy, &mut config.deploy),
            (self.wait, &mut config.wait),
            (self.carray, &mut config.carray),
            (self.info, &mut config.info),
        ];
        for (arg, value) in flags {
            if let Some(arg) = arg {
                *value = arg;
            }
        }
        config
    }
}

fn run(args: Args) -> Result<()> {
    let list = args.list;
    let base = match &args.config {
        Some(path) => SessionConfig::load_from_file(path)?,
        None => SessionConfig::default(),
    };
    let config = args.into_config(base);
    debug!(?config, "Session configuration");

    let session = FlashSession::with_parts(
        config,
        VolumeScanner::platform_default(),
        Arc::new(ConsoleObserver),
    );

    if list {
        // A bad --family is still an error here
        session.context()?;
        for drive in session.list_drives()? {
            println!("{}", drive);
        }
        return Ok(());
    }

    let report = session.run()?;
    debug!(outcome = ?report.outcome, size = report.output_size, "Done");
    Ok(())
}

fn main() {
    let args = Args::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(if args.verbose {
                    tracing::Level::DEBUG.into()
                } else {
                    tracing::Level::INFO.into()
                })
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    if let Err(e) = run(args) {
        error!("{:#}", e);
        std::process::exit(1);
    }
}
