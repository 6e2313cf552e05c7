//! IVI Monitor - Android logcat session monitor for device testing
//!
//! This is the binary entry point. All logic lives in the workspace crates.

mod output;
mod run;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use ivimon_core::LogLevel;

/// IVI Monitor - Android logcat session monitor for device testing
#[derive(Parser, Debug)]
#[command(name = "ivimon")]
#[command(about = "Stream, filter, and archive Android logcat", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List connected devices
    Devices {
        /// Machine-readable JSON output
        #[arg(long)]
        json: bool,
    },

    /// Monitor a device until interrupted
    Monitor {
        /// Device serial or model name (defaults to the only ready device)
        #[arg(short, long, value_name = "DEVICE")]
        device: Option<String>,

        /// Minimum level to display: V, D, I, W, E, F or a name like "warn"
        #[arg(short = 'l', long, value_name = "LEVEL")]
        min_level: Option<LogLevel>,

        /// Only display records whose tag matches this regex
        #[arg(short, long, value_name = "REGEX")]
        tag: Option<String>,

        /// Only display records whose message matches this regex
        #[arg(short, long, value_name = "REGEX")]
        message: Option<String>,

        /// Only display records from these pid/tid values
        #[arg(long, value_name = "IDS", value_delimiter = ',')]
        pid_tid: Vec<i32>,

        /// Archive raw lines into this directory, rotated by size
        #[arg(long, value_name = "DIR")]
        archive_dir: Option<PathBuf>,

        /// Clear the device-side log buffer before streaming (overrides the
        /// config when it disables the clear)
        #[arg(long, conflicts_with = "no_clear")]
        clear: bool,

        /// Keep the device-side log buffer instead of clearing it first
        #[arg(long)]
        no_clear: bool,

        /// Resize the device-side log buffer (e.g. "20M") before streaming
        #[arg(long, value_name = "SIZE")]
        buffer_size: Option<String>,

        /// Machine-readable NDJSON event output
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> ivimon_core::Result<()> {
    let args = Args::parse();

    match args.command {
        Command::Devices { json } => run::run_devices(json).await,
        Command::Monitor {
            device,
            min_level,
            tag,
            message,
            pid_tid,
            archive_dir,
            clear,
            no_clear,
            buffer_size,
            json,
        } => {
            run::run_monitor(run::MonitorOptions {
                device,
                min_level,
                tag,
                message,
                pid_tid,
                archive_dir,
                clear,
                no_clear,
                buffer_size,
                json,
            })
            .await
        }
    }
}
