//! # rich_daq_cli
//!
//! Part of the rich_daq crate family.
//!
//! This is the command line application to decode RICH raw data files into hit lists, and
//! to encode hit lists into raw data files.
//!
//! ## Install
//!
//! Use `cargo install --path ./rich_daq_cli`
//!
//! ## Use
//!
//! Make a template configuration with
//!
//! ```bash
//! rich_daq_cli -p config.yml new
//! ```
//!
//! Edit it, then run one of
//!
//! ```bash
//! rich_daq_cli -p config.yml decode
//! rich_daq_cli -p config.yml encode
//! ```
//!
//! Progress is shown in the terminal; everything else goes to `rich_daq.log`.
use clap::{Arg, Command};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::mpsc::{channel, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;

use librich_daq::config::Config;
use librich_daq::process::process;
use librich_daq::worker_status::{BarColor, Task, WorkerStatus};

fn bar_style(color: &BarColor) -> ProgressStyle {
    let template = match color {
        BarColor::CYAN => "{spinner} [{elapsed_precise}] {bar:40.cyan/blue} {percent}% {msg}",
        BarColor::GREEN => "{spinner} [{elapsed_precise}] {bar:40.green/blue} {percent}% {msg}",
        BarColor::RED => "{spinner} [{elapsed_precise}] {bar:40.red/blue} {percent}% {msg}",
    };
    ProgressStyle::with_template(template).unwrap_or_else(|_| ProgressStyle::default_bar())
}

fn main() {
    // Create a cli
    let matches = Command::new("rich_daq_cli")
        .arg_required_else_help(true)
        .subcommand(Command::new("new").about("Make a template configuration yaml file"))
        .subcommand(Command::new("decode").about("Decode a raw data file into a hit list"))
        .subcommand(Command::new("encode").about("Encode a hit list into a raw data file"))
        .arg(
            Arg::new("path")
                .short('p')
                .long("path")
                .required(true)
                .help("Path to the configuration file"),
        )
        .get_matches();

    // Setup logging to a file
    let file_sink = Arc::new(
        spdlog::sink::FileSink::builder()
            .path(PathBuf::from("./rich_daq.log"))
            .formatter(Box::new(spdlog::formatter::PatternFormatter::new(
                spdlog::formatter::pattern!(
                    "[{date_short} {time_short}] - [thread: {tid}] - [{^{level}}] - {payload}{eol}"
                ),
            )))
            .truncate(true)
            .build()
            .expect("Could not create the log file!"),
    );
    let logger = Arc::new(
        spdlog::Logger::builder()
            .flush_level_filter(spdlog::LevelFilter::All)
            .sink(file_sink)
            .build()
            .expect("Could not create the logger!"),
    );
    spdlog::set_default_logger(logger);

    // Parse the cli
    let config_path = PathBuf::from(matches.get_one::<String>("path").expect("We require args"));

    let task = match matches.subcommand() {
        Some(("new", _)) => {
            spdlog::info!(
                "Making a template config at {}...",
                config_path.to_string_lossy()
            );
            match Config::default().write_config_file(&config_path) {
                Ok(()) => spdlog::info!("Done."),
                Err(e) => {
                    spdlog::error!("{e}");
                    eprintln!("Could not write the template config: {e}");
                }
            }
            return;
        }
        Some(("encode", _)) => Task::Encode,
        _ => Task::Decode,
    };

    // Load our config
    spdlog::info!("Loading config from {}...", config_path.to_string_lossy());
    let config = match Config::read_config_file(&config_path) {
        Ok(c) => c,
        Err(e) => {
            spdlog::error!("{e}");
            eprintln!("Could not load the config: {e}");
            return;
        }
    };
    spdlog::info!("Config successfully loaded.");
    spdlog::info!("Input Path: {}", config.input_path.to_string_lossy());
    spdlog::info!("Output Path: {}", config.output_path.to_string_lossy());
    match &config.cabling_path {
        Some(p) => spdlog::info!("Cabling Path: {}", p.to_string_lossy()),
        None => spdlog::info!("Cabling Path: Default"),
    }
    spdlog::info!("Task: {task:?}");
    match task {
        Task::Encode => spdlog::info!(
            "Bank Version: {:?} Zero Suppression Hit Cut: {}",
            config.bank_version,
            config.zero_suppress_hit_cut
        ),
        Task::Decode => {
            spdlog::info!(
                "Max HPD Occupancy: {} Hot Pixels: {}",
                config.max_hpd_occupancy,
                config.hot_pixels.len()
            );
            spdlog::info!(
                "Checks - Event IDs: {} ODIN Event IDs: {} ODIN BX IDs: {} Board IDs: {} Parity: {} Data Size: {}",
                config.check_event_ids,
                config.check_odin_event_ids,
                config.check_odin_bx_ids,
                config.check_board_ids,
                config.check_parity,
                config.check_data_size
            );
            spdlog::info!(
                "Decode RICH1: {} Decode RICH2: {} TAE Locations: {:?}",
                config.decode_rich1,
                config.decode_rich2,
                config.tae_locations
            );
        }
    }

    // Setup the progress bar
    let pb = ProgressBar::new(100);
    pb.set_style(bar_style(&task.color()));
    let (tx, rx) = channel::<WorkerStatus>();
    // Spawn the task!
    let handle = std::thread::spawn(move || process(config, tx, task));

    loop {
        match rx.recv_timeout(Duration::from_millis(500)) {
            Ok(status) => {
                pb.set_position((status.progress * 100.0) as u64);
                pb.set_message(format!("{} events", status.events));
            }
            // The worker drops its sender when it is done
            Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => (),
        }
        if handle.is_finished() {
            // Drain whatever was sent before the worker exited
            while let Ok(status) = rx.try_recv() {
                pb.set_position((status.progress * 100.0) as u64);
                pb.set_message(format!("{} events", status.events));
            }
            break;
        }
    }

    match handle.join() {
        Ok(Ok(())) => {
            spdlog::info!("Successfully processed data!");
            pb.finish_with_message("Done.");
        }
        Ok(Err(e)) => {
            spdlog::error!("Processing failed with error: {e}");
            pb.set_style(bar_style(&BarColor::RED));
            pb.abandon_with_message(format!("Failed: {e}. See rich_daq.log"));
        }
        Err(_) => {
            spdlog::error!("Failed to join processing task!");
            pb.set_style(bar_style(&BarColor::RED));
            pb.abandon_with_message("Failed to join processing task!");
        }
    }

    spdlog::info!("Done.");
}
