//! voxbatch command line entry point
//!
//! Three commands:
//! 1. `say` - synthesize one text
//! 2. `batch` - synthesize every record of a text, CSV or JSON file
//! 3. `engines` - list the engines that were found and their ranking

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{debug, error, info, warn};
use nix::libc;
use nix::sys::signal::{self, SigHandler, Signal};
use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use voxbatch::audio::{extension_of, find_converter};
use voxbatch::batch::{BatchItem, BatchRunner, SharedParams};
use voxbatch::config::Config;
use voxbatch::dispatch::{OutcomeStatus, SynthesisDispatcher, SynthesisRequest};
use voxbatch::engine::{Capability, EngineRegistry};
use voxbatch::input::{self, InputFormat};

/// Global flag set by the SIGINT handler
static STOP_REQUESTED: AtomicBool = AtomicBool::new(false);

/// SIGINT handler - finish the current item, then stop the batch
extern "C" fn handle_sigint(_: libc::c_int) {
    STOP_REQUESTED.store(true, Ordering::Relaxed);
}

#[derive(Parser, Debug)]
#[command(name = voxbatch::APP_NAME)]
#[command(about = "Batch text-to-speech with voice cloning and engine fallback", long_about = None)]
#[command(version)]
struct Args {
    /// Configuration file (default: ~/.voxbatch.cfg)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Reference recording of the voice to clone
    #[arg(short, long, global = true)]
    voice: Option<PathBuf>,

    /// Language code, or "auto" to detect from the text
    #[arg(short, long, global = true)]
    language: Option<String>,

    /// Speaking speed (0.5 - 2.0)
    #[arg(short, long, global = true)]
    speed: Option<f32>,

    /// Print results as JSON
    #[arg(long, global = true, default_value_t = false)]
    json: bool,

    /// Write debug logs to voxbatch.log
    #[arg(short, long, global = true, default_value_t = false)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Synthesize a single text
    Say {
        /// Text to speak
        text: String,

        /// Output file; the extension selects the format
        #[arg(short, long, default_value = "speech.wav")]
        output: PathBuf,
    },
    /// Synthesize every record of an input file
    Batch {
        /// Text (one item per line), CSV or JSON file
        input: PathBuf,

        /// Input layout: lines, csv or json (default: from the extension)
        #[arg(short, long)]
        format: Option<String>,

        /// CSV column / JSON field holding the text
        #[arg(short, long)]
        column: Option<String>,

        /// Directory for the generated audio
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// File name prefix for generated audio
        #[arg(short, long)]
        prefix: Option<String>,
    },
    /// List available engines in ranking order
    Engines,
}

fn main() {
    let args = Args::parse();

    // Initialize logger
    if args.debug {
        // Debug mode: write to voxbatch.log file
        use std::fs::OpenOptions;
        match OpenOptions::new()
            .create(true)
            .append(true)
            .open("voxbatch.log")
        {
            Ok(log_file) => {
                env_logger::Builder::new()
                    .filter_level(log::LevelFilter::Debug)
                    .target(env_logger::Target::Pipe(Box::new(log_file)))
                    .init();
            }
            Err(e) => {
                eprintln!("Warning: Failed to open voxbatch.log for debug logging: {}", e);
                eprintln!("Continuing without file logging...");
                env_logger::Builder::new()
                    .filter_level(log::LevelFilter::Warn)
                    .init();
            }
        }

        info!(
            "voxbatch version {} starting (debug mode, logging to voxbatch.log)",
            voxbatch::VERSION
        );
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
            .init();
    }

    match run(args) {
        Ok(code) => process::exit(code),
        Err(e) => {
            error!("Fatal error: {:#}", e);
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}

/// Run the selected command, returning the process exit code
fn run(args: Args) -> Result<i32> {
    let config = match &args.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("Failed to load configuration")?;
    info!("Configuration loaded from {:?}", config.path());

    let registry = EngineRegistry::discover(&config)?;

    if let Commands::Engines = args.command {
        print_engines(&registry, args.json)?;
        return Ok(0);
    }

    let converter = match find_converter() {
        Ok(converter) => Some(converter),
        Err(e) => {
            warn!("{}", e);
            None
        }
    };
    let mut dispatcher =
        SynthesisDispatcher::from_config(registry, &config).with_converter(converter);

    let language = args
        .language
        .as_deref()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.eq_ignore_ascii_case("auto"))
        .map(str::to_string)
        .or_else(|| config.language());
    let speed = args.speed.unwrap_or_else(|| config.speed());

    match args.command {
        Commands::Say { text, output } => {
            let format = extension_of(&output);
            if !format.is_empty() {
                dispatcher = dispatcher.with_output_format(&format);
            }
            let request = SynthesisRequest::new(text, output.with_extension(""))
                .with_voice_reference(args.voice)
                .with_language(language)
                .with_speed(speed);
            say(&mut dispatcher, &request, args.json)
        }
        Commands::Batch {
            input,
            format,
            column,
            output_dir,
            prefix,
        } => {
            let format = format
                .as_deref()
                .map(str::parse::<InputFormat>)
                .transpose()?;
            let text_field = column.unwrap_or_else(|| config.text_field());
            let items = input::load(&input, format, &text_field)
                .with_context(|| format!("Failed to load {}", input.display()))?;

            let mut shared = SharedParams::from_config(&config)
                .with_voice_reference(args.voice)
                .with_language(language)
                .with_speed(speed);
            if let Some(dir) = output_dir {
                shared.output_dir = dir;
            }
            if let Some(prefix) = prefix {
                shared = shared.with_file_prefix(&prefix);
            }

            install_stop_handler()?;
            batch(&mut dispatcher, &items, &shared, args.json)
        }
        Commands::Engines => Ok(0),
    }
}

fn say(
    dispatcher: &mut SynthesisDispatcher,
    request: &SynthesisRequest,
    json: bool,
) -> Result<i32> {
    let outcome = dispatcher.dispatch(request);
    debug!("Dispatch trace: {:?}", outcome.trace);

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        for choice in outcome.substitutions() {
            println!(
                "⚠ Language '{}' spoken as '{}' by {}",
                choice.requested, choice.resolved, choice.engine
            );
        }
        match &outcome.status {
            OutcomeStatus::Success {
                output_path,
                engine_used,
                degraded,
                ..
            } => {
                if let Some(degradation) = degraded {
                    println!(
                        "⚠ Plain synthesis, not a cloned voice ({}: {})",
                        degradation.reason, degradation.message
                    );
                }
                println!("✅ Saved {} ({})", output_path.display(), engine_used);
            }
            OutcomeStatus::Failed { reason, message } => {
                println!("✗ Synthesis failed [{}]: {}", reason, message);
            }
        }
    }

    Ok(if outcome.is_success() { 0 } else { 1 })
}

fn batch(
    dispatcher: &mut SynthesisDispatcher,
    items: &[BatchItem],
    shared: &SharedParams,
    json: bool,
) -> Result<i32> {
    let report = BatchRunner::new(dispatcher)
        .with_stop_flag(&STOP_REQUESTED)
        .run(items, shared)
        .context("Batch could not start")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report.summary());
    }

    Ok(if report.has_failures() || !report.is_complete() {
        1
    } else {
        0
    })
}

fn print_engines(registry: &EngineRegistry, json: bool) -> Result<()> {
    if json {
        let descriptors: Vec<_> = registry.descriptors().collect();
        println!("{}", serde_json::to_string_pretty(&descriptors)?);
        return Ok(());
    }

    for (rank, descriptor) in registry.descriptors().enumerate() {
        let role = if descriptor.has(Capability::VoiceCloning) {
            "voice cloning"
        } else {
            "text-to-speech"
        };
        println!(
            "{}. {} ({}, {:?}) - {} languages, outputs {}",
            rank + 1,
            descriptor.id,
            role,
            descriptor.tier,
            descriptor.supported_languages.len(),
            descriptor.native_format
        );
    }
    Ok(())
}

fn install_stop_handler() -> Result<()> {
    // SAFETY: the handler only stores to an atomic
    unsafe {
        signal::signal(Signal::SIGINT, SigHandler::Handler(handle_sigint))
            .context("Failed to set SIGINT handler")?;
    }
    Ok(())
}
