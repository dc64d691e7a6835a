//! LC-3 VM - CLI Entry Point
//!
//! `lc3-vm [OPTIONS] <IMAGE>...` loads every image in order, then runs from
//! 0x3000 until the program halts.

use clap::Parser;
use lc3::{load_image, CancelToken, Cpu, CpuError, RawModeGuard, TerminalConsole};
use std::fs::File;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// Exit code when an image cannot be loaded.
const EXIT_LOAD_ERROR: i32 = 1;
/// Exit code when the CPU faults.
const EXIT_FAULT: i32 = 3;
/// Exit code after Ctrl-C.
const EXIT_INTERRUPTED: i32 = 130;

#[derive(Parser)]
#[command(name = "lc3-vm")]
#[command(version = "0.1.0")]
#[command(about = "A virtual machine for the LC-3 educational computer")]
struct Cli {
    /// Object images to load, in order; later images overlay earlier ones
    #[arg(required = true, value_name = "IMAGE")]
    images: Vec<PathBuf>,

    /// Stop after this many instructions
    #[arg(short, long)]
    max_cycles: Option<u64>,

    /// How long a keyboard status read waits for a key, in milliseconds
    #[arg(long, default_value = "1000")]
    kbd_timeout_ms: u64,

    /// Log every executed instruction
    #[arg(short, long)]
    trace: bool,

    /// Write logs to this file instead of stderr
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Print the final registers as JSON on stderr
    #[arg(long)]
    dump_registers: bool,
}

fn main() {
    let cli = Cli::parse();
    std::process::exit(run(&cli));
}

fn init_logging(cli: &Cli) -> std::io::Result<()> {
    let filter = if cli.trace {
        EnvFilter::new("lc3=trace")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    match &cli.log_file {
        Some(path) => {
            let file = File::create(path)?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).init();
        }
        None => builder.with_writer(std::io::stderr).init(),
    }
    Ok(())
}

fn run(cli: &Cli) -> i32 {
    if let Err(e) = init_logging(cli) {
        eprintln!("lc3-vm: failed to open log file: {}", e);
    }

    // Load every image before anything executes
    let mut cpu = Cpu::new();
    for path in &cli.images {
        match load_image(path) {
            Ok(image) => {
                cpu.load_image(&image);
            }
            Err(e) => {
                eprintln!("lc3-vm: {}", e);
                return EXIT_LOAD_ERROR;
            }
        }
    }

    let cancel = CancelToken::new();
    let result = {
        let guard = match RawModeGuard::acquire() {
            Ok(guard) => Some(guard),
            Err(err) => {
                warn!(%err, "could not enable raw mode, input will be line buffered");
                None
            }
        };
        let timeout = Duration::from_millis(cli.kbd_timeout_ms);
        let mut console = TerminalConsole::new(timeout, cancel.clone(), guard.is_some());
        cpu.run_until_cancelled(&mut console, &cancel, cli.max_cycles)
        // guard dropped here, terminal restored before any reporting
    };

    if cli.dump_registers {
        match serde_json::to_string_pretty(&cpu.snapshot()) {
            Ok(json) => eprintln!("{}", json),
            Err(e) => eprintln!("lc3-vm: failed to dump registers: {}", e),
        }
    }

    match result {
        Ok(_) => 0,
        Err(CpuError::Interrupted) => {
            println!();
            EXIT_INTERRUPTED
        }
        Err(e) => {
            eprintln!("lc3-vm: {} (after {} instructions)", e, cpu.cycles);
            EXIT_FAULT
        }
    }
}
