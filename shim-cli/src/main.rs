//! portashim - run the portability shim on a terminal host.
//!
//! Usage:
//!   portashim [--profile host.json] [--root DIR] [--printer FILE] [--trace]
//!   portashim --probe
//!
//! Examples:
//!   portashim                        # Interactive demo guest
//!   portashim --root ./media         # Cassette and disk files under ./media
//!   portashim --profile pcjr.json    # Custom display candidates and palette
//!   portashim --probe                # Print the negotiated configuration

mod terminal;

use std::fs::OpenOptions;
use std::io::BufWriter;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;

use clap::Parser;
use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use tokio::sync::mpsc as tokio_mpsc;
use tracing::{warn, Level};

use shim_core::probe::probe_with_profile;
use shim_core::{
    load_profile_from_path, ChannelStatus, HostProfile, KeyEvent, NativeStorage, OpenMode, Shim,
};

use terminal::{translate_key, TerminalPlatform};

/// Portability shim terminal host
#[derive(Parser, Debug)]
#[command(name = "portashim")]
#[command(about = "Run a guest on the portability shim")]
struct Args {
    /// Host profile (JSON) with display candidates, devices and palette
    #[arg(short, long)]
    profile: Option<PathBuf>,

    /// Directory holding cassette and disk files
    #[arg(short, long, default_value = ".")]
    root: PathBuf,

    /// Enable trace logging on stderr
    #[arg(short, long)]
    trace: bool,

    /// Print the negotiated configuration as JSON and exit
    #[arg(long)]
    probe: bool,

    /// File receiving printer output (default: PRINTER.TXT under --root)
    #[arg(long)]
    printer: Option<PathBuf>,
}

type TerminalShim = Shim<TerminalPlatform, NativeStorage>;

/// Status line row of the demo guest.
const STATUS_ROW: u8 = 6;

/// Small interactive guest exercising each capability family.
fn run_guest(shim: &mut TerminalShim) {
    shim.screen_init();
    let config = shim.config().clone();
    shim.print_text(&format!(
        "PORTASHIM MODE {} {}X{}",
        config.mode_id, config.text_width, config.text_height
    ));
    shim.locate(0, 2);
    shim.print_text("T TONE  B BEEP  F FILE\nN NUMBER  R RANDOM\nESC OR Q QUITS");
    shim.highlight_block(0, 0, 9);

    loop {
        let key = shim.wait_key();
        if key.is_none() || key == KeyEvent::ESCAPE || key.as_char() == Some('Q') {
            break;
        }
        let status = match key.as_char() {
            Some('T') => {
                shim.tone(60.0, 100.0);
                "TONE".to_string()
            }
            Some('B') => {
                shim.beep();
                "BEEP".to_string()
            }
            Some('F') => file_demo(shim),
            Some('N') => {
                let value = shim.random() * 1000.0;
                format!("FIXED [{}]", shim.format_fixed(value, 8, 2))
            }
            Some('R') => {
                let value = shim.random();
                format!("RANDOM {}", shim.format_natural(value))
            }
            _ => format!("KEY {}", key.code),
        };
        show_status(shim, &status);
    }

    shim.finalize();
}

fn show_status(shim: &mut TerminalShim, text: &str) {
    let width = shim.config().text_width as usize;
    let mut line = shim.uppercase(text);
    line.truncate(width);
    shim.locate(0, STATUS_ROW);
    shim.print_text(&format!("{:<width$}", line, width = width.saturating_sub(1)));
}

/// Write a line on channel 3, read it back on channel 2.
fn file_demo(shim: &mut TerminalShim) -> String {
    let steps = [
        shim.file_open(3, OpenMode::Write, "demo.txt"),
        shim.file_write_line(3, "HELLO FROM THE SHIM"),
        shim.file_close(3),
        shim.file_open(2, OpenMode::Read, "demo.txt"),
    ];
    if let Some(failed) = steps.iter().find(|s| **s == ChannelStatus::Failed) {
        return format!("FILE ERROR {} {:?}", failed.code(), shim.file_last_error());
    }
    let (line, status) = shim.file_read_line(2);
    shim.file_close(2);
    format!("READ {} ({})", line, status.code())
}

fn init_logging(trace: bool) {
    let level = if trace { Level::TRACE } else { Level::WARN };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_logging(args.trace);

    let profile = match &args.profile {
        Some(path) => load_profile_from_path(path)?,
        None => HostProfile::default(),
    };

    // Create channel for keyboard input
    let (key_tx, key_rx) = mpsc::channel::<u8>();
    let break_enabled = Arc::new(AtomicBool::new(true));
    let mut host = TerminalPlatform::new(key_rx, break_enabled.clone());

    if args.probe {
        let config = probe_with_profile(&mut host, &profile);
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    let printer_path = args
        .printer
        .clone()
        .unwrap_or_else(|| args.root.join("PRINTER.TXT"));
    let host = match OpenOptions::new()
        .create(true)
        .append(true)
        .open(&printer_path)
    {
        Ok(file) => host.with_printer(BufWriter::new(file)),
        Err(e) => {
            warn!(path = %printer_path.display(), error = %e, "printer file unavailable");
            host
        }
    };

    // Create shutdown signal
    let (shutdown_tx, mut shutdown_rx) = tokio_mpsc::channel::<()>(1);

    // Enable raw mode (gracefully handle non-TTY)
    let raw_mode_enabled = enable_raw_mode().is_ok();

    let storage = NativeStorage::new(args.root.clone());

    // Run the guest in a blocking task
    let guest_handle = tokio::task::spawn_blocking(move || {
        let mut shim = Shim::start(host, storage, &profile);
        run_guest(&mut shim);
    });

    // Spawn terminal input reader
    let input_handle = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    break;
                }
                _ = tokio::time::sleep(Duration::from_millis(10)) => {
                    if !event::poll(Duration::from_millis(0)).unwrap_or(false) {
                        continue;
                    }
                    let Ok(Event::Key(key_event)) = event::read() else {
                        continue;
                    };
                    let is_break = key_event.code == KeyCode::Char('c')
                        && key_event.modifiers.contains(KeyModifiers::CONTROL);
                    let units = if is_break && break_enabled.load(Ordering::Relaxed) {
                        vec![27]
                    } else {
                        translate_key(key_event.code, key_event.modifiers)
                    };
                    if units.into_iter().any(|unit| key_tx.send(unit).is_err()) {
                        break; // Channel closed
                    }
                }
            }
        }
    });

    // Wait for the guest to finish
    let result = guest_handle.await;

    // Signal input handler to stop
    let _ = shutdown_tx.send(()).await;
    let _ = input_handle.await;

    // Disable raw mode if we enabled it
    if raw_mode_enabled {
        let _ = disable_raw_mode();
    }

    if let Err(e) = result {
        eprintln!("\nError: {}", e);
    }

    Ok(())
}
