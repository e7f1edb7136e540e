// Termlink - interactive serial/TCP terminal client
use clap::Parser;
use crossterm::event::EventStream;
use crossterm::terminal;
use termlink::cli::args::Args;
use termlink::domain::config::SessionConfig;
use termlink::infrastructure::logging::init_logging;
use termlink::SessionEngine;

/// Puts the terminal into raw mode for the session and restores it on every
/// exit path, including panics.
struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> std::io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    if let Err(e) = init_logging(args.verbose) {
        eprintln!("termlink: failed to initialize diagnostics: {}", e);
    }

    std::process::exit(run(args.session_config()).await);
}

async fn run(config: SessionConfig) -> i32 {
    let mut engine = match SessionEngine::new(config, std::io::stdout()) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("termlink: {}", e);
            return e.exit_code();
        }
    };
    println!("termlink: transcript at {}", engine.log_path().display());

    let raw_mode = match RawModeGuard::enable() {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("termlink: failed to enter raw mode: {}", e);
            return 1;
        }
    };

    let mut keys = EventStream::new();
    let result = engine.run(&mut keys).await;
    drop(raw_mode);

    match result {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("termlink: {}", e);
            e.exit_code()
        }
    }
}
