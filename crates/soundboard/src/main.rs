//! Soundboard: plays short clips from a live-reloaded directory.
//!
//! Commands are read from stdin, one `<caller> <message>` per line, and
//! handled like chat messages: `!<name>` plays a clip and `!sounds` prints
//! the list of available clips. EOF or Ctrl-C shuts down.

use std::io::BufRead;

use anyhow::{Result, anyhow};
use clap::Parser;
use crossbeam_channel::Receiver;
use tracing_subscriber::EnvFilter;

use soundboard::cli::{self, Args};
use soundboard::config::SoundboardConfig;
use soundboard::{Soundboard, console};

fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .init();

    if args.list_devices {
        return clip_player::device::list_output_devices();
    }

    tracing::info!(version = cli::VERSION, "soundboard starting");
    let config = SoundboardConfig::resolve(&args)?;
    let board = Soundboard::open(config)?;
    board.initial_scan();
    board.start_watching()?;

    let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
    ctrlc::set_handler(move || {
        let _ = stop_tx.try_send(());
    })?;
    let lines = spawn_stdin_reader();

    run_console(&board, &lines, &stop_rx);

    let watcher_died = !board.is_watching();
    let result = board.shutdown();
    match result {
        Err(e) if watcher_died => Err(e.context("live reload stopped while running")),
        Err(e) => Err(e),
        Ok(()) if watcher_died => Err(anyhow!("live reload stopped while running")),
        Ok(()) => {
            tracing::info!("soundboard stopped");
            Ok(())
        }
    }
}

fn run_console(board: &Soundboard, lines: &Receiver<String>, stop: &Receiver<()>) {
    loop {
        crossbeam_channel::select! {
            recv(stop) -> _ => {
                tracing::info!("interrupted - shutting down");
                return;
            }
            recv(lines) -> line => match line {
                Ok(line) => {
                    if let Some(out) = console::handle_line(board, &line) {
                        print!("{out}");
                    }
                }
                Err(_) => {
                    tracing::info!("console closed - shutting down");
                    return;
                }
            },
        }
    }
}

/// Forward stdin lines to a channel; the channel closes at EOF.
fn spawn_stdin_reader() -> Receiver<String> {
    let (tx, rx) = crossbeam_channel::unbounded();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!("failed to read console input: {e}");
                    break;
                }
            }
        }
    });
    rx
}
