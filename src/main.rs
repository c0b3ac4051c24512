// src/main.rs
mod channel;
mod config;
mod drivers;
mod engine;
mod heatmap;
mod recorder;
mod serial_date;
mod terminal;
mod types;
use std::fs::File;
use std::path::Path;
use anyhow::{Context, Result};
use log::info;
use crate::config::{Config, SourceKind};
use crate::drivers::{FrameSource, Pcsgu250Source, SimulatedSource};
use crate::engine::Session;
use crate::terminal::ConsoleTerminal;
// The strip owns the terminal, so log records go to a file instead.
fn init_logging(path: &Path) {
    if let Ok(file) = File::create(path) {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
            .target(env_logger::Target::Pipe(Box::new(file)))
            .init();
    }
}
fn run_with<S: FrameSource>(source: S, config: &Config) -> Result<()> {
    let terminal = ConsoleTerminal::open().context("switching the terminal to raw mode")?;
    let mut session = Session::new(source, terminal, config);
    session.run()
}
fn main() -> Result<()> {
    let config = Config::load()?;
    init_logging(&config.log_file);
    info!("starting with {:?} source", config.source);
    match config.source {
        SourceKind::Driver => {
            let source = Pcsgu250Source::open(&config.driver_library)
                .with_context(|| format!("opening driver {}", config.driver_library))?;
            run_with(source, &config)
        }
        SourceKind::Simulation => {
            run_with(SimulatedSource::new(config.simulation_interval()), &config)
        }
    }
}
