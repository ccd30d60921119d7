pub mod alerts;
pub mod cli;
pub mod clock;
pub mod controller;
pub mod display;
pub mod error;
pub mod session;
pub mod settings;
pub mod sim;
pub mod timer;
pub mod utils;

use std::sync::Arc;

use anyhow::{Context, Result};
use log::{info, warn};
use tokio::io::{AsyncBufReadExt, BufReader};

use clock::TokioClock;
use controller::Controller;
use settings::{Settings, SettingsStore};
use sim::{LogAlerts, LogDisplay, SimulatedService};

pub use cli::{parse_command, HostCommand};

pub fn run() -> Result<()> {
    let store = SettingsStore::from_env()?;
    let settings = store.settings().clone();

    // Initialize logging (RUST_LOG still overrides)
    utils::init_logging(settings.debug);

    info!(
        "PulsePacer starting up (settings: {})",
        store.path().display()
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    runtime.block_on(serve(settings))
}

async fn serve(settings: Settings) -> Result<()> {
    let mut controller = Controller::new(
        &settings,
        Arc::new(SimulatedService::default()),
        Arc::new(LogDisplay),
        Arc::new(LogAlerts),
        Arc::new(TokioClock),
    );
    controller.startup();

    let handle = controller.handle();
    let worker = tokio::spawn(controller.run());

    println!("{}", cli::HELP);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        match parse_command(&line) {
            Some(HostCommand::Press(action)) => {
                if !handle.ui(action) {
                    warn!("controller stopped; exiting");
                    break;
                }
            }
            Some(HostCommand::Help) => println!("{}", cli::HELP),
            Some(HostCommand::Quit) => break,
            None => {}
        }
    }

    handle.shutdown();
    worker.await.context("controller task failed to join")?;
    info!("PulsePacer stopped");
    Ok(())
}
