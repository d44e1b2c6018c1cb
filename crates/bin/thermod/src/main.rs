//! # thermod — climate scheduling daemon
//!
//! Composition root that wires the virtual platform to the scheduler.
//!
//! ## Responsibilities
//! - Parse configuration (env vars, config file)
//! - Initialize logging from the configured filter
//! - Compile the expression environment and every room; report disabled rooms
//! - Construct the virtual platform adapters behind the app's port traits
//! - Start the scheduler and feed console input to the virtual platform
//! - Handle graceful shutdown (SIGINT)
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no scheduling logic belongs here.

mod config;
mod console;

use std::sync::Arc;

use anyhow::Context;
use thermo_adapter_virtual::{VirtualClimate, VirtualPlatform};
use thermo_app::event_bus::InProcessEventBus;
use thermo_app::ports::SystemClock;
use thermo_app::scheduler::{Scheduler, compile_rooms};
use thermo_domain::expr::Environment;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&config.logging.filter)
                .context("invalid logging filter")?,
        )
        .init();

    // Expressions
    let source = config.environment_source()?;
    let env = Arc::new(Environment::parse(&source).context("invalid expression environment")?);
    tracing::info!(helpers = env.len(), "expression environment loaded");

    // Rooms
    let defs = config.room_defs();
    let mut report = compile_rooms(
        defs.decoded.iter().map(|(id, def)| (id.clone(), def)),
        &env,
    );
    report.disabled.extend(defs.malformed);
    for (room, error) in &report.disabled {
        tracing::warn!(%room, error = %error, "room will not be scheduled");
    }
    if report.rooms.is_empty() {
        tracing::warn!("no room to schedule");
    }

    // Virtual platform
    let bus = InProcessEventBus::new(config.scheduler.event_buffer);
    let platform = Arc::new(
        VirtualPlatform::new(bus.clone(), SystemClock).with_states(config.platform.states),
    );
    let climate = Arc::new(VirtualClimate::new(Arc::clone(&platform)));

    // Scheduler
    let scheduler = Scheduler::new(Arc::clone(&platform), climate, Arc::new(SystemClock))
        .with_reset_at_startup(config.scheduler.reset_at_startup)
        .with_inbox_capacity(config.scheduler.inbox_capacity)
        .start(report.rooms, bus.subscribe());

    let console = tokio::spawn(console::drive(
        tokio::io::BufReader::new(tokio::io::stdin()),
        platform,
    ));

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    tracing::info!("shutdown requested");

    console.abort();
    scheduler.shutdown().await;
    Ok(())
}
