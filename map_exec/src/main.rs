//! # Map Executable
//!
//! This executable draws the vacuum's map from its telemetry and serves the image to viewers.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Instant,
};

use color_eyre::{eyre::WrapErr, Result};
use comms_if::net::zmq;
use log::{info, warn};

use map_lib::{
    bus_client::{ZmqBusClient, PAYLOAD_DUMP_FILE},
    map_server::MapServer,
    params::MapExecParams,
    pipeline::{MapPipeline, PipelineConfig},
    renderer::LayerRenderer,
    scheduler::PollScheduler,
    snapshot_store::{FsSnapshotStore, SNAPSHOTS_DIR},
};
use util::{
    host,
    logger::{logger_init, parse_min_level},
    session::Session,
    time::seconds_to_std_duration,
};

// ------------------------------------------------------------------------------------------------
// MAIN
// ------------------------------------------------------------------------------------------------

fn main() -> Result<()> {
    color_eyre::install()?;

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("map_exec", "sessions").wrap_err("Failed to create the session")?;

    // Parameters come first as they set the log level
    let params: MapExecParams =
        util::params::load("map_exec.toml").wrap_err("Failed to load parameters")?;

    // Initialise logger
    let min_level = parse_min_level(&params.log_level).wrap_err("Invalid log level")?;
    logger_init(min_level, &session).wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Map Executable\n");
    info!("Running on: {}", host::get_hostname());
    info!("Session directory: {:?}\n", session.session_root);

    info!("Initialising...");

    params.validate().wrap_err("Invalid parameters")?;

    info!("Parameters loaded");

    // ---- SHUTDOWN HANDLER ----

    let running = Arc::new(AtomicBool::new(true));
    let running_handle = running.clone();

    ctrlc::set_handler(move || {
        running_handle.store(false, Ordering::SeqCst);
    })
    .wrap_err("Failed to set the shutdown handler")?;

    // ---- PIPELINE INITIALISATION ----

    let ctx = zmq::Context::new();

    let bus = ZmqBusClient::new(
        &ctx,
        &params,
        session.sw_root.join(SNAPSHOTS_DIR).join(PAYLOAD_DUMP_FILE),
    );
    let store = FsSnapshotStore::new(&session.sw_root);

    let mut pipeline = MapPipeline::new(
        PipelineConfig::from_params(&params),
        bus,
        LayerRenderer::new(),
        store,
    );

    pipeline.start().wrap_err("Failed to start the map pipeline")?;

    // Show something straight away, the snapshot if there is one
    pipeline.update();

    info!("Pipeline initialised");

    // ---- SERVER INITIALISATION ----

    let mut server = MapServer::new(&ctx, &params).wrap_err("Failed to initialise MapServer")?;

    info!("MapServer initialised");

    // ---- MAIN LOOP ----

    info!("Initialisation complete, entering main loop");

    let mut scheduler = PollScheduler::new(seconds_to_std_duration(params.update_period_s));

    while running.load(Ordering::SeqCst) {
        if pipeline.should_poll() && scheduler.tick_due(Instant::now()) {
            pipeline.update();
        }

        // Blocks for at most the socket's receive timeout
        if let Err(e) = server.serve(&mut pipeline) {
            warn!("Could not serve viewer request: {}", e);
        }
    }

    info!("Shutting down");

    pipeline.stop();

    Ok(())
}
