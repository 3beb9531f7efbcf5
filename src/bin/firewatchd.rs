//! firewatchd - fire/smoke alert daemon
//!
//! This daemon:
//! 1. Loads configuration (FIREWATCH_CONFIG file + FIREWATCH_* overrides)
//! 2. Registers and warms up the detector backend
//! 3. Serves the local API (`/get_alert`, session control)
//! 4. Optionally starts watching a startup source
//! 5. Ends sessions whose source or detector failed

use anyhow::{anyhow, Result};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};

use firewatch::{
    api::{ApiConfig, ApiServer},
    config::{DaemonConfig, DETECTOR_TRACT},
    BackendRegistry, CpuBackend, SessionManager, SourceSpec,
};

const REAP_INTERVAL: Duration = Duration::from_millis(200);
const STATUS_LOG_INTERVAL: Duration = Duration::from_secs(30);

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = DaemonConfig::load()?;
    let registry = build_registry(&config)?;
    let backend_name = registry
        .default_name()
        .ok_or_else(|| anyhow!("no detector backend registered"))?
        .to_string();
    registry.warm_up(&backend_name)?;
    let detector = registry
        .default_backend()
        .ok_or_else(|| anyhow!("no detector backend registered"))?;
    log::info!(
        "detector backend: {} (available: {})",
        backend_name,
        registry.list().join(", ")
    );

    let sessions = Arc::new(SessionManager::new(
        detector,
        config.policy.clone(),
        config.capture,
    )?);
    log::info!(
        "alert policy: labels={:?} threshold={} window={}s min_detections={} hold={}s",
        config.policy.labels,
        config.policy.confidence_threshold,
        config.policy.window_secs,
        config.policy.min_detections,
        config.policy.hold_secs
    );

    let api_config = ApiConfig {
        addr: config.api_addr.clone(),
        token_path: config.api_token_path.clone(),
        webcam_device: config.webcam_device.clone(),
    };
    let api_handle = ApiServer::new(api_config, sessions.clone()).spawn()?;
    if let Some(path) = &api_handle.token_path {
        log::info!("api control token written to {}", path.display());
    } else {
        log::warn!(
            "api control token (handle securely): {}",
            api_handle.token
        );
    }

    if let Some(source) = &config.startup_source {
        let spec = SourceSpec::parse(source, &config.webcam_device)?;
        let id = sessions.start_spec(&spec)?;
        log::info!("startup session {} watching {}", id, spec);
    }

    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })
    .map_err(|err| anyhow!("error setting Ctrl-C handler: {}", err))?;

    log::info!("firewatchd running; waiting for shutdown signal (Ctrl-C)...");
    let mut last_status_log = Instant::now();
    loop {
        match rx.recv_timeout(REAP_INTERVAL) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }

        if let Some(err) = sessions.reap_failed()? {
            log::error!("session ended after failure: {:#}", err);
        }

        if last_status_log.elapsed() >= STATUS_LOG_INTERVAL {
            match sessions.status()? {
                Some(status) => log::info!(
                    "session {} {:?}: source={} captured={} frames={} positive={} alert={}",
                    status.id,
                    status.state,
                    status.source,
                    status.frames_captured,
                    status.frames_processed,
                    status.positive_frames,
                    sessions.get_alert_status().active
                ),
                None => log::info!("no active session"),
            }
            last_status_log = Instant::now();
        }
    }

    log::info!("shutdown signal received, stopping...");
    sessions.end_session()?;
    api_handle.stop()?;
    Ok(())
}

fn build_registry(config: &DaemonConfig) -> Result<BackendRegistry> {
    let mut registry = BackendRegistry::new();
    registry.register(CpuBackend::new());

    if config.detector.backend == DETECTOR_TRACT {
        register_tract(&mut registry, config)?;
    }
    registry.set_default(&config.detector.backend)?;
    Ok(registry)
}

#[cfg(feature = "backend-tract")]
fn register_tract(registry: &mut BackendRegistry, config: &DaemonConfig) -> Result<()> {
    let model_path = config
        .detector
        .model_path
        .as_ref()
        .ok_or_else(|| anyhow!("the tract detector requires a model_path"))?;
    let backend = firewatch::detect::TractBackend::new(
        model_path,
        config.detector.input_width,
        config.detector.input_height,
        config.detector.class_names.clone(),
    )?
    .with_min_score(config.detector.min_score);
    registry.register(backend);
    Ok(())
}

#[cfg(not(feature = "backend-tract"))]
fn register_tract(_registry: &mut BackendRegistry, _config: &DaemonConfig) -> Result<()> {
    Err(anyhow!("the tract detector requires the backend-tract feature"))
}
