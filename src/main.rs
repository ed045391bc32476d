#![allow(dead_code)]
#![warn(clippy::shadow_reuse, clippy::shadow_same, clippy::builtin_type_shadow)]

mod bot_communication;
mod config;
mod flap_control;
mod http_handler;
mod keychain;
mod logger;

use crate::config::Config;
use crate::flap_control::Supervisor;
use crate::flap_control::camera::ReplayCamera;
use crate::flap_control::object_detector::{ObjectDetector, OrtBackend};
use crate::flap_control::tracker::DetectionTracker;
use crate::keychain::Keychain;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[tokio::main(flavor = "multi_thread", worker_threads = 4)]
async fn main() {
    let config = Config::load().unwrap_or_else(|e| fatal!("Invalid configuration: {e}"));
    info!("=== Starting Flapguard ===");
    info!("Process ID: {}", std::process::id());

    if !config.detector.model_path.exists() {
        fatal!("Detector model missing at {}", config.detector.model_path.display());
    }

    let keychain = Keychain::new(config);
    let config = keychain.config();

    let backend = OrtBackend::load(&config.detector.model_path)
        .unwrap_or_else(|e| fatal!("Could not load detector model: {e}"));
    let detector = ObjectDetector::new(Box::new(backend), &config.detector)
        .unwrap_or_else(|e| fatal!("Could not initialize detector: {e}"));
    let trigger_label = detector
        .class_id(&config.pipeline.trigger_class)
        .unwrap_or_else(|| {
            fatal!(
                "Trigger class {:?} is not among the classes of interest",
                config.pipeline.trigger_class
            )
        });

    let camera = ReplayCamera::new(config.camera.clone())
        .unwrap_or_else(|e| fatal!("Could not initialize camera: {e}"));

    let tracker = DetectionTracker::new(
        config.tracker.clone(),
        config.detector.classes_of_interest.clone(),
        config.pipeline.save_images,
        config.runtime.detection_images_dir.clone(),
    );

    let cancel_token = CancellationToken::new();
    let capture_thread = Supervisor::start(
        Arc::clone(&config),
        Box::new(camera),
        detector,
        tracker,
        keychain.dispatcher(),
        keychain.messenger(),
        trigger_label,
        cancel_token.clone(),
    );
    info!("Object detector started in background thread");

    shutdown_signal().await;
    info!("Shutdown signal received, terminating application");
    cancel_token.cancel();
    keychain.dispatcher().send_shutdown();
    drop(capture_thread);
    std::process::exit(0);
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};
    let mut sigterm =
        signal(SignalKind::terminate()).unwrap_or_else(|e| fatal!("Signal handler failed: {e}"));
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {},
        _ = sigterm.recv() => {},
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    tokio::signal::ctrl_c().await.ok();
}
