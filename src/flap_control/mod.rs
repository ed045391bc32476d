//! This module provides the core components of the interdiction pipeline:
//! frame capture, object detection, track management, the prey-detection
//! dispatcher with its decision engine, and the flap actuator back-ends.

pub(crate) mod camera;
pub(crate) mod common;
pub(crate) mod detection_result;
pub(crate) mod episode;
pub(crate) mod flap_controller;
pub(crate) mod object_detector;
pub(crate) mod prey_classifier;
pub(crate) mod prey_dispatcher;
pub(crate) mod supervisor;
pub(crate) mod tracker;
pub(crate) mod trigger_position;

#[cfg(test)]
mod tests;

pub use supervisor::Supervisor;
