//! This module provides request handling for the external HTTP endpoints:
//! the prey-classifier API, the flap actuator daemon (modes, status, reed
//! sensor, reed log) and the notification bot API. Each submodule manages
//! the request type of one endpoint along with its associated logic.

pub(crate) mod classify_image_post;
pub(crate) mod flap_mode_get;
pub(crate) mod flap_status_get;
pub(crate) mod reed_last_get;
pub(crate) mod reed_status_get;
pub(crate) mod request_common;
pub(crate) mod send_message_post;
pub(crate) mod send_photo_post;
