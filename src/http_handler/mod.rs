//! This module provides core structs, enums, and utilities for talking to the
//! external HTTP services: the flap actuator daemon, the prey-classifier API
//! and the notification bot API. Each endpoint has a typed request and
//! response pair in the corresponding submodule.

mod common;
pub mod http_client;
pub mod http_request;
pub mod http_response;

pub use common::FlapMode;
pub use common::HTTPError;
pub use common::ReedState;
