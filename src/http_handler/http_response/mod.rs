pub(crate) mod bot_message;
pub(crate) mod classify_image;
pub(crate) mod flap_mode;
pub(crate) mod flap_status;
pub(crate) mod reed_last;
pub(crate) mod reed_status;
pub(crate) mod response_common;
