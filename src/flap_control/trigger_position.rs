use serde::Deserialize;
use strum_macros::Display;

/// Horizontal bucket of the trigger object's bbox center within the frame.
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Debug, Display, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TriggerPosition {
    Left,
    Middle,
    Right,
}

impl TriggerPosition {
    /// Buckets a bbox center x: [0, W/3) is left, (2W/3, W] is right,
    /// everything in between is middle.
    pub fn from_center_x(center_x: f32, frame_width: u32) -> Self {
        let third = frame_width as f32 / 3.0;
        if center_x < third {
            TriggerPosition::Left
        } else if center_x > 2.0 * third {
            TriggerPosition::Right
        } else {
            TriggerPosition::Middle
        }
    }
}
