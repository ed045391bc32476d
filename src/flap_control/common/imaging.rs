use crate::flap_control::trigger_position::TriggerPosition;
use image::codecs::jpeg::JpegEncoder;
use image::{ImageReader, RgbImage};
use std::io::Cursor;

#[derive(Debug)]
pub enum ImagingError {
    Encode(image::ImageError),
    Decode(image::ImageError),
}

impl std::fmt::Display for ImagingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImagingError::Encode(e) => write!(f, "jpeg encode failed: {e}"),
            ImagingError::Decode(e) => write!(f, "jpeg decode failed: {e}"),
        }
    }
}

impl std::error::Error for ImagingError {}

pub fn encode_jpeg(img: &RgbImage, quality: u8) -> Result<Vec<u8>, ImagingError> {
    let mut writer = Cursor::new(Vec::<u8>::new());
    img.write_with_encoder(JpegEncoder::new_with_quality(&mut writer, quality))
        .map_err(ImagingError::Encode)?;
    Ok(writer.into_inner())
}

pub fn decode_jpeg(bytes: &[u8]) -> Result<RgbImage, ImagingError> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| ImagingError::Decode(image::ImageError::IoError(e)))?;
    Ok(reader.decode().map_err(ImagingError::Decode)?.to_rgb8())
}

/// Horizontal crop aligned by trigger position: left keeps the left edge,
/// right the right edge, middle is centered. The result is always
/// `min(width, crop_width) x height`.
pub fn crop_to_width(img: &RgbImage, position: TriggerPosition, crop_width: u32) -> RgbImage {
    let (width, height) = img.dimensions();
    let crop_width = crop_width.min(width);

    let start_x = match position {
        TriggerPosition::Left => 0,
        TriggerPosition::Right => width - crop_width,
        TriggerPosition::Middle => (width - crop_width) / 2,
    };
    image::imageops::crop_imm(img, start_x, 0, crop_width, height).to_image()
}
