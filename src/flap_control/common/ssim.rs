//! Structural similarity between two frames, used by the dispatcher to skip
//! near-duplicate captures.
//!
//! Uniform 7x7 windows per color channel, channel scores averaged. The
//! dynamic range is taken from the current frame (max - min over all
//! channels) rather than a fixed 255; callers should only rely on the
//! monotone behavior of the score.

use image::RgbImage;

const WINDOW: u32 = 7;
const K1: f64 = 0.01;
const K2: f64 = 0.03;

/// Mean SSIM over all three channels, in [-1, 1]. Images of mismatched
/// dimensions compare as 0 (fully dissimilar).
pub fn ssim(reference: &RgbImage, current: &RgbImage) -> f64 {
    if reference.dimensions() != current.dimensions() {
        return 0.0;
    }
    let (width, height) = current.dimensions();
    if width < WINDOW || height < WINDOW {
        return 0.0;
    }

    let data_range = dynamic_range(current);
    if data_range == 0.0 {
        // Flat frame: identical to a flat reference, else dissimilar.
        return if reference.as_raw() == current.as_raw() { 1.0 } else { 0.0 };
    }
    let c1 = (K1 * data_range).powi(2);
    let c2 = (K2 * data_range).powi(2);

    let mut total = 0.0;
    for channel in 0..3 {
        total += channel_ssim(reference, current, channel, c1, c2);
    }
    total / 3.0
}

fn dynamic_range(img: &RgbImage) -> f64 {
    let mut min = u8::MAX;
    let mut max = u8::MIN;
    for value in img.as_raw() {
        min = min.min(*value);
        max = max.max(*value);
    }
    f64::from(max) - f64::from(min)
}

fn channel_ssim(a: &RgbImage, b: &RgbImage, channel: usize, c1: f64, c2: f64) -> f64 {
    let (width, height) = a.dimensions();
    let n = f64::from(WINDOW * WINDOW);

    let mut sum = 0.0;
    let mut windows = 0u64;
    for y0 in (0..=height - WINDOW).step_by(WINDOW as usize) {
        for x0 in (0..=width - WINDOW).step_by(WINDOW as usize) {
            let (mut sa, mut sb, mut saa, mut sbb, mut sab) = (0.0, 0.0, 0.0, 0.0, 0.0);
            for y in y0..y0 + WINDOW {
                for x in x0..x0 + WINDOW {
                    let pa = f64::from(a.get_pixel(x, y)[channel]);
                    let pb = f64::from(b.get_pixel(x, y)[channel]);
                    sa += pa;
                    sb += pb;
                    saa += pa * pa;
                    sbb += pb * pb;
                    sab += pa * pb;
                }
            }
            let mu_a = sa / n;
            let mu_b = sb / n;
            let var_a = saa / n - mu_a * mu_a;
            let var_b = sbb / n - mu_b * mu_b;
            let cov = sab / n - mu_a * mu_b;

            let numerator = (2.0 * mu_a * mu_b + c1) * (2.0 * cov + c2);
            let denominator = (mu_a * mu_a + mu_b * mu_b + c1) * (var_a + var_b + c2);
            sum += numerator / denominator;
            windows += 1;
        }
    }
    sum / windows as f64
}
