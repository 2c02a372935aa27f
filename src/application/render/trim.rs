use image::{RgbaImage, imageops};

/// Crops frames to the tight box around their visible pixels.
#[derive(Debug, Clone, Copy, Default)]
pub struct Trimmer;

/// Result of [`Trimmer::trim`]; `trimmed` is false when the bounds did not change.
#[derive(Debug, Clone)]
pub struct TrimOutcome {
    pub image: RgbaImage,
    pub trimmed: bool,
}

impl Trimmer {
    pub fn new() -> Self {
        Self
    }

    pub fn trim(&self, image: RgbaImage) -> TrimOutcome {
        let Some((left, top, right, bottom)) = visible_bounds(&image) else {
            return TrimOutcome {
                image,
                trimmed: false,
            };
        };

        let width = right - left + 1;
        let height = bottom - top + 1;
        if left == 0 && top == 0 && width == image.width() && height == image.height() {
            return TrimOutcome {
                image,
                trimmed: false,
            };
        }

        TrimOutcome {
            image: imageops::crop_imm(&image, left, top, width, height).to_image(),
            trimmed: true,
        }
    }
}

/// Inclusive `(left, top, right, bottom)` of pixels with non-zero alpha.
fn visible_bounds(image: &RgbaImage) -> Option<(u32, u32, u32, u32)> {
    let mut bounds: Option<(u32, u32, u32, u32)> = None;
    for (x, y, pixel) in image.enumerate_pixels() {
        if pixel[3] == 0 {
            continue;
        }
        bounds = Some(match bounds {
            None => (x, y, x, y),
            Some((l, t, r, b)) => (l.min(x), t.min(y), r.max(x), b.max(y)),
        });
    }
    bounds
}
