use image::{
    ExtendedColorType, ImageEncoder, RgbaImage,
    codecs::png::{CompressionType, FilterType, PngEncoder},
};

use crate::application::error::{ErrorKind, RenderError};

/// Encode `image` as an RGBA PNG, keeping the alpha channel.
pub(crate) fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, RenderError> {
    let mut png = Vec::with_capacity(image.as_raw().len() / 4);
    let encoder =
        PngEncoder::new_with_quality(&mut png, CompressionType::Best, FilterType::Adaptive);
    encoder
        .write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            ExtendedColorType::Rgba8,
        )
        .map_err(|err| {
            RenderError::new(ErrorKind::RenderFailure, format!("PNG encoding failed: {err}"))
        })?;
    Ok(png)
}

#[cfg(test)]
mod tests {
    use image::{Rgba, load_from_memory};

    use super::*;

    #[test]
    fn keeps_transparency() {
        let mut image = RgbaImage::new(4, 3);
        image.put_pixel(1, 1, Rgba([0, 0, 0, 200]));

        let png = encode_png(&image).expect("encode");
        assert_eq!(&png[1..4], b"PNG");

        let decoded = load_from_memory(&png).expect("decode").to_rgba8();
        assert_eq!(decoded.dimensions(), (4, 3));
        assert_eq!(decoded.get_pixel(0, 0)[3], 0);
        assert_eq!(decoded.get_pixel(1, 1), &Rgba([0, 0, 0, 200]));
    }
}
