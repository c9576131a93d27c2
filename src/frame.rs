use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use image::DynamicImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FrameError {
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("failed to decode image: {0}")]
    Image(#[from] image::ImageError),
}

/// Decode one captured frame submitted as a data URL
/// (`data:image/jpeg;base64,...`). A bare base64 string without the
/// `data:` prefix is accepted as well.
pub fn decode_data_url(data: &str) -> Result<DynamicImage, FrameError> {
    let payload = match data.split_once(',') {
        Some((_, payload)) => payload,
        None => data,
    };

    let bytes = BASE64.decode(payload)?;
    Ok(image::load_from_memory(&bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};
    use std::io::Cursor;

    fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = ImageBuffer::<Rgb<u8>, Vec<u8>>::from_pixel(width, height, Rgb([64, 64, 64]));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Jpeg)
            .unwrap();
        bytes
    }

    #[test]
    fn test_decodes_data_url_with_prefix() {
        let data = format!("data:image/jpeg;base64,{}", BASE64.encode(jpeg_bytes(32, 16)));

        let image = decode_data_url(&data).unwrap();

        assert_eq!(image.width(), 32);
        assert_eq!(image.height(), 16);
    }

    #[test]
    fn test_decodes_bare_base64() {
        let data = BASE64.encode(jpeg_bytes(8, 8));

        assert!(decode_data_url(&data).is_ok());
    }

    #[test]
    fn test_rejects_invalid_base64() {
        let result = decode_data_url("data:image/jpeg;base64,not-valid-base64!!");

        assert!(matches!(result, Err(FrameError::Base64(_))));
    }

    #[test]
    fn test_rejects_non_image_payload() {
        let data = format!("data:image/jpeg;base64,{}", BASE64.encode(b"definitely not a jpeg"));

        let result = decode_data_url(&data);

        assert!(matches!(result, Err(FrameError::Image(_))));
    }
}
