//! Image intake.
//!
//! Decoding and resizing are external concerns behind [`ImageProcessor`]. The
//! shipped [`PassthroughImageProcessor`] sniffs the format from magic bytes,
//! rejects what it can't accept, and returns the payload unchanged.

/// Largest accepted upload.
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Webp,
    Gif,
}

impl ImageFormat {
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(Self::Jpeg)
        } else if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
            Some(Self::Png)
        } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            Some(Self::Webp)
        } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            Some(Self::Gif)
        } else {
            None
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
            ImageFormat::Webp => "image/webp",
            ImageFormat::Gif => "image/gif",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ImageError {
    #[error("GIF images are not supported. Please upload a JPEG or PNG image.")]
    GifNotSupported,
    #[error("Not an image! Please upload only images.")]
    NotAnImage,
    #[error("Image is too large (max {max} bytes)")]
    TooLarge { max: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedImage {
    pub format: ImageFormat,
    pub bytes: Vec<u8>,
}

impl ProcessedImage {
    pub fn content_type(&self) -> &'static str {
        self.format.content_type()
    }
}

pub trait ImageProcessor: Send + Sync {
    /// Fit the image to `width` x `height` and re-encode it.
    fn process(&self, bytes: &[u8], width: u32, height: u32) -> Result<ProcessedImage, ImageError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughImageProcessor;

impl ImageProcessor for PassthroughImageProcessor {
    fn process(&self, bytes: &[u8], width: u32, height: u32) -> Result<ProcessedImage, ImageError> {
        if bytes.len() > MAX_IMAGE_BYTES {
            return Err(ImageError::TooLarge { max: MAX_IMAGE_BYTES });
        }
        let format = match ImageFormat::sniff(bytes) {
            Some(ImageFormat::Gif) => return Err(ImageError::GifNotSupported),
            Some(format) => format,
            None => return Err(ImageError::NotAnImage),
        };
        tracing::debug!(?format, width, height, size = bytes.len(), "image accepted without resize");
        Ok(ProcessedImage {
            format,
            bytes: bytes.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];

    #[test]
    fn jpeg_passes_through() {
        let out = PassthroughImageProcessor.process(JPEG, 500, 500).unwrap();
        assert_eq!(out.format, ImageFormat::Jpeg);
        assert_eq!(out.bytes, JPEG);
        assert_eq!(out.content_type(), "image/jpeg");
    }

    #[test]
    fn gif_is_rejected() {
        let err = PassthroughImageProcessor.process(b"GIF89a....", 500, 500).unwrap_err();
        assert_eq!(err, ImageError::GifNotSupported);
    }

    #[test]
    fn text_is_not_an_image() {
        let err = PassthroughImageProcessor.process(b"hello world", 500, 500).unwrap_err();
        assert_eq!(err, ImageError::NotAnImage);
    }

    #[test]
    fn webp_is_sniffed() {
        assert_eq!(ImageFormat::sniff(b"RIFF\0\0\0\0WEBPVP8 "), Some(ImageFormat::Webp));
    }
}
