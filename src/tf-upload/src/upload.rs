use image::{DynamicImage, GenericImageView, ImageFormat};

use crate::Result;

/// An uploaded image: the bytes exactly as received plus their decoded form.
pub struct UploadedImage {
    bytes: Vec<u8>,
    image: DynamicImage,
    format: ImageFormat,
}

impl UploadedImage {
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let format = image::guess_format(&bytes)?;
        let image = image::load_from_memory_with_format(&bytes, format)?;

        Ok(UploadedImage {
            bytes,
            image,
            format,
        })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Upper-case format name (`JPEG`, `PNG`, ...), used as the extension of
    /// the archived copy.
    pub fn format_name(&self) -> String {
        format!("{:?}", self.format).to_uppercase()
    }

    pub fn content_type(&self) -> &'static str {
        match self.format {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
            ImageFormat::Gif => "image/gif",
            ImageFormat::WebP => "image/webp",
            ImageFormat::Bmp => "image/bmp",
            ImageFormat::Tiff => "image/tiff",
            ImageFormat::Ico => "image/x-icon",
            _ => "application/octet-stream",
        }
    }
}
