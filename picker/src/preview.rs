use crate::error::{Error, Result};
use crate::raster::Bitmap;
use image::DynamicImage;
use serde::Serialize;
use std::io::Cursor;

pub const PREVIEW_DPI: u32 = 150;
pub const THUMBNAIL_SIZE: (u32, u32) = (150, 150);

/// JPEG thumbnail of one page.
#[derive(Debug, Clone, Serialize)]
pub struct Preview {
    index: usize,
    #[serde(with = "base64")]
    preview_jpg: Vec<u8>,
    dimensions: (u32, u32),
}

impl Preview {
    /// Shrinks a rendered page to fit the thumbnail box, keeping its aspect ratio.
    pub fn from_bitmap(index: usize, bitmap: &Bitmap) -> Result<Self> {
        let (max_width, max_height) = THUMBNAIL_SIZE;
        let thumbnail = DynamicImage::ImageRgb8(bitmap.clone())
            .thumbnail(max_width, max_height)
            .into_rgb8();

        let mut bytes = Cursor::new(Vec::new());
        thumbnail
            .write_to(&mut bytes, image::ImageFormat::Jpeg)
            .map_err(Error::rasterization_failed)?;

        Ok(Self {
            index,
            preview_jpg: bytes.into_inner(),
            dimensions: thumbnail.dimensions(),
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn jpeg(&self) -> &[u8] {
        &self.preview_jpg
    }

    pub fn width(&self) -> u32 {
        self.dimensions.0
    }

    pub fn height(&self) -> u32 {
        self.dimensions.1
    }
}

/// What a page thumbnail should look like right now.
///
/// Tiles are recomputed from the selection every time they are requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageTile {
    pub index: usize,
    /// 1-indexed label shown to the user.
    pub number: usize,
    pub selected: bool,
}

mod base64 {
    use base64::prelude::*;
    use serde::Serialize;
    use serde::Serializer;

    pub fn serialize<S: Serializer>(v: &Vec<u8>, s: S) -> Result<S::Ok, S::Error> {
        let base64 = BASE64_STANDARD.encode(v);
        String::serialize(&base64, s)
    }
}
