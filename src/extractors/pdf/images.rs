//! Image XObject decoding to inline PNG.

use std::collections::HashMap;
use std::io::Cursor;

use image::{DynamicImage, ImageFormat, RgbaImage};
use lopdf::{Document, Object, ObjectId, Stream};

use super::objects::{filters, number, resolve, stream_bytes};
use crate::core::errors::{AppError, AppResult};
use crate::core::inline_image::InlineImage;

/// Per-document decoder; an image painted on several pages is decoded once.
pub struct ImageDecoder<'a> {
    doc: &'a Document,
    cache: HashMap<ObjectId, Result<String, String>>,
}

impl<'a> ImageDecoder<'a> {
    pub fn new(doc: &'a Document) -> Self {
        Self {
            doc,
            cache: HashMap::new(),
        }
    }

    /// PNG `data:` URL for the image object.
    pub fn data_url(&mut self, id: ObjectId) -> AppResult<String> {
        let doc = self.doc;
        self.cache
            .entry(id)
            .or_insert_with(|| {
                doc.get_object(id)
                    .and_then(Object::as_stream)
                    .map_err(AppError::from)
                    .and_then(|stream| decode_stream(doc, stream))
                    .and_then(encode_png)
                    .map(|png| InlineImage::new("image/png", png).to_data_url())
                    .map_err(|err| err.to_string())
            })
            .clone()
            .map_err(AppError::Image)
    }
}

fn dimension(doc: &Document, stream: &Stream, key: &[u8]) -> AppResult<u32> {
    stream
        .dict
        .get(key)
        .ok()
        .and_then(|obj| number(resolve(doc, obj)))
        .filter(|v| *v >= 1.0 && v.is_finite())
        .map(|v| v as u32)
        .ok_or_else(|| AppError::Image(format!("image has no valid /{}", String::from_utf8_lossy(key))))
}

fn decode_stream(doc: &Document, stream: &Stream) -> AppResult<RgbaImage> {
    let filters = filters(stream);
    if filters.iter().any(|f| f.as_slice() == b"DCTDecode") {
        if filters.len() != 1 {
            return Err(AppError::Image("chained DCT filters are not supported".to_string()));
        }
        let decoded = image::load_from_memory_with_format(&stream.content, ImageFormat::Jpeg)?;
        return Ok(decoded.to_rgba8());
    }
    if let Some(filter) = filters
        .iter()
        .find(|f| matches!(f.as_slice(), b"JPXDecode" | b"JBIG2Decode" | b"CCITTFaxDecode"))
    {
        return Err(AppError::Image(format!(
            "unsupported image filter {}",
            String::from_utf8_lossy(filter)
        )));
    }

    let width = dimension(doc, stream, b"Width")?;
    let height = dimension(doc, stream, b"Height")?;
    let data = stream_bytes(stream)?;
    rgba_from_raw(width, height, data)
}

/// Interpret a raw sample buffer by its size: 4 bytes per pixel is RGBA,
/// 3 bytes per pixel is RGB. Anything else is undecodable.
pub fn rgba_from_raw(width: u32, height: u32, data: Vec<u8>) -> AppResult<RgbaImage> {
    let pixels = (width as usize)
        .checked_mul(height as usize)
        .filter(|pixels| pixels.checked_mul(4).is_some())
        .ok_or_else(|| AppError::Image(format!("{width}x{height} image is too large")))?;
    let rgba = if data.len() == pixels * 4 {
        data
    } else if data.len() == pixels * 3 {
        let mut out = Vec::with_capacity(pixels * 4);
        for px in data.chunks_exact(3) {
            out.extend_from_slice(&[px[0], px[1], px[2], 255]);
        }
        out
    } else {
        return Err(AppError::Image(format!(
            "{} bytes do not match a {width}x{height} RGB or RGBA buffer",
            data.len()
        )));
    };
    RgbaImage::from_raw(width, height, rgba)
        .ok_or_else(|| AppError::Image("failed to create image buffer".to_string()))
}

pub fn encode_png(image: RgbaImage) -> AppResult<Vec<u8>> {
    let mut output = Vec::new();
    DynamicImage::ImageRgba8(image).write_to(&mut Cursor::new(&mut output), ImageFormat::Png)?;
    Ok(output)
}
