//! Natural image dimensions, either sniffed from the response body or supplied by the
//! capture.

use crate::resource::Resource;
use crate::resource_collection::url_key;
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageAttributes {
    pub width: u32,
    pub height: u32,
}

impl ImageAttributes {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

pub trait ImageAttributesFactory: Send + Sync + fmt::Debug {
    /// `None` when the dimensions of `resource` cannot be determined.
    fn new_image_attributes(&self, resource: &Resource) -> Option<ImageAttributes>;
}

/// Reads the dimensions out of PNG, GIF and JPEG headers.
#[derive(Debug, Clone, Copy, Default)]
pub struct SniffingImageAttributesFactory;

impl ImageAttributesFactory for SniffingImageAttributesFactory {
    fn new_image_attributes(&self, resource: &Resource) -> Option<ImageAttributes> {
        let attrs = sniff_image_dimensions(resource.response_body());
        if attrs.is_none() {
            log::debug!("Unable to read image dimensions of {}", resource.request_url());
        }
        attrs
    }
}

/// Dimensions keyed by URL.
#[derive(Debug, Clone, Default)]
pub struct MapImageAttributesFactory {
    sizes: HashMap<String, ImageAttributes>,
}

impl MapImageAttributesFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, url: &str, width: u32, height: u32) {
        self.sizes.insert(url_key(url), ImageAttributes::new(width, height));
    }
}

impl ImageAttributesFactory for MapImageAttributesFactory {
    fn new_image_attributes(&self, resource: &Resource) -> Option<ImageAttributes> {
        self.sizes.get(&url_key(resource.request_url())).copied()
    }
}

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

fn be_u16(bytes: &[u8], at: usize) -> Option<u32> {
    let b = bytes.get(at..at + 2)?;
    Some(u32::from(u16::from_be_bytes([b[0], b[1]])))
}

fn be_u32(bytes: &[u8], at: usize) -> Option<u32> {
    let b = bytes.get(at..at + 4)?;
    Some(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
}

fn le_u16(bytes: &[u8], at: usize) -> Option<u32> {
    let b = bytes.get(at..at + 2)?;
    Some(u32::from(u16::from_le_bytes([b[0], b[1]])))
}

pub fn sniff_image_dimensions(body: &[u8]) -> Option<ImageAttributes> {
    if body.starts_with(PNG_SIGNATURE) {
        // IHDR is always the first chunk.
        if body.get(12..16)? != b"IHDR" {
            return None;
        }
        return Some(ImageAttributes::new(be_u32(body, 16)?, be_u32(body, 20)?));
    }
    if body.starts_with(b"GIF87a") || body.starts_with(b"GIF89a") {
        return Some(ImageAttributes::new(le_u16(body, 6)?, le_u16(body, 8)?));
    }
    if body.starts_with(&[0xff, 0xd8]) {
        return sniff_jpeg(body);
    }
    None
}

fn sniff_jpeg(body: &[u8]) -> Option<ImageAttributes> {
    let mut pos = 2;
    loop {
        // Markers may be padded with any number of 0xff bytes.
        while *body.get(pos)? == 0xff && *body.get(pos + 1)? == 0xff {
            pos += 1;
        }
        if *body.get(pos)? != 0xff {
            return None;
        }
        let marker = *body.get(pos + 1)?;
        match marker {
            0xd8 | 0x01 | 0xd0..=0xd7 => {
                pos += 2;
                continue;
            }
            0xd9 | 0xda => return None,
            0xc0..=0xcf if !matches!(marker, 0xc4 | 0xc8 | 0xcc) => {
                let height = be_u16(body, pos + 5)?;
                let width = be_u16(body, pos + 7)?;
                return Some(ImageAttributes::new(width, height));
            }
            _ => {
                let segment_len = be_u16(body, pos + 2)? as usize;
                pos += 2 + segment_len;
            }
        }
    }
}
