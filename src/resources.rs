//! Image resources.
//!
//! Decompilation registers every `gamebuino/Image` constructor call here;
//! after emission the registry is transcoded into a `resources.h` /
//! `resources.cpp` pair. PNGs become RGB565 pixel words or a 4-bit indexed
//! palette, with transparent pixels (alpha below 128) forced to magenta.

use std::fmt::Write as _;
use std::path::Path;

use image::RgbaImage;

use crate::error::{Error, Result};

/// Magenta, the transparent color of RGB565 images.
pub const TRANSPARENT_RGB565: u16 = 0xF81F;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Rgb565,
    Indexed,
}

impl ImageFormat {
    pub fn code(self) -> u16 {
        match self {
            ImageFormat::Rgb565 => 0,
            ImageFormat::Indexed => 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Resource {
    pub filename: String,
    pub format: ImageFormat,
    pub yframes: i32,
    pub xframes: i32,
    pub loop_count: i32,
}

/// Project-wide list of image resources, in encounter order.
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    entries: Vec<Resource>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(
        &mut self,
        filename: String,
        format: ImageFormat,
        yframes: i32,
        xframes: i32,
        loop_count: i32,
    ) {
        self.entries.push(Resource {
            filename,
            format,
            yframes,
            xframes,
            loop_count,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[Resource] {
        &self.entries
    }

    /// The resources header: extern declarations for every pixel array.
    pub fn emit_header(&self) -> String {
        let mut out = String::from("#ifndef RESOURCES_H\n#define RESOURCES_H\n\n#include <cstdint>\n\n");

        for resource in &self.entries {
            let identifier = encode_filename(&resource.filename);
            match resource.format {
                ImageFormat::Rgb565 => {
                    let _ = writeln!(out, "extern const uint16_t {identifier}[];");
                }
                ImageFormat::Indexed => {
                    let _ = writeln!(out, "extern const uint8_t {identifier}[];");
                    let _ = writeln!(out, "extern const uint16_t {identifier}_palette[];");
                }
            }
        }

        out.push_str("\n#endif\n");
        out
    }

    /// The resources implementation: loads each PNG from `search_dir` and
    /// emits its encoded pixel array. Files that do not exist are skipped.
    pub fn emit_source(&self, search_dir: &Path) -> Result<String> {
        let mut out = String::from("#include \"resources.h\"\n");

        for resource in &self.entries {
            let path = search_dir.join(&resource.filename);
            if !path.exists() {
                continue;
            }

            let img = image::open(&path)
                .map_err(|e| Error::BadImage {
                    filename: resource.filename.clone(),
                    message: e.to_string(),
                })?
                .to_rgba8();

            out.push('\n');
            out.push_str(&emit_resource(resource, &img)?);
        }

        Ok(out)
    }
}

/// Turns a resource path into a C++ identifier: `.` and `/` become `_`.
pub fn encode_filename(filename: &str) -> String {
    filename.replace(['.', '/'], "_")
}

fn emit_resource(resource: &Resource, img: &RgbaImage) -> Result<String> {
    let identifier = encode_filename(&resource.filename);

    let frames = resource.yframes as u32 * resource.xframes as u32;
    let frame_width = img.width() / resource.xframes.max(1) as u32;
    let frame_height = img.height() / resource.yframes.max(1) as u32;

    let mut out = String::new();
    match resource.format {
        ImageFormat::Rgb565 => {
            let pixels = encode_rgb565(img);
            let _ = writeln!(out, "const uint16_t {identifier}[] = {{");
            let _ = writeln!(
                out,
                "\t{frame_width}, {frame_height}, {}, {}, {}, 0x{TRANSPARENT_RGB565:04x}, {},",
                frames & 0xff,
                frames >> 8,
                resource.loop_count,
                ImageFormat::Rgb565.code(),
            );
            out.push_str(&render_words(&pixels));
            out.push_str("};\n");
        }
        ImageFormat::Indexed => {
            let (palette, packed, transparent_index) =
                encode_indexed(img, &resource.filename)?;

            let _ = writeln!(out, "const uint16_t {identifier}_palette[] = {{");
            out.push_str(&render_words(&palette));
            out.push_str("};\n\n");

            let _ = writeln!(out, "const uint8_t {identifier}[] = {{");
            let _ = writeln!(
                out,
                "\t{frame_width}, {frame_height}, {}, {}, {}, {transparent_index}, {},",
                frames & 0xff,
                frames >> 8,
                resource.loop_count,
                ImageFormat::Indexed.code(),
            );
            out.push_str(&render_bytes(&packed));
            out.push_str("};\n");
        }
    }

    Ok(out)
}

/// RGB32 → RGB565; transparent pixels are forced to magenta.
fn encode_rgb565(img: &RgbaImage) -> Vec<u16> {
    img.pixels()
        .map(|pixel| {
            let [r, g, b, a] = pixel.0;
            if a < 128 {
                TRANSPARENT_RGB565
            } else {
                rgb565(r, g, b)
            }
        })
        .collect()
}

/// RGB32 → 16-color palette plus packed 4-bit indices (two pixels per
/// byte, first pixel in the high nibble).
fn encode_indexed(img: &RgbaImage, filename: &str) -> Result<(Vec<u16>, Vec<u8>, u8)> {
    let mut palette: Vec<u16> = Vec::new();
    let mut indices: Vec<u8> = Vec::new();

    for pixel in img.pixels() {
        let [r, g, b, a] = pixel.0;
        let color = if a < 128 {
            TRANSPARENT_RGB565
        } else {
            rgb565(r, g, b)
        };

        let index = match palette.iter().position(|&c| c == color) {
            Some(index) => index,
            None => {
                if palette.len() == 16 {
                    return Err(Error::TooManyColors {
                        filename: filename.to_string(),
                    });
                }
                palette.push(color);
                palette.len() - 1
            }
        };
        indices.push(index as u8);
    }

    let transparent_index = palette
        .iter()
        .position(|&c| c == TRANSPARENT_RGB565)
        .unwrap_or(0) as u8;

    let mut packed = Vec::with_capacity(indices.len().div_ceil(2));
    for pair in indices.chunks(2) {
        let high = pair[0] << 4;
        let low = pair.get(1).copied().unwrap_or(0);
        packed.push(high | low);
    }

    // pad the palette so the array always holds 16 entries
    palette.resize(16, 0);

    Ok((palette, packed, transparent_index))
}

pub(crate) fn rgb565(r: u8, g: u8, b: u8) -> u16 {
    ((r as u16 & 0xF8) << 8) | ((g as u16 & 0xFC) << 3) | (b as u16 >> 3)
}

fn render_words(words: &[u16]) -> String {
    render_rows(words.iter().map(|w| format!("0x{w:04x}")))
}

fn render_bytes(bytes: &[u8]) -> String {
    render_rows(bytes.iter().map(|b| format!("0x{b:02x}")))
}

fn render_rows(values: impl Iterator<Item = String>) -> String {
    let mut out = String::new();
    for (i, value) in values.enumerate() {
        if i % 12 == 0 {
            if i > 0 {
                out.push('\n');
            }
            out.push('\t');
        } else {
            out.push(' ');
        }
        out.push_str(&value);
        out.push(',');
    }
    out.push('\n');
    out
}
