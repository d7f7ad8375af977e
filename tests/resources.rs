//! Resource transcoding against real PNG files on disk.

use espresso::{ImageFormat, ResourceRegistry};
use image::{Rgba, RgbaImage};

#[test]
fn rgb565_resource_is_transcoded_from_png() {
    let dir = tempfile::tempdir().unwrap();

    let mut img = RgbaImage::new(2, 2);
    img.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
    img.put_pixel(1, 0, Rgba([0, 255, 0, 255]));
    img.put_pixel(0, 1, Rgba([0, 0, 255, 255]));
    img.put_pixel(1, 1, Rgba([0, 0, 0, 0])); // transparent
    img.save(dir.path().join("dot.png")).unwrap();

    let mut registry = ResourceRegistry::new();
    registry.add("dot.png".into(), ImageFormat::Rgb565, 1, 1, 0);

    let source = registry.emit_source(dir.path()).unwrap();
    assert!(source.contains("#include \"resources.h\""));
    assert!(source.contains("const uint16_t dot_png[] = {"));
    // width, height, frame_count lo/hi, loop, transparent key, format code
    assert!(source.contains("\t2, 2, 1, 0, 0, 0xf81f, 0,"));
    assert!(source.contains("0xf800")); // red
    assert!(source.contains("0x07e0")); // green
    assert!(source.contains("0x001f")); // blue
    assert!(source.contains("0xf81f")); // the transparent pixel
}

#[test]
fn indexed_resource_emits_palette_and_packed_pixels() {
    let dir = tempfile::tempdir().unwrap();

    let mut img = RgbaImage::new(2, 2);
    img.put_pixel(0, 0, Rgba([0, 0, 0, 255]));
    img.put_pixel(1, 0, Rgba([255, 255, 255, 255]));
    img.put_pixel(0, 1, Rgba([255, 255, 255, 255]));
    img.put_pixel(1, 1, Rgba([0, 0, 0, 255]));
    img.save(dir.path().join("tiles.png")).unwrap();

    let mut registry = ResourceRegistry::new();
    registry.add("tiles.png".into(), ImageFormat::Indexed, 2, 1, 1);

    let source = registry.emit_source(dir.path()).unwrap();
    assert!(source.contains("const uint16_t tiles_png_palette[] = {"));
    assert!(source.contains("const uint8_t tiles_png[] = {"));
    // two frames stacked vertically: frame height is 1
    assert!(source.contains("\t2, 1, 2, 0, 1, 0, 1,"));
    // indices 0,1,1,0 packed two per byte
    assert!(source.contains("0x01, 0x10,"));
}

#[test]
fn missing_files_are_skipped() {
    let dir = tempfile::tempdir().unwrap();

    let mut registry = ResourceRegistry::new();
    registry.add("ghost.png".into(), ImageFormat::Rgb565, 1, 1, 0);

    let source = registry.emit_source(dir.path()).unwrap();
    assert!(!source.contains("ghost_png[]"));
}
