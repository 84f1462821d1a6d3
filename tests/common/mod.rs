#![allow(dead_code)]

use fileforge::data_model::Artifact;
use image::{ImageFormat, Rgba, RgbaImage};
use uuid::Uuid;

/// Builds a PNG filled with xorshift noise. Noise keeps the encoder from
/// compressing the payload away, so large test artifacts stay large.
pub fn noise_png(width: u32, height: u32) -> Vec<u8> {
    let mut seed = 0x2545_f491_4f6c_dd1du64;
    let img = RgbaImage::from_fn(width, height, |_, _| {
        seed ^= seed << 13;
        seed ^= seed >> 7;
        seed ^= seed << 17;
        Rgba([seed as u8, (seed >> 8) as u8, (seed >> 16) as u8, 255])
    });
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut std::io::Cursor::new(&mut buf), ImageFormat::Png)
        .expect("encoding a test PNG cannot fail");
    buf
}

pub fn artifact(name: &str, bytes: Vec<u8>) -> Artifact {
    Artifact {
        job_id: Uuid::new_v4(),
        original_name: name.to_string(),
        content_type: "image/png".to_string(),
        bytes,
    }
}
