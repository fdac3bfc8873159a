//! Image filters: black and white, sepia.

use async_trait::async_trait;
use image::{DynamicImage, GrayImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use tracing::info;

use super::error::ProcessorError;
use super::sink::OutputSink;
use super::traits::Processor;
use super::types::{MatchRule, ProcessOutput, ProcessRequest};

pub const OP_TO_BW: &str = "img_to_bw";
pub const OP_TO_SEPIA: &str = "img_to_sepia";

/// Sepia shadow tone (`#704214`).
const SEPIA_BLACK: [u8; 3] = [0x70, 0x42, 0x14];
/// Sepia highlight tone (`#C0A080`).
const SEPIA_WHITE: [u8; 3] = [0xC0, 0xA0, 0x80];

/// In-process image filters backed by the `image` crate.
#[derive(Debug, Default)]
pub struct ImageProcessor;

impl ImageProcessor {
    pub fn new() -> Self {
        Self
    }
}

fn decode(data: &[u8]) -> Result<DynamicImage, ProcessorError> {
    image::load_from_memory(data)
        .map_err(|e| ProcessorError::invalid_input(format!("unreadable image: {}", e)))
}

fn encode(image: DynamicImage, format: ImageFormat) -> Result<Vec<u8>, ProcessorError> {
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, format)?;
    Ok(buf.into_inner())
}

/// Converts to single-channel grayscale and encodes as PNG.
pub fn to_grayscale_png(data: &[u8]) -> Result<Vec<u8>, ProcessorError> {
    let gray = decode(data)?.to_luma8();
    encode(DynamicImage::ImageLuma8(gray), ImageFormat::Png)
}

/// Maps luminance linearly between the sepia shadow and highlight tones.
pub fn colorize(gray: &GrayImage, black: [u8; 3], white: [u8; 3]) -> RgbImage {
    let lerp = |lo: u8, hi: u8, l: u8| -> u8 {
        let t = l as f32 / 255.0;
        (lo as f32 + (hi as f32 - lo as f32) * t).round() as u8
    };
    RgbImage::from_fn(gray.width(), gray.height(), |x, y| {
        let l = gray.get_pixel(x, y)[0];
        Rgb([
            lerp(black[0], white[0], l),
            lerp(black[1], white[1], l),
            lerp(black[2], white[2], l),
        ])
    })
}

/// Applies the sepia tone and encodes as JPEG.
pub fn to_sepia_jpeg(data: &[u8]) -> Result<Vec<u8>, ProcessorError> {
    let gray = decode(data)?.to_luma8();
    let toned = colorize(&gray, SEPIA_BLACK, SEPIA_WHITE);
    encode(DynamicImage::ImageRgb8(toned), ImageFormat::Jpeg)
}

#[async_trait]
impl Processor for ImageProcessor {
    fn name(&self) -> &str {
        "image"
    }

    fn routes(&self) -> Vec<MatchRule> {
        vec![MatchRule::prefix("img_")]
    }

    fn operations(&self) -> &[&'static str] {
        &[OP_TO_BW, OP_TO_SEPIA]
    }

    async fn process(
        &self,
        mut request: ProcessRequest,
        sink: &OutputSink,
    ) -> Result<ProcessOutput, ProcessorError> {
        let (filter, output_name): (fn(&[u8]) -> Result<Vec<u8>, ProcessorError>, String) =
            match request.operation.as_str() {
                OP_TO_BW => (to_grayscale_png, format!("{}_bw.png", request.base_name)),
                OP_TO_SEPIA => (to_sepia_jpeg, format!("{}_sepia.jpg", request.base_name)),
                other => return Err(ProcessorError::unsupported(self.name(), other)),
            };

        let data = request.read_input().await?;
        let encoded = tokio::task::spawn_blocking(move || filter(&data)).await??;

        info!(
            operation = %request.operation,
            output = %output_name,
            size = encoded.len(),
            "Image filter applied"
        );
        let locator = sink.put_bytes(&output_name, encoded).await?;
        Ok(ProcessOutput::single(locator))
    }
}
