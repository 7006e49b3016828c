use std::collections::BTreeMap;

use image::{codecs::jpeg::JpegEncoder, Rgb, RgbImage};
use imageproc::{
    drawing::{draw_filled_circle_mut, draw_hollow_rect_mut, draw_line_segment_mut},
    rect::Rect,
};
use nalgebra as na;

use crate::bbox::{BBox, Ltrb};
use crate::counter::Boundary;
use crate::error::Error;
use crate::scheduler::BoxSource;

const DETECTED: Rgb<u8> = Rgb([255, 0, 0]);
const TRACKED: Rgb<u8> = Rgb([255, 128, 0]);
const CENTROID: Rgb<u8> = Rgb([255, 0, 0]);
const LIMIT_IN: Rgb<u8> = Rgb([255, 255, 0]);
const LIMIT_OUT: Rgb<u8> = Rgb([0, 255, 255]);
const BANNER: Rgb<u8> = Rgb([0, 255, 0]);

const GLYPH_ADVANCE: i32 = 6;

/// Everything drawn on top of one frame.
pub struct Overlay<'a> {
    pub boxes: &'a [BBox<Ltrb>],
    pub source: BoxSource,
    pub objects: &'a BTreeMap<u32, na::Point2<f32>>,
    pub boundary: &'a Boundary,
    pub total_in: u64,
    pub total_out: u64,
}

/// JPEG of an annotated frame plus the counters at the time it was produced.
#[derive(Debug, Clone)]
pub struct EncodedFrame {
    pub jpeg: Vec<u8>,
    pub index: u64,
    pub source: BoxSource,
    pub tracked: usize,
    pub total_in: u64,
    pub total_out: u64,
}

impl EncodedFrame {
    /// One part of a `multipart/x-mixed-replace; boundary=frame` body.
    pub fn mjpeg_part(&self) -> Vec<u8> {
        let head = b"--frame\r\nContent-Type: image/jpeg\r\n\r\n";
        let mut part = Vec::with_capacity(head.len() + self.jpeg.len() + 2);
        part.extend_from_slice(head);
        part.extend_from_slice(&self.jpeg);
        part.extend_from_slice(b"\r\n");
        part
    }
}

pub fn annotate(image: &mut RgbImage, overlay: &Overlay<'_>) {
    let width = image.width() as f32;

    let color = match overlay.source {
        BoxSource::Detected => DETECTED,
        BoxSource::Tracked => TRACKED,
    };

    for b in overlay.boxes {
        let b = b.as_ltwh();
        let rect = Rect::at(b.left() as i32, b.top() as i32)
            .of_size((b.width() as u32).max(1), (b.height() as u32).max(1));

        draw_hollow_rect_mut(image, rect, color);
    }

    for (id, c) in overlay.objects {
        let (x, y) = (c.x as i32, c.y as i32);

        draw_filled_circle_mut(image, (x, y), 4, CENTROID);
        draw_label(image, x, y + 12, &format!("ID {}", id), CENTROID);
    }

    let limit_in = overlay.boundary.limit_in;
    let limit_out = overlay.boundary.limit_out;
    draw_line_segment_mut(image, (0.0, limit_in), (width, limit_in), LIMIT_IN);
    draw_line_segment_mut(image, (0.0, limit_out), (width, limit_out), LIMIT_OUT);

    let banner = format!("IN {}  OUT {}", overlay.total_in, overlay.total_out);
    draw_label(image, 4, 4, &banner, BANNER);
}

pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>, Error> {
    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100)).encode_image(image)?;

    Ok(buffer)
}

fn draw_label(image: &mut RgbImage, mut x: i32, y: i32, text: &str, color: Rgb<u8>) {
    let (width, height) = (image.width() as i32, image.height() as i32);

    for ch in text.chars().flat_map(char::to_uppercase) {
        if let Some(glyph) = glyph_bits(ch) {
            for (row, pattern) in glyph.iter().enumerate() {
                let py = y + row as i32;
                if py < 0 || py >= height {
                    continue;
                }

                for col in 0..5 {
                    let px = x + col;
                    if (pattern >> (4 - col)) & 1 == 1 && px >= 0 && px < width {
                        image.put_pixel(px as u32, py as u32, color);
                    }
                }
            }
        }

        x += GLYPH_ADVANCE;
    }
}

// 5x7 bitmaps, enough for identity labels and the counter banner
fn glyph_bits(ch: char) -> Option<[u8; 7]> {
    Some(match ch {
        'D' => [0b11110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b11110],
        'I' => [0b01110, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        'N' => [0b10001, 0b11001, 0b10101, 0b10101, 0b10011, 0b10001, 0b10001],
        'O' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'T' => [0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100],
        'U' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        '0' => [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110],
        '1' => [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        '2' => [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111],
        '3' => [0b11110, 0b00001, 0b00001, 0b01110, 0b00001, 0b00001, 0b11110],
        '4' => [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010],
        '5' => [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110],
        '6' => [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110],
        '7' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000],
        '8' => [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110],
        '9' => [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100],
        _ => return None,
    })
}
