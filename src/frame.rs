use image::RgbImage;

/// Decoded RGB frame as delivered by a capture source.
#[derive(Debug, Clone)]
pub struct Frame {
    pub image: RgbImage,
    /// Position within the current capture, restarts at 0 after a reopen.
    pub index: u64,
}

impl Frame {
    #[inline]
    pub fn new(image: RgbImage, index: u64) -> Self {
        Self { image, index }
    }

    /// (width, height) in pixels
    #[inline]
    pub fn dims(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}
