use image::{imageops, Rgba, RgbaImage};

use crate::{
    assets::Frame,
    geometry::{DestRect, Size},
};

/// Drawing target owned by the caller. Only the render loop and explicit
/// clears write to it.
pub trait Surface {
    fn size(&self) -> Size;
    fn clear(&mut self);
    fn draw(&mut self, frame: &Frame, dest: DestRect);
}

/// In-memory RGBA surface.
///
/// Mirroring is a presentation transform applied here, around the engine's
/// draw calls; the engine always computes unmirrored rectangles.
#[derive(Debug, Clone)]
pub struct Canvas {
    image: RgbaImage,
    mirror: bool,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: RgbaImage::new(width, height),
            mirror: false,
        }
    }

    pub fn with_mirror(mut self, mirror: bool) -> Self {
        self.mirror = mirror;
        self
    }

    pub fn set_mirror(&mut self, mirror: bool) {
        self.mirror = mirror;
    }

    /// Resizes the backing buffer. Like a canvas element, resizing drops its
    /// content.
    pub fn resize(&mut self, width: u32, height: u32) {
        if self.image.dimensions() != (width, height) {
            self.image = RgbaImage::new(width, height);
        }
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }
}

impl Surface for Canvas {
    fn size(&self) -> Size {
        Size::from(self.image.dimensions())
    }

    fn clear(&mut self) {
        for pixel in self.image.pixels_mut() {
            *pixel = Rgba([0, 0, 0, 0]);
        }
    }

    fn draw(&mut self, frame: &Frame, dest: DestRect) {
        let width = dest.width.round();
        let height = dest.height.round();
        if !(width >= 1.0 && height >= 1.0) {
            return;
        }
        let (width, height) = (width as u32, height as u32);

        let mut scaled = if frame.pixels.dimensions() == (width, height) {
            (*frame.pixels).clone()
        } else {
            imageops::resize(&*frame.pixels, width, height, imageops::FilterType::Nearest)
        };

        let mut x = dest.x.round() as i64;
        if self.mirror {
            imageops::flip_horizontal_in_place(&mut scaled);
            x = self.image.width() as i64 - x - width as i64;
        }
        imageops::overlay(&mut self.image, &scaled, x, dest.y.round() as i64);
    }
}
