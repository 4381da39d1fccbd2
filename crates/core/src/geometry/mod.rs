//! Aspect-preserving fit calculations.
//!
//! Two placement modes exist. Datasets with placement metadata share one
//! contain-fit ratio between their logical area and the surface, plus a
//! centering offset. Datasets without metadata fit every frame on its own
//! against the full surface.

use serde::{Deserialize, Serialize};

use crate::{CutinError, Result};

/// Width and height in either logical or surface pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn is_degenerate(&self) -> bool {
        !(self.width.is_finite() && self.height.is_finite())
            || self.width <= 0.0
            || self.height <= 0.0
    }

    fn ensure_positive(self, what: &'static str) -> Result<Self> {
        if self.is_degenerate() {
            Err(CutinError::degenerate(what, self.width, self.height))
        } else {
            Ok(self)
        }
    }
}

impl From<(u32, u32)> for Size {
    fn from((width, height): (u32, u32)) -> Self {
        Self::new(width as f64, height as f64)
    }
}

/// Translation applied after scaling.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Offset {
    pub dx: f64,
    pub dy: f64,
}

/// Where a frame lands on the surface.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DestRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Uniform scale factor that fits `area` inside `surface` without cropping.
///
/// A surface relatively wider than the area is pillarboxed and the ratio
/// comes from the heights; otherwise the area is letterboxed and the ratio
/// comes from the widths.
pub fn contain_ratio(area: Size, surface: Size) -> Result<f64> {
    let area = area.ensure_positive("area")?;
    let surface = surface.ensure_positive("surface")?;

    // surface.w / surface.h > area.w / area.h, without dividing.
    if surface.width * area.height > area.width * surface.height {
        Ok(surface.height / area.height)
    } else {
        Ok(surface.width / area.width)
    }
}

/// Offset that centers `area` scaled by `ratio` inside `surface`.
pub fn centering_offset(area: Size, surface: Size, ratio: f64) -> Offset {
    Offset {
        dx: (surface.width - area.width * ratio) / 2.0,
        dy: (surface.height - area.height * ratio) / 2.0,
    }
}

/// Contain-fits a single frame against the whole surface, centered.
pub fn stretch_rect(frame: Size, surface: Size) -> Result<DestRect> {
    let frame = frame.ensure_positive("frame")?;
    let surface = surface.ensure_positive("surface")?;

    if frame.width * surface.height >= surface.width * frame.height {
        let height = frame.height * (surface.width / frame.width);
        Ok(DestRect {
            x: 0.0,
            y: (surface.height - height) / 2.0,
            width: surface.width,
            height,
        })
    } else {
        let width = frame.width * (surface.height / frame.height);
        Ok(DestRect {
            x: (surface.width - width) / 2.0,
            y: 0.0,
            width,
            height: surface.height,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn pillarboxes_wide_surfaces() {
        let area = Size::new(200.0, 100.0);
        let surface = Size::new(400.0, 100.0);

        let ratio = contain_ratio(area, surface).unwrap();
        assert_eq!(ratio, 1.0);

        let offset = centering_offset(area, surface, ratio);
        assert_eq!(offset, Offset { dx: 100.0, dy: 0.0 });
    }

    #[test]
    fn letterboxes_tall_surfaces() {
        let area = Size::new(200.0, 100.0);
        let surface = Size::new(100.0, 400.0);

        let ratio = contain_ratio(area, surface).unwrap();
        assert_eq!(ratio, 0.5);

        let offset = centering_offset(area, surface, ratio);
        assert_eq!(offset, Offset { dx: 0.0, dy: 175.0 });
    }

    #[test]
    fn contain_fit_never_overflows_and_touches_one_axis() {
        let areas = [(200.0, 100.0), (1.0, 1.0), (333.0, 719.0), (1920.0, 1080.0)];
        let surfaces = [(400.0, 100.0), (1060.0, 600.0), (7.0, 3000.0), (1.0, 1.0)];

        for &(aw, ah) in &areas {
            for &(sw, sh) in &surfaces {
                let area = Size::new(aw, ah);
                let surface = Size::new(sw, sh);
                let ratio = contain_ratio(area, surface).unwrap();
                let scaled_w = aw * ratio;
                let scaled_h = ah * ratio;

                assert!(scaled_w <= sw + EPS, "{aw}x{ah} in {sw}x{sh}");
                assert!(scaled_h <= sh + EPS, "{aw}x{ah} in {sw}x{sh}");
                assert!(
                    (scaled_w - sw).abs() < EPS || (scaled_h - sh).abs() < EPS,
                    "{aw}x{ah} in {sw}x{sh} touches no edge"
                );
            }
        }
    }

    #[test]
    fn rejects_degenerate_geometry() {
        let ok = Size::new(10.0, 10.0);
        assert!(matches!(
            contain_ratio(Size::new(0.0, 10.0), ok),
            Err(CutinError::DegenerateGeometry { what: "area", .. })
        ));
        assert!(matches!(
            contain_ratio(ok, Size::new(10.0, 0.0)),
            Err(CutinError::DegenerateGeometry { what: "surface", .. })
        ));
        assert!(matches!(
            stretch_rect(Size::new(f64::NAN, 1.0), ok),
            Err(CutinError::DegenerateGeometry { what: "frame", .. })
        ));
    }

    #[test]
    fn stretch_rect_centers_each_frame() {
        let surface = Size::new(400.0, 100.0);

        let square = stretch_rect(Size::new(50.0, 50.0), surface).unwrap();
        assert_eq!(
            square,
            DestRect {
                x: 150.0,
                y: 0.0,
                width: 100.0,
                height: 100.0
            }
        );

        let banner = stretch_rect(Size::new(800.0, 100.0), surface).unwrap();
        assert_eq!(
            banner,
            DestRect {
                x: 0.0,
                y: 25.0,
                width: 400.0,
                height: 50.0
            }
        );
    }
}
