use std::collections::HashMap;

use crate::{
    assets::{Dataset, Layout},
    geometry::{centering_offset, contain_ratio, stretch_rect, DestRect, Offset, Size},
    CutinError, Result,
};

/// Shared fit of an anchored dataset's logical area on the current surface.
#[derive(Debug, Clone, Copy, PartialEq)]
struct AreaFit {
    ratio: f64,
    offset: Offset,
}

/// Memoized destination rectangles for the active dataset.
///
/// Every entry belongs to the surface size recorded in `surface`. A size
/// change empties the whole map before anything new is inserted, so stale and
/// fresh rectangles never coexist.
#[derive(Debug, Default)]
pub struct RectCache {
    surface: Option<Size>,
    fit: Option<AreaFit>,
    rects: HashMap<usize, DestRect>,
}

impl RectCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forgets everything, including the recorded surface size.
    pub fn clear(&mut self) {
        self.surface = None;
        self.fit = None;
        self.rects.clear();
    }

    pub fn len(&self) -> usize {
        self.rects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    /// Ratio of the anchored fit currently in use, if one was computed.
    pub fn ratio(&self) -> Option<f64> {
        self.fit.map(|fit| fit.ratio)
    }

    /// Records `surface` and drops every entry if it differs from the size
    /// the cache was built for. Returns whether anything was invalidated.
    pub fn sync_surface(&mut self, surface: Size) -> bool {
        if self.surface == Some(surface) {
            return false;
        }
        if let Some(previous) = self.surface {
            tracing::debug!(
                from = ?previous,
                to = ?surface,
                dropped = self.rects.len(),
                "surface resized, invalidating destination rects"
            );
        }
        self.surface = Some(surface);
        self.fit = None;
        self.rects.clear();
        true
    }

    /// Destination rectangle of frame `index` on `surface`.
    pub fn rect_for(&mut self, dataset: &Dataset, index: usize, surface: Size) -> Result<DestRect> {
        self.sync_surface(surface);
        if let Some(rect) = self.rects.get(&index) {
            return Ok(*rect);
        }

        let frame = dataset.frame(index).ok_or_else(|| {
            CutinError::msg(format!(
                "frame {index} of `{}` is not loaded",
                dataset.name()
            ))
        })?;

        let rect = match dataset.layout() {
            Layout::Stretch => stretch_rect(frame.size(), surface)?,
            Layout::Anchored { area, positions } => {
                let position = positions.get(index).ok_or_else(|| {
                    CutinError::msg(format!(
                        "no position for frame {index} of `{}`",
                        dataset.name()
                    ))
                })?;
                let fit = self.area_fit(*area, surface)?;
                DestRect {
                    x: fit.offset.dx + position.dx * fit.ratio,
                    y: fit.offset.dy + position.dy * fit.ratio,
                    width: frame.width as f64 * fit.ratio,
                    height: frame.height as f64 * fit.ratio,
                }
            }
        };

        self.rects.insert(index, rect);
        Ok(rect)
    }

    fn area_fit(&mut self, area: Size, surface: Size) -> Result<AreaFit> {
        if let Some(fit) = self.fit {
            return Ok(fit);
        }
        let ratio = contain_ratio(area, surface)?;
        let fit = AreaFit {
            ratio,
            offset: centering_offset(area, surface, ratio),
        };
        self.fit = Some(fit);
        Ok(fit)
    }
}
