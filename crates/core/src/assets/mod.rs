use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    str::FromStr,
    sync::Arc,
};

use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::{
    geometry::{Offset, Size},
    CutinError, Result,
};

/// Upper bound on frames per dataset; every frame gets a decode job and a
/// slot up front.
pub const MAX_FRAMES: usize = 100_000;

/// What the caller asked to play: a dataset name and, for datasets without
/// metadata, how many frames it has.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DatasetRequest {
    pub name: String,
    pub frame_count: Option<usize>,
}

impl DatasetRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            frame_count: None,
        }
    }

    pub fn with_frame_count(mut self, frame_count: usize) -> Self {
        self.frame_count = Some(frame_count);
        self
    }

    /// Parses `"<name>-<maxIndex>"` or a bare `"<name>"`.
    ///
    /// The suffix after the last `-` is only treated as a max index when it
    /// is a plain integer, so names such as `walk-cycle` stay intact.
    pub fn parse(selector: &str) -> Result<Self> {
        let selector = selector.trim();
        let request = match selector.rsplit_once('-') {
            Some((name, max_index)) if !max_index.is_empty() => match max_index.parse::<usize>() {
                Ok(max_index) => {
                    let frame_count = max_index
                        .checked_add(1)
                        .filter(|&count| count <= MAX_FRAMES)
                        .ok_or_else(|| CutinError::InvalidSelector(selector.to_string()))?;
                    Self::new(name).with_frame_count(frame_count)
                }
                Err(_) => Self::new(selector),
            },
            _ => Self::new(selector),
        };

        if request.name.is_empty()
            || request.name.contains(['/', '\\'])
            || request.name.split('.').all(|part| part.is_empty())
        {
            return Err(CutinError::InvalidSelector(selector.to_string()));
        }
        Ok(request)
    }
}

impl FromStr for DatasetRequest {
    type Err = CutinError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// On-disk placement metadata for one dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetMetadata {
    /// Logical width and height that positions are authored against.
    pub area: [f64; 2],
    #[serde(rename = "maxIndex")]
    pub max_index: usize,
    #[serde(default)]
    pub positions: Option<Vec<[f64; 2]>>,
}

impl DatasetMetadata {
    pub fn from_slice(dataset: &str, bytes: &[u8]) -> Result<Self> {
        let metadata: Self =
            serde_json::from_slice(bytes).map_err(|err| CutinError::asset_load(dataset, err))?;
        metadata.validate(dataset)?;
        Ok(metadata)
    }

    pub fn frame_count(&self) -> usize {
        self.max_index.saturating_add(1)
    }

    pub fn area(&self) -> Size {
        Size::new(self.area[0], self.area[1])
    }

    fn validate(&self, dataset: &str) -> Result<()> {
        if self.area().is_degenerate() {
            return Err(CutinError::asset_load(
                dataset,
                format!("area {}x{} must be positive", self.area[0], self.area[1]),
            ));
        }
        if self.max_index >= MAX_FRAMES {
            return Err(CutinError::asset_load(
                dataset,
                format!("maxIndex {} exceeds the {MAX_FRAMES} frame limit", self.max_index),
            ));
        }
        if let Some(positions) = &self.positions {
            if positions.len() != self.frame_count() {
                return Err(CutinError::asset_load(
                    dataset,
                    format!(
                        "expected {} positions for maxIndex {}, found {}",
                        self.frame_count(),
                        self.max_index,
                        positions.len()
                    ),
                ));
            }
            if positions.iter().flatten().any(|value| !value.is_finite()) {
                return Err(CutinError::asset_load(dataset, "positions must be finite"));
            }
        }
        Ok(())
    }
}

/// How frames of a dataset are placed on the surface.
#[derive(Debug, Clone, PartialEq)]
pub enum Layout {
    /// Every frame is contain-fit on its own.
    Stretch,
    /// Frames share a logical area and carry authored offsets within it.
    Anchored { area: Size, positions: Vec<Offset> },
}

impl Layout {
    fn from_metadata(metadata: Option<&DatasetMetadata>) -> Self {
        let Some(metadata) = metadata else {
            return Layout::Stretch;
        };
        match &metadata.positions {
            Some(positions) => Layout::Anchored {
                area: metadata.area(),
                positions: positions
                    .iter()
                    .map(|&[dx, dy]| Offset { dx, dy })
                    .collect(),
            },
            None => Layout::Stretch,
        }
    }
}

/// One decoded image of a sequence.
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub pixels: Arc<RgbaImage>,
    /// Set when decoding failed and a transparent stand-in was used.
    pub placeholder: bool,
}

impl Frame {
    /// Decodes encoded image bytes into RGBA8.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let rgba = image::load_from_memory(bytes)?.to_rgba8();
        let (width, height) = rgba.dimensions();
        Ok(Self {
            width,
            height,
            pixels: Arc::new(rgba),
            placeholder: false,
        })
    }

    /// A 1x1 fully transparent frame.
    pub fn placeholder() -> Self {
        Self {
            width: 1,
            height: 1,
            pixels: Arc::new(RgbaImage::new(1, 1)),
            placeholder: true,
        }
    }

    pub fn size(&self) -> Size {
        Size::from((self.width, self.height))
    }
}

/// A named frame sequence plus its placement layout.
///
/// Frame slots fill in as decodes complete and are never replaced once set.
#[derive(Debug, Clone)]
pub struct Dataset {
    name: String,
    layout: Layout,
    has_metadata: bool,
    frames: Vec<Option<Frame>>,
}

impl Dataset {
    pub fn new(
        request: &DatasetRequest,
        metadata: Option<&DatasetMetadata>,
    ) -> Result<Self> {
        let frame_count = match (metadata, request.frame_count) {
            (Some(metadata), requested) => {
                if let Some(requested) = requested.filter(|&n| n != metadata.frame_count()) {
                    tracing::warn!(
                        dataset = %request.name,
                        requested,
                        metadata = metadata.frame_count(),
                        "selector frame count disagrees with metadata, using metadata"
                    );
                }
                metadata.frame_count()
            }
            (None, Some(requested)) => requested,
            (None, None) => {
                return Err(CutinError::asset_load(
                    &request.name,
                    "no metadata and no frame count in selector",
                ))
            }
        };
        if frame_count == 0 {
            return Err(CutinError::asset_load(&request.name, "dataset has no frames"));
        }
        if frame_count > MAX_FRAMES {
            return Err(CutinError::asset_load(
                &request.name,
                format!("{frame_count} frames exceeds the {MAX_FRAMES} frame limit"),
            ));
        }

        Ok(Self {
            name: request.name.clone(),
            layout: Layout::from_metadata(metadata),
            has_metadata: metadata.is_some(),
            frames: vec![None; frame_count],
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Whether the frame count came from a metadata document rather than
    /// the selector.
    pub fn has_metadata(&self) -> bool {
        self.has_metadata
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn frame(&self, index: usize) -> Option<&Frame> {
        self.frames.get(index).and_then(Option::as_ref)
    }

    pub fn loaded_count(&self) -> usize {
        self.frames.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_complete(&self) -> bool {
        self.frames.iter().all(Option::is_some)
    }

    pub fn missing_indices(&self) -> Vec<usize> {
        self.frames
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.is_none().then_some(index))
            .collect()
    }

    /// Stores a decoded frame. Returns `false` when the slot was already set
    /// or the index is out of range.
    pub(crate) fn fill(&mut self, index: usize, frame: Frame) -> bool {
        match self.frames.get_mut(index) {
            Some(slot @ None) => {
                *slot = Some(frame);
                true
            }
            _ => false,
        }
    }
}

/// Backing store for dataset bytes.
pub trait AssetSource: Send + Sync {
    /// Raw metadata document, or `None` when the dataset ships without one.
    fn metadata(&self, dataset: &str) -> Result<Option<Vec<u8>>>;

    /// Encoded bytes of frame `index`.
    fn frame(&self, dataset: &str, index: usize) -> Result<Vec<u8>>;
}

/// Reads `<root>/<name>/<index>.png` and `<root>/<name>/<metadata_file>`.
#[derive(Debug, Clone)]
pub struct FsAssetSource {
    root: PathBuf,
    metadata_file: String,
}

impl FsAssetSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            metadata_file: "data.json".to_string(),
        }
    }

    pub fn with_metadata_file(mut self, metadata_file: impl Into<String>) -> Self {
        self.metadata_file = metadata_file.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn frame_path(&self, dataset: &str, index: usize) -> PathBuf {
        self.root.join(dataset).join(format!("{index}.png"))
    }

    pub fn metadata_path(&self, dataset: &str) -> PathBuf {
        self.root.join(dataset).join(&self.metadata_file)
    }
}

impl AssetSource for FsAssetSource {
    fn metadata(&self, dataset: &str) -> Result<Option<Vec<u8>>> {
        match std::fs::read(self.metadata_path(dataset)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(CutinError::asset_load(dataset, err)),
        }
    }

    fn frame(&self, dataset: &str, index: usize) -> Result<Vec<u8>> {
        Ok(std::fs::read(self.frame_path(dataset, index))?)
    }
}

/// In-memory source, handy for embedding assets or for tests.
#[derive(Debug, Default, Clone)]
pub struct MemorySource {
    metadata: HashMap<String, Vec<u8>>,
    frames: HashMap<(String, usize), Vec<u8>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_metadata(&mut self, dataset: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.metadata.insert(dataset.into(), bytes.into());
    }

    pub fn insert_frame(&mut self, dataset: impl Into<String>, index: usize, bytes: Vec<u8>) {
        self.frames.insert((dataset.into(), index), bytes);
    }
}

impl AssetSource for MemorySource {
    fn metadata(&self, dataset: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.metadata.get(dataset).cloned())
    }

    fn frame(&self, dataset: &str, index: usize) -> Result<Vec<u8>> {
        self.frames
            .get(&(dataset.to_string(), index))
            .cloned()
            .ok_or_else(|| CutinError::msg(format!("no frame {index} in `{dataset}`")))
    }
}

/// Encodes a solid-colour PNG for fixtures.
#[cfg(test)]
pub(crate) fn png_bytes(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, image::Rgba(rgba));
    let mut out = std::io::Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}
