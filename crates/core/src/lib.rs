//! Playback engine for "cutin" frame sequences.
//!
//! A dataset is a folder of numbered PNG frames with optional placement
//! metadata. The crate loads and caches datasets, fits them to a resizable
//! surface, and plays them back at a target frame rate from whatever
//! display-refresh signal the host provides. Drawing goes through the
//! [`Surface`] trait so hosts own the actual output.

pub mod assets;
pub mod config;
pub mod error;
pub mod geometry;
pub mod loader;
pub mod placement;
pub mod player;
pub mod record;
pub mod render;
pub mod timeline;

pub use assets::{
    AssetSource, Dataset, DatasetMetadata, DatasetRequest, Frame, FsAssetSource, Layout,
    MemorySource, MAX_FRAMES,
};
pub use config::{AppConfig, AssetConfig, PlaybackConfig, SurfaceConfig};
pub use error::{CutinError, Result};
pub use geometry::{centering_offset, contain_ratio, stretch_rect, DestRect, Offset, Size};
pub use loader::{DatasetLoader, Dispatch, IdleDispatch, InlineDispatch, RayonDispatch};
pub use placement::RectCache;
pub use player::{LoadProgress, PlaybackSession, PlaybackState, Player, PlayerEvent, TickOutcome};
pub use record::{Recorder, RecordingSettings};
pub use render::{Canvas, Surface};
pub use timeline::{ClearSchedule, FrameCursor, FramePacer};
