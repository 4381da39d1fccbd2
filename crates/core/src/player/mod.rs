//! Playback state machine.
//!
//! ```text
//! Idle ──select──▶ Loading ──all frames in──▶ Playing
//!                    ▲                           │
//!                    └─────────select────────────┘
//! ```
//!
//! The host drives [`Player::tick`] from its display-refresh signal. Each
//! tick drains decode completions, performs any clear requested by a
//! selection, and while playing draws at most one frame, throttled to the
//! target frame rate. Playback loops until another dataset is selected.

use std::{sync::Arc, time::Instant};

use crate::{
    assets::{AssetSource, DatasetRequest},
    config::PlaybackConfig,
    loader::{DatasetLoader, LoadTicket},
    placement::RectCache,
    render::Surface,
    timeline::{ClearSchedule, FrameCursor, FramePacer},
    CutinError, Result,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Loading,
    Playing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadProgress {
    pub loaded: usize,
    pub total: usize,
}

/// Notifications for the host, drained by [`Player::pump`] and
/// [`Player::tick`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerEvent {
    Progress(LoadProgress),
    /// Emitted once per selection, when every frame is in.
    Ready { dataset: String },
}

/// Live state of the selected dataset.
#[derive(Debug, Clone)]
pub struct PlaybackSession {
    generation: u64,
    dataset: String,
    total: usize,
    loaded: usize,
    cursor: FrameCursor,
    clear: ClearSchedule,
}

impl PlaybackSession {
    fn new(generation: u64, dataset: String, ticket: LoadTicket, clear_after: u32) -> Self {
        Self {
            generation,
            dataset,
            total: ticket.total,
            loaded: ticket.loaded,
            cursor: FrameCursor::default(),
            clear: ClearSchedule::new(clear_after),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn dataset(&self) -> &str {
        &self.dataset
    }

    pub fn progress(&self) -> LoadProgress {
        LoadProgress {
            loaded: self.loaded,
            total: self.total,
        }
    }

    pub fn cursor(&self) -> FrameCursor {
        self.cursor
    }

    pub fn frames_since_clear(&self) -> u32 {
        self.clear.since_clear()
    }
}

/// What happened during one [`Player::tick`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickOutcome {
    pub events: Vec<PlayerEvent>,
    pub cleared: bool,
    /// Index of the frame drawn this tick, if any.
    pub drawn: Option<usize>,
}

#[derive(Debug)]
pub struct Player {
    loader: DatasetLoader,
    rects: RectCache,
    pacer: FramePacer,
    config: PlaybackConfig,
    state: PlaybackState,
    session: Option<PlaybackSession>,
    generation: u64,
    pending_clear: bool,
    events: Vec<PlayerEvent>,
}

impl Player {
    pub fn new(loader: DatasetLoader, config: PlaybackConfig) -> Self {
        let config = config.clamped();
        Self {
            loader,
            rects: RectCache::new(),
            pacer: FramePacer::new(config.target_fps),
            config,
            state: PlaybackState::Idle,
            session: None,
            generation: 0,
            pending_clear: false,
            events: Vec::new(),
        }
    }

    /// Creates a player decoding `source` on the rayon pool.
    pub fn from_source(source: Arc<dyn AssetSource>, config: PlaybackConfig) -> Self {
        Self::new(DatasetLoader::new(source), config)
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn session(&self) -> Option<&PlaybackSession> {
        self.session.as_ref()
    }

    pub fn progress(&self) -> Option<LoadProgress> {
        self.session.as_ref().map(PlaybackSession::progress)
    }

    pub fn config(&self) -> PlaybackConfig {
        self.config
    }

    pub fn loader(&self) -> &DatasetLoader {
        &self.loader
    }

    pub fn rect_cache(&self) -> &RectCache {
        &self.rects
    }

    /// Changes the target frame rate, clamped into the accepted range.
    pub fn set_target_fps(&mut self, target_fps: f64) {
        self.config = PlaybackConfig {
            target_fps,
            ..self.config
        }
        .clamped();
        self.pacer.set_target_fps(self.config.target_fps);
    }

    pub fn set_clear_after_frames(&mut self, clear_after_frames: u32) {
        self.config.clear_after_frames = clear_after_frames;
        if let Some(session) = self.session.as_mut() {
            session.clear.set_threshold(clear_after_frames);
        }
    }

    /// Parses a `"<name>-<maxIndex>"` selector and selects it.
    pub fn select_str(&mut self, selector: &str) -> Result<()> {
        self.select(DatasetRequest::parse(selector)?)
    }

    /// Starts a new session for `request`, superseding any previous one.
    ///
    /// Metadata failures are returned here and leave the player idle. A
    /// dataset that is already fully cached starts playing immediately.
    pub fn select(&mut self, request: DatasetRequest) -> Result<()> {
        self.generation += 1;
        let generation = self.generation;

        self.session = None;
        self.events.clear();
        self.rects.clear();
        self.pacer.reset();
        self.pending_clear = true;
        self.state = PlaybackState::Loading;
        tracing::info!(dataset = %request.name, generation, "selecting dataset");

        let ticket = match self.loader.begin(&request, generation) {
            Ok(ticket) => ticket,
            Err(err) => {
                tracing::error!(dataset = %request.name, error = %err, "dataset failed to load");
                self.state = PlaybackState::Idle;
                return Err(err);
            }
        };

        let session = PlaybackSession::new(
            generation,
            request.name,
            ticket,
            self.config.clear_after_frames,
        );
        self.events.push(PlayerEvent::Progress(session.progress()));
        self.session = Some(session);

        if ticket.is_ready() {
            self.enter_playing();
        }
        Ok(())
    }

    /// Drains decode completions and returns pending events.
    pub fn pump(&mut self) -> Vec<PlayerEvent> {
        let update = self.loader.poll(self.generation);

        if self.state == PlaybackState::Loading {
            if let Some(session) = self.session.as_mut() {
                for _ in &update.accepted {
                    session.loaded = (session.loaded + 1).min(session.total);
                    self.events.push(PlayerEvent::Progress(session.progress()));
                }
                if session.loaded == session.total {
                    self.enter_playing();
                }
            }
        }

        std::mem::take(&mut self.events)
    }

    /// Advances playback by one display refresh at `now`.
    pub fn tick(&mut self, now: Instant, surface: &mut dyn Surface) -> Result<TickOutcome> {
        let mut outcome = TickOutcome {
            events: self.pump(),
            ..Default::default()
        };

        if self.pending_clear {
            surface.clear();
            self.pending_clear = false;
            outcome.cleared = true;
        }

        if self.state != PlaybackState::Playing {
            return Ok(outcome);
        }

        let size = surface.size();
        self.rects.sync_surface(size);
        if !self.pacer.is_due(now) {
            return Ok(outcome);
        }

        let session = self
            .session
            .as_mut()
            .ok_or_else(|| CutinError::msg("playing without a session"))?;
        let dataset = self.loader.dataset(&session.dataset).ok_or_else(|| {
            CutinError::msg(format!("dataset `{}` is not cached", session.dataset))
        })?;

        let index = session.cursor.display_frame(dataset.frame_count());
        let rect = self.rects.rect_for(dataset, index, size)?;
        let frame = dataset
            .frame(index)
            .ok_or_else(|| CutinError::msg(format!("frame {index} is not loaded")))?;

        if session.clear.take_clear() {
            surface.clear();
            outcome.cleared = true;
        }
        surface.draw(frame, rect);
        self.pacer.record_frame(now);
        session.cursor.advance();
        session.clear.record_draw();
        outcome.drawn = Some(index);

        Ok(outcome)
    }

    fn enter_playing(&mut self) {
        if self.state != PlaybackState::Loading {
            return;
        }
        if let Some(session) = &self.session {
            tracing::info!(
                dataset = %session.dataset,
                frames = session.total,
                generation = session.generation,
                "dataset ready, starting playback"
            );
            self.events.push(PlayerEvent::Ready {
                dataset: session.dataset.clone(),
            });
            self.state = PlaybackState::Playing;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        assets::{png_bytes, Frame, MemorySource},
        geometry::{DestRect, Size},
        loader::{IdleDispatch, InlineDispatch},
    };

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Clear,
        Draw { width: u32, rect: DestRect },
    }

    struct RecordingSurface {
        size: Size,
        calls: Vec<Call>,
    }

    impl RecordingSurface {
        fn new(width: f64, height: f64) -> Self {
            Self {
                size: Size::new(width, height),
                calls: Vec::new(),
            }
        }

        fn draws(&self) -> Vec<DestRect> {
            self.calls
                .iter()
                .filter_map(|call| match call {
                    Call::Draw { rect, .. } => Some(*rect),
                    Call::Clear => None,
                })
                .collect()
        }
    }

    impl Surface for RecordingSurface {
        fn size(&self) -> Size {
            self.size
        }

        fn clear(&mut self) {
            self.calls.push(Call::Clear);
        }

        fn draw(&mut self, frame: &Frame, rect: DestRect) {
            self.calls.push(Call::Draw {
                width: frame.width,
                rect,
            });
        }
    }

    fn source() -> MemorySource {
        let mut source = MemorySource::new();
        source.insert_metadata(
            "walk",
            r#"{ "area": [200, 100], "maxIndex": 1, "positions": [[0, 0], [10, 5]] }"#,
        );
        source.insert_frame("walk", 0, png_bytes(20, 10, [255, 0, 0, 255]));
        source.insert_frame("walk", 1, png_bytes(30, 10, [0, 255, 0, 255]));
        for index in 0..3 {
            source.insert_frame("run", index, png_bytes(50, 50, [0, 0, 255, 255]));
        }
        source
    }

    fn config(fps: f64, clear_after_frames: u32) -> PlaybackConfig {
        PlaybackConfig {
            target_fps: fps,
            clear_after_frames,
        }
    }

    fn inline_player(config: PlaybackConfig) -> Player {
        let loader = DatasetLoader::with_dispatcher(Arc::new(source()), Box::new(InlineDispatch));
        Player::new(loader, config)
    }

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    #[test]
    fn walks_through_loading_into_playing() {
        let mut player = inline_player(config(10.0, 0));
        assert_eq!(player.state(), PlaybackState::Idle);

        player.select_str("walk").unwrap();
        assert_eq!(player.state(), PlaybackState::Loading);

        let events = player.pump();
        assert_eq!(
            events,
            vec![
                PlayerEvent::Progress(LoadProgress { loaded: 0, total: 2 }),
                PlayerEvent::Progress(LoadProgress { loaded: 1, total: 2 }),
                PlayerEvent::Progress(LoadProgress { loaded: 2, total: 2 }),
                PlayerEvent::Ready {
                    dataset: "walk".to_string()
                },
            ]
        );
        assert_eq!(player.state(), PlaybackState::Playing);
        assert!(player.pump().is_empty());
    }

    #[test]
    fn places_walk_frames_on_a_wide_surface() {
        let mut player = inline_player(config(10.0, 0));
        let mut surface = RecordingSurface::new(400.0, 100.0);
        let start = Instant::now();

        player.select_str("walk").unwrap();
        let first = player.tick(start, &mut surface).unwrap();
        assert!(first.cleared);
        assert_eq!(first.drawn, Some(0));

        let second = player.tick(start + ms(100), &mut surface).unwrap();
        assert_eq!(second.drawn, Some(1));

        assert!(matches!(surface.calls[2], Call::Draw { width: 30, .. }));
        let draws = surface.draws();
        assert_eq!((draws[0].x, draws[0].y), (100.0, 0.0));
        assert_eq!(
            draws[1],
            DestRect {
                x: 110.0,
                y: 5.0,
                width: 30.0,
                height: 10.0
            }
        );
    }

    #[test]
    fn throttles_to_target_fps_and_loops() {
        let mut player = inline_player(config(10.0, 0));
        let mut surface = RecordingSurface::new(400.0, 100.0);
        let start = Instant::now();
        player.select_str("walk").unwrap();

        let mut drawn = Vec::new();
        // 60 Hz refresh for half a second.
        for refresh in 0..30u64 {
            let outcome = player.tick(start + ms(refresh * 1000 / 60), &mut surface).unwrap();
            drawn.extend(outcome.drawn);
        }
        assert_eq!(drawn, vec![0, 1, 0, 1, 0]);
        assert_eq!(player.session().unwrap().cursor().position(), 5);
    }

    #[test]
    fn clears_periodically_between_draws() {
        let mut player = inline_player(config(10.0, 3));
        let mut surface = RecordingSurface::new(400.0, 100.0);
        let start = Instant::now();
        player.select_str("walk").unwrap();

        for frame in 0..5u64 {
            player.tick(start + ms(frame * 100), &mut surface).unwrap();
        }

        let sequence: Vec<&str> = surface.calls[1..]
            .iter()
            .map(|call| match call {
                Call::Clear => "clear",
                Call::Draw { .. } => "draw",
            })
            .collect();
        assert_eq!(sequence, ["draw", "draw", "draw", "clear", "draw", "draw"]);
        assert_eq!(player.session().unwrap().frames_since_clear(), 2);
    }

    #[test]
    fn resize_recomputes_cached_rects() {
        let mut player = inline_player(config(10.0, 0));
        let mut surface = RecordingSurface::new(400.0, 100.0);
        let start = Instant::now();
        player.select_str("walk").unwrap();

        player.tick(start, &mut surface).unwrap();
        player.tick(start + ms(100), &mut surface).unwrap();
        assert_eq!(player.rect_cache().len(), 2);

        surface.size = Size::new(800.0, 200.0);
        // A skipped tick still notices the resize.
        player.tick(start + ms(110), &mut surface).unwrap();
        assert!(player.rect_cache().is_empty());

        player.tick(start + ms(200), &mut surface).unwrap();
        let draws = surface.draws();
        assert_eq!(
            draws[2],
            DestRect {
                x: 200.0,
                y: 0.0,
                width: 40.0,
                height: 20.0
            }
        );
        assert_eq!(player.rect_cache().ratio(), Some(2.0));
    }

    #[test]
    fn switching_mid_load_ignores_the_old_generation() {
        let idle = IdleDispatch::new();
        let loader = DatasetLoader::with_dispatcher(Arc::new(source()), Box::new(idle.clone()));
        let mut player = Player::new(loader, config(10.0, 0));

        player.select_str("walk").unwrap();
        player.select_str("run-2").unwrap();
        assert_eq!(idle.pending(), 5);
        idle.run_pending();

        let progress: Vec<LoadProgress> = player
            .pump()
            .into_iter()
            .filter_map(|event| match event {
                PlayerEvent::Progress(progress) => Some(progress),
                PlayerEvent::Ready { .. } => None,
            })
            .collect();

        assert_eq!(progress.first(), Some(&LoadProgress { loaded: 0, total: 3 }));
        assert!(progress.iter().all(|p| p.total == 3));
        assert_eq!(player.progress(), Some(LoadProgress { loaded: 3, total: 3 }));
        assert_eq!(player.session().unwrap().dataset(), "run");
        assert_eq!(player.state(), PlaybackState::Playing);
        // The superseded dataset never saw its frames.
        assert_eq!(player.loader().dataset("walk").unwrap().loaded_count(), 0);
    }

    #[test]
    fn reselecting_a_cached_dataset_is_immediate() {
        let mut player = inline_player(config(10.0, 0));
        player.select_str("walk").unwrap();
        player.pump();
        player.select_str("run-2").unwrap();
        player.pump();

        player.select_str("walk").unwrap();
        assert_eq!(player.state(), PlaybackState::Playing);
        assert_eq!(
            player.pump(),
            vec![
                PlayerEvent::Progress(LoadProgress { loaded: 2, total: 2 }),
                PlayerEvent::Ready {
                    dataset: "walk".to_string()
                },
            ]
        );
        assert_eq!(player.session().unwrap().cursor().position(), 0);
    }

    #[test]
    fn stretches_datasets_without_metadata() {
        let mut player = inline_player(config(10.0, 0));
        let mut surface = RecordingSurface::new(400.0, 100.0);
        player.select_str("run-2").unwrap();
        player.tick(Instant::now(), &mut surface).unwrap();

        assert_eq!(
            surface.draws(),
            vec![DestRect {
                x: 150.0,
                y: 0.0,
                width: 100.0,
                height: 100.0
            }]
        );
    }

    #[test]
    fn metadata_failure_leaves_player_idle() {
        let mut source = MemorySource::new();
        source.insert_metadata("bad", "[]");
        let loader = DatasetLoader::with_dispatcher(Arc::new(source), Box::new(InlineDispatch));
        let mut player = Player::new(loader, PlaybackConfig::default());

        let err = player.select_str("bad").unwrap_err();
        assert!(matches!(err, CutinError::AssetLoad { .. }));
        assert_eq!(player.state(), PlaybackState::Idle);
        assert!(player.session().is_none());
    }

    #[test]
    fn degenerate_surface_is_reported() {
        let mut player = inline_player(config(10.0, 0));
        let mut surface = RecordingSurface::new(0.0, 100.0);
        player.select_str("walk").unwrap();

        let err = player.tick(Instant::now(), &mut surface).unwrap_err();
        assert!(matches!(err, CutinError::DegenerateGeometry { .. }));
        assert!(surface.draws().is_empty());
    }

    #[test]
    fn failed_tick_does_not_use_up_the_frame_slot() {
        let mut player = inline_player(config(10.0, 0));
        let mut surface = RecordingSurface::new(0.0, 100.0);
        let start = Instant::now();
        player.select_str("walk").unwrap();

        assert!(player.tick(start, &mut surface).is_err());

        surface.size = Size::new(400.0, 100.0);
        let outcome = player.tick(start + ms(1), &mut surface).unwrap();
        assert_eq!(outcome.drawn, Some(0));
        assert_eq!(player.session().unwrap().cursor().position(), 1);
    }

    #[test]
    fn fps_changes_apply_on_the_next_tick() {
        let mut player = inline_player(config(10.0, 0));
        let mut surface = RecordingSurface::new(400.0, 100.0);
        let start = Instant::now();
        player.select_str("walk").unwrap();

        player.tick(start, &mut surface).unwrap();
        assert_eq!(player.tick(start + ms(50), &mut surface).unwrap().drawn, None);

        player.set_target_fps(20.0);
        assert_eq!(player.tick(start + ms(60), &mut surface).unwrap().drawn, Some(1));

        player.set_target_fps(10_000.0);
        assert_eq!(player.config().target_fps, crate::config::MAX_FPS);
    }
}
