//! Dataset loading and caching.
//!
//! Metadata is read when a dataset is first requested and the dataset is
//! cached under its name right away. Frame decodes are handed to a
//! [`Dispatch`] backend and report back over a channel, tagged with the
//! generation of the selection that issued them. [`DatasetLoader::poll`]
//! drains that channel on the owning thread and drops anything from an older
//! generation.

use std::{
    collections::{HashMap, VecDeque},
    fmt,
    sync::{Arc, Mutex, PoisonError},
};

use crossbeam_channel::{Receiver, Sender};

use crate::{
    assets::{AssetSource, Dataset, DatasetMetadata, DatasetRequest, Frame},
    CutinError, Result,
};

/// Unit of work handed to a [`Dispatch`] backend.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Runs decode jobs somewhere other than the render loop.
pub trait Dispatch: Send {
    fn dispatch(&self, job: Job);
}

/// Decodes on the global rayon pool.
#[derive(Debug, Default, Clone, Copy)]
pub struct RayonDispatch;

impl Dispatch for RayonDispatch {
    fn dispatch(&self, job: Job) {
        rayon::spawn(job);
    }
}

/// Decodes immediately on the calling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineDispatch;

impl Dispatch for InlineDispatch {
    fn dispatch(&self, job: Job) {
        job();
    }
}

/// Queues jobs until the host calls [`IdleDispatch::run_pending`], e.g. from
/// an idle callback between refreshes. Clones share one queue.
#[derive(Clone, Default)]
pub struct IdleDispatch {
    queue: Arc<Mutex<VecDeque<Job>>>,
}

impl IdleDispatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> usize {
        self.lock().len()
    }

    /// Runs the oldest queued job. Returns `false` when the queue was empty.
    pub fn run_next(&self) -> bool {
        // The lock is released before the job runs.
        let job = self.lock().pop_front();
        match job {
            Some(job) => {
                job();
                true
            }
            None => false,
        }
    }

    /// Runs every queued job and returns how many ran.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        while self.run_next() {
            ran += 1;
        }
        ran
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<Job>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Dispatch for IdleDispatch {
    fn dispatch(&self, job: Job) {
        self.lock().push_back(job);
    }
}

impl fmt::Debug for IdleDispatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdleDispatch")
            .field("pending", &self.pending())
            .finish()
    }
}

/// Result of one frame decode, as reported by a dispatched job.
#[derive(Debug)]
pub struct FrameCompletion {
    pub generation: u64,
    pub dataset: String,
    pub index: usize,
    pub result: Result<Frame>,
}

/// Progress snapshot returned when a load begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    pub loaded: usize,
    pub total: usize,
}

impl LoadTicket {
    pub fn is_ready(&self) -> bool {
        self.loaded == self.total
    }
}

/// Completions drained by one [`DatasetLoader::poll`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadUpdate {
    /// Frame indices completed for the live generation, in arrival order.
    pub accepted: Vec<usize>,
    /// Completions dropped because their generation was superseded.
    pub stale: usize,
}

/// Owns the per-name dataset cache and the decode pipeline.
pub struct DatasetLoader {
    source: Arc<dyn AssetSource>,
    dispatcher: Box<dyn Dispatch>,
    cache: HashMap<String, Dataset>,
    tx: Sender<FrameCompletion>,
    rx: Receiver<FrameCompletion>,
}

impl DatasetLoader {
    /// Creates a loader decoding on the rayon pool.
    pub fn new(source: Arc<dyn AssetSource>) -> Self {
        Self::with_dispatcher(source, Box::new(RayonDispatch))
    }

    pub fn with_dispatcher(source: Arc<dyn AssetSource>, dispatcher: Box<dyn Dispatch>) -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self {
            source,
            dispatcher,
            cache: HashMap::new(),
            tx,
            rx,
        }
    }

    pub fn dataset(&self, name: &str) -> Option<&Dataset> {
        self.cache.get(name)
    }

    /// Whether `name` is cached with every frame present.
    pub fn is_cached(&self, name: &str) -> bool {
        self.cache.get(name).is_some_and(Dataset::is_complete)
    }

    /// Starts (or resumes) loading `request` under `generation`.
    ///
    /// A fully cached dataset returns a ready ticket without touching the
    /// source. Otherwise metadata is fetched on first use, the dataset is
    /// cached, and one decode job is dispatched per missing frame.
    ///
    /// A dataset sized by its selector is fetched again when a later
    /// selector asks for a different frame count. Metadata counts always win.
    pub fn begin(&mut self, request: &DatasetRequest, generation: u64) -> Result<LoadTicket> {
        self.evict_if_resized(request);

        if !self.cache.contains_key(&request.name) {
            let dataset = self.fetch(request)?;
            tracing::debug!(
                dataset = %request.name,
                frames = dataset.frame_count(),
                "cached dataset metadata"
            );
            self.cache.insert(request.name.clone(), dataset);
        }

        let (total, missing) = match self.cache.get(&request.name) {
            Some(dataset) => (dataset.frame_count(), dataset.missing_indices()),
            None => return Err(CutinError::asset_load(&request.name, "dataset vanished")),
        };
        for &index in &missing {
            self.dispatch_frame(&request.name, index, generation);
        }

        Ok(LoadTicket {
            loaded: total - missing.len(),
            total,
        })
    }

    /// Drains finished decodes without blocking.
    ///
    /// Completions for `generation` are stored in the cache; a failed decode
    /// stores a transparent placeholder. Anything else is dropped.
    pub fn poll(&mut self, generation: u64) -> LoadUpdate {
        let mut update = LoadUpdate::default();

        for completion in self.rx.try_iter() {
            if completion.generation != generation {
                tracing::trace!(
                    dataset = %completion.dataset,
                    index = completion.index,
                    generation = completion.generation,
                    live = generation,
                    "dropping stale frame completion"
                );
                update.stale += 1;
                continue;
            }

            let frame = match completion.result {
                Ok(frame) => frame,
                Err(err) => {
                    tracing::warn!(
                        dataset = %completion.dataset,
                        index = completion.index,
                        error = %err,
                        "frame failed to decode, using placeholder"
                    );
                    Frame::placeholder()
                }
            };
            if let Some(dataset) = self.cache.get_mut(&completion.dataset) {
                dataset.fill(completion.index, frame);
            }
            update.accepted.push(completion.index);
        }

        update
    }

    fn evict_if_resized(&mut self, request: &DatasetRequest) {
        let (Some(cached), Some(requested)) = (self.cache.get(&request.name), request.frame_count)
        else {
            return;
        };
        if requested == cached.frame_count() {
            return;
        }

        if cached.has_metadata() {
            tracing::warn!(
                dataset = %request.name,
                requested,
                metadata = cached.frame_count(),
                "selector frame count disagrees with metadata, using metadata"
            );
        } else {
            tracing::info!(
                dataset = %request.name,
                requested,
                cached = cached.frame_count(),
                "selector frame count changed, reloading dataset"
            );
            self.cache.remove(&request.name);
        }
    }

    fn fetch(&self, request: &DatasetRequest) -> Result<Dataset> {
        let bytes = self.source.metadata(&request.name).map_err(|err| match err {
            CutinError::AssetLoad { .. } => err,
            other => CutinError::asset_load(&request.name, other),
        })?;
        let metadata = bytes
            .map(|bytes| DatasetMetadata::from_slice(&request.name, &bytes))
            .transpose()?;
        Dataset::new(request, metadata.as_ref())
    }

    fn dispatch_frame(&self, dataset: &str, index: usize, generation: u64) {
        let source = Arc::clone(&self.source);
        let tx = self.tx.clone();
        let dataset = dataset.to_string();

        self.dispatcher.dispatch(Box::new(move || {
            let result = source
                .frame(&dataset, index)
                .and_then(|bytes| Frame::decode(&bytes))
                .map_err(|err| CutinError::FrameDecode {
                    index,
                    reason: err.to_string(),
                });
            // Fails only once the loader itself is gone.
            let _ = tx.send(FrameCompletion {
                generation,
                dataset,
                index,
                result,
            });
        }));
    }
}

impl fmt::Debug for DatasetLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatasetLoader")
            .field("cached", &self.cache.keys().collect::<Vec<_>>())
            .field("in_flight", &self.rx.len())
            .finish()
    }
}
