//! Runs file decoding and backend requests off the UI thread.

use crate::backend::{Backend, ProcessedImage};
use crate::error::Result;
use crate::loader::{self, LoadedImage};
use crate::submit::SubmissionPayload;
use crossbeam_channel::{Receiver, Sender};
use std::path::PathBuf;
use std::sync::Arc;

/// Finished background work, tagged with the session generation it was
/// started for.
pub enum Completion {
    Loaded {
        generation: u64,
        result: Result<LoadedImage>,
    },
    Processed {
        generation: u64,
        result: Result<ProcessedImage>,
    },
}

pub struct Dispatcher {
    backend: Arc<dyn Backend>,
    tx: Sender<Completion>,
    rx: Receiver<Completion>,
}

impl Dispatcher {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self { backend, tx, rx }
    }

    /// Read and decode `path`, keeping at most `max_side` pixels on the long
    /// side of the display copy.
    pub fn load(
        &self,
        generation: u64,
        path: PathBuf,
        max_side: u32,
        on_done: impl FnOnce() + Send + 'static,
    ) {
        self.spawn(on_done, move || Completion::Loaded {
            generation,
            result: loader::load(&path).map(|image| image.limit_pixels(max_side)),
        });
    }

    /// Start a request; `on_done` runs on the worker after the result is queued.
    pub fn dispatch(
        &self,
        generation: u64,
        payload: SubmissionPayload,
        on_done: impl FnOnce() + Send + 'static,
    ) {
        let backend = Arc::clone(&self.backend);
        self.spawn(on_done, move || {
            let result = backend.process(&payload);
            if let Err(e) = &result {
                log::warn!("Processing request failed: {e}");
            }
            Completion::Processed { generation, result }
        });
    }

    fn spawn(
        &self,
        on_done: impl FnOnce() + Send + 'static,
        work: impl FnOnce() -> Completion + Send + 'static,
    ) {
        let tx = self.tx.clone();
        std::thread::spawn(move || {
            if tx.send(work()).is_err() {
                log::debug!("Dropping completion, receiver is gone");
            }
            on_done();
        });
    }

    /// Next finished job, without blocking.
    pub fn try_recv(&self) -> Option<Completion> {
        self.rx.try_recv().ok()
    }

    #[cfg(test)]
    pub fn recv_timeout(&self, timeout: std::time::Duration) -> Option<Completion> {
        self.rx.recv_timeout(timeout).ok()
    }
}
