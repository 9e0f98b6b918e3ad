// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! In-crate test doubles for unit tests.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::backend::{BufferSource, Presenter, SourceFactory, SourceSpec};
use crate::buffer::{ImageHandle, SourceImage};
use crate::compositor::RegionChanges;
use crate::frame::Frame;
use crate::time::Timestamp;

#[derive(Default)]
struct SourceState {
    queued: Vec<SourceImage>,
    stamps: HashMap<ImageHandle, Timestamp>,
    reclaimed: Vec<ImageHandle>,
    next_image: u64,
    closed: bool,
}

/// A source fed by hand whose reclaims can be inspected afterwards.
#[derive(Clone, Default)]
pub(crate) struct ScriptedSource {
    state: Arc<Mutex<SourceState>>,
}

impl ScriptedSource {
    pub(crate) fn push(&self, timestamp: Timestamp) {
        let mut state = self.state.lock();
        let image = ImageHandle(state.next_image);
        state.next_image += 1;
        state.stamps.insert(image, timestamp);
        state.queued.push(SourceImage { image, timestamp });
    }

    pub(crate) fn reclaimed_count(&self) -> usize {
        self.state.lock().reclaimed.len()
    }

    pub(crate) fn reclaimed_timestamps(&self) -> Vec<Timestamp> {
        let state = self.state.lock();
        state.reclaimed.iter().map(|i| state.stamps[i]).collect()
    }

    pub(crate) fn double_reclaims(&self) -> Vec<ImageHandle> {
        let state = self.state.lock();
        let mut seen = HashMap::new();
        for image in &state.reclaimed {
            *seen.entry(*image).or_insert(0_u32) += 1;
        }
        seen.into_iter()
            .filter(|&(_, n)| n > 1)
            .map(|(image, _)| image)
            .collect()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

impl BufferSource for ScriptedSource {
    fn acquire_next_buffer(&mut self) -> Option<SourceImage> {
        let mut state = self.state.lock();
        if state.queued.is_empty() {
            None
        } else {
            Some(state.queued.remove(0))
        }
    }

    fn reclaim(&mut self, image: ImageHandle) {
        self.state.lock().reclaimed.push(image);
    }

    fn close(&mut self) {
        self.state.lock().closed = true;
    }
}

/// Hands out [`ScriptedSource`]s and remembers them by surface.
#[derive(Clone, Default)]
pub(crate) struct ScriptedFactory {
    sources: Arc<Mutex<Vec<(SourceSpec, ScriptedSource)>>>,
}

impl ScriptedFactory {
    pub(crate) fn last(&self) -> (SourceSpec, ScriptedSource) {
        let sources = self.sources.lock();
        let (spec, source) = sources.last().expect("no source allocated");
        (*spec, source.clone())
    }

    pub(crate) fn created(&self) -> usize {
        self.sources.lock().len()
    }
}

impl SourceFactory for ScriptedFactory {
    fn create(&self, spec: &SourceSpec) -> Box<dyn BufferSource> {
        let source = ScriptedSource::default();
        self.sources.lock().push((*spec, source.clone()));
        Box::new(source)
    }
}

/// Records the timestamps and changes of presented frames.
#[derive(Clone, Default)]
pub(crate) struct LogPresenter {
    pub(crate) log: Arc<Mutex<Vec<(Timestamp, RegionChanges)>>>,
}

impl LogPresenter {
    pub(crate) fn presented(&self) -> Vec<Timestamp> {
        self.log.lock().iter().map(|(ts, _)| *ts).collect()
    }
}

impl Presenter for LogPresenter {
    fn apply(&mut self, frame: &Frame, changes: &RegionChanges) {
        self.log.lock().push((frame.start(), changes.clone()));
    }
}
