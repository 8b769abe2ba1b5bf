//! Notifications from the pipeline to the presentation layer
//!
//! All notifications are one-way. Across threads they travel through an
//! unbounded `mpsc` channel so the worker never blocks on a slow renderer;
//! the receiving [`EventPump`] coalesces runs of progress updates so only the
//! latest value is rendered.

use std::sync::mpsc::{Receiver, Sender};

use super::Failure;
use crate::config::ResourceDescriptor;

/// Receiver of pipeline notifications
pub trait PipelineObserver {
    fn report_progress(&mut self, fraction: f64);

    fn report_message(&mut self, text: &str);

    fn report_title(&mut self, text: &str);

    fn on_stage_failed(&mut self, failure: &Failure);

    fn on_update_available(&mut self, can_skip: bool, stale: &[ResourceDescriptor]);
}

/// A notification in transit
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    Progress(f64),
    Message(String),
    Title(String),
    StageFailed(Failure),
    UpdateAvailable {
        can_skip: bool,
        stale: Vec<ResourceDescriptor>,
    },
}

impl PipelineEvent {
    /// Deliver this event to an observer
    pub fn dispatch(&self, observer: &mut dyn PipelineObserver) {
        match self {
            PipelineEvent::Progress(fraction) => observer.report_progress(*fraction),
            PipelineEvent::Message(text) => observer.report_message(text),
            PipelineEvent::Title(text) => observer.report_title(text),
            PipelineEvent::StageFailed(failure) => observer.on_stage_failed(failure),
            PipelineEvent::UpdateAvailable { can_skip, stale } => {
                observer.on_update_available(*can_skip, stale);
            }
        }
    }
}

/// Observer that forwards every notification over a channel
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: Sender<PipelineEvent>,
}

impl ChannelObserver {
    pub fn new(tx: Sender<PipelineEvent>) -> Self {
        Self { tx }
    }

    fn send(&self, event: PipelineEvent) {
        // A gone receiver means nobody renders anymore; the run continues regardless
        if self.tx.send(event).is_err() {
            tracing::trace!("Pipeline event dropped, receiver is gone");
        }
    }
}

impl PipelineObserver for ChannelObserver {
    fn report_progress(&mut self, fraction: f64) {
        self.send(PipelineEvent::Progress(fraction));
    }

    fn report_message(&mut self, text: &str) {
        self.send(PipelineEvent::Message(text.to_string()));
    }

    fn report_title(&mut self, text: &str) {
        self.send(PipelineEvent::Title(text.to_string()));
    }

    fn on_stage_failed(&mut self, failure: &Failure) {
        self.send(PipelineEvent::StageFailed(failure.clone()));
    }

    fn on_update_available(&mut self, can_skip: bool, stale: &[ResourceDescriptor]) {
        self.send(PipelineEvent::UpdateAvailable {
            can_skip,
            stale: stale.to_vec(),
        });
    }
}

/// Receiving end of a [`ChannelObserver`]
#[derive(Debug)]
pub struct EventPump {
    rx: Receiver<PipelineEvent>,
}

impl EventPump {
    pub fn new(rx: Receiver<PipelineEvent>) -> Self {
        Self { rx }
    }

    /// Block for the next event, then take everything already queued
    ///
    /// Returns `None` once every sender is gone and the queue is drained.
    pub fn next_batch(&self) -> Option<Vec<PipelineEvent>> {
        let first = self.rx.recv().ok()?;
        let mut batch = vec![first];
        batch.extend(self.rx.try_iter());
        Some(coalesce(batch))
    }
}

/// Collapse consecutive progress events into the last one
pub fn coalesce(events: Vec<PipelineEvent>) -> Vec<PipelineEvent> {
    let mut out: Vec<PipelineEvent> = Vec::with_capacity(events.len());
    for event in events {
        if let PipelineEvent::Progress(value) = event {
            if let Some(PipelineEvent::Progress(last)) = out.last_mut() {
                *last = value;
                continue;
            }
        }
        out.push(event);
    }
    out
}

/// Observer that records every notification, in order
#[derive(Debug, Default, Clone)]
pub struct CollectingObserver {
    pub events: Vec<PipelineEvent>,
}

impl CollectingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Progress values, in order
    pub fn progress(&self) -> Vec<f64> {
        self.events
            .iter()
            .filter_map(|e| match e {
                PipelineEvent::Progress(p) => Some(*p),
                _ => None,
            })
            .collect()
    }

    /// Titles, in order
    pub fn titles(&self) -> Vec<String> {
        self.events
            .iter()
            .filter_map(|e| match e {
                PipelineEvent::Title(t) => Some(t.clone()),
                _ => None,
            })
            .collect()
    }

    /// Messages, in order
    pub fn messages(&self) -> Vec<String> {
        self.events
            .iter()
            .filter_map(|e| match e {
                PipelineEvent::Message(m) => Some(m.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn failures(&self) -> Vec<Failure> {
        self.events
            .iter()
            .filter_map(|e| match e {
                PipelineEvent::StageFailed(f) => Some(f.clone()),
                _ => None,
            })
            .collect()
    }
}

impl PipelineObserver for CollectingObserver {
    fn report_progress(&mut self, fraction: f64) {
        self.events.push(PipelineEvent::Progress(fraction));
    }

    fn report_message(&mut self, text: &str) {
        self.events.push(PipelineEvent::Message(text.to_string()));
    }

    fn report_title(&mut self, text: &str) {
        self.events.push(PipelineEvent::Title(text.to_string()));
    }

    fn on_stage_failed(&mut self, failure: &Failure) {
        self.events.push(PipelineEvent::StageFailed(failure.clone()));
    }

    fn on_update_available(&mut self, can_skip: bool, stale: &[ResourceDescriptor]) {
        self.events.push(PipelineEvent::UpdateAvailable {
            can_skip,
            stale: stale.to_vec(),
        });
    }
}
