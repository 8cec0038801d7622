use std::collections::BTreeMap;

use crate::view_model::{AppViewModel, ImageView, StatusView};
use crate::{FailureReason, FetchOutcome, ImageFrame};

pub type FlowId = u64;

/// What happens to flows still in flight when the trigger is pressed again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverlapPolicy {
    /// Cancel every in-flight flow before starting the new one. Late results
    /// from cancelled flows are dropped.
    #[default]
    Supersede,
    /// Flows run side by side; the display shows whichever finished last.
    Independent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Connecting,
    Downloading,
    Decoding,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct InFlight {
    url: String,
    stage: Stage,
    bytes: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Displayed {
    flow_id: FlowId,
    revision: u64,
    frame: ImageFrame,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LastOutcome {
    Loaded { width: u32, height: u32 },
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppState {
    url_input: String,
    policy: OverlapPolicy,
    last_flow_id: FlowId,
    latest_flow: Option<FlowId>,
    in_flight: BTreeMap<FlowId, InFlight>,
    display: Option<Displayed>,
    display_revision: u64,
    error: Option<String>,
    last_outcome: Option<LastOutcome>,
    dirty: bool,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: OverlapPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    pub fn policy(&self) -> OverlapPolicy {
        self.policy
    }

    /// True while the flow started by the most recent trigger has not finished.
    pub fn busy(&self) -> bool {
        self.latest_flow
            .is_some_and(|flow_id| self.in_flight.contains_key(&flow_id))
    }

    pub fn is_in_flight(&self, flow_id: FlowId) -> bool {
        self.in_flight.contains_key(&flow_id)
    }

    pub fn view(&self) -> AppViewModel {
        AppViewModel {
            url_input: self.url_input.clone(),
            busy: self.busy(),
            image: self.display.as_ref().map(|displayed| ImageView {
                flow_id: displayed.flow_id,
                revision: displayed.revision,
                frame: displayed.frame.clone(),
            }),
            error: self.error.clone(),
            status: self.status(),
            in_flight: self.in_flight.len(),
        }
    }

    /// Returns whether anything changed since the last call and clears the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    fn status(&self) -> StatusView {
        if let Some(flight) = self
            .latest_flow
            .and_then(|flow_id| self.in_flight.get(&flow_id))
        {
            return StatusView::Fetching {
                target: crate::describe_target(&flight.url),
                stage: flight.stage,
                bytes: flight.bytes,
            };
        }
        match self.last_outcome {
            Some(LastOutcome::Loaded { width, height }) => StatusView::Loaded { width, height },
            Some(LastOutcome::Failed) => StatusView::Failed,
            None => StatusView::Ready,
        }
    }

    pub(crate) fn set_input(&mut self, text: String) {
        if self.url_input != text {
            self.url_input = text;
            self.dirty = true;
        }
    }

    /// Removes every in-flight flow and returns their ids in ascending order.
    pub(crate) fn drain_in_flight(&mut self) -> Vec<FlowId> {
        let drained: Vec<FlowId> = std::mem::take(&mut self.in_flight).into_keys().collect();
        if !drained.is_empty() {
            self.dirty = true;
        }
        drained
    }

    /// Phase 1: capture the request and mark the new flow as the latest one.
    pub(crate) fn begin_flow(&mut self) -> (FlowId, String) {
        self.last_flow_id += 1;
        let flow_id = self.last_flow_id;
        let url = self.url_input.trim().to_string();
        self.in_flight.insert(
            flow_id,
            InFlight {
                url: url.clone(),
                stage: Stage::Connecting,
                bytes: None,
            },
        );
        self.latest_flow = Some(flow_id);
        self.error = None;
        self.dirty = true;
        (flow_id, url)
    }

    pub(crate) fn apply_progress(&mut self, flow_id: FlowId, stage: Stage, bytes: Option<u64>) {
        if let Some(flight) = self.in_flight.get_mut(&flow_id) {
            flight.stage = stage;
            if bytes.is_some() {
                flight.bytes = bytes;
            }
            self.dirty = true;
        }
    }

    /// Phase 3: hand the outcome to the display surface.
    ///
    /// Finishes for flows that are not in flight (already finished, or
    /// superseded) are dropped.
    pub(crate) fn apply_finished(&mut self, flow_id: FlowId, outcome: FetchOutcome) {
        let Some(flight) = self.in_flight.remove(&flow_id) else {
            return;
        };
        match outcome {
            FetchOutcome::Loaded(frame) => {
                self.display_revision += 1;
                self.last_outcome = Some(LastOutcome::Loaded {
                    width: frame.width(),
                    height: frame.height(),
                });
                self.display = Some(Displayed {
                    flow_id,
                    revision: self.display_revision,
                    frame,
                });
                self.error = None;
            }
            FetchOutcome::Failed(failure) if failure.reason == FailureReason::Cancelled => {}
            FetchOutcome::Failed(failure) => {
                self.error = Some(failure.user_message(&flight.url));
                self.last_outcome = Some(LastOutcome::Failed);
            }
        }
        self.dirty = true;
    }

    pub(crate) fn dismiss_error(&mut self) {
        if self.error.take().is_some() {
            self.dirty = true;
        }
    }
}
