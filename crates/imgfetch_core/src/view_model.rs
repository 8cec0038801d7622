use crate::{FlowId, ImageFrame, Stage};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppViewModel {
    pub url_input: String,
    pub busy: bool,
    pub image: Option<ImageView>,
    pub error: Option<String>,
    pub status: StatusView,
    pub in_flight: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageView {
    pub flow_id: FlowId,
    /// Bumped every time a frame is assigned to the display surface.
    pub revision: u64,
    pub frame: ImageFrame,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StatusView {
    #[default]
    Ready,
    Fetching {
        target: String,
        stage: Stage,
        bytes: Option<u64>,
    },
    Loaded {
        width: u32,
        height: u32,
    },
    Failed,
}
