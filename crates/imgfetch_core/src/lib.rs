//! imgfetch core: pure state machine and view-model helpers.
mod effect;
mod frame;
mod msg;
mod state;
mod target;
mod update;
mod view_model;

pub use effect::Effect;
pub use frame::{FailureReason, FetchFailure, FetchOutcome, ImageFrame};
pub use msg::Msg;
pub use state::{AppState, FlowId, OverlapPolicy, Stage};
pub use target::describe_target;
pub use update::update;
pub use view_model::{AppViewModel, ImageView, StatusView};
