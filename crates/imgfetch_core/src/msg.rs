#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// User edited the URL input field.
    InputChanged(String),
    /// User pressed Download (or Enter in the URL field).
    DownloadClicked,
    /// Engine progress for a flow.
    FetchProgress {
        flow_id: crate::FlowId,
        stage: crate::Stage,
        bytes: Option<u64>,
    },
    /// Engine reached a terminal state for a flow.
    FetchFinished {
        flow_id: crate::FlowId,
        outcome: crate::FetchOutcome,
    },
    /// User closed the error line.
    ErrorDismissed,
    /// Fallback for placeholder wiring.
    NoOp,
}
