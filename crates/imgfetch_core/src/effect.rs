#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    StartFetch { flow_id: crate::FlowId, url: String },
    CancelFetch { flow_id: crate::FlowId },
}
