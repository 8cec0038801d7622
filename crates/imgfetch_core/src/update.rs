use crate::{AppState, Effect, Msg, OverlapPolicy};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: AppState, msg: Msg) -> (AppState, Vec<Effect>) {
    let effects = match msg {
        Msg::InputChanged(text) => {
            state.set_input(text);
            Vec::new()
        }
        Msg::DownloadClicked => {
            let mut effects = Vec::new();
            if state.policy() == OverlapPolicy::Supersede {
                effects.extend(
                    state
                        .drain_in_flight()
                        .into_iter()
                        .map(|flow_id| Effect::CancelFetch { flow_id }),
                );
            }
            let (flow_id, url) = state.begin_flow();
            effects.push(Effect::StartFetch { flow_id, url });
            effects
        }
        Msg::FetchProgress {
            flow_id,
            stage,
            bytes,
        } => {
            state.apply_progress(flow_id, stage, bytes);
            Vec::new()
        }
        Msg::FetchFinished { flow_id, outcome } => {
            state.apply_finished(flow_id, outcome);
            Vec::new()
        }
        Msg::ErrorDismissed => {
            state.dismiss_error();
            Vec::new()
        }
        Msg::NoOp => Vec::new(),
    };

    (state, effects)
}
