use std::io;
use std::sync::mpsc;
use std::thread;

use imgfetch_core::{Effect, FailureReason, FetchFailure, FetchOutcome, ImageFrame, Msg, Stage};
use imgfetch_engine::{
    DecodedImage, EngineEvent, EngineHandle, EngineSettings, FailureKind, FetchError,
};
use imgfetch_logging::{imgfetch_debug, imgfetch_info};

/// Executes core effects on the engine and feeds engine events back as messages.
pub struct EffectRunner {
    engine: EngineHandle,
}

impl EffectRunner {
    /// `notify` is called after every forwarded message so the UI wakes up to drain it.
    pub fn new<F>(
        settings: EngineSettings,
        msg_tx: mpsc::Sender<Msg>,
        notify: F,
    ) -> io::Result<Self>
    where
        F: Fn() + Send + 'static,
    {
        let (engine, events) = EngineHandle::spawn(settings)?;
        spawn_event_loop(events, msg_tx, notify)?;
        Ok(Self { engine })
    }

    pub fn run(&self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::StartFetch { flow_id, url } => {
                    imgfetch_info!(
                        "StartFetch flow_id={} url_len={} url={}",
                        flow_id,
                        url.len(),
                        url
                    );
                    self.engine.start(flow_id, url);
                }
                Effect::CancelFetch { flow_id } => {
                    imgfetch_info!("CancelFetch flow_id={}", flow_id);
                    self.engine.cancel(flow_id);
                }
            }
        }
    }

    pub fn shutdown(&self) {
        imgfetch_debug!(
            "Shutting down engine with {} flow(s) in flight",
            self.engine.in_flight()
        );
        self.engine.shutdown();
    }
}

fn spawn_event_loop<F>(
    events: mpsc::Receiver<EngineEvent>,
    msg_tx: mpsc::Sender<Msg>,
    notify: F,
) -> io::Result<()>
where
    F: Fn() + Send + 'static,
{
    thread::Builder::new()
        .name("imgfetch-events".to_string())
        .spawn(move || {
            for event in events {
                let Some(msg) = map_event(event) else {
                    continue;
                };
                if msg_tx.send(msg).is_err() {
                    break;
                }
                notify();
            }
        })?;
    Ok(())
}

fn map_event(event: EngineEvent) -> Option<Msg> {
    match event {
        EngineEvent::Progress(progress) => Some(Msg::FetchProgress {
            flow_id: progress.flow_id,
            stage: map_stage(progress.stage)?,
            bytes: progress.bytes,
        }),
        EngineEvent::FlowCompleted { flow_id, result } => Some(Msg::FetchFinished {
            flow_id,
            outcome: map_result(result),
        }),
    }
}

fn map_stage(stage: imgfetch_engine::Stage) -> Option<Stage> {
    match stage {
        imgfetch_engine::Stage::Connecting => Some(Stage::Connecting),
        imgfetch_engine::Stage::Downloading => Some(Stage::Downloading),
        imgfetch_engine::Stage::Decoding => Some(Stage::Decoding),
        // Completion arrives as its own event.
        imgfetch_engine::Stage::Done => None,
    }
}

fn map_result(result: Result<DecodedImage, FetchError>) -> FetchOutcome {
    match result {
        Ok(image) => match ImageFrame::from_rgba(image.width, image.height, image.rgba) {
            Some(frame) => FetchOutcome::Loaded(frame),
            None => FetchOutcome::Failed(FetchFailure::new(
                FailureReason::NotAnImage,
                "decoder returned a buffer that does not match its dimensions",
            )),
        },
        Err(err) => FetchOutcome::Failed(FetchFailure::new(map_failure(&err.kind), err.message)),
    }
}

fn map_failure(kind: &FailureKind) -> FailureReason {
    match kind {
        FailureKind::InvalidUrl => FailureReason::InvalidUrl,
        FailureKind::HttpStatus(code) => FailureReason::HttpStatus(*code),
        FailureKind::Timeout => FailureReason::Timeout,
        FailureKind::TooLarge { .. } | FailureKind::ImageTooLarge { .. } => {
            FailureReason::TooLarge
        }
        FailureKind::UnsupportedContentType { .. } | FailureKind::Decode => {
            FailureReason::NotAnImage
        }
        FailureKind::Cancelled => FailureReason::Cancelled,
        FailureKind::RedirectLimitExceeded | FailureKind::Network => FailureReason::Network,
    }
}
