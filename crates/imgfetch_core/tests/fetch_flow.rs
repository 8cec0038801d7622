use std::sync::Once;

use imgfetch_core::{
    update, AppState, Effect, FailureReason, FetchFailure, FetchOutcome, ImageFrame, Msg, Stage,
    StatusView,
};
use pretty_assertions::assert_eq;

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(imgfetch_logging::initialize_for_tests);
}

fn press_download(state: AppState, url: &str) -> (AppState, Vec<Effect>) {
    let (state, _) = update(state, Msg::InputChanged(url.to_string()));
    update(state, Msg::DownloadClicked)
}

fn red_square() -> ImageFrame {
    ImageFrame::from_rgba(2, 2, [255, 0, 0, 255].repeat(4)).unwrap()
}

fn finish(state: AppState, flow_id: u64, outcome: FetchOutcome) -> AppState {
    let (state, effects) = update(state, Msg::FetchFinished { flow_id, outcome });
    assert!(effects.is_empty());
    state
}

#[test]
fn download_shows_busy_and_emits_start() {
    init_logging();
    let (state, effects) = press_download(AppState::new(), "  https://example.test/cat.png \n");

    assert_eq!(
        effects,
        vec![Effect::StartFetch {
            flow_id: 1,
            url: "https://example.test/cat.png".to_string(),
        }]
    );
    let view = state.view();
    assert!(view.busy);
    assert_eq!(view.in_flight, 1);
    assert_eq!(
        view.status,
        StatusView::Fetching {
            target: "cat.png from example.test".to_string(),
            stage: Stage::Connecting,
            bytes: None,
        }
    );
}

#[test]
fn valid_image_is_displayed_and_busy_cleared() {
    init_logging();
    let (state, _) = press_download(AppState::new(), "https://example.test/cat.png");
    let state = finish(state, 1, FetchOutcome::Loaded(red_square()));

    let view = state.view();
    assert!(!view.busy);
    assert_eq!(view.error, None);
    let image = view.image.expect("image displayed");
    assert_eq!(image.flow_id, 1);
    assert_eq!(image.frame, red_square());
    assert_eq!(view.status, StatusView::Loaded { width: 2, height: 2 });
}

#[test]
fn invalid_url_clears_busy_and_shows_error() {
    init_logging();
    let (state, effects) = press_download(AppState::new(), "not a url");
    assert_eq!(
        effects,
        vec![Effect::StartFetch {
            flow_id: 1,
            url: "not a url".to_string(),
        }]
    );

    let state = finish(
        state,
        1,
        FetchOutcome::Failed(FetchFailure::new(
            FailureReason::InvalidUrl,
            "relative URL without a base",
        )),
    );

    // The unhardened behaviour left the busy indicator up forever with no message.
    let view = state.view();
    assert!(!view.busy);
    assert_eq!(
        view.error.as_deref(),
        Some("\"not a url\" is not a valid URL")
    );
    assert_eq!(view.status, StatusView::Failed);
    assert!(view.image.is_none());
}

#[test]
fn timeout_clears_busy_and_keeps_previous_image() {
    init_logging();
    let (state, _) = press_download(AppState::new(), "https://example.test/cat.png");
    let state = finish(state, 1, FetchOutcome::Loaded(red_square()));

    let (state, _) = press_download(state, "https://example.test/timeout");
    assert!(state.busy());
    let state = finish(
        state,
        2,
        FetchOutcome::Failed(FetchFailure::new(FailureReason::Timeout, "flow timed out")),
    );

    let view = state.view();
    assert!(!view.busy);
    assert_eq!(view.error.as_deref(), Some("Timed out waiting for the image"));
    assert_eq!(view.image.map(|image| image.flow_id), Some(1));
}

#[test]
fn busy_spans_whole_flow_interval() {
    init_logging();
    let state = AppState::new();
    assert!(!state.busy());

    let (state, _) = press_download(state, "https://example.test/cat.png");
    assert!(state.busy());

    let (state, _) = update(
        state,
        Msg::FetchProgress {
            flow_id: 1,
            stage: Stage::Downloading,
            bytes: Some(512),
        },
    );
    assert!(state.busy());
    assert_eq!(
        state.view().status,
        StatusView::Fetching {
            target: "cat.png from example.test".to_string(),
            stage: Stage::Downloading,
            bytes: Some(512),
        }
    );

    let (state, _) = update(
        state,
        Msg::FetchProgress {
            flow_id: 1,
            stage: Stage::Decoding,
            bytes: None,
        },
    );
    assert!(state.busy());
    assert_eq!(
        state.view().status,
        StatusView::Fetching {
            target: "cat.png from example.test".to_string(),
            stage: Stage::Decoding,
            bytes: Some(512),
        }
    );

    let state = finish(state, 1, FetchOutcome::Loaded(red_square()));
    assert!(!state.busy());
}

#[test]
fn repeated_download_gives_identical_display() {
    init_logging();
    let (state, _) = press_download(AppState::new(), "https://example.test/cat.png");
    let state = finish(state, 1, FetchOutcome::Loaded(red_square()));
    let first = state.view().image.unwrap();

    let (state, effects) = update(state, Msg::DownloadClicked);
    assert_eq!(
        effects,
        vec![Effect::StartFetch {
            flow_id: 2,
            url: "https://example.test/cat.png".to_string(),
        }]
    );
    let state = finish(state, 2, FetchOutcome::Loaded(red_square()));
    let second = state.view().image.unwrap();

    assert_eq!(first.frame, second.frame);
    assert!(second.revision > first.revision);
}

#[test]
fn new_download_clears_previous_error() {
    init_logging();
    let (state, _) = press_download(AppState::new(), "https://example.test/missing.png");
    let state = finish(
        state,
        1,
        FetchOutcome::Failed(FetchFailure::new(FailureReason::HttpStatus(404), "404")),
    );
    assert_eq!(
        state.view().error.as_deref(),
        Some("Server answered with HTTP 404")
    );

    let (state, _) = update(state, Msg::DownloadClicked);
    assert_eq!(state.view().error, None);
}

#[test]
fn error_can_be_dismissed() {
    init_logging();
    let (state, _) = press_download(AppState::new(), "https://example.test/page.html");
    let state = finish(
        state,
        1,
        FetchOutcome::Failed(FetchFailure::new(FailureReason::NotAnImage, "text/html")),
    );
    let (mut state, effects) = update(state, Msg::ErrorDismissed);

    assert!(effects.is_empty());
    assert_eq!(state.view().error, None);
    assert!(state.consume_dirty());

    let (mut state, _) = update(state, Msg::ErrorDismissed);
    assert!(!state.consume_dirty());
}

#[test]
fn duplicate_finish_is_ignored() {
    init_logging();
    let (state, _) = press_download(AppState::new(), "https://example.test/cat.png");
    let state = finish(state, 1, FetchOutcome::Loaded(red_square()));
    let before = state.view();

    let state = finish(
        state,
        1,
        FetchOutcome::Failed(FetchFailure::new(FailureReason::Network, "late")),
    );
    assert_eq!(state.view().error, before.error);
    assert_eq!(state.view().image, before.image);
}
