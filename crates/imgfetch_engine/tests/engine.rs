mod support;

use std::sync::{mpsc, Arc, Once};
use std::time::{Duration, Instant};

use imgfetch_engine::{
    DecodeLimits, DecodedImage, EngineEvent, EngineHandle, EngineSettings, FailureKind, FetchError,
    FetchMetadata, FetchOutput, Fetcher, FlowId, ProgressSink,
};
use support::png_bytes;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(imgfetch_logging::initialize_for_tests);
}

fn wait_for_completion(
    rx: &mpsc::Receiver<EngineEvent>,
    flow_id: FlowId,
) -> Result<DecodedImage, FetchError> {
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match rx.recv_timeout(remaining).expect("engine event before deadline") {
            EngineEvent::FlowCompleted { flow_id: id, result } if id == flow_id => return result,
            _ => {}
        }
    }
}

fn completion_order(rx: &mpsc::Receiver<EngineEvent>, count: usize) -> Vec<FlowId> {
    let mut order = Vec::new();
    while order.len() < count {
        match rx
            .recv_timeout(Duration::from_secs(10))
            .expect("engine event before deadline")
        {
            EngineEvent::FlowCompleted { flow_id, result } => {
                assert!(result.is_ok(), "flow {flow_id} failed: {result:?}");
                order.push(flow_id);
            }
            EngineEvent::Progress(_) => {}
        }
    }
    order
}

/// Serves a fixed PNG after a per-URL delay.
struct DelayedFetcher {
    body: Vec<u8>,
}

#[async_trait::async_trait]
impl Fetcher for DelayedFetcher {
    async fn fetch(
        &self,
        _flow_id: FlowId,
        url: &str,
        _sink: &dyn ProgressSink,
    ) -> Result<FetchOutput, FetchError> {
        let delay = if url.contains("slow") { 400 } else { 20 };
        tokio::time::sleep(Duration::from_millis(delay)).await;
        Ok(FetchOutput {
            bytes: self.body.clone(),
            metadata: FetchMetadata {
                original_url: url.to_string(),
                final_url: url.to_string(),
                redirect_count: 0,
                content_type: Some("image/png".to_string()),
                byte_len: self.body.len() as u64,
            },
        })
    }
}

fn delayed_engine() -> (EngineHandle, mpsc::Receiver<EngineEvent>) {
    let fetcher = Arc::new(DelayedFetcher {
        body: png_bytes(1, 1, [0, 255, 0, 255]),
    });
    EngineHandle::with_fetcher(EngineSettings::default(), fetcher).expect("engine")
}

#[tokio::test(flavor = "multi_thread")]
async fn valid_png_is_fetched_and_decoded() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cat.png"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(png_bytes(4, 3, [1, 2, 3, 255]), "image/png"),
        )
        .mount(&server)
        .await;

    let (engine, events) = EngineHandle::spawn(EngineSettings::default()).expect("engine");
    engine.start(1, format!("{}/cat.png", server.uri()));

    let image = wait_for_completion(&events, 1).expect("decoded image");
    assert_eq!((image.width, image.height), (4, 3));
    assert_eq!(&image.rgba[..4], &[1, 2, 3, 255]);
    assert_eq!(engine.in_flight(), 0);
    engine.shutdown();
}

#[tokio::test(flavor = "multi_thread")]
async fn malformed_url_completes_with_invalid_url() {
    init_logging();
    let (engine, events) = EngineHandle::spawn(EngineSettings::default()).expect("engine");
    engine.start(1, "not a url");

    let err = wait_for_completion(&events, 1).unwrap_err();
    assert_eq!(err.kind, FailureKind::InvalidUrl);
    engine.shutdown();
}

#[tokio::test(flavor = "multi_thread")]
async fn non_image_payload_completes_with_decode_failure() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/fake.png"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw("definitely not pixels", "image/png"),
        )
        .mount(&server)
        .await;

    let (engine, events) = EngineHandle::spawn(EngineSettings::default()).expect("engine");
    engine.start(1, format!("{}/fake.png", server.uri()));

    let err = wait_for_completion(&events, 1).unwrap_err();
    assert_eq!(err.kind, FailureKind::Decode);
    engine.shutdown();
}

#[tokio::test(flavor = "multi_thread")]
async fn oversized_dimensions_complete_with_image_too_large() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/wide.png"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(png_bytes(64, 8, [0, 0, 0, 255]), "image/png"),
        )
        .mount(&server)
        .await;

    let settings = EngineSettings {
        decode: DecodeLimits {
            max_width: 32,
            max_height: 32,
            ..DecodeLimits::default()
        },
        ..EngineSettings::default()
    };
    let (engine, events) = EngineHandle::spawn(settings).expect("engine");
    engine.start(1, format!("{}/wide.png", server.uri()));

    let err = wait_for_completion(&events, 1).unwrap_err();
    assert_eq!(
        err.kind,
        FailureKind::ImageTooLarge {
            max_width: 32,
            max_height: 32
        }
    );
    engine.shutdown();
}

#[tokio::test(flavor = "multi_thread")]
async fn stalled_stream_is_bounded_by_flow_timeout() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/timeout"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_secs(5))
                .set_body_raw(png_bytes(1, 1, [0, 0, 0, 255]), "image/png"),
        )
        .mount(&server)
        .await;

    let settings = EngineSettings {
        flow_timeout: Duration::from_millis(200),
        ..EngineSettings::default()
    };
    let (engine, events) = EngineHandle::spawn(settings).expect("engine");
    let started = Instant::now();
    engine.start(1, format!("{}/timeout", server.uri()));

    let err = wait_for_completion(&events, 1).unwrap_err();
    assert_eq!(err.kind, FailureKind::Timeout);
    assert!(started.elapsed() < Duration::from_secs(4));
    engine.shutdown();
}

#[tokio::test(flavor = "multi_thread")]
async fn overlapping_flows_complete_independently() {
    init_logging();
    let (engine, events) = delayed_engine();
    engine.start(1, "https://example.test/slow.png");
    engine.start(2, "https://example.test/fast.png");

    // The later trigger finishes first; nothing orders completions across flows.
    assert_eq!(completion_order(&events, 2), vec![2, 1]);
    engine.shutdown();
}

#[tokio::test(flavor = "multi_thread")]
async fn cancelled_flow_reports_cancelled() {
    init_logging();
    let (engine, events) = delayed_engine();
    engine.start(1, "https://example.test/slow.png");
    engine.cancel(1);

    let err = wait_for_completion(&events, 1).unwrap_err();
    assert_eq!(err.kind, FailureKind::Cancelled);
    assert_eq!(engine.in_flight(), 0);
    engine.shutdown();
}

#[tokio::test(flavor = "multi_thread")]
async fn restarting_a_flow_id_cancels_the_earlier_run() {
    init_logging();
    let (engine, events) = delayed_engine();
    engine.start(1, "https://example.test/slow.png");
    engine.start(1, "https://example.test/fast.png");

    let first = wait_for_completion(&events, 1).unwrap_err();
    assert_eq!(first.kind, FailureKind::Cancelled);
    let second = wait_for_completion(&events, 1).expect("restarted flow succeeds");
    assert_eq!((second.width, second.height), (1, 1));
    assert_eq!(engine.in_flight(), 0);
    engine.shutdown();
}

#[tokio::test(flavor = "multi_thread")]
async fn shutdown_cancels_running_flows() {
    init_logging();
    let (engine, events) = delayed_engine();
    engine.start(1, "https://example.test/slow.png");
    engine.shutdown();

    let err = wait_for_completion(&events, 1).unwrap_err();
    assert_eq!(err.kind, FailureKind::Cancelled);
}
