use std::collections::HashMap;
use std::io;
use std::sync::{mpsc, Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use futures_util::future::join_all;
use imgfetch_logging::{imgfetch_debug, imgfetch_info, imgfetch_warn};
use tokio::runtime::Runtime;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::decode::{decode_image, DecodeError, DecodeLimits};
use crate::fetch::{ChannelProgressSink, FetchSettings, Fetcher, ProgressSink, ReqwestFetcher};
use crate::{DecodedImage, EngineEvent, FailureKind, FetchError, FlowId, FlowProgress, Stage};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub fetch: FetchSettings,
    pub decode: DecodeLimits,
    /// Bound on a whole flow, fetch and decode together.
    pub flow_timeout: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            fetch: FetchSettings::default(),
            decode: DecodeLimits::default(),
            flow_timeout: Duration::from_secs(60),
        }
    }
}

enum EngineCommand {
    Start { flow_id: FlowId, url: String },
    Cancel { flow_id: FlowId },
    Shutdown,
}

/// Cloneable handle to the background runtime that executes flows.
#[derive(Clone)]
pub struct EngineHandle {
    cmd_tx: mpsc::Sender<EngineCommand>,
    registry: FlowRegistry,
}

impl EngineHandle {
    /// Starts the engine thread with the reqwest-backed fetcher.
    pub fn spawn(settings: EngineSettings) -> io::Result<(Self, mpsc::Receiver<EngineEvent>)> {
        let fetcher = Arc::new(ReqwestFetcher::new(settings.fetch.clone()));
        Self::with_fetcher(settings, fetcher)
    }

    pub fn with_fetcher(
        settings: EngineSettings,
        fetcher: Arc<dyn Fetcher>,
    ) -> io::Result<(Self, mpsc::Receiver<EngineEvent>)> {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let registry = FlowRegistry::default();
        let runtime = Runtime::new()?;
        let context = Arc::new(FlowContext {
            fetcher,
            decode: settings.decode,
            flow_timeout: settings.flow_timeout,
            registry: registry.clone(),
            event_tx,
        });

        thread::Builder::new()
            .name("imgfetch-engine".to_string())
            .spawn(move || {
                let mut tasks: Vec<JoinHandle<()>> = Vec::new();
                while let Ok(command) = cmd_rx.recv() {
                    match command {
                        EngineCommand::Start { flow_id, url } => {
                            tasks.retain(|task| !task.is_finished());
                            let ticket = context.registry.register(flow_id);
                            let flow = run_flow(context.clone(), flow_id, url, ticket);
                            tasks.push(runtime.spawn(flow));
                        }
                        EngineCommand::Cancel { flow_id } => {
                            if context.registry.cancel(flow_id) {
                                imgfetch_info!("Flow {} cancel requested", flow_id);
                            }
                        }
                        EngineCommand::Shutdown => break,
                    }
                }
                // Let cancelled flows report before the runtime drops them.
                context.registry.cancel_all();
                runtime.block_on(async {
                    let _ = tokio::time::timeout(SHUTDOWN_GRACE, join_all(tasks)).await;
                });
                runtime.shutdown_timeout(SHUTDOWN_GRACE);
                imgfetch_debug!("Engine thread stopped");
            })?;

        Ok((Self { cmd_tx, registry }, event_rx))
    }

    pub fn start(&self, flow_id: FlowId, url: impl Into<String>) {
        let _ = self.cmd_tx.send(EngineCommand::Start {
            flow_id,
            url: url.into(),
        });
    }

    pub fn cancel(&self, flow_id: FlowId) {
        let _ = self.cmd_tx.send(EngineCommand::Cancel { flow_id });
    }

    /// Number of flows registered and not yet completed.
    pub fn in_flight(&self) -> usize {
        self.registry.len()
    }

    /// Cancels every flow and stops the runtime. Later commands are ignored.
    pub fn shutdown(&self) {
        let _ = self.cmd_tx.send(EngineCommand::Shutdown);
    }
}

struct FlowContext {
    fetcher: Arc<dyn Fetcher>,
    decode: DecodeLimits,
    flow_timeout: Duration,
    registry: FlowRegistry,
    event_tx: mpsc::Sender<EngineEvent>,
}

#[derive(Default)]
struct RegistryInner {
    next_generation: u64,
    flows: HashMap<FlowId, (u64, CancellationToken)>,
}

/// Cancellation tokens of running flows, keyed by flow id.
#[derive(Clone, Default)]
struct FlowRegistry {
    inner: Arc<Mutex<RegistryInner>>,
}

impl FlowRegistry {
    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a flow; a flow already registered under the same id is cancelled.
    fn register(&self, flow_id: FlowId) -> FlowTicket {
        let mut inner = self.lock();
        inner.next_generation += 1;
        let generation = inner.next_generation;
        let token = CancellationToken::new();
        if let Some((_, previous)) = inner.flows.insert(flow_id, (generation, token.clone())) {
            imgfetch_warn!("Flow {} restarted; cancelling previous run", flow_id);
            previous.cancel();
        }
        FlowTicket { generation, token }
    }

    fn cancel(&self, flow_id: FlowId) -> bool {
        match self.lock().flows.remove(&flow_id) {
            Some((_, token)) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    fn cancel_all(&self) {
        for (_, (_, token)) in self.lock().flows.drain() {
            token.cancel();
        }
    }

    fn finish(&self, flow_id: FlowId, generation: u64) {
        let mut inner = self.lock();
        if inner
            .flows
            .get(&flow_id)
            .is_some_and(|(current, _)| *current == generation)
        {
            inner.flows.remove(&flow_id);
        }
    }

    fn len(&self) -> usize {
        self.lock().flows.len()
    }
}

struct FlowTicket {
    generation: u64,
    token: CancellationToken,
}

async fn run_flow(context: Arc<FlowContext>, flow_id: FlowId, url: String, ticket: FlowTicket) {
    imgfetch_info!("Flow {} started url_len={} url={}", flow_id, url.len(), url);
    let sink = ChannelProgressSink::new(context.event_tx.clone());
    let bounded = tokio::time::timeout(
        context.flow_timeout,
        fetch_and_decode(&context, flow_id, &url, &sink),
    );

    let result = match ticket.token.run_until_cancelled(bounded).await {
        Some(Ok(result)) => result,
        Some(Err(_elapsed)) => Err(FetchError::new(
            FailureKind::Timeout,
            format!("flow exceeded {:?}", context.flow_timeout),
        )),
        None => Err(FetchError::new(FailureKind::Cancelled, "flow cancelled")),
    };
    context.registry.finish(flow_id, ticket.generation);

    match &result {
        Ok(image) => {
            imgfetch_info!(
                "Flow {} done: {}x{} {}",
                flow_id,
                image.width,
                image.height,
                image.format
            );
            sink.emit(EngineEvent::Progress(FlowProgress {
                flow_id,
                stage: Stage::Done,
                bytes: None,
            }));
        }
        Err(err) if err.kind == FailureKind::Cancelled => {
            imgfetch_info!("Flow {} cancelled", flow_id);
        }
        Err(err) => imgfetch_warn!("Flow {} failed: {}", flow_id, err),
    }

    let _ = context
        .event_tx
        .send(EngineEvent::FlowCompleted { flow_id, result });
}

async fn fetch_and_decode(
    context: &FlowContext,
    flow_id: FlowId,
    url: &str,
    sink: &dyn ProgressSink,
) -> Result<DecodedImage, FetchError> {
    let output = context.fetcher.fetch(flow_id, url, sink).await?;
    let metadata = &output.metadata;
    imgfetch_info!(
        "Flow {} downloaded {} bytes content_type={} final_url={}",
        flow_id,
        metadata.byte_len,
        metadata.content_type.as_deref().unwrap_or("<none>"),
        metadata.final_url
    );
    if metadata.redirect_count > 0 {
        imgfetch_debug!(
            "Flow {} followed {} redirect(s) from {}",
            flow_id,
            metadata.redirect_count,
            metadata.original_url
        );
    }
    sink.emit(EngineEvent::Progress(FlowProgress {
        flow_id,
        stage: Stage::Decoding,
        bytes: Some(output.metadata.byte_len),
    }));

    let limits = context.decode;
    let bytes = output.bytes;
    tokio::task::spawn_blocking(move || decode_image(&bytes, limits))
        .await
        .map_err(|err| FetchError::new(FailureKind::Decode, err.to_string()))?
        .map_err(map_decode_error)
}

fn map_decode_error(err: DecodeError) -> FetchError {
    let kind = match &err {
        DecodeError::TooLarge {
            max_width,
            max_height,
        } => FailureKind::ImageTooLarge {
            max_width: *max_width,
            max_height: *max_height,
        },
        _ => FailureKind::Decode,
    };
    FetchError::new(kind, err.to_string())
}
