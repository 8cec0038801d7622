//! imgfetch engine: network fetch, image decode and flow execution.
mod decode;
mod engine;
mod fetch;
mod types;

pub use decode::{decode_image, DecodeError, DecodeLimits};
pub use engine::{EngineHandle, EngineSettings};
pub use fetch::{FetchSettings, Fetcher, ProgressSink, ReqwestFetcher};
pub use types::{
    DecodedImage, EngineEvent, FailureKind, FetchError, FetchMetadata, FetchOutput, FlowId,
    FlowProgress, Stage,
};
