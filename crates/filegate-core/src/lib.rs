use std::sync::Arc;

pub mod archive;
pub mod classifier;
pub mod extension;
pub mod filename;
pub mod store;
pub mod text_scan;
pub mod verdict;

pub use classifier::DetectedType;
pub use store::ReceivedStore;
pub use verdict::{GatePolicy, UploadGate, UploadedFile, Verdict};

/// Default upload cap: 10 MiB.
pub const DEFAULT_MAX_UPLOAD_SIZE: u64 = 10 * 1024 * 1024;

/// Shared state handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    pub gate: Arc<UploadGate>,
    pub store: ReceivedStore,
    pub max_upload_size: u64,
}

impl AppState {
    pub fn new(policy: &GatePolicy, store: ReceivedStore, max_upload_size: u64) -> Self {
        Self {
            gate: Arc::new(UploadGate::new(policy)),
            store,
            max_upload_size,
        }
    }
}
