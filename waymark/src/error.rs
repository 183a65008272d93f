//! Engine error types.

use thiserror::Error;
use waymark_api::StoreError;

#[derive(Debug, Error)]
pub enum WaymarkError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("config error: {0}")]
    Config(serde_json::Error),

    #[error("minimap has been torn down")]
    TornDown,

    #[error("unknown marker: {0}")]
    UnknownMarker(String),
}
