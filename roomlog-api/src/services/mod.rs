//! Services for roomlog-api

pub mod upload_pipeline;
pub mod url_signer;

pub use upload_pipeline::{UploadPipeline, UploadOutcome, UNKNOWN_ROOM};
pub use url_signer::{UrlSigner, SIGNED_URL_TTL_SECS};
