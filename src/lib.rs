pub mod logger;

pub mod api;
pub mod batch;
pub mod cli;
pub mod constants;
pub mod encoder;
pub mod error;
pub mod export;
pub mod scan;
pub mod summary;
pub mod transport;
pub mod upload;
pub mod utils;
pub mod validation;

pub use api::{
    apply_consensus_crop, ApiClient, ApiOptions, Consensus, CropBox, ImageListing, ListingStats,
    StoredImage,
};
pub use batch::{replay, upload_bulk_sync, BatchUploader, Cursor, Phase, RunState, Transition};
pub use encoder::{
    decode_payload, encode_payload, prepare_image_record, prepare_records, ImageRecord,
    PreparedRecords,
};
pub use export::{export_classifications, ExportPaths, ExportReport};
pub use error::{PrepareError, Result, TransportError, UploadError};
pub use scan::{collect_image_files, normalize_extensions};
pub use summary::{BatchResult, ItemFailure, UploadSummary};
pub use transport::{BatchRequest, HttpTransport, MockTransport, Transport};
pub use upload::{run_upload, upload_files, UploadOptions, UploadPlan, UploadReport};
