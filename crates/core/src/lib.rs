pub mod casefile;
pub mod config;
pub mod delivery;
pub mod documents;
pub mod fetcher;
pub mod metrics;
pub mod packager;
pub mod processor;
pub mod queue;
pub mod runner;
pub mod signer;
pub mod testing;

pub use casefile::{CaseFileId, ValidationError, Workspace};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, DeliveryBackend,
    SanitizedConfig,
};
pub use delivery::{create_delivery_client, DeliveryClient, DeliveryError, DeliveryReceipt};
pub use documents::{
    DocumentError, DocumentService, HttpTokenProvider, SoapDocumentService, TokenProvider,
};
pub use fetcher::{ConcurrentDocumentFetcher, ErrorBudget, FetchReport};
pub use packager::{ArchivePackager, PackagedArchive, PackagingError};
pub use processor::{CaseProcessor, CaseReport, CaseState};
pub use queue::{read_identifiers_csv, QueueError, SqliteQueueStore, WorkQueueStore};
pub use runner::{RunController, RunError, RunProgress, RunProgressCallback, RunSummary};
#[cfg(feature = "oracle")]
pub use signer::OracleSignerLookup;
pub use signer::{SignerError, SignerLookup};
