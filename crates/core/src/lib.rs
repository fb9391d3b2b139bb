pub mod basecaller;
pub mod checksum;
pub mod config;
pub mod fastq;
pub mod metrics;
pub mod pipeline;
pub mod registry;
pub mod run_file;
pub mod testing;
pub mod transfer;

pub use basecaller::{
    BasecallSession, Basecaller, BasecallerConfig, CalledRead, SessionError, TcpBasecaller,
};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
    ServerConfig,
};
pub use fastq::FastqRecord;
pub use pipeline::{BasecallPipeline, PipelineConfig, PipelineError, PipelineOutcome};
pub use registry::{HttpRunRegistry, RegistryConfig, RegistryError, RunDescriptor, RunRegistry};
pub use run_file::{ReadRecord, RecordMetadata, RunFile, RunFileError, RunHeader};
pub use transfer::{
    FetchError, FetchPolicy, FetchReport, HttpRunFileStore, RunFileStore, TransferError,
    VerifiedFetcher,
};
