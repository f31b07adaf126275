// ABOUTME: Snapshot catalog, snapshot version history and instance lifecycle tracking for Devbox sandboxes
// ABOUTME: Resolution is pure over embedded catalogs; the stores persist through a shared SQLite pool

pub mod catalog;
pub mod context;
pub mod environments;
pub mod error;
pub mod instances;
pub mod preview_codes;
pub mod provider;
pub mod resolver;
pub mod snapshot_id;
pub mod versions;

mod rows;

pub use catalog::{
    filter_visible_presets, CatalogManifest, CatalogPreset, CatalogVersion, Preset, PresetCatalog,
    CATALOG,
};
pub use context::TeamContext;
pub use environments::{
    effective_provider, CreateEnvironment, Environment, EnvironmentStore, LEGACY_DEFAULT_PROVIDER,
};
pub use error::{ErrorKind, Result, SandboxError};
pub use instances::{
    CreateInstance, CreateInstanceResult, Instance, InstanceRegistry, InstanceStatus, ProviderInfo,
};
pub use preview_codes::{IssuePreviewCode, PreviewCode, PreviewCodeIssuer, PreviewRoute};
pub use provider::{ProviderCapabilities, SandboxProvider};
pub use resolver::{ResolvedSnapshot, SnapshotResolver};
pub use snapshot_id::{
    format_snapshot_id, infer_provider, parse_snapshot_id, preset_id_from_resources,
    ParsedSnapshotId, SnapshotIdFormat,
};
pub use versions::{
    CreateSnapshotVersion, SnapshotVersion, SnapshotVersionStore, SnapshotVersionWithStatus,
};
