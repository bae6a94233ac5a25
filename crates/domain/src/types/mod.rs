//! Domain types and models

pub mod filter;
pub mod record;
pub mod reference;
pub mod sync;
pub mod vector;

pub use filter::{Condition, FilterOp, FilterValue, RecordFilter};
pub use record::{NamedRef, RecordType, SourceRecord};
pub use reference::{ReferenceKey, ReferenceTable, Salesperson, Stage, Tag, Team};
pub use sync::{
    BatchFailure, FetchProgress, SingleSyncOutcome, SyncKind, SyncPhase, SyncProgress,
    SyncResult, SyncState, SyncStatus, VectorStoreHealth,
};
pub use vector::{
    CollectionInfo, CollectionSpec, Distance, FieldCondition, IndexParams, InputType, MatchValue,
    PayloadValue, RecordPayload, RecordQuery, SearchRequest, VectorFilter, VectorMatch,
    VectorRecord,
};
