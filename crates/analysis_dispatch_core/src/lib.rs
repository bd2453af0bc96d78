//! Deterministic analysis job dispatch primitives.
//!
//! This crate owns the batching engine: identifier normalization, parameter
//! expansion, dispatch model construction, completed-work filtering and
//! balanced job partitioning. It intentionally excludes catalog, object
//! storage and filesystem concerns; those are reached through the
//! [`resolver::LocationResolver`] and [`processed::ProcessedJobFilter`] seams.

pub mod builder;
pub mod contract;
pub mod error;
pub mod expansion;
pub mod groups;
pub mod planner;
pub mod processed;
pub mod resolver;
pub mod sharding;
pub mod storage_keys;

pub use contract::{DispatchModel, FileLocation, ParameterSet, Resolution, TaskDescriptor};
pub use error::DispatchError;
pub use groups::{normalize_groups, AssetIds, NormalizedGroups};
pub use planner::{plan_dispatch, DispatchPlan};
