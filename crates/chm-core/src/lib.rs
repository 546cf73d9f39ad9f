//! chm-core - Core library for chm
//!
//! This crate provides the configuration value object, the statement
//! splitter, migration file loading and the cluster topology rules used by
//! the runner and the CLI.

pub mod checksum;
pub mod config;
pub mod error;
pub mod migration;
pub mod splitter;
pub mod sql_utils;
pub mod topology;

pub use checksum::content_hash;
pub use config::{ClickHouseConnection, Config, ConnectionTarget, DbType, ProjectFile};
pub use error::{CoreError, CoreResult};
pub use migration::{MigrationFile, MigrationLoader};
pub use splitter::split_statements;
pub use topology::{check_cluster_topology, TopologyViolation, ViolationKind};
