// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Store client adapters.
//!
//! - [`traits`]: the [`KeyspaceStore`](traits::KeyspaceStore) seam the core scans through
//! - [`redis`]: live Redis via a `ConnectionManager`
//! - [`memory`]: in-process keyspace for tests and dry runs

pub mod memory;
pub mod redis;
pub mod traits;
