// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Redis keyspace adapter.
//!
//! Read-only: the only commands issued are `SCAN`, `TYPE` and
//! `MEMORY USAGE`. Inspection is pipelined per batch:
//!
//! ```text
//! SCAN cursor MATCH p COUNT n   → keys[]
//! TYPE k1 | TYPE k2 | ...       → one round-trip
//! MEMORY USAGE k1 | ...         → one round-trip (existing keys only)
//! ```
//!
//! The connection is owned by [`RedisKeyspace`] and released when it is
//! dropped; there is no global connection state.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{cmd, pipe, Client, ErrorKind, IntoConnectionInfo, RedisError};
use tracing::{debug, info, instrument};

use super::traits::{KeyInspection, KeyspaceStore, ScanPage, StorageError};
use crate::key_record::{KeyType, MemoryProbe};
use crate::resilience::retry::{retry_if, RetryConfig};

pub struct RedisKeyspace {
    connection: ConnectionManager,
}

impl RedisKeyspace {
    /// Connect to Redis. Transient failures are retried with the startup
    /// policy; authentication failures are returned immediately.
    pub async fn connect<T: IntoConnectionInfo>(target: T) -> Result<Self, StorageError> {
        Self::connect_with_retry(target, &RetryConfig::startup()).await
    }

    pub async fn connect_with_retry<T: IntoConnectionInfo>(
        target: T,
        retry_config: &RetryConfig,
    ) -> Result<Self, StorageError> {
        let info = target
            .into_connection_info()
            .map_err(|e| StorageError::Backend(format!("Invalid connection info: {}", e)))?;
        info!(addr = %info.addr, db = info.redis.db, "Connecting to Redis");

        let client = Client::open(info).map_err(classify)?;

        let connection = retry_if(
            "redis_connect",
            retry_config,
            StorageError::is_transient,
            || async { ConnectionManager::new(client.clone()).await.map_err(classify) },
        )
        .await?;

        Ok(Self { connection })
    }

    /// Get a clone of the connection manager
    pub fn connection(&self) -> ConnectionManager {
        self.connection.clone()
    }

    /// Pipelined `MEMORY USAGE` for keys known to exist. If the server
    /// rejects the command inside the pipeline, falls back to per-key calls
    /// so one unsupported key doesn't poison the batch.
    async fn memory_batch(
        &self,
        keys: &[&[u8]],
        samples: Option<u32>,
    ) -> Result<Vec<MemoryProbe>, StorageError> {
        if keys.is_empty() {
            return Ok(vec![]);
        }

        let mut conn = self.connection.clone();
        let mut pipeline = pipe();
        for key in keys {
            let command = pipeline.cmd("MEMORY").arg("USAGE").arg(*key);
            if let Some(n) = samples {
                command.arg("SAMPLES").arg(n);
            }
        }

        let piped: Result<Vec<Option<u64>>, RedisError> = pipeline.query_async(&mut conn).await;
        match piped {
            Ok(sizes) => Ok(sizes.into_iter().map(probe_from_reply).collect()),
            Err(e) if is_command_rejected(&e) => {
                debug!(error = %e, "MEMORY USAGE rejected by the server");
                Ok(vec![MemoryProbe::CommandRejected; keys.len()])
            }
            Err(e) if is_server_reply(&e) => {
                debug!(error = %e, "Pipelined MEMORY USAGE rejected, falling back to per-key probes");
                let mut out = Vec::with_capacity(keys.len());
                for key in keys {
                    out.push(self.memory_of(key, samples).await?);
                }
                Ok(out)
            }
            Err(e) => Err(classify(e)),
        }
    }
}

#[async_trait]
impl KeyspaceStore for RedisKeyspace {
    #[instrument(skip(self))]
    async fn scan_batch(
        &self,
        cursor: u64,
        match_pattern: &str,
        count: usize,
    ) -> Result<ScanPage, StorageError> {
        let mut conn = self.connection.clone();
        let (next_cursor, keys): (u64, Vec<Vec<u8>>) = cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(match_pattern)
            .arg("COUNT")
            .arg(count)
            .query_async(&mut conn)
            .await
            .map_err(classify)?;

        Ok(ScanPage { next_cursor, keys })
    }

    async fn type_of(&self, key: &[u8]) -> Result<Option<KeyType>, StorageError> {
        let mut conn = self.connection.clone();
        let reply: String = cmd("TYPE").arg(key).query_async(&mut conn).await.map_err(classify)?;
        Ok(type_from_reply(&reply))
    }

    async fn memory_of(&self, key: &[u8], samples: Option<u32>) -> Result<MemoryProbe, StorageError> {
        let mut conn = self.connection.clone();
        let mut command = cmd("MEMORY");
        command.arg("USAGE").arg(key);
        if let Some(n) = samples {
            command.arg("SAMPLES").arg(n);
        }

        let reply: Result<Option<u64>, RedisError> = command.query_async(&mut conn).await;
        match reply {
            Ok(size) => Ok(probe_from_reply(size)),
            Err(e) if is_command_rejected(&e) => Ok(MemoryProbe::CommandRejected),
            Err(e) if is_server_reply(&e) => Ok(MemoryProbe::Unsupported),
            Err(e) => Err(classify(e)),
        }
    }

    #[instrument(skip(self, keys), fields(keys = keys.len()))]
    async fn inspect_batch(
        &self,
        keys: &[Vec<u8>],
        probe_memory: bool,
        samples: Option<u32>,
    ) -> Result<Vec<KeyInspection>, StorageError> {
        if keys.is_empty() {
            return Ok(vec![]);
        }

        let mut conn = self.connection.clone();
        let mut pipeline = pipe();
        for key in keys {
            pipeline.cmd("TYPE").arg(key.as_slice());
        }
        let replies: Vec<String> = pipeline.query_async(&mut conn).await.map_err(classify)?;
        if replies.len() != keys.len() {
            return Err(StorageError::Backend(format!(
                "TYPE pipeline returned {} replies for {} keys",
                replies.len(),
                keys.len()
            )));
        }

        let types: Vec<Option<KeyType>> = replies.iter().map(|r| type_from_reply(r)).collect();

        let mut probes = vec![MemoryProbe::NotFound; keys.len()];
        if probe_memory {
            let existing: Vec<usize> = (0..keys.len()).filter(|i| types[*i].is_some()).collect();
            let existing_keys: Vec<&[u8]> = existing.iter().map(|i| keys[*i].as_slice()).collect();
            let sizes = self.memory_batch(&existing_keys, samples).await?;
            for (idx, probe) in existing.into_iter().zip(sizes) {
                probes[idx] = probe;
            }
        } else {
            for (probe, key_type) in probes.iter_mut().zip(&types) {
                if key_type.is_some() {
                    *probe = MemoryProbe::Skipped;
                }
            }
        }

        Ok(keys
            .iter()
            .zip(types)
            .zip(probes)
            .map(|((key, key_type), memory)| KeyInspection {
                key: key.clone(),
                key_type,
                memory,
            })
            .collect())
    }
}

fn type_from_reply(reply: &str) -> Option<KeyType> {
    if reply == "none" {
        return None;
    }
    let key_type = KeyType::parse(reply);
    if key_type == KeyType::Unknown {
        debug!(reply, "Unrecognized key type, counting as unknown");
    }
    Some(key_type)
}

fn probe_from_reply(size: Option<u64>) -> MemoryProbe {
    match size {
        Some(bytes) => MemoryProbe::Bytes(bytes),
        None => MemoryProbe::NotFound,
    }
}

/// The server answered with an error reply (as opposed to the link failing).
fn is_server_reply(e: &RedisError) -> bool {
    matches!(e.kind(), ErrorKind::ResponseError | ErrorKind::ExtensionError) && !is_auth_error(e)
}

/// The server refused the command itself rather than the key: the command
/// is unknown (disabled or renamed) or the ACL user may not run it.
fn is_command_rejected(e: &RedisError) -> bool {
    e.code() == Some("NOPERM")
        || (matches!(e.kind(), ErrorKind::ResponseError | ErrorKind::ExtensionError)
            && e.to_string().to_ascii_lowercase().contains("unknown command"))
}

fn is_auth_error(e: &RedisError) -> bool {
    e.kind() == ErrorKind::AuthenticationFailed
        || matches!(e.code(), Some("NOAUTH") | Some("WRONGPASS") | Some("NOPERM"))
}

/// Map a Redis error onto the storage taxonomy.
pub(crate) fn classify(e: RedisError) -> StorageError {
    if is_auth_error(&e) {
        StorageError::Authentication(e.to_string())
    } else if e.is_io_error()
        || e.is_connection_refusal()
        || e.is_connection_dropped()
        || e.is_timeout()
        || matches!(
            e.kind(),
            ErrorKind::BusyLoadingError | ErrorKind::TryAgain | ErrorKind::ClusterDown | ErrorKind::MasterDown
        )
    {
        StorageError::Connectivity(e.to_string())
    } else {
        StorageError::Backend(e.to_string())
    }
}
