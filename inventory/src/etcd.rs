//! etcd implementation of [`InventoryStore`].
//!
//! etcd gives us exactly the primitive the reservation path needs: every
//! key carries a version that increments on write, and a transaction can
//! compare that version before putting. The client multiplexes one gRPC
//! channel and is cheap to clone, so each operation works on its own handle.

use crate::store::{counter_key, reservation_key, InventoryError, InventoryStore, VersionedCount};
use chrono::{DateTime, Utc};
use etcd_client::{Client, Compare, CompareOp, ConnectOptions, Txn, TxnOp};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::time::timeout;
use turnstile_core::EventId;

/// Inventory store backed by an etcd cluster.
pub struct EtcdInventoryStore {
    client: Client,
    op_timeout: Duration,
}

impl EtcdInventoryStore {
    /// Connect to the cluster at `endpoints`.
    ///
    /// `dial_timeout` bounds the initial connection; `op_timeout` is the
    /// per-operation deadline applied to every call afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error if no endpoint can be dialed within `dial_timeout`.
    pub async fn connect(
        endpoints: &[String],
        dial_timeout: Duration,
        op_timeout: Duration,
    ) -> Result<Self, InventoryError> {
        let options = ConnectOptions::new()
            .with_connect_timeout(dial_timeout)
            .with_timeout(op_timeout);
        let client = Client::connect(endpoints, Some(options)).await?;
        tracing::info!(endpoints = ?endpoints, "connected to etcd cluster");
        Ok(Self { client, op_timeout })
    }
}

async fn with_deadline<T>(
    op_timeout: Duration,
    fut: impl Future<Output = Result<T, etcd_client::Error>>,
) -> Result<T, InventoryError> {
    match timeout(op_timeout, fut).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(InventoryError::Timeout),
    }
}

fn parse_count(raw: &[u8]) -> Result<i64, InventoryError> {
    let text = std::str::from_utf8(raw)
        .map_err(|_| InventoryError::CorruptValue(String::from_utf8_lossy(raw).into_owned()))?;
    text.parse()
        .map_err(|_| InventoryError::CorruptValue(text.to_owned()))
}

impl InventoryStore for EtcdInventoryStore {
    fn get<'a>(
        &'a self,
        event_id: &'a EventId,
        tier: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<VersionedCount>, InventoryError>> + Send + 'a>>
    {
        let mut client = self.client.clone();
        let op_timeout = self.op_timeout;
        let key = counter_key(event_id, tier);
        Box::pin(async move {
            let response = with_deadline(op_timeout, client.get(key, None)).await?;

            match response.kvs().first() {
                Some(kv) => Ok(Some(VersionedCount {
                    count: parse_count(kv.value())?,
                    version: kv.version(),
                })),
                None => Ok(None),
            }
        })
    }

    fn compare_and_put<'a>(
        &'a self,
        event_id: &'a EventId,
        tier: &'a str,
        expected_version: i64,
        new_count: i64,
    ) -> Pin<Box<dyn Future<Output = Result<bool, InventoryError>> + Send + 'a>> {
        let mut client = self.client.clone();
        let op_timeout = self.op_timeout;
        let key = counter_key(event_id, tier);
        Box::pin(async move {
            let txn = Txn::new()
                .when(vec![Compare::version(
                    key.clone(),
                    CompareOp::Equal,
                    expected_version,
                )])
                .and_then(vec![TxnOp::put(key, new_count.to_string(), None)]);

            let response = with_deadline(op_timeout, client.txn(txn)).await?;
            Ok(response.succeeded())
        })
    }

    fn put_reservation<'a>(
        &'a self,
        event_id: &'a EventId,
        tier: &'a str,
        expires_at: DateTime<Utc>,
        quantity: u32,
    ) -> Pin<Box<dyn Future<Output = Result<(), InventoryError>> + Send + 'a>> {
        let mut client = self.client.clone();
        let op_timeout = self.op_timeout;
        let key = reservation_key(event_id, tier, expires_at);
        Box::pin(async move {
            with_deadline(op_timeout, client.put(key, quantity.to_string(), None)).await?;
            Ok(())
        })
    }
}
