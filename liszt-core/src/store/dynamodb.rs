//! DynamoItemStore - AWS DynamoDB Item Store
//!
//! Tables are keyed by a string partition key named `id`. Reads are
//! strongly consistent. Scans follow `LastEvaluatedKey` until exhausted.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_dynamodb::config::Region;
use aws_sdk_dynamodb::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_dynamodb::operation::update_item::UpdateItemError;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;
use serde_json::{Number, Value};

use crate::constants::{ID_ATTRIBUTE_NAME, SCAN_PAGE_ITEMS_MAX};

use super::{Item, ItemStore, ItemStoreError, ItemStoreResult};

type AttributeMap = HashMap<String, AttributeValue>;

/// Item store backed by DynamoDB tables.
#[derive(Debug, Clone)]
pub struct DynamoItemStore {
    client: Client,
}

impl DynamoItemStore {
    /// Wrap an existing client.
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from the default AWS configuration chain.
    ///
    /// `endpoint` points the client at a local DynamoDB for testing.
    pub async fn connect(region: Option<String>, endpoint: Option<String>) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(Region::new(region));
        }
        if let Some(endpoint) = endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let config = loader.load().await;

        tracing::info!(region = ?config.region(), "created dynamodb client");
        Self::new(Client::new(&config))
    }

    /// The underlying client.
    #[must_use]
    pub fn client(&self) -> &Client {
        &self.client
    }
}

// =============================================================================
// Conversion
// =============================================================================

fn to_attribute(value: Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null(true),
        Value::Bool(flag) => AttributeValue::Bool(flag),
        Value::Number(number) => AttributeValue::N(number.to_string()),
        Value::String(text) => AttributeValue::S(text),
        Value::Array(values) => AttributeValue::L(values.into_iter().map(to_attribute).collect()),
        Value::Object(map) => AttributeValue::M(
            map.into_iter()
                .map(|(name, value)| (name, to_attribute(value)))
                .collect(),
        ),
    }
}

fn from_attribute(value: AttributeValue) -> ItemStoreResult<Value> {
    let value = match value {
        AttributeValue::S(text) => Value::String(text),
        AttributeValue::N(number) => {
            let number: Number = number.parse().map_err(|e| ItemStoreError::Unavailable {
                message: format!("unreadable number attribute `{number}`"),
                source: Some(Box::new(e)),
            })?;
            Value::Number(number)
        }
        AttributeValue::Bool(flag) => Value::Bool(flag),
        AttributeValue::Null(_) => Value::Null,
        AttributeValue::L(values) => Value::Array(
            values
                .into_iter()
                .map(from_attribute)
                .collect::<ItemStoreResult<_>>()?,
        ),
        AttributeValue::M(map) => Value::Object(from_attributes(map)?),
        other => {
            return Err(ItemStoreError::unavailable(format!(
                "unsupported attribute type: {other:?}"
            )))
        }
    };
    Ok(value)
}

fn to_attributes(item: Item) -> AttributeMap {
    item.into_iter()
        .map(|(name, value)| (name, to_attribute(value)))
        .collect()
}

fn from_attributes(attributes: AttributeMap) -> ItemStoreResult<Item> {
    attributes
        .into_iter()
        .map(|(name, value)| Ok((name, from_attribute(value)?)))
        .collect()
}

fn key(id: &str) -> AttributeValue {
    AttributeValue::S(id.to_string())
}

/// Classify an SDK failure. Validation and condition failures are the
/// service refusing the request, everything else is an outage.
fn sdk_error<E, R>(action: &str, err: SdkError<E, R>) -> ItemStoreError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: fmt::Debug + Send + Sync + 'static,
{
    let message = format!("{action}: {}", DisplayErrorContext(&err));
    let rejected = matches!(
        err.code(),
        Some("ValidationException" | "ConditionalCheckFailedException")
    );

    if rejected {
        ItemStoreError::Rejected {
            message,
            source: Some(Box::new(err)),
        }
    } else {
        ItemStoreError::Unavailable {
            message,
            source: Some(Box::new(err)),
        }
    }
}

// =============================================================================
// ItemStore Implementation
// =============================================================================

#[async_trait]
impl ItemStore for DynamoItemStore {
    async fn put_item(&self, table: &str, item: Item) -> ItemStoreResult<()> {
        self.client
            .put_item()
            .table_name(table)
            .set_item(Some(to_attributes(item)))
            .send()
            .await
            .map_err(|e| sdk_error("failed to put item", e))?;
        Ok(())
    }

    async fn get_item(&self, table: &str, id: &str) -> ItemStoreResult<Option<Item>> {
        let output = self
            .client
            .get_item()
            .table_name(table)
            .key(ID_ATTRIBUTE_NAME, key(id))
            .consistent_read(true)
            .send()
            .await
            .map_err(|e| sdk_error("failed to get item", e))?;

        output.item.map(from_attributes).transpose()
    }

    async fn delete_item(&self, table: &str, id: &str) -> ItemStoreResult<()> {
        self.client
            .delete_item()
            .table_name(table)
            .key(ID_ATTRIBUTE_NAME, key(id))
            .send()
            .await
            .map_err(|e| sdk_error("failed to delete item", e))?;
        Ok(())
    }

    async fn scan(&self, table: &str) -> ItemStoreResult<Vec<Item>> {
        let mut items = Vec::new();
        let mut start_key: Option<AttributeMap> = None;

        loop {
            let output = self
                .client
                .scan()
                .table_name(table)
                .consistent_read(true)
                .limit(SCAN_PAGE_ITEMS_MAX)
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(|e| sdk_error("failed to scan table", e))?;

            for attributes in output.items.unwrap_or_default() {
                items.push(from_attributes(attributes)?);
            }

            match output.last_evaluated_key {
                Some(last) if !last.is_empty() => start_key = Some(last),
                _ => break,
            }
        }

        tracing::debug!(table, count = items.len(), "scanned table");
        Ok(items)
    }

    async fn update_attribute(
        &self,
        table: &str,
        id: &str,
        attribute: &str,
        value: Value,
    ) -> ItemStoreResult<bool> {
        let result = self
            .client
            .update_item()
            .table_name(table)
            .key(ID_ATTRIBUTE_NAME, key(id))
            .update_expression("SET #attr = :value")
            .condition_expression("attribute_exists(#id)")
            .expression_attribute_names("#attr", attribute)
            .expression_attribute_names("#id", ID_ATTRIBUTE_NAME)
            .expression_attribute_values(":value", to_attribute(value))
            .send()
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(UpdateItemError::is_conditional_check_failed_exception) =>
            {
                Ok(false)
            }
            Err(err) => Err(sdk_error("failed to update item", err)),
        }
    }
}
