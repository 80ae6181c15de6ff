//! Outbound command surface
//!
//! Thin validated wrappers over [`Transport`]. Mutating calls issued while
//! offline or read-only are silent no-ops.

use hass_events::{validate_definition, ItemDefinition};
use rest_client::{RestError, RestRequest};
use serde_json::{json, Map, Value};

use crate::error::{ConnectionError, Result};
use crate::transport::Transport;

#[derive(Debug, Clone)]
pub struct RestApi {
    transport: Transport,
}

impl RestApi {
    pub fn new(transport: Transport) -> Self {
        Self { transport }
    }

    /// Set the state of an item without triggering a command.
    pub async fn post_update(&self, name: &str, state: &str) -> Result<()> {
        validate_item_name(name)?;
        let request = RestRequest::put(format!("items/{name}/state")).with_text(state);
        self.transport.request(request).await?;
        Ok(())
    }

    /// Send a command to an item.
    pub async fn send_command(&self, name: &str, command: &str) -> Result<()> {
        validate_item_name(name)?;
        let request = RestRequest::post(format!("items/{name}")).with_text(command);
        self.transport.request(request).await?;
        Ok(())
    }

    /// Definition of an item, `None` if the server does not know it.
    pub async fn get_item(&self, name: &str) -> Result<Option<ItemDefinition>> {
        validate_item_name(name)?;
        let response = self.transport.get(&format!("items/{name}"), false).await?;
        if response.status == 404 {
            return Ok(None);
        }
        Ok(Some(response.json()?))
    }

    pub async fn item_exists(&self, name: &str) -> Result<bool> {
        validate_item_name(name)?;
        let response = self.transport.get(&format!("items/{name}"), false).await?;
        Ok(response.status == 200)
    }

    /// Create or replace an item. Returns `false` when suppressed or refused.
    ///
    /// The definition is checked against the known item types, unit
    /// dimensions and group functions before anything is sent.
    pub async fn create_item(&self, item: &ItemDefinition) -> Result<bool> {
        validate_item_name(&item.name)?;
        validate_definition(item)?;
        let body = serde_json::to_value(item).map_err(|e| RestError::Decode(e.to_string()))?;
        let request = RestRequest::put(format!("items/{}", item.name)).with_json(body);
        let response = self.transport.request(request).await?;
        Ok(matches!(response, Some(r) if r.status == 200 || r.status == 201))
    }

    /// Returns `false` when suppressed or the item did not exist.
    pub async fn remove_item(&self, name: &str) -> Result<bool> {
        validate_item_name(name)?;
        let request = RestRequest::delete(format!("items/{name}")).without_404_log();
        let response = self.transport.request(request).await?;
        Ok(matches!(response, Some(r) if r.status == 200))
    }

    /// Add or replace the metadata of `name` in `namespace`.
    pub async fn set_metadata(
        &self,
        name: &str,
        namespace: &str,
        value: &str,
        config: Map<String, Value>,
    ) -> Result<bool> {
        validate_item_name(name)?;
        validate_namespace(namespace)?;
        let body = json!({ "value": value, "config": config });
        let request = RestRequest::put(format!("items/{name}/metadata/{namespace}")).with_json(body);
        let response = self.transport.request(request).await?;
        Ok(matches!(response, Some(r) if r.status == 200 || r.status == 201))
    }

    pub async fn remove_metadata(&self, name: &str, namespace: &str) -> Result<bool> {
        validate_item_name(name)?;
        validate_namespace(namespace)?;
        let request = RestRequest::delete(format!("items/{name}/metadata/{namespace}"));
        let response = self.transport.request(request).await?;
        Ok(matches!(response, Some(r) if r.status == 200))
    }

    /// Identity of the connected server. The server must answer, a refusal
    /// takes the connection down.
    pub async fn get_uuid(&self) -> Result<String> {
        let response = self.transport.get_required("uuid").await?;
        Ok(response.text()?.trim().to_string())
    }

    /// Root resource of the server, `None` if it does not provide one.
    pub async fn get_root(&self) -> Result<Option<Value>> {
        let response = self.transport.get("", false).await?;
        if response.status == 404 {
            return Ok(None);
        }
        Ok(Some(response.json()?))
    }
}

fn is_path_segment(text: &str) -> bool {
    !text.is_empty() && text.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-')
}

/// Item names end up as a single path segment.
pub fn validate_item_name(name: &str) -> Result<()> {
    if is_path_segment(name) {
        Ok(())
    } else {
        Err(ConnectionError::InvalidItemName(name.to_string()))
    }
}

pub fn validate_namespace(namespace: &str) -> Result<()> {
    if is_path_segment(namespace) {
        Ok(())
    } else {
        Err(ConnectionError::InvalidNamespace(namespace.to_string()))
    }
}
