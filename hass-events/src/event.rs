//! Typed domain events

use serde::{Deserialize, Serialize};

use crate::value::ItemValue;

/// An item received a state update, changed or not
#[derive(Debug, Clone, PartialEq)]
pub struct ValueUpdateEvent {
    pub name: String,
    pub value: ItemValue,
}

/// An item state changed
#[derive(Debug, Clone, PartialEq)]
pub struct ValueChangeEvent {
    pub name: String,
    pub value: ItemValue,
    pub old_value: ItemValue,
}

/// A command was sent to an item
#[derive(Debug, Clone, PartialEq)]
pub struct CommandEvent {
    pub name: String,
    pub value: ItemValue,
}

/// Item metadata as published on the item lifecycle topics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub item_type: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, rename = "groupNames")]
    pub groups: Vec<String>,
    /// Item type of the group members, groups only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_type: Option<String>,
    /// State aggregation, groups only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<GroupFunction>,
}

impl ItemDefinition {
    pub fn new(name: impl Into<String>, item_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            item_type: item_type.into(),
            label: None,
            category: None,
            tags: Vec::new(),
            groups: Vec::new(),
            group_type: None,
            function: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups = groups.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_group_type(mut self, group_type: impl Into<String>) -> Self {
        self.group_type = Some(group_type.into());
        self
    }

    pub fn with_group_function(mut self, function: GroupFunction) -> Self {
        self.function = Some(function);
        self
    }
}

/// How a group derives its state from its members
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupFunction {
    pub name: String,
    #[serde(default)]
    pub params: Vec<String>,
}

impl GroupFunction {
    pub fn new<I, S>(name: impl Into<String>, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            params: params.into_iter().map(Into::into).collect(),
        }
    }
}

/// Status of a thing (a physical or virtual device)
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThingStatus {
    pub status: String,
    #[serde(default)]
    pub status_detail: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// A thing reported its current status
#[derive(Debug, Clone, PartialEq)]
pub struct StatusInfoEvent {
    pub name: String,
    pub status: ThingStatus,
}

/// A thing status changed
#[derive(Debug, Clone, PartialEq)]
pub struct StatusChangeEvent {
    pub name: String,
    pub status: ThingStatus,
    pub old_status: ThingStatus,
}

/// A trigger channel fired
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelTriggeredEvent {
    pub name: String,
    pub event: String,
    pub channel: String,
}

/// A decoded push event. Only [`DomainEvent::ValueUpdate`] mutates the item registry.
#[derive(Debug, Clone, PartialEq)]
pub enum DomainEvent {
    ValueUpdate(ValueUpdateEvent),
    ValueChange(ValueChangeEvent),
    Command(CommandEvent),
    ItemAdded(ItemDefinition),
    ItemUpdated {
        item: ItemDefinition,
        old_item: ItemDefinition,
    },
    ItemRemoved(ItemDefinition),
    StatusInfo(StatusInfoEvent),
    StatusChange(StatusChangeEvent),
    ChannelTriggered(ChannelTriggeredEvent),
}

impl DomainEvent {
    /// Name of the item, thing or channel the event is about
    pub fn name(&self) -> &str {
        match self {
            DomainEvent::ValueUpdate(e) => &e.name,
            DomainEvent::ValueChange(e) => &e.name,
            DomainEvent::Command(e) => &e.name,
            DomainEvent::ItemAdded(item) | DomainEvent::ItemRemoved(item) => &item.name,
            DomainEvent::ItemUpdated { item, .. } => &item.name,
            DomainEvent::StatusInfo(e) => &e.name,
            DomainEvent::StatusChange(e) => &e.name,
            DomainEvent::ChannelTriggered(e) => &e.name,
        }
    }

    /// Short kind label, useful for logging and filtering
    pub fn kind(&self) -> &'static str {
        match self {
            DomainEvent::ValueUpdate(_) => "value_update",
            DomainEvent::ValueChange(_) => "value_change",
            DomainEvent::Command(_) => "command",
            DomainEvent::ItemAdded(_) => "item_added",
            DomainEvent::ItemUpdated { .. } => "item_updated",
            DomainEvent::ItemRemoved(_) => "item_removed",
            DomainEvent::StatusInfo(_) => "status_info",
            DomainEvent::StatusChange(_) => "status_change",
            DomainEvent::ChannelTriggered(_) => "channel_triggered",
        }
    }

    pub fn as_value_update(&self) -> Option<&ValueUpdateEvent> {
        match self {
            DomainEvent::ValueUpdate(e) => Some(e),
            _ => None,
        }
    }
}
