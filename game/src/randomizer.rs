//! Boundary to the item-randomizer client.
//!
//! The session never talks to the network itself. Inbound deliveries arrive
//! as [`ItemDelivery`] values; outbound reports are queued as
//! [`OutboundEvent`]s and handed to a [`RandomizerLink`] while connected.

use serde::{Deserialize, Serialize};

use engine::ledger::{ItemId, ReceivedItem};
use engine::milestones::LocationId;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl ConnectionState {
    pub fn is_connected(self) -> bool {
        self == ConnectionState::Connected
    }
}

/// An item as reported by the client. `delivery_index` is optional because
/// some batches only carry a starting index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemDelivery {
    pub item_id: ItemId,
    #[serde(default)]
    pub delivery_index: Option<u64>,
    #[serde(default)]
    pub sender: Option<String>,
}

impl ItemDelivery {
    pub fn new(item_id: ItemId) -> Self {
        Self {
            item_id,
            delivery_index: None,
            sender: None,
        }
    }

    pub fn at(item_id: ItemId, delivery_index: u64) -> Self {
        Self {
            item_id,
            delivery_index: Some(delivery_index),
            sender: None,
        }
    }

    /// Resolves the ledger entry; an explicit index wins over the position
    /// in the batch.
    pub fn into_received(self, fallback_index: u64) -> ReceivedItem {
        ReceivedItem {
            item_id: self.item_id,
            delivery_index: self.delivery_index.unwrap_or(fallback_index),
            sender: self.sender,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum OutboundEvent {
    LocationChecks { ids: Vec<LocationId> },
    GoalComplete,
}

pub trait RandomizerLink {
    fn report_location_checks(&mut self, ids: &[LocationId]);
    fn report_goal_complete(&mut self);
}

/// Collects every report. Used by tests, the CLI and the agent API.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordingLink {
    pub events: Vec<OutboundEvent>,
}

impl RecordingLink {
    pub fn location_ids(&self) -> Vec<LocationId> {
        self.events
            .iter()
            .flat_map(|event| match event {
                OutboundEvent::LocationChecks { ids } => ids.clone(),
                OutboundEvent::GoalComplete => Vec::new(),
            })
            .collect()
    }

    pub fn goal_reports(&self) -> usize {
        self.events
            .iter()
            .filter(|event| matches!(event, OutboundEvent::GoalComplete))
            .count()
    }
}

impl RandomizerLink for RecordingLink {
    fn report_location_checks(&mut self, ids: &[LocationId]) {
        self.events.push(OutboundEvent::LocationChecks { ids: ids.to_vec() });
    }

    fn report_goal_complete(&mut self) {
        self.events.push(OutboundEvent::GoalComplete);
    }
}

pub fn deliver(event: &OutboundEvent, link: &mut dyn RandomizerLink) {
    match event {
        OutboundEvent::LocationChecks { ids } => link.report_location_checks(ids),
        OutboundEvent::GoalComplete => link.report_goal_complete(),
    }
}
