//! Append-only records of what the randomizer has delivered and what the
//! player has earned.

use std::collections::BTreeSet;

use serde::de::Error as _;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::milestones::LocationId;

pub type ItemId = i64;

/// One item as delivered by the randomizer, with its position in the
/// server-side delivery sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceivedItem {
    pub item_id: ItemId,
    pub delivery_index: u64,
    #[serde(default)]
    pub sender: Option<String>,
}

/// Delivered items keyed by delivery index, plus the highest contiguous
/// index applied so far.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceivedItemLedger {
    #[serde(default)]
    items: Vec<ReceivedItem>,
    #[serde(default)]
    watermark: Option<u64>,
}

impl ReceivedItemLedger {
    pub fn watermark(&self) -> Option<u64> {
        self.watermark
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[ReceivedItem] {
        &self.items
    }

    pub fn item_ids(&self) -> impl Iterator<Item = ItemId> + '_ {
        self.items.iter().map(|item| item.item_id)
    }

    pub fn contains_index(&self, delivery_index: u64) -> bool {
        self.position(delivery_index).is_ok()
    }

    /// Records `item` unless its index is at or below the watermark or was
    /// already recorded. Returns whether the ledger changed.
    pub fn apply(&mut self, item: ReceivedItem) -> bool {
        if self
            .watermark
            .is_some_and(|watermark| item.delivery_index <= watermark)
        {
            return false;
        }
        let Err(slot) = self.position(item.delivery_index) else {
            return false;
        };
        self.items.insert(slot, item);
        self.advance_watermark();
        true
    }

    /// Forgets the watermark and every recorded item, then replays `items`.
    /// Returns how many were recorded.
    pub fn resync<I>(&mut self, items: I) -> usize
    where
        I: IntoIterator<Item = ReceivedItem>,
    {
        self.items.clear();
        self.watermark = None;
        items.into_iter().filter(|item| self.apply(item.clone())).count()
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.watermark = None;
    }

    fn position(&self, delivery_index: u64) -> Result<usize, usize> {
        self.items
            .binary_search_by_key(&delivery_index, |item| item.delivery_index)
    }

    fn advance_watermark(&mut self) {
        let mut next = self.watermark.map_or(Some(0), |w| w.checked_add(1));
        while let Some(index) = next.filter(|&index| self.contains_index(index)) {
            self.watermark = Some(index);
            next = index.checked_add(1);
        }
    }
}

/// Ordered set serialized as `{"_type":"Set","data":[...]}`.
///
/// A bare JSON array is accepted when loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedSet<T: Ord>(BTreeSet<T>);

impl<T: Ord> Default for TaggedSet<T> {
    fn default() -> Self {
        Self(BTreeSet::new())
    }
}

impl<T: Ord> TaggedSet<T> {
    pub fn inner(&self) -> &BTreeSet<T> {
        &self.0
    }

    pub fn inner_mut(&mut self) -> &mut BTreeSet<T> {
        &mut self.0
    }
}

impl<T: Ord> FromIterator<T> for TaggedSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

const SET_TAG: &str = "Set";

impl<T: Ord + Serialize> Serialize for TaggedSet<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut out = serializer.serialize_struct("TaggedSet", 2)?;
        out.serialize_field("_type", SET_TAG)?;
        out.serialize_field("data", &self.0)?;
        out.end()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TaggedSetRepr<T> {
    Tagged {
        #[serde(rename = "_type")]
        tag: String,
        data: Vec<T>,
    },
    Plain(Vec<T>),
}

impl<'de, T> Deserialize<'de> for TaggedSet<T>
where
    T: Ord + Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match TaggedSetRepr::<T>::deserialize(deserializer)? {
            TaggedSetRepr::Tagged { tag, data } if tag == SET_TAG => Ok(data.into_iter().collect()),
            TaggedSetRepr::Tagged { tag, .. } => {
                Err(D::Error::custom(format!("expected a Set, found {tag:?}")))
            }
            TaggedSetRepr::Plain(data) => Ok(data.into_iter().collect()),
        }
    }
}

/// Location checks earned on this save. Each id is emitted at most once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocationCheckLedger {
    checks: TaggedSet<LocationId>,
}

impl LocationCheckLedger {
    /// Returns `true` if the id was not earned before.
    pub fn insert(&mut self, id: LocationId) -> bool {
        self.checks.inner_mut().insert(id)
    }

    pub fn contains(&self, id: LocationId) -> bool {
        self.checks.inner().contains(&id)
    }

    pub fn len(&self) -> usize {
        self.checks.inner().len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.inner().is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = LocationId> + '_ {
        self.checks.inner().iter().copied()
    }

    pub fn clear(&mut self) {
        self.checks.inner_mut().clear();
    }
}
