//! Cached aggregation pipeline slots
//!
//! Three independently configured pipelines mirror the three aggregation
//! widgets on the client side. Each slot keeps the last computed result so a
//! read of an unconfigured (or half-configured) slot returns stale-but-valid
//! data instead of failing.

use mongodb::bson::Document;

/// Identifies one of the three pipeline slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotId {
    One,
    Two,
    Three,
}

impl SlotId {
    pub const ALL: [SlotId; 3] = [SlotId::One, SlotId::Two, SlotId::Three];

    /// Slot number as exposed on the wire (1-3).
    pub fn number(self) -> u8 {
        match self {
            SlotId::One => 1,
            SlotId::Two => 2,
            SlotId::Three => 3,
        }
    }

    pub fn index(self) -> usize {
        self.number() as usize - 1
    }

    pub fn from_number(n: i64) -> Option<Self> {
        match n {
            1 => Some(SlotId::One),
            2 => Some(SlotId::Two),
            3 => Some(SlotId::Three),
            _ => None,
        }
    }
}

/// One slot's configuration and last computed result.
#[derive(Debug, Default)]
pub struct PipelineSlot {
    collection: Option<String>,
    stages: Option<Vec<Document>>,
    last_result: Vec<Document>,
}

impl PipelineSlot {
    /// A slot only executes when both target collection and stages are set.
    pub fn is_ready(&self) -> bool {
        self.ready_config().is_some()
    }

    /// The executable configuration, if any. A blank collection name counts
    /// as unconfigured.
    pub fn ready_config(&self) -> Option<(&str, &[Document])> {
        match (&self.collection, &self.stages) {
            (Some(collection), Some(stages)) if !collection.trim().is_empty() => {
                Some((collection.as_str(), stages.as_slice()))
            }
            _ => None,
        }
    }

    /// Clear the configuration, then install the new one. Callers that fail
    /// to produce `stages` must still have cleared the slot first so a bad
    /// update leaves it inert rather than half-applied.
    pub fn clear(&mut self) {
        self.collection = None;
        self.stages = None;
    }

    pub fn configure(&mut self, collection: String, stages: Vec<Document>) {
        self.collection = Some(collection);
        self.stages = Some(stages);
    }

    pub fn collection(&self) -> Option<&str> {
        self.collection.as_deref()
    }

    pub fn stages(&self) -> Option<&[Document]> {
        self.stages.as_deref()
    }

    pub fn last_result(&self) -> &[Document] {
        &self.last_result
    }

    /// Overwrite the cached result after a successful execution.
    pub fn store_result(&mut self, result: Vec<Document>) {
        self.last_result = result;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::doc;

    #[test]
    fn test_slot_numbers() {
        assert_eq!(SlotId::from_number(1), Some(SlotId::One));
        assert_eq!(SlotId::from_number(3), Some(SlotId::Three));
        assert_eq!(SlotId::from_number(0), None);
        assert_eq!(SlotId::from_number(4), None);

        for slot in SlotId::ALL {
            assert_eq!(SlotId::from_number(slot.number() as i64), Some(slot));
        }
    }

    #[test]
    fn test_slot_readiness() {
        let mut slot = PipelineSlot::default();
        assert!(!slot.is_ready());

        slot.configure("orders".to_string(), vec![doc! { "$match": {} }]);
        assert!(slot.is_ready());
        let (collection, stages) = slot.ready_config().unwrap();
        assert_eq!(collection, "orders");
        assert_eq!(stages.len(), 1);

        // Blank collection name leaves the slot inert
        slot.configure("   ".to_string(), vec![doc! { "$match": {} }]);
        assert!(!slot.is_ready());
        assert!(slot.ready_config().is_none());

        slot.clear();
        assert!(!slot.is_ready());
        assert!(slot.collection().is_none());
        assert!(slot.stages().is_none());
    }

    #[test]
    fn test_clear_keeps_last_result() {
        let mut slot = PipelineSlot::default();
        slot.configure("orders".to_string(), vec![doc! { "$match": {} }]);
        slot.store_result(vec![doc! { "n": 1 }]);

        slot.clear();
        assert_eq!(slot.last_result().len(), 1);
    }
}
