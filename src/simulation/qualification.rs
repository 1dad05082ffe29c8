//! BANT qualification checklist.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualificationItem {
    Budget,
    Authority,
    Need,
    Timeline,
}

impl QualificationItem {
    pub const ALL: [Self; 4] = [Self::Budget, Self::Authority, Self::Need, Self::Timeline];

    #[must_use]
    pub fn question(self) -> &'static str {
        match self {
            Self::Budget => "Is there budget set aside for this?",
            Self::Authority => "Is this person the decision maker?",
            Self::Need => "Is there a clear need or pain point?",
            Self::Timeline => "Is there a timeline for a decision?",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualificationChecklist {
    checked: BTreeSet<QualificationItem>,
}

impl QualificationChecklist {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the item was not already checked.
    pub fn check(&mut self, item: QualificationItem) -> bool {
        self.checked.insert(item)
    }

    /// Returns `true` if the item was checked.
    pub fn uncheck(&mut self, item: QualificationItem) -> bool {
        self.checked.remove(&item)
    }

    pub fn toggle(&mut self, item: QualificationItem) {
        if !self.uncheck(item) {
            self.check(item);
        }
    }

    #[must_use]
    pub fn is_checked(&self, item: QualificationItem) -> bool {
        self.checked.contains(&item)
    }

    /// Whole percent of checked items, rounded down.
    #[must_use]
    pub fn progress_percent(&self) -> u8 {
        let total = QualificationItem::ALL.len();
        u8::try_from(self.checked.len() * 100 / total).unwrap_or(100)
    }

    #[must_use]
    pub fn is_qualified(&self) -> bool {
        self.checked.len() == QualificationItem::ALL.len()
    }

    /// Unchecked items in BANT order.
    #[must_use]
    pub fn missing(&self) -> Vec<QualificationItem> {
        QualificationItem::ALL.into_iter().filter(|i| !self.checked.contains(i)).collect()
    }
}

#[cfg(test)]
#[path = "qualification_test.rs"]
mod tests;
