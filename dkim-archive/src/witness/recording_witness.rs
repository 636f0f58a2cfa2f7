use std::sync::{Mutex, MutexGuard};

use super::WitnessGenerator;
use crate::persistence::sql::{DkimRecordEntity, DomainSelectorPairEntity};

/// Remembers every record it was asked to witness.
#[derive(Debug, Default)]
pub struct RecordingWitnessGenerator {
    generated: Mutex<Vec<(DomainSelectorPairEntity, DkimRecordEntity)>>,
}

impl RecordingWitnessGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids of the witnessed records, in call order.
    pub fn record_ids(&self) -> Vec<i64> {
        self.lock().iter().map(|(_, record)| record.id).collect()
    }

    pub fn count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<(DomainSelectorPairEntity, DkimRecordEntity)>> {
        self.generated.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl WitnessGenerator for RecordingWitnessGenerator {
    fn generate(&self, pair: &DomainSelectorPairEntity, record: &DkimRecordEntity) {
        self.lock().push((pair.clone(), record.clone()));
    }
}
