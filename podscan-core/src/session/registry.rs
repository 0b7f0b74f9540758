use std::collections::{HashMap, hash_map::Entry};

use crate::{dispatch::DispatchTicket, resolver::ContainerOccurrence};

use super::record::{PodContext, ScanRecord};

/// Dedup map from image reference to its scan record.
#[derive(Debug, Default)]
pub struct ImageRegistry {
    records: HashMap<String, ScanRecord>,
}

impl ImageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_occurrences(
        occurrences: impl IntoIterator<Item = ContainerOccurrence>,
    ) -> Self {
        let mut registry = Self::new();
        for occurrence in occurrences {
            registry.insert(occurrence.image, occurrence.context);
        }
        registry
    }

    /// Attach `context` to the record for `image`, creating it (with a fresh
    /// scan id) on first sight.
    pub fn insert(&mut self, image: String, context: PodContext) {
        match self.records.entry(image) {
            Entry::Occupied(mut existing) => existing.get_mut().push_context(context),
            Entry::Vacant(slot) => {
                let record = ScanRecord::new(slot.key().clone(), context);
                slot.insert(record);
            }
        }
    }

    pub fn get(&self, image: &str) -> Option<&ScanRecord> {
        self.records.get(image)
    }

    pub fn get_mut(&mut self, image: &str) -> Option<&mut ScanRecord> {
        self.records.get_mut(image)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &ScanRecord> {
        self.records.values()
    }

    /// Hand every unclaimed completion waiter to the dispatcher.
    ///
    /// The scan runs next to the first owner holding a pull secret for the
    /// image, or next to the first owner when none does.
    pub(crate) fn claim_tickets(&mut self) -> Vec<DispatchTicket> {
        self.records
            .values_mut()
            .filter_map(|record| {
                let host = record
                    .contexts()
                    .iter()
                    .find(|context| context.image_pull_secret.is_some())
                    .or_else(|| record.contexts().first())?;
                let namespace = host.namespace.clone();
                let pull_secret = host.image_pull_secret.clone();
                let waiter = record.take_waiter()?;
                Some(DispatchTicket {
                    image: record.image().to_string(),
                    scan_id: record.scan_id(),
                    namespace,
                    pull_secret,
                    waiter,
                })
            })
            .collect()
    }
}
