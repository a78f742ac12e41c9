//! Multi-source batch loading and reconciliation.
//!
//! A batch is split into one group of distinct ids per source. Sources have
//! no data dependency on each other, so up to
//! [`ResolverConfig::max_concurrent_sources`](super::ResolverConfig) of them
//! are resolved at once. Results are merged by a single consumer into a
//! position-indexed buffer, which is then densified with placeholders.

use std::pin::pin;

use futures::stream::{self, StreamExt};
use tokio::time::timeout;
use tracing::debug;

use crate::error::DomainResult;
use crate::identifier::{IdentifierList, IdentifierSpec};
use crate::record::Record;

use super::record_resolver::RecordResolver;
use super::traits::SearchBackend;

impl<B> RecordResolver<B>
where
    B: SearchBackend + 'static,
{
    /// Loads a batch of records across any number of sources.
    ///
    /// The result has exactly one record per requested entry, in request
    /// order. Duplicate requests each receive their own copy. Entries no
    /// tier resolved become placeholders seeded with their extra fields.
    ///
    /// With `tolerate_backend_errors` set the call only fails on cache or
    /// fallback loader errors, unparsable identifiers, or timeout. Without
    /// it, the first backend error aborts every source still in flight.
    pub async fn load_batch<I, S>(
        &self,
        specs: I,
        tolerate_backend_errors: bool,
    ) -> DomainResult<Vec<Record>>
    where
        I: IntoIterator<Item = S>,
        S: Into<IdentifierSpec>,
    {
        let list = IdentifierList::new(specs)?;

        match timeout(self.config.timeout, self.reconcile(list, tolerate_backend_errors)).await {
            Ok(result) => result,
            Err(_) => Err(self.timeout_error()),
        }
    }

    async fn reconcile(
        &self,
        mut list: IdentifierList,
        tolerate_backend_errors: bool,
    ) -> DomainResult<Vec<Record>> {
        let mut slots: Vec<Option<Record>> = vec![None; list.len()];

        let mut resolved = pin!(stream::iter(list.ids_by_source())
            .map(|bucket| async move {
                self.resolve_source_batch(&bucket.ids, &bucket.source, tolerate_backend_errors)
                    .await
            })
            .buffer_unordered(self.config.max_concurrent_sources.max(1)));

        while let Some(records) = resolved.next().await {
            self.place(&mut list, &mut slots, records?);
        }

        Ok(self.fill_placeholders(&list, slots))
    }

    /// Writes each record into every unclaimed slot that requested it.
    fn place(&self, list: &mut IdentifierList, slots: &mut [Option<Record>], records: Vec<Record>) {
        for record in records {
            let mut positions = Vec::new();
            while let Ok(position) = list.record_position(&record) {
                positions.push(position);
            }

            match positions.split_last() {
                Some((&last, rest)) => {
                    for &position in rest {
                        slots[position] = Some(record.clone());
                    }
                    slots[last] = Some(record);
                }
                None => {
                    debug!(
                        source = %record.source_identifier(),
                        id = %record.unique_id(),
                        previous_id = ?record.previous_unique_id(),
                        "Dropping record with no unclaimed requested position"
                    );
                    self.metrics.record_dropped();
                }
            }
        }
    }

    fn fill_placeholders(&self, list: &IdentifierList, slots: Vec<Option<Record>>) -> Vec<Record> {
        list.all()
            .iter()
            .zip(slots)
            .map(|(entry, slot)| {
                slot.unwrap_or_else(|| {
                    debug!(
                        source = %entry.source,
                        id = %entry.id,
                        position = entry.position,
                        "No tier resolved requested entry, using placeholder"
                    );
                    self.metrics.record_placeholder();
                    self.factory
                        .missing(&entry.source, &entry.id, &entry.extra_fields)
                })
            })
            .collect()
    }
}
