//! Entry lifecycle shared by both backends
//!
//! Backends provide row-level statements through [`EntryRows`]; numbering,
//! normalization and partial-update merging live here once so the two
//! engines cannot drift apart.

use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use tracing::debug;

use super::models::{Entry, EntryPatch, NewEntry};
use super::query::EntryFilter;
use super::sequence::{assign_with_retry, next_entry_number, EntryGroup};
use super::EntryPage;
use crate::{Error, Result};

/// Row-level statements a backend must supply
#[async_trait]
pub(crate) trait EntryRows: Send + Sync {
    async fn fetch_entry(&self, id: i64) -> Result<Option<Entry>>;

    /// Highest entry_number in `group`, ignoring row `exclude_id`
    async fn max_entry_number(&self, group: &EntryGroup, exclude_id: Option<i64>)
        -> Result<Option<i64>>;

    /// Insert and return the new id
    async fn insert_entry(
        &self,
        input: &NewEntry,
        entry_number: i64,
        now: DateTime<Utc>,
    ) -> Result<i64>;

    /// Overwrite every mutable column of row `entry.id`
    async fn write_entry(&self, entry: &Entry) -> Result<()>;

    async fn mark_deleted(&self, id: i64, now: DateTime<Utc>) -> Result<bool>;

    async fn remove_entry(&self, id: i64) -> Result<bool>;

    async fn page_entries(&self, filter: &EntryFilter) -> Result<EntryPage>;
}

/// Current time at microsecond precision, the finest both engines keep
pub(crate) fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

pub(crate) async fn create<S: EntryRows + ?Sized>(store: &S, input: NewEntry) -> Result<Entry> {
    let input = input.normalized()?;
    let group = EntryGroup::of_new(&input);

    let created_at = now();
    let (input_ref, group_ref) = (&input, &group);
    let id = assign_with_retry(&group, move || async move {
        let current_max = store.max_entry_number(group_ref, None).await?;
        store
            .insert_entry(input_ref, next_entry_number(current_max), created_at)
            .await
    })
    .await?;

    debug!("Created entry {} in group {}", id, group);

    store
        .fetch_entry(id)
        .await?
        .ok_or_else(|| Error::Internal(format!("entry {} missing right after insert", id)))
}

pub(crate) async fn update<S: EntryRows + ?Sized>(
    store: &S,
    id: i64,
    patch: EntryPatch,
) -> Result<Option<Entry>> {
    let patch = patch.normalized()?;

    let Some(current) = store.fetch_entry(id).await? else {
        return Ok(None);
    };
    if patch.is_empty() {
        return Ok(Some(current));
    }

    let mut merged = patch.apply_to(&current);
    merged.updated_at = now();

    let target_group = EntryGroup::of_entry(&merged);
    if target_group != EntryGroup::of_entry(&current) {
        // Moving groups: renumber against the destination, never reusing
        // this row's old number there
        let (merged_ref, group_ref) = (&merged, &target_group);
        assign_with_retry(&target_group, move || async move {
            let current_max = store.max_entry_number(group_ref, Some(id)).await?;
            let mut candidate = merged_ref.clone();
            candidate.entry_number = next_entry_number(current_max);
            store.write_entry(&candidate).await
        })
        .await?;
        debug!("Moved entry {} to group {}", id, target_group);
    } else {
        store.write_entry(&merged).await?;
    }

    store.fetch_entry(id).await
}

pub(crate) async fn delete<S: EntryRows + ?Sized>(store: &S, id: i64, hard: bool) -> Result<bool> {
    let affected = if hard {
        store.remove_entry(id).await?
    } else {
        store.mark_deleted(id, now()).await?
    };
    debug!("Delete entry {} (hard={}): affected={}", id, hard, affected);
    Ok(affected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_now_drops_sub_microsecond_digits() {
        for _ in 0..100 {
            assert_eq!(now().nanosecond() % 1_000, 0);
        }
    }
}
