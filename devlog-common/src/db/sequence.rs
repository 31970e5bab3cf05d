//! Per-group entry numbering
//!
//! An entry's number is `1 + max(entry_number)` among rows sharing its
//! (project, document_type, entry_date). The read-max and the write are
//! separate statements, so two writers can pick the same number; the UNIQUE
//! constraint rejects the loser and [`assign_with_retry`] backs off, re-reads
//! the max and tries again. Concurrent creates in one group therefore all
//! succeed with distinct numbers unless contention outlasts
//! [`MAX_ASSIGN_WAIT`].

use chrono::NaiveDate;
use rand::Rng;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

use super::models::{DocumentType, Entry, NewEntry};
use crate::{Error, Result};

/// Total time spent retrying collisions before a conflict is surfaced
pub const MAX_ASSIGN_WAIT: Duration = Duration::from_secs(5);

/// First backoff ceiling; doubles per collision
pub const INITIAL_BACKOFF: Duration = Duration::from_millis(10);

/// Upper bound for a single backoff
pub const MAX_BACKOFF: Duration = Duration::from_millis(1000);

/// Scope of an entry number
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntryGroup {
    pub project: String,
    pub document_type: DocumentType,
    pub entry_date: NaiveDate,
}

impl EntryGroup {
    pub fn of_new(entry: &NewEntry) -> Self {
        Self {
            project: entry.project.clone(),
            document_type: entry.document_type,
            entry_date: entry.entry_date,
        }
    }

    pub fn of_entry(entry: &Entry) -> Self {
        Self {
            project: entry.project.clone(),
            document_type: entry.document_type,
            entry_date: entry.entry_date,
        }
    }
}

impl std::fmt::Display for EntryGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.project, self.document_type, self.entry_date)
    }
}

/// Next number given the group's current maximum (`None` for an empty group)
pub fn next_entry_number(current_max: Option<i64>) -> i64 {
    current_max.map_or(1, |max| max + 1)
}

/// Backoff ceiling after `collisions` consecutive collisions
pub fn backoff_ceiling(collisions: u32) -> Duration {
    let factor = 1u32 << collisions.saturating_sub(1).min(16);
    INITIAL_BACKOFF.saturating_mul(factor).min(MAX_BACKOFF)
}

/// Run one read-max/write attempt, retrying on UNIQUE violations
///
/// `attempt` must re-read the group maximum each time it is called. Between
/// attempts the caller sleeps a random delay up to [`backoff_ceiling`], so
/// racers that collided do not re-read the same maximum in lockstep.
pub async fn assign_with_retry<T, F, Fut>(group: &EntryGroup, mut attempt: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let start_time = Instant::now();
    let mut collisions = 0u32;

    loop {
        match attempt().await {
            Err(e) if e.is_unique_violation() => {
                collisions += 1;
                let elapsed = start_time.elapsed();

                if elapsed >= MAX_ASSIGN_WAIT {
                    error!(
                        "Gave up assigning an entry number in group {} after {} collisions ({} ms)",
                        group,
                        collisions,
                        elapsed.as_millis()
                    );
                    return Err(Error::Conflict(format!(
                        "could not assign an entry number in group {} after {} attempts",
                        group, collisions
                    )));
                }

                let ceiling = backoff_ceiling(collisions);
                let delay = rand::thread_rng().gen_range(Duration::ZERO..=ceiling);
                warn!(
                    "Entry number collision in group {} (attempt {}), retrying in {} ms",
                    group,
                    collisions,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }
            Ok(value) => {
                if collisions > 0 {
                    debug!(
                        "Assigned entry number in group {} after {} collisions",
                        group, collisions
                    );
                }
                return Ok(value);
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn group() -> EntryGroup {
        EntryGroup {
            project: "alpha".to_string(),
            document_type: DocumentType::DevLog,
            entry_date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
        }
    }

    #[test]
    fn test_next_entry_number() {
        assert_eq!(next_entry_number(None), 1);
        assert_eq!(next_entry_number(Some(1)), 2);
        assert_eq!(next_entry_number(Some(41)), 42);
    }

    #[test]
    fn test_group_display() {
        assert_eq!(group().to_string(), "alpha/dev_log/2025-06-01");
    }

    #[test]
    fn test_backoff_doubles_up_to_cap() {
        assert_eq!(backoff_ceiling(1), Duration::from_millis(10));
        assert_eq!(backoff_ceiling(2), Duration::from_millis(20));
        assert_eq!(backoff_ceiling(4), Duration::from_millis(80));
        assert_eq!(backoff_ceiling(7), Duration::from_millis(640));
        assert_eq!(backoff_ceiling(8), MAX_BACKOFF);
        assert_eq!(backoff_ceiling(u32::MAX), MAX_BACKOFF);
    }

    #[tokio::test]
    async fn test_retry_returns_first_success() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = assign_with_retry(&group(), move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, Error>(7)
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_does_not_retry_other_errors() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<i64> = assign_with_retry(&group(), move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(Error::Internal("boom".to_string()))
        })
        .await;

        assert!(matches!(result, Err(Error::Internal(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
