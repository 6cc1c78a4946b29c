use anyhow::Result;
use futures_util::StreamExt;
use moka::future::Cache;
use once_cell::sync::{Lazy, OnceCell};
use sqlx::MySqlPool;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{info, warn};

use crate::model::salary_structure::SalaryStructureRow;
use crate::payroll::{RevisionHistory, SalaryRevision, revision::group_by_employee};

const DEFAULT_CAPACITY: u64 = 10_000;
const DEFAULT_TTL_SECS: u64 = 3600;

const SELECT_REVISIONS: &str = r#"
    SELECT id, employee_id, effective_date, annual_ctc, components
    FROM salary_structures
"#;

/// employee_id => every salary revision of that employee
static STRUCTURE_CACHE: OnceCell<Cache<u64, Arc<RevisionHistory>>> = OnceCell::new();

/// employee_id => invalidations so far. A load that started under an older
/// generation may hold rows from before a revision and must not stay cached.
static GENERATIONS: Lazy<Mutex<HashMap<u64, u64>>> = Lazy::new(Default::default);

fn build(capacity: u64, ttl_secs: u64) -> Cache<u64, Arc<RevisionHistory>> {
    Cache::builder()
        .max_capacity(capacity)
        .time_to_live(Duration::from_secs(ttl_secs))
        .build()
}

fn cache() -> &'static Cache<u64, Arc<RevisionHistory>> {
    STRUCTURE_CACHE.get_or_init(|| build(DEFAULT_CAPACITY, DEFAULT_TTL_SECS))
}

/// Sizes the cache. Only effective before first use.
pub fn configure(capacity: u64, ttl_secs: u64) {
    if STRUCTURE_CACHE.set(build(capacity, ttl_secs)).is_err() {
        warn!(
            capacity,
            ttl_secs, "Salary structure cache already in use, keeping its current size"
        );
    }
}

fn generations() -> MutexGuard<'static, HashMap<u64, u64>> {
    GENERATIONS.lock().unwrap_or_else(PoisonError::into_inner)
}

fn generation(employee_id: u64) -> u64 {
    generations().get(&employee_id).copied().unwrap_or(0)
}

fn bump_generation(employee_id: u64) {
    *generations().entry(employee_id).or_default() += 1;
}

pub async fn load_history(pool: &MySqlPool, employee_id: u64) -> Result<RevisionHistory, sqlx::Error> {
    let rows = sqlx::query_as::<_, SalaryStructureRow>(&format!(
        "{SELECT_REVISIONS} WHERE employee_id = ? ORDER BY effective_date"
    ))
    .bind(employee_id)
    .fetch_all(pool)
    .await?;

    Ok(RevisionHistory::new(
        employee_id,
        rows.into_iter().map(SalaryRevision::from).collect(),
    ))
}

/// Revision history of an employee, from cache or database. Employees without
/// any revision get an empty history, which is cached as well.
pub async fn history(
    pool: &MySqlPool,
    employee_id: u64,
) -> Result<Arc<RevisionHistory>, Arc<sqlx::Error>> {
    get_or_load(employee_id, || async move {
        load_history(pool, employee_id).await.map(Arc::new)
    })
    .await
}

/// Concurrent misses for one employee share a single load.
async fn get_or_load<F, Fut>(
    employee_id: u64,
    load: F,
) -> Result<Arc<RevisionHistory>, Arc<sqlx::Error>>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Arc<RevisionHistory>, sqlx::Error>>,
{
    let started = generation(employee_id);
    let history = cache().try_get_with(employee_id, load()).await?;

    if generation(employee_id) != started {
        // a revision landed while loading; the value is still returned but not kept
        cache().invalidate(&employee_id).await;
    }
    Ok(history)
}

/// Drop a cached history after a new revision was stored.
pub async fn invalidate(employee_id: u64) {
    bump_generation(employee_id);
    cache().invalidate(&employee_id).await;
}

/// Every employee's history, straight from the database.
pub async fn load_all_histories(pool: &MySqlPool) -> Result<Vec<RevisionHistory>, sqlx::Error> {
    let rows = sqlx::query_as::<_, SalaryStructureRow>(&format!(
        "{SELECT_REVISIONS} ORDER BY employee_id, effective_date"
    ))
    .fetch_all(pool)
    .await?;

    Ok(group_by_employee(
        rows.into_iter().map(SalaryRevision::from).collect(),
    ))
}

/// Caches a batch of histories read while the generations were `started`,
/// without replacing entries that are already present. Histories of employees
/// revised since then are dropped again; returns how many.
async fn batch_insert(histories: Vec<RevisionHistory>, started: &HashMap<u64, u64>) -> usize {
    let employee_ids: Vec<u64> = histories.iter().map(RevisionHistory::employee_id).collect();
    let futures: Vec<_> = histories
        .into_iter()
        .map(|h| {
            cache()
                .entry(h.employee_id())
                .or_insert_with(async move { Arc::new(h) })
        })
        .collect();

    // Await all insertions concurrently
    futures::future::join_all(futures).await;

    let stale: Vec<u64> = employee_ids
        .into_iter()
        .filter(|id| generation(*id) != started.get(id).copied().unwrap_or(0))
        .collect();
    for employee_id in &stale {
        cache().invalidate(employee_id).await;
    }
    stale.len()
}

/// Stream all revisions into the cache, `batch_size` employees at a time.
pub async fn warmup_structure_cache(pool: &MySqlPool, batch_size: usize) -> Result<()> {
    let started = generations().clone();
    let query = format!("{SELECT_REVISIONS} ORDER BY employee_id, effective_date");
    let mut stream = sqlx::query_as::<_, SalaryStructureRow>(&query).fetch(pool);

    let mut batch: Vec<RevisionHistory> = Vec::with_capacity(batch_size);
    let mut current: Vec<SalaryRevision> = Vec::new();
    let mut employees = 0usize;
    let mut dropped = 0usize;

    while let Some(row) = stream.next().await {
        let revision = SalaryRevision::from(row?);

        if let Some(last) = current.last() {
            if last.employee_id != revision.employee_id {
                let employee_id = last.employee_id;
                batch.push(RevisionHistory::new(employee_id, std::mem::take(&mut current)));
                employees += 1;
            }
        }
        current.push(revision);

        if batch.len() >= batch_size {
            dropped += batch_insert(std::mem::take(&mut batch), &started).await;
        }
    }

    if let Some(last) = current.last() {
        let employee_id = last.employee_id;
        batch.push(RevisionHistory::new(employee_id, current));
        employees += 1;
    }
    if !batch.is_empty() {
        dropped += batch_insert(batch, &started).await;
    }

    info!(employees, dropped, "Salary structure cache warmup complete");

    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::payroll::revision::tests::{date, revision};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    /// Puts a history in the cache as warmup would.
    pub(crate) async fn seed(history: RevisionHistory) {
        let started = generations().clone();
        assert_eq!(batch_insert(vec![history], &started).await, 0);
    }

    fn history_with(employee_id: u64, annual: Decimal) -> RevisionHistory {
        RevisionHistory::new(
            employee_id,
            vec![revision(1, employee_id, date(2025, 4, 1), annual)],
        )
    }

    #[actix_web::test]
    async fn load_is_cached_when_no_revision_lands() {
        let loaded = get_or_load(9101, || async {
            Ok(Arc::new(history_with(9101, dec!(1200000))))
        })
        .await
        .unwrap();

        assert_eq!(loaded.employee_id(), 9101);
        assert!(cache().get(&9101).await.is_some());
    }

    #[actix_web::test]
    async fn load_overlapping_a_revision_is_not_kept() {
        let loaded = get_or_load(9102, || async {
            let stale = history_with(9102, dec!(1200000));
            // a revision is stored while the old rows are in flight
            bump_generation(9102);
            Ok(Arc::new(stale))
        })
        .await
        .unwrap();

        assert_eq!(loaded.latest().unwrap().annual_ctc, dec!(1200000));
        assert!(cache().get(&9102).await.is_none());
    }

    #[actix_web::test]
    async fn cached_history_skips_the_loader() {
        seed(history_with(9103, dec!(900000))).await;

        let loaded = get_or_load(9103, || async { Err(sqlx::Error::PoolTimedOut) })
            .await
            .unwrap();
        assert_eq!(loaded.latest().unwrap().annual_ctc, dec!(900000));
    }

    #[actix_web::test]
    async fn warmup_never_replaces_fresher_entries() {
        seed(history_with(9104, dec!(1500000))).await;

        let started = generations().clone();
        batch_insert(vec![history_with(9104, dec!(1200000))], &started).await;

        let cached = cache().get(&9104).await.unwrap();
        assert_eq!(cached.latest().unwrap().annual_ctc, dec!(1500000));
    }

    #[actix_web::test]
    async fn warmup_drops_employees_revised_since_it_started() {
        let started = generations().clone();
        invalidate(9105).await;

        let dropped = batch_insert(
            vec![
                history_with(9105, dec!(1200000)),
                history_with(9106, dec!(800000)),
            ],
            &started,
        )
        .await;

        assert_eq!(dropped, 1);
        assert!(cache().get(&9105).await.is_none());
        assert!(cache().get(&9106).await.is_some());
    }

    #[test]
    fn configure_after_first_use_keeps_the_cache() {
        let before: *const _ = cache();
        configure(1, 1);
        assert!(std::ptr::eq(before, cache()));
    }
}
