use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use sqlx::MySqlPool;

use crate::model::semester::Semester;

/// The whole semester table sits under one key; it is tiny and read by
/// every report request.
const ALL: () = ();

#[derive(Clone)]
pub struct SemesterCache {
    inner: Cache<(), Arc<Vec<Semester>>>,
}

impl SemesterCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Cache::builder().max_capacity(1).time_to_live(ttl).build(),
        }
    }

    pub async fn get_or_load_with<F>(&self, load: F) -> Result<Arc<Vec<Semester>>, Arc<sqlx::Error>>
    where
        F: Future<Output = Result<Vec<Semester>, sqlx::Error>>,
    {
        self.inner
            .try_get_with(ALL, async { load.await.map(Arc::new) })
            .await
    }

    pub async fn get_or_load(&self, pool: &MySqlPool) -> Result<Arc<Vec<Semester>>, Arc<sqlx::Error>> {
        self.get_or_load_with(load_semesters(pool)).await
    }

    /// Drop the cached list after any semester write.
    pub async fn invalidate(&self) {
        self.inner.invalidate(&ALL).await;
    }
}

async fn load_semesters(pool: &MySqlPool) -> Result<Vec<Semester>, sqlx::Error> {
    let semesters = sqlx::query_as::<_, Semester>(
        r#"
        SELECT id, name, start_date, end_date
        FROM semesters
        ORDER BY start_date
        "#,
    )
    .fetch_all(pool)
    .await?;

    tracing::debug!(count = semesters.len(), "Semester list loaded");
    Ok(semesters)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn spring() -> Semester {
        Semester {
            id: 1,
            name: "Spring".into(),
            start_date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2025, 6, 30).unwrap(),
        }
    }

    #[actix_web::test]
    async fn loads_once_until_invalidated() {
        let cache = SemesterCache::new(Duration::from_secs(60));
        let counter = AtomicUsize::new(0);
        let loads = &counter;

        let load = move || async move {
            loads.fetch_add(1, Ordering::SeqCst);
            Ok::<_, sqlx::Error>(vec![spring()])
        };

        let first = cache.get_or_load_with(load()).await.unwrap();
        let second = cache.get_or_load_with(load()).await.unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(second[0], spring());
        assert_eq!(loads.load(Ordering::SeqCst), 1);

        cache.invalidate().await;
        cache.get_or_load_with(load()).await.unwrap();
        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }

    #[actix_web::test]
    async fn load_errors_are_not_cached() {
        let cache = SemesterCache::new(Duration::from_secs(60));

        let failed = cache
            .get_or_load_with(async { Err(sqlx::Error::PoolTimedOut) })
            .await;
        assert!(failed.is_err());

        let loaded = cache.get_or_load_with(async { Ok::<_, sqlx::Error>(vec![spring()]) }).await.unwrap();
        assert_eq!(loaded.len(), 1);
    }
}
