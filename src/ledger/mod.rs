//! The unit of work that keeps `scan_entry` and `daily_summary` in lock-step.
//!
//! Every mutation writes the ledger row and the matching aggregate delta in
//! one transaction; a failure in either rolls back both.

#[cfg(test)]
pub mod memory;

use async_trait::async_trait;
use sqlx::PgPool;
use time::Date;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::AppError;
use crate::scans::{
    self,
    filter::{Page, ScanFilter},
    repo_types::{NewScanEntry, ScanEntry},
};
use crate::summaries::{
    self,
    repo_types::{DailySummary, SummaryDelta},
};

#[async_trait]
pub trait Ledger: Send + Sync {
    /// Persists `entry` with a fresh id and credits its day.
    async fn append(&self, entry: NewScanEntry) -> Result<ScanEntry, AppError>;

    /// Deletes an entry owned by `user_id` and debits its day. Not idempotent:
    /// a second call for the same id fails with `NotFound`.
    async fn remove(&self, id: Uuid, user_id: Uuid) -> Result<ScanEntry, AppError>;

    async fn get(&self, id: Uuid, user_id: Uuid) -> Result<ScanEntry, AppError>;

    async fn list(
        &self,
        user_id: Uuid,
        filter: &ScanFilter,
        page: Page,
    ) -> Result<Vec<ScanEntry>, AppError>;

    /// Stored totals, or zeros when the day has no row. Never writes.
    async fn summary(&self, user_id: Uuid, date: Date) -> Result<DailySummary, AppError>;

    /// Recomputes the day from the ledger and overwrites the stored totals.
    async fn rebuild_summary(&self, user_id: Uuid, date: Date) -> Result<DailySummary, AppError>;

    async fn ping(&self) -> Result<(), AppError>;
}

#[derive(Clone)]
pub struct PgLedger {
    db: PgPool,
}

impl PgLedger {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Ledger for PgLedger {
    #[instrument(skip(self, entry), fields(user_id = %entry.user_id, date = %entry.scan_date))]
    async fn append(&self, entry: NewScanEntry) -> Result<ScanEntry, AppError> {
        let id = Uuid::new_v4();
        let mut tx = self.db.begin().await?;
        let scan = scans::repo::insert_scan_tx(&mut tx, id, &entry).await?;
        let summary = summaries::repo::upsert_tx(
            &mut tx,
            scan.user_id,
            scan.scan_date,
            SummaryDelta::credit(scan.nutrients()),
        )
        .await?;
        tx.commit().await?;

        info!(scan_id = %scan.id, meal_count = summary.meal_count, "scan appended");
        Ok(scan)
    }

    #[instrument(skip(self))]
    async fn remove(&self, id: Uuid, user_id: Uuid) -> Result<ScanEntry, AppError> {
        let mut tx = self.db.begin().await?;
        // dropping `tx` on the early return rolls back
        let scan = scans::repo::delete_scan_tx(&mut tx, id, user_id)
            .await?
            .ok_or(AppError::NotFound("scan"))?;
        let summary = summaries::repo::upsert_tx(
            &mut tx,
            user_id,
            scan.scan_date,
            SummaryDelta::debit(scan.nutrients()),
        )
        .await?;
        tx.commit().await?;

        info!(date = %scan.scan_date, meal_count = summary.meal_count, "scan removed");
        Ok(scan)
    }

    async fn get(&self, id: Uuid, user_id: Uuid) -> Result<ScanEntry, AppError> {
        scans::repo::find_scan(&self.db, id, user_id)
            .await?
            .ok_or(AppError::NotFound("scan"))
    }

    async fn list(
        &self,
        user_id: Uuid,
        filter: &ScanFilter,
        page: Page,
    ) -> Result<Vec<ScanEntry>, AppError> {
        scans::repo::list_by_user(&self.db, user_id, filter, page).await
    }

    async fn summary(&self, user_id: Uuid, date: Date) -> Result<DailySummary, AppError> {
        Ok(summaries::repo::read(&self.db, user_id, date)
            .await?
            .unwrap_or_default())
    }

    #[instrument(skip(self))]
    async fn rebuild_summary(&self, user_id: Uuid, date: Date) -> Result<DailySummary, AppError> {
        let mut tx = self.db.begin().await?;
        let summary = summaries::repo::rebuild_tx(&mut tx, user_id, date).await?;
        tx.commit().await?;
        info!(meal_count = summary.meal_count, "summary rebuilt from ledger");
        Ok(summary)
    }

    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.db).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use rand::{rngs::StdRng, Rng, SeedableRng};
    use time::macros::{date, time};

    use super::memory::MemoryLedger;
    use super::*;
    use crate::nutrients::Nutrients;
    use crate::scans::repo_types::MealType;

    fn entry(user_id: Uuid, scan_date: Date, meal_type: MealType, n: Nutrients) -> NewScanEntry {
        NewScanEntry {
            user_id,
            food_id: None,
            food_name: format!("{meal_type} plate"),
            meal_type: Some(meal_type),
            portion_amount: None,
            portion_unit: "g".into(),
            nutrients: n,
            image_ref: None,
            scan_date,
            scan_time: time!(08:00),
            ai_confidence: None,
        }
    }

    async fn assert_invariant(ledger: &MemoryLedger, user_id: Uuid, d: Date) {
        let filter = ScanFilter { date: Some(d), meal_type: None };
        let rows = ledger
            .list(user_id, &filter, Page { limit: 200, offset: 0 })
            .await
            .unwrap();
        let expected = DailySummary::from_entries(&rows);
        let stored = ledger.summary(user_id, d).await.unwrap();
        assert_eq!(stored, expected, "summary drifted from ledger for {user_id} on {d}");
    }

    #[tokio::test]
    async fn breakfast_and_lunch_scenario() {
        let ledger = MemoryLedger::default();
        let user = Uuid::new_v4();
        let day = date!(2026 - 01 - 25);

        let breakfast = ledger
            .append(entry(user, day, MealType::Breakfast, Nutrients::new(450.0, 25.0, 35.0, 18.0, 0.0)))
            .await
            .unwrap();
        ledger
            .append(entry(user, day, MealType::Lunch, Nutrients::new(680.0, 42.0, 28.0, 35.0, 0.0)))
            .await
            .unwrap();

        let s = ledger.summary(user, day).await.unwrap();
        assert_eq!(s, DailySummary::from_totals(Nutrients::new(1130.0, 67.0, 63.0, 53.0, 0.0), 2));

        ledger.remove(breakfast.id, user).await.unwrap();
        let s = ledger.summary(user, day).await.unwrap();
        assert_eq!(s, DailySummary::from_totals(Nutrients::new(680.0, 42.0, 28.0, 35.0, 0.0), 1));
    }

    #[tokio::test]
    async fn summary_of_idle_day_is_zero_and_not_stored() {
        let ledger = MemoryLedger::default();
        let user = Uuid::new_v4();
        let day = date!(2026 - 03 - 01);

        let first = ledger.summary(user, day).await.unwrap();
        let second = ledger.summary(user, day).await.unwrap();
        assert_eq!(first, DailySummary::default());
        assert_eq!(first, second);
        assert_eq!(ledger.stored_summaries().await, 0);
    }

    #[tokio::test]
    async fn append_then_remove_restores_previous_summary() {
        let ledger = MemoryLedger::default();
        let user = Uuid::new_v4();
        let day = date!(2026 - 01 - 25);
        ledger
            .append(entry(user, day, MealType::Dinner, Nutrients::new(512.5, 30.25, 40.0, 12.75, 6.0)))
            .await
            .unwrap();
        let before = ledger.summary(user, day).await.unwrap();

        let e = ledger
            .append(entry(user, day, MealType::Snack, Nutrients::new(95.5, 0.5, 25.0, 0.25, 4.0)))
            .await
            .unwrap();
        ledger.remove(e.id, user).await.unwrap();

        assert_eq!(ledger.summary(user, day).await.unwrap(), before);
    }

    #[tokio::test]
    async fn other_user_cannot_remove_entry() {
        let ledger = MemoryLedger::default();
        let owner = Uuid::new_v4();
        let intruder = Uuid::new_v4();
        let day = date!(2026 - 01 - 25);
        let e = ledger
            .append(entry(owner, day, MealType::Lunch, Nutrients::new(300.0, 10.0, 10.0, 10.0, 1.0)))
            .await
            .unwrap();

        let err = ledger.remove(e.id, intruder).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound("scan")));

        assert_eq!(ledger.get(e.id, owner).await.unwrap(), e);
        assert_eq!(ledger.summary(owner, day).await.unwrap().meal_count, 1);
        assert_eq!(ledger.summary(intruder, day).await.unwrap(), DailySummary::default());
    }

    #[tokio::test]
    async fn second_delete_of_same_id_is_not_found() {
        let ledger = Arc::new(MemoryLedger::default());
        let user = Uuid::new_v4();
        let day = date!(2026 - 01 - 25);
        let e = ledger
            .append(entry(user, day, MealType::Lunch, Nutrients::new(300.0, 10.0, 10.0, 10.0, 1.0)))
            .await
            .unwrap();

        let (a, b) = tokio::join!(
            { let l = ledger.clone(); async move { l.remove(e.id, user).await } },
            { let l = ledger.clone(); async move { l.remove(e.id, user).await } },
        );
        assert_eq!([a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(), 1);
        assert!(matches!(a.err().or(b.err()), Some(AppError::NotFound(_))));
        assert_eq!(ledger.summary(user, day).await.unwrap(), DailySummary::default());
    }

    #[tokio::test]
    async fn concurrent_appends_accumulate() {
        const N: usize = 64;
        let ledger = Arc::new(MemoryLedger::default());
        let user = Uuid::new_v4();
        let day = date!(2026 - 01 - 25);

        let mut handles = Vec::with_capacity(N);
        for _ in 0..N {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move {
                ledger
                    .append(entry(user, day, MealType::Snack, Nutrients::new(10.0, 0.0, 0.0, 0.0, 0.0)))
                    .await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }

        let s = ledger.summary(user, day).await.unwrap();
        assert_eq!(s.total_calories, 10.0 * N as f64);
        assert_eq!(s.meal_count, N as i32);
    }

    #[tokio::test]
    async fn failed_summary_write_leaves_no_ledger_row() {
        let ledger = MemoryLedger::default();
        let user = Uuid::new_v4();
        let day = date!(2026 - 01 - 25);

        ledger.fail_summary_writes(true).await;
        let err = ledger
            .append(entry(user, day, MealType::Lunch, Nutrients::new(300.0, 10.0, 10.0, 10.0, 1.0)))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Storage(_)));

        let rows = ledger.list(user, &ScanFilter::default(), Page::default()).await.unwrap();
        assert!(rows.is_empty());
        assert_eq!(ledger.summary(user, day).await.unwrap(), DailySummary::default());
    }

    #[tokio::test]
    async fn random_appends_and_removes_keep_invariant() {
        let ledger = MemoryLedger::default();
        let mut rng = StdRng::seed_from_u64(0x5ca9);
        let users = [Uuid::new_v4(), Uuid::new_v4()];
        let days = [date!(2026 - 01 - 24), date!(2026 - 01 - 25), date!(2026 - 01 - 26)];
        let meals = [MealType::Breakfast, MealType::Lunch, MealType::Dinner, MealType::Snack];
        let mut live: HashMap<Uuid, Uuid> = HashMap::new(); // scan id -> owner

        for _ in 0..400 {
            if live.is_empty() || rng.gen_bool(0.6) {
                let user = users[rng.gen_range(0..users.len())];
                let n = Nutrients::new(
                    rng.gen_range(0..900) as f64,
                    rng.gen_range(0..60) as f64,
                    rng.gen_range(0..120) as f64,
                    rng.gen_range(0..50) as f64,
                    rng.gen_range(0..15) as f64,
                );
                let e = entry(
                    user,
                    days[rng.gen_range(0..days.len())],
                    meals[rng.gen_range(0..meals.len())],
                    n,
                );
                let scan = ledger.append(e).await.unwrap();
                live.insert(scan.id, user);
            } else {
                let id = *live.keys().nth(rng.gen_range(0..live.len())).unwrap();
                let owner = live.remove(&id).unwrap();
                ledger.remove(id, owner).await.unwrap();
            }
        }

        for user in users {
            for d in days {
                assert_invariant(&ledger, user, d).await;
            }
        }
    }

    #[tokio::test]
    async fn rebuild_repairs_a_corrupted_summary() {
        let ledger = MemoryLedger::default();
        let user = Uuid::new_v4();
        let day = date!(2026 - 01 - 25);
        ledger
            .append(entry(user, day, MealType::Lunch, Nutrients::new(300.0, 10.0, 10.0, 10.0, 1.0)))
            .await
            .unwrap();
        ledger.corrupt_summary(user, day, DailySummary::default()).await;

        let rebuilt = ledger.rebuild_summary(user, day).await.unwrap();
        assert_eq!(rebuilt.total_calories, 300.0);
        assert_eq!(rebuilt.meal_count, 1);
        assert_invariant(&ledger, user, day).await;
    }

    #[tokio::test]
    async fn list_is_newest_first_and_paginates() {
        let ledger = MemoryLedger::default();
        let user = Uuid::new_v4();
        let n = Nutrients::new(100.0, 1.0, 1.0, 1.0, 0.0);
        let mut e1 = entry(user, date!(2026 - 01 - 24), MealType::Dinner, n);
        e1.scan_time = time!(19:00);
        let mut e2 = entry(user, date!(2026 - 01 - 25), MealType::Breakfast, n);
        e2.scan_time = time!(07:30);
        let mut e3 = entry(user, date!(2026 - 01 - 25), MealType::Lunch, n);
        e3.scan_time = time!(12:45);
        for e in [e1, e2, e3] {
            ledger.append(e).await.unwrap();
        }

        let all = ledger.list(user, &ScanFilter::default(), Page::default()).await.unwrap();
        let order: Vec<_> = all.iter().map(|e| e.meal_type.unwrap()).collect();
        assert_eq!(order, [MealType::Lunch, MealType::Breakfast, MealType::Dinner]);

        let second = ledger
            .list(user, &ScanFilter::default(), Page { limit: 1, offset: 1 })
            .await
            .unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].meal_type, Some(MealType::Breakfast));

        let lunches = ledger
            .list(
                user,
                &ScanFilter { date: None, meal_type: Some(MealType::Lunch) },
                Page::default(),
            )
            .await
            .unwrap();
        assert_eq!(lunches.len(), 1);
    }
}
