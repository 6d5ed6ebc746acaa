use std::collections::HashMap;

use async_trait::async_trait;
use time::Date;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::Ledger;
use crate::error::AppError;
use crate::scans::{
    filter::{Page, ScanFilter},
    repo_types::{NewScanEntry, ScanEntry},
};
use crate::summaries::repo_types::{DailySummary, SummaryDelta};

/// In-process ledger with the same contract as `PgLedger`.
///
/// One mutex stands in for the transaction: both writes are staged, then
/// published together, so a failed aggregate step leaves nothing behind.
#[derive(Default)]
pub struct MemoryLedger {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    scans: Vec<ScanEntry>,
    summaries: HashMap<(Uuid, Date), DailySummary>,
    fail_summary_writes: bool,
}

impl Inner {
    fn staged_summary(
        &self,
        user_id: Uuid,
        date: Date,
        delta: SummaryDelta,
    ) -> Result<DailySummary, AppError> {
        if self.fail_summary_writes {
            return Err(AppError::Storage(sqlx::Error::Protocol(
                "injected daily_summary failure".into(),
            )));
        }
        let mut summary = self.summaries.get(&(user_id, date)).copied().unwrap_or_default();
        summary.apply(delta);
        Ok(summary)
    }
}

impl MemoryLedger {
    pub async fn fail_summary_writes(&self, on: bool) {
        self.inner.lock().await.fail_summary_writes = on;
    }

    pub async fn stored_summaries(&self) -> usize {
        self.inner.lock().await.summaries.len()
    }

    pub async fn corrupt_summary(&self, user_id: Uuid, date: Date, summary: DailySummary) {
        self.inner.lock().await.summaries.insert((user_id, date), summary);
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn append(&self, entry: NewScanEntry) -> Result<ScanEntry, AppError> {
        let mut inner = self.inner.lock().await;
        let scan = entry.into_entry(Uuid::new_v4());
        let summary =
            inner.staged_summary(scan.user_id, scan.scan_date, SummaryDelta::credit(scan.nutrients()))?;
        // give other tasks a chance to contend for the lock mid-"transaction"
        tokio::task::yield_now().await;

        inner.summaries.insert((scan.user_id, scan.scan_date), summary);
        inner.scans.push(scan.clone());
        Ok(scan)
    }

    async fn remove(&self, id: Uuid, user_id: Uuid) -> Result<ScanEntry, AppError> {
        let mut inner = self.inner.lock().await;
        let idx = inner
            .scans
            .iter()
            .position(|s| s.id == id && s.user_id == user_id)
            .ok_or(AppError::NotFound("scan"))?;
        let scan = inner.scans[idx].clone();
        let summary =
            inner.staged_summary(user_id, scan.scan_date, SummaryDelta::debit(scan.nutrients()))?;
        tokio::task::yield_now().await;

        inner.summaries.insert((user_id, scan.scan_date), summary);
        inner.scans.remove(idx);
        Ok(scan)
    }

    async fn get(&self, id: Uuid, user_id: Uuid) -> Result<ScanEntry, AppError> {
        let inner = self.inner.lock().await;
        inner
            .scans
            .iter()
            .find(|s| s.id == id && s.user_id == user_id)
            .cloned()
            .ok_or(AppError::NotFound("scan"))
    }

    async fn list(
        &self,
        user_id: Uuid,
        filter: &ScanFilter,
        page: Page,
    ) -> Result<Vec<ScanEntry>, AppError> {
        let inner = self.inner.lock().await;
        let mut rows: Vec<ScanEntry> = inner
            .scans
            .iter()
            .filter(|s| s.user_id == user_id && filter.matches(s))
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            (b.scan_date, b.scan_time, b.id).cmp(&(a.scan_date, a.scan_time, a.id))
        });
        Ok(rows
            .into_iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .collect())
    }

    async fn summary(&self, user_id: Uuid, date: Date) -> Result<DailySummary, AppError> {
        let inner = self.inner.lock().await;
        Ok(inner.summaries.get(&(user_id, date)).copied().unwrap_or_default())
    }

    async fn rebuild_summary(&self, user_id: Uuid, date: Date) -> Result<DailySummary, AppError> {
        let mut inner = self.inner.lock().await;
        let summary = DailySummary::from_entries(
            inner
                .scans
                .iter()
                .filter(|s| s.user_id == user_id && s.scan_date == date),
        );
        inner.summaries.insert((user_id, date), summary);
        Ok(summary)
    }

    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }
}
