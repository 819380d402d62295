//! In-process implementation of the URL repository.

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;
use std::collections::BTreeMap;

use crate::domain::entities::{NewUrlRecord, UrlRecord};
use crate::domain::repositories::UrlRepository;
use crate::error::AppError;

#[derive(Default)]
struct Table {
    next_id: i64,
    rows: BTreeMap<i64, UrlRecord>,
}

/// A [`UrlRepository`] held in memory.
///
/// Enforces the same unique constraint on `short_code` as the SQL schema and
/// applies every mutation under one lock, which gives it the row-level
/// atomicity the coordinators expect from PostgreSQL.
#[derive(Default)]
pub struct MemoryUrlRepository {
    table: Mutex<Table>,
}

impl MemoryUrlRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a record by id regardless of owner.
    pub fn find(&self, record_id: i64) -> Option<UrlRecord> {
        self.table.lock().rows.get(&record_id).cloned()
    }

    /// Returns the record holding `short_code`, if any.
    pub fn find_by_code(&self, short_code: &str) -> Option<UrlRecord> {
        self.table
            .lock()
            .rows
            .values()
            .find(|r| r.short_code == short_code)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.table.lock().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn owned_filtered(
        table: &Table,
        user_id: i64,
        is_active: Option<bool>,
    ) -> impl Iterator<Item = &UrlRecord> {
        table
            .rows
            .values()
            .filter(move |r| r.user_id == user_id && is_active.is_none_or(|a| r.is_active == a))
    }
}

#[async_trait]
impl UrlRepository for MemoryUrlRepository {
    async fn insert(&self, new_record: NewUrlRecord) -> Result<UrlRecord, AppError> {
        let mut table = self.table.lock();
        if table
            .rows
            .values()
            .any(|r| r.short_code == new_record.short_code)
        {
            return Err(AppError::DuplicateShortCode {
                code: new_record.short_code,
            });
        }

        table.next_id += 1;
        let record = UrlRecord::new(
            table.next_id,
            new_record.user_id,
            new_record.original_url,
            new_record.short_code,
            new_record.expires_at,
            new_record.is_active,
            Utc::now(),
        );
        table.rows.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update_active_state(
        &self,
        user_id: Option<i64>,
        record_id: i64,
        is_active: bool,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<u64, AppError> {
        let mut table = self.table.lock();
        match table.rows.get_mut(&record_id) {
            Some(record) if user_id.is_none_or(|owner| record.user_id == owner) => {
                record.is_active = is_active;
                if let Some(at) = expires_at {
                    record.expires_at = at;
                }
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn delete(&self, user_id: i64, record_id: i64) -> Result<(), AppError> {
        let mut table = self.table.lock();
        if table
            .rows
            .get(&record_id)
            .is_some_and(|r| r.user_id == user_id)
        {
            table.rows.remove(&record_id);
        }
        Ok(())
    }

    async fn get_by_owner_and_id(
        &self,
        user_id: i64,
        record_id: i64,
    ) -> Result<Option<UrlRecord>, AppError> {
        Ok(self
            .table
            .lock()
            .rows
            .get(&record_id)
            .filter(|r| r.user_id == user_id)
            .cloned())
    }

    async fn exists_by_id(&self, record_id: i64) -> Result<bool, AppError> {
        Ok(self.table.lock().rows.contains_key(&record_id))
    }

    async fn extend_expiry(
        &self,
        user_id: i64,
        record_id: i64,
        hours: i32,
    ) -> Result<u64, AppError> {
        let mut table = self.table.lock();
        match table.rows.get_mut(&record_id) {
            Some(record) if record.user_id == user_id => {
                record.expires_at += TimeDelta::hours(i64::from(hours));
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn mark_expired_by_code(&self, short_code: &str) -> Result<u64, AppError> {
        let mut table = self.table.lock();
        let now = Utc::now();
        let mut affected = 0;
        for record in table
            .rows
            .values_mut()
            .filter(|r| r.short_code == short_code && r.is_active)
        {
            record.is_active = false;
            record.expires_at = now;
            affected += 1;
        }
        Ok(affected)
    }

    async fn list_by_owner(
        &self,
        user_id: i64,
        offset: i64,
        limit: i64,
        is_active: Option<bool>,
    ) -> Result<Vec<UrlRecord>, AppError> {
        let table = self.table.lock();
        let mut records: Vec<UrlRecord> = Self::owned_filtered(&table, user_id, is_active)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        Ok(records
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn count_by_owner(&self, user_id: i64, is_active: Option<bool>) -> Result<i64, AppError> {
        let table = self.table.lock();
        Ok(Self::owned_filtered(&table, user_id, is_active).count() as i64)
    }

    async fn health_check(&self) -> bool {
        true
    }
}
