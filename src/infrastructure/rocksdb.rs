use crate::domain::payment::{Amount, NewPayment, PaymentId, PaymentRecord, PaymentStatus};
use crate::domain::phone::PhoneNumber;
use crate::domain::ports::{PaymentStore, RatingInsert, RatingStore, Transition};
use crate::domain::rating::{NewRating, Rating};
use crate::error::{LipaError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, DB, Direction, IteratorMode, Options, WriteBatch,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Column Family for payment records, keyed by insertion sequence.
pub const CF_PAYMENTS: &str = "payments";
/// Column Family mapping payment ids to their insertion sequence.
pub const CF_PAYMENT_IDS: &str = "payment_ids";
/// Column Family for ratings, keyed by (payer, subject) then insertion sequence.
pub const CF_RATINGS: &str = "ratings";

/// A persistent store implementation using RocksDB.
///
/// Payments are keyed by a big-endian insertion sequence so a reverse
/// iteration yields the newest record first. Ratings are grouped under a
/// (payer, subject) prefix, so the window check reads only that pair. All writes go through
/// `write_lock`, which also holds the next sequence number; this is what makes
/// `resolve` a compare-and-set and the rating window check atomic.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    write_lock: Arc<Mutex<u64>>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures the payment, index and rating column families exist and resumes
    /// the sequence after the highest one already stored.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = [CF_PAYMENTS, CF_PAYMENT_IDS, CF_RATINGS]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect::<Vec<_>>();

        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;

        let mut next = 0;
        let payments = column_family(&db, CF_PAYMENTS)?;
        if let Some(item) = db.iterator_cf(payments, IteratorMode::End).next() {
            let (key, _) = item?;
            next = decode_seq(&key)? + 1;
        }
        // Rating keys sort by pair first, so every key has to be looked at.
        let ratings = column_family(&db, CF_RATINGS)?;
        for item in db.iterator_cf(ratings, IteratorMode::Start) {
            let (key, _) = item?;
            next = next.max(decode_seq(&key[key.len().saturating_sub(8)..])? + 1);
        }

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(next)),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        column_family(&self.db, name)
    }

    fn seq_of(&self, id: PaymentId) -> Result<Option<Vec<u8>>> {
        let ids = self.cf(CF_PAYMENT_IDS)?;
        Ok(self.db.get_cf(ids, id.0.as_bytes())?)
    }

    fn load_payment(&self, seq: &[u8]) -> Result<Option<PaymentRecord>> {
        let payments = self.cf(CF_PAYMENTS)?;
        self.db
            .get_cf(payments, seq)?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    /// The record and its id index, committed together or not at all.
    fn insert_batch(&self, seq: u64, record: &PaymentRecord) -> Result<WriteBatch> {
        let key = seq.to_be_bytes();
        let mut batch = WriteBatch::default();
        batch.put_cf(self.cf(CF_PAYMENTS)?, key, encode(record)?);
        batch.put_cf(self.cf(CF_PAYMENT_IDS)?, record.id.0.as_bytes(), key);
        Ok(batch)
    }

    /// Walks payments newest first, stopping at the first record `keep` accepts.
    fn find_latest<F>(&self, keep: F) -> Result<Option<PaymentRecord>>
    where
        F: Fn(&PaymentRecord) -> bool,
    {
        let payments = self.cf(CF_PAYMENTS)?;
        for item in self.db.iterator_cf(payments, IteratorMode::End) {
            let (_key, value) = item?;
            let record: PaymentRecord = decode(&value)?;
            if keep(&record) {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    /// Ratings stored under one (payer, subject) prefix.
    fn ratings_for_pair(&self, prefix: &[u8]) -> Result<Vec<Rating>> {
        let ratings = self.cf(CF_RATINGS)?;
        let mut found = Vec::new();
        for item in self
            .db
            .iterator_cf(ratings, IteratorMode::From(prefix, Direction::Forward))
        {
            let (key, value) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            found.push(decode(&value)?);
        }
        Ok(found)
    }

    fn scan<T: DeserializeOwned>(&self, name: &str) -> Result<Vec<T>> {
        let cf = self.cf(name)?;
        self.db
            .iterator_cf(cf, IteratorMode::Start)
            .map(|item| {
                let (_key, value) = item?;
                decode(&value)
            })
            .collect()
    }
}

fn column_family<'a>(db: &'a DB, name: &str) -> Result<&'a ColumnFamily> {
    db.cf_handle(name)
        .ok_or_else(|| LipaError::StoreError(format!("{} column family not found", name)))
}

fn decode_seq(key: &[u8]) -> Result<u64> {
    let bytes: [u8; 8] = key
        .try_into()
        .map_err(|_| LipaError::StoreError("Corrupt sequence key".to_string()))?;
    Ok(u64::from_be_bytes(bytes))
}

/// Length-prefixed (payer, subject), so `("1", "XY")` never shares a prefix
/// with `("1", "X")`.
fn rating_prefix(payer_id: &str, subject_id: &str) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(8 + payer_id.len() + subject_id.len());
    for part in [payer_id, subject_id] {
        prefix.extend_from_slice(&(part.len() as u32).to_be_bytes());
        prefix.extend_from_slice(part.as_bytes());
    }
    prefix
}

fn rating_key(prefix: &[u8], seq: u64) -> Vec<u8> {
    let mut key = prefix.to_vec();
    key.extend_from_slice(&seq.to_be_bytes());
    key
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value)
        .map_err(|e| LipaError::StoreError(format!("Serialization error: {}", e)))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes)
        .map_err(|e| LipaError::StoreError(format!("Deserialization error: {}", e)))
}

#[async_trait]
impl PaymentStore for RocksDBStore {
    async fn insert(&self, payment: NewPayment) -> Result<PaymentRecord> {
        let record = PaymentRecord::pending(PaymentId::generate(), payment);

        let mut next = self.write_lock.lock().await;
        let batch = self.insert_batch(*next, &record)?;
        self.db.write(batch)?;
        *next += 1;

        Ok(record)
    }

    async fn get(&self, id: PaymentId) -> Result<Option<PaymentRecord>> {
        match self.seq_of(id)? {
            Some(seq) => self.load_payment(&seq),
            None => Ok(None),
        }
    }

    async fn latest_matching(
        &self,
        phone: &PhoneNumber,
        amount: Amount,
        pending_only: bool,
    ) -> Result<Option<PaymentRecord>> {
        self.find_latest(|p| {
            (!pending_only || p.status == PaymentStatus::Pending) && p.matches(phone, amount)
        })
    }

    async fn resolve(
        &self,
        id: PaymentId,
        outcome: PaymentStatus,
        at: DateTime<Utc>,
        notice_id: Option<&str>,
    ) -> Result<Transition> {
        let _guard = self.write_lock.lock().await;

        let Some(seq) = self.seq_of(id)? else {
            return Ok(Transition::Missing);
        };
        let Some(mut record) = self.load_payment(&seq)? else {
            return Ok(Transition::Missing);
        };

        if let Some(notice_id) = notice_id {
            let settled = self.find_latest(|p| {
                p.matches(&record.phone, record.amount) && p.settled_by(notice_id)
            })?;
            if let Some(settled) = settled {
                return Ok(Transition::Duplicate(settled));
            }
        }

        if !record.resolve(outcome, at) {
            return Ok(Transition::Stale(record));
        }
        record.resolved_by = notice_id.map(str::to_string);

        self.db.put_cf(self.cf(CF_PAYMENTS)?, &seq, encode(&record)?)?;
        Ok(Transition::Applied(record))
    }

    async fn has_succeeded(&self, payer_id: &str, subject_id: &str) -> Result<bool> {
        let found = self.find_latest(|p| {
            p.payer_id == payer_id
                && p.subject_id == subject_id
                && p.status == PaymentStatus::Succeeded
        })?;
        Ok(found.is_some())
    }

    async fn all(&self) -> Result<Vec<PaymentRecord>> {
        self.scan(CF_PAYMENTS)
    }
}

#[async_trait]
impl RatingStore for RocksDBStore {
    async fn insert_unless_recent(
        &self,
        rating: NewRating,
        since: DateTime<Utc>,
    ) -> Result<RatingInsert> {
        let mut next = self.write_lock.lock().await;

        let prefix = rating_prefix(&rating.payer_id, &rating.subject_id);
        if let Some(blocking) = self
            .ratings_for_pair(&prefix)?
            .into_iter()
            .find(|r| r.blocks(&rating.payer_id, &rating.subject_id, since))
        {
            return Ok(RatingInsert::Duplicate(blocking));
        }

        let rating = Rating::from(rating);
        self.db.put_cf(
            self.cf(CF_RATINGS)?,
            rating_key(&prefix, *next),
            encode(&rating)?,
        )?;
        *next += 1;

        Ok(RatingInsert::Inserted(rating))
    }

    async fn for_subject(&self, subject_id: &str) -> Result<Vec<Rating>> {
        let mut found: Vec<Rating> = self
            .scan::<Rating>(CF_RATINGS)?
            .into_iter()
            .filter(|r| r.subject_id == subject_id)
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }
}
