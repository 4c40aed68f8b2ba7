//! Generic JSON-backed collection
//!
//! Every entity collection is held in memory behind a `RwLock` and persisted
//! as a JSON array in its own file. Uniqueness checks run under the write
//! lock so two concurrent requests cannot both pass them.
//!
//! Saves are serialized per collection and snapshot the map after taking the
//! save lock, so the last save to finish always writes the newest state.

use std::collections::HashMap;
use std::hash::Hash;
use std::path::PathBuf;
use std::sync::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{de::DeserializeOwned, Serialize};

use crate::error::EnvelopeError;

use super::file_io::{read_json, write_json_atomic};

/// An entity stored in a `Collection`
pub trait Record: Clone + Serialize + DeserializeOwned + Send + Sync {
    type Key: Copy + Eq + Hash + Send + Sync + std::fmt::Debug;

    fn key(&self) -> Self::Key;
}

/// In-memory map of records persisted to one JSON file
pub struct Collection<T: Record> {
    path: PathBuf,
    data: RwLock<HashMap<T::Key, T>>,
    save_lock: Mutex<()>,
}

impl<T: Record> Collection<T> {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            data: RwLock::new(HashMap::new()),
            save_lock: Mutex::new(()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<T::Key, T>>, EnvelopeError> {
        self.data
            .read()
            .map_err(|e| EnvelopeError::Storage(format!("Failed to acquire read lock: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<T::Key, T>>, EnvelopeError> {
        self.data
            .write()
            .map_err(|e| EnvelopeError::Storage(format!("Failed to acquire write lock: {}", e)))
    }

    /// Load records from disk, replacing what is in memory
    pub fn load(&self) -> Result<(), EnvelopeError> {
        let records: Vec<T> = read_json(&self.path)?;

        let mut data = self.write()?;
        data.clear();
        for record in records {
            data.insert(record.key(), record);
        }

        Ok(())
    }

    /// Persist all records
    pub fn save(&self) -> Result<(), EnvelopeError> {
        let _saving = self
            .save_lock
            .lock()
            .map_err(|e| EnvelopeError::Storage(format!("Failed to acquire save lock: {}", e)))?;
        let data = self.read()?;
        let records: Vec<&T> = data.values().collect();
        write_json_atomic(&self.path, &records)
    }

    pub fn get(&self, key: T::Key) -> Result<Option<T>, EnvelopeError> {
        Ok(self.read()?.get(&key).cloned())
    }

    pub fn exists(&self, key: T::Key) -> Result<bool, EnvelopeError> {
        Ok(self.read()?.contains_key(&key))
    }

    /// All records matching a predicate
    pub fn filter<F>(&self, predicate: F) -> Result<Vec<T>, EnvelopeError>
    where
        F: Fn(&T) -> bool,
    {
        Ok(self
            .read()?
            .values()
            .filter(|r| predicate(r))
            .cloned()
            .collect())
    }

    /// First record matching a predicate
    pub fn find<F>(&self, predicate: F) -> Result<Option<T>, EnvelopeError>
    where
        F: Fn(&T) -> bool,
    {
        Ok(self.read()?.values().find(|r| predicate(r)).cloned())
    }

    pub fn any<F>(&self, predicate: F) -> Result<bool, EnvelopeError>
    where
        F: Fn(&T) -> bool,
    {
        Ok(self.read()?.values().any(|r| predicate(r)))
    }

    pub fn count_where<F>(&self, predicate: F) -> Result<usize, EnvelopeError>
    where
        F: Fn(&T) -> bool,
    {
        Ok(self.read()?.values().filter(|r| predicate(r)).count())
    }

    pub fn count(&self) -> Result<usize, EnvelopeError> {
        Ok(self.read()?.len())
    }

    /// Insert or replace a record
    pub fn upsert(&self, record: T) -> Result<(), EnvelopeError> {
        self.write()?.insert(record.key(), record);
        Ok(())
    }

    /// Insert or replace several records under one lock
    pub fn upsert_many(&self, records: impl IntoIterator<Item = T>) -> Result<(), EnvelopeError> {
        let mut data = self.write()?;
        for record in records {
            data.insert(record.key(), record);
        }
        Ok(())
    }

    /// Insert a record only if its key is not taken; returns whether it was inserted
    pub fn insert_new(&self, record: T) -> Result<bool, EnvelopeError> {
        let mut data = self.write()?;
        let key = record.key();
        if data.contains_key(&key) {
            return Ok(false);
        }
        data.insert(key, record);
        Ok(true)
    }

    /// Insert a record unless another record conflicts with it
    ///
    /// `conflicts` is checked against every other record while holding the
    /// write lock. Returns the conflicting record on failure.
    pub fn insert_unique<F>(&self, record: T, conflicts: F) -> Result<Result<(), T>, EnvelopeError>
    where
        F: Fn(&T, &T) -> bool,
    {
        let mut data = self.write()?;
        let key = record.key();
        if let Some(existing) = data
            .values()
            .find(|other| other.key() != key && conflicts(other, &record))
        {
            return Ok(Err(existing.clone()));
        }
        data.insert(key, record);
        Ok(Ok(()))
    }

    /// Apply a change to one record and return the updated copy
    pub fn update<F>(&self, key: T::Key, change: F) -> Result<Option<T>, EnvelopeError>
    where
        F: FnOnce(&mut T),
    {
        let mut data = self.write()?;
        Ok(data.get_mut(&key).map(|record| {
            change(record);
            record.clone()
        }))
    }

    /// Apply a change to every matching record; returns how many matched
    pub fn update_where<P, F>(&self, predicate: P, mut change: F) -> Result<usize, EnvelopeError>
    where
        P: Fn(&T) -> bool,
        F: FnMut(&mut T),
    {
        let mut data = self.write()?;
        let mut changed = 0;
        for record in data.values_mut().filter(|r| predicate(r)) {
            change(record);
            changed += 1;
        }
        Ok(changed)
    }

    /// Remove a record, returning it if it existed
    pub fn delete(&self, key: T::Key) -> Result<Option<T>, EnvelopeError> {
        Ok(self.write()?.remove(&key))
    }

    /// Remove every matching record, returning the removed records
    pub fn delete_where<F>(&self, predicate: F) -> Result<Vec<T>, EnvelopeError>
    where
        F: Fn(&T) -> bool,
    {
        let mut data = self.write()?;
        let keys: Vec<T::Key> = data
            .values()
            .filter(|r| predicate(r))
            .map(|r| r.key())
            .collect();
        Ok(keys.into_iter().filter_map(|k| data.remove(&k)).collect())
    }
}
