use chrono::Utc;
use redb::ReadableTable;
use serde_json::Value;

use super::db::{Database, DatabaseError};
use super::models::{key_from_value, loosely_equal, record_key, table_range, StoredRecord};
use super::tables::*;
use crate::model::Model;
use crate::validation::PresenceVerifier;

impl Database {
    // ========================================================================
    // Record operations
    // ========================================================================

    /// Insert a new record or overwrite an existing one.
    ///
    /// New records get the next id of their table and a `created_at` stamp; every save
    /// refreshes `updated_at`. Returns `false` when the record claims a key that is no
    /// longer stored.
    pub fn save<M: Model>(&self, model: &mut M) -> Result<bool, DatabaseError> {
        let now = Value::String(Utc::now().to_rfc3339());
        let write_txn = self.begin_write()?;

        let id = match model.key() {
            Some(id) => {
                let table = write_txn.open_table(RECORDS)?;
                let present = table.get(record_key(M::TABLE, id).as_str())?.is_some();
                if !present {
                    drop(table);
                    write_txn.abort()?;
                    return Ok(false);
                }
                id
            }
            None => {
                let mut sequences = write_txn.open_table(SEQUENCES)?;
                let next = sequences.get(M::TABLE)?.map(|v| v.value()).unwrap_or(0) + 1;
                sequences.insert(M::TABLE, next)?;
                model.set_attribute("created_at", now.clone());
                next
            }
        };
        model.set_attribute("updated_at", now);

        {
            let record = StoredRecord {
                id,
                attributes: model.attributes().clone(),
            };
            let data = rmp_serde::to_vec_named(&record)?;
            let mut table = write_txn.open_table(RECORDS)?;
            table.insert(record_key(M::TABLE, id).as_str(), data.as_slice())?;
        }
        write_txn.commit()?;

        model.set_key(id);
        tracing::debug!(table = M::TABLE, id, "Saved record");
        Ok(true)
    }

    /// Get a record by table and id
    pub fn find(&self, table: &str, id: u64) -> Result<Option<StoredRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let records = read_txn.open_table(RECORDS)?;

        match records.get(record_key(table, id).as_str())? {
            Some(data) => {
                let record: StoredRecord = rmp_serde::from_slice(data.value())?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Load record `id` into `blank`, or fail with [`DatabaseError::NotFound`].
    pub fn find_or_fail<M: Model>(&self, mut blank: M, id: u64) -> Result<M, DatabaseError> {
        let record = self
            .find(M::TABLE, id)?
            .ok_or_else(|| DatabaseError::NotFound {
                table: M::TABLE.to_string(),
                key: id,
            })?;

        *blank.attributes_mut() = record.attributes;
        blank.set_key(record.id);
        Ok(blank)
    }

    /// All records of a table, ordered by id
    pub fn all(&self, table: &str) -> Result<Vec<StoredRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let records = read_txn.open_table(RECORDS)?;
        let (start, end) = table_range(table);

        let mut result = Vec::new();
        for entry in records.range(start.as_str()..end.as_str())? {
            let (_, value) = entry?;
            let record: StoredRecord = rmp_serde::from_slice(value.value())?;
            result.push(record);
        }

        Ok(result)
    }

    /// Delete a record. Returns whether it existed.
    pub fn delete(&self, table: &str, id: u64) -> Result<bool, DatabaseError> {
        let write_txn = self.begin_write()?;
        let deleted = {
            let mut records = write_txn.open_table(RECORDS)?;
            let removed = records.remove(record_key(table, id).as_str())?.is_some();
            removed
        };
        write_txn.commit()?;
        Ok(deleted)
    }

    /// Count records of `table` whose `column` loosely equals `value`.
    /// The `id` column is answered from the primary key.
    pub fn count_where(
        &self,
        table: &str,
        column: &str,
        value: &Value,
    ) -> Result<u64, DatabaseError> {
        if column == "id" {
            return match key_from_value(value) {
                Some(id) => Ok(u64::from(self.find(table, id)?.is_some())),
                None => Ok(0),
            };
        }

        let count = self
            .all(table)?
            .iter()
            .filter(|record| {
                record
                    .attributes
                    .get(column)
                    .is_some_and(|stored| loosely_equal(stored, value))
            })
            .count();

        Ok(count as u64)
    }
}

impl PresenceVerifier for Database {
    fn count(&self, table: &str, column: &str, value: &Value) -> Result<u64, DatabaseError> {
        self.count_where(table, column, value)
    }
}
