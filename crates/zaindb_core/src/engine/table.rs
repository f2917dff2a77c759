//! In-memory tables and their secondary indexes.

use crate::engine::cursor::CursorEntry;
use crate::error::{CoreError, CoreResult};
use crate::journal::JournalOp;
use crate::key::{Key, KeyLookup, KeyPath};
use crate::range::KeyRange;
use ciborium::Value;
use std::collections::btree_map::Range;
use std::collections::{BTreeMap, BTreeSet};

/// Generated keys stop at the largest exactly representable integer.
const MAX_GENERATED_KEY: i64 = 9_007_199_254_740_992;

/// One table: records ordered by primary key, plus its indexes.
#[derive(Debug, Clone)]
pub(crate) struct Table {
    key_path: KeyPath,
    auto_increment: bool,
    next_key: i64,
    records: BTreeMap<Key, Value>,
    indexes: BTreeMap<String, Index>,
}

/// Index key to the primary keys of every record carrying it.
#[derive(Debug, Clone)]
struct Index {
    key_path: KeyPath,
    entries: BTreeMap<Key, BTreeSet<Key>>,
}

impl Index {
    fn insert(&mut self, primary_key: &Key, value: &Value) {
        // records without a valid index key are simply not indexed
        if let Some(key) = self.key_path.evaluate(value) {
            self.entries
                .entry(key)
                .or_default()
                .insert(primary_key.clone());
        }
    }

    fn remove(&mut self, primary_key: &Key, value: &Value) {
        let Some(key) = self.key_path.evaluate(value) else {
            return;
        };
        if let Some(keys) = self.entries.get_mut(&key) {
            keys.remove(primary_key);
            if keys.is_empty() {
                self.entries.remove(&key);
            }
        }
    }
}

impl Table {
    pub(crate) fn new(key_path: KeyPath, auto_increment: bool) -> CoreResult<Self> {
        if auto_increment && matches!(key_path, KeyPath::Compound(_)) {
            return Err(CoreError::data(
                "a key generator cannot be used with a compound key path",
            ));
        }
        Ok(Self {
            key_path,
            auto_increment,
            next_key: 1,
            records: BTreeMap::new(),
            indexes: BTreeMap::new(),
        })
    }

    pub(crate) fn create_index(
        &mut self,
        table: &str,
        name: &str,
        key_path: KeyPath,
    ) -> CoreResult<()> {
        if self.indexes.contains_key(name) {
            return Err(CoreError::IndexExists {
                table: table.to_string(),
                name: name.to_string(),
            });
        }

        let mut index = Index {
            key_path,
            entries: BTreeMap::new(),
        };
        for (primary_key, value) in &self.records {
            index.insert(primary_key, value);
        }
        self.indexes.insert(name.to_string(), index);
        Ok(())
    }

    pub(crate) fn index_names(&self) -> Vec<String> {
        self.indexes.keys().cloned().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    /// Works out the primary key of a record about to be stored.
    ///
    /// Generated keys are written into `value` when the table has an
    /// inline key path.
    pub(crate) fn assign_key(&mut self, value: &mut Value, explicit: Option<Key>) -> CoreResult<Key> {
        if self.key_path.is_none() {
            return match explicit {
                Some(key) => Ok(key),
                None if self.auto_increment => self.generate(),
                None => Err(CoreError::data(
                    "no key given for a table with out-of-line keys",
                )),
            };
        }

        if explicit.is_some() {
            return Err(CoreError::data(
                "explicit key given for a table with an inline key path",
            ));
        }

        match self.key_path.lookup(value) {
            KeyLookup::Found(key) => Ok(key),
            KeyLookup::Invalid => Err(CoreError::data(format!(
                "value at key path '{}' is not a valid key",
                self.key_path
            ))),
            KeyLookup::Missing if self.auto_increment => {
                let key = self.generate()?;
                self.key_path.inject(value, &key)?;
                Ok(key)
            }
            KeyLookup::Missing => Err(CoreError::data(format!(
                "record has no key at '{}'",
                self.key_path
            ))),
        }
    }

    fn generate(&mut self) -> CoreResult<Key> {
        if self.next_key > MAX_GENERATED_KEY {
            return Err(CoreError::constraint("key generator exhausted"));
        }
        let key = Key::from(self.next_key);
        self.next_key += 1;
        Ok(key)
    }

    pub(crate) fn next_key(&self) -> i64 {
        self.next_key
    }

    /// Puts the generator at `next_key`, even backwards.
    pub(crate) fn restore_generator(&mut self, next_key: i64) {
        self.next_key = next_key;
    }

    /// Moves the generator past explicit numeric keys. It never moves back.
    fn observe(&mut self, key: &Key) {
        if !self.auto_increment {
            return;
        }
        if let Some(n) = key.as_number() {
            if n >= self.next_key as f64 {
                self.next_key = (n.floor() as i64).saturating_add(1);
            }
        }
    }

    /// Stores a record, replacing an existing one only when `overwrite`.
    ///
    /// Returns the record that was replaced.
    pub(crate) fn store(
        &mut self,
        key: Key,
        value: Value,
        overwrite: bool,
    ) -> CoreResult<Option<Value>> {
        match self.records.get(&key) {
            Some(_) if !overwrite => {
                return Err(CoreError::constraint(format!("key {key} already exists")));
            }
            Some(old) => {
                for index in self.indexes.values_mut() {
                    index.remove(&key, old);
                }
            }
            None => {}
        }

        self.observe(&key);
        for index in self.indexes.values_mut() {
            index.insert(&key, &value);
        }
        Ok(self.records.insert(key, value))
    }

    /// Writes a record back as it was, leaving the generator alone.
    pub(crate) fn put_back(&mut self, key: Key, value: Value) {
        self.remove(&key);
        for index in self.indexes.values_mut() {
            index.insert(&key, &value);
        }
        self.records.insert(key, value);
    }

    /// Removes a record and returns it.
    pub(crate) fn remove(&mut self, key: &Key) -> Option<Value> {
        let old = self.records.remove(key)?;
        for index in self.indexes.values_mut() {
            index.remove(key, &old);
        }
        Some(old)
    }

    /// Empties the table. The key generator keeps its position.
    pub(crate) fn clear(&mut self) {
        self.take_records();
    }

    /// Empties the table and hands back what it held.
    pub(crate) fn take_records(&mut self) -> BTreeMap<Key, Value> {
        for index in self.indexes.values_mut() {
            index.entries.clear();
        }
        std::mem::take(&mut self.records)
    }

    /// Appends the operations that recreate this table as `name`.
    pub(crate) fn snapshot(&self, name: &str, ops: &mut Vec<JournalOp>) {
        ops.push(JournalOp::CreateTable {
            name: name.to_string(),
            key_path: self.key_path.clone(),
            auto_increment: self.auto_increment,
        });
        ops.extend(self.indexes.iter().map(|(index, spec)| JournalOp::CreateIndex {
            table: name.to_string(),
            name: index.clone(),
            key_path: spec.key_path.clone(),
        }));
        ops.extend(self.records.iter().map(|(key, value)| JournalOp::Put {
            table: name.to_string(),
            key: key.clone(),
            value: value.clone(),
        }));
        if self.auto_increment {
            ops.push(JournalOp::SetGenerator {
                table: name.to_string(),
                next_key: self.next_key,
            });
        }
    }

    pub(crate) fn keys_in(&self, range: Option<&KeyRange>) -> Vec<Key> {
        select(&self.records, range)
            .into_iter()
            .flatten()
            .map(|(key, _)| key.clone())
            .collect()
    }

    pub(crate) fn scan(&self, range: Option<&KeyRange>) -> Vec<CursorEntry> {
        select(&self.records, range)
            .into_iter()
            .flatten()
            .map(|(key, value)| CursorEntry {
                key: key.clone(),
                primary_key: key.clone(),
                value: value.clone(),
            })
            .collect()
    }

    /// Scans an index in (index key, primary key) order.
    ///
    /// Returns `None` if the index does not exist.
    pub(crate) fn scan_index(&self, name: &str, range: Option<&KeyRange>) -> Option<Vec<CursorEntry>> {
        let index = self.indexes.get(name)?;
        let mut entries = Vec::new();
        for (index_key, primary_keys) in select(&index.entries, range).into_iter().flatten() {
            for primary_key in primary_keys {
                if let Some(value) = self.records.get(primary_key) {
                    entries.push(CursorEntry {
                        key: index_key.clone(),
                        primary_key: primary_key.clone(),
                        value: value.clone(),
                    });
                }
            }
        }
        Some(entries)
    }
}

fn select<'a, V>(map: &'a BTreeMap<Key, V>, range: Option<&KeyRange>) -> Option<Range<'a, Key, V>> {
    match range {
        None => Some(map.range::<Key, _>(..)),
        Some(range) => range.bounds().map(|bounds| map.range::<Key, _>(bounds)),
    }
}
