//! Table and index declarations.

use crate::error::{CoreError, CoreResult};
use crate::key::KeyPath;
use std::collections::HashSet;

/// An index over one attribute, or several attributes forming an array key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    /// Index name used by queries.
    pub name: String,
    /// Attributes the index key is built from, in order.
    pub attributes: Vec<String>,
}

impl IndexSpec {
    /// Index over a single attribute, named after it.
    pub fn single(attribute: impl Into<String>) -> Self {
        let attribute = attribute.into();
        Self {
            name: attribute.clone(),
            attributes: vec![attribute],
        }
    }

    /// Composite index over several attributes, named by joining them
    /// with commas (`"name,mail"`).
    pub fn composite<I, S>(attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let attributes: Vec<String> = attributes.into_iter().map(Into::into).collect();
        Self {
            name: attributes.join(","),
            attributes,
        }
    }

    /// Parses an index declaration.
    ///
    /// A comma-separated declaration becomes a composite index; anything
    /// else is a single-attribute index. Whitespace around parts is ignored.
    ///
    /// ```rust
    /// use zaindb_core::IndexSpec;
    ///
    /// let spec = IndexSpec::parse("name, mail");
    /// assert_eq!(spec.name, "name,mail");
    /// assert!(spec.is_composite());
    /// ```
    #[must_use]
    pub fn parse(declaration: &str) -> Self {
        let parts: Vec<&str> = declaration.split(',').map(str::trim).collect();
        if parts.len() > 1 {
            Self::composite(parts)
        } else {
            Self::single(declaration.trim())
        }
    }

    /// Returns `true` if the index spans several attributes.
    #[must_use]
    pub fn is_composite(&self) -> bool {
        self.attributes.len() > 1
    }

    /// Key path the engine evaluates for this index.
    #[must_use]
    pub fn key_path(&self) -> KeyPath {
        KeyPath::from_attributes(self.attributes.iter().cloned())
    }
}

/// Declares a table: its name, primary key and secondary indexes.
///
/// ```rust
/// use zaindb_core::SchemaDescriptor;
///
/// let schema = SchemaDescriptor::new("zainMessageStore")
///     .key_path("id")
///     .auto_increment(true)
///     .indexes_from(&["id", "name", "name,mail"]);
/// assert_eq!(schema.indexes.len(), 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaDescriptor {
    /// Table name.
    pub table_name: String,
    /// Secondary indexes.
    pub indexes: Vec<IndexSpec>,
    /// Primary key path.
    pub primary_key: KeyPath,
    /// Whether the table generates integer keys.
    pub auto_increment: bool,
}

impl SchemaDescriptor {
    /// Creates a table with out-of-line keys and no indexes.
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            indexes: Vec::new(),
            primary_key: KeyPath::None,
            auto_increment: false,
        }
    }

    /// Sets a single-attribute primary key path.
    #[must_use]
    pub fn key_path(mut self, path: impl Into<String>) -> Self {
        self.primary_key = KeyPath::Single(path.into());
        self
    }

    /// Sets a compound primary key path.
    #[must_use]
    pub fn compound_key_path<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.primary_key = KeyPath::Compound(paths.into_iter().map(Into::into).collect());
        self
    }

    /// Sets whether keys are generated.
    #[must_use]
    pub const fn auto_increment(mut self, value: bool) -> Self {
        self.auto_increment = value;
        self
    }

    /// Adds an index.
    #[must_use]
    pub fn index(mut self, index: IndexSpec) -> Self {
        self.indexes.push(index);
        self
    }

    /// Adds indexes from declarations, see [`IndexSpec::parse`].
    #[must_use]
    pub fn indexes_from(mut self, declarations: &[&str]) -> Self {
        self.indexes
            .extend(declarations.iter().map(|decl| IndexSpec::parse(decl)));
        self
    }

    /// Drops indexes whose name was already declared, keeping the first.
    ///
    /// Returns the dropped declarations.
    pub fn dedup_indexes(&mut self) -> Vec<IndexSpec> {
        let mut seen = HashSet::new();
        let mut dropped = Vec::new();
        self.indexes.retain(|index| {
            if seen.insert(index.name.clone()) {
                true
            } else {
                dropped.push(index.clone());
                false
            }
        });
        dropped
    }

    /// Checks the declaration is usable.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidArgument`] for an empty table name, an
    /// index without attributes or with an empty attribute, or two indexes
    /// sharing a name; [`CoreError::Data`] for a generator on a compound
    /// key path.
    pub fn validate(&self) -> CoreResult<()> {
        if self.table_name.trim().is_empty() {
            return Err(CoreError::invalid_argument("table name is empty"));
        }
        if self.auto_increment && matches!(self.primary_key, KeyPath::Compound(_)) {
            return Err(CoreError::data(format!(
                "table {} cannot generate keys for a compound key path",
                self.table_name
            )));
        }

        let mut seen = HashSet::new();
        for index in &self.indexes {
            if index.attributes.is_empty() || index.attributes.iter().any(|a| a.is_empty()) {
                return Err(CoreError::invalid_argument(format!(
                    "index '{}' on {} has an empty attribute",
                    index.name, self.table_name
                )));
            }
            if !seen.insert(index.name.as_str()) {
                return Err(CoreError::invalid_argument(format!(
                    "index '{}' declared twice on {}",
                    index.name, self.table_name
                )));
            }
        }
        Ok(())
    }
}
