//! Category expansion and cleaning.
//!
//! Each raw row carries one packed field such as
//! `related-1;request-0;offer-0;...`. The [`LabelEncoder`] splits it into
//! `name-value` pairs, derives the [`CategorySpec`] from the first row, checks
//! every later row against it, and normalizes the values into a binary
//! [`LabelVector`]. Cleaning then drops exact duplicates.

use std::collections::HashSet;

use crate::dataset::loader::RawTable;
use crate::dataset::{CategorySpec, Genre, LabelVector, LabeledDataset, LabeledRow, Message};
use crate::error::{ReliefError, Result};

/// Separator between `name-value` pairs.
pub const PAIR_DELIMITER: char = ';';

/// Separator between a category name and its value; the last one in a pair wins.
pub const VALUE_DELIMITER: char = '-';

/// One parsed `name-value` pair, before normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryPair {
    pub name: String,
    pub value: i64,
}

/// Expands packed category strings into label vectors.
#[derive(Debug, Clone, Copy, Default)]
pub struct LabelEncoder;

impl LabelEncoder {
    pub fn new() -> Self {
        LabelEncoder
    }

    /// Split a packed category string into its pairs.
    ///
    /// # Examples
    ///
    /// ```
    /// use relief::dataset::labels::LabelEncoder;
    ///
    /// let pairs = LabelEncoder::new().parse_categories("related-2;aid-related-0").unwrap();
    /// assert_eq!(pairs[0].name, "related");
    /// assert_eq!(pairs[0].value, 2);
    /// assert_eq!(pairs[1].name, "aid-related");
    /// ```
    pub fn parse_categories(&self, packed: &str) -> Result<Vec<CategoryPair>> {
        packed
            .split(PAIR_DELIMITER)
            .map(|pair| {
                let pair = pair.trim();
                let (name, value) = pair.rsplit_once(VALUE_DELIMITER).ok_or_else(|| {
                    ReliefError::parse(format!("category pair '{pair}' has no '{VALUE_DELIMITER}'"))
                })?;
                let value = value.trim().parse::<i64>().map_err(|_| {
                    ReliefError::parse(format!(
                        "category '{name}' has non-numeric value '{value}'"
                    ))
                })?;
                Ok(CategoryPair {
                    name: name.trim().to_string(),
                    value,
                })
            })
            .collect()
    }

    /// Derive the category spec from one packed string.
    pub fn derive_spec(&self, packed: &str) -> Result<CategorySpec> {
        let pairs = self.parse_categories(packed)?;
        CategorySpec::new(pairs.into_iter().map(|p| p.name))
    }

    /// Expand every row of the raw table into a labeled row.
    ///
    /// Category names come from the first row and are checked on every row.
    /// Values of 2 are mapped to 1; the number of remapped cells is logged.
    pub fn encode(&self, table: &RawTable) -> Result<LabeledDataset> {
        let first = table
            .rows()
            .first()
            .ok_or_else(|| ReliefError::schema_mismatch("raw table has no rows to derive categories from"))?;
        let first_categories = first.categories.as_deref().ok_or_else(|| {
            ReliefError::missing_key(format!("message {} has no categories", first.id))
        })?;
        let spec = self.derive_spec(first_categories)?;
        log::info!("Derived {} categories from the first row", spec.len());

        let mut remapped = 0usize;
        let mut rows = Vec::with_capacity(table.len());
        for (index, raw) in table.rows().iter().enumerate() {
            let packed = raw.categories.as_deref().ok_or_else(|| {
                ReliefError::missing_key(format!("message {} has no categories", raw.id))
            })?;
            let pairs = self.parse_categories(packed)?;

            let context = format!("row {index} (id {})", raw.id);
            let names: Vec<&str> = pairs.iter().map(|p| p.name.as_str()).collect();
            spec.check_names(&names, &context)?;

            let mut values = Vec::with_capacity(pairs.len());
            for pair in &pairs {
                let value = LabelVector::normalize_value(pair.value)
                    .map_err(|e| ReliefError::parse(format!("{context}: {e}")))?;
                if pair.value == 2 {
                    remapped += 1;
                }
                values.push(value);
            }

            let genre: Genre = raw
                .genre
                .parse()
                .map_err(|e| ReliefError::parse(format!("{context}: {e}")))?;

            rows.push(LabeledRow {
                message: Message {
                    id: raw.id,
                    text: raw.message.clone(),
                    original: raw.original.clone(),
                    genre,
                },
                labels: LabelVector::new(values)?,
            });
        }

        if remapped > 0 {
            log::warn!("Remapped {remapped} category values of 2 to 1");
        }

        LabeledDataset::new(spec, rows)
    }

    /// Drop exact duplicates on (message text, genre, labels), keeping the first.
    ///
    /// Cleaning an already clean dataset returns it unchanged.
    pub fn clean(&self, dataset: LabeledDataset) -> Result<LabeledDataset> {
        let spec = dataset.spec().clone();
        let before = dataset.len();

        let mut seen: HashSet<(String, Genre, LabelVector)> = HashSet::with_capacity(before);
        let rows: Vec<LabeledRow> = dataset
            .into_rows()
            .into_iter()
            .filter(|row| {
                seen.insert((
                    row.message.text.clone(),
                    row.message.genre,
                    row.labels.clone(),
                ))
            })
            .collect();

        let dropped = before - rows.len();
        if dropped > 0 {
            log::info!("Dropped {dropped} duplicate rows");
        }

        LabeledDataset::new(spec, rows)
    }

    /// Encode then clean.
    pub fn process(&self, table: &RawTable) -> Result<LabeledDataset> {
        let dataset = self.encode(table)?;
        self.clean(dataset)
    }
}
