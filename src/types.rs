//! Core data model types for the ingest pipeline.
//!
//! A sheet is read as a sequence of [`WideRow`]s, melted into [`LongRecord`]s laid out by the
//! fixed [`ColumnSchema`], and summarized into [`IngestMetadata`].

use serde::{Deserialize, Serialize};

/// Placeholder checksum attached to the table and every variable.
///
/// The real UNF is computed by the persistence layer.
pub const UNF_NOT_CALCULATED: &str = "UNF:6:NOTCALCULATED";

/// Provisional indicator id written to every record, pending external identifier resolution.
pub const PROVISIONAL_INDICATOR_ID: &str = "1";

/// Number of output columns. Fixed regardless of how many year columns the sheet has.
pub const VAR_QUANTITY: usize = 7;

pub const COLUMN_INDICATOR: &str = "indicator";
pub const COLUMN_INDICATOR_ID: &str = "indicatortid";
pub const COLUMN_UNIT: &str = "unit";
pub const COLUMN_COUNTRY_CODE: &str = "countrycode";
pub const COLUMN_COUNTRY_ID: &str = "countrytid";
pub const COLUMN_YEAR: &str = "year";
pub const COLUMN_VALUE: &str = "value";

/// Storage type of an output variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableType {
    /// Unquoted numeric field; sentinels map to missing/`NaN`/`Inf`/`-Inf`/`0`.
    Numeric,
    /// Double-quoted text field.
    Character,
}

/// Measurement interval of an output variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableInterval {
    Continuous,
    Discrete,
}

impl VariableType {
    /// Interval class assigned to variables of this type.
    pub fn interval(self) -> VariableInterval {
        match self {
            Self::Numeric => VariableInterval::Continuous,
            Self::Character => VariableInterval::Discrete,
        }
    }
}

/// A single named, typed column in the [`ColumnSchema`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Column name.
    pub name: &'static str,
    /// Column type.
    pub var_type: VariableType,
}

impl Field {
    const fn new(name: &'static str, var_type: VariableType) -> Self {
        Self { name, var_type }
    }

    pub fn is_numeric(&self) -> bool {
        self.var_type == VariableType::Numeric
    }
}

/// The ordered output columns of a melted sheet.
///
/// There is exactly one schema: the seven columns of [`ColumnSchema::FIELDS`]. Order and count
/// are the contract of the output file and never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ColumnSchema;

impl ColumnSchema {
    pub const FIELDS: [Field; VAR_QUANTITY] = [
        Field::new(COLUMN_INDICATOR, VariableType::Character),
        Field::new(COLUMN_INDICATOR_ID, VariableType::Numeric),
        Field::new(COLUMN_UNIT, VariableType::Character),
        Field::new(COLUMN_COUNTRY_CODE, VariableType::Character),
        Field::new(COLUMN_COUNTRY_ID, VariableType::Numeric),
        Field::new(COLUMN_YEAR, VariableType::Numeric),
        Field::new(COLUMN_VALUE, VariableType::Numeric),
    ];

    pub fn fields(&self) -> &'static [Field] {
        &Self::FIELDS
    }
}

/// One data row of the sheet: a code, a display name and one slot per year column.
///
/// `values` is aligned with the year headers of the sheet; `None` marks an absent cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WideRow {
    /// The `r` attribute of the row element, when present.
    pub number: Option<u32>,
    /// Column A: the numeric region/country code.
    pub code: Option<String>,
    /// Column B: the continent/region/country display name.
    pub name: Option<String>,
    /// Columns C onward, one per year header.
    pub values: Vec<Option<String>>,
}

impl WideRow {
    /// Human readable row position for error messages.
    pub fn label(&self) -> String {
        match self.number {
            Some(n) => n.to_string(),
            None => "?".to_string(),
        }
    }
}

/// One melted output record, in [`ColumnSchema`] order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LongRecord {
    pub indicator: String,
    pub indicator_id: String,
    pub unit: String,
    pub country_code: String,
    pub country_id: String,
    pub year: String,
    pub value: String,
}

impl LongRecord {
    /// Fields in output column order.
    pub fn fields(&self) -> [&str; VAR_QUANTITY] {
        [
            &self.indicator,
            &self.indicator_id,
            &self.unit,
            &self.country_code,
            &self.country_id,
            &self.year,
            &self.value,
        ]
    }
}

/// A distinct raw value of a variable and how often it occurred.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableCategory {
    pub value: String,
    pub frequency: u64,
}

/// Metadata for one output column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataVariable {
    pub name: String,
    pub label: String,
    /// Zero-based position in the output file.
    pub file_order: usize,
    pub var_type: VariableType,
    pub interval: VariableInterval,
    /// Distinct raw values in first-seen order.
    pub categories: Vec<VariableCategory>,
    pub unf: String,
}

/// Result metadata of one ingest call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestMetadata {
    /// Always [`VAR_QUANTITY`].
    pub var_quantity: usize,
    /// Number of records written to the data file.
    pub case_quantity: u64,
    pub unf: String,
    pub variables: Vec<DataVariable>,
}

impl IngestMetadata {
    /// Look up a variable by name.
    pub fn variable(&self, name: &str) -> Option<&DataVariable> {
        self.variables.iter().find(|v| v.name == name)
    }

    /// Iterate variable names in file order.
    pub fn variable_names(&self) -> impl Iterator<Item = &str> {
        self.variables.iter().map(|v| v.name.as_str())
    }
}
