//! Mapping between the Arrow schema of a Parquet file and runtime column types.

use arrow::datatypes::{DataType, Schema};

use crate::error::{ReaderError, Result};
use crate::table::ColumnType;

/// Description of one top-level field of the file
#[derive(Debug, Clone, PartialEq)]
pub struct FieldInfo {
    pub name: String,
    pub data_type: DataType,
    /// `None` when the Arrow type cannot be materialized
    pub column_type: Option<ColumnType>,
    pub nullable: bool,
}

/// Ordered top-level fields of a Parquet file
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TableSchema {
    fields: Vec<FieldInfo>,
}

/// Which columns a read should materialize
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ColumnSelection {
    #[default]
    All,
    Names(Vec<String>),
    Indices(Vec<usize>),
}

impl ColumnSelection {
    pub fn names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ColumnSelection::Names(names.into_iter().map(Into::into).collect())
    }
}

/// Map an Arrow type to the runtime column type it is materialized as
pub fn column_type_for(data_type: &DataType) -> Option<ColumnType> {
    match data_type {
        DataType::Boolean => Some(ColumnType::Boolean),
        DataType::Int8 => Some(ColumnType::Int8),
        DataType::Int16 => Some(ColumnType::Int16),
        DataType::Int32 => Some(ColumnType::Int32),
        DataType::Int64 => Some(ColumnType::Int64),
        DataType::UInt8 => Some(ColumnType::UInt8),
        DataType::UInt16 => Some(ColumnType::UInt16),
        DataType::UInt32 => Some(ColumnType::UInt32),
        DataType::UInt64 => Some(ColumnType::UInt64),
        DataType::Float32 => Some(ColumnType::Float32),
        DataType::Float64 => Some(ColumnType::Float64),
        DataType::Date32 => Some(ColumnType::Date32),
        DataType::Date64 | DataType::Timestamp(_, _) => Some(ColumnType::Timestamp),
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View => Some(ColumnType::Utf8),
        DataType::Binary
        | DataType::LargeBinary
        | DataType::BinaryView
        | DataType::FixedSizeBinary(_) => Some(ColumnType::Binary),
        DataType::Dictionary(_, value_type) => match column_type_for(value_type) {
            Some(ColumnType::Utf8) => Some(ColumnType::Utf8),
            Some(ColumnType::Binary) => Some(ColumnType::Binary),
            _ => None,
        },
        _ => None,
    }
}

impl TableSchema {
    pub fn from_arrow(schema: &Schema) -> Self {
        let fields = schema
            .fields()
            .iter()
            .map(|field| FieldInfo {
                name: field.name().clone(),
                data_type: field.data_type().clone(),
                column_type: column_type_for(field.data_type()),
                nullable: field.is_nullable(),
            })
            .collect();
        Self { fields }
    }

    pub fn fields(&self) -> &[FieldInfo] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field(&self, index: usize) -> Option<&FieldInfo> {
        self.fields.get(index)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Resolve a selection to field indices in the requested order
    ///
    /// Every resolved field must be materializable and appear only once.
    pub fn resolve(&self, selection: &ColumnSelection) -> Result<Vec<usize>> {
        let indices: Vec<usize> = match selection {
            ColumnSelection::All => (0..self.fields.len()).collect(),
            ColumnSelection::Names(names) => names
                .iter()
                .map(|name| {
                    self.index_of(name).ok_or_else(|| {
                        ReaderError::SchemaMismatch(format!("column '{}' not found in file", name))
                    })
                })
                .collect::<Result<_>>()?,
            ColumnSelection::Indices(indices) => {
                if let Some(&bad) = indices.iter().find(|&&i| i >= self.fields.len()) {
                    return Err(ReaderError::SchemaMismatch(format!(
                        "column index {} out of range for {} columns",
                        bad,
                        self.fields.len()
                    )));
                }
                indices.clone()
            }
        };

        for (pos, &index) in indices.iter().enumerate() {
            let field = &self.fields[index];
            if indices[..pos].contains(&index) {
                return Err(ReaderError::SchemaMismatch(format!(
                    "column '{}' selected more than once",
                    field.name
                )));
            }
            if field.column_type.is_none() {
                return Err(ReaderError::SchemaMismatch(format!(
                    "column '{}' has unsupported type {}",
                    field.name, field.data_type
                )));
            }
        }

        Ok(indices)
    }
}
