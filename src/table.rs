//! Column Table: the runtime-facing result of a read.
//!
//! Every column is a contiguous typed buffer plus an optional packed validity
//! bitmap (LSB first, bit set means the value is present). String and binary
//! columns use 64-bit offsets into one contiguous byte buffer.

use std::fmt;

use crate::error::{ReaderError, Result};

/// Element type of a materialized column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Boolean,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    /// Days since 1970-01-01
    Date32,
    /// Nanoseconds since the Unix epoch, UTC
    Timestamp,
    Utf8,
    Binary,
}

impl ColumnType {
    pub const ALL: [ColumnType; 15] = [
        ColumnType::Boolean,
        ColumnType::Int8,
        ColumnType::Int16,
        ColumnType::Int32,
        ColumnType::Int64,
        ColumnType::UInt8,
        ColumnType::UInt16,
        ColumnType::UInt32,
        ColumnType::UInt64,
        ColumnType::Float32,
        ColumnType::Float64,
        ColumnType::Date32,
        ColumnType::Timestamp,
        ColumnType::Utf8,
        ColumnType::Binary,
    ];

    /// Stable code shared with the C ABI
    pub fn code(self) -> i32 {
        match self {
            ColumnType::Boolean => 0,
            ColumnType::Int8 => 1,
            ColumnType::Int16 => 2,
            ColumnType::Int32 => 3,
            ColumnType::Int64 => 4,
            ColumnType::UInt8 => 5,
            ColumnType::UInt16 => 6,
            ColumnType::UInt32 => 7,
            ColumnType::UInt64 => 8,
            ColumnType::Float32 => 9,
            ColumnType::Float64 => 10,
            ColumnType::Date32 => 11,
            ColumnType::Timestamp => 12,
            ColumnType::Utf8 => 13,
            ColumnType::Binary => 14,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.code() == code)
    }

    /// Width in bytes of one element, `None` for variable-width types
    pub fn byte_width(self) -> Option<usize> {
        match self {
            ColumnType::Boolean | ColumnType::Int8 | ColumnType::UInt8 => Some(1),
            ColumnType::Int16 | ColumnType::UInt16 => Some(2),
            ColumnType::Int32 | ColumnType::UInt32 | ColumnType::Float32 | ColumnType::Date32 => {
                Some(4)
            }
            ColumnType::Int64
            | ColumnType::UInt64
            | ColumnType::Float64
            | ColumnType::Timestamp => Some(8),
            ColumnType::Utf8 | ColumnType::Binary => None,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::Boolean => "bool",
            ColumnType::Int8 => "int8",
            ColumnType::Int16 => "int16",
            ColumnType::Int32 => "int32",
            ColumnType::Int64 => "int64",
            ColumnType::UInt8 => "uint8",
            ColumnType::UInt16 => "uint16",
            ColumnType::UInt32 => "uint32",
            ColumnType::UInt64 => "uint64",
            ColumnType::Float32 => "float32",
            ColumnType::Float64 => "float64",
            ColumnType::Date32 => "date32",
            ColumnType::Timestamp => "timestamp[ns]",
            ColumnType::Utf8 => "string",
            ColumnType::Binary => "binary",
        };
        f.write_str(name)
    }
}

/// Typed column buffers
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Boolean(Vec<bool>),
    Int8(Vec<i8>),
    Int16(Vec<i16>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    UInt8(Vec<u8>),
    UInt16(Vec<u16>),
    UInt32(Vec<u32>),
    UInt64(Vec<u64>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
    Date32(Vec<i32>),
    Timestamp(Vec<i64>),
    Utf8 { offsets: Vec<i64>, data: Vec<u8> },
    Binary { offsets: Vec<i64>, data: Vec<u8> },
}

impl ColumnData {
    /// Empty buffers for `column_type`, reserving room for `capacity` rows
    pub fn with_capacity(column_type: ColumnType, capacity: usize) -> Self {
        match column_type {
            ColumnType::Boolean => ColumnData::Boolean(Vec::with_capacity(capacity)),
            ColumnType::Int8 => ColumnData::Int8(Vec::with_capacity(capacity)),
            ColumnType::Int16 => ColumnData::Int16(Vec::with_capacity(capacity)),
            ColumnType::Int32 => ColumnData::Int32(Vec::with_capacity(capacity)),
            ColumnType::Int64 => ColumnData::Int64(Vec::with_capacity(capacity)),
            ColumnType::UInt8 => ColumnData::UInt8(Vec::with_capacity(capacity)),
            ColumnType::UInt16 => ColumnData::UInt16(Vec::with_capacity(capacity)),
            ColumnType::UInt32 => ColumnData::UInt32(Vec::with_capacity(capacity)),
            ColumnType::UInt64 => ColumnData::UInt64(Vec::with_capacity(capacity)),
            ColumnType::Float32 => ColumnData::Float32(Vec::with_capacity(capacity)),
            ColumnType::Float64 => ColumnData::Float64(Vec::with_capacity(capacity)),
            ColumnType::Date32 => ColumnData::Date32(Vec::with_capacity(capacity)),
            ColumnType::Timestamp => ColumnData::Timestamp(Vec::with_capacity(capacity)),
            ColumnType::Utf8 => {
                let mut offsets = Vec::with_capacity(capacity + 1);
                offsets.push(0);
                ColumnData::Utf8 {
                    offsets,
                    data: Vec::new(),
                }
            }
            ColumnType::Binary => {
                let mut offsets = Vec::with_capacity(capacity + 1);
                offsets.push(0);
                ColumnData::Binary {
                    offsets,
                    data: Vec::new(),
                }
            }
        }
    }

    pub fn column_type(&self) -> ColumnType {
        match self {
            ColumnData::Boolean(_) => ColumnType::Boolean,
            ColumnData::Int8(_) => ColumnType::Int8,
            ColumnData::Int16(_) => ColumnType::Int16,
            ColumnData::Int32(_) => ColumnType::Int32,
            ColumnData::Int64(_) => ColumnType::Int64,
            ColumnData::UInt8(_) => ColumnType::UInt8,
            ColumnData::UInt16(_) => ColumnType::UInt16,
            ColumnData::UInt32(_) => ColumnType::UInt32,
            ColumnData::UInt64(_) => ColumnType::UInt64,
            ColumnData::Float32(_) => ColumnType::Float32,
            ColumnData::Float64(_) => ColumnType::Float64,
            ColumnData::Date32(_) => ColumnType::Date32,
            ColumnData::Timestamp(_) => ColumnType::Timestamp,
            ColumnData::Utf8 { .. } => ColumnType::Utf8,
            ColumnData::Binary { .. } => ColumnType::Binary,
        }
    }

    /// Number of rows held
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Boolean(v) => v.len(),
            ColumnData::Int8(v) => v.len(),
            ColumnData::Int16(v) => v.len(),
            ColumnData::Int32(v) | ColumnData::Date32(v) => v.len(),
            ColumnData::Int64(v) | ColumnData::Timestamp(v) => v.len(),
            ColumnData::UInt8(v) => v.len(),
            ColumnData::UInt16(v) => v.len(),
            ColumnData::UInt32(v) => v.len(),
            ColumnData::UInt64(v) => v.len(),
            ColumnData::Float32(v) => v.len(),
            ColumnData::Float64(v) => v.len(),
            ColumnData::Utf8 { offsets, .. } | ColumnData::Binary { offsets, .. } => {
                offsets.len().saturating_sub(1)
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw bytes of a fixed-width buffer, `None` for string and binary columns
    pub fn as_bytes(&self) -> Option<&[u8]> {
        fn bytes_of<T>(values: &[T]) -> &[u8] {
            // SAFETY: every element type used here is a plain integer, float or
            // bool with no padding, so viewing it as bytes is sound.
            unsafe {
                std::slice::from_raw_parts(
                    values.as_ptr().cast::<u8>(),
                    std::mem::size_of_val(values),
                )
            }
        }

        match self {
            ColumnData::Boolean(v) => Some(bytes_of(v)),
            ColumnData::Int8(v) => Some(bytes_of(v)),
            ColumnData::Int16(v) => Some(bytes_of(v)),
            ColumnData::Int32(v) | ColumnData::Date32(v) => Some(bytes_of(v)),
            ColumnData::Int64(v) | ColumnData::Timestamp(v) => Some(bytes_of(v)),
            ColumnData::UInt8(v) => Some(v.as_slice()),
            ColumnData::UInt16(v) => Some(bytes_of(v)),
            ColumnData::UInt32(v) => Some(bytes_of(v)),
            ColumnData::UInt64(v) => Some(bytes_of(v)),
            ColumnData::Float32(v) => Some(bytes_of(v)),
            ColumnData::Float64(v) => Some(bytes_of(v)),
            ColumnData::Utf8 { .. } | ColumnData::Binary { .. } => None,
        }
    }

    /// Offsets and bytes of a string or binary column
    pub fn as_var_width(&self) -> Option<(&[i64], &[u8])> {
        match self {
            ColumnData::Utf8 { offsets, data } | ColumnData::Binary { offsets, data } => {
                Some((offsets, data))
            }
            _ => None,
        }
    }
}

/// Packed validity bitmap, LSB first, a set bit marks a present value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validity {
    bits: Vec<u8>,
    len: usize,
}

impl Validity {
    /// Wrap packed bits covering `len` rows
    pub fn from_packed(mut bits: Vec<u8>, len: usize) -> Self {
        bits.resize(len.div_ceil(8), 0);
        Self { bits, len }
    }

    pub fn from_bools(valid: &[bool]) -> Self {
        let mut bits = vec![0u8; valid.len().div_ceil(8)];
        for (i, _) in valid.iter().enumerate().filter(|(_, v)| **v) {
            bits[i / 8] |= 1 << (i % 8);
        }
        Self {
            bits,
            len: valid.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_valid(&self, index: usize) -> bool {
        index < self.len && self.bits[index / 8] & (1 << (index % 8)) != 0
    }

    pub fn null_count(&self) -> usize {
        (0..self.len).filter(|&i| !self.is_valid(i)).count()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bits
    }
}

/// A named, typed column
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    name: String,
    data: ColumnData,
    validity: Option<Validity>,
}

/// Offsets must start at 0, never decrease and end at the data length
fn check_offsets(name: &str, offsets: &[i64], data_len: usize) -> Result<()> {
    let problem = match (offsets.first(), offsets.last()) {
        (Some(0), Some(&last)) => {
            if let Some(i) = offsets.windows(2).position(|w| w[1] < w[0]) {
                Some(format!("offset {} decreases", i + 1))
            } else if u64::try_from(last).ok() != Some(data_len as u64) {
                Some(format!(
                    "offsets end at {}, data holds {} bytes",
                    last, data_len
                ))
            } else {
                None
            }
        }
        _ => Some("offsets must start at 0".to_string()),
    };

    match problem {
        Some(problem) => Err(ReaderError::SchemaMismatch(format!(
            "column '{}': {}",
            name, problem
        ))),
        None => Ok(()),
    }
}

impl Column {
    /// Create a column; a validity bitmap must cover exactly the data rows
    pub fn try_new(
        name: impl Into<String>,
        data: ColumnData,
        validity: Option<Validity>,
    ) -> Result<Self> {
        let name = name.into();
        if let Some((offsets, bytes)) = data.as_var_width() {
            check_offsets(&name, offsets, bytes.len())?;
        }
        if let Some(ref v) = validity
            && v.len() != data.len()
        {
            return Err(ReaderError::SchemaMismatch(format!(
                "column '{}' has {} values but a validity bitmap of {} rows",
                name,
                data.len(),
                v.len()
            )));
        }

        // A bitmap without nulls carries no information
        let validity = validity.filter(|v| v.null_count() > 0);
        Ok(Self {
            name,
            data,
            validity,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn column_type(&self) -> ColumnType {
        self.data.column_type()
    }

    pub fn data(&self) -> &ColumnData {
        &self.data
    }

    pub fn validity(&self) -> Option<&Validity> {
        self.validity.as_ref()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn null_count(&self) -> usize {
        self.validity.as_ref().map_or(0, Validity::null_count)
    }

    pub fn is_null(&self, index: usize) -> bool {
        self.validity.as_ref().is_some_and(|v| !v.is_valid(index))
    }

    pub fn into_parts(self) -> (String, ColumnData, Option<Validity>) {
        (self.name, self.data, self.validity)
    }

    /// Human-readable rendering of one value, used by the CLI preview
    pub fn display_value(&self, index: usize) -> String {
        if index >= self.len() {
            return String::new();
        }
        if self.is_null(index) {
            return "null".to_string();
        }

        match &self.data {
            ColumnData::Boolean(v) => v[index].to_string(),
            ColumnData::Int8(v) => v[index].to_string(),
            ColumnData::Int16(v) => v[index].to_string(),
            ColumnData::Int32(v) => v[index].to_string(),
            ColumnData::Int64(v) => v[index].to_string(),
            ColumnData::UInt8(v) => v[index].to_string(),
            ColumnData::UInt16(v) => v[index].to_string(),
            ColumnData::UInt32(v) => v[index].to_string(),
            ColumnData::UInt64(v) => v[index].to_string(),
            ColumnData::Float32(v) => v[index].to_string(),
            ColumnData::Float64(v) => v[index].to_string(),
            ColumnData::Date32(v) => chrono::NaiveDate::from_ymd_opt(1970, 1, 1)
                .and_then(|epoch| {
                    epoch.checked_add_signed(chrono::Duration::days(v[index] as i64))
                })
                .map_or_else(|| v[index].to_string(), |d| d.format("%Y-%m-%d").to_string()),
            ColumnData::Timestamp(v) => chrono::DateTime::from_timestamp_nanos(v[index])
                .format("%Y-%m-%d %H:%M:%S%.f")
                .to_string(),
            ColumnData::Utf8 { offsets, data } => {
                let (start, end) = (offsets[index] as usize, offsets[index + 1] as usize);
                String::from_utf8_lossy(&data[start..end]).into_owned()
            }
            ColumnData::Binary { offsets, data } => {
                let (start, end) = (offsets[index] as usize, offsets[index + 1] as usize);
                hex::encode(&data[start..end])
            }
        }
    }
}

/// Named, typed columns of equal row count
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ColumnTable {
    columns: Vec<Column>,
    num_rows: usize,
}

impl ColumnTable {
    /// Assemble a table, enforcing equal row counts and unique names
    pub fn try_new(columns: Vec<Column>) -> Result<Self> {
        let num_rows = columns.first().map_or(0, Column::len);

        for (i, column) in columns.iter().enumerate() {
            if column.len() != num_rows {
                return Err(ReaderError::SchemaMismatch(format!(
                    "column '{}' has {} rows, expected {}",
                    column.name(),
                    column.len(),
                    num_rows
                )));
            }
            if columns[..i].iter().any(|c| c.name() == column.name()) {
                return Err(ReaderError::SchemaMismatch(format!(
                    "duplicate column '{}'",
                    column.name()
                )));
            }
        }

        Ok(Self { columns, num_rows })
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    pub fn column_by_name(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name() == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(Column::name).collect()
    }

    pub fn into_columns(self) -> Vec<Column> {
        self.columns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_type_codes_round_trip() {
        for column_type in ColumnType::ALL {
            assert_eq!(ColumnType::from_code(column_type.code()), Some(column_type));
        }
        assert_eq!(ColumnType::from_code(99), None);
    }

    #[test]
    fn test_byte_width() {
        assert_eq!(ColumnType::Boolean.byte_width(), Some(1));
        assert_eq!(ColumnType::Float32.byte_width(), Some(4));
        assert_eq!(ColumnType::Timestamp.byte_width(), Some(8));
        assert_eq!(ColumnType::Utf8.byte_width(), None);
    }

    #[test]
    fn test_validity_bits() {
        let validity = Validity::from_bools(&[true, false, true, true, false, true, true, true, false]);
        assert_eq!(validity.len(), 9);
        assert_eq!(validity.as_bytes(), &[0b1110_1101, 0b0000_0000]);
        assert!(validity.is_valid(0));
        assert!(!validity.is_valid(1));
        assert!(!validity.is_valid(8));
        assert!(!validity.is_valid(100));
        assert_eq!(validity.null_count(), 3);
    }

    #[test]
    fn test_column_drops_all_valid_bitmap() {
        let column = Column::try_new(
            "a",
            ColumnData::Int32(vec![1, 2]),
            Some(Validity::from_bools(&[true, true])),
        )
        .unwrap();
        assert!(column.validity().is_none());
        assert_eq!(column.null_count(), 0);
    }

    #[test]
    fn test_column_rejects_bitmap_length_mismatch() {
        let result = Column::try_new(
            "a",
            ColumnData::Int32(vec![1, 2, 3]),
            Some(Validity::from_bools(&[true, false])),
        );
        assert!(matches!(result, Err(ReaderError::SchemaMismatch(_))));
    }

    #[test]
    fn test_column_rejects_malformed_offsets() {
        let utf8 = |offsets: Vec<i64>, data: &[u8]| {
            Column::try_new(
                "s",
                ColumnData::Utf8 {
                    offsets,
                    data: data.to_vec(),
                },
                None,
            )
        };

        assert!(utf8(vec![0, 2, 4], b"abcd").is_ok());
        assert!(utf8(vec![0], b"").is_ok());

        let err = utf8(Vec::new(), b"").unwrap_err();
        assert!(err.to_string().contains("start at 0"));
        let err = utf8(vec![1, 4], b"abcd").unwrap_err();
        assert!(err.to_string().contains("start at 0"));
        let err = utf8(vec![0, 3, 2, 4], b"abcd").unwrap_err();
        assert!(err.to_string().contains("offset 2 decreases"));
        let err = utf8(vec![0, 2, 9], b"abcd").unwrap_err();
        assert!(err.to_string().contains("end at 9"));
        let err = utf8(vec![0, 2, -1], b"abcd").unwrap_err();
        assert!(matches!(err, ReaderError::SchemaMismatch(_)));

        let binary = Column::try_new(
            "b",
            ColumnData::Binary {
                offsets: vec![0, 1],
                data: vec![1, 2],
            },
            None,
        );
        assert!(binary.is_err());
    }

    #[test]
    fn test_table_requires_equal_row_counts() {
        let a = Column::try_new("a", ColumnData::Int64(vec![1, 2, 3]), None).unwrap();
        let b = Column::try_new("b", ColumnData::Float64(vec![1.0, 2.0]), None).unwrap();
        let err = ColumnTable::try_new(vec![a, b]).unwrap_err();
        assert!(err.to_string().contains("'b' has 2 rows"));
    }

    #[test]
    fn test_table_rejects_duplicate_names() {
        let a = Column::try_new("a", ColumnData::Int8(vec![1]), None).unwrap();
        let b = Column::try_new("a", ColumnData::Int8(vec![2]), None).unwrap();
        assert!(ColumnTable::try_new(vec![a, b]).is_err());
    }

    #[test]
    fn test_table_accessors() {
        let names = ColumnData::Utf8 {
            offsets: vec![0, 5, 5, 8],
            data: b"Alicebob".to_vec(),
        };
        let table = ColumnTable::try_new(vec![
            Column::try_new("id", ColumnData::UInt32(vec![7, 8, 9]), None).unwrap(),
            Column::try_new(
                "name",
                names,
                Some(Validity::from_bools(&[true, false, true])),
            )
            .unwrap(),
        ])
        .unwrap();

        assert_eq!(table.num_rows(), 3);
        assert_eq!(table.num_columns(), 2);
        assert_eq!(table.column_names(), vec!["id", "name"]);

        let name = table.column_by_name("name").unwrap();
        assert_eq!(name.column_type(), ColumnType::Utf8);
        assert_eq!(name.display_value(0), "Alice");
        assert_eq!(name.display_value(1), "null");
        assert_eq!(name.display_value(2), "bob");
        assert_eq!(table.column(0).unwrap().display_value(2), "9");
    }

    #[test]
    fn test_display_temporal_values() {
        let dates = Column::try_new("d", ColumnData::Date32(vec![0, 18993]), None).unwrap();
        assert_eq!(dates.display_value(0), "1970-01-01");
        assert_eq!(dates.display_value(1), "2022-01-01");

        let ts = Column::try_new(
            "t",
            ColumnData::Timestamp(vec![1_500_000_000_000_000_000]),
            None,
        )
        .unwrap();
        assert_eq!(ts.display_value(0), "2017-07-14 02:40:00");
    }

    #[test]
    fn test_fixed_width_bytes() {
        let data = ColumnData::Int16(vec![1, -1]);
        assert_eq!(data.as_bytes().unwrap().len(), 4);
        assert!(ColumnData::with_capacity(ColumnType::Binary, 4).as_bytes().is_none());
        assert_eq!(ColumnData::with_capacity(ColumnType::Utf8, 4).len(), 0);
    }

    #[test]
    fn test_empty_table() {
        let table = ColumnTable::try_new(Vec::new()).unwrap();
        assert_eq!(table.num_rows(), 0);
        assert_eq!(table.num_columns(), 0);
    }
}
