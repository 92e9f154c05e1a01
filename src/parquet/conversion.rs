//! Conversion from Arrow arrays to runtime column buffers.
//!
//! Record batches arrive column by column; each selected column owns a
//! `ColumnBuilder` that appends every batch's array into one contiguous
//! typed buffer. Null slots hold a fill value (`NaN` for floats, zero,
//! `false` or an empty string otherwise) and are tracked in the validity
//! bitmap, which is dropped when the column turns out to have no nulls.

use arrow::array::*;
use arrow::compute::cast;
use arrow::datatypes::{
    ArrowPrimitiveType, DataType, Date32Type, Float32Type, Float64Type, Int8Type, Int16Type,
    Int32Type, Int64Type, TimeUnit, UInt8Type, UInt16Type, UInt32Type, UInt64Type,
};
use arrow::error::ArrowError;

use crate::error::{ReaderError, Result};
use crate::table::{Column, ColumnData, ColumnType, Validity};

/// Accumulates arrays of one column into runtime buffers
pub struct ColumnBuilder {
    name: String,
    data: ColumnData,
    validity: BooleanBufferBuilder,
}

impl ColumnBuilder {
    pub fn new(name: impl Into<String>, column_type: ColumnType, capacity: usize) -> Self {
        Self {
            name: name.into(),
            data: ColumnData::with_capacity(column_type, capacity),
            validity: BooleanBufferBuilder::new(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Append every value of `array`
    pub fn append(&mut self, array: &dyn Array) -> Result<()> {
        append_values(&mut self.data, array).map_err(|source| ReaderError::Conversion {
            column: self.name.clone(),
            source,
        })?;

        match array.logical_nulls() {
            Some(nulls) => self.validity.append_buffer(nulls.inner()),
            None => self.validity.append_n(array.len(), true),
        }
        Ok(())
    }

    pub fn finish(mut self) -> Result<Column> {
        let len = self.validity.len();
        let bits = self.validity.finish();
        let validity = Validity::from_packed(bits.values().to_vec(), len);
        Column::try_new(self.name, self.data, Some(validity))
    }
}

fn unexpected(array: &dyn Array, expected: ColumnType) -> ArrowError {
    ArrowError::CastError(format!(
        "cannot append {} values to a {} column",
        array.data_type(),
        expected
    ))
}

fn append_values(data: &mut ColumnData, array: &dyn Array) -> Result<(), ArrowError> {
    match data {
        ColumnData::Boolean(values) => {
            let arr = array
                .as_boolean_opt()
                .ok_or_else(|| unexpected(array, ColumnType::Boolean))?;
            values.extend((0..arr.len()).map(|i| arr.is_valid(i) && arr.value(i)));
        }
        ColumnData::Int8(values) => append_primitive::<Int8Type>(values, array, 0)?,
        ColumnData::Int16(values) => append_primitive::<Int16Type>(values, array, 0)?,
        ColumnData::Int32(values) => append_primitive::<Int32Type>(values, array, 0)?,
        ColumnData::Int64(values) => append_primitive::<Int64Type>(values, array, 0)?,
        ColumnData::UInt8(values) => append_primitive::<UInt8Type>(values, array, 0)?,
        ColumnData::UInt16(values) => append_primitive::<UInt16Type>(values, array, 0)?,
        ColumnData::UInt32(values) => append_primitive::<UInt32Type>(values, array, 0)?,
        ColumnData::UInt64(values) => append_primitive::<UInt64Type>(values, array, 0)?,
        ColumnData::Float32(values) => append_primitive::<Float32Type>(values, array, f32::NAN)?,
        ColumnData::Float64(values) => append_primitive::<Float64Type>(values, array, f64::NAN)?,
        ColumnData::Date32(values) => append_primitive::<Date32Type>(values, array, 0)?,
        ColumnData::Timestamp(values) => append_timestamp_nanos(values, array)?,
        ColumnData::Utf8 { offsets, data } => {
            // Views, dictionaries and 32-bit offsets are normalized by the cast kernel
            let large = cast(array, &DataType::LargeUtf8)?;
            let arr = large.as_string::<i64>();
            append_var_width(offsets, data, arr.value_offsets(), arr.values());
        }
        ColumnData::Binary { offsets, data } => {
            let large = cast(array, &DataType::LargeBinary)?;
            let arr = large.as_binary::<i64>();
            append_var_width(offsets, data, arr.value_offsets(), arr.values());
        }
    }
    Ok(())
}

/// Append a primitive array, replacing null slots with `fill`
fn append_primitive<T: ArrowPrimitiveType>(
    values: &mut Vec<T::Native>,
    array: &dyn Array,
    fill: T::Native,
) -> Result<(), ArrowError> {
    let arr = array.as_primitive_opt::<T>().ok_or_else(|| {
        ArrowError::CastError(format!(
            "expected {} array, got {}",
            T::DATA_TYPE,
            array.data_type()
        ))
    })?;

    let start = values.len();
    values.extend_from_slice(arr.values());
    if arr.null_count() > 0 {
        for (slot, i) in values[start..].iter_mut().zip(0..arr.len()) {
            if arr.is_null(i) {
                *slot = fill;
            }
        }
    }
    Ok(())
}

/// Append temporal values as nanoseconds since the epoch
fn append_timestamp_nanos(values: &mut Vec<i64>, array: &dyn Array) -> Result<(), ArrowError> {
    let (raw, factor): (ArrayRef, i64) = match array.data_type() {
        DataType::Timestamp(unit, _) => {
            let factor = match unit {
                TimeUnit::Second => 1_000_000_000,
                TimeUnit::Millisecond => 1_000_000,
                TimeUnit::Microsecond => 1_000,
                TimeUnit::Nanosecond => 1,
            };
            // Reinterpret as plain i64 regardless of unit and timezone
            (cast(array, &DataType::Int64)?, factor)
        }
        DataType::Date64 => (cast(array, &DataType::Int64)?, 1_000_000),
        other => {
            return Err(ArrowError::CastError(format!(
                "cannot read {} as timestamp",
                other
            )));
        }
    };

    let arr = raw.as_primitive::<Int64Type>();
    values.reserve(arr.len());
    for i in 0..arr.len() {
        if arr.is_null(i) {
            values.push(0);
            continue;
        }
        let nanos = arr.value(i).checked_mul(factor).ok_or_else(|| {
            ArrowError::ComputeError(format!(
                "timestamp {} overflows nanosecond range",
                arr.value(i)
            ))
        })?;
        values.push(nanos);
    }
    Ok(())
}

/// Append offsets (rebased onto the existing buffer) and the referenced bytes
fn append_var_width(
    offsets: &mut Vec<i64>,
    data: &mut Vec<u8>,
    src_offsets: &[i64],
    src_values: &[u8],
) {
    let (Some(&first), Some(&last)) = (src_offsets.first(), src_offsets.last()) else {
        return;
    };
    let base = offsets.last().copied().unwrap_or(0);
    if offsets.is_empty() {
        offsets.push(0);
    }

    offsets.extend(src_offsets[1..].iter().map(|&o| base + (o - first)));
    data.extend_from_slice(&src_values[first as usize..last as usize]);
}
