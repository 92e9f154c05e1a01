//! C ABI exported from the shared library.
//!
//! A handle returned by `pq_open` is an opaque pointer to a [`BlockingReader`]
//! and must be released with `pq_close`. Functions returning an integer report
//! failure with a negative [`ReaderError::code`]; `pq_open` reports it with a
//! null pointer. The message of the most recent failure on the calling thread
//! is available from `pq_last_error`.
//!
//! A handle may be moved between threads but must not be used by two threads
//! at once.

use std::cell::RefCell;
use std::ffi::{CStr, CString, c_char};
use std::ptr;

use parquet::errors::ParquetError;

use crate::blocking::BlockingReader;
use crate::config::ReaderOptions;
use crate::error::{ReaderError, Result};
use crate::parquet::ColumnSelection;
use crate::table::{Column, ColumnData, ColumnType};

thread_local! {
    static LAST_ERROR: RefCell<Option<(i32, CString)>> = const { RefCell::new(None) };
}

fn set_last_error(err: &ReaderError) {
    let message = CString::new(err.to_string().replace('\0', " ")).unwrap_or_default();
    LAST_ERROR.with(|slot| *slot.borrow_mut() = Some((err.code(), message)));
}

/// Collapse a result into the integer convention of the ABI
fn report(result: Result<i64>) -> i64 {
    result.unwrap_or_else(|err| {
        set_last_error(&err);
        i64::from(err.code())
    })
}

/// Library-allocated string or binary column, released with `pq_free_string`
///
/// `offsets` holds `rows + 1` entries; value `i` is
/// `data[offsets[i]..offsets[i + 1]]`. `validity` is a packed LSB-first
/// bitmap, or null when the column has no nulls.
#[repr(C)]
#[derive(Debug)]
pub struct PqStringColumn {
    pub offsets: *mut i64,
    pub offsets_len: usize,
    pub data: *mut u8,
    pub data_len: usize,
    pub validity: *mut u8,
    pub validity_len: usize,
}

impl PqStringColumn {
    fn empty() -> Self {
        Self {
            offsets: ptr::null_mut(),
            offsets_len: 0,
            data: ptr::null_mut(),
            data_len: 0,
            validity: ptr::null_mut(),
            validity_len: 0,
        }
    }
}

fn into_raw<T>(values: Vec<T>) -> (*mut T, usize) {
    let len = values.len();
    (Box::into_raw(values.into_boxed_slice()).cast::<T>(), len)
}

/// # Safety
/// `ptr` and `len` must come from `into_raw`, or `ptr` must be null.
unsafe fn free_raw<T>(ptr: *mut T, len: usize) {
    if !ptr.is_null() {
        drop(unsafe { Box::from_raw(ptr::slice_from_raw_parts_mut(ptr, len)) });
    }
}

/// # Safety
/// `handle` must be null or a live pointer returned by `pq_open`.
unsafe fn reader_ref<'a>(handle: *const BlockingReader) -> Result<&'a BlockingReader> {
    unsafe { handle.as_ref() }
        .ok_or_else(|| ReaderError::InvalidArgument("null reader handle".to_string()))
}

/// # Safety
/// `ptr` must be null or point to a NUL-terminated string.
unsafe fn c_str<'a>(ptr: *const c_char, what: &str) -> Result<&'a str> {
    if ptr.is_null() {
        return Err(ReaderError::InvalidArgument(format!("null {}", what)));
    }
    unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .map_err(|_| ReaderError::InvalidArgument(format!("{} is not valid UTF-8", what)))
}

/// Schema position of `column`, checked against the file
fn column_index(reader: &BlockingReader, column: i64) -> Result<usize> {
    usize::try_from(column)
        .ok()
        .filter(|&index| index < reader.schema().len())
        .ok_or_else(|| {
            ReaderError::SchemaMismatch(format!(
                "column index {} out of range for {} columns",
                column,
                reader.schema().len()
            ))
        })
}

fn column_type(reader: &BlockingReader, index: usize) -> Result<ColumnType> {
    let field = reader
        .schema()
        .field(index)
        .ok_or_else(|| ReaderError::SchemaMismatch(format!("no column at index {}", index)))?;
    field.column_type.ok_or_else(|| {
        ReaderError::SchemaMismatch(format!(
            "column '{}' has unsupported type {}",
            field.name, field.data_type
        ))
    })
}

/// Read one column, either whole or rows `[start, start + count)`
fn read_column(reader: &BlockingReader, index: usize, range: Option<(i64, i64)>) -> Result<Column> {
    let selection = ColumnSelection::Indices(vec![index]);
    let (table, expected_rows) = match range {
        None => (reader.read_table(&selection)?, reader.num_rows()),
        Some((start, count)) => {
            let (Ok(start), Ok(count)) = (u64::try_from(start), u64::try_from(count)) else {
                return Err(ReaderError::InvalidArgument(format!(
                    "negative row range start={} count={}",
                    start, count
                )));
            };
            (reader.read_rows(&selection, start, count)?, count)
        }
    };

    let column = table
        .into_columns()
        .into_iter()
        .next()
        .ok_or_else(|| ReaderError::SchemaMismatch(format!("column {} was not materialized", index)))?;

    // Callers size their buffers from pq_get_size or the requested count
    if column.len() as u64 != expected_rows {
        return Err(ReaderError::CorruptFile {
            uri: reader.uri().to_string(),
            source: ParquetError::General(format!(
                "column {} holds {} rows, expected {}",
                index,
                column.len(),
                expected_rows
            )),
        });
    }
    Ok(column)
}

/// # Safety
/// `out` must be null or hold at least `ceil(rows / 8)` bytes.
unsafe fn write_validity(column: &Column, out: *mut u8) {
    if out.is_null() {
        return;
    }
    let len = column.len().div_ceil(8);
    match column.validity() {
        Some(validity) => unsafe { ptr::copy_nonoverlapping(validity.as_bytes().as_ptr(), out, len) },
        None => unsafe { ptr::write_bytes(out, 0xFF, len) },
    }
}

/// # Safety
/// See `pq_read`.
unsafe fn read_fixed(
    handle: *const BlockingReader,
    column: i64,
    dtype: i32,
    out: *mut u8,
    validity: *mut u8,
    range: Option<(i64, i64)>,
) -> Result<i64> {
    let reader = unsafe { reader_ref(handle) }?;
    let index = column_index(reader, column)?;

    let expected = ColumnType::from_code(dtype)
        .ok_or_else(|| ReaderError::InvalidArgument(format!("unknown dtype code {}", dtype)))?;
    let actual = column_type(reader, index)?;
    if actual != expected {
        return Err(ReaderError::SchemaMismatch(format!(
            "column {} is {}, requested {}",
            index, actual, expected
        )));
    }
    if expected.byte_width().is_none() {
        return Err(ReaderError::SchemaMismatch(format!(
            "column {} is {}, read it with pq_read_string",
            index, actual
        )));
    }

    let column = read_column(reader, index, range)?;
    let bytes = column.data().as_bytes().ok_or_else(|| {
        ReaderError::SchemaMismatch(format!("column {} has no fixed-width buffer", index))
    })?;
    if !bytes.is_empty() {
        if out.is_null() {
            return Err(ReaderError::InvalidArgument("null output buffer".to_string()));
        }
        unsafe { ptr::copy_nonoverlapping(bytes.as_ptr(), out, bytes.len()) };
    }
    unsafe { write_validity(&column, validity) };

    Ok(column.len() as i64)
}

/// # Safety
/// See `pq_read_string`.
unsafe fn read_var_width(
    handle: *const BlockingReader,
    column: i64,
    out: *mut PqStringColumn,
    range: Option<(i64, i64)>,
) -> Result<i64> {
    let reader = unsafe { reader_ref(handle) }?;
    let out = unsafe { out.as_mut() }
        .ok_or_else(|| ReaderError::InvalidArgument("null string column output".to_string()))?;
    let index = column_index(reader, column)?;

    let actual = column_type(reader, index)?;
    if actual.byte_width().is_some() {
        return Err(ReaderError::SchemaMismatch(format!(
            "column {} is {}, read it with pq_read",
            index, actual
        )));
    }

    let column = read_column(reader, index, range)?;
    let rows = column.len() as i64;
    let (_, data, validity) = column.into_parts();
    let (offsets, data) = match data {
        ColumnData::Utf8 { offsets, data } | ColumnData::Binary { offsets, data } => {
            (offsets, data)
        }
        other => {
            return Err(ReaderError::SchemaMismatch(format!(
                "column {} materialized as {}",
                index,
                other.column_type()
            )));
        }
    };

    let mut result = PqStringColumn::empty();
    (result.offsets, result.offsets_len) = into_raw(offsets);
    (result.data, result.data_len) = into_raw(data);
    if let Some(validity) = validity {
        (result.validity, result.validity_len) = into_raw(validity.as_bytes().to_vec());
    }
    *out = result;

    Ok(rows)
}

/// Open a Parquet file by path or URI
///
/// Options are taken from the environment (`HADOOP_USER_NAME`,
/// `PQ_READER_BATCH_SIZE`, `AWS_REGION`). Returns null on failure.
///
/// # Safety
/// `uri` must be null or point to a NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn pq_open(uri: *const c_char) -> *mut BlockingReader {
    let result = unsafe { c_str(uri, "uri") }
        .and_then(|uri| BlockingReader::open(uri, ReaderOptions::from_env()));
    match result {
        Ok(reader) => Box::into_raw(Box::new(reader)),
        Err(err) => {
            set_last_error(&err);
            ptr::null_mut()
        }
    }
}

/// Release a handle; null is ignored
///
/// # Safety
/// `handle` must be null or a pointer returned by `pq_open` that has not been
/// closed yet.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn pq_close(handle: *mut BlockingReader) {
    if !handle.is_null() {
        drop(unsafe { Box::from_raw(handle) });
    }
}

/// Number of top-level columns in the file
///
/// # Safety
/// `handle` must be null or a live pointer returned by `pq_open`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn pq_num_columns(handle: *const BlockingReader) -> i64 {
    report(unsafe { reader_ref(handle) }.map(|reader| reader.schema().len() as i64))
}

/// Number of rows in the file
///
/// # Safety
/// `handle` must be null or a live pointer returned by `pq_open`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn pq_get_size(handle: *const BlockingReader) -> i64 {
    report(unsafe { reader_ref(handle) }.map(|reader| reader.num_rows() as i64))
}

/// Position of the column called `name`
///
/// # Safety
/// `handle` must be null or a live pointer returned by `pq_open`; `name` must
/// be null or point to a NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn pq_column_index(
    handle: *const BlockingReader,
    name: *const c_char,
) -> i64 {
    report((|| {
        let reader = unsafe { reader_ref(handle) }?;
        let name = unsafe { c_str(name, "column name") }?;
        reader
            .schema()
            .index_of(name)
            .map(|index| index as i64)
            .ok_or_else(|| ReaderError::SchemaMismatch(format!("column '{}' not found in file", name)))
    })())
}

/// Type code of a column (see `ColumnType::code`)
///
/// # Safety
/// `handle` must be null or a live pointer returned by `pq_open`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn pq_column_dtype(handle: *const BlockingReader, column: i64) -> i32 {
    let result = (|| {
        let reader = unsafe { reader_ref(handle) }?;
        let index = column_index(reader, column)?;
        column_type(reader, index).map(|t| i64::from(t.code()))
    })();
    report(result) as i32
}

/// Read every row of a fixed-width column into `out`
///
/// `dtype` must equal the column's type code. Returns the number of rows
/// written. When `validity` is not null it receives the packed bitmap, all
/// ones if the column has no nulls.
///
/// # Safety
/// `handle` must be null or a live pointer returned by `pq_open`. `out` must
/// hold `pq_get_size(handle)` elements of the column's type and `validity`
/// must be null or hold `ceil(pq_get_size(handle) / 8)` bytes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn pq_read(
    handle: *const BlockingReader,
    column: i64,
    dtype: i32,
    out: *mut u8,
    validity: *mut u8,
) -> i64 {
    report(unsafe { read_fixed(handle, column, dtype, out, validity, None) })
}

/// Read rows `[start, start + count)` of a fixed-width column into `out`
///
/// Readers splitting one file compute their slice with `block_range`.
///
/// # Safety
/// As `pq_read`, with `out` holding `count` elements and `validity` holding
/// `ceil(count / 8)` bytes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn pq_read_parallel(
    handle: *const BlockingReader,
    column: i64,
    dtype: i32,
    out: *mut u8,
    validity: *mut u8,
    start: i64,
    count: i64,
) -> i64 {
    report(unsafe { read_fixed(handle, column, dtype, out, validity, Some((start, count))) })
}

/// Read every row of a string or binary column into library-owned buffers
///
/// Returns the number of rows. The buffers in `out` must be released with
/// `pq_free_string`.
///
/// # Safety
/// `handle` must be null or a live pointer returned by `pq_open`; `out` must be
/// null or point to writable memory for one `PqStringColumn`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn pq_read_string(
    handle: *const BlockingReader,
    column: i64,
    out: *mut PqStringColumn,
) -> i64 {
    report(unsafe { read_var_width(handle, column, out, None) })
}

/// Read rows `[start, start + count)` of a string or binary column
///
/// # Safety
/// As `pq_read_string`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn pq_read_string_parallel(
    handle: *const BlockingReader,
    column: i64,
    out: *mut PqStringColumn,
    start: i64,
    count: i64,
) -> i64 {
    report(unsafe { read_var_width(handle, column, out, Some((start, count))) })
}

/// Release the buffers of a string column and reset it; null is ignored
///
/// # Safety
/// `column` must be null or filled by `pq_read_string`/`pq_read_string_parallel`
/// and not freed since.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn pq_free_string(column: *mut PqStringColumn) {
    let Some(column) = (unsafe { column.as_mut() }) else {
        return;
    };
    unsafe {
        free_raw(column.offsets, column.offsets_len);
        free_raw(column.data, column.data_len);
        free_raw(column.validity, column.validity_len);
    }
    *column = PqStringColumn::empty();
}

/// Message of the last failure on this thread, or null
///
/// The pointer stays valid until the next failing call on the same thread.
#[unsafe(no_mangle)]
pub extern "C" fn pq_last_error() -> *const c_char {
    LAST_ERROR.with(|slot| {
        slot.borrow()
            .as_ref()
            .map_or(ptr::null(), |(_, message)| message.as_ptr())
    })
}

/// Code of the last failure on this thread, 0 if none
#[unsafe(no_mangle)]
pub extern "C" fn pq_last_error_code() -> i32 {
    LAST_ERROR.with(|slot| slot.borrow().as_ref().map_or(0, |(code, _)| *code))
}
