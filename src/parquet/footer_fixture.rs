//! Footer rewriting for files whose metadata disagrees with their pages

use bytes::Bytes;
use parquet::file::metadata::{ParquetMetaDataReader, ParquetMetaDataWriter, RowGroupMetaData};

/// Copy of the Parquet file `file` whose row groups declare `counts` rows
///
/// Data pages are left untouched, only the footer is rewritten.
pub fn with_row_counts(file: &[u8], counts: &[i64]) -> Vec<u8> {
    let metadata = ParquetMetaDataReader::new()
        .parse_and_finish(&Bytes::copy_from_slice(file))
        .unwrap();
    assert_eq!(metadata.num_row_groups(), counts.len());

    let len_at = file.len() - 8;
    let metadata_len = u32::from_le_bytes(file[len_at..len_at + 4].try_into().unwrap()) as usize;
    let footer_start = len_at - metadata_len;

    let row_groups: Vec<RowGroupMetaData> = metadata
        .row_groups()
        .iter()
        .zip(counts)
        .map(|(rg, &num_rows)| {
            rg.clone()
                .into_builder()
                .set_num_rows(num_rows)
                .build()
                .unwrap()
        })
        .collect();
    let patched = metadata.into_builder().set_row_groups(row_groups).build();

    let mut out = file[..footer_start].to_vec();
    ParquetMetaDataWriter::new(&mut out, &patched)
        .finish()
        .unwrap();
    out
}
