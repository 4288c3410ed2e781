use std::io;
use std::ops::Range;

use bytes::Bytes;

use crate::ReadAt;

/// Coalesce byte ranges whose gaps are at most `max_gap` bytes.
///
/// The result is sorted and non-overlapping.
pub fn merge_ranges(mut ranges: Vec<Range<u64>>, max_gap: u64) -> Vec<Range<u64>> {
    if ranges.is_empty() {
        return Vec::new();
    }

    ranges.sort_unstable_by_key(|r| r.start);
    let mut merged_ranges = Vec::with_capacity(ranges.len());

    let mut start_idx = 0;
    let mut end_idx = 1;

    while start_idx < ranges.len() {
        let mut range_end = ranges[start_idx].end;

        while end_idx < ranges.len()
            && ranges[end_idx]
                .start
                .checked_sub(range_end)
                .is_none_or(|gap| gap <= max_gap)
        {
            range_end = range_end.max(ranges[end_idx].end);
            end_idx += 1;
        }

        merged_ranges.push(ranges[start_idx].start..range_end);
        start_idx = end_idx;
        end_idx += 1;
    }

    merged_ranges
}

/// Read several ranges, issuing one request per coalesced run of ranges.
///
/// The returned buffers follow the order of `ranges` and share the memory of the coalesced
/// reads.
pub fn read_ranges<R: ReadAt + ?Sized>(
    reader: &R,
    ranges: &[Range<u64>],
    max_gap: u64,
) -> io::Result<Vec<Bytes>> {
    let merged_ranges = merge_ranges(ranges.to_vec(), max_gap);
    let reads = merged_ranges
        .iter()
        .map(|r| reader.read_byte_range(r.clone()))
        .collect::<io::Result<Vec<_>>>()?;

    Ok(ranges
        .iter()
        .map(|range| {
            let read_idx = merged_ranges.partition_point(|mr| mr.start <= range.start) - 1;
            let read_start = merged_ranges[read_idx].start;
            let start = (range.start - read_start) as usize;
            let end = (range.end - read_start) as usize;
            reads[read_idx].slice(start..end)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merges_ranges() {
        assert_eq!(merge_ranges(vec![0..2, 12..20], 10), vec![0..20]);
    }

    #[test]
    fn avoids_merging() {
        assert_eq!(merge_ranges(vec![12..20, 0..2], 5), vec![0..2, 12..20]);
    }

    #[test]
    fn merges_overlapping() {
        assert_eq!(merge_ranges(vec![0..10, 2..4, 9..12], 0), vec![0..12]);
    }

    #[test]
    fn reads_coalesced_ranges() {
        let bytes = Bytes::from("trytoreadthisinmultiplechunks");
        let ranges = [5..9, 23..29];
        assert_eq!(merge_ranges(ranges.to_vec(), 15), vec![5..29]);
        let read = read_ranges(&bytes, &ranges, 15).unwrap();
        assert_eq!(read, vec![Bytes::from("read"), Bytes::from("chunks")]);
    }
}
