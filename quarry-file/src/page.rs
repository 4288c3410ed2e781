use arrow_buffer::BooleanBuffer;
use quarry_array::arrays::{
    BoolArray, FixedSizeBinaryArray, NullArray, PrimitiveArray, TemporalArray, VarBinArray,
};
use quarry_array::compute::statistics;
use quarry_array::{Array, IntoArray, Validity};
use quarry_buffer::{Buffer, ByteBuffer};
use quarry_dtype::{DType, PType};
use quarry_error::{QuarryError, QuarryResult, quarry_bail, quarry_err};
use quarry_scalar::Scalar;

use crate::PAGE_HEADER_SIZE;
use crate::stats::encode_scalar;

const HAS_VALIDITY: u8 = 1;
const HAS_STATS: u8 = 1 << 1;

/// How the values of a page body are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Encoding {
    /// Values stored in their in-memory layout.
    Plain = 0,
}

impl TryFrom<u8> for Encoding {
    type Error = QuarryError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Plain),
            _ => Err(quarry_err!(FormatError: "unknown page encoding {}", value)),
        }
    }
}

/// How a page body is compressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Compression {
    /// Stored as is.
    None = 0,
}

impl TryFrom<u8> for Compression {
    type Error = QuarryError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::None),
            _ => Err(quarry_err!(FormatError: "unknown page compression {}", value)),
        }
    }
}

/// The fixed-size header at the start of every page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageHeader {
    pub num_values: u32,
    pub encoding: Encoding,
    pub compression: Compression,
    /// Bit 0: the body starts with a validity bitmap. Bit 1: a statistics section follows the
    /// header.
    pub flags: u8,
    pub uncompressed_len: u32,
    pub compressed_len: u32,
    pub stats_len: u32,
    pub null_count: u32,
}

impl PageHeader {
    pub fn has_validity(&self) -> bool {
        self.flags & HAS_VALIDITY != 0
    }

    pub fn has_stats(&self) -> bool {
        self.flags & HAS_STATS != 0
    }

    /// The length of the whole page, header included.
    pub fn page_len(&self) -> usize {
        PAGE_HEADER_SIZE + self.stats_len as usize + self.compressed_len as usize
    }

    pub fn to_bytes(&self) -> [u8; PAGE_HEADER_SIZE] {
        let mut header = [0u8; PAGE_HEADER_SIZE];
        header[0..4].copy_from_slice(&self.num_values.to_le_bytes());
        header[4] = self.encoding as u8;
        header[5] = self.compression as u8;
        header[6] = self.flags;
        header[8..12].copy_from_slice(&self.uncompressed_len.to_le_bytes());
        header[12..16].copy_from_slice(&self.compressed_len.to_le_bytes());
        header[16..20].copy_from_slice(&self.stats_len.to_le_bytes());
        header[20..24].copy_from_slice(&self.null_count.to_le_bytes());
        header
    }

    pub fn parse(bytes: &[u8]) -> QuarryResult<Self> {
        if bytes.len() < PAGE_HEADER_SIZE {
            quarry_bail!(
                FormatError: "page of {} bytes is shorter than its {} byte header",
                bytes.len(),
                PAGE_HEADER_SIZE
            );
        }
        Ok(Self {
            num_values: read_u32(bytes, 0),
            encoding: Encoding::try_from(bytes[4])?,
            compression: Compression::try_from(bytes[5])?,
            flags: bytes[6],
            uncompressed_len: read_u32(bytes, 8),
            compressed_len: read_u32(bytes, 12),
            stats_len: read_u32(bytes, 16),
            null_count: read_u32(bytes, 20),
        })
    }
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[at..at + 4]);
    u32::from_le_bytes(raw)
}

/// The statistics recorded for one page.
#[derive(Debug, Clone, Default)]
pub(crate) struct PageStatistics {
    pub min: Option<Scalar>,
    pub max: Option<Scalar>,
    pub null_count: u64,
    pub num_values: u64,
}

/// Serialize `array` as one plain page.
pub(crate) fn encode_page(
    array: &Array,
    write_statistics: bool,
) -> QuarryResult<(Vec<u8>, PageStatistics)> {
    let len = array.len();
    let num_values =
        u32::try_from(len).map_err(|_| quarry_err!("page of {} values is too large", len))?;
    let null_count = array.null_count();
    let mut flags = 0u8;

    let mut page_stats = PageStatistics {
        null_count: null_count as u64,
        num_values: len as u64,
        ..Default::default()
    };
    let mut stats_section = Vec::new();
    if write_statistics {
        let stats = statistics(array)?;
        if let (Some(min), Some(max)) = (stats.min, stats.max) {
            if let (Some(min_bytes), Some(max_bytes)) = (encode_scalar(&min), encode_scalar(&max)) {
                for bytes in [min_bytes, max_bytes] {
                    stats_section.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
                    stats_section.extend_from_slice(&bytes);
                }
                flags |= HAS_STATS;
                page_stats.min = Some(min);
                page_stats.max = Some(max);
            }
        }
    }

    let mut body = Vec::with_capacity(array.nbytes() + len.div_ceil(8));
    if !matches!(array, Array::Null(_)) {
        if let Some(validity) = array.validity().to_null_buffer(len) {
            pack_bits(&validity, &mut body);
            flags |= HAS_VALIDITY;
        }
    }
    encode_values(array, &mut body);

    let body_len = u32::try_from(body.len())
        .map_err(|_| quarry_err!("page body of {} bytes is too large", body.len()))?;
    let header = PageHeader {
        num_values,
        encoding: Encoding::Plain,
        compression: Compression::None,
        flags,
        uncompressed_len: body_len,
        compressed_len: body_len,
        stats_len: stats_section.len() as u32,
        null_count: null_count as u32,
    };

    let mut page = Vec::with_capacity(header.page_len());
    page.extend_from_slice(&header.to_bytes());
    page.extend_from_slice(&stats_section);
    page.extend_from_slice(&body);
    Ok((page, page_stats))
}

fn encode_values(array: &Array, out: &mut Vec<u8>) {
    match array {
        Array::Null(_) => {}
        Array::Bool(array) => pack_bits(array.boolean_buffer(), out),
        Array::Primitive(array) => out.extend_from_slice(array.byte_buffer().as_slice()),
        Array::Temporal(array) => out.extend_from_slice(array.storage().byte_buffer().as_slice()),
        Array::FixedSizeBinary(array) => out.extend_from_slice(array.bytes().as_slice()),
        Array::VarBin(array) => {
            let offsets = array.offsets().as_slice();
            let base = offsets[0];
            for offset in offsets {
                out.extend_from_slice(&(offset - base).to_le_bytes());
            }
            out.extend_from_slice(&array.bytes().as_slice()[array.data_range()]);
        }
    }
}

/// Append the bits of `buffer`, least significant bit first.
fn pack_bits(buffer: &BooleanBuffer, out: &mut Vec<u8>) {
    let start = out.len();
    out.resize(start + buffer.len().div_ceil(8), 0);
    for (idx, bit) in buffer.iter().enumerate() {
        if bit {
            out[start + idx / 8] |= 1 << (idx % 8);
        }
    }
}

fn unpack_bits(bytes: &[u8], len: usize) -> BooleanBuffer {
    BooleanBuffer::new(arrow_buffer::Buffer::from_slice_ref(bytes), 0, len)
}

/// Decode one page of `dtype` values. `page` must start at the page header.
pub(crate) fn decode_page(page: &ByteBuffer, dtype: &DType) -> QuarryResult<Array> {
    let header = PageHeader::parse(page.as_slice())?;
    if header.page_len() > page.len() {
        quarry_bail!(
            FormatError: "page declares {} bytes but only {} remain",
            header.page_len(),
            page.len()
        );
    }
    if header.compressed_len != header.uncompressed_len {
        quarry_bail!(
            FormatError: "page compressed length {} differs from uncompressed length {} without compression",
            header.compressed_len,
            header.uncompressed_len
        );
    }
    let body_start = PAGE_HEADER_SIZE + header.stats_len as usize;
    let body = page.slice(body_start..header.page_len());
    let len = header.num_values as usize;

    let (validity, values) = if header.has_validity() {
        if !dtype.is_nullable() {
            quarry_bail!(FormatError: "page of non-nullable {} carries a validity bitmap", dtype);
        }
        let bitmap_len = len.div_ceil(8);
        if bitmap_len > body.len() {
            quarry_bail!(
                FormatError: "validity bitmap of {} bytes exceeds the {} byte page body",
                bitmap_len,
                body.len()
            );
        }
        (
            Validity::Array(unpack_bits(&body.as_slice()[..bitmap_len], len)),
            body.slice(bitmap_len..),
        )
    } else {
        (Validity::from_nullability(dtype.nullability()), body)
    };

    let array = match dtype {
        DType::Null => {
            expect_len(&values, 0, dtype)?;
            NullArray::new(len).into_array()
        }
        DType::Bool(_) => {
            expect_len(&values, len.div_ceil(8), dtype)?;
            BoolArray::try_new(unpack_bits(values.as_slice(), len), validity)
                .map_err(corrupt)?
                .into_array()
        }
        DType::Primitive(ptype, _) => decode_primitive(values, *ptype, len, validity, dtype)?.into_array(),
        DType::Temporal(temporal, _) => {
            let storage = decode_primitive(values, temporal.storage_ptype(), len, validity, dtype)?;
            TemporalArray::try_new(temporal.clone(), storage)
                .map_err(corrupt)?
                .into_array()
        }
        DType::FixedSizeBinary(width, _) => {
            expect_len(&values, len * *width as usize, dtype)?;
            FixedSizeBinaryArray::try_new(*width, values, validity)
                .map_err(corrupt)?
                .into_array()
        }
        DType::Utf8(_) | DType::Binary(_) => {
            let offsets_len = (len + 1) * size_of::<i32>();
            if offsets_len > values.len() {
                quarry_bail!(
                    FormatError: "{} offsets need {} bytes but the page body holds {}",
                    len + 1,
                    offsets_len,
                    values.len()
                );
            }
            let offsets = Buffer::<i32>::from_byte_buffer(values.slice(..offsets_len));
            let data = values.slice(offsets_len..);
            if offsets.as_slice().last().copied() != Some(data.len() as i32) {
                quarry_bail!(FormatError: "last offset does not match the {} value bytes", data.len());
            }
            VarBinArray::try_new(offsets, data, dtype.clone(), validity)
                .map_err(corrupt)?
                .into_array()
        }
    };
    if array.dtype() != dtype {
        quarry_bail!(FormatError: "decoded {} page for a {} column", array.dtype(), dtype);
    }
    Ok(array)
}

fn decode_primitive(
    values: ByteBuffer,
    ptype: PType,
    len: usize,
    validity: Validity,
    dtype: &DType,
) -> QuarryResult<PrimitiveArray> {
    expect_len(&values, len * ptype.byte_width(), dtype)?;
    PrimitiveArray::from_byte_buffer(values, ptype, validity).map_err(corrupt)
}

fn expect_len(values: &ByteBuffer, expected: usize, dtype: &DType) -> QuarryResult<()> {
    if values.len() != expected {
        quarry_bail!(
            FormatError: "expected {} value bytes for {} but the page holds {}",
            expected,
            dtype,
            values.len()
        );
    }
    Ok(())
}

fn corrupt(err: QuarryError) -> QuarryError {
    quarry_err!(FormatError: "corrupt page: {}", err)
}
