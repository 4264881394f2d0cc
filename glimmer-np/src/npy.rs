//! Reader and writer for the NumPy `.npy` v1 on-disk format.
//!
//! The writer always emits the canonical form: magic, version 1.0, a
//! space-padded ASCII header dictionary terminated by `\n` whose total size
//! is a multiple of 16, then the raw little-endian row-major payload. The
//! reader accepts 1-D shapes (as 1×N) and trailing commas in the shape tuple
//! and rejects everything else with a precise diagnostic.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use thiserror::Error;

use crate::{Element, NpArray};

const MAGIC: &[u8; 6] = b"\x93NUMPY";

/// Errors produced by the `.npy` codec.
#[derive(Debug, Error)]
pub enum NpyError {
    /// The file could not be opened.
    #[error("could not open '{0}'")]
    Open(String),
    /// An underlying I/O failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    /// The magic bytes are not `\x93NUMPY`.
    #[error("not a numpy file (bad magic)")]
    BadMagic,
    /// Only format version 1.0 is understood.
    #[error("unsupported numpy format version {0}.{1}")]
    Version(u8, u8),
    /// The header dictionary could not be parsed.
    #[error("malformed numpy header: {0}")]
    Header(String),
    /// `fortran_order: True` is not supported.
    #[error("fortran ordered numpy files are not supported")]
    FortranOrder,
    /// The on-disk element type is not the expected one.
    #[error("element type mismatch: expected '{expected}', got '{actual}'")]
    EltTypeMismatch {
        /// The descriptor the caller asked for.
        expected: &'static str,
        /// The descriptor found in the file.
        actual: String,
    },
    /// The payload size does not match the shape in the header.
    #[error("file size does not match the shape in the numpy header")]
    SizeMismatch,
}

/// The decoded fixed attributes of a `.npy` file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NpyHeader {
    /// Number of rows (1 for a 1-D file).
    pub rows: usize,
    /// Number of columns.
    pub cols: usize,
    /// Element type descriptor, without the byte-order marker (`"f8"`, ...).
    pub descr: String,
    /// Element width in bytes.
    pub elt_size: usize,
}

/// Read and validate the header of a `.npy` stream, leaving the reader
/// positioned at the first payload byte.
pub fn read_npy_header<R: Read>(r: &mut R) -> Result<NpyHeader, NpyError> {
    let mut magic = [0u8; 6];
    r.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(NpyError::BadMagic);
    }

    let mut version = [0u8; 2];
    r.read_exact(&mut version)?;
    if version[0] != 1 {
        return Err(NpyError::Version(version[0], version[1]));
    }

    let mut hlen = [0u8; 2];
    r.read_exact(&mut hlen)?;
    let hlen = u16::from_le_bytes(hlen) as usize;

    let mut header = vec![0u8; hlen];
    r.read_exact(&mut header)?;
    let header = std::str::from_utf8(&header)
        .map_err(|_| NpyError::Header("header is not ASCII".into()))?;

    let descr = dict_string(header, "descr")
        .ok_or_else(|| NpyError::Header("missing 'descr' key".into()))?;
    if descr.len() < 2 {
        return Err(NpyError::Header(format!("unparseable element type '{descr}'")));
    }
    let (order, ty) = descr.split_at(1);
    match order {
        "<" | "|" => (),
        ">" => return Err(NpyError::Header("big endian data is not supported".into())),
        _ => return Err(NpyError::Header(format!("unknown byte order marker in '{descr}'"))),
    }
    let elt_size: usize = ty
        .get(1..)
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| NpyError::Header(format!("unparseable element type '{descr}'")))?;

    match dict_word(header, "fortran_order") {
        Some("False") => (),
        Some("True") => return Err(NpyError::FortranOrder),
        _ => return Err(NpyError::Header("missing 'fortran_order' key".into())),
    }

    let shape = dict_shape(header)
        .ok_or_else(|| NpyError::Header("missing or unparseable 'shape' key".into()))?;
    let (rows, cols) = match shape.len() {
        1 => (1, shape[0]),
        2 => (shape[0], shape[1]),
        n => return Err(NpyError::Header(format!("unsupported {n}-dimensional shape"))),
    };

    Ok(NpyHeader { rows, cols, descr: ty.to_string(), elt_size })
}

// The value of a quoted entry, e.g. 'descr': '<f8'.
fn dict_string<'a>(header: &'a str, key: &str) -> Option<&'a str> {
    let rest = dict_value(header, key)?;
    let rest = rest.strip_prefix('\'')?;
    let end = rest.find('\'')?;
    Some(&rest[..end])
}

// The value of an unquoted entry, e.g. 'fortran_order': False.
fn dict_word<'a>(header: &'a str, key: &str) -> Option<&'a str> {
    let rest = dict_value(header, key)?;
    let end = rest.find([',', '}', ' ']).unwrap_or(rest.len());
    Some(&rest[..end])
}

fn dict_value<'a>(header: &'a str, key: &str) -> Option<&'a str> {
    let pat = format!("'{key}':");
    let pos = header.find(&pat)?;
    Some(header[pos + pat.len()..].trim_start())
}

// The shape tuple, tolerating a trailing comma: (2, 3,) / (4,).
fn dict_shape(header: &str) -> Option<Vec<usize>> {
    let rest = dict_value(header, "shape")?;
    let rest = rest.strip_prefix('(')?;
    let end = rest.find(')')?;
    let mut dims = Vec::new();
    for part in rest[..end].split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        dims.push(part.parse().ok()?);
    }
    Some(dims)
}

/// Decode a full `.npy` stream whose element type must be exactly `T`.
pub(crate) fn read_array<T: Element, R: Read>(r: &mut R) -> Result<NpArray<T>, NpyError> {
    let header = read_npy_header(r)?;
    if header.descr != T::DESCR || header.elt_size != T::SIZE {
        return Err(NpyError::EltTypeMismatch { expected: T::DESCR, actual: header.descr });
    }

    let mut payload = Vec::new();
    r.read_to_end(&mut payload)?;
    if payload.len() != header.rows * header.cols * T::SIZE {
        return Err(NpyError::SizeMismatch);
    }

    let data = payload.chunks_exact(T::SIZE).map(T::from_le).collect();
    Ok(NpArray::from_vec(data, header.rows, header.cols))
}

/// Decode a full `.npy` stream of any legal element type, casting each
/// element to `T`.
pub(crate) fn read_array_as<T: Element, R: Read>(r: &mut R) -> Result<NpArray<T>, NpyError> {
    let header = read_npy_header(r)?;

    let mut payload = Vec::new();
    r.read_to_end(&mut payload)?;
    if payload.len() != header.rows * header.cols * header.elt_size {
        return Err(NpyError::SizeMismatch);
    }

    let chunks = payload.chunks_exact(header.elt_size);
    let data: Vec<T> = match header.descr.as_str() {
        "u1" => chunks.map(|b| T::from_u64(<u8 as Element>::from_le(b) as u64)).collect(),
        "u2" => chunks.map(|b| T::from_u64(<u16 as Element>::from_le(b) as u64)).collect(),
        "u4" => chunks.map(|b| T::from_u64(<u32 as Element>::from_le(b) as u64)).collect(),
        "u8" => chunks.map(|b| T::from_u64(<u64 as Element>::from_le(b))).collect(),
        "i1" => chunks.map(|b| T::from_i64(<i8 as Element>::from_le(b) as i64)).collect(),
        "i2" => chunks.map(|b| T::from_i64(<i16 as Element>::from_le(b) as i64)).collect(),
        "i4" => chunks.map(|b| T::from_i64(<i32 as Element>::from_le(b) as i64)).collect(),
        "i8" => chunks.map(|b| T::from_i64(<i64 as Element>::from_le(b))).collect(),
        "f4" => chunks.map(|b| T::from_f64(<f32 as Element>::from_le(b) as f64)).collect(),
        "f8" => chunks.map(|b| T::from_f64(<f64 as Element>::from_le(b))).collect(),
        other => {
            return Err(NpyError::Header(format!("unhandled element type '{other}'")));
        }
    };
    Ok(NpArray::from_vec(data, header.rows, header.cols))
}

/// Encode `a` to `w` in the canonical `.npy` v1 form.
pub(crate) fn write_array<T: Element, W: Write>(
    a: &NpArray<T>,
    w: &mut W,
) -> Result<(), NpyError> {
    let dict = format!(
        "{{'descr': '<{}', 'fortran_order': False, 'shape': ({}, {},), }}",
        T::DESCR,
        a.rows(),
        a.cols()
    );
    // Space-pad so that the '\n'-terminated header ends on a 16-byte
    // boundary of the whole file.
    let total = (10 + dict.len() + 1 + 15) / 16 * 16;
    let hlen = total - 10;

    w.write_all(MAGIC)?;
    w.write_all(&[1, 0])?;
    w.write_all(&(hlen as u16).to_le_bytes())?;
    w.write_all(dict.as_bytes())?;
    for _ in 0..hlen - dict.len() - 1 {
        w.write_all(b" ")?;
    }
    w.write_all(b"\n")?;

    let mut payload = Vec::with_capacity(a.size() * T::SIZE);
    for v in a.as_slice() {
        v.write_le(&mut payload);
    }
    w.write_all(&payload)?;
    Ok(())
}

pub(crate) fn read_file<T: Element>(path: &Path) -> Result<NpArray<T>, NpyError> {
    let file = File::open(path).map_err(|_| NpyError::Open(path.display().to_string()))?;
    read_array(&mut BufReader::new(file))
}

pub(crate) fn read_file_as<T: Element>(path: &Path) -> Result<NpArray<T>, NpyError> {
    let file = File::open(path).map_err(|_| NpyError::Open(path.display().to_string()))?;
    read_array_as(&mut BufReader::new(file))
}

pub(crate) fn write_file<T: Element>(a: &NpArray<T>, path: &Path) -> Result<(), NpyError> {
    let file = File::create(path)?;
    let mut w = BufWriter::new(file);
    write_array(a, &mut w)?;
    w.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_is_padded_to_16_bytes() {
        let a = NpArray::<f64>::from_vec(vec![1.0, 2.0, 3.0, 4.0], 1, 4);
        let mut buf = Vec::new();
        write_array(&a, &mut buf).unwrap();
        assert_eq!(&buf[..6], MAGIC);
        assert_eq!(&buf[6..8], &[1, 0]);
        let hlen = u16::from_le_bytes([buf[8], buf[9]]) as usize;
        assert_eq!((10 + hlen) % 16, 0);
        assert_eq!(buf[10 + hlen - 1], b'\n');
        assert_eq!(buf.len(), 10 + hlen + 4 * 8);
    }

    #[test]
    fn header_parse_accepts_1d_and_trailing_comma() {
        let mut buf = Vec::new();
        let dict = "{'descr': '<u2', 'fortran_order': False, 'shape': (5,), }";
        let total = (10 + dict.len() + 1 + 15) / 16 * 16;
        let hlen = total - 10;
        buf.extend_from_slice(MAGIC);
        buf.extend_from_slice(&[1, 0]);
        buf.extend_from_slice(&(hlen as u16).to_le_bytes());
        buf.extend_from_slice(dict.as_bytes());
        buf.extend(std::iter::repeat(b' ').take(hlen - dict.len() - 1));
        buf.push(b'\n');

        let header = read_npy_header(&mut buf.as_slice()).unwrap();
        assert_eq!(header, NpyHeader { rows: 1, cols: 5, descr: "u2".into(), elt_size: 2 });
    }

    #[test]
    fn bad_magic_is_rejected() {
        let buf = b"\x93NUMPX\x01\x00";
        assert!(matches!(read_npy_header(&mut buf.as_slice()), Err(NpyError::BadMagic)));
    }

    #[test]
    fn fortran_order_is_rejected() {
        let a = NpArray::<u8>::from_vec(vec![1, 2], 1, 2);
        let mut buf = Vec::new();
        write_array(&a, &mut buf).unwrap();
        let patched = String::from_utf8_lossy(&buf[10..]).replace("False", "True ");
        let mut file = buf[..10].to_vec();
        file.extend_from_slice(patched.as_bytes());
        assert!(matches!(
            read_array::<u8, _>(&mut file.as_slice()),
            Err(NpyError::FortranOrder)
        ));
    }

    #[test]
    fn element_type_mismatch_is_reported() {
        let a = NpArray::<u32>::from_vec(vec![1, 2], 1, 2);
        let mut buf = Vec::new();
        write_array(&a, &mut buf).unwrap();
        let err = read_array::<f64, _>(&mut buf.as_slice()).unwrap_err();
        assert!(matches!(err, NpyError::EltTypeMismatch { expected: "f8", .. }));
    }

    #[test]
    fn truncated_payload_is_reported() {
        let a = NpArray::<u32>::from_vec(vec![1, 2, 3, 4], 2, 2);
        let mut buf = Vec::new();
        write_array(&a, &mut buf).unwrap();
        buf.truncate(buf.len() - 2);
        assert!(matches!(
            read_array::<u32, _>(&mut buf.as_slice()),
            Err(NpyError::SizeMismatch)
        ));
    }
}
