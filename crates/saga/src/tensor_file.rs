// Tensor file — Single-tensor binary format
//
//   ┌──────────┬──────┬──────────┬──────────────────┬─────────────────────┐
//   │ 8 bytes  │ u8   │ u32 LE   │ rank × u32 LE    │ payload             │
//   │ sagaT001 │ type │ rank     │ dims             │ packed, LE, C-order │
//   └──────────┴──────┴──────────┴──────────────────┴─────────────────────┘
//
// Type byte: 0 = F32, 1 = F16. The payload holds exactly
// product(dims) × element size bytes in canonical element order.
//
// Loading memory-maps the file read-only and wraps the payload region in a
// Storage directly, so nothing is copied until the tensor is written to.
// Saving first makes a dense copy, so strided views and slices are written
// packed.
//
// Usage:
//   tensor_file::save_tensor(&t, "weights/conv1.w")?;
//   let t = tensor_file::load_tensor("weights/conv1.w", Some("conv1.w"))?;

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use memmap2::Mmap;
use saga_core::{bail, DType, Error, Layout, Result, Shape, Storage, Tensor, MAX_RANK};

/// File magic.
pub const MAGIC: &[u8; 8] = b"sagaT001";

const FIXED_HEADER: usize = MAGIC.len() + 1 + 4;

const CONTEXT: &str = "tensor file";

fn dtype_to_u8(dtype: DType) -> Result<u8> {
    match dtype {
        DType::F32 => Ok(0),
        DType::F16 => Ok(1),
        other => Err(Error::UnsupportedDType {
            dtype: other,
            context: CONTEXT,
        }),
    }
}

fn u8_to_dtype(path: &Path, v: u8) -> Result<DType> {
    match v {
        0 => Ok(DType::F32),
        1 => Ok(DType::F16),
        _ => bail!("{}: unknown element type {v}", path.display()),
    }
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

/// Load a tensor file as a zero-copy, memory-mapped tensor.
pub fn load_tensor(path: impl AsRef<Path>, name: Option<&str>) -> Result<Tensor> {
    let path = path.as_ref();
    read_tensor(path, name).map_err(|e| {
        log::error!("Unable to load {}: {}", path.display(), e);
        e
    })
}

fn read_tensor(path: &Path, name: Option<&str>) -> Result<Tensor> {
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    let len = file.metadata().map_err(|e| Error::io(path, e))?.len() as usize;
    if len < FIXED_HEADER {
        return Err(Error::Truncated {
            path: path.to_path_buf(),
            need: FIXED_HEADER,
            have: len,
        });
    }

    // SAFETY: the map is read-only and owned by the returned storage. Writes
    // go to an owned copy, never through the map.
    let map = unsafe { Mmap::map(&file) }.map_err(|e| Error::io(path, e))?;

    if &map[..MAGIC.len()] != MAGIC {
        return Err(Error::NotATensorFile(path.to_path_buf()));
    }
    let dtype = u8_to_dtype(path, map[MAGIC.len()])?;
    let rank = read_u32(&map, MAGIC.len() + 1) as usize;
    if rank > MAX_RANK {
        return Err(Error::RankTooHigh {
            rank,
            max: MAX_RANK,
        });
    }

    let header = FIXED_HEADER + 4 * rank;
    if map.len() < header {
        return Err(Error::Truncated {
            path: path.to_path_buf(),
            need: header,
            have: map.len(),
        });
    }
    let dims: Vec<usize> = (0..rank)
        .map(|i| read_u32(&map, FIXED_HEADER + 4 * i) as usize)
        .collect();
    let shape = Shape::from(dims);

    let need = shape
        .checked_elem_count()
        .and_then(|n| n.checked_mul(dtype.size_in_bytes()))
        .and_then(|payload| payload.checked_add(header))
        .ok_or_else(|| Error::DimensionsTooLarge(shape.clone()))?;
    if map.len() < need {
        return Err(Error::Truncated {
            path: path.to_path_buf(),
            need,
            have: map.len(),
        });
    }
    let payload = need - header;

    let storage = Storage::from_mmap(dtype, map, header, payload)?;
    Tensor::from_storage(storage, Layout::contiguous(shape), name)
}

/// Write `tensor` to `path`. Only F32 and F16 tensors with every dimension
/// below 2^32 can be saved.
pub fn save_tensor(tensor: &Tensor, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    write_tensor(tensor, path).map_err(|e| {
        log::error!("Unable to save {}: {}", path.display(), e);
        e
    })
}

fn write_tensor(tensor: &Tensor, path: &Path) -> Result<()> {
    let type_byte = dtype_to_u8(tensor.dtype())?;
    let mut header = Vec::with_capacity(FIXED_HEADER + 4 * tensor.rank());
    header.extend_from_slice(MAGIC);
    header.push(type_byte);
    header.extend_from_slice(&(tensor.rank() as u32).to_le_bytes());
    for &d in tensor.dims() {
        let d = u32::try_from(d).map_err(|_| Error::DimensionsTooLarge(tensor.shape().clone()))?;
        header.extend_from_slice(&d.to_le_bytes());
    }

    let dense = tensor.contiguous_copy()?;
    let storage = dense
        .storage()
        .ok_or_else(|| Error::msg(format!("{tensor} has no storage")))?;
    let payload = tensor.elem_count() * tensor.dtype().size_in_bytes();

    let io_err = |e: std::io::Error| Error::io(path, e);
    let file = File::create(path).map_err(io_err)?;
    let mut writer = BufWriter::new(file);
    writer.write_all(&header).map_err(io_err)?;
    storage
        .with_bytes(storage.physical(0), |bytes| writer.write_all(&bytes[..payload]))
        .map_err(io_err)?;
    writer.flush().map_err(io_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dtype_tags() {
        assert_eq!(dtype_to_u8(DType::F32).unwrap(), 0);
        assert_eq!(dtype_to_u8(DType::F16).unwrap(), 1);
        assert!(matches!(
            dtype_to_u8(DType::I32),
            Err(Error::UnsupportedDType { .. })
        ));
        assert_eq!(u8_to_dtype(Path::new("t"), 1).unwrap(), DType::F16);
        assert!(u8_to_dtype(Path::new("t"), 2).is_err());
    }

    #[test]
    fn test_header_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t");
        let t = Tensor::from_slice(&[1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0], (2, 3), None).unwrap();
        save_tensor(&t, &path).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[..8], b"sagaT001");
        assert_eq!(bytes[8], 0);
        assert_eq!(read_u32(&bytes, 9), 2);
        assert_eq!(read_u32(&bytes, 13), 2);
        assert_eq!(read_u32(&bytes, 17), 3);
        assert_eq!(bytes.len(), 21 + 6 * 4);
        assert_eq!(&bytes[21..25], &1.0f32.to_le_bytes());
    }

    #[test]
    fn test_load_is_mapped_until_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("w");
        let t = Tensor::from_slice(&[0.5f32; 4], 4, None).unwrap();
        save_tensor(&t, &path).unwrap();

        let loaded = load_tensor(&path, Some("w")).unwrap();
        let storage = loaded.storage().unwrap();
        assert!(storage.is_mapped(0));
        loaded.access().unwrap().set(&[0], 1.0);
        assert!(!storage.is_mapped(0));
        assert_eq!(loaded.to_f64_vec().unwrap(), vec![1.0, 0.5, 0.5, 0.5]);

        // the file itself is untouched
        let again = load_tensor(&path, None).unwrap();
        assert_eq!(again.to_f64_vec().unwrap(), vec![0.5; 4]);
    }
}
