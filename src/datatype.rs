/*!
 * Datatypes
 * Size accounting and packing for send buffers
 */

use crate::core::errors::{AmError, AmResult};
use std::fmt;
use std::sync::Arc;

/// User-defined, non-contiguous layout
///
/// Only the size/pack contract is needed here; how elements are laid out in
/// `buffer` is the implementor's business.
pub trait GenericDatatype: Send + Sync {
    /// Total packed size of `count` elements
    fn packed_size(&self, buffer: &[u8], count: usize) -> usize;

    /// Pack from `offset` into `dest`, returning bytes written
    fn pack(&self, buffer: &[u8], count: usize, offset: usize, dest: &mut [u8]) -> usize;

    /// Release per-send state once packing is done
    fn finish(&self) {}
}

/// Datatype descriptor
#[derive(Clone)]
pub enum Datatype {
    /// `count` elements of `elem_size` bytes laid out back to back
    Contig { elem_size: usize },
    Generic(Arc<dyn GenericDatatype>),
}

impl Datatype {
    #[inline]
    pub fn contig(elem_size: usize) -> Self {
        Datatype::Contig { elem_size }
    }

    pub fn generic(dt: Arc<dyn GenericDatatype>) -> Self {
        Datatype::Generic(dt)
    }

    #[inline]
    pub fn is_contig(&self) -> bool {
        matches!(self, Datatype::Contig { .. })
    }

    /// Byte length of `count` elements taken from `buffer`
    pub fn length(&self, buffer: &[u8], count: usize) -> AmResult<usize> {
        match self {
            Datatype::Contig { elem_size } => {
                let length = elem_size.checked_mul(count).ok_or_else(|| {
                    AmError::InvalidParameter(format!(
                        "contiguous length overflow: {} x {}",
                        elem_size, count
                    ))
                })?;
                if length > buffer.len() {
                    return Err(AmError::InvalidParameter(format!(
                        "datatype length {} exceeds buffer of {} bytes",
                        length,
                        buffer.len()
                    )));
                }
                Ok(length)
            }
            Datatype::Generic(dt) => Ok(dt.packed_size(buffer, count)),
        }
    }
}

impl fmt::Debug for Datatype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Datatype::Contig { elem_size } => write!(f, "Contig({})", elem_size),
            Datatype::Generic(_) => f.write_str("Generic"),
        }
    }
}

/// Per-send iteration state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DtState {
    /// Bytes of packed output produced so far
    pub offset: usize,
}

impl DtState {
    /// Pack the rest of the buffer into `dest`, advancing the offset
    pub fn pack(
        &mut self,
        dt: &Datatype,
        buffer: &[u8],
        count: usize,
        length: usize,
        dest: &mut [u8],
    ) -> usize {
        let written = match dt {
            Datatype::Contig { .. } => {
                let remaining = &buffer[self.offset..length];
                let n = remaining.len().min(dest.len());
                dest[..n].copy_from_slice(&remaining[..n]);
                n
            }
            Datatype::Generic(g) => g.pack(buffer, count, self.offset, dest),
        };
        self.offset += written;
        written
    }

    /// Finish generic packing state, no-op for contiguous data
    pub fn finish(&mut self, dt: &Datatype) {
        if let Datatype::Generic(g) = dt {
            g.finish();
        }
    }
}
