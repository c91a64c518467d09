use thiserror::Error;

/// A guest memory write was rejected (unmapped or read-only destination).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("memory write rejected")]
pub struct WriteRejected;

/// Fault-tolerant access to the faulting thread's address space.
///
/// Implementations run inside a synchronous fault handler, so both
/// operations must report failure as ordinary return values; a nested fault
/// delivered back into the handler would be fatal.
pub trait VirtualMemory {
    /// Copy up to `buf.len()` bytes starting at `addr` into `buf`, returning
    /// how many bytes were actually readable. A range that crosses into an
    /// unmapped page yields a short count rather than an error.
    fn read_bytes(&self, addr: u64, buf: &mut [u8]) -> usize;

    /// Write `bytes` at `addr`, all or nothing.
    fn write_bytes(&mut self, addr: u64, bytes: &[u8]) -> Result<(), WriteRejected>;
}

/// Identity-mapped memory used by unit tests: addresses past the end of the
/// buffer read short and reject writes.
#[derive(Debug, Clone)]
pub struct FlatTestMemory {
    mem: Vec<u8>,
}

impl FlatTestMemory {
    pub fn new(size: usize) -> Self {
        Self { mem: vec![0; size] }
    }

    pub fn load(&mut self, addr: u64, data: &[u8]) {
        let start = addr as usize;
        self.mem[start..start + data.len()].copy_from_slice(data);
    }

    pub fn slice(&self, addr: u64, len: usize) -> &[u8] {
        let start = addr as usize;
        &self.mem[start..start + len]
    }
}

impl VirtualMemory for FlatTestMemory {
    fn read_bytes(&self, addr: u64, buf: &mut [u8]) -> usize {
        let Ok(start) = usize::try_from(addr) else {
            return 0;
        };
        if start >= self.mem.len() {
            return 0;
        }
        let avail = &self.mem[start..];
        let n = buf.len().min(avail.len());
        buf[..n].copy_from_slice(&avail[..n]);
        n
    }

    fn write_bytes(&mut self, addr: u64, bytes: &[u8]) -> Result<(), WriteRejected> {
        let start = usize::try_from(addr).map_err(|_| WriteRejected)?;
        let end = start.checked_add(bytes.len()).ok_or(WriteRejected)?;
        if end > self.mem.len() {
            return Err(WriteRejected);
        }
        self.mem[start..end].copy_from_slice(bytes);
        Ok(())
    }
}
