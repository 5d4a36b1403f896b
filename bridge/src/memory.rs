//! Bounds-checked access to a unit's linear memory.
//!
//! All functions validate offset and length against the memory size before
//! touching it. Guest pointers are unsigned 32-bit offsets; a range that
//! overflows or ends past the last byte is rejected with [`OutOfBounds`].

/// Size of one WebAssembly page.
pub const PAGE_SIZE: usize = 65536;

/// An access outside linear memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("memory access {ptr:#x}+{len} out of bounds (memory size {mem_size})")]
pub struct OutOfBounds {
    pub ptr: u32,
    pub len: usize,
    pub mem_size: usize,
}

/// A region of guest linear memory, as handed out by the unit's allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GuestSlice {
    pub ptr: u32,
    pub len: u32,
}

impl GuestSlice {
    pub fn new(ptr: u32, len: u32) -> Self {
        Self { ptr, len }
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Validate that `[ptr, ptr+len)` lies within `mem_size` bytes.
pub fn check_range(mem_size: usize, ptr: u32, len: usize) -> Result<std::ops::Range<usize>, OutOfBounds> {
    let err = OutOfBounds { ptr, len, mem_size };
    let start = ptr as usize;
    let end = start.checked_add(len).ok_or(err)?;
    if end > mem_size {
        return Err(err);
    }
    Ok(start..end)
}

/// Read `len` bytes from guest memory at `ptr`.
pub fn read_bytes(mem: &[u8], ptr: u32, len: usize) -> Result<Vec<u8>, OutOfBounds> {
    let range = check_range(mem.len(), ptr, len)?;
    Ok(mem[range].to_vec())
}

/// Write `data` to guest memory at `ptr`.
pub fn write_bytes(mem: &mut [u8], ptr: u32, data: &[u8]) -> Result<(), OutOfBounds> {
    let range = check_range(mem.len(), ptr, data.len())?;
    mem[range].copy_from_slice(data);
    Ok(())
}

/// Read a little-endian u32 from guest memory at `ptr`.
pub fn read_u32(mem: &[u8], ptr: u32) -> Result<u32, OutOfBounds> {
    let range = check_range(mem.len(), ptr, 4)?;
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&mem[range]);
    Ok(u32::from_le_bytes(buf))
}

/// Write a little-endian u32 to guest memory at `ptr`.
pub fn write_u32(mem: &mut [u8], ptr: u32, value: u32) -> Result<(), OutOfBounds> {
    write_bytes(mem, ptr, &value.to_le_bytes())
}

/// Convert a guest allocator result into an offset.
///
/// The ABI passes pointers as `i32`; the bit pattern is the unsigned offset.
pub fn ptr_from_abi(raw: i32) -> u32 {
    raw as u32
}

/// Convert an offset or length into its ABI representation.
pub fn ptr_to_abi(ptr: u32) -> i32 {
    ptr as i32
}
