//! Typed access to an engine that only exposes a flat linear-memory ABI.
//!
//! Engines hosted in the same process implement [`crate::ChartEngine`]
//! directly and never touch this module. Engines compiled to a sandboxed
//! linear memory expose [`RawEngineAbi`] instead, and the helpers here turn
//! its pointer-and-out-record calls into owned Rust values.

mod abi;
mod container;

use std::collections::HashMap;

use crate::{BridgeError, Result};

pub use abi::{
    create_resource_pack, fetch_hitsound, fetch_line_head_texture, fetch_note_key,
    fetch_note_texture, AbiPack, RawEngineAbi, LINE_HEAD_INFO_LEN, NOTE_INFO_LEN,
};
pub use container::{ContainerDecoder, ContainerHandle, ContainerInfo, DecodedContainer};

/// Address inside the engine's linear memory. Zero is the null pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ptr(pub u32);

impl Ptr {
    pub const NULL: Ptr = Ptr(0);

    pub fn is_null(self) -> bool {
        self.0 == 0
    }

    pub fn offset(self, bytes: u32) -> Ptr {
        Ptr(self.0 + bytes)
    }
}

/// The engine's allocator and heap.
pub trait EngineMemory {
    /// Returns [`Ptr::NULL`] when the allocation cannot be satisfied.
    fn alloc(&mut self, len: usize) -> Ptr;
    fn free(&mut self, ptr: Ptr);
    fn heap(&self) -> &[u8];
    fn heap_mut(&mut self) -> &mut [u8];
}

/// Allocation scope over an engine's memory.
///
/// Everything allocated or adopted through a marshaller is freed when it
/// drops, so no buffer outlives the host call that created it.
pub struct Marshaller<'m, M: EngineMemory + ?Sized> {
    memory: &'m mut M,
    owned: Vec<Ptr>,
}

impl<'m, M: EngineMemory + ?Sized> Marshaller<'m, M> {
    pub fn new(memory: &'m mut M) -> Self {
        Self {
            memory,
            owned: Vec::new(),
        }
    }

    /// Direct access to the engine for issuing ABI calls inside the scope.
    pub fn engine(&mut self) -> &mut M {
        &mut *self.memory
    }

    pub fn alloc(&mut self, len: usize) -> Result<Ptr> {
        let ptr = self.memory.alloc(len);
        if ptr.is_null() {
            return Err(BridgeError::Engine(format!("allocation of {len} bytes failed")));
        }
        self.owned.push(ptr);
        Ok(ptr)
    }

    /// Takes ownership of a buffer the engine returned, so it is freed with
    /// the scope. Null pointers are ignored.
    pub fn adopt(&mut self, ptr: Ptr) -> Ptr {
        if !ptr.is_null() {
            self.owned.push(ptr);
        }
        ptr
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<Ptr> {
        let ptr = self.alloc(bytes.len().max(1))?;
        self.range_mut(ptr, bytes.len())?.copy_from_slice(bytes);
        Ok(ptr)
    }

    /// Copies `text` into engine memory as a NUL-terminated UTF-8 string.
    pub fn write_cstr(&mut self, text: &str) -> Result<Ptr> {
        let ptr = self.alloc(text.len() + 1)?;
        let dst = self.range_mut(ptr, text.len() + 1)?;
        dst[..text.len()].copy_from_slice(text.as_bytes());
        dst[text.len()] = 0;
        Ok(ptr)
    }

    pub fn read_f64(&self, ptr: Ptr) -> Result<f64> {
        Ok(f64::from_le_bytes(self.array(ptr)?))
    }

    pub fn read_u64(&self, ptr: Ptr) -> Result<u64> {
        Ok(u64::from_le_bytes(self.array(ptr)?))
    }

    pub fn read_u32(&self, ptr: Ptr) -> Result<u32> {
        Ok(u32::from_le_bytes(self.array(ptr)?))
    }

    pub fn write_f64(&mut self, ptr: Ptr, value: f64) -> Result<()> {
        self.range_mut(ptr, 8)?.copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    pub fn write_u64(&mut self, ptr: Ptr, value: u64) -> Result<()> {
        self.range_mut(ptr, 8)?.copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    /// Copies a byte range out of engine memory. The source may be freed or
    /// moved once the current call returns, so nothing is borrowed.
    pub fn copy_out(&self, ptr: Ptr, len: usize) -> Result<Vec<u8>> {
        Ok(self.range(ptr, len)?.to_vec())
    }

    /// Decodes a fixed-length range as a string, stopping at the first NUL.
    pub fn read_string(&self, ptr: Ptr, len: usize) -> Result<String> {
        let bytes = self.range(ptr, len)?;
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        Ok(String::from_utf8_lossy(&bytes[..end]).into_owned())
    }

    pub fn read_cstr(&self, ptr: Ptr) -> Result<String> {
        let heap = self.memory.heap();
        let start = ptr.0 as usize;
        let tail = heap
            .get(start..)
            .ok_or_else(|| out_of_range(ptr, 1))?;
        let len = tail
            .iter()
            .position(|&b| b == 0)
            .ok_or(BridgeError::InvalidInput("unterminated string in engine memory"))?;
        Ok(String::from_utf8_lossy(&tail[..len]).into_owned())
    }

    fn array<const N: usize>(&self, ptr: Ptr) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.range(ptr, N)?);
        Ok(out)
    }

    fn range(&self, ptr: Ptr, len: usize) -> Result<&[u8]> {
        let start = ptr.0 as usize;
        let end = start
            .checked_add(len)
            .ok_or_else(|| out_of_range(ptr, len))?;
        self.memory
            .heap()
            .get(start..end)
            .ok_or_else(|| out_of_range(ptr, len))
    }

    fn range_mut(&mut self, ptr: Ptr, len: usize) -> Result<&mut [u8]> {
        let start = ptr.0 as usize;
        let end = start
            .checked_add(len)
            .ok_or_else(|| out_of_range(ptr, len))?;
        self.memory
            .heap_mut()
            .get_mut(start..end)
            .ok_or_else(|| out_of_range(ptr, len))
    }
}

impl<M: EngineMemory + ?Sized> Drop for Marshaller<'_, M> {
    fn drop(&mut self) {
        for ptr in self.owned.drain(..) {
            self.memory.free(ptr);
        }
    }
}

fn out_of_range(ptr: Ptr, len: usize) -> BridgeError {
    BridgeError::Engine(format!(
        "range {:#x}+{len} lies outside engine memory",
        ptr.0
    ))
}

/// Growable in-process heap implementing [`EngineMemory`].
///
/// Bump allocates and never reuses addresses, which keeps dangling pointers
/// from aliasing fresh buffers. Live allocations are tracked so leaks show
/// up in [`VecHeap::live_allocations`].
#[derive(Debug)]
pub struct VecHeap {
    bytes: Vec<u8>,
    live: HashMap<u32, usize>,
}

impl Default for VecHeap {
    fn default() -> Self {
        Self::new()
    }
}

impl VecHeap {
    const ALIGN: usize = 8;

    pub fn new() -> Self {
        Self {
            // Reserve the first word so no allocation lands on the null address.
            bytes: vec![0; Self::ALIGN],
            live: HashMap::new(),
        }
    }

    pub fn live_allocations(&self) -> usize {
        self.live.len()
    }
}

impl EngineMemory for VecHeap {
    fn alloc(&mut self, len: usize) -> Ptr {
        let start = self.bytes.len();
        let Some(end) = len
            .max(1)
            .checked_next_multiple_of(Self::ALIGN)
            .and_then(|padded| start.checked_add(padded))
        else {
            return Ptr::NULL;
        };
        let (Ok(address), Ok(_)) = (u32::try_from(start), u32::try_from(end)) else {
            return Ptr::NULL;
        };
        self.bytes.resize(end, 0);
        self.live.insert(address, len);
        Ptr(address)
    }

    fn free(&mut self, ptr: Ptr) {
        if self.live.remove(&ptr.0).is_none() {
            tracing::warn!(ptr = ptr.0, "free of unknown engine pointer");
        }
    }

    fn heap(&self) -> &[u8] {
        &self.bytes
    }

    fn heap_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }
}
