use super::{EngineMemory, Marshaller, Ptr};
use crate::assets::{NoteKind, TextureSource};
use crate::engine::{LineHeadTextureData, NoteTextureData};
use crate::{BridgeError, Result};

/// Size of the note texture out-record: scale, head split, tail split,
/// width, height, byte length. Eight little-endian bytes each.
pub const NOTE_INFO_LEN: usize = 8 * 6;

/// Size of the line-head out-record: scale, connect point, width, height,
/// byte length.
pub const LINE_HEAD_INFO_LEN: usize = 8 * 5;

/// Flat entry points of an engine living in its own linear memory.
///
/// Every returned non-null buffer is owned by the caller and must be freed
/// through [`EngineMemory::free`]. Null means the resource is absent.
pub trait RawEngineAbi: EngineMemory {
    /// NUL-terminated key for an engine note type.
    fn note_key(&mut self, note_type: i32) -> Ptr;

    /// Parses a resource pack; the returned handle stays owned by the engine.
    fn create_resource_pack(&mut self, data: Ptr, len: u64) -> Ptr;

    /// Writes a [`NOTE_INFO_LEN`] record at `info` and returns the pixels.
    fn note_texture(&mut self, pack: Ptr, key: Ptr, info: Ptr) -> Ptr;

    /// Writes a [`LINE_HEAD_INFO_LEN`] record at `info` and returns the pixels.
    fn line_head_texture(&mut self, pack: Ptr, info: Ptr) -> Ptr;

    /// Writes the payload length at `size` and returns the encoded audio.
    fn hitsound(&mut self, pack: Ptr, key: Ptr, size: Ptr) -> Ptr;

    fn load_container(&mut self, data: Ptr, len: u64) -> Ptr;

    /// Writes version, width and height as three u32 values at `info`.
    fn container_info(&mut self, handle: Ptr, info: Ptr);

    /// Writes width, height and byte length as three u64 values at `info`
    /// and returns the RGBA payload.
    fn decode_container(&mut self, handle: Ptr, info: Ptr) -> Ptr;

    fn release_container(&mut self, handle: Ptr);
}

pub fn fetch_note_key<A: RawEngineAbi>(abi: &mut A, note_type: i32) -> Result<Option<String>> {
    let mut scope = Marshaller::new(abi);
    let key = scope.engine().note_key(note_type);
    if key.is_null() {
        return Ok(None);
    }
    scope.adopt(key);
    scope.read_cstr(key).map(Some)
}

pub fn create_resource_pack<A: RawEngineAbi>(abi: &mut A, bytes: &[u8]) -> Result<Option<Ptr>> {
    let mut scope = Marshaller::new(abi);
    let data = scope.write_bytes(bytes)?;
    let pack = scope.engine().create_resource_pack(data, bytes.len() as u64);
    Ok((!pack.is_null()).then_some(pack))
}

pub fn fetch_note_texture<A: RawEngineAbi>(
    abi: &mut A,
    pack: Ptr,
    key: &str,
) -> Result<Option<NoteTextureData>> {
    let mut scope = Marshaller::new(abi);
    let info = scope.alloc(NOTE_INFO_LEN)?;
    let key = scope.write_cstr(key)?;
    let pixels = scope.engine().note_texture(pack, key, info);
    if pixels.is_null() {
        return Ok(None);
    }
    scope.adopt(pixels);

    let size = to_len(scope.read_u64(info.offset(40))?)?;
    Ok(Some(NoteTextureData {
        scale: scope.read_f64(info)?,
        head_split: scope.read_u64(info.offset(8))?,
        tail_split: scope.read_u64(info.offset(16))?,
        width: scope.read_u64(info.offset(24))?,
        height: scope.read_u64(info.offset(32))?,
        rgba: scope.copy_out(pixels, size)?,
    }))
}

pub fn fetch_line_head_texture<A: RawEngineAbi>(
    abi: &mut A,
    pack: Ptr,
) -> Result<Option<LineHeadTextureData>> {
    let mut scope = Marshaller::new(abi);
    let info = scope.alloc(LINE_HEAD_INFO_LEN)?;
    let pixels = scope.engine().line_head_texture(pack, info);
    if pixels.is_null() {
        return Ok(None);
    }
    scope.adopt(pixels);

    let size = to_len(scope.read_u64(info.offset(32))?)?;
    Ok(Some(LineHeadTextureData {
        scale: scope.read_f64(info)?,
        connect_point: scope.read_f64(info.offset(8))?,
        width: scope.read_u64(info.offset(16))?,
        height: scope.read_u64(info.offset(24))?,
        rgba: scope.copy_out(pixels, size)?,
    }))
}

pub fn fetch_hitsound<A: RawEngineAbi>(abi: &mut A, pack: Ptr, key: &str) -> Result<Option<Vec<u8>>> {
    let mut scope = Marshaller::new(abi);
    let size = scope.alloc(8)?;
    let key = scope.write_cstr(key)?;
    let audio = scope.engine().hitsound(pack, key, size);
    if audio.is_null() {
        return Ok(None);
    }
    scope.adopt(audio);

    let len = to_len(scope.read_u64(size)?)?;
    scope.copy_out(audio, len).map(Some)
}

pub(super) fn to_len(value: u64) -> Result<usize> {
    usize::try_from(value).map_err(|_| BridgeError::InvalidInput("engine reported an oversized buffer"))
}

/// A resource pack inside a raw-ABI engine, usable as a texture source.
#[derive(Debug)]
pub struct AbiPack<'a, A: RawEngineAbi> {
    pub abi: &'a mut A,
    pub pack: Ptr,
}

impl<A: RawEngineAbi> TextureSource for AbiPack<'_, A> {
    fn note_texture(&mut self, kind: NoteKind) -> Result<Option<NoteTextureData>> {
        fetch_note_texture(&mut *self.abi, self.pack, kind.key())
    }

    fn line_head_texture(&mut self) -> Result<Option<LineHeadTextureData>> {
        fetch_line_head_texture(&mut *self.abi, self.pack)
    }
}
