use image::RgbaImage;

use super::abi::to_len;
use super::{Marshaller, Ptr, RawEngineAbi};
use crate::{BridgeError, Result};

/// Handle to a parsed image container living inside the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContainerHandle(Ptr);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerInfo {
    pub version: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedContainer {
    pub width: u64,
    pub height: u64,
    pub data: Vec<u8>,
}

impl DecodedContainer {
    pub fn into_image(self) -> Result<RgbaImage> {
        let width = u32::try_from(self.width).map_err(|_| BridgeError::decode("container too wide"))?;
        let height = u32::try_from(self.height).map_err(|_| BridgeError::decode("container too tall"))?;
        RgbaImage::from_raw(width, height, self.data)
            .ok_or_else(|| BridgeError::decode(format!("container payload does not fill {width}x{height}")))
    }
}

/// Side utility decoding the engine's custom picture container. Independent
/// of the player; it only needs the engine's raw entry points.
#[derive(Debug)]
pub struct ContainerDecoder<A: RawEngineAbi> {
    abi: A,
}

impl<A: RawEngineAbi> ContainerDecoder<A> {
    pub fn new(abi: A) -> Self {
        Self { abi }
    }

    /// Parses `bytes`. `None` means the engine did not recognise them.
    pub fn load(&mut self, bytes: &[u8]) -> Result<Option<ContainerHandle>> {
        let mut scope = Marshaller::new(&mut self.abi);
        let data = scope.write_bytes(bytes)?;
        let handle = scope.engine().load_container(data, bytes.len() as u64);
        Ok((!handle.is_null()).then_some(ContainerHandle(handle)))
    }

    pub fn info(&mut self, handle: ContainerHandle) -> Result<ContainerInfo> {
        let mut scope = Marshaller::new(&mut self.abi);
        let info = scope.alloc(4 * 3)?;
        scope.engine().container_info(handle.0, info);
        Ok(ContainerInfo {
            version: scope.read_u32(info)?,
            width: scope.read_u32(info.offset(4))?,
            height: scope.read_u32(info.offset(8))?,
        })
    }

    pub fn decode(&mut self, handle: ContainerHandle) -> Result<DecodedContainer> {
        let mut scope = Marshaller::new(&mut self.abi);
        let info = scope.alloc(8 * 3)?;
        let pixels = scope.engine().decode_container(handle.0, info);
        if pixels.is_null() {
            return Err(BridgeError::decode("engine failed to decode image container"));
        }
        scope.adopt(pixels);

        let size = to_len(scope.read_u64(info.offset(16))?)?;
        Ok(DecodedContainer {
            width: scope.read_u64(info)?,
            height: scope.read_u64(info.offset(8))?,
            data: scope.copy_out(pixels, size)?,
        })
    }

    pub fn free(&mut self, handle: ContainerHandle) {
        self.abi.release_container(handle.0);
    }

    pub fn into_inner(self) -> A {
        self.abi
    }
}
