use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::LoadError;

/// The Draco extension, the only primitive-level codec glTF defines.
pub const DRACO_EXTENSION: &str = "KHR_draco_mesh_compression";

/// A compressed glTF primitive, resolved to its raw stream.
#[derive(Clone, Debug)]
pub struct CompressedPrimitive<'a> {
    /// Extension the primitive was compressed with.
    pub extension: &'a str,
    /// Bytes of the buffer view the extension points at.
    pub data: &'a [u8],
    /// glTF attribute semantics mapped to the codec's attribute ids.
    pub attributes: BTreeMap<String, u64>,
}

impl CompressedPrimitive<'_> {
    /// Codec id of a glTF attribute such as `POSITION`.
    pub fn attribute(&self, semantic: &str) -> Option<u64> {
        self.attributes.get(semantic).copied()
    }
}

/// Vertex streams produced by a [`MeshDecoder`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DecodedPrimitive {
    pub positions: Vec<[f32; 3]>,
    /// Generated from the triangles when absent.
    pub normals: Option<Vec<[f32; 3]>>,
    pub uvs: Option<Vec<[f32; 2]>>,
    /// Triangle list. Empty means the positions are already one.
    pub indices: Vec<u32>,
}

/// Decompresses primitives for one glTF compression extension.
///
/// Decoders run on the loader thread.
pub trait MeshDecoder: Send + Sync {
    fn decode(&self, primitive: &CompressedPrimitive<'_>) -> Result<DecodedPrimitive, LoadError>;
}

impl<F> MeshDecoder for F
where
    F: Fn(&CompressedPrimitive<'_>) -> Result<DecodedPrimitive, LoadError> + Send + Sync,
{
    fn decode(&self, primitive: &CompressedPrimitive<'_>) -> Result<DecodedPrimitive, LoadError> {
        self(primitive)
    }
}

/// Decoders keyed by the extension they handle.
#[derive(Clone, Default)]
pub struct MeshDecoders {
    by_extension: BTreeMap<String, Arc<dyn MeshDecoder>>,
}

impl MeshDecoders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `decoder` for `extension`, replacing any earlier one.
    pub fn with(mut self, extension: impl Into<String>, decoder: impl MeshDecoder + 'static) -> Self {
        self.by_extension.insert(extension.into(), Arc::new(decoder));
        self
    }

    pub fn get(&self, extension: &str) -> Option<&dyn MeshDecoder> {
        self.by_extension.get(extension).map(|decoder| decoder.as_ref())
    }

    pub fn handles(&self, extension: &str) -> bool {
        self.by_extension.contains_key(extension)
    }
}

impl fmt::Debug for MeshDecoders {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.by_extension.keys()).finish()
    }
}
