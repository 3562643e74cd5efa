use std::sync::Arc;

use veldt_geom::Mat4;
use veldt_mesh_cpu::{BackendError, GraphicsBackend, MeshBuild, TextureId};

struct BucketPart<H> {
    mesh: Arc<MeshBuild>,
    texture: Option<TextureId>,
    handle: Option<H>,
}

/// A mesh template plus every world transform it is drawn at. The list is
/// rebuilt wholesale; any change marks the bucket for re-upload.
pub struct InstanceBucket<H> {
    label: String,
    parts: Vec<BucketPart<H>>,
    transforms: Vec<Mat4>,
    local: Mat4,
    sways: bool,
    dirty: bool,
}

impl<H: Copy> InstanceBucket<H> {
    /// `local` is applied in model space under every instance (LOD scaling).
    pub fn new(
        label: impl Into<String>,
        parts: Vec<(Arc<MeshBuild>, Option<TextureId>)>,
        local: Mat4,
        sways: bool,
    ) -> Self {
        Self {
            label: label.into(),
            parts: parts
                .into_iter()
                .map(|(mesh, texture)| BucketPart {
                    mesh,
                    texture,
                    handle: None,
                })
                .collect(),
            transforms: Vec::new(),
            local,
            sways,
            dirty: false,
        }
    }

    #[inline]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    #[inline]
    pub fn transforms(&self) -> &[Mat4] {
        &self.transforms
    }

    pub fn extend(&mut self, transforms: impl IntoIterator<Item = Mat4>) {
        let before = self.transforms.len();
        self.transforms.extend(transforms);
        self.dirty |= self.transforms.len() != before;
    }

    pub fn clear(&mut self) {
        if !self.transforms.is_empty() {
            self.transforms.clear();
            self.dirty = true;
        }
    }

    /// Upload templates on first use, then the instance list. Returns whether
    /// anything was sent.
    pub fn upload<B>(&mut self, backend: &mut B) -> Result<bool, BackendError>
    where
        B: GraphicsBackend<Handle = H>,
    {
        if !self.dirty {
            return Ok(false);
        }
        for part in &mut self.parts {
            let handle = match part.handle {
                Some(h) => h,
                None => {
                    let h = backend.upload_mesh(&part.mesh)?;
                    part.handle = Some(h);
                    h
                }
            };
            backend.upload_instance_transforms(handle, &self.transforms)?;
        }
        self.dirty = false;
        Ok(true)
    }

    pub fn draw<B>(&self, backend: &mut B, sway: &Mat4)
    where
        B: GraphicsBackend<Handle = H>,
    {
        if self.transforms.is_empty() {
            return;
        }
        let transform = if self.sways { *sway * self.local } else { self.local };
        for part in &self.parts {
            if let Some(handle) = part.handle {
                let textures = part.texture.as_slice();
                backend.draw(handle, &transform, textures);
            }
        }
    }
}
