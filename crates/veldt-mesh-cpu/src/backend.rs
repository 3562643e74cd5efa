use std::fmt::Debug;

use thiserror::Error;
use veldt_geom::Mat4;

use crate::mesh_build::MeshBuild;
use crate::palette::TextureId;
use crate::sky::SkySample;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("mesh has {vertices} vertices; the backend index format holds at most {max}")]
    MeshTooLarge { vertices: usize, max: usize },
    #[error("unknown mesh handle {0}")]
    UnknownHandle(String),
    #[error("upload failed: {0}")]
    Upload(String),
}

/// The renderer as seen by the streaming and vegetation code. Every call
/// happens on the thread that owns the graphics context.
pub trait GraphicsBackend {
    type Handle: Copy + Eq + Debug;

    fn upload_mesh(&mut self, mesh: &MeshBuild) -> Result<Self::Handle, BackendError>;

    /// Replace the instance list drawn with `handle`. An empty list hides it.
    fn upload_instance_transforms(
        &mut self,
        handle: Self::Handle,
        transforms: &[Mat4],
    ) -> Result<(), BackendError>;

    /// Queue a draw for this frame. Instanced meshes draw every instance as
    /// `instance * transform`, so `transform` acts in model space.
    fn draw(&mut self, handle: Self::Handle, transform: &Mat4, textures: &[TextureId]);

    /// Queue the sky dome behind everything else this frame. `sky` drives the
    /// dome colours and the sun light on other draws.
    fn draw_sky(&mut self, handle: Self::Handle, transform: &Mat4, _sky: &SkySample) {
        self.draw(handle, transform, &[]);
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum RecordedCall {
    UploadMesh { handle: u32, vertices: usize, triangles: usize },
    UploadInstances { handle: u32, count: usize },
    Draw { handle: u32, transform: Mat4, textures: Vec<TextureId> },
    DrawSky { handle: u32, transform: Mat4, hours: f32 },
}

/// Backend that keeps a log of calls instead of touching a GPU.
#[derive(Default, Debug)]
pub struct RecordingBackend {
    pub calls: Vec<RecordedCall>,
    next: u32,
    instances: Vec<(u32, usize)>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mesh_uploads(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, RecordedCall::UploadMesh { .. }))
            .count()
    }

    pub fn draws(&self) -> impl Iterator<Item = &RecordedCall> {
        self.calls
            .iter()
            .filter(|c| matches!(c, RecordedCall::Draw { .. }))
    }

    /// Instance count most recently uploaded for `handle`.
    pub fn instance_count(&self, handle: u32) -> usize {
        self.instances
            .iter()
            .find(|(h, _)| *h == handle)
            .map(|(_, n)| *n)
            .unwrap_or(0)
    }

    pub fn sky_draws(&self) -> impl Iterator<Item = &RecordedCall> {
        self.calls
            .iter()
            .filter(|c| matches!(c, RecordedCall::DrawSky { .. }))
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }
}

impl GraphicsBackend for RecordingBackend {
    type Handle = u32;

    fn upload_mesh(&mut self, mesh: &MeshBuild) -> Result<u32, BackendError> {
        let handle = self.next;
        self.next += 1;
        self.calls.push(RecordedCall::UploadMesh {
            handle,
            vertices: mesh.vertex_count(),
            triangles: mesh.triangle_count(),
        });
        Ok(handle)
    }

    fn upload_instance_transforms(
        &mut self,
        handle: u32,
        transforms: &[Mat4],
    ) -> Result<(), BackendError> {
        if handle >= self.next {
            return Err(BackendError::UnknownHandle(handle.to_string()));
        }
        match self.instances.iter_mut().find(|(h, _)| *h == handle) {
            Some(entry) => entry.1 = transforms.len(),
            None => self.instances.push((handle, transforms.len())),
        }
        self.calls.push(RecordedCall::UploadInstances {
            handle,
            count: transforms.len(),
        });
        Ok(())
    }

    fn draw(&mut self, handle: u32, transform: &Mat4, textures: &[TextureId]) {
        self.calls.push(RecordedCall::Draw {
            handle,
            transform: *transform,
            textures: textures.to_vec(),
        });
    }

    fn draw_sky(&mut self, handle: u32, transform: &Mat4, sky: &SkySample) {
        self.calls.push(RecordedCall::DrawSky {
            handle,
            transform: *transform,
            hours: sky.hours,
        });
    }
}
