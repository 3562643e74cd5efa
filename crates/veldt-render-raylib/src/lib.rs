//! Raylib implementation of the terrain `GraphicsBackend`: mesh upload, textures, and the splat, instancing and sky shaders.
// Unsafe is required for raw mesh buffers, materials and rlgl state.

use std::ffi::c_void;
use std::path::Path;

use hashbrown::HashMap;
use raylib::prelude::*;
use veldt_geom::Mat4;
use veldt_mesh_cpu::{
    BackendError, GraphicsBackend, MeshBuild, SkySample, TextureId, TexturePalette,
};

pub mod conv {
    use veldt_geom::{Aabb, Mat4, Vec3};

    pub fn vec3_to_rl(v: Vec3) -> raylib::prelude::Vector3 {
        raylib::prelude::Vector3::new(v.x, v.y, v.z)
    }

    pub fn vec3_from_rl(v: raylib::prelude::Vector3) -> Vec3 {
        Vec3::new(v.x, v.y, v.z)
    }

    pub fn aabb_to_rl(bb: Aabb) -> raylib::core::math::BoundingBox {
        raylib::core::math::BoundingBox::new(vec3_to_rl(bb.min), vec3_to_rl(bb.max))
    }

    /// Both sides are column-major; raylib names element (row r, col c) `m{4c+r}`.
    pub fn mat4_to_ffi(m: &Mat4) -> raylib::ffi::Matrix {
        let [c0, c1, c2, c3] = [m.col(0), m.col(1), m.col(2), m.col(3)];
        raylib::ffi::Matrix {
            m0: c0[0],
            m1: c0[1],
            m2: c0[2],
            m3: c0[3],
            m4: c1[0],
            m5: c1[1],
            m6: c1[2],
            m7: c1[3],
            m8: c2[0],
            m9: c2[1],
            m10: c2[2],
            m11: c2[3],
            m12: c3[0],
            m13: c3[1],
            m14: c3[2],
            m15: c3[3],
        }
    }
}

/// Raylib meshes index with `u16`.
pub const MAX_MESH_VERTICES: usize = u16::MAX as usize + 1;

/// Texture slots the splat shader samples. Material map 7 is the cubemap slot.
pub const MAX_SPLAT_SLOTS: usize = 7;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MeshHandle(pub u32);

#[derive(Clone, Copy, Debug, Default)]
pub struct DrawStats {
    pub draw_calls: usize,
    pub instances: usize,
    pub meshes: usize,
}

struct Instances {
    transforms: Vec<Mat4>,
    raw: Vec<raylib::ffi::Matrix>,
}

impl Instances {
    fn new(transforms: &[Mat4]) -> Self {
        Self {
            transforms: transforms.to_vec(),
            raw: transforms.iter().map(conv::mat4_to_ffi).collect(),
        }
    }
}

struct GpuMesh {
    /// `None` for an empty template; it keeps its handle but draws nothing.
    mesh: Option<raylib::core::models::Mesh>,
    /// `None` for plain meshes; `Some` once instance transforms were uploaded.
    instances: Option<Instances>,
}

struct DrawCmd {
    handle: MeshHandle,
    transform: Mat4,
    material: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum MaterialKind {
    Plain,
    Splat,
    Instanced,
}

impl MaterialKind {
    /// Instanced meshes take the instancing shader, multi-texture draws the
    /// splat shader, everything else raylib's default.
    fn choose(texture_count: usize, instanced: bool, has_splat: bool, has_instancing: bool) -> Self {
        if instanced && has_instancing {
            Self::Instanced
        } else if texture_count > 1 && has_splat {
            Self::Splat
        } else {
            Self::Plain
        }
    }
}

struct MaterialSet {
    textures: Vec<TextureId>,
    kind: MaterialKind,
    material: raylib::ffi::Material,
}

/// Sun light shared by the lit shaders.
#[derive(Clone, Copy, Debug)]
struct SunLocs {
    dir: i32,
    daylight: i32,
}

impl SunLocs {
    fn find(shader: &Shader) -> Self {
        Self {
            dir: shader.get_shader_location("sunDir"),
            daylight: shader.get_shader_location("daylight"),
        }
    }

    fn set(&self, shader: &Shader, sun: &SkySample) {
        let raw: raylib::ffi::Shader = *shader.as_ref();
        set_vec3(raw, self.dir, [sun.sun_dir.x, sun.sun_dir.y, sun.sun_dir.z]);
        set_float(raw, self.daylight, sun.daylight);
    }
}

fn set_float(shader: raylib::ffi::Shader, loc: i32, v: f32) {
    if loc < 0 {
        return;
    }
    unsafe {
        raylib::ffi::SetShaderValue(
            shader,
            loc,
            &v as *const f32 as *const c_void,
            raylib::consts::ShaderUniformDataType::SHADER_UNIFORM_FLOAT as i32,
        );
    }
}

fn set_vec3(shader: raylib::ffi::Shader, loc: i32, v: [f32; 3]) {
    if loc < 0 {
        return;
    }
    unsafe {
        raylib::ffi::SetShaderValue(
            shader,
            loc,
            v.as_ptr() as *const c_void,
            raylib::consts::ShaderUniformDataType::SHADER_UNIFORM_VEC3 as i32,
        );
    }
}

fn load_pair(rl: &mut RaylibHandle, thread: &RaylibThread, base: &Path, name: &str) -> Shader {
    let vs = base.join(format!("assets/shaders/{name}.vs"));
    let fs = base.join(format!("assets/shaders/{name}.fs"));
    rl.load_shader(
        thread,
        Some(vs.to_string_lossy().as_ref()),
        Some(fs.to_string_lossy().as_ref()),
    )
}

/// Height-band splat shader for terrain chunks.
pub struct TerrainShader {
    shader: Shader,
    loc_slot_ids: i32,
    loc_slot_count: i32,
    sun: SunLocs,
}

impl TerrainShader {
    pub fn load(rl: &mut RaylibHandle, thread: &RaylibThread, base: &Path) -> Self {
        let shader = load_pair(rl, thread, base, "terrain");
        let loc_slot_ids = shader.get_shader_location("slotIds");
        let loc_slot_count = shader.get_shader_location("slotCount");
        let first_map = raylib::consts::ShaderLocationIndex::SHADER_LOC_MAP_ALBEDO as usize;
        for slot in 0..MAX_SPLAT_SLOTS {
            let loc = shader.get_shader_location(&format!("texture{slot}"));
            unsafe {
                *shader.locs.add(first_map + slot) = loc;
            }
        }
        let sun = SunLocs::find(&shader);
        Self {
            shader,
            loc_slot_ids,
            loc_slot_count,
            sun,
        }
    }

    fn set_slots(&self, textures: &[TextureId]) {
        let mut ids = [-1.0_f32; MAX_SPLAT_SLOTS];
        for (slot, t) in textures.iter().take(MAX_SPLAT_SLOTS).enumerate() {
            ids[slot] = f32::from(t.0);
        }
        let count = textures.len().min(MAX_SPLAT_SLOTS) as i32;
        let raw: raylib::ffi::Shader = *self.shader.as_ref();
        unsafe {
            if self.loc_slot_ids >= 0 {
                raylib::ffi::SetShaderValueV(
                    raw,
                    self.loc_slot_ids,
                    ids.as_ptr() as *const c_void,
                    raylib::consts::ShaderUniformDataType::SHADER_UNIFORM_FLOAT as i32,
                    MAX_SPLAT_SLOTS as i32,
                );
            }
            if self.loc_slot_count >= 0 {
                raylib::ffi::SetShaderValue(
                    raw,
                    self.loc_slot_count,
                    &count as *const i32 as *const c_void,
                    raylib::consts::ShaderUniformDataType::SHADER_UNIFORM_INT as i32,
                );
            }
        }
    }
}

/// Vegetation shader: per-instance matrices arrive as the `instanceTransform`
/// vertex attribute, the shared bucket transform as `localTransform`.
pub struct InstanceShader {
    shader: Shader,
    loc_local: i32,
    sun: SunLocs,
}

impl InstanceShader {
    pub fn load(rl: &mut RaylibHandle, thread: &RaylibThread, base: &Path) -> Self {
        let shader = load_pair(rl, thread, base, "instanced");
        let raw: raylib::ffi::Shader = *shader.as_ref();
        let attrib =
            unsafe { raylib::ffi::GetShaderLocationAttrib(raw, c"instanceTransform".as_ptr()) };
        let slot = raylib::consts::ShaderLocationIndex::SHADER_LOC_VERTEX_INSTANCE_TX as usize;
        unsafe {
            *shader.locs.add(slot) = attrib;
        }
        let loc_local = shader.get_shader_location("localTransform");
        let sun = SunLocs::find(&shader);
        Self {
            shader,
            loc_local,
            sun,
        }
    }

    fn set_local(&self, m: &Mat4) {
        if self.loc_local < 0 {
            return;
        }
        let raw: raylib::ffi::Shader = *self.shader.as_ref();
        unsafe {
            raylib::ffi::SetShaderValueMatrix(raw, self.loc_local, conv::mat4_to_ffi(m));
        }
    }
}

/// Dome gradient from horizon to zenith with a sun glow.
pub struct SkyShader {
    shader: Shader,
    loc_horizon: i32,
    loc_zenith: i32,
    loc_sun_pos: i32,
    loc_radius: i32,
    loc_hours: i32,
    sun: SunLocs,
}

impl SkyShader {
    pub fn load(rl: &mut RaylibHandle, thread: &RaylibThread, base: &Path) -> Self {
        let shader = load_pair(rl, thread, base, "sky");
        Self {
            loc_horizon: shader.get_shader_location("horizonColor"),
            loc_zenith: shader.get_shader_location("zenithColor"),
            loc_sun_pos: shader.get_shader_location("sunPos"),
            loc_radius: shader.get_shader_location("radius"),
            loc_hours: shader.get_shader_location("hours"),
            sun: SunLocs::find(&shader),
            shader,
        }
    }

    fn set(&self, sky: &SkySample) {
        let raw: raylib::ffi::Shader = *self.shader.as_ref();
        set_vec3(raw, self.loc_horizon, sky.horizon);
        set_vec3(raw, self.loc_zenith, sky.zenith);
        set_vec3(raw, self.loc_sun_pos, [sky.sun_pos.x, sky.sun_pos.y, sky.sun_pos.z]);
        set_float(raw, self.loc_radius, sky.sun_pos.length());
        set_float(raw, self.loc_hours, sky.hours);
        self.sun.set(&self.shader, sky);
    }
}

/// Every shader the backend can use. A missing one falls back to raylib's
/// default material for that kind of draw.
#[derive(Default)]
pub struct ShaderSet {
    pub terrain: Option<TerrainShader>,
    pub instanced: Option<InstanceShader>,
    pub sky: Option<SkyShader>,
}

impl ShaderSet {
    /// Load all shaders from `base/assets/shaders`.
    pub fn load(rl: &mut RaylibHandle, thread: &RaylibThread, base: &Path) -> Self {
        Self {
            terrain: Some(TerrainShader::load(rl, thread, base)),
            instanced: Some(InstanceShader::load(rl, thread, base)),
            sky: Some(SkyShader::load(rl, thread, base)),
        }
    }
}

/// Light used until the session reports a sky sample.
fn default_sun() -> SkySample {
    let dir = veldt_geom::Vec3::new(-0.3, 1.0, -0.2).normalized();
    SkySample {
        hours: 6.0,
        daylight: 1.0,
        sun_dir: dir,
        sun_pos: dir,
        horizon: [0.61, 0.77, 0.91],
        zenith: [0.29, 0.49, 0.8],
    }
}

/// Uploads immediately, queues draws, and replays them in `flush` inside a
/// 3D scope. Instanced meshes go out as one `DrawMeshInstanced` per draw when
/// the instancing shader is loaded, one `DrawMesh` per instance otherwise.
pub struct RaylibBackend {
    meshes: Vec<GpuMesh>,
    textures: HashMap<TextureId, Texture2D>,
    shaders: ShaderSet,
    materials: Vec<MaterialSet>,
    sky_material: Option<raylib::ffi::Material>,
    queue: Vec<DrawCmd>,
    sky: Option<(MeshHandle, Mat4)>,
    sun: SkySample,
    last: DrawStats,
}

impl RaylibBackend {
    /// Load every palette texture. Missing files fall back to raylib's white
    /// texture with a warning.
    pub fn new(
        rl: &mut RaylibHandle,
        thread: &RaylibThread,
        palette: &TexturePalette,
        shaders: ShaderSet,
    ) -> Self {
        let mut textures = HashMap::new();
        for (id, name, path) in palette.iter() {
            match rl.load_texture(thread, path) {
                Ok(t) => {
                    t.set_texture_filter(thread, TextureFilter::TEXTURE_FILTER_BILINEAR);
                    t.set_texture_wrap(thread, TextureWrap::TEXTURE_WRAP_REPEAT);
                    textures.insert(id, t);
                }
                Err(e) => log::warn!("texture `{name}` ({path}) not loaded: {e}"),
            }
        }
        let on_off = |b: bool| if b { "on" } else { "off" };
        log::info!(
            "raylib backend: {}/{} textures loaded, splat shader {}, instancing {}, sky {}",
            textures.len(),
            palette.len(),
            on_off(shaders.terrain.is_some()),
            on_off(shaders.instanced.is_some()),
            on_off(shaders.sky.is_some())
        );
        let sky_material = shaders.sky.as_ref().map(|sky| {
            let mut material = unsafe { raylib::ffi::LoadMaterialDefault() };
            material.shader = *sky.shader.as_ref();
            material
        });
        Self {
            meshes: Vec::new(),
            textures,
            shaders,
            materials: Vec::new(),
            sky_material,
            queue: Vec::new(),
            sky: None,
            sun: default_sun(),
            last: DrawStats::default(),
        }
    }

    fn gpu(&self, handle: MeshHandle) -> Result<&GpuMesh, BackendError> {
        self.meshes
            .get(handle.0 as usize)
            .ok_or_else(|| BackendError::UnknownHandle(format!("{handle:?}")))
    }

    fn material_for(&mut self, textures: &[TextureId], instanced: bool) -> usize {
        let kind = MaterialKind::choose(
            textures.len(),
            instanced,
            self.shaders.terrain.is_some(),
            self.shaders.instanced.is_some(),
        );
        if let Some(i) = self
            .materials
            .iter()
            .position(|m| m.kind == kind && m.textures == textures)
        {
            return i;
        }
        let mut material = unsafe { raylib::ffi::LoadMaterialDefault() };
        let slots = if kind == MaterialKind::Splat { MAX_SPLAT_SLOTS } else { 1 };
        for (slot, id) in textures.iter().take(slots).enumerate() {
            if let Some(tex) = self.textures.get(id) {
                unsafe {
                    (*material.maps.add(slot)).texture = *tex.as_ref();
                }
            }
        }
        match kind {
            MaterialKind::Splat => {
                if let Some(ts) = &self.shaders.terrain {
                    material.shader = *ts.shader.as_ref();
                }
            }
            MaterialKind::Instanced => {
                if let Some(is) = &self.shaders.instanced {
                    material.shader = *is.shader.as_ref();
                }
            }
            MaterialKind::Plain => {}
        }
        self.materials.push(MaterialSet {
            textures: textures.to_vec(),
            kind,
            material,
        });
        self.materials.len() - 1
    }

    /// Replay this frame's queued draws. Call between `begin_mode3D` and its end.
    pub fn flush<D: RaylibDraw3D>(&mut self, _d3: &mut D) -> DrawStats {
        let mut stats = DrawStats {
            meshes: self.meshes.len(),
            ..DrawStats::default()
        };
        // Terrain winding faces down and foliage is single-layer; draw both sides.
        unsafe {
            raylib::ffi::rlDisableBackfaceCulling();
        }
        if let Some((handle, transform)) = self.sky.take() {
            if self.draw_dome(handle, &transform) {
                stats.draw_calls += 1;
            }
        }
        if let Some(ts) = &self.shaders.terrain {
            ts.sun.set(&ts.shader, &self.sun);
        }
        if let Some(is) = &self.shaders.instanced {
            is.sun.set(&is.shader, &self.sun);
        }
        for cmd in self.queue.drain(..) {
            let Some(gpu) = self.meshes.get(cmd.handle.0 as usize) else {
                continue;
            };
            let Some(mesh) = &gpu.mesh else {
                continue;
            };
            let Some(set) = self.materials.get(cmd.material) else {
                continue;
            };
            if set.kind == MaterialKind::Splat {
                if let Some(ts) = &self.shaders.terrain {
                    ts.set_slots(&set.textures);
                }
            }
            let raw_mesh: raylib::ffi::Mesh = *mesh.as_ref();
            match (&gpu.instances, &self.shaders.instanced) {
                (None, _) => {
                    let m = conv::mat4_to_ffi(&cmd.transform);
                    unsafe {
                        raylib::ffi::DrawMesh(raw_mesh, set.material, m);
                    }
                    stats.draw_calls += 1;
                }
                (Some(instances), Some(is)) if set.kind == MaterialKind::Instanced => {
                    if instances.raw.is_empty() {
                        continue;
                    }
                    is.set_local(&cmd.transform);
                    unsafe {
                        raylib::ffi::DrawMeshInstanced(
                            raw_mesh,
                            set.material,
                            instances.raw.as_ptr(),
                            instances.raw.len() as i32,
                        );
                    }
                    stats.draw_calls += 1;
                    stats.instances += instances.raw.len();
                }
                (Some(instances), _) => {
                    for inst in &instances.transforms {
                        let m = conv::mat4_to_ffi(&(*inst * cmd.transform));
                        unsafe {
                            raylib::ffi::DrawMesh(raw_mesh, set.material, m);
                        }
                    }
                    stats.draw_calls += instances.transforms.len();
                    stats.instances += instances.transforms.len();
                }
            }
        }
        unsafe {
            raylib::ffi::rlEnableBackfaceCulling();
        }
        self.last = stats;
        stats
    }

    /// Dome behind everything: drawn first with depth writes off.
    fn draw_dome(&self, handle: MeshHandle, transform: &Mat4) -> bool {
        let (Some(material), Some(shader)) = (self.sky_material, &self.shaders.sky) else {
            return false;
        };
        let Some(mesh) = self.meshes.get(handle.0 as usize).and_then(|g| g.mesh.as_ref()) else {
            return false;
        };
        shader.set(&self.sun);
        let raw_mesh: raylib::ffi::Mesh = *mesh.as_ref();
        unsafe {
            raylib::ffi::rlDisableDepthMask();
            raylib::ffi::DrawMesh(raw_mesh, material, conv::mat4_to_ffi(transform));
            raylib::ffi::rlEnableDepthMask();
        }
        true
    }

    /// Sky colours of the most recent frame, for the clear colour.
    pub fn sky_sample(&self) -> &SkySample {
        &self.sun
    }

    pub fn last_stats(&self) -> DrawStats {
        self.last
    }
}

impl GraphicsBackend for RaylibBackend {
    type Handle = MeshHandle;

    fn upload_mesh(&mut self, mb: &MeshBuild) -> Result<MeshHandle, BackendError> {
        let v_count = mb.vertex_count();
        if v_count > MAX_MESH_VERTICES {
            return Err(BackendError::MeshTooLarge {
                vertices: v_count,
                max: MAX_MESH_VERTICES,
            });
        }
        if v_count == 0 || mb.idx.is_empty() {
            self.meshes.push(GpuMesh {
                mesh: None,
                instances: None,
            });
            return Ok(MeshHandle((self.meshes.len() - 1) as u32));
        }
        if mb.idx.len() % 3 != 0 {
            return Err(BackendError::Upload(format!(
                "index count {} is not a multiple of 3",
                mb.idx.len()
            )));
        }
        let i_count = mb.idx.len();
        let mut raw: raylib::ffi::Mesh = unsafe { std::mem::zeroed() };
        raw.vertexCount = v_count as i32;
        raw.triangleCount = (i_count / 3) as i32;
        unsafe {
            let fbytes = |n: usize| (n * std::mem::size_of::<f32>()) as u32;
            raw.vertices = raylib::ffi::MemAlloc(fbytes(v_count * 3)) as *mut f32;
            raw.normals = raylib::ffi::MemAlloc(fbytes(v_count * 3)) as *mut f32;
            raw.texcoords = raylib::ffi::MemAlloc(fbytes(v_count * 2)) as *mut f32;
            raw.texcoords2 = raylib::ffi::MemAlloc(fbytes(v_count * 2)) as *mut f32;
            raw.colors = raylib::ffi::MemAlloc((v_count * 4) as u32) as *mut u8;
            raw.indices =
                raylib::ffi::MemAlloc((i_count * std::mem::size_of::<u16>()) as u32) as *mut u16;
            std::ptr::copy_nonoverlapping(mb.pos.as_ptr(), raw.vertices, v_count * 3);
            std::ptr::copy_nonoverlapping(mb.norm.as_ptr(), raw.normals, v_count * 3);
            std::ptr::copy_nonoverlapping(mb.uv.as_ptr(), raw.texcoords, v_count * 2);
            std::ptr::copy_nonoverlapping(mb.tex.as_ptr(), raw.texcoords2, v_count * 2);
            std::ptr::copy_nonoverlapping(mb.col.as_ptr(), raw.colors, v_count * 4);
            for (k, &i) in mb.idx.iter().enumerate() {
                *raw.indices.add(k) = i as u16;
            }
        }
        let mut mesh = unsafe { raylib::core::models::Mesh::from_raw(raw) };
        unsafe {
            mesh.upload(false);
        }
        self.meshes.push(GpuMesh {
            mesh: Some(mesh),
            instances: None,
        });
        Ok(MeshHandle((self.meshes.len() - 1) as u32))
    }

    fn upload_instance_transforms(
        &mut self,
        handle: MeshHandle,
        transforms: &[Mat4],
    ) -> Result<(), BackendError> {
        self.gpu(handle)?;
        if let Some(gpu) = self.meshes.get_mut(handle.0 as usize) {
            gpu.instances = Some(Instances::new(transforms));
        }
        Ok(())
    }

    fn draw(&mut self, handle: MeshHandle, transform: &Mat4, textures: &[TextureId]) {
        let instanced = self
            .meshes
            .get(handle.0 as usize)
            .is_some_and(|g| g.instances.is_some());
        let material = self.material_for(textures, instanced);
        self.queue.push(DrawCmd {
            handle,
            transform: *transform,
            material,
        });
    }

    fn draw_sky(&mut self, handle: MeshHandle, transform: &Mat4, sky: &SkySample) {
        self.sun = *sky;
        self.sky = Some((handle, *transform));
    }
}

impl Drop for RaylibBackend {
    fn drop(&mut self) {
        // Textures and shaders unload through their own drops; only the map arrays are ours.
        let maps = self
            .materials
            .drain(..)
            .map(|set| set.material.maps)
            .chain(self.sky_material.take().map(|m| m.maps));
        for map in maps {
            unsafe {
                raylib::ffi::MemFree(map as *mut c_void);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use veldt_geom::Vec3;

    use super::*;

    #[test]
    fn instanced_meshes_pick_the_instancing_shader() {
        assert_eq!(MaterialKind::choose(1, true, true, true), MaterialKind::Instanced);
        assert_eq!(MaterialKind::choose(5, true, true, true), MaterialKind::Instanced);
        assert_eq!(MaterialKind::choose(1, true, true, false), MaterialKind::Plain);
        assert_eq!(MaterialKind::choose(5, false, true, true), MaterialKind::Splat);
        assert_eq!(MaterialKind::choose(5, false, false, true), MaterialKind::Plain);
        assert_eq!(MaterialKind::choose(1, false, true, true), MaterialKind::Plain);
    }

    #[test]
    fn instance_matrices_convert_once_at_upload() {
        let transforms = [
            Mat4::translation(Vec3::new(1.0, 2.0, 3.0)),
            Mat4::scale(5.0) * Mat4::rotation_y(0.5),
        ];
        let inst = Instances::new(&transforms);
        assert_eq!(inst.transforms, transforms);
        assert_eq!(inst.raw.len(), 2);
        let t = &inst.raw[0];
        assert_eq!((t.m12, t.m13, t.m14, t.m15), (1.0, 2.0, 3.0, 1.0));
        let s = &inst.raw[1];
        assert_eq!(s.m0, transforms[1].col(0)[0]);
        assert_eq!(s.m8, transforms[1].col(2)[0]);
    }
}
