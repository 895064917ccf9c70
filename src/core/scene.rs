// Copyright @yucwang 2026

use crate::core::bsdf::BSDF;
use crate::core::distribution::Distribution1D;
use crate::core::emitter::Emitter;
use crate::core::integrator::Integrator;
use crate::core::interaction::SurfaceIntersection;
use crate::core::sensor::Sensor;
use crate::core::shape::Shape;
use crate::emitters::area::AreaEmitter;
use crate::error::{RenderError, Result, SceneLoadError};
use crate::integrators::progressive::ProgressiveIntegrator;
use crate::math::constants::{ Float, Vector3f };
use crate::math::ray::Ray3f;
use crate::math::spectrum::{RGBSpectrum, Spectrum};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct SceneObject {
    pub shape: Arc<dyn Shape>,
    pub material: Arc<dyn BSDF>,
    pub emission: RGBSpectrum,
    pub name: Option<String>,
}

impl SceneObject {
    pub fn new(shape: Arc<dyn Shape>, material: Arc<dyn BSDF>) -> Self {
        Self { shape, material, emission: RGBSpectrum::zeros(), name: None }
    }

    pub fn with_emission(shape: Arc<dyn Shape>, material: Arc<dyn BSDF>, emission: RGBSpectrum) -> Self {
        Self { shape, material, emission, name: None }
    }

    pub fn with_name(mut self, name: String) -> Self {
        self.name = Some(name);
        self
    }

    pub fn is_emissive(&self) -> bool {
        !self.emission.is_black()
    }
}

impl Clone for SceneObject {
    fn clone(&self) -> Self {
        Self {
            shape: self.shape.clone(),
            material: self.material.clone(),
            emission: self.emission,
            name: self.name.clone(),
        }
    }
}

/// Settings of the `<renderer>` element.
#[derive(Debug, Clone, PartialEq)]
pub struct RendererSettings {
    pub spp: u32,
    /// Samples per pixel rendered by one progressive pass.
    pub spp_step: u32,
    /// Minutes between checkpoints, zero disables them.
    pub checkpoint_interval: f64,
    pub enable_resume_render: bool,
    /// Treat resume data written for a different setup as an error instead of
    /// starting over.
    pub strict_resume: bool,
    /// Relative paths resolve against the scene directory. Empty means the
    /// scene directory itself.
    pub output_directory: PathBuf,
    pub output_file: PathBuf,
    pub hdr_output_file: Option<PathBuf>,
    pub resume_render_file: PathBuf,
    pub seed: u64,
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            spp: 64,
            spp_step: 16,
            checkpoint_interval: 0.0,
            enable_resume_render: false,
            strict_resume: false,
            output_directory: PathBuf::new(),
            output_file: PathBuf::from("financier.png"),
            hdr_output_file: None,
            resume_render_file: PathBuf::from("financier_resume.dat"),
            seed: 0xBA5E_BA11,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegratorSettings {
    Bidirectional { max_bounces: u32, min_bounces: u32, light_tracing: bool },
    Path { max_bounces: u32, min_bounces: u32 },
}

impl Default for IntegratorSettings {
    fn default() -> Self {
        IntegratorSettings::Bidirectional { max_bounces: 64, min_bounces: 0, light_tracing: true }
    }
}

impl IntegratorSettings {
    pub fn name(&self) -> &'static str {
        match self {
            IntegratorSettings::Bidirectional { .. } => "bidirectional",
            IntegratorSettings::Path { .. } => "path",
        }
    }
}

/// Loaded scene description. Still editable; `make_traceable` produces the
/// read-only form the integrators work on.
pub struct Scene {
    objects: Vec<SceneObject>,
    emitters: Vec<Arc<dyn Emitter>>,
    area_emitters: Vec<Arc<dyn Emitter>>,
    camera: Option<Arc<dyn Sensor>>,
    renderer_settings: RendererSettings,
    integrator_settings: IntegratorSettings,
    path: PathBuf,
    base_dir: PathBuf,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    pub fn new() -> Self {
        Self {
            objects: Vec::new(),
            emitters: Vec::new(),
            area_emitters: Vec::new(),
            camera: None,
            renderer_settings: RendererSettings::default(),
            integrator_settings: IntegratorSettings::default(),
            path: PathBuf::new(),
            base_dir: PathBuf::new(),
        }
    }

    pub fn add_object(&mut self, object: SceneObject) {
        self.objects.push(object);
    }

    pub fn objects(&self) -> &Vec<SceneObject> {
        &self.objects
    }

    /// Adds an emitter that is not attached to any shape.
    pub fn add_emitter(&mut self, emitter: Arc<dyn Emitter>) {
        self.emitters.push(emitter);
    }

    pub fn emitters(&self) -> &Vec<Arc<dyn Emitter>> {
        &self.emitters
    }

    pub fn set_camera(&mut self, camera: Arc<dyn Sensor>) {
        self.camera = Some(camera);
    }

    pub fn camera(&self) -> Option<&dyn Sensor> {
        self.camera.as_deref()
    }

    pub fn renderer_settings(&self) -> &RendererSettings {
        &self.renderer_settings
    }

    pub fn renderer_settings_mut(&mut self) -> &mut RendererSettings {
        &mut self.renderer_settings
    }

    pub fn integrator_settings(&self) -> &IntegratorSettings {
        &self.integrator_settings
    }

    pub fn set_integrator_settings(&mut self, settings: IntegratorSettings) {
        self.integrator_settings = settings;
    }

    pub fn set_path(&mut self, path: PathBuf) {
        self.path = path;
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn set_base_dir(&mut self, base_dir: PathBuf) {
        self.base_dir = base_dir;
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn output_directory(&self) -> PathBuf {
        let dir = &self.renderer_settings.output_directory;
        if dir.is_absolute() {
            dir.clone()
        } else {
            self.base_dir.join(dir)
        }
    }

    /// Resolves an output file name against the output directory.
    pub fn output_path(&self, file: &Path) -> PathBuf {
        if file.is_absolute() {
            file.to_path_buf()
        } else {
            self.output_directory().join(file)
        }
    }

    /// Checks the scene is complete and instantiates the emitters carried by
    /// emissive shapes.
    pub fn load_resources(&mut self) -> std::result::Result<(), SceneLoadError> {
        if self.camera.is_none() {
            return Err(SceneLoadError::MissingField("sensor"));
        }
        let settings = &self.renderer_settings;
        if settings.spp == 0 {
            return Err(SceneLoadError::Parse("renderer.spp must be positive".to_string()));
        }
        if settings.spp_step == 0 {
            return Err(SceneLoadError::Parse("renderer.spp_step must be positive".to_string()));
        }

        self.area_emitters = self.objects
            .iter()
            .enumerate()
            .filter(|(_, object)| object.is_emissive())
            .map(|(index, object)| {
                Arc::new(AreaEmitter::from_shape(object.shape.clone(), object.emission, index))
                    as Arc<dyn Emitter>
            })
            .collect();
        Ok(())
    }

    /// Flattens the scene into a shared `World` and builds the integrator
    /// selected by the scene's integrator settings.
    pub fn make_traceable(&self, thread_count: usize) -> Result<TraceableScene> {
        let world = Arc::new(self.build_world()?);
        let integrator = ProgressiveIntegrator::from_scene(self, world.clone(), thread_count)?;
        Ok(TraceableScene { world, integrator: Box::new(integrator) })
    }

    pub(crate) fn build_world(&self) -> Result<World> {
        let camera = self.camera.clone()
            .ok_or(RenderError::SceneLoad(SceneLoadError::MissingField("sensor")))?;
        if camera.width() == 0 || camera.height() == 0 {
            return Err(RenderError::EmptyResolution);
        }

        let mut emitters: Vec<Arc<dyn Emitter>> = self.area_emitters.clone();
        emitters.extend(self.emitters.iter().cloned());
        if emitters.is_empty() {
            return Err(RenderError::NoEmitters);
        }

        let mut object_emitters = vec![None; self.objects.len()];
        for (index, emitter) in emitters.iter().enumerate() {
            if let Some(object) = emitter.object_index() {
                if let Some(slot) = object_emitters.get_mut(object) {
                    *slot = Some(index);
                }
            }
        }

        let powers: Vec<Float> = emitters.iter().map(|e| e.power()).collect();
        Ok(World {
            objects: self.objects.clone(),
            object_emitters,
            emitters,
            light_distribution: Distribution1D::new(&powers),
            camera,
        })
    }
}

/// Intersection-ready, read-only part of a scene shared by all workers.
pub struct World {
    objects: Vec<SceneObject>,
    object_emitters: Vec<Option<usize>>,
    emitters: Vec<Arc<dyn Emitter>>,
    light_distribution: Distribution1D,
    camera: Arc<dyn Sensor>,
}

impl World {
    pub fn camera(&self) -> &dyn Sensor {
        self.camera.as_ref()
    }

    pub fn objects(&self) -> &[SceneObject] {
        &self.objects
    }

    pub fn bsdf(&self, object: usize) -> Option<&dyn BSDF> {
        self.objects.get(object).map(|o| o.material.as_ref())
    }

    pub fn emitter(&self, index: usize) -> Option<&dyn Emitter> {
        self.emitters.get(index).map(|e| e.as_ref())
    }

    pub fn emitter_count(&self) -> usize {
        self.emitters.len()
    }

    /// Emitter attached to the given object, if it is emissive.
    pub fn object_emitter(&self, object: usize) -> Option<usize> {
        self.object_emitters.get(object).copied().flatten()
    }

    /// Picks an emitter proportionally to its power.
    pub fn sample_emitter(&self, u: Float) -> Option<(usize, Float)> {
        self.light_distribution.sample_discrete(u)
    }

    pub fn emitter_pdf(&self, index: usize) -> Float {
        self.light_distribution.pdf_discrete(index)
    }

    /// Closest hit along the ray, tagged with the object index.
    pub fn ray_intersection(&self, ray: &Ray3f) -> Option<SurfaceIntersection> {
        let mut closest = *ray;
        let mut result = None;
        for (index, object) in self.objects.iter().enumerate() {
            if let Some(hit) = object.shape.ray_intersection(&closest) {
                if closest.update(hit.t()) {
                    result = Some(hit.with_object_index(Some(index)));
                }
            }
        }
        result
    }

    pub fn ray_intersection_t(&self, ray: &Ray3f) -> bool {
        self.objects.iter().any(|object| object.shape.ray_intersection_t(ray))
    }

    /// True when the open segment between `a` and `b` is blocked.
    pub fn occluded(&self, a: &Vector3f, b: &Vector3f) -> bool {
        match Ray3f::segment(*a, *b) {
            Some(ray) => self.ray_intersection_t(&ray),
            None => false,
        }
    }
}

/// A flattened scene together with the integrator rendering it.
pub struct TraceableScene {
    world: Arc<World>,
    integrator: Box<dyn Integrator>,
}

impl TraceableScene {
    pub fn world(&self) -> &Arc<World> {
        &self.world
    }

    pub fn integrator(&self) -> &dyn Integrator {
        self.integrator.as_ref()
    }

    pub fn integrator_mut(&mut self) -> &mut dyn Integrator {
        self.integrator.as_mut()
    }

    pub fn into_parts(self) -> (Arc<World>, Box<dyn Integrator>) {
        (self.world, self.integrator)
    }
}
