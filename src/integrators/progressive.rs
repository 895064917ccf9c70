// Copyright @yucwang 2026

//! Progressive driver shared by every tracer.
//!
//! A pass adds samples `[current_spp, next_spp)` to every pixel of the
//! camera film. Workers pull 32x32 tiles from a shared counter; each owns one
//! tracer for the lifetime of the integrator. Samples are seeded from
//! `(seed, pixel, sample)`, so a render resumed from a snapshot takes exactly
//! the samples an uninterrupted one would have taken.

use crate::core::integrator::{Integrator, SampleTracer};
use crate::core::sampler::{SampleGenerator, UniformSampleGenerator};
use crate::core::scene::{IntegratorSettings, Scene, World};
use crate::error::{RenderError, Result, SceneLoadError};
use crate::integrators::bidirectional::BidirectionalTracer;
use crate::integrators::path::PathTracer;
use crate::io::exr_utils::write_exr_to_file;
use crate::io::ldr_utils::write_png_to_file;
use crate::io::resume::{read_resume_file, write_resume_file, ResumeMetadata};
use crate::io::write_atomically;
use crate::math::constants::{Vector2u, Vector3f};
use crate::math::spectrum::Spectrum;

use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

pub const TILE_SIZE: usize = 32;

type TracerPool = Arc<Vec<Mutex<Box<dyn SampleTracer>>>>;

pub struct ProgressiveIntegrator {
    name: &'static str,
    world: Arc<World>,
    tracers: TracerPool,
    seed: u64,
    spp_step: u32,
    total_spp: u32,
    current_spp: u32,
    next_spp: u32,
    strict_resume: bool,
    output_path: PathBuf,
    hdr_output_path: Option<PathBuf>,
    checkpoint_path: PathBuf,
    resume_path: PathBuf,
    pass: Option<JoinHandle<Result<()>>>,
}

fn make_tracer(settings: &IntegratorSettings, world: Arc<World>) -> Box<dyn SampleTracer> {
    match *settings {
        IntegratorSettings::Bidirectional { max_bounces, min_bounces, light_tracing } => {
            Box::new(BidirectionalTracer::new(world, max_bounces, min_bounces, light_tracing))
        }
        IntegratorSettings::Path { max_bounces, min_bounces } => {
            Box::new(PathTracer::new(world, max_bounces, min_bounces))
        }
    }
}

fn checkpoint_file(output_file: &Path) -> PathBuf {
    let stem = output_file.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "financier".to_string());
    output_file.with_file_name(format!("{}_checkpoint.exr", stem))
}

impl ProgressiveIntegrator {
    /// Builds one tracer per worker and clears the camera film.
    pub fn from_scene(scene: &Scene, world: Arc<World>, thread_count: usize) -> Result<Self> {
        let settings = scene.renderer_settings();
        if settings.spp_step == 0 {
            return Err(SceneLoadError::Parse("renderer.spp_step must be positive".to_string()).into());
        }
        let integrator_settings = scene.integrator_settings();
        let tracers: Vec<Mutex<Box<dyn SampleTracer>>> = (0..thread_count.max(1))
            .map(|_| Mutex::new(make_tracer(integrator_settings, world.clone())))
            .collect();
        world.camera().film().reset();

        Ok(Self {
            name: integrator_settings.name(),
            seed: settings.seed,
            spp_step: settings.spp_step,
            total_spp: settings.spp,
            current_spp: 0,
            next_spp: settings.spp_step.min(settings.spp),
            strict_resume: settings.strict_resume,
            output_path: scene.output_path(&settings.output_file),
            hdr_output_path: settings.hdr_output_file.as_ref().map(|f| scene.output_path(f)),
            checkpoint_path: scene.output_path(&checkpoint_file(&settings.output_file)),
            resume_path: scene.output_path(&settings.resume_render_file),
            tracers: Arc::new(tracers),
            world,
            pass: None,
        })
    }

    pub fn world(&self) -> &Arc<World> {
        &self.world
    }

    pub fn resume_path(&self) -> &Path {
        &self.resume_path
    }

    fn advance(&mut self, spp: u32) {
        self.current_spp = spp.min(self.total_spp);
        self.next_spp = (self.current_spp + self.spp_step).min(self.total_spp);
    }

    fn resume_metadata(&self, spp: u32, scene: &Scene) -> ResumeMetadata {
        let film = self.world.camera().film();
        ResumeMetadata {
            spp,
            width: film.width(),
            height: film.height(),
            seed: self.seed,
            integrator: self.name.to_string(),
            scene: scene.path().to_path_buf(),
        }
    }
}

/// Renders samples `[begin, end)` of every pixel.
fn render_pass(world: &World, tracers: &[Mutex<Box<dyn SampleTracer>>], seed: u64, begin: u32, end: u32) -> Result<()> {
    let film = world.camera().film();
    let (width, height) = (film.width(), film.height());
    let tiles_x = (width + TILE_SIZE - 1) / TILE_SIZE;
    let tiles_y = (height + TILE_SIZE - 1) / TILE_SIZE;
    let total_tiles = tiles_x * tiles_y;
    let next_tile = AtomicUsize::new(0);

    let panicked = thread::scope(|scope| {
        let handles: Vec<_> = tracers.iter().map(|tracer| {
            let next_tile = &next_tile;
            scope.spawn(move || {
                let mut tracer = tracer.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                let mut sampler = UniformSampleGenerator::new(seed);
                loop {
                    let tile = next_tile.fetch_add(1, Ordering::Relaxed);
                    if tile >= total_tiles {
                        break;
                    }
                    let x0 = (tile % tiles_x) * TILE_SIZE;
                    let y0 = (tile / tiles_x) * TILE_SIZE;
                    let x1 = (x0 + TILE_SIZE).min(width);
                    let y1 = (y0 + TILE_SIZE).min(height);

                    for y in y0..y1 {
                        for x in x0..x1 {
                            let pixel_index = (x + width * y) as u64;
                            for sample in begin..end {
                                sampler.start_path(pixel_index, sample as u64);
                                let value = tracer.trace_sample(
                                    Vector2u::new(x as u32, y as u32), &mut sampler, film);
                                if value.is_finite() {
                                    film.add_sample(x, y, &value);
                                } else {
                                    debug!("Discarding non-finite sample {} of pixel ({}, {}).", sample, x, y);
                                    film.add_sample(x, y, &Vector3f::zeros());
                                }
                            }
                        }
                    }
                }
            })
        }).collect();

        handles.into_iter().fold(false, |panicked, handle| handle.join().is_err() || panicked)
    });

    if panicked {
        Err(RenderError::WorkerPanicked)
    } else {
        Ok(())
    }
}

impl Integrator for ProgressiveIntegrator {
    fn name(&self) -> &'static str {
        self.name
    }

    fn done(&self) -> bool {
        self.current_spp >= self.total_spp
    }

    fn current_spp(&self) -> u32 {
        self.current_spp
    }

    fn next_spp(&self) -> u32 {
        self.next_spp
    }

    fn total_spp(&self) -> u32 {
        self.total_spp
    }

    fn start_render(&mut self, completion: Box<dyn FnOnce() + Send>) -> Result<()> {
        if self.pass.is_some() {
            return Err(RenderError::PassInFlight);
        }
        let world = self.world.clone();
        let tracers = self.tracers.clone();
        let (seed, begin, end) = (self.seed, self.current_spp, self.next_spp);

        let handle = thread::Builder::new()
            .name("financier-pass".to_string())
            .spawn(move || {
                let result = render_pass(&world, &tracers, seed, begin, end);
                completion();
                result
            })?;
        self.pass = Some(handle);
        Ok(())
    }

    fn wait_for_completion(&mut self) -> Result<()> {
        let handle = match self.pass.take() {
            Some(handle) => handle,
            None => return Ok(()),
        };
        handle.join().map_err(|_| RenderError::WorkerPanicked)??;
        let next = self.next_spp;
        self.advance(next);
        Ok(())
    }

    fn save_checkpoint(&self) -> Result<()> {
        let film = self.world.camera().film();
        let image = film.resolve();
        write_atomically(&self.checkpoint_path, |tmp| {
            write_exr_to_file(&image, film.width(), film.height(), tmp)
        })?;
        info!("Checkpoint at {} spp written to {}.", self.current_spp, self.checkpoint_path.display());
        Ok(())
    }

    fn save_outputs(&self) -> Result<()> {
        let film = self.world.camera().film();
        let image = film.resolve();
        write_atomically(&self.output_path, |tmp| {
            write_png_to_file(&image, film.width(), film.height(), tmp)
        })?;
        info!("Image written to {}.", self.output_path.display());

        if let Some(hdr_path) = &self.hdr_output_path {
            write_atomically(hdr_path, |tmp| {
                write_exr_to_file(&image, film.width(), film.height(), tmp)
            })?;
            info!("HDR image written to {}.", hdr_path.display());
        }
        Ok(())
    }

    fn save_render_resume_data(&self, scene: &Scene) -> Result<()> {
        if self.pass.is_some() {
            return Err(RenderError::PassInFlight);
        }
        let metadata = self.resume_metadata(self.current_spp, scene);
        let pixels = self.world.camera().film().snapshot();
        write_resume_file(&self.resume_path, &metadata, &pixels)?;
        debug!("Resume data at {} spp written to {}.", self.current_spp, self.resume_path.display());
        Ok(())
    }

    fn resume_render(&mut self, scene: &Scene) -> Result<bool> {
        if self.pass.is_some() {
            return Err(RenderError::PassInFlight);
        }
        let data = match read_resume_file(&self.resume_path) {
            Ok(Some(data)) => data,
            Ok(None) => return Ok(false),
            Err(e) => {
                warn!("Ignoring resume file {}: {}", self.resume_path.display(), e);
                return Ok(false);
            }
        };

        let expected = self.resume_metadata(self.total_spp, scene);
        if let Err(e) = data.metadata.check_compatible(&expected) {
            if self.strict_resume {
                return Err(e);
            }
            warn!("Ignoring resume file {}: {}", self.resume_path.display(), e);
            return Ok(false);
        }

        if !self.world.camera().film().restore(&data.pixels) {
            warn!("Ignoring resume file {}: pixel data does not fit the film", self.resume_path.display());
            return Ok(false);
        }
        self.advance(data.metadata.spp);
        info!("Resumed render at {} spp from {}.", self.current_spp, self.resume_path.display());
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::scene::tests::{area_lit_box, point_lit_plane};
    use crate::math::constants::{Float, INV_PI};
    use std::sync::atomic::AtomicBool;

    fn render_to_end(integrator: &mut dyn Integrator) {
        while !integrator.done() {
            assert!(integrator.current_spp() <= integrator.next_spp());
            assert!(integrator.next_spp() <= integrator.total_spp());
            integrator.start_render(Box::new(|| {})).expect("start");
            integrator.wait_for_completion().expect("pass");
        }
    }

    fn box_scene(dir: &Path) -> Scene {
        let mut scene = area_lit_box(8);
        scene.set_path(dir.join("box.xml"));
        scene.set_base_dir(dir.to_path_buf());
        {
            let settings = scene.renderer_settings_mut();
            settings.spp = 8;
            settings.spp_step = 4;
        }
        scene.set_integrator_settings(IntegratorSettings::Bidirectional {
            max_bounces: 4, min_bounces: 0, light_tracing: true });
        scene.load_resources().expect("resources");
        scene
    }

    #[test]
    fn test_bidirectional_converges_to_point_light_radiance() {
        let (albedo, intensity, height) = (0.5, 10.0, 2.0);
        let dir = tempfile::tempdir().expect("tempdir");
        let mut scene = point_lit_plane(albedo, intensity, height, 2);
        scene.set_base_dir(dir.path().to_path_buf());
        scene.renderer_settings_mut().spp = 8;
        scene.renderer_settings_mut().spp_step = 4;
        scene.load_resources().expect("resources");

        let mut traceable = scene.make_traceable(2).expect("traceable");
        assert_eq!(traceable.integrator().next_spp(), 4);
        render_to_end(traceable.integrator_mut());
        assert_eq!(traceable.integrator().current_spp(), 8);

        let film = traceable.world().camera().film();
        assert_eq!(film.sample_count(1, 1), 8);
        let image = film.resolve();
        let mean = image.iter().map(|p| p.x).sum::<Float>() / image.len() as Float;

        let d2 = 0.3 * 0.3 + height * height;
        let expected = albedo * INV_PI * intensity * (height / d2.sqrt()) / d2;
        assert!((mean - expected).abs() < 0.01 * expected, "{} vs {}", mean, expected);
    }

    #[test]
    fn test_resumed_render_matches_uninterrupted_render() {
        let dir = tempfile::tempdir().expect("tempdir");
        let scene = box_scene(dir.path());

        let mut traceable = scene.make_traceable(3).expect("traceable");
        render_to_end(traceable.integrator_mut());
        let reference = traceable.world().camera().film().resolve();
        drop(traceable);

        let mut first = scene.make_traceable(3).expect("traceable");
        let integrator = first.integrator_mut();
        integrator.start_render(Box::new(|| {})).expect("start");
        integrator.wait_for_completion().expect("pass");
        assert_eq!(integrator.current_spp(), 4);
        integrator.save_render_resume_data(&scene).expect("save resume");
        drop(first);

        let mut second = scene.make_traceable(2).expect("traceable");
        assert!(second.integrator_mut().resume_render(&scene).expect("resume"));
        assert_eq!(second.integrator().current_spp(), 4);
        assert_eq!(second.integrator().next_spp(), 8);
        render_to_end(second.integrator_mut());

        let resumed = second.world().camera().film().resolve();
        for (a, b) in reference.iter().zip(resumed.iter()) {
            assert!((a - b).norm() <= 1e-4 * (1.0 + a.norm()), "{:?} vs {:?}", a, b);
        }
    }

    #[test]
    fn test_incompatible_resume_data_policy() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut scene = box_scene(dir.path());

        let mut traceable = scene.make_traceable(1).expect("traceable");
        assert!(!traceable.integrator_mut().resume_render(&scene).expect("no resume file"));
        traceable.integrator_mut().save_render_resume_data(&scene).expect("save resume");
        drop(traceable);

        scene.renderer_settings_mut().seed = 1;
        let mut traceable = scene.make_traceable(1).expect("traceable");
        assert!(!traceable.integrator_mut().resume_render(&scene).expect("lenient"));
        assert_eq!(traceable.integrator().current_spp(), 0);
        drop(traceable);

        scene.renderer_settings_mut().strict_resume = true;
        let mut traceable = scene.make_traceable(1).expect("traceable");
        assert!(matches!(traceable.integrator_mut().resume_render(&scene),
                         Err(RenderError::IncompatibleResumeData(_))));
    }

    #[test]
    fn test_outputs_and_pass_bookkeeping() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut scene = box_scene(dir.path());
        scene.renderer_settings_mut().hdr_output_file = Some(PathBuf::from("box.exr"));
        scene.renderer_settings_mut().output_file = PathBuf::from("box.png");

        let mut traceable = scene.make_traceable(2).expect("traceable");
        let integrator = traceable.integrator_mut();
        let completed = Arc::new(AtomicBool::new(false));
        let flag = completed.clone();
        integrator.start_render(Box::new(move || flag.store(true, Ordering::SeqCst))).expect("start");
        assert!(matches!(integrator.start_render(Box::new(|| {})), Err(RenderError::PassInFlight)));
        integrator.wait_for_completion().expect("pass");
        assert!(completed.load(Ordering::SeqCst));

        integrator.save_checkpoint().expect("checkpoint");
        integrator.save_outputs().expect("outputs");
        assert!(dir.path().join("box_checkpoint.exr").exists());
        assert!(dir.path().join("box.png").exists());
        assert!(dir.path().join("box.exr").exists());
        assert!(!dir.path().join(".tmp-box.png").exists());
    }
}
