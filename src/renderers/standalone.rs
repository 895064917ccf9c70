// Copyright @yucwang 2026

//! Renders a queue of scene files one after another.
//!
//! Each call to `render_scene` takes one scene from loading to its final
//! outputs. A scene that fails to load or render is logged and dropped; the
//! next call moves on to the following scene.

use crate::core::integrator::Integrator;
use crate::core::scene::{Scene, World};
use crate::core::scene_loader::SceneLoader;
use crate::error::Result;
use crate::io::ldr_utils::to_ldr;
use crate::renderers::status::{RenderState, RenderStatus};

use log::Level;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

/// Settings given on the command line. They take precedence over the ones
/// embedded in scene files.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOptions {
    pub thread_count: usize,
    pub restart: bool,
    pub checkpoint_interval: Option<Duration>,
    pub output_directory: Option<PathBuf>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            thread_count: default_thread_count(),
            restart: false,
            checkpoint_interval: None,
            output_directory: None,
        }
    }
}

/// Number of cores minus one, at least one.
pub fn default_thread_count() -> usize {
    thread::available_parallelism()
        .map(|n| n.get().saturating_sub(1))
        .unwrap_or(1)
        .max(1)
}

/// 8-bit RGB copy of the current estimate.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameBuffer {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<u8>,
}

#[derive(Default)]
struct ActiveScene {
    scene: Option<Arc<Scene>>,
    world: Option<Arc<World>>,
}

pub struct StandaloneRenderer {
    options: RenderOptions,
    loader: Box<dyn SceneLoader>,
    status: Mutex<RenderStatus>,
    active: Mutex<ActiveScene>,
    log: Mutex<()>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Human readable duration, e.g. `1h 2m 3s 450ms`.
pub fn format_time(elapsed: Duration) -> String {
    let seconds = elapsed.as_secs();
    let minutes = seconds / 60;
    let hours = minutes / 60;
    let days = hours / 24;

    let mut out = String::new();
    if days > 0 {
        out.push_str(&format!("{}d ", days));
    }
    if hours > 0 {
        out.push_str(&format!("{}h ", hours % 24));
    }
    if minutes > 0 {
        out.push_str(&format!("{}m ", minutes % 60));
    }
    if seconds > 0 {
        out.push_str(&format!("{}s {}ms", seconds % 60, elapsed.subsec_millis()));
    } else {
        out.push_str(&format!("{}s", elapsed.as_secs_f64()));
    }
    out
}

impl StandaloneRenderer {
    pub fn new(options: RenderOptions, loader: Box<dyn SceneLoader>, scenes: Vec<PathBuf>) -> Self {
        let mut status = RenderStatus::default();
        status.queued_scenes.extend(scenes);
        Self {
            options,
            loader,
            status: Mutex::new(status),
            active: Mutex::new(ActiveScene::default()),
            log: Mutex::new(()),
        }
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    pub fn enqueue(&self, path: PathBuf) {
        lock(&self.status).queued_scenes.push_back(path);
    }

    pub fn status(&self) -> RenderStatus {
        lock(&self.status).clone()
    }

    /// Held while writing log lines, so other reporters can keep their
    /// output from interleaving with ours.
    pub fn log_mutex(&self) -> &Mutex<()> {
        &self.log
    }

    fn write_log_line(&self, level: Level, args: fmt::Arguments) {
        let _guard = lock(&self.log);
        log::log!(level, "{}", args);
    }

    /// `None` unless a scene is loaded and flattened.
    pub fn frame_buffer(&self) -> Option<FrameBuffer> {
        let active = lock(&self.active);
        let world = match (&active.scene, &active.world) {
            (Some(_), Some(world)) => world,
            _ => return None,
        };
        let film = world.camera().film();
        Some(FrameBuffer {
            width: film.width(),
            height: film.height(),
            pixels: to_ldr(&film.resolve()),
        })
    }

    /// Loads and renders the next queued scene. Returns `false` once the
    /// queue is empty.
    pub fn render_scene(&self) -> bool {
        let current_scene = {
            let mut status = lock(&self.status);
            let next = match status.queued_scenes.pop_front() {
                Some(next) => next,
                None => return false,
            };
            status.state = RenderState::Loading;
            status.current_spp = 0;
            status.next_spp = 0;
            status.total_spp = 0;
            status.current_scene = next.clone();
            next
        };

        self.write_log_line(Level::Info, format_args!("Loading scene '{}'...", current_scene.display()));
        let scene = match self.load(&current_scene) {
            Ok(scene) => scene,
            Err(e) => {
                self.write_log_line(Level::Error, format_args!(
                    "Scene loader for file '{}' encountered an unrecoverable error: {}",
                    current_scene.display(), e));
                return true;
            }
        };

        lock(&self.status).total_spp = scene.renderer_settings().spp;
        lock(&self.active).scene = Some(scene.clone());

        match self.render_loaded(&scene, &current_scene) {
            Ok(()) => lock(&self.status).completed_scenes.push(current_scene),
            Err(e) => self.write_log_line(Level::Error, format_args!(
                "Renderer for file '{}' encountered an unrecoverable error: {}",
                current_scene.display(), e)),
        }

        *lock(&self.active) = ActiveScene::default();
        true
    }

    fn load(&self, path: &Path) -> Result<Arc<Scene>> {
        let mut scene = self.loader.load(path)?;
        scene.load_resources()?;
        if let Some(dir) = &self.options.output_directory {
            scene.renderer_settings_mut().output_directory = dir.clone();
        }
        Ok(Arc::new(scene))
    }

    fn render_loaded(&self, scene: &Scene, path: &Path) -> Result<()> {
        let settings = scene.renderer_settings();
        let total_spp = settings.spp;

        let (world, mut integrator) = scene.make_traceable(self.options.thread_count)?.into_parts();
        lock(&self.active).world = Some(world);

        let checkpoint_interval = self.options.checkpoint_interval
            .unwrap_or_else(|| Duration::try_from_secs_f64(settings.checkpoint_interval * 60.0).unwrap_or(Duration::ZERO));

        if settings.enable_resume_render && !self.options.restart {
            self.write_log_line(Level::Info, format_args!("Trying to resume render from saved state..."));
            if integrator.resume_render(scene)? {
                self.write_log_line(Level::Info, format_args!("Resume successful"));
            } else {
                self.write_log_line(Level::Info, format_args!("Resume unsuccessful. Starting from 0 spp"));
            }
        }

        self.write_log_line(Level::Info, format_args!("Starting render of '{}'...", path.display()));
        let timer = Instant::now();
        let mut checkpoint_timer = Instant::now();
        let mut total_elapsed = Duration::ZERO;
        while !integrator.done() {
            self.publish_progress(integrator.as_ref(), RenderState::Rendering);

            integrator.start_render(Box::new(|| {}))?;
            integrator.wait_for_completion()?;
            self.write_log_line(Level::Info, format_args!(
                "Completed {}/{} spp", integrator.current_spp(), total_spp));

            let since_checkpoint = checkpoint_timer.elapsed();
            if !checkpoint_interval.is_zero() && since_checkpoint > checkpoint_interval {
                total_elapsed += since_checkpoint;
                self.write_log_line(Level::Info, format_args!(
                    "Saving checkpoint after {}", format_time(total_elapsed)));
                let io_timer = Instant::now();
                checkpoint_timer = Instant::now();
                self.save_checkpoint(integrator.as_ref(), scene);
                self.write_log_line(Level::Info, format_args!(
                    "Saving checkpoint took {}", format_time(io_timer.elapsed())));
            }
        }
        self.publish_progress(integrator.as_ref(), RenderState::Rendering);

        self.write_log_line(Level::Info, format_args!(
            "Finished render. Render time {}", format_time(timer.elapsed())));

        integrator.save_outputs()?;
        if settings.enable_resume_render {
            integrator.save_render_resume_data(scene)?;
        }
        Ok(())
    }

    fn publish_progress(&self, integrator: &dyn Integrator, state: RenderState) {
        let mut status = lock(&self.status);
        status.state = state;
        status.current_spp = integrator.current_spp();
        status.next_spp = integrator.next_spp();
    }

    /// Checkpoint failures are not fatal; the render goes on.
    fn save_checkpoint(&self, integrator: &dyn Integrator, scene: &Scene) {
        if let Err(e) = integrator.save_checkpoint() {
            self.write_log_line(Level::Error, format_args!("Saving checkpoint failed: {}", e));
        }
        if scene.renderer_settings().enable_resume_render {
            if let Err(e) = integrator.save_render_resume_data(scene) {
                self.write_log_line(Level::Error, format_args!("Saving resume data failed: {}", e));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::framebuffer::PixelState;
    use crate::core::scene::tests::point_lit_plane;
    use crate::io::resume::{read_resume_file, write_resume_file};
    use crate::error::SceneLoadError;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Builds a small point lit plane for every path except `fail.xml`.
    struct TestLoader {
        output_directory: PathBuf,
        resolution: usize,
        spp: u32,
        resume: bool,
        checkpoint_minutes: f64,
    }

    impl TestLoader {
        fn new(dir: &Path, resolution: usize, spp: u32) -> Self {
            Self {
                output_directory: dir.to_path_buf(),
                resolution,
                spp,
                resume: false,
                checkpoint_minutes: 0.0,
            }
        }
    }

    impl SceneLoader for TestLoader {
        fn load(&self, path: &Path) -> std::result::Result<Scene, SceneLoadError> {
            if path.file_name().map(|n| n == "fail.xml").unwrap_or(false) {
                return Err(SceneLoadError::Parse("bad scene".to_string()));
            }
            let mut scene = point_lit_plane(0.5, 10.0, 2.0, self.resolution);
            scene.set_path(path.to_path_buf());
            scene.set_base_dir(self.output_directory.clone());
            let settings = scene.renderer_settings_mut();
            settings.spp = self.spp;
            settings.spp_step = 2;
            settings.enable_resume_render = self.resume;
            settings.checkpoint_interval = self.checkpoint_minutes;
            settings.output_file = PathBuf::from(format!(
                "{}.png", path.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default()));
            Ok(scene)
        }
    }

    fn renderer(dir: &Path, scenes: &[&str], resolution: usize, spp: u32) -> StandaloneRenderer {
        let options = RenderOptions { thread_count: 2, ..RenderOptions::default() };
        let loader = TestLoader::new(dir, resolution, spp);
        StandaloneRenderer::new(options, Box::new(loader), scenes.iter().map(PathBuf::from).collect())
    }

    fn render_one(options: RenderOptions, loader: TestLoader) -> RenderStatus {
        let renderer = StandaloneRenderer::new(options, Box::new(loader), vec![PathBuf::from("a.xml")]);
        assert!(renderer.render_scene());
        assert!(!renderer.render_scene());
        renderer.status()
    }

    fn every_nanosecond() -> RenderOptions {
        RenderOptions {
            thread_count: 1,
            checkpoint_interval: Some(Duration::from_nanos(1)),
            ..RenderOptions::default()
        }
    }

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(Duration::from_millis(250)), "0.25s");
        assert_eq!(format_time(Duration::from_millis(3_450)), "3s 450ms");
        assert_eq!(format_time(Duration::from_secs(3_723)), "1h 2m 3s 0ms");
        assert_eq!(format_time(Duration::from_secs(90_061)), "1d 1h 1m 1s 0ms");
    }

    #[test]
    fn test_scenes_render_in_queue_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        let renderer = renderer(dir.path(), &["a.xml", "b.xml"], 4, 4);
        renderer.enqueue(PathBuf::from("c.xml"));

        assert!(renderer.render_scene());
        assert!(renderer.render_scene());
        assert!(renderer.render_scene());
        assert!(!renderer.render_scene());

        let status = renderer.status();
        assert_eq!(status.completed_scenes,
                   vec![PathBuf::from("a.xml"), PathBuf::from("b.xml"), PathBuf::from("c.xml")]);
        assert!(status.queued_scenes.is_empty());
        assert_eq!((status.current_spp, status.next_spp, status.total_spp), (4, 4, 4));
        for name in ["a.png", "b.png", "c.png"] {
            assert!(dir.path().join(name).exists(), "{} missing", name);
        }
    }

    #[test]
    fn test_failed_load_is_skipped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let renderer = renderer(dir.path(), &["fail.xml", "b.xml"], 4, 2);

        assert!(renderer.render_scene());
        let status = renderer.status();
        assert!(status.completed_scenes.is_empty());
        assert_eq!(status.current_scene, PathBuf::from("fail.xml"));
        assert_eq!(status.state, RenderState::Loading);
        assert!(renderer.frame_buffer().is_none());

        assert!(renderer.render_scene());
        assert_eq!(renderer.status().completed_scenes, vec![PathBuf::from("b.xml")]);
        assert!(!renderer.render_scene());
    }

    #[test]
    fn test_status_and_frame_buffer_while_rendering() {
        let dir = tempfile::tempdir().expect("tempdir");
        let renderer = renderer(dir.path(), &["a.xml"], 32, 32);
        assert!(renderer.frame_buffer().is_none());

        let stop = AtomicBool::new(false);
        let (saw_rendering, frame) = thread::scope(|scope| {
            let poller = scope.spawn(|| {
                let mut saw_rendering = false;
                let mut frame = None;
                while !stop.load(Ordering::SeqCst) {
                    let status = renderer.status();
                    assert!(status.current_spp <= status.next_spp);
                    assert!(status.next_spp <= status.total_spp);
                    if status.state == RenderState::Rendering {
                        saw_rendering = true;
                    }
                    if let Some(fb) = renderer.frame_buffer() {
                        frame = Some(fb);
                    }
                    thread::yield_now();
                }
                (saw_rendering, frame)
            });
            assert!(renderer.render_scene());
            stop.store(true, Ordering::SeqCst);
            poller.join().expect("poller")
        });

        assert!(saw_rendering);
        let frame = frame.expect("frame buffer during render");
        assert_eq!((frame.width, frame.height), (32, 32));
        assert_eq!(frame.pixels.len(), 32 * 32 * 3);
        assert!(renderer.frame_buffer().is_none());
    }

    #[test]
    fn test_output_directory_override() {
        let dir = tempfile::tempdir().expect("tempdir");
        let out = dir.path().join("renders");
        let options = RenderOptions {
            thread_count: 1,
            output_directory: Some(out.clone()),
            ..RenderOptions::default()
        };
        let loader = TestLoader::new(dir.path(), 2, 2);
        let renderer = StandaloneRenderer::new(options, Box::new(loader), vec![PathBuf::from("a.xml")]);
        assert!(renderer.render_scene());
        assert!(out.join("a.png").exists());
    }

    #[test]
    fn test_checkpoints_follow_the_interval() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut loader = TestLoader::new(dir.path(), 2, 4);
        loader.resume = true;
        loader.checkpoint_minutes = 1e6;
        let status = render_one(every_nanosecond(), loader);
        assert_eq!(status.completed_scenes, vec![PathBuf::from("a.xml")]);
        assert!(dir.path().join("a_checkpoint.exr").exists());
        assert!(dir.path().join("financier_resume.dat").exists());

        let dir = tempfile::tempdir().expect("tempdir");
        let mut loader = TestLoader::new(dir.path(), 2, 4);
        loader.checkpoint_minutes = 1e-12;
        let options = RenderOptions {
            thread_count: 1,
            checkpoint_interval: Some(Duration::ZERO),
            ..RenderOptions::default()
        };
        render_one(options, loader);
        assert!(dir.path().join("a.png").exists());
        assert!(!dir.path().join("a_checkpoint.exr").exists());
    }

    #[test]
    fn test_resume_and_restart() {
        let dir = tempfile::tempdir().expect("tempdir");
        let resume_path = dir.path().join("financier_resume.dat");
        let resumable = || {
            let mut loader = TestLoader::new(dir.path(), 2, 4);
            loader.resume = true;
            loader
        };

        let options = RenderOptions { thread_count: 1, ..RenderOptions::default() };
        render_one(options.clone(), resumable());
        let saved = read_resume_file(&resume_path).expect("read").expect("present");
        assert_eq!(saved.metadata.spp, 4);
        assert!(saved.pixels.iter().all(|p| p.count == 4 && p.sum[0] > 0.0));

        // A finished render picked up again keeps its accumulators untouched.
        let blank: Vec<PixelState> = saved.pixels.iter()
            .map(|p| PixelState { sum: [0.0; 3], count: p.count })
            .collect();
        write_resume_file(&resume_path, &saved.metadata, &blank).expect("write");
        let status = render_one(options.clone(), resumable());
        assert_eq!(status.completed_scenes, vec![PathBuf::from("a.xml")]);
        assert_eq!((status.current_spp, status.total_spp), (4, 4));
        let resumed = read_resume_file(&resume_path).expect("read").expect("present");
        assert_eq!(resumed.pixels, blank);

        let restart = RenderOptions { restart: true, ..options };
        let status = render_one(restart, resumable());
        assert_eq!(status.completed_scenes, vec![PathBuf::from("a.xml")]);
        let restarted = read_resume_file(&resume_path).expect("read").expect("present");
        assert!(restarted.pixels.iter().all(|p| p.count == 4 && p.sum[0] > 0.0));
    }

    #[test]
    fn test_failed_checkpoint_does_not_stop_render() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir(dir.path().join("a_checkpoint.exr")).expect("blocker");
        let status = render_one(every_nanosecond(), TestLoader::new(dir.path(), 2, 4));
        assert_eq!(status.completed_scenes, vec![PathBuf::from("a.xml")]);
        assert_eq!(status.current_spp, 4);
        assert!(dir.path().join("a.png").exists());
        assert!(dir.path().join("a_checkpoint.exr").is_dir());
        assert!(!dir.path().join(".tmp-a_checkpoint.exr").exists());
    }
}
