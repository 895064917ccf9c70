// Copyright @yucwang 2026

use crate::core::framebuffer::AtomicFramebuffer;
use crate::core::sampler::SampleGenerator;
use crate::core::scene::Scene;
use crate::error::Result;
use crate::math::constants::Vector2u;
use crate::math::spectrum::RGBSpectrum;

/// Progressive renderer of one scene, driven by the standalone renderer one
/// pass at a time.
pub trait Integrator: Send {
    fn name(&self) -> &'static str;
    /// True once every pixel has received the full sample budget.
    fn done(&self) -> bool;
    fn current_spp(&self) -> u32;
    /// Sample count every pixel reaches when the next pass completes.
    fn next_spp(&self) -> u32;
    fn total_spp(&self) -> u32;
    /// Starts a pass in the background; `completion` runs on the pass thread
    /// once all workers are done.
    fn start_render(&mut self, completion: Box<dyn FnOnce() + Send>) -> Result<()>;
    fn wait_for_completion(&mut self) -> Result<()>;
    fn save_checkpoint(&self) -> Result<()>;
    fn save_outputs(&self) -> Result<()>;
    fn save_render_resume_data(&self, scene: &Scene) -> Result<()>;
    /// Restores a previously saved render. `Ok(false)` means there was
    /// nothing usable and rendering starts from zero.
    fn resume_render(&mut self, scene: &Scene) -> Result<bool>;
}

/// Per worker light transport estimator. Each worker owns one tracer and
/// reuses it for every sample it takes.
pub trait SampleTracer: Send {
    /// Estimate for one sample of `pixel`. Contributions landing elsewhere
    /// on the image are splatted into `splats`.
    fn trace_sample(&mut self,
                    pixel: Vector2u,
                    sampler: &mut dyn SampleGenerator,
                    splats: &AtomicFramebuffer) -> RGBSpectrum;
}
