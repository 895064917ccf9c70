// Copyright @yucwang 2026

use crate::core::bsdf::BSDF;
use crate::core::framebuffer::AtomicFramebuffer;
use crate::core::integrator::SampleTracer;
use crate::core::interaction::SurfaceIntersection;
use crate::core::sampler::SampleGenerator;
use crate::core::scene::World;
use crate::math::constants::{Float, Vector2f, Vector2u, Vector3f};
use crate::math::frame::Frame;
use crate::math::ray::Ray3f;
use crate::math::spectrum::{RGBSpectrum, Spectrum};
use crate::math::warp::power_heuristic;
use std::sync::Arc;

/// Unidirectional path tracer. Emitter sampling and BSDF sampling are
/// combined with the power heuristic at every bounce.
pub struct PathTracer {
    world: Arc<World>,
    max_bounces: u32,
    min_bounces: u32,
}

impl PathTracer {
    pub fn new(world: Arc<World>, max_bounces: u32, min_bounces: u32) -> Self {
        Self { world, max_bounces, min_bounces }
    }

    /// Next event estimation from `hit`, already weighted against BSDF
    /// sampling.
    fn sample_direct(&self,
                     hit: &SurfaceIntersection,
                     frame: &Frame,
                     wo: &Vector3f,
                     bsdf: &dyn BSDF,
                     sampler: &mut dyn SampleGenerator) -> RGBSpectrum {
        let world = self.world.as_ref();
        let u_pick = sampler.next_1d();
        let u_pos = sampler.next_2d();
        let (index, pick_pdf) = match world.sample_emitter(u_pick) {
            Some(pick) => pick,
            None => return RGBSpectrum::zeros(),
        };
        let emitter = match world.emitter(index) {
            Some(emitter) => emitter,
            None => return RGBSpectrum::zeros(),
        };

        let position = emitter.sample_position(&u_pos);
        let to_light = position.p - hit.p();
        let dist2 = to_light.norm_squared();
        if dist2 <= 0.0 || position.pdf <= 0.0 {
            return RGBSpectrum::zeros();
        }
        let dir = to_light / dist2.sqrt();
        let le = emitter.eval(&position.normal, &(-dir));
        if le.is_black() {
            return RGBSpectrum::zeros();
        }

        let wi = frame.to_local(&dir);
        let f = bsdf.eval(wo, &wi);
        if f.is_black() {
            return RGBSpectrum::zeros();
        }

        let (geometry, weight) = if emitter.is_delta_position() {
            (1.0 / dist2, 1.0)
        } else {
            let cos_light = position.normal.dot(&(-dir)).abs();
            if cos_light <= 0.0 {
                return RGBSpectrum::zeros();
            }
            let light_pdf = pick_pdf * position.pdf * dist2 / cos_light;
            (cos_light / dist2, power_heuristic(light_pdf, bsdf.pdf(wo, &wi)))
        };

        if world.occluded(&hit.p(), &position.p) {
            return RGBSpectrum::zeros();
        }
        f.component_mul(&le) * (wi.z.abs() * geometry * weight / (pick_pdf * position.pdf))
    }
}

impl SampleTracer for PathTracer {
    fn trace_sample(&mut self,
                    pixel: Vector2u,
                    sampler: &mut dyn SampleGenerator,
                    _splats: &AtomicFramebuffer) -> RGBSpectrum {
        let world = self.world.clone();
        let camera = world.camera();
        let jitter = sampler.next_2d();
        let raster = Vector2f::new(pixel.x as Float + jitter.x, pixel.y as Float + jitter.y);
        let mut ray = camera.sample_ray(&raster);

        let mut radiance = RGBSpectrum::zeros();
        let mut throughput = RGBSpectrum::new(1.0, 1.0, 1.0);
        let mut last_pdf: Float = 0.0;
        let mut last_delta = true;
        let mut last_p = ray.origin();

        for depth in 0..=self.max_bounces {
            let hit = match world.ray_intersection(&ray) {
                Some(hit) => hit,
                None => break,
            };
            let object = match hit.object_index() {
                Some(object) => object,
                None => break,
            };
            let n = hit.geo_normal();
            let wo_world = -ray.dir();

            if let Some(index) = world.object_emitter(object) {
                if let Some(emitter) = world.emitter(index) {
                    let le = emitter.eval(&n, &wo_world);
                    if !le.is_black() {
                        let weight = if last_delta {
                            1.0
                        } else {
                            let dist2 = (hit.p() - last_p).norm_squared();
                            let cos_light = n.dot(&wo_world).abs();
                            let light_pdf = world.emitter_pdf(index) * emitter.pdf_position(&hit.p())
                                * dist2 / cos_light.max(1e-7);
                            power_heuristic(last_pdf, light_pdf)
                        };
                        radiance += throughput.component_mul(&le) * weight;
                    }
                }
            }

            if depth == self.max_bounces {
                break;
            }

            let bsdf = match world.bsdf(object) {
                Some(bsdf) => bsdf,
                None => break,
            };
            let frame = Frame::from_normal(&n);
            let wo = frame.to_local(&wo_world);

            let direct = self.sample_direct(&hit, &frame, &wo, bsdf, sampler);
            radiance += throughput.component_mul(&direct);

            let sample = match bsdf.sample(&sampler.next_2d(), &wo) {
                Some(sample) if sample.pdf > 0.0 => sample,
                _ => break,
            };
            throughput = throughput.component_mul(&(sample.value * (sample.wi.z.abs() / sample.pdf)));
            if throughput.is_black() {
                break;
            }

            if depth + 1 > self.min_bounces {
                let q = throughput.max_component().min(1.0);
                if sampler.next_1d() >= q {
                    break;
                }
                throughput /= q;
            }

            last_pdf = sample.pdf;
            last_delta = sample.delta;
            last_p = hit.p();
            ray = Ray3f::spawn(hit.p(), n, frame.from_local(&sample.wi));
        }

        radiance
    }
}
