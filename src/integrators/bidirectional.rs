// Copyright @yucwang 2026

//! Bidirectional path tracing.
//!
//! Every sample traces one camera subpath and one light subpath and connects
//! each prefix of the one to each prefix of the other. The strategies that
//! can produce a path of a given length are combined with the power
//! heuristic. Connections through the camera itself (light tracing) land on
//! arbitrary pixels and are splatted into the film.

use crate::core::framebuffer::AtomicFramebuffer;
use crate::core::integrator::SampleTracer;
use crate::core::path_vertex::{convert_density, PathVertex};
use crate::core::sampler::SampleGenerator;
use crate::core::scene::World;
use crate::math::constants::{EPSILON, Float, Vector2f, Vector2u};
use crate::math::frame::Frame;
use crate::math::ray::Ray3f;
use crate::math::spectrum::{RGBSpectrum, Spectrum};
use log::debug;
use std::sync::Arc;

pub struct BidirectionalTracer {
    world: Arc<World>,
    max_bounces: u32,
    min_bounces: u32,
    light_tracing: bool,
    camera_path: Vec<PathVertex>,
    light_path: Vec<PathVertex>,
}

/// Extends `path` by following scattering events from its last vertex until
/// the walk leaves the scene, is absorbed or reaches `capacity` vertices.
fn random_walk(world: &World,
               path: &mut Vec<PathVertex>,
               mut ray: Ray3f,
               mut throughput: RGBSpectrum,
               mut pdf_dir: Float,
               capacity: usize,
               min_bounces: u32,
               sampler: &mut dyn SampleGenerator) {
    while path.len() < capacity {
        let prev = match path.last() {
            Some(prev) => *prev,
            None => return,
        };
        let hit = match world.ray_intersection(&ray) {
            Some(hit) => hit,
            None => return,
        };
        let vertex = match PathVertex::surface(world, &hit, throughput, pdf_dir, &prev) {
            Some(vertex) => vertex,
            None => return,
        };
        path.push(vertex);
        if path.len() >= capacity {
            return;
        }

        let bsdf = match hit.object_index().and_then(|object| world.bsdf(object)) {
            Some(bsdf) => bsdf,
            None => return,
        };
        let frame = Frame::from_normal(&vertex.normal);
        let wo = frame.to_local(&vertex.wi);
        let sample = match bsdf.sample(&sampler.next_2d(), &wo) {
            Some(sample) if sample.pdf > 0.0 => sample,
            _ => return,
        };
        let weight = sample.value * (sample.wi.z.abs() / sample.pdf);
        if weight.is_black() {
            return;
        }
        throughput = throughput.component_mul(&weight);

        let pdf_rev = bsdf.pdf(&sample.wi, &wo);
        let n = path.len();
        path[n - 2].pdf_rev = convert_density(pdf_rev, &path[n - 1], &path[n - 2]);
        if sample.delta {
            path[n - 1].delta = true;
        }

        if vertex.index as u32 > min_bounces {
            let q = throughput.max_component().min(1.0);
            if q <= 0.0 || sampler.next_1d() >= q {
                return;
            }
            throughput /= q;
        }

        ray = Ray3f::spawn(vertex.p, vertex.normal, frame.from_local(&sample.wi));
        pdf_dir = sample.pdf;
    }
}

/// Geometric coupling of two vertices. Cosines only apply to vertices on a
/// surface.
fn geometry_term(a: &PathVertex, b: &PathVertex) -> Float {
    let d = b.p - a.p;
    let dist2 = d.norm_squared();
    if dist2 == 0.0 {
        return 0.0;
    }
    let dir = d / dist2.sqrt();
    let mut g = 1.0 / dist2;
    if a.on_surface {
        g *= a.normal.dot(&dir).abs();
    }
    if b.on_surface {
        g *= b.normal.dot(&dir).abs();
    }
    g
}

fn remap0(pdf: Float) -> Float {
    if pdf != 0.0 {
        pdf
    } else {
        1.0
    }
}

impl BidirectionalTracer {
    pub fn new(world: Arc<World>, max_bounces: u32, min_bounces: u32, light_tracing: bool) -> Self {
        let camera_capacity = max_bounces as usize + 2;
        let light_capacity = max_bounces as usize + 1;
        Self {
            world,
            max_bounces,
            min_bounces,
            light_tracing,
            camera_path: Vec::with_capacity(camera_capacity),
            light_path: Vec::with_capacity(light_capacity),
        }
    }

    fn strategy_enabled(&self, s: usize, t: usize) -> bool {
        if t == 0 || (s == 1 && t == 1) {
            return false;
        }
        t != 1 || self.light_tracing
    }

    /// Returns the number of valid camera vertices.
    fn trace_camera_path(&mut self, pixel: Vector2u, sampler: &mut dyn SampleGenerator) -> usize {
        let world = self.world.clone();
        let camera = world.camera();
        self.camera_path.clear();
        self.camera_path.push(PathVertex::camera(camera.position(), camera.forward()));

        let jitter = sampler.next_2d();
        let raster = Vector2f::new(pixel.x as Float + jitter.x, pixel.y as Float + jitter.y);
        let ray = camera.sample_ray(&raster);
        let pdf_dir = camera.pdf_direction(&ray.dir());
        if pdf_dir <= 0.0 {
            return self.camera_path.len();
        }

        random_walk(&world, &mut self.camera_path, ray, RGBSpectrum::new(1.0, 1.0, 1.0), pdf_dir,
                    self.max_bounces as usize + 2, self.min_bounces, sampler);
        self.camera_path.len()
    }

    /// Returns the number of valid light vertices.
    fn trace_light_path(&mut self, sampler: &mut dyn SampleGenerator) -> usize {
        let world = self.world.clone();
        self.light_path.clear();

        let (index, pick_pdf) = match world.sample_emitter(sampler.next_1d()) {
            Some(pick) => pick,
            None => return 0,
        };
        let emitter = match world.emitter(index) {
            Some(emitter) => emitter,
            None => return 0,
        };
        let position = emitter.sample_position(&sampler.next_2d());
        let pdf_origin = pick_pdf * position.pdf;
        if pdf_origin <= 0.0 {
            return 0;
        }
        let origin = PathVertex::emitter(index, position.p, position.normal,
                                         emitter.eval_position() / pdf_origin, pdf_origin);
        self.light_path.push(origin);

        let direction = emitter.sample_direction(&sampler.next_2d(), &position);
        if direction.pdf <= 0.0 {
            return self.light_path.len();
        }
        let mut cos_theta = 1.0;
        if origin.on_surface {
            cos_theta = origin.normal.dot(&direction.direction).abs();
        }
        let factor = emitter.eval_direction(&position.normal, &direction.direction);
        let throughput = origin.throughput * (factor * cos_theta / direction.pdf);
        if throughput.is_black() {
            return self.light_path.len();
        }

        let ray = if origin.on_surface {
            Ray3f::spawn(origin.p, origin.normal, direction.direction)
        } else {
            Ray3f::new(origin.p, direction.direction, Some(EPSILON), None)
        };
        random_walk(&world, &mut self.light_path, ray, throughput, direction.pdf,
                    self.max_bounces as usize + 1, self.min_bounces, sampler);
        self.light_path.len()
    }

    /// Unweighted contribution of strategy (s, t) for t >= 2.
    fn connect(&self, s: usize, t: usize) -> RGBSpectrum {
        let world = self.world.as_ref();
        let pt = &self.camera_path[t - 1];
        if s == 0 {
            return pt.throughput.component_mul(&pt.le(world, &self.camera_path[t - 2]));
        }

        let qs = &self.light_path[s - 1];
        if !pt.is_connectible() || !qs.is_connectible() {
            return RGBSpectrum::zeros();
        }
        let value = qs.throughput
            .component_mul(&qs.f(world, pt))
            .component_mul(&pt.f(world, qs))
            .component_mul(&pt.throughput)
            * geometry_term(pt, qs);
        if value.is_black() || world.occluded(&pt.p, &qs.p) {
            return RGBSpectrum::zeros();
        }
        value
    }

    /// Unweighted light tracing contribution of light vertex `s - 1`, with the
    /// raster position it lands on.
    fn connect_to_camera(&self, s: usize) -> Option<(Vector2f, RGBSpectrum)> {
        let world = self.world.as_ref();
        let camera = world.camera();
        let qs = &self.light_path[s - 1];
        if !qs.is_connectible() {
            return None;
        }
        let projection = camera.project(&qs.p)?;
        if projection.importance <= 0.0 {
            return None;
        }

        let camera_vertex = &self.camera_path[0];
        let cos_camera = projection.direction.dot(&camera.forward()).abs();
        let mut scale = projection.importance * cos_camera
            / (projection.distance * projection.distance);
        if qs.on_surface {
            scale *= qs.normal.dot(&projection.direction).abs();
        }
        let value = qs.throughput.component_mul(&qs.f(world, camera_vertex)) * scale;
        if value.is_black() || world.occluded(&camera_vertex.p, &qs.p) {
            return None;
        }
        Some((projection.raster, value))
    }

    /// Power heuristic weight of strategy (s, t) among every enabled strategy
    /// that produces the same path. Reverse densities of the connection
    /// vertices and their predecessors depend on the strategy and are
    /// evaluated here rather than stored.
    fn mis_weight(&self, s: usize, t: usize) -> Float {
        if s + t == 2 {
            return 1.0;
        }
        let world = self.world.as_ref();
        let camera = &self.camera_path;
        let light = &self.light_path;

        let pt = &camera[t - 1];
        let pt_minus = if t > 1 { Some(&camera[t - 2]) } else { None };
        let qs = if s > 0 { Some(&light[s - 1]) } else { None };
        let qs_minus = if s > 1 { Some(&light[s - 2]) } else { None };

        let pt_rev = match qs {
            Some(qs) => qs.pdf(world, qs_minus, pt),
            None => pt.pdf_light_origin(world),
        };
        let pt_minus_rev = match (pt_minus, qs) {
            (Some(pm), Some(qs)) => pt.pdf(world, Some(qs), pm),
            (Some(pm), None) => pt.pdf_light(world, pm),
            _ => 0.0,
        };
        let qs_rev = match qs {
            Some(qs) => pt.pdf(world, pt_minus, qs),
            None => 0.0,
        };
        let qs_minus_rev = match (qs, qs_minus) {
            (Some(qs), Some(qm)) => qs.pdf(world, Some(pt), qm),
            _ => 0.0,
        };

        let camera_rev = |i: usize| -> Float {
            if i + 1 == t {
                pt_rev
            } else if i + 2 == t {
                pt_minus_rev
            } else {
                camera[i].pdf_rev
            }
        };
        let camera_delta = |i: usize| i + 1 != t && camera[i].delta;
        let light_rev = |i: usize| -> Float {
            if i + 1 == s {
                qs_rev
            } else if i + 2 == s {
                qs_minus_rev
            } else {
                light[i].pdf_rev
            }
        };
        let light_delta = |i: usize| i + 1 != s && light[i].delta;

        let mut sum_ri = 0.0;
        let mut ri = 1.0;
        for i in (1..t).rev() {
            ri *= remap0(camera_rev(i)) / remap0(camera[i].pdf_fwd);
            if !camera_delta(i) && !camera_delta(i - 1) && self.strategy_enabled(s + t - i, i) {
                sum_ri += ri * ri;
            }
        }

        ri = 1.0;
        for i in (0..s).rev() {
            ri *= remap0(light_rev(i)) / remap0(light[i].pdf_fwd);
            let delta_predecessor = if i > 0 {
                light_delta(i - 1)
            } else {
                light[0].is_delta_light(world)
            };
            if !light_delta(i) && !delta_predecessor && self.strategy_enabled(i, s + t - i) {
                sum_ri += ri * ri;
            }
        }

        1.0 / (1.0 + sum_ri)
    }
}

impl SampleTracer for BidirectionalTracer {
    fn trace_sample(&mut self,
                    pixel: Vector2u,
                    sampler: &mut dyn SampleGenerator,
                    splats: &AtomicFramebuffer) -> RGBSpectrum {
        let camera_len = self.trace_camera_path(pixel, sampler);
        let light_len = self.trace_light_path(sampler);

        let mut result = RGBSpectrum::zeros();
        for t in 1..=camera_len {
            for s in 0..=light_len {
                if s + t < 2 || s + t - 2 > self.max_bounces as usize || !self.strategy_enabled(s, t) {
                    continue;
                }
                if t == 1 {
                    if let Some((raster, value)) = self.connect_to_camera(s) {
                        let weighted = value * self.mis_weight(s, t);
                        if weighted.is_finite() {
                            splats.splat(raster.x as usize, raster.y as usize, &weighted);
                        } else {
                            debug!("Dropping non-finite light tracing splat for strategy s={}", s);
                        }
                    }
                } else {
                    let value = self.connect(s, t);
                    if !value.is_black() {
                        result += value * self.mis_weight(s, t);
                    }
                }
            }
        }
        result
    }
}
