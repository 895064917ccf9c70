// Copyright @yucwang 2026

//! Vertices of camera and light subpaths.
//!
//! Both densities stored on a vertex are per unit area at that vertex:
//! `pdf_fwd` is the density with which the subpath that built the vertex
//! generated it, `pdf_rev` the density with which the opposite subpath would
//! have generated it. Solid angle densities are turned into area densities
//! with `convert_density`.

use crate::core::interaction::SurfaceIntersection;
use crate::core::scene::World;
use crate::math::constants::{Float, Vector3f};
use crate::math::frame::Frame;
use crate::math::spectrum::RGBSpectrum;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexKind {
    Camera,
    Emitter { emitter: usize },
    Surface { object: usize, emitter: Option<usize> },
}

#[derive(Debug, Clone, Copy)]
pub struct PathVertex {
    pub kind: VertexKind,
    pub p: Vector3f,
    pub normal: Vector3f,
    /// Unit direction towards the predecessor on the subpath.
    pub wi: Vector3f,
    pub throughput: RGBSpectrum,
    pub pdf_fwd: Float,
    pub pdf_rev: Float,
    pub delta: bool,
    pub on_surface: bool,
    pub index: usize,
}

/// Converts a solid angle density at `from` into an area density at `to`.
/// The cosine term only applies when `to` lies on a surface.
pub fn convert_density(pdf: Float, from: &PathVertex, to: &PathVertex) -> Float {
    let w = to.p - from.p;
    let dist2 = w.norm_squared();
    if dist2 == 0.0 {
        return 0.0;
    }
    let inv_dist2 = 1.0 / dist2;
    let mut result = pdf * inv_dist2;
    if to.on_surface {
        result *= to.normal.dot(&(w * inv_dist2.sqrt())).abs();
    }
    result
}

impl PathVertex {
    pub fn camera(p: Vector3f, forward: Vector3f) -> Self {
        Self {
            kind: VertexKind::Camera,
            p,
            normal: forward,
            wi: Vector3f::zeros(),
            throughput: RGBSpectrum::new(1.0, 1.0, 1.0),
            pdf_fwd: 1.0,
            pdf_rev: 0.0,
            delta: false,
            on_surface: false,
            index: 0,
        }
    }

    pub fn emitter(emitter: usize,
                   p: Vector3f,
                   normal: Vector3f,
                   throughput: RGBSpectrum,
                   pdf_fwd: Float) -> Self {
        Self {
            kind: VertexKind::Emitter { emitter },
            p,
            normal,
            wi: Vector3f::zeros(),
            throughput,
            pdf_fwd,
            pdf_rev: 0.0,
            delta: false,
            on_surface: normal != Vector3f::zeros(),
            index: 0,
        }
    }

    /// Surface vertex reached from `prev` along a direction sampled with
    /// solid angle density `pdf_dir`.
    pub fn surface(world: &World,
                   hit: &SurfaceIntersection,
                   throughput: RGBSpectrum,
                   pdf_dir: Float,
                   prev: &PathVertex) -> Option<Self> {
        let object = hit.object_index()?;
        let to_prev = prev.p - hit.p();
        let dist = to_prev.norm();
        if dist <= 0.0 {
            return None;
        }
        let mut vertex = Self {
            kind: VertexKind::Surface { object, emitter: world.object_emitter(object) },
            p: hit.p(),
            normal: hit.geo_normal(),
            wi: to_prev / dist,
            throughput,
            pdf_fwd: 0.0,
            pdf_rev: 0.0,
            delta: false,
            on_surface: true,
            index: prev.index + 1,
        };
        vertex.pdf_fwd = convert_density(pdf_dir, prev, &vertex);
        Some(vertex)
    }

    pub fn emitter_index(&self) -> Option<usize> {
        match self.kind {
            VertexKind::Emitter { emitter } => Some(emitter),
            VertexKind::Surface { emitter, .. } => emitter,
            VertexKind::Camera => None,
        }
    }

    pub fn is_delta_light(&self, world: &World) -> bool {
        match self.kind {
            VertexKind::Emitter { emitter } => world.emitter(emitter)
                .map(|e| e.is_delta_position())
                .unwrap_or(false),
            _ => false,
        }
    }

    /// A vertex a connection can be made to: everything except specular
    /// surface vertices.
    pub fn is_connectible(&self) -> bool {
        match self.kind {
            VertexKind::Surface { .. } => !self.delta,
            _ => true,
        }
    }

    fn direction_to(&self, other: &PathVertex) -> Option<Vector3f> {
        let w = other.p - self.p;
        let len = w.norm();
        if len > 0.0 {
            Some(w / len)
        } else {
            None
        }
    }

    /// Scattering value from the predecessor towards `next`. For emitter
    /// vertices this is the directional emission factor.
    pub fn f(&self, world: &World, next: &PathVertex) -> RGBSpectrum {
        let wo = match self.direction_to(next) {
            Some(wo) => wo,
            None => return RGBSpectrum::zeros(),
        };
        match self.kind {
            VertexKind::Surface { object, .. } => match world.bsdf(object) {
                Some(bsdf) => {
                    let frame = Frame::from_normal(&self.normal);
                    bsdf.eval(&frame.to_local(&self.wi), &frame.to_local(&wo))
                }
                None => RGBSpectrum::zeros(),
            },
            VertexKind::Emitter { emitter } => match world.emitter(emitter) {
                Some(e) => {
                    let factor = e.eval_direction(&self.normal, &wo);
                    RGBSpectrum::new(factor, factor, factor)
                }
                None => RGBSpectrum::zeros(),
            },
            VertexKind::Camera => RGBSpectrum::zeros(),
        }
    }

    /// Radiance emitted from this vertex towards `towards`.
    pub fn le(&self, world: &World, towards: &PathVertex) -> RGBSpectrum {
        let emitter = match self.emitter_index().and_then(|e| world.emitter(e)) {
            Some(emitter) => emitter,
            None => return RGBSpectrum::zeros(),
        };
        match self.direction_to(towards) {
            Some(w) => emitter.eval(&self.normal, &w),
            None => RGBSpectrum::zeros(),
        }
    }

    /// Area density at `next` of sampling it from this vertex, given the
    /// predecessor `prev`.
    pub fn pdf(&self, world: &World, prev: Option<&PathVertex>, next: &PathVertex) -> Float {
        if let VertexKind::Emitter { .. } = self.kind {
            return self.pdf_light(world, next);
        }
        let wn = match self.direction_to(next) {
            Some(w) => w,
            None => return 0.0,
        };
        let pdf = match self.kind {
            VertexKind::Camera => world.camera().pdf_direction(&wn),
            VertexKind::Surface { object, .. } => {
                let wp = match prev.and_then(|p| self.direction_to(p)) {
                    Some(w) => w,
                    None => return 0.0,
                };
                match world.bsdf(object) {
                    Some(bsdf) => {
                        let frame = Frame::from_normal(&self.normal);
                        bsdf.pdf(&frame.to_local(&wp), &frame.to_local(&wn))
                    }
                    None => 0.0,
                }
            }
            VertexKind::Emitter { .. } => 0.0,
        };
        convert_density(pdf, self, next)
    }

    /// Area density at `next` of a light subpath leaving this emitter vertex
    /// towards it.
    pub fn pdf_light(&self, world: &World, next: &PathVertex) -> Float {
        let emitter = match self.emitter_index().and_then(|e| world.emitter(e)) {
            Some(emitter) => emitter,
            None => return 0.0,
        };
        let w = match self.direction_to(next) {
            Some(w) => w,
            None => return 0.0,
        };
        let pdf_dir = emitter.pdf_direction(&self.normal, &w);
        convert_density(pdf_dir, self, next)
    }

    /// Area density of a light subpath starting at this vertex.
    pub fn pdf_light_origin(&self, world: &World) -> Float {
        match self.emitter_index() {
            Some(index) => match world.emitter(index) {
                Some(emitter) => world.emitter_pdf(index) * emitter.pdf_position(&self.p),
                None => 0.0,
            },
            None => 0.0,
        }
    }
}
