// Copyright @yucwang 2021

pub mod bsdf;
pub mod distribution;
pub mod emitter;
pub mod framebuffer;
pub mod integrator;
pub mod interaction;
pub mod path_vertex;
pub mod rng;
pub mod sampler;
pub mod sensor;
pub mod scene;
pub mod scene_loader;
pub mod shape;
