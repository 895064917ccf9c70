// Copyright @yucwang 2026

pub mod standalone;
pub mod status;
