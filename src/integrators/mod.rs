// Copyright @yucwang 2026

pub mod bidirectional;
pub mod path;
pub mod progressive;
