// Copyright @yucwang 2026

use serde::Serialize;
use std::collections::VecDeque;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderState {
    Loading,
    Rendering,
}

/// Progress of the standalone renderer. Copies are handed out under the
/// status lock; `current_spp <= next_spp <= total_spp` always holds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderStatus {
    pub state: RenderState,
    pub current_spp: u32,
    pub next_spp: u32,
    pub total_spp: u32,
    pub current_scene: PathBuf,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub completed_scenes: Vec<PathBuf>,
    #[serde(skip_serializing_if = "VecDeque::is_empty")]
    pub queued_scenes: VecDeque<PathBuf>,
}

impl Default for RenderStatus {
    fn default() -> Self {
        Self {
            state: RenderState::Loading,
            current_spp: 0,
            next_spp: 0,
            total_spp: 0,
            current_scene: PathBuf::new(),
            completed_scenes: Vec::new(),
            queued_scenes: VecDeque::new(),
        }
    }
}

impl RenderStatus {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
