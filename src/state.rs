use crate::ingest::VitalsPipeline;

// app's shared state
#[derive(Clone)]
pub struct AppState {
    pub pipeline: VitalsPipeline,
    pub max_body_bytes: usize,
    pub trust_forwarded_for: bool, // only when running behind a proxy we control
}
