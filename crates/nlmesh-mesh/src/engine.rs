use crate::{
    error::{EngineError, Result},
    models::{ConnectivityReport, DetectedFeature, MeshHandle, MeshSummary, TopologyReport},
};

/// Geometry capability consumed by the analysis core.
///
/// Every call may fail; callers map failures to their own error kinds and
/// never retry.
pub trait MeshEngine: Send + Sync {
    fn load_summary(&self, handle: &MeshHandle) -> Result<MeshSummary>;

    fn volume(&self, handle: &MeshHandle) -> Result<f64>;

    fn surface_area(&self, handle: &MeshHandle) -> Result<f64>;

    fn topology(&self, handle: &MeshHandle) -> Result<TopologyReport>;

    fn detect_features(&self, handle: &MeshHandle) -> Result<Vec<DetectedFeature>>;

    fn connectivity(&self, _handle: &MeshHandle) -> Result<ConnectivityReport> {
        Err(EngineError::Unsupported("connectivity analysis".to_string()))
    }

    /// Drops engine-side data for `handle`. Returns whether anything was held.
    fn unload(&self, _handle: &MeshHandle) -> bool {
        false
    }
}
