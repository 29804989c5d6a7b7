use crate::models::config::EffectConfig;
use crate::models::device::Device;
use crate::models::state::PipelineState;

/// Explicit change notifications from the pipeline controller.
///
/// Methods are called on whichever thread performed the change, never while
/// controller locks are held. Implementations should marshal to a UI thread if needed.
pub trait PipelineObserver: Send + Sync {
    /// Called on every state transition.
    fn on_state_changed(&self, state: &PipelineState);

    /// Called after the effect config changed.
    fn on_config_changed(&self, _config: &EffectConfig) {}

    /// Called after the device catalog was refreshed.
    fn on_devices_changed(&self, _capture: &[Device], _render: &[Device]) {}
}
