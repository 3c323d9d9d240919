use std::sync::Arc;

use omnicore_runtime::QController;
use omnicore_store::ResourceStore;

/// Name, inputs, and outputs of a controller registered with the running
/// runtime, surfaced read-only over `/controllers` and `/dependency-graph`.
#[derive(Clone)]
pub struct ControllerInfo {
    pub name: String,
    pub inputs: Vec<omnicore_runtime::InputSpec>,
    pub outputs: Vec<omnicore_runtime::OutputSpec>,
}

impl ControllerInfo {
    pub fn from_controller(controller: &dyn QController) -> Self {
        ControllerInfo { name: controller.name().to_string(), inputs: controller.inputs(), outputs: controller.outputs() }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ResourceStore>,
    pub controllers: Arc<Vec<ControllerInfo>>,
    pub auth_token: Arc<String>,
}
