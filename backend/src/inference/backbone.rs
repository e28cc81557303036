use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tch::nn::{self, ModuleT};
use tch::vision::densenet;
use tch::{CModule, Device, Kind, Tensor};

use super::preprocess::PreparedImage;
use super::{Backbone, InferenceError};

/// A TorchScript export (architecture and weights in one archive).
pub struct TorchScriptBackbone {
    module: Mutex<CModule>,
    device: Device,
}

impl TorchScriptBackbone {
    pub fn load(path: &Path, device: Device) -> Result<Self, InferenceError> {
        let mut module = CModule::load_on_device(path, device).map_err(InferenceError::Load)?;
        module.set_eval();
        Ok(Self {
            module: Mutex::new(module),
            device,
        })
    }
}

impl Backbone for TorchScriptBackbone {
    fn forward(&self, input: &PreparedImage) -> Result<Vec<f32>, InferenceError> {
        let tensor = input.to_tensor(self.device)?;
        let module = lock(&self.module);
        let output = tch::no_grad(|| module.forward_ts(&[tensor])).map_err(InferenceError::Forward)?;
        flatten(&output)
    }
}

struct DenseNet {
    // Owns the parameters the network closure reads from.
    _vs: nn::VarStore,
    net: Box<dyn ModuleT + Send>,
}

/// DenseNet121 rebuilt in Rust with a single-output classifier, weights
/// restored from a VarStore archive.
pub struct DenseNetBackbone {
    inner: Mutex<DenseNet>,
    device: Device,
}

impl DenseNetBackbone {
    pub const OUTPUTS: i64 = 1;

    pub fn load(path: &Path, device: Device) -> Result<Self, InferenceError> {
        let mut vs = nn::VarStore::new(device);
        let net = densenet::densenet121(&vs.root(), Self::OUTPUTS);
        vs.load(path).map_err(InferenceError::Load)?;
        vs.freeze();
        Ok(Self {
            inner: Mutex::new(DenseNet { _vs: vs, net: Box::new(net) }),
            device,
        })
    }
}

impl Backbone for DenseNetBackbone {
    fn forward(&self, input: &PreparedImage) -> Result<Vec<f32>, InferenceError> {
        let tensor = input.to_tensor(self.device)?;
        let inner = lock(&self.inner);
        // train = false keeps batch norm on running stats and disables dropout.
        let output = tch::no_grad(|| inner.net.forward_t(&tensor, false));
        flatten(&output)
    }
}

/// The weights are never written after load, so a panic in an earlier
/// forward pass leaves nothing half-updated behind the lock.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn flatten(output: &Tensor) -> Result<Vec<f32>, InferenceError> {
    let flat = output
        .f_to_kind(Kind::Float)
        .and_then(|t| t.f_to_device(Device::Cpu))
        .and_then(|t| t.f_view([-1]))
        .map_err(InferenceError::Forward)?;
    Vec::<f32>::try_from(&flat).map_err(InferenceError::Forward)
}
