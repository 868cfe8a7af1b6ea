//! Candle-backed model runtime
//!
//! Artifacts are directories (local, Hugging Face repo, or HTTP base URL)
//! holding the CrabNet weights in one of two files:
//! - `model.safetensors` for [`ModelFormat::Graph`]
//! - `pytorch_model.bin` for [`ModelFormat::Layers`]

use crate::config::DeviceSpec;
use crate::runtime::{InferenceRuntime, LoadedModel};
use async_trait::async_trait;
use candle_core::{DType, Device, Module, Tensor, D};
use candle_nn::{Conv2d, Conv2dConfig, Linear, VarBuilder};
use carapace_core::{Error, InputShape, ModelFormat, Result};
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Number of output classes (Male, Female)
pub const NUM_CLASSES: usize = 2;

/// Weights file expected for each artifact format
pub fn artifact_file(format: ModelFormat) -> &'static str {
    match format {
        ModelFormat::Graph => "model.safetensors",
        ModelFormat::Layers => "pytorch_model.bin",
    }
}

/// Small convolutional classifier for 224x224 RGB crab photos
#[derive(Clone)]
pub struct CrabNet {
    conv1: Conv2d,
    conv2: Conv2d,
    head: Linear,
}

impl CrabNet {
    /// Build the network from weights under `conv1`, `conv2` and `head`
    pub fn new(vb: VarBuilder) -> candle_core::Result<Self> {
        let cfg = Conv2dConfig {
            padding: 1,
            stride: 2,
            ..Default::default()
        };
        let conv1 = candle_nn::conv2d(3, 16, 3, cfg, vb.pp("conv1"))?;
        let conv2 = candle_nn::conv2d(16, 32, 3, cfg, vb.pp("conv2"))?;
        let head = candle_nn::linear(32, NUM_CLASSES, vb.pp("head"))?;
        Ok(Self { conv1, conv2, head })
    }
}

impl Module for CrabNet {
    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        // NHWC in, NCHW for the convolutions
        let xs = xs.permute((0, 3, 1, 2))?.contiguous()?;
        let xs = self.conv1.forward(&xs)?.relu()?;
        let xs = self.conv2.forward(&xs)?.relu()?;
        let xs = xs.flatten_from(2)?.mean(D::Minus1)?;
        self.head.forward(&xs)
    }
}

/// CrabNet loaded onto a Candle device
pub struct CandleModel {
    format: ModelFormat,
    device: Device,
    net: CrabNet,
    weights_path: PathBuf,
}

impl CandleModel {
    /// Load weights from `path` interpreted as `format`
    pub fn load(path: &Path, format: ModelFormat, device: &Device) -> Result<Self> {
        let vb = match format {
            ModelFormat::Graph => {
                let tensors = candle_core::safetensors::load(path, device).map_err(|e| {
                    Error::artifact_fetch(format, format!("failed to load SafeTensors: {}", e))
                })?;
                VarBuilder::from_tensors(tensors, DType::F32, device)
            }
            ModelFormat::Layers => VarBuilder::from_pth(path, DType::F32, device).map_err(|e| {
                Error::artifact_fetch(format, format!("failed to load PyTorch weights: {}", e))
            })?,
        };

        let net = CrabNet::new(vb).map_err(|e| {
            Error::artifact_fetch(format, format!("weights do not match CrabNet: {}", e))
        })?;

        Ok(Self {
            format,
            device: device.clone(),
            net,
            weights_path: path.to_path_buf(),
        })
    }

    /// Run the network on an NHWC batch
    pub fn forward(&self, input: &Tensor) -> Result<Tensor> {
        self.net
            .forward(input)
            .map_err(|e| Error::classification(e.to_string()))
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn weights_path(&self) -> &Path {
        &self.weights_path
    }
}

#[async_trait]
impl LoadedModel for CandleModel {
    fn format(&self) -> ModelFormat {
        self.format
    }

    async fn warm_up(&self, shape: InputShape) -> Result<()> {
        let net = self.net.clone();
        let device = self.device.clone();

        // Forward passes are CPU/GPU bound; keep them off the async workers
        let dims = tokio::task::spawn_blocking(move || -> candle_core::Result<Vec<usize>> {
            let input = Tensor::zeros(
                (1, shape.height, shape.width, shape.channels),
                DType::F32,
                &device,
            )?;
            let logits = net.forward(&input)?;
            Ok(logits.dims().to_vec())
        })
        .await
        .map_err(|e| Error::warmup(format!("warm-up task failed: {}", e)))?
        .map_err(|e| Error::warmup(e.to_string()))?;

        tracing::debug!(?dims, "Warm-up forward pass complete");
        Ok(())
    }
}

/// Runtime loading CrabNet artifacts with Candle
pub struct CandleRuntime {
    device_spec: DeviceSpec,
    device: RwLock<Option<Device>>,
    cache_dir: PathBuf,
    client: reqwest::Client,
}

impl CandleRuntime {
    /// Create a runtime targeting `device_spec`
    pub fn new(device_spec: DeviceSpec) -> Self {
        let cache_dir = dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("carapace/models");

        Self {
            device_spec,
            device: RwLock::new(None),
            cache_dir,
            client: reqwest::Client::new(),
        }
    }

    /// Override where downloaded artifacts are stored
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }

    fn create_device(spec: DeviceSpec) -> Result<(Device, String)> {
        match spec {
            DeviceSpec::Cpu => Ok((Device::Cpu, "cpu".to_string())),
            DeviceSpec::Cuda { index } => {
                let idx = index.unwrap_or(0);
                Device::new_cuda(idx)
                    .map(|d| (d, format!("cuda:{}", idx)))
                    .map_err(|e| Error::backend_init(format!("failed to create CUDA device: {}", e)))
            }
            DeviceSpec::Metal { index } => {
                let idx = index.unwrap_or(0);
                Device::new_metal(idx)
                    .map(|d| (d, format!("metal:{}", idx)))
                    .map_err(|e| Error::backend_init(format!("failed to create Metal device: {}", e)))
            }
        }
    }

    fn device(&self) -> Result<Device> {
        self.device
            .read()
            .clone()
            .ok_or_else(|| Error::backend_init("runtime used before initialize()"))
    }

    /// Resolve the weights file for `format` to a local path
    async fn resolve(&self, url: &str, format: ModelFormat) -> Result<PathBuf> {
        let file = artifact_file(format);

        if let Some(repo) = url.strip_prefix("hf://") {
            let repo = repo.to_string();
            tracing::info!("Downloading {} from HuggingFace repo {}", file, repo);
            return tokio::task::spawn_blocking(move || {
                let api = hf_hub::api::sync::Api::new().map_err(|e| {
                    Error::artifact_fetch(format, format!("failed to initialize HF API: {}", e))
                })?;
                api.model(repo).get(file).map_err(|e| {
                    Error::artifact_fetch(format, format!("failed to download {}: {}", file, e))
                })
            })
            .await
            .map_err(|e| Error::artifact_fetch(format, format!("download task failed: {}", e)))?;
        }

        if url.starts_with("http://") || url.starts_with("https://") {
            return self.download(url, file, format).await;
        }

        let path = Path::new(url).join(file);
        if !path.exists() {
            return Err(Error::artifact_fetch(
                format,
                format!("model file not found: {}", path.display()),
            ));
        }
        Ok(path)
    }

    async fn download(&self, base: &str, file: &str, format: ModelFormat) -> Result<PathBuf> {
        let target_dir = self.cache_dir.join(cache_key(base));
        let target = target_dir.join(file);
        if target.exists() {
            tracing::debug!("Using cached artifact {}", target.display());
            return Ok(target);
        }

        let url = format!("{}/{}", base.trim_end_matches('/'), file);
        tracing::info!("Downloading {}", url);

        let fetch_err = |e: reqwest::Error| Error::artifact_fetch(format, e.to_string());
        let bytes = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(fetch_err)?
            .error_for_status()
            .map_err(fetch_err)?
            .bytes()
            .await
            .map_err(fetch_err)?;

        let io_err = |e: std::io::Error| {
            Error::artifact_fetch(format, format!("failed to cache {}: {}", file, e))
        };
        tokio::fs::create_dir_all(&target_dir).await.map_err(io_err)?;
        tokio::fs::write(&target, &bytes).await.map_err(io_err)?;

        Ok(target)
    }
}

#[async_trait]
impl InferenceRuntime for CandleRuntime {
    async fn initialize(&self) -> Result<String> {
        let (device, backend) = Self::create_device(self.device_spec)?;
        *self.device.write() = Some(device);
        Ok(backend)
    }

    async fn fetch(&self, url: &str, format: ModelFormat) -> Result<Arc<dyn LoadedModel>> {
        let device = self.device()?;
        let path = self.resolve(url, format).await?;
        tracing::debug!("Loading {} weights from {}", format, path.display());
        let model = CandleModel::load(&path, format, &device)?;
        Ok(Arc::new(model))
    }
}

fn cache_key(url: &str) -> String {
    url.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect()
}
