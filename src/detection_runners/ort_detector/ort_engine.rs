//! ONNX Runtime backed [`Interpreter`].

use std::path::Path;
use std::sync::Once;
use anyhow::Result;
use half::f16;
use ort::{
    execution_providers::{ExecutionProvider,
                          CPUExecutionProvider,
                          CUDAExecutionProvider,
                          TensorRTExecutionProvider,
                          CoreMLExecutionProvider},
    session::builder::{GraphOptimizationLevel, SessionBuilder},
    session::{Session, SessionInputValue},
    tensor::TensorElementType,
    value::{DynValue, Value, ValueType},
};
use crate::common::{DetectorConfig, InferenceDevice};
use crate::data::{CROSS_MARK, X};
use crate::detection_runners::inference_process::Interpreter;

static ORT_INIT: Once = Once::new();

pub struct OrtEngine {
    session: Session,
    device: InferenceDevice,
    input_dtype: TensorElementType,
    output_name: String,
    output_dtype: TensorElementType,
    output_shape: Vec<i64>,
}

impl std::fmt::Debug for OrtEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrtEngine")
            .field("device", &self.device)
            .field("output_name", &self.output_name)
            .field("output_shape", &self.output_shape)
            .finish()
    }
}

impl OrtEngine {
    pub fn new(model_path: &Path, config: &DetectorConfig) -> Result<Self> {
        if let Some(lib) = &config.ort_lib_path {
            ORT_INIT.call_once(|| {
                if let Err(e) = ort::init_from(lib).commit() {
                    log::error!("{CROSS_MARK} ORT commit failed: {e:?}");
                }
            });
        }

        let mut builder = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(config.num_threads.max(1))?;

        let mut device = config.inference_device;
        match device {
            InferenceDevice::TensorRT(device_id) => {
                Self::build_trt(&mut builder, device_id).unwrap_or_else(|err| {
                    log::warn!("{err}, Using cpu");
                    device = InferenceDevice::CPU;
                })
            }
            InferenceDevice::CUDA(device_id) => {
                Self::build_cuda(&mut builder, device_id).unwrap_or_else(|err| {
                    log::warn!("{err}, Using cpu");
                    device = InferenceDevice::CPU;
                })
            }
            InferenceDevice::CoreML(_) => Self::build_coreml(&mut builder).unwrap_or_else(|err| {
                log::warn!("{err}, Using cpu");
                device = InferenceDevice::CPU;
            }),
            InferenceDevice::CPU => {
                Self::build_cpu(&mut builder)?;
            }
        }

        let session = builder.commit_from_file(model_path)?;

        let input_dtype = match session.inputs.first().map(|i| &i.input_type) {
            Some(ValueType::Tensor { ty, .. }) => *ty,
            _ => anyhow::bail!("{CROSS_MARK} Model input is not a tensor"),
        };
        let output = session.outputs.first()
            .ok_or_else(|| anyhow::anyhow!("{CROSS_MARK} Model has no outputs"))?;
        let (output_dtype, output_shape) = match &output.output_type {
            ValueType::Tensor { ty, shape, .. } => (*ty, shape.iter().copied().collect::<Vec<i64>>()),
            _ => anyhow::bail!("{CROSS_MARK} Model output is not a tensor"),
        };
        let output_name = output.name.to_string();

        log::info!(
            "Backend: ONNXRuntime | Device: {} | Output: {} {:?}",
            device, output_name, output_shape,
        );

        Ok(Self {
            session,
            device,
            input_dtype,
            output_name,
            output_dtype,
            output_shape,
        })
    }

    fn build_trt(builder: &mut SessionBuilder, device_id: usize) -> Result<()> {
        let trt = TensorRTExecutionProvider::default()
            .with_device_id(device_id as i32)
            .with_fp16(true)
            .with_engine_cache(true)
            .with_engine_cache_path("trt-cache");
        if trt.is_available()? {
            match trt.register(builder) {
                Ok(_) => { }
                Err(err) => { anyhow::bail!("{CROSS_MARK} TensorRT initialization failed: {:?}", err) }
            }
            log::info!("Initial model serialization with TensorRT may take some time...");
            Ok(())
        } else {
            anyhow::bail!("{CROSS_MARK} TensorRT execution provider not available")
        }
    }

    fn build_cuda(builder: &mut SessionBuilder, device_id: usize) -> Result<()> {
        let ep = CUDAExecutionProvider::default()
            .with_device_id(device_id as i32);
        if ep.is_available()? {
            match ep.register(builder) {
                Ok(_) => { }
                Err(err) => { anyhow::bail!("{CROSS_MARK} CUDA initialization failed: {:?}", err) }
            }
            Ok(())
        } else {
            anyhow::bail!("{CROSS_MARK} CUDA execution provider not available")
        }
    }

    fn build_coreml(builder: &mut SessionBuilder) -> Result<()> {
        let ep = CoreMLExecutionProvider::default()
            .with_subgraphs(false);
        if ep.is_available()? {
            match ep.register(builder) {
                Ok(_) => { }
                Err(err) => { anyhow::bail!("{CROSS_MARK} CoreML initialization failed: {:?}", err) }
            }
            Ok(())
        } else {
            anyhow::bail!("{CROSS_MARK} CoreML execution provider not available")
        }
    }

    fn build_cpu(builder: &mut SessionBuilder) -> Result<()> {
        let ep = CPUExecutionProvider::default();
        if ep.is_available()? {
            match ep.register(builder) {
                Ok(_) => { }
                Err(err) => { anyhow::bail!("{CROSS_MARK} CPU initialization failed: {:?}", err) }
            }
            Ok(())
        } else {
            anyhow::bail!("{CROSS_MARK} CPU execution provider not available")
        }
    }

    fn tensor_preprocess(x: &X, dtype: &TensorElementType) -> Result<DynValue> {
        let x = match dtype {
            TensorElementType::Float32 => Value::from_array(x.0.clone())?.into_dyn(),
            TensorElementType::Float16 => Value::from_array(x.mapv(f16::from_f32))?.into_dyn(),
            TensorElementType::Uint8 => Value::from_array(x.mapv(|x_| (x_ * 255.0).round() as u8))?.into_dyn(),
            _ => anyhow::bail!("Unsupported model input type: {:?}", dtype),
        };
        Ok(x)
    }

    fn copy_output(y: &DynValue, dtype: &TensorElementType, output: &mut X) -> Result<()> {
        let dst = output.data_mut()?;
        match dtype {
            TensorElementType::Float32 => {
                let src = y.try_extract_array::<f32>()?;
                if src.len() != dst.len() {
                    anyhow::bail!("Model produced {} values, buffer holds {}", src.len(), dst.len());
                }
                dst.iter_mut().zip(src.iter()).for_each(|(d, s)| *d = *s);
            }
            TensorElementType::Float16 => {
                let src = y.try_extract_array::<f16>()?;
                if src.len() != dst.len() {
                    anyhow::bail!("Model produced {} values, buffer holds {}", src.len(), dst.len());
                }
                dst.iter_mut().zip(src.iter()).for_each(|(d, s)| *d = s.to_f32());
            }
            _ => anyhow::bail!("Unsupported model output type: {:?}", dtype),
        }
        Ok(())
    }
}

impl Interpreter for OrtEngine {
    fn output_shape(&self) -> Vec<i64> {
        self.output_shape.clone()
    }

    fn invoke(&mut self, input: &X, output: &mut X) -> Result<()> {
        let xs_ = [Into::<SessionInputValue<'_>>::into(Self::tensor_preprocess(input, &self.input_dtype)?)];
        let outputs = self.session.run(&xs_[..])?;
        let y = outputs.get(self.output_name.as_str())
            .ok_or_else(|| anyhow::anyhow!("Model output {} missing", self.output_name))?;
        Self::copy_output(y, &self.output_dtype, output)?;
        Ok(())
    }

    fn backend(&self) -> InferenceDevice {
        self.device
    }
}
