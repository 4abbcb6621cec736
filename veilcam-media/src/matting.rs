//! Video matting model
//!
//! Wraps a recurrent matting model (RVM-style ONNX export) behind ONNX
//! Runtime. The model takes the current frame plus four recurrent state
//! tensors and a fixed downsample ratio, and yields a foreground plane, an
//! alpha plane, and the next recurrent state. The state is replaced
//! wholesale after every call; the first call runs with all-zero state.

use crate::error::MediaError;
use crate::frames::VideoFrame;
use ndarray::{Array4, ArrayD, IxDyn};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Downsample ratio fed to the model on every call
pub const DEFAULT_DOWNSAMPLE_RATIO: f32 = 0.5;

/// Output of one inference call
#[derive(Debug, Clone)]
pub struct MatteOutput {
    /// Foreground plane, CHW layout, 3 x height x width, values in [0,1]
    pub fgr: Vec<f32>,
    /// Alpha plane, height x width, values in [0,1]
    pub pha: Vec<f32>,
    /// Plane width
    pub width: u32,
    /// Plane height
    pub height: u32,
}

/// Per-frame matting inference
///
/// The pipeline drives inference through this trait so tests can swap in
/// synthetic engines; [`MattingModel`] is the real implementation.
pub trait MattingEngine: Send {
    /// Produce the matte for one frame
    fn infer(&mut self, frame: &VideoFrame) -> Result<MatteOutput, MediaError>;
}

/// Matting model session with recurrent state
pub struct MattingModel {
    session: ort::session::Session,
    // r1..r4, replaced after every run
    recurrent: [ArrayD<f32>; 4],
    downsample_ratio: f32,
    model_path: PathBuf,
}

impl std::fmt::Debug for MattingModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MattingModel")
            .field("model_path", &self.model_path)
            .field("downsample_ratio", &self.downsample_ratio)
            .finish()
    }
}

impl MattingModel {
    /// Load the model from an ONNX file
    pub fn load(model_path: &Path) -> Result<Self, MediaError> {
        Self::load_with_ratio(model_path, DEFAULT_DOWNSAMPLE_RATIO)
    }

    /// Load the model with a custom downsample ratio
    pub fn load_with_ratio(model_path: &Path, downsample_ratio: f32) -> Result<Self, MediaError> {
        if !model_path.exists() {
            return Err(MediaError::ModelLoadFailed {
                path: model_path.display().to_string(),
                reason: "file not found".to_string(),
            });
        }

        ort::init()
            .with_name("veilcam")
            .commit()
            .map_err(|e| MediaError::ModelLoadFailed {
                path: model_path.display().to_string(),
                reason: format!("ONNX Runtime init failed: {}", e),
            })?;

        let session = ort::session::Session::builder()
            .map_err(|e| MediaError::ModelLoadFailed {
                path: model_path.display().to_string(),
                reason: format!("session builder failed: {}", e),
            })?
            .with_intra_threads(2)
            .map_err(|e| MediaError::ModelLoadFailed {
                path: model_path.display().to_string(),
                reason: format!("thread config failed: {}", e),
            })?
            .commit_from_file(model_path)
            .map_err(|e| MediaError::ModelLoadFailed {
                path: model_path.display().to_string(),
                reason: e.to_string(),
            })?;

        info!("Loaded matting model from {:?}", model_path);

        Ok(Self {
            session,
            recurrent: Self::initial_state(),
            downsample_ratio,
            model_path: model_path.to_path_buf(),
        })
    }

    fn initial_state() -> [ArrayD<f32>; 4] {
        [
            ArrayD::zeros(IxDyn(&[1, 1, 1, 1])),
            ArrayD::zeros(IxDyn(&[1, 1, 1, 1])),
            ArrayD::zeros(IxDyn(&[1, 1, 1, 1])),
            ArrayD::zeros(IxDyn(&[1, 1, 1, 1])),
        ]
    }

    /// Drop the recurrent state, as if the next frame were the first
    pub fn reset_state(&mut self) {
        self.recurrent = Self::initial_state();
        debug!("Matting recurrent state reset");
    }

    /// Run inference on one frame
    ///
    /// Replaces the recurrent state with this run's outputs before
    /// returning.
    pub fn infer(&mut self, frame: &VideoFrame) -> Result<MatteOutput, MediaError> {
        let src = preprocess_rgba(frame);

        let src_tensor =
            ort::value::Tensor::from_array(src).map_err(|e| MediaError::Matting {
                reason: format!("src tensor: {}", e),
            })?;
        // The exported model takes the ratio as a one-element tensor
        let ratio_tensor = ort::value::Tensor::from_array(ArrayD::from_elem(
            IxDyn(&[1]),
            self.downsample_ratio,
        ))
        .map_err(|e| MediaError::Matting {
            reason: format!("ratio tensor: {}", e),
        })?;
        let [r1, r2, r3, r4] = &self.recurrent;
        let r1_tensor = recurrent_tensor(r1)?;
        let r2_tensor = recurrent_tensor(r2)?;
        let r3_tensor = recurrent_tensor(r3)?;
        let r4_tensor = recurrent_tensor(r4)?;

        let outputs = self
            .session
            .run(ort::inputs![
                "src" => src_tensor,
                "r1i" => r1_tensor,
                "r2i" => r2_tensor,
                "r3i" => r3_tensor,
                "r4i" => r4_tensor,
                "downsample_ratio" => ratio_tensor,
            ])
            .map_err(|e| MediaError::Matting {
                reason: format!("inference failed: {}", e),
            })?;

        let (fgr_shape, fgr_data) = extract_f32(&outputs, "fgr")?;
        let (pha_shape, pha_data) = extract_f32(&outputs, "pha")?;

        // fgr is [1, 3, H, W], pha is [1, 1, H, W]
        if fgr_shape.len() != 4 || pha_shape.len() != 4 {
            return Err(MediaError::Matting {
                reason: format!(
                    "unexpected output rank: fgr {:?}, pha {:?}",
                    fgr_shape, pha_shape
                ),
            });
        }
        let height = pha_shape[2] as u32;
        let width = pha_shape[3] as u32;

        let output = MatteOutput {
            fgr: fgr_data,
            pha: pha_data,
            width,
            height,
        };

        // Thread this run's state into the next one
        self.recurrent = [
            extract_state(&outputs, "r1o")?,
            extract_state(&outputs, "r2o")?,
            extract_state(&outputs, "r3o")?,
            extract_state(&outputs, "r4o")?,
        ];

        Ok(output)
    }

    /// Downsample ratio in use
    pub fn downsample_ratio(&self) -> f32 {
        self.downsample_ratio
    }
}

impl MattingEngine for MattingModel {
    fn infer(&mut self, frame: &VideoFrame) -> Result<MatteOutput, MediaError> {
        MattingModel::infer(self, frame)
    }
}

fn recurrent_tensor(state: &ArrayD<f32>) -> Result<ort::value::Tensor<f32>, MediaError> {
    ort::value::Tensor::from_array(state.clone()).map_err(|e| MediaError::Matting {
        reason: format!("recurrent tensor: {}", e),
    })
}

fn extract_f32(
    outputs: &ort::session::SessionOutputs,
    name: &str,
) -> Result<(Vec<i64>, Vec<f32>), MediaError> {
    let value = outputs.get(name).ok_or_else(|| MediaError::Matting {
        reason: format!("model produced no '{}' output", name),
    })?;
    let (shape, data) = value
        .try_extract_tensor::<f32>()
        .map_err(|e| MediaError::Matting {
            reason: format!("extract '{}': {}", name, e),
        })?;
    Ok((shape.to_vec(), data.to_vec()))
}

fn extract_state(
    outputs: &ort::session::SessionOutputs,
    name: &str,
) -> Result<ArrayD<f32>, MediaError> {
    let (shape, data) = extract_f32(outputs, name)?;
    let dims: Vec<usize> = shape.iter().map(|&d| d.max(0) as usize).collect();
    ArrayD::from_shape_vec(IxDyn(&dims), data).map_err(|e| MediaError::Matting {
        reason: format!("state '{}' shape: {}", name, e),
    })
}

/// RGBA8 frame to normalized NCHW float input (1, 3, H, W)
pub fn preprocess_rgba(frame: &VideoFrame) -> ArrayD<f32> {
    let (w, h) = (frame.width as usize, frame.height as usize);
    let mut src = Array4::<f32>::zeros((1, 3, h, w));
    for y in 0..h {
        for x in 0..w {
            let idx = (y * w + x) * 4;
            src[[0, 0, y, x]] = frame.data[idx] as f32 / 255.0;
            src[[0, 1, y, x]] = frame.data[idx + 1] as f32 / 255.0;
            src[[0, 2, y, x]] = frame.data[idx + 2] as f32 / 255.0;
        }
    }
    src.into_dyn()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preprocess_normalizes_and_transposes() {
        // 1x2 frame: red pixel, then mid-gray
        let frame = VideoFrame::new(
            2,
            1,
            vec![255, 0, 0, 255, 128, 128, 128, 255],
            0,
        )
        .unwrap();
        let src = preprocess_rgba(&frame);

        assert_eq!(src.shape(), &[1, 3, 1, 2]);
        assert!((src[[0, 0, 0, 0]] - 1.0).abs() < f32::EPSILON);
        assert!((src[[0, 1, 0, 0]]).abs() < f32::EPSILON);
        assert!((src[[0, 0, 0, 1]] - 128.0 / 255.0).abs() < f32::EPSILON);
    }
}
