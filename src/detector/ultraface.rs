use crate::config::ModelConfig;
use crate::detector::{DetectorError, FaceBox, FaceDetector};
use image::{imageops::FilterType, DynamicImage, GenericImageView};
use ndarray::{Array, Ix4};
use ort::{
    session::{builder::GraphOptimizationLevel, Session},
    value::TensorRef,
};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Mutex,
};

// UltraFace version-RFB-320 input geometry.
const INPUT_WIDTH: u32 = 320;
const INPUT_HEIGHT: u32 = 240;
const NMS_IOU_THRESHOLD: f32 = 0.3;

/// Face detector backed by the UltraFace ONNX model.
///
/// Holds a pool of ONNX Runtime sessions handed out round-robin, so
/// concurrent requests do not serialize on a single session.
pub struct UltraFaceDetector {
    sessions: Vec<Mutex<Session>>,
    counter: AtomicUsize,
    min_confidence: f32,
}

impl UltraFaceDetector {
    pub fn new(model_config: &ModelConfig) -> Result<Self, DetectorError> {
        ort::init().commit()?;

        let num_instances = model_config.num_instances.max(1);
        let sessions = (0..num_instances)
            .map(|_| {
                let session = Session::builder()?
                    .with_optimization_level(GraphOptimizationLevel::Level3)?
                    .commit_from_file(model_config.get_model_path())?;
                Ok(Mutex::new(session))
            })
            .collect::<Result<Vec<_>, ort::Error>>()?;

        tracing::info!("Created {} ONNX sessions", num_instances);

        Ok(Self {
            sessions,
            counter: AtomicUsize::new(0),
            min_confidence: model_config.min_confidence,
        })
    }
}

impl FaceDetector for UltraFaceDetector {
    fn detect(&self, image: &DynamicImage) -> Result<Vec<FaceBox>, DetectorError> {
        let (img_width, img_height) = image.dimensions();
        let input = preprocess(image);

        let index = self.counter.fetch_add(1, Ordering::SeqCst) % self.sessions.len();
        let mut session = self.sessions[index]
            .lock()
            .map_err(|e| DetectorError::SessionPoisoned(e.to_string()))?;

        tracing::debug!("Handling detection with session {}", index);
        let tensor_ref = TensorRef::from_array_view(input.view())?;
        let outputs = session.run(ort::inputs!["input" => tensor_ref])?;

        let (scores_shape, scores) = outputs
            .get("scores")
            .ok_or_else(|| DetectorError::OutputShape("missing scores output".into()))?
            .try_extract_tensor::<f32>()?;
        let (_boxes_shape, boxes) = outputs
            .get("boxes")
            .ok_or_else(|| DetectorError::OutputShape("missing boxes output".into()))?
            .try_extract_tensor::<f32>()?;

        // scores is [1, num_anchors, 2] (background, face),
        // boxes is [1, num_anchors, 4] (normalized corners).
        let num_anchors = scores_shape[1] as usize;
        if scores.len() < num_anchors * 2 || boxes.len() < num_anchors * 4 {
            return Err(DetectorError::OutputShape(format!(
                "{} scores and {} boxes for {} anchors",
                scores.len(),
                boxes.len(),
                num_anchors
            )));
        }

        let mut candidates = Vec::new();
        for i in 0..num_anchors {
            let confidence = scores[i * 2 + 1];
            if confidence < self.min_confidence {
                continue;
            }

            candidates.push(FaceBox {
                x1: (boxes[i * 4] * img_width as f32).max(0.0),
                y1: (boxes[i * 4 + 1] * img_height as f32).max(0.0),
                x2: (boxes[i * 4 + 2] * img_width as f32).min(img_width as f32),
                y2: (boxes[i * 4 + 3] * img_height as f32).min(img_height as f32),
                confidence,
            });
        }

        Ok(non_max_suppression(candidates, NMS_IOU_THRESHOLD))
    }
}

/// Resize to the model input and pack as NCHW normalized to roughly [-1, 1].
fn preprocess(image: &DynamicImage) -> Array<f32, Ix4> {
    let resized = image.resize_exact(INPUT_WIDTH, INPUT_HEIGHT, FilterType::Triangle);

    let mut input = Array::zeros((1, 3, INPUT_HEIGHT as usize, INPUT_WIDTH as usize));
    for pixel in resized.pixels() {
        let x = pixel.0 as usize;
        let y = pixel.1 as usize;
        let [r, g, b, _] = pixel.2 .0;
        input[[0, 0, y, x]] = (r as f32 - 127.0) / 128.0;
        input[[0, 1, y, x]] = (g as f32 - 127.0) / 128.0;
        input[[0, 2, y, x]] = (b as f32 - 127.0) / 128.0;
    }

    input
}

fn non_max_suppression(mut candidates: Vec<FaceBox>, iou_threshold: f32) -> Vec<FaceBox> {
    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut kept = Vec::new();
    while let Some(best) = candidates.first().copied() {
        kept.push(best);
        candidates.retain(|other| iou(&best, other) < iou_threshold);
    }

    kept
}

fn iou(a: &FaceBox, b: &FaceBox) -> f32 {
    let x1 = a.x1.max(b.x1);
    let y1 = a.y1.max(b.y1);
    let x2 = a.x2.min(b.x2);
    let y2 = a.y2.min(b.y2);

    let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let area_a = (a.x2 - a.x1) * (a.y2 - a.y1);
    let area_b = (b.x2 - b.x1) * (b.y2 - b.y1);
    let union = area_a + area_b - intersection;

    if union > 0.0 {
        intersection / union
    } else {
        0.0
    }
}
