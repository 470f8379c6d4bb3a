use crate::{
    image::ImageNormalizer,
    models::{ModelManager, ModelStats},
    scene::{ClassificationResult, Predictor},
    utils::error::ClassifyError,
    Config, Result,
};
use once_cell::sync::OnceCell;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

/// Single-image scene classification: load model, normalize, predict, rank.
///
/// Holds the model manager for the whole process and is shared by reference
/// (typically behind an `Arc`) with every request handler.
pub struct SceneClassifier {
    models: ModelManager,
    // Set once a fatal misconfiguration shows up at predict time.
    fault: OnceCell<ClassifyError>,
}

impl SceneClassifier {
    pub fn new(models: ModelManager) -> Self {
        Self {
            models,
            fault: OnceCell::new(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(ModelManager::from_config(config))
    }

    /// Load the model now instead of on the first request.
    pub fn warm_up(&self) -> Result<()> {
        self.models.get_model().map(|_| ())
    }

    /// Whether requests can be served: the model loaded and no fatal fault
    /// has been recorded since.
    pub fn is_ready(&self) -> bool {
        self.fault.get().is_none() && self.models.is_loaded()
    }

    /// The fatal error that stops this classifier from serving, if any.
    pub fn fatal_error(&self) -> Option<ClassifyError> {
        self.fault.get().cloned().or_else(|| self.models.load_error())
    }

    pub fn model_stats(&self) -> ModelStats {
        self.models.stats()
    }

    pub fn classify(&self, raw_bytes: &[u8]) -> Result<ClassificationResult> {
        if let Some(fault) = self.fault.get() {
            return Err(fault.clone());
        }

        let start = Instant::now();
        let model = self.models.get_model()?;

        // Decoders and native kernels may panic on hostile input.
        let prediction = panic::catch_unwind(AssertUnwindSafe(|| {
            let tensor = ImageNormalizer::normalize(raw_bytes, model.input_size())?;
            Predictor::predict(model.as_ref(), &tensor)
        }))
        .unwrap_or_else(|payload| {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(ClassifyError::UnknownInference(format!("panic during inference: {message}")))
        });

        let prediction = match prediction {
            Ok(prediction) => prediction,
            Err(e) => return Err(self.record(e)),
        };

        let (label, score) = prediction.best();
        let result = ClassificationResult {
            label,
            confidence: score * 100.0,
            ranked: prediction.ranked(),
        };

        tracing::info!(
            "Scene classified: label={}, confidence={}, bytes={}, time={:.3}s",
            result.label,
            result.confidence_display(),
            raw_bytes.len(),
            start.elapsed().as_secs_f32()
        );

        Ok(result)
    }

    fn record(&self, error: ClassifyError) -> ClassifyError {
        match &error {
            e if e.is_fatal() => {
                tracing::error!("Refusing further requests: {}", error);
                let _ = self.fault.set(error.clone());
            }
            ClassifyError::UnknownInference(detail) => {
                tracing::error!("Inference fault: {}", detail);
            }
            other => tracing::debug!("Classification rejected: {}", other),
        }
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::testing::{
        ColorModel, CountingLoader, FailingLoader, FixedModel, PanickingModel, StaticLoader,
    };
    use crate::models::{LoaderChain, SceneModel};
    use crate::scene::ClassLabel;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use std::collections::HashSet;
    use std::io::Cursor;
    use std::sync::atomic::Ordering;
    use std::sync::{Arc, Barrier};

    fn classifier_with(model: impl SceneModel + 'static) -> SceneClassifier {
        let chain = LoaderChain::new().with_loader(StaticLoader(Arc::new(model)));
        SceneClassifier::new(ModelManager::new("scene.onnx", chain))
    }

    fn encode(image: RgbImage, format: ImageFormat) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(image)
            .write_to(&mut buffer, format)
            .unwrap();
        buffer.into_inner()
    }

    /// Gray-brown rock face under a pale strip of sky.
    fn mountain_fixture() -> Vec<u8> {
        let image = RgbImage::from_fn(320, 240, |x, y| {
            if y < 30 {
                Rgb([150, 150, 155])
            } else {
                let shade = ((x * 7 + y * 3) % 40) as u8;
                Rgb([95 + shade, 88 + shade, 84 + shade])
            }
        });
        encode(image, ImageFormat::Jpeg)
    }

    #[test]
    fn classifies_mountain_fixture() {
        let classifier = classifier_with(ColorModel);
        let result = classifier.classify(&mountain_fixture()).unwrap();

        assert_eq!(result.label, ClassLabel::Mountain);
        assert_eq!(result.ranked.len(), 6);
        assert_eq!(result.ranked[0].label, ClassLabel::Mountain);
        assert_eq!(result.ranked[0].confidence, result.confidence);
        assert!(result
            .ranked
            .windows(2)
            .all(|w| w[0].confidence >= w[1].confidence));

        let labels: HashSet<_> = result.ranked.iter().map(|r| r.label).collect();
        assert_eq!(labels, ClassLabel::ALL.into_iter().collect());
    }

    #[test]
    fn other_scenes() {
        let classifier = classifier_with(ColorModel);

        let sea = encode(RgbImage::from_pixel(64, 64, Rgb([20, 60, 200])), ImageFormat::Png);
        assert_eq!(classifier.classify(&sea).unwrap().label, ClassLabel::Sea);

        let forest = encode(RgbImage::from_pixel(64, 64, Rgb([20, 160, 30])), ImageFormat::Bmp);
        assert_eq!(classifier.classify(&forest).unwrap().label, ClassLabel::Forest);

        let glacier = encode(RgbImage::from_pixel(64, 64, Rgb([240, 245, 250])), ImageFormat::Png);
        assert_eq!(classifier.classify(&glacier).unwrap().label, ClassLabel::Glacier);
    }

    #[test]
    fn text_file_is_unsupported_image() {
        let classifier = classifier_with(ColorModel);
        let err = classifier
            .classify(b"name,confidence\nmountain,0.9\n")
            .unwrap_err();
        assert!(matches!(err, ClassifyError::UnsupportedImage(_)));
        // A bad upload never takes the service down.
        assert!(classifier.is_ready());
        assert!(classifier.classify(&mountain_fixture()).is_ok());
    }

    #[test]
    fn idempotent() {
        let classifier = classifier_with(ColorModel);
        let bytes = mountain_fixture();
        let first = classifier.classify(&bytes).unwrap();
        let second = classifier.classify(&bytes).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn confidence_is_percentage_of_best() {
        let classifier = classifier_with(FixedModel::new(vec![0.1, 0.05, 0.05, 0.05, 0.5, 0.25]));
        let bytes = encode(RgbImage::new(10, 10), ImageFormat::Png);
        let result = classifier.classify(&bytes).unwrap();
        assert_eq!(result.label, ClassLabel::Sea);
        assert!((result.confidence - 50.0).abs() < 1e-4);
        assert_eq!(result.confidence_display(), "50.0%");
        assert_eq!(result.top(3)[2].label, ClassLabel::Buildings);
    }

    #[test]
    fn label_mismatch_latches() {
        let classifier = classifier_with(FixedModel::new(vec![0.1; 5]));
        let bytes = encode(RgbImage::new(10, 10), ImageFormat::Png);

        let err = classifier.classify(&bytes).unwrap_err();
        assert_eq!(
            err,
            ClassifyError::LabelMismatch {
                expected: 6,
                actual: 5
            }
        );
        assert!(!classifier.is_ready());
        assert_eq!(classifier.fatal_error(), Some(err.clone()));

        // Even input that would otherwise be rejected gets the fatal error.
        assert_eq!(classifier.classify(b"junk").unwrap_err(), err);
    }

    #[test]
    fn model_load_failure_short_circuits() {
        let (loader, calls) = CountingLoader::new(FailingLoader::new("onnx-strict", "corrupt"));
        let classifier = SceneClassifier::new(ModelManager::new(
            "scene.onnx",
            LoaderChain::new().with_loader(loader),
        ));

        assert!(matches!(classifier.warm_up(), Err(ClassifyError::ModelLoad(_))));
        for _ in 0..3 {
            assert!(matches!(
                classifier.classify(b"anything"),
                Err(ClassifyError::ModelLoad(_))
            ));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!classifier.is_ready());
        assert!(matches!(
            classifier.fatal_error(),
            Some(ClassifyError::ModelLoad(_))
        ));
    }

    #[test]
    fn panics_become_unknown_inference() {
        let classifier = classifier_with(PanickingModel);
        let bytes = encode(RgbImage::new(10, 10), ImageFormat::Png);
        let err = classifier.classify(&bytes).unwrap_err();
        match err {
            ClassifyError::UnknownInference(msg) => assert!(msg.contains("native kernel fault")),
            other => panic!("unexpected error: {other:?}"),
        }
        // Per-request fault: the classifier keeps serving.
        assert!(classifier.is_ready());
    }

    #[test]
    fn concurrent_first_requests_load_once() {
        let (loader, calls) = CountingLoader::new(StaticLoader(Arc::new(ColorModel)));
        let classifier = Arc::new(SceneClassifier::new(ModelManager::new(
            "scene.onnx",
            LoaderChain::new().with_loader(loader),
        )));
        let bytes = Arc::new(mountain_fixture());

        let threads = 12;
        let barrier = Arc::new(Barrier::new(threads));
        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let classifier = Arc::clone(&classifier);
                let barrier = Arc::clone(&barrier);
                let bytes = Arc::clone(&bytes);
                std::thread::spawn(move || {
                    barrier.wait();
                    classifier.classify(&bytes)
                })
            })
            .collect();

        let results: Vec<_> = handles
            .into_iter()
            .map(|h| h.join().unwrap().unwrap())
            .collect();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(results.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(results[0].label, ClassLabel::Mountain);
    }
}
