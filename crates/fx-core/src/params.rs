use serde::Serialize;

/// Slider position used when the user has not moved it.
pub const DEFAULT_STRENGTH: f64 = 0.5;

/// What the user asked for: a prompt, an optional source image and one strength knob.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    /// Source image as a `data:` URI.
    pub source_image: Option<String>,
    pub strength: f64,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            source_image: None,
            strength: DEFAULT_STRENGTH,
        }
    }

    pub fn with_source_image(mut self, data_url: impl Into<String>) -> Self {
        self.source_image = Some(data_url.into());
        self
    }

    pub fn with_strength(mut self, strength: f64) -> Self {
        self.strength = strength;
        self
    }

    /// Neither a prompt nor a source image was supplied.
    pub fn is_empty(&self) -> bool {
        self.prompt.trim().is_empty()
            && self.source_image.as_deref().is_none_or(|image| image.trim().is_empty())
    }
}

/// Full parameter set sent upstream, derived from a single strength value.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GenerationParameters {
    pub go_fast: bool,
    pub guidance: f64,
    pub num_outputs: u32,
    pub aspect_ratio: String,
    pub output_format: String,
    pub output_quality: u32,
    pub prompt_strength: f64,
    pub num_inference_steps: u32,
}

/// Maps the strength control onto generation parameters.
///
/// Pure and total: no validation happens here, callers clamp with
/// [`clamp_strength`] before building a request.
pub fn normalize(strength: f64) -> GenerationParameters {
    GenerationParameters {
        go_fast: true,
        guidance: 3.0 + strength * 2.0,
        num_outputs: 1,
        aspect_ratio: "1:1".to_string(),
        output_format: "webp".to_string(),
        output_quality: 80,
        prompt_strength: 0.6 + strength * 0.4,
        num_inference_steps: (20.0 + strength * 30.0).round() as u32,
    }
}

/// Pulls an arbitrary slider value back into `[0, 1]`. NaN falls back to the default.
pub fn clamp_strength(strength: f64) -> f64 {
    if strength.is_nan() {
        DEFAULT_STRENGTH
    } else {
        strength.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_endpoints() {
        let low = normalize(0.0);
        assert_eq!(low.guidance, 3.0);
        assert_eq!(low.prompt_strength, 0.6);
        assert_eq!(low.num_inference_steps, 20);

        let high = normalize(1.0);
        assert_eq!(high.guidance, 5.0);
        assert!((high.prompt_strength - 1.0).abs() < 1e-12);
        assert_eq!(high.num_inference_steps, 50);
    }

    #[test]
    fn test_normalize_midpoint_rounds_steps() {
        let mid = normalize(0.5);
        assert_eq!(mid.guidance, 4.0);
        assert!((mid.prompt_strength - 0.8).abs() < 1e-12);
        assert_eq!(mid.num_inference_steps, 35);

        // 20 + 0.25 * 30 = 27.5 rounds up
        assert_eq!(normalize(0.25).num_inference_steps, 28);
    }

    #[test]
    fn test_normalize_stays_in_range() {
        for step in 0..=100 {
            let strength = step as f64 / 100.0;
            let params = normalize(strength);
            assert!((3.0..=5.0).contains(&params.guidance), "guidance at {strength}");
            assert!(
                (0.6..=1.0 + 1e-12).contains(&params.prompt_strength),
                "prompt_strength at {strength}"
            );
            assert!((20..=50).contains(&params.num_inference_steps), "steps at {strength}");
        }
    }

    #[test]
    fn test_normalize_is_pure() {
        assert_eq!(normalize(0.37), normalize(0.37));
    }

    #[test]
    fn test_fixed_fields() {
        let params = normalize(0.9);
        assert!(params.go_fast);
        assert_eq!(params.num_outputs, 1);
        assert_eq!(params.aspect_ratio, "1:1");
        assert_eq!(params.output_format, "webp");
        assert_eq!(params.output_quality, 80);
    }

    #[test]
    fn test_clamp_strength() {
        assert_eq!(clamp_strength(-0.5), 0.0);
        assert_eq!(clamp_strength(1.5), 1.0);
        assert_eq!(clamp_strength(0.3), 0.3);
        assert_eq!(clamp_strength(f64::NAN), DEFAULT_STRENGTH);
    }

    #[test]
    fn test_request_emptiness() {
        assert!(GenerationRequest::new("").is_empty());
        assert!(GenerationRequest::new("   ").is_empty());
        assert!(!GenerationRequest::new("a cat").is_empty());
        assert!(!GenerationRequest::new("").with_source_image("data:image/png;base64,AAAA").is_empty());
    }
}
