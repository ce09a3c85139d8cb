/// Similarity classification
///
/// - above 60%        → PLAGIARIZED
/// - 30% to 60%       → SUSPICIOUS (both bounds inclusive)
/// - below 30%        → SAFE
///
/// Inputs are clamped to [0, 100] first so floating-point noise from the
/// ratio conversion cannot push a value out of range. NaN counts as 0.

use plagiarism_common::types::SimilarityStatus;

pub const PLAGIARIZED_ABOVE: f64 = 60.0;
pub const SUSPICIOUS_FROM: f64 = 30.0;

pub fn classify(similarity_percent: f64) -> SimilarityStatus {
    let percent = if similarity_percent.is_nan() {
        0.0
    } else {
        similarity_percent.clamp(0.0, 100.0)
    };

    if percent > PLAGIARIZED_ABOVE {
        SimilarityStatus::Plagiarized
    } else if percent >= SUSPICIOUS_FROM {
        SimilarityStatus::Suspicious
    } else {
        SimilarityStatus::Safe
    }
}

/// Convert an analyzer ratio in [0, 1] to a percentage
pub fn ratio_to_percent(ratio: f64) -> f64 {
    ratio * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundaries() {
        assert_eq!(classify(29.999), SimilarityStatus::Safe);
        assert_eq!(classify(30.0), SimilarityStatus::Suspicious);
        assert_eq!(classify(60.0), SimilarityStatus::Suspicious);
        assert_eq!(classify(60.001), SimilarityStatus::Plagiarized);
    }

    #[test]
    fn test_extremes_and_noise() {
        assert_eq!(classify(0.0), SimilarityStatus::Safe);
        assert_eq!(classify(100.0), SimilarityStatus::Plagiarized);
        assert_eq!(classify(-0.0000001), SimilarityStatus::Safe);
        assert_eq!(classify(100.0000001), SimilarityStatus::Plagiarized);
        assert_eq!(classify(f64::NAN), SimilarityStatus::Safe);
    }

    #[test]
    fn test_monotonic() {
        let mut previous = classify(0.0);
        for step in 0..=100_000 {
            let status = classify(step as f64 / 1000.0);
            assert!(status >= previous, "classification dropped at {}", step as f64 / 1000.0);
            previous = status;
        }
    }

    #[test]
    fn test_ratio_to_percent() {
        assert_eq!(classify(ratio_to_percent(0.75)), SimilarityStatus::Plagiarized);
        assert_eq!(classify(ratio_to_percent(0.45)), SimilarityStatus::Suspicious);
        assert_eq!(classify(ratio_to_percent(0.12)), SimilarityStatus::Safe);
    }
}
