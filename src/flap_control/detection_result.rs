/// Outcome of one prey-classification call. Errors count as negatives in
/// the batch arithmetic but keep their message for diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub enum DetectionResult {
    Positive { message: String, jpeg: Vec<u8> },
    Negative,
    Error { message: String, jpeg: Option<Vec<u8>> },
}

impl DetectionResult {
    pub fn positive(message: String, jpeg: Vec<u8>) -> Self {
        DetectionResult::Positive { message, jpeg }
    }

    pub fn negative() -> Self {
        DetectionResult::Negative
    }

    pub fn error(message: String, jpeg: Option<Vec<u8>>) -> Self {
        DetectionResult::Error { message, jpeg }
    }

    pub fn is_positive(&self) -> bool {
        matches!(self, DetectionResult::Positive { .. })
    }

    pub fn jpeg(&self) -> Option<&[u8]> {
        match self {
            DetectionResult::Positive { jpeg, .. } => Some(jpeg.as_slice()),
            DetectionResult::Error { jpeg, .. } => jpeg.as_deref(),
            DetectionResult::Negative => None,
        }
    }
}
