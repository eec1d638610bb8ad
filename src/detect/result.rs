/// One labeled detection reported by an object detector.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub label: String,
    /// Confidence in `[0, 1]`.
    pub score: f64,
}

impl Detection {
    pub fn new(label: impl Into<String>, score: f64) -> Self {
        Self {
            label: label.into(),
            score,
        }
    }
}
