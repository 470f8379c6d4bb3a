use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Scene categories in model output order.
///
/// The discriminants are the output indices the model was trained with.
/// Reordering the variants silently breaks every prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassLabel {
    Buildings = 0,
    Forest = 1,
    Glacier = 2,
    Mountain = 3,
    Sea = 4,
    Street = 5,
}

impl ClassLabel {
    pub const ALL: [ClassLabel; 6] = [
        ClassLabel::Buildings,
        ClassLabel::Forest,
        ClassLabel::Glacier,
        ClassLabel::Mountain,
        ClassLabel::Sea,
        ClassLabel::Street,
    ];

    pub const COUNT: usize = Self::ALL.len();

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            ClassLabel::Buildings => "buildings",
            ClassLabel::Forest => "forest",
            ClassLabel::Glacier => "glacier",
            ClassLabel::Mountain => "mountain",
            ClassLabel::Sea => "sea",
            ClassLabel::Street => "street",
        }
    }
}

impl fmt::Display for ClassLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ClassLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|label| label.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown scene class '{s}'"))
    }
}

/// One class paired with its confidence as a percentage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankedPrediction {
    #[serde(rename = "class")]
    pub label: ClassLabel,
    pub confidence: f32,
}

/// Result of classifying a single image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    /// Best scoring class
    pub label: ClassLabel,
    /// Best score times 100
    pub confidence: f32,
    /// Every class, highest confidence first
    pub ranked: Vec<RankedPrediction>,
}

impl ClassificationResult {
    /// Confidence rendered with one decimal, e.g. `87.3%`.
    pub fn confidence_display(&self) -> String {
        format!("{:.1}%", self.confidence)
    }

    /// The `k` highest ranked classes, for display.
    pub fn top(&self, k: usize) -> &[RankedPrediction] {
        &self.ranked[..k.min(self.ranked.len())]
    }
}
