#![allow(dead_code)]

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum DeviceType {
    #[default]
    Desktop,
    Mobile,
    Tablet,
}

impl DeviceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Desktop => "desktop",
            Self::Mobile => "mobile",
            Self::Tablet => "tablet",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "mobile" => Self::Mobile,
            "tablet" => Self::Tablet,
            _ => Self::Desktop,
        }
    }

    /// Interface friction relative to a desktop baseline.
    pub fn friction(&self) -> f64 {
        match self {
            Self::Desktop => 0.0,
            Self::Tablet => 0.08,
            Self::Mobile => 0.15,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum NetworkQuality {
    #[default]
    Good,
    Degraded,
    Poor,
}

impl NetworkQuality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Good => "good",
            Self::Degraded => "degraded",
            Self::Poor => "poor",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "degraded" => Self::Degraded,
            "poor" => Self::Poor,
            _ => Self::Good,
        }
    }

    pub fn friction(&self) -> f64 {
        match self {
            Self::Good => 0.0,
            Self::Degraded => 0.05,
            Self::Poor => 0.12,
        }
    }
}

/// Per-concept BKT parameters, owned by the parameter store.
/// The live update path only ever reads these.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConceptParameters {
    pub concept_id: String,
    pub learn_rate: f64,
    pub slip_rate: f64,
    pub guess_rate: f64,
    pub forgetting_rate: f64,
}

impl ConceptParameters {
    pub fn with_defaults(concept_id: impl Into<String>) -> Self {
        Self {
            concept_id: concept_id.into(),
            learn_rate: 0.2,
            slip_rate: 0.1,
            guess_rate: 0.2,
            forgetting_rate: 0.02,
        }
    }
}

/// Mastery estimate for one (student, concept) pair. Unique per pair,
/// mutated exactly once per observed response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeState {
    pub student_id: String,
    pub concept_id: String,
    pub mastery_probability: f64,
    pub practice_count: i32,
    pub last_practiced: i64,
    pub consecutive_incorrect: i32,
}

impl KnowledgeState {
    pub fn new(
        student_id: impl Into<String>,
        concept_id: impl Into<String>,
        prior: f64,
        now_ms: i64,
    ) -> Self {
        Self {
            student_id: student_id.into(),
            concept_id: concept_id.into(),
            mastery_probability: prior.clamp(0.0, 1.0),
            practice_count: 0,
            last_practiced: now_ms,
            consecutive_incorrect: 0,
        }
    }
}

/// Behavioral signals observed while the student answered. Threaded through
/// calls explicitly; the engine keeps no hidden session state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BehavioralSignals {
    pub response_time_ms: i64,
    pub expected_time_ms: i64,
    pub hesitation_ms: i64,
    pub keystroke_variance: f64,
    pub device: DeviceType,
    pub network: NetworkQuality,
    pub session_minutes: f64,
    pub complexity: f64,
}

impl Default for BehavioralSignals {
    fn default() -> Self {
        Self {
            response_time_ms: 30_000,
            expected_time_ms: 45_000,
            hesitation_ms: 0,
            keystroke_variance: 0.0,
            device: DeviceType::Desktop,
            network: NetworkQuality::Good,
            session_minutes: 0.0,
            complexity: 0.5,
        }
    }
}

/// Output of the load/stress estimator. All scalars bounded to [0,1].
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct LoadProfile {
    pub stress: f64,
    pub intrinsic_load: f64,
    pub extraneous_load: f64,
    pub total_load: f64,
    pub fatigue: f64,
    pub overload_risk: bool,
}

/// One observed answer, recorded append-only after processing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionEvent {
    pub id: String,
    pub student_id: String,
    pub concept_ids: Vec<String>,
    pub is_correct: bool,
    pub response_time_ms: i64,
    pub exam_code: String,
    pub subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    pub device: DeviceType,
    pub network: NetworkQuality,
    pub stress: f64,
    pub total_load: f64,
    /// Logit of the pre-update predicted probability of a correct response.
    pub predicted_logit: f64,
    pub timestamp: i64,
}

/// Request payload for the one-interaction pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionRequest {
    pub student_id: String,
    pub concept_ids: Vec<String>,
    pub is_correct: bool,
    pub exam_code: String,
    pub subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    pub signals: BehavioralSignals,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_question: Option<QuestionProfile>,
}

/// Static description of a question used for time budgeting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionProfile {
    pub question_id: String,
    pub concept_id: String,
    pub difficulty: f64,
    pub base_time_ms: i64,
}

impl Default for QuestionProfile {
    fn default() -> Self {
        Self {
            question_id: String::new(),
            concept_id: String::new(),
            difficulty: 0.5,
            base_time_ms: 60_000,
        }
    }
}

/// Mastery shift applied to a related concept via the transfer graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferEffect {
    pub concept_id: String,
    pub previous_mastery: f64,
    pub new_mastery: f64,
    pub edge_weight: f64,
}

/// Result of one mastery update, including any one-hop transfer effects.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MasteryUpdate {
    pub student_id: String,
    pub concept_id: String,
    pub previous_mastery: f64,
    pub new_mastery: f64,
    pub practice_count: i32,
    pub recovery: bool,
    pub effective_slip: f64,
    pub effective_guess: f64,
    /// Probability of a correct answer the model held before seeing the
    /// outcome; logged with the observed label for calibration fitting.
    pub predicted_correct: f64,
    pub transfers: Vec<TransferEffect>,
}

/// One step of the time-allocation computation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeFactor {
    pub name: String,
    pub value: f64,
    pub delta_ms: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeAllocation {
    pub final_time_ms: i64,
    pub capped: bool,
    pub breakdown: Vec<TimeFactor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupOutcome {
    pub group: String,
    pub average: f64,
    pub samples: u64,
    /// Whether the group met the minimum sample count and entered the
    /// disparity computation.
    pub included: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FairnessReport {
    pub exam_code: String,
    pub subject: String,
    pub groups: Vec<GroupOutcome>,
    pub disparity: f64,
    pub flagged: bool,
}

/// Everything produced by one pass through the interaction pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionOutcome {
    pub event_id: String,
    pub load: LoadProfile,
    pub updates: Vec<MasteryUpdate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_allocation: Option<TimeAllocation>,
}

pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
