//! Domain types for the two-stage posting analysis.
//!
//! [`StructuredListing`] and [`Judgment`] double as the strict output
//! schemas sent to the provider: field doc comments become schema
//! descriptions the model sees.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::LlmError;

/// Verdict written by a technical-failure analysis instead of a real one.
pub const FAILED_VERDICT: &str = "Analysis Failed";

/// Seniority grade inferred from the posting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Grade {
    Intern,
    Junior,
    Middle,
    Senior,
    Lead,
    Principal,
}

impl Grade {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Grade::Intern => "intern",
            Grade::Junior => "junior",
            Grade::Middle => "middle",
            Grade::Senior => "senior",
            Grade::Lead => "lead",
            Grade::Principal => "principal",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum WorkFormat {
    Office,
    Remote,
    Hybrid,
    /// Field work or rotating locations.
    Roaming,
}

impl WorkFormat {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            WorkFormat::Office => "office",
            WorkFormat::Remote => "remote",
            WorkFormat::Hybrid => "hybrid",
            WorkFormat::Roaming => "roaming",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum EmploymentType {
    FullTime,
    PartTime,
    Contract,
    Internship,
    Temporary,
}

impl EmploymentType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            EmploymentType::FullTime => "full_time",
            EmploymentType::PartTime => "part_time",
            EmploymentType::Contract => "contract",
            EmploymentType::Internship => "internship",
            EmploymentType::Temporary => "temporary",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum Currency {
    USD,
    EUR,
    UAH,
    PLN,
    GBP,
}

impl Currency {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Currency::USD => "USD",
            Currency::EUR => "EUR",
            Currency::UAH => "UAH",
            Currency::PLN => "PLN",
            Currency::GBP => "GBP",
        }
    }
}

/// Salary exactly as stated in the posting, never inferred.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SalaryRange {
    /// Lower bound per month, if stated.
    pub min: Option<i64>,
    /// Upper bound per month, if stated.
    pub max: Option<i64>,
    pub currency: Option<Currency>,
    /// True for gross, false for net, null when the posting does not say.
    pub is_gross: Option<bool>,
}

/// Stage-1 output: structured facts pulled from the posting text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StructuredListing {
    /// Technologies under their canonical names, e.g. "PostgreSQL" not
    /// "Postgres".
    pub tech_stack: Vec<String>,
    /// Null when the posting gives no basis for a grade.
    pub grade: Option<Grade>,
    pub work_format: Option<WorkFormat>,
    pub employment_type: Option<EmploymentType>,
    /// Minimum years of experience required, if stated. Postings phrase this
    /// as "1.5 years" often enough that the value is fractional.
    pub experience_min_years: Option<f64>,
    pub location_city: Option<String>,
    /// Street address when the posting names one.
    pub location_address: Option<String>,
    /// Business domain, e.g. "fintech", "e-commerce".
    pub domain: Option<String>,
    pub salary: Option<SalaryRange>,
    /// Tangible benefits only; marketing filler is not a benefit.
    pub benefits: Vec<String>,
    /// Suspicious wording, listed verbatim without interpretation.
    pub red_flag_keywords: Vec<String>,
}

/// Categorical trust verdict for a posting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum Verdict {
    Safe,
    Risky,
    Avoid,
}

impl Verdict {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Verdict::Safe => "Safe",
            Verdict::Risky => "Risky",
            Verdict::Avoid => "Avoid",
        }
    }
}

/// Stage-2 output: the judgment over the posting and its extracted facts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Judgment {
    /// Trust score from 1 (toxic) to 10 (excellent). Zero is reserved for
    /// technical failures and must never be produced here.
    pub trust_score: i64,
    /// Concrete problems found, one short phrase each.
    pub red_flags: Vec<String>,
    /// Manipulative wording quoted verbatim from the posting.
    pub toxic_phrases: Vec<String>,
    /// What this posting actually says, restated without the marketing.
    pub honest_summary: String,
    pub verdict: Verdict,
}

/// Token counts reported by one or more provider calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
}

impl TokenUsage {
    #[must_use]
    pub const fn total(self) -> i64 {
        self.prompt_tokens + self.completion_tokens
    }
}

impl std::ops::AddAssign for TokenUsage {
    fn add_assign(&mut self, rhs: Self) {
        self.prompt_tokens += rhs.prompt_tokens;
        self.completion_tokens += rhs.completion_tokens;
    }
}

/// The posting text handed to both stages.
#[derive(Debug, Clone)]
pub struct ListingInput {
    pub title: String,
    pub company: String,
    pub full_text: String,
}

/// Caller-supplied context for the judgment stage.
#[derive(Debug, Clone, Default)]
pub struct JudgmentContext {
    /// Role of the person the judgment is for, e.g. "backend developer,
    /// 5 years of experience". Changes what counts as a red flag.
    pub user_role: Option<String>,
}

/// The result of one full pipeline run. Always constructed, never raised:
/// failures become a storable outcome with [`FAILED_VERDICT`].
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    /// Freshly extracted facts, present only when stage 1 ran this pass.
    /// A run that reused prior attributes leaves this `None`.
    pub structured: Option<StructuredListing>,
    pub trust_score: i16,
    pub verdict: String,
    pub red_flags: Vec<String>,
    pub toxic_phrases: Vec<String>,
    pub honest_summary: String,
    pub provider: String,
    pub model: String,
    pub usage: TokenUsage,
    pub error_message: Option<String>,
}

impl AnalysisOutcome {
    pub(crate) fn from_judgment(
        judgment: Judgment,
        structured: Option<StructuredListing>,
        provider: String,
        model: String,
        usage: TokenUsage,
    ) -> Self {
        Self {
            structured,
            trust_score: i16::try_from(judgment.trust_score).unwrap_or(0),
            verdict: judgment.verdict.as_str().to_string(),
            red_flags: judgment.red_flags,
            toxic_phrases: judgment.toxic_phrases,
            honest_summary: judgment.honest_summary,
            provider,
            model,
            usage,
            error_message: None,
        }
    }

    pub(crate) fn failed(
        error: &LlmError,
        structured: Option<StructuredListing>,
        provider: String,
        model: String,
        usage: TokenUsage,
    ) -> Self {
        Self {
            structured,
            trust_score: 0,
            verdict: FAILED_VERDICT.to_string(),
            red_flags: Vec::new(),
            toxic_phrases: Vec::new(),
            honest_summary: String::new(),
            provider,
            model,
            usage,
            error_message: Some(error.to_string()),
        }
    }
}
