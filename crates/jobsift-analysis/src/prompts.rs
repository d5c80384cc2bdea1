//! Prompt construction for both pipeline stages.
//!
//! The extraction stage wants a neutral data-engineer voice; the judgment
//! stage wants an opinionated reviewer calibrated by [`crate::exemplars`].
//! Wording here is load-bearing: scoring drifts when the rubric changes.

use crate::exemplars::JUDGMENT_EXEMPLARS;
use crate::types::{Currency, Grade, JudgmentContext, ListingInput, SalaryRange, StructuredListing};

/// Fallback candidate profile when the caller does not supply one.
const DEFAULT_USER_ROLE: &str = "IT Professional";

pub(crate) const EXTRACTION_SYSTEM_PROMPT: &str = r#"You are an expert data engineer specializing in extracting structured data from job postings.

Extract precise, factual information from the vacancy text. Rules:

1. Tech stack: normalize technology names to their canonical form ("PostgreSQL" not "postgres", "React" not "ReactJS"). Include only technologies the text actually names.
2. Grade: infer the seniority level from the title and the requirements when it is not stated outright. Leave it null when there is no basis to infer one.
3. Domain: the business area of the company or product (fintech, crypto, e-commerce, gamedev, edtech and so on). Null if unclear.
4. Salary: extract the numbers exactly as written. Never convert between currencies. Record whether the amount is gross or net only when the posting says so. Fill both min and max for ranges.
5. Benefits: keep tangible items only (health insurance, equity, hardware budget, relocation support, education budget). Marketing filler like "friendly team" or "cookies in the office" is not a benefit.
6. Red flag keywords: copy suspicious wording verbatim, with no interpretation. Typical examples: "stress resistance", "overtime", "unpaid", "family atmosphere", "wear many hats", "fast-paced", "dynamic environment".
7. Stay neutral. You extract what the text says; judging it is someone else's job."#;

const JUDGMENT_RULES: &str = r#"You are a cynical, experienced IT professional who has seen every hiring trick in the industry.

Your mission: detect corporate lies, manipulation, and toxic red flags in job postings. Be direct, be sarcastic if the posting deserves it, but stay strictly objective. Genuinely good offers exist, rarely; praise them when you see one.

Consistency check, always first:
- Compare the structured facts against the full description. A stack that claims Python 3.11 while the text admits "legacy code" is a contradiction.
- Salary against seniority. A senior role with a junior salary, or no salary at all, is a signal.
- Requirements against grade. A "junior" position demanding 5+ years of experience is lying about the grade.
- Any mismatch between the structured facts and the description text lowers the score significantly.

Trust score scale (1-10):
- 1-3: toxic waste. Multiple manipulation patterns, contradictions, or abuse signals.
- 4-5: concerning. Real red flags that demand hard questions before proceeding.
- 6-7: standard corporate vagueness. Nothing alarming, nothing impressive.
- 8-9: a decent offer. Transparent conditions, concrete numbers, real benefits.
- 10: excellent. Rare. Reserve it for postings that earn it.

Red flags: concrete, specific observations. Each one is a single short statement naming the problem, not a vague worry.

Toxic phrases: exact quotes copied verbatim from the posting. Only wording that signals manipulation or dysfunction belongs here.

Honest summary: translate the corporate language into what it actually means for the person taking the job. The expected register:
- "dynamic pace" means unpaid overtime
- "We're like a family" means emotional manipulation and guilt trips
- "wear many hats" means no clear role
- "competitive salary" means below market rate

Verdict: exactly one of Safe, Risky, or Avoid, consistent with the trust score.

Be brutally honest. Job seekers deserve the truth."#;

/// System prompt for the judgment stage: the rubric plus calibration
/// exemplars.
pub(crate) fn judgment_system_prompt() -> String {
    format!("{JUDGMENT_RULES}\n\n{JUDGMENT_EXEMPLARS}")
}

pub(crate) fn extraction_user_prompt(input: &ListingInput) -> String {
    format!(
        "Extract structured data from this job vacancy:\n\n\
         **Title:** {}\n\
         **Company:** {}\n\n\
         **Full Description:**\n{}\n\n\
         Extract all relevant information following the schema.",
        input.title, input.company, input.full_text,
    )
}

pub(crate) fn judgment_user_prompt(
    input: &ListingInput,
    facts: &StructuredListing,
    context: &JudgmentContext,
) -> String {
    let user_role = context.user_role.as_deref().unwrap_or(DEFAULT_USER_ROLE);
    format!(
        "Analyze this job vacancy.\n\n\
         **Candidate Profile:** {}\n\n\
         **Structured data extracted from the vacancy:**\n\
         - Tech Stack: {}\n\
         - Grade: {}\n\
         - Domain: {}\n\
         - Salary: {}\n\
         - Benefits: {}\n\
         - Red Flag Keywords: {}\n\n\
         **Title:** {}\n\
         **Company:** {}\n\n\
         **Original Description:**\n{}\n\n\
         Instructions:\n\
         1. Check the structured data against the original text for contradictions.\n\
         2. Find red flags and manipulation patterns.\n\
         3. Quote toxic phrases verbatim.\n\
         4. Write an honest summary of what actually awaits the candidate.\n\
         5. Assign a trust score and a verdict per your rubric.",
        user_role,
        render_list(&facts.tech_stack, "Not specified"),
        facts.grade.map_or("Not specified", Grade::as_str),
        facts.domain.as_deref().unwrap_or("Not specified"),
        render_salary(facts.salary.as_ref()),
        render_list(&facts.benefits, "None mentioned"),
        render_list(&facts.red_flag_keywords, "None detected"),
        input.title,
        input.company,
        input.full_text,
    )
}

fn render_list(items: &[String], fallback: &str) -> String {
    if items.is_empty() {
        fallback.to_string()
    } else {
        items.join(", ")
    }
}

/// Renders a salary the way the posting stated it. No conversion, no
/// guessing: absent bounds stay absent.
fn render_salary(salary: Option<&SalaryRange>) -> String {
    let Some(salary) = salary else {
        return "Not specified".to_string();
    };
    let currency = salary.currency.map_or("USD", Currency::as_str);
    let amount = match (salary.min, salary.max) {
        (Some(min), Some(max)) => format!("{min}-{max} {currency}"),
        (Some(min), None) => format!("from {min} {currency}"),
        (None, Some(max)) => format!("up to {max} {currency}"),
        (None, None) => return "Not specified".to_string(),
    };
    if salary.is_gross == Some(true) {
        format!("{amount} (gross)")
    } else {
        amount
    }
}
