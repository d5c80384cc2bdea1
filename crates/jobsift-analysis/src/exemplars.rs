//! Few-shot exemplars for the judgment stage.
//!
//! These anchor the scoring rubric: each shows an input pattern seen in real
//! postings and the analysis style expected for it. Scores here are the
//! calibration points the model is asked to stay consistent with.

pub(crate) const JUDGMENT_EXEMPLARS: &str = r#"<examples>

Example 1: The legacy trap
Input snippet: "Main stack: Python 3.11. Tasks: maintenance of the existing code base written in Twisted and Python 2.7."
Analysis:
  - Trust score: 3
  - Red flag: "Technical contradiction (bait and switch): title says Python 3.11, reality is Python 2.7 legacy."
  - Honest summary: "You will maintain dead code while dreaming of modern features. The 'Python 3.11' in the title is bait."
  - Verdict: Avoid - major contradiction between advertised and actual tech stack.

Example 2: The burnout factory
Input snippet: "We are a rocket-ship startup! Looking for rockstars willing to wear many hats and work in a fast-paced dynamic environment. Pizza on Fridays!"
Analysis:
  - Trust score: 2
  - Red flag: "Classic burnout signals ('rockstar', 'many hats', 'fast-paced')."
  - Red flag: "Pizza used as a benefit substitute instead of real compensation."
  - Red flag: "No clear role definition: 'wear many hats' means chaos."
  - Toxic phrases: ["rockstars willing to wear many hats", "fast-paced dynamic environment"]
  - Honest summary: "Chaos, unpaid overtime, and no defined role. You are cheap labor. 'Pizza on Fridays' offered instead of proper benefits."
  - Verdict: Avoid - multiple red flags indicating toxic startup culture.

Example 3: The transparent offer (rare but exists)
Input snippet: "Stack: FastAPI, SQLAlchemy, PostgreSQL, AWS. Salary: $4000-5000 net. Sick leaves: 20 days paid. Overtime: paid x2 (rarely happens, we respect work-life balance). Health insurance included."
Analysis:
  - Trust score: 9
  - Honest summary: "A transparent offer with clear rules, market salary, and real benefits. They explicitly mention work-life balance and compensate overtime properly."
  - Verdict: Safe - apply confidently. Rare example of an honest vacancy.

Example 4: The vague buzzwords
Input snippet: "Responsibilities: develop innovative solutions. Work with cutting-edge technologies. Collaborate with team. Deliver results."
Analysis:
  - Trust score: 4
  - Red flag: "Zero concrete responsibilities: all buzzwords."
  - Red flag: "No mention of actual tech stack or projects."
  - Honest summary: "They have no idea what they want. You'll be thrown into random tasks with no direction."
  - Verdict: Risky - ask very specific questions about actual day-to-day work.

Example 5: The hidden salary
Input snippet: "Competitive salary based on experience. Senior Python Developer position."
Analysis:
  - Trust score: 5
  - Red flag: "'Competitive salary' without numbers usually means below market rate."
  - Red flag: "For a senior position the salary should be stated upfront."
  - Honest summary: "They're hiding the salary because it's low. 'Based on experience' means they'll lowball you."
  - Verdict: Risky - demand exact numbers before spending time on interviews.

Example 6: The family pressure
Input snippet: "We're like a family here! Everyone helps each other. Sometimes we work late together, but it's fun!"
Analysis:
  - Trust score: 3
  - Red flag: "'Family' rhetoric: emotional manipulation and guilt trips."
  - Red flag: "'Work late together' normalizes unpaid overtime."
  - Toxic phrases: ["We're like a family", "Sometimes we work late together, but it's fun"]
  - Honest summary: "They'll guilt you into unpaid overtime using 'family' rhetoric. Boundaries don't exist here."
  - Verdict: Avoid - classic toxic-culture red flag.

</examples>"#;
