//! Prompt construction for task extraction.
//!
//! The prompt is a pure function of the transcript and the anchor date, so the
//! same utterance on the same day always produces the same request.

use chrono::{Datelike, NaiveDate};

/// Long, locale-independent rendering of the anchor date, e.g.
/// "Thursday, October 23, 2025".
pub fn anchor_long_form(anchor: NaiveDate) -> String {
    anchor.format("%A, %B %-d, %Y").to_string()
}

pub fn build_extraction_prompt(transcript: &str, anchor: NaiveDate) -> String {
    let today = anchor_long_form(anchor);
    let year = anchor.year();

    format!(
        r#"SYSTEM INSTRUCTIONS:
You are a smart Task Manager Assistant. Your goal is to extract structured JSON data from a voice transcript.

---
DATE CONTEXT:
Today is: {today}.

CRITICAL RULES FOR DATES:
1. Use the "Today" date above as the strict anchor for every relative expression ("tomorrow", "next Friday", "in two weeks").
2. "Next <weekday>" means that weekday in the following week.
3. VERIFICATION STEP: If the user mentions a specific day of the week (e.g., "Friday"), the calculated 'due_date' MUST fall exactly on that day of the week in the year {year}.
4. Format the date as 'DD-MM-YYYY'.

---
FIELDS TO EXTRACT:
- title: (String) Concise summary.
- description: (String) Full details or null. If you can extract any specifics, include them here.
- due_date: (String) Format 'DD-MM-YYYY'. Return null if no date is mentioned. If a date is implied but cannot be confidently determined, use today's date.
- priority: (String) "Low"|"Medium"|"High"|"Critical". Look for words like 'urgent', 'critical', 'ASAP'. Default "Medium".
- status: (String) "To Do"|"In Progress"|"Done". Default "To Do".

Output ONLY a single valid JSON object. No prose, no markdown code fences.

---
USER TRANSCRIPT:
"{transcript}"
"#
    )
}
