//! Due-date value type and the date-resolution policy applied to model output.
//!
//! The model is asked to resolve relative expressions itself, but its answer is
//! never trusted blindly: a weekday named in the transcript is re-checked against
//! the produced calendar date and repaired when they disagree.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use thiserror::Error;
use tracing::{debug, warn};

/// Canonical wire format for due dates.
pub const DUE_DATE_FORMAT: &str = "%d-%m-%Y";

/// Alternative spellings models occasionally produce despite instructions.
const LENIENT_FORMATS: [&str; 3] = [DUE_DATE_FORMAT, "%Y-%m-%d", "%d/%m/%Y"];

#[derive(Debug, Clone, Error)]
#[error("Invalid due date: \"{input}\". Expected format: DD-MM-YYYY (e.g., 31-10-2025)")]
pub struct DueDateParseError {
    pub input: String,
}

/// A calendar date rendered as `DD-MM-YYYY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DueDate(NaiveDate);

impl DueDate {
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    pub fn weekday(&self) -> Weekday {
        self.0.weekday()
    }

    /// Strict parse of the canonical `DD-MM-YYYY` form.
    pub fn parse(input: &str) -> Result<Self, DueDateParseError> {
        NaiveDate::parse_from_str(input.trim(), DUE_DATE_FORMAT)
            .map(Self)
            .map_err(|_| DueDateParseError {
                input: input.to_string(),
            })
    }

    /// Parse any of the accepted spellings.
    pub fn parse_lenient(input: &str) -> Option<Self> {
        let trimmed = input.trim();
        LENIENT_FORMATS
            .iter()
            .find_map(|format| NaiveDate::parse_from_str(trimmed, format).ok())
            .map(Self)
    }
}

impl fmt::Display for DueDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(DUE_DATE_FORMAT))
    }
}

impl FromStr for DueDate {
    type Err = DueDateParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<NaiveDate> for DueDate {
    fn from(date: NaiveDate) -> Self {
        Self(date)
    }
}

impl Serialize for DueDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DueDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// A weekday the speaker named explicitly ("Friday", "next Friday").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamedWeekday {
    pub weekday: Weekday,
    /// Whether the speaker said "next <day>".
    pub next: bool,
}

fn weekday_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?i)\b(next\s+)?(monday|tuesday|wednesday|thursday|friday|saturday|sunday)s?\b",
        )
        .expect("weekday pattern is valid")
    })
}

/// Finds the single weekday named in a transcript.
///
/// Returns `None` when no weekday is named or when several different weekdays are,
/// since the intended one cannot be told apart.
pub fn named_weekday(transcript: &str) -> Option<NamedWeekday> {
    let mut found: Option<NamedWeekday> = None;

    for captures in weekday_pattern().captures_iter(transcript) {
        let weekday = captures
            .get(2)
            .and_then(|m| m.as_str().to_ascii_lowercase().parse::<Weekday>().ok())?;
        let next = captures.get(1).is_some();

        match found {
            None => found = Some(NamedWeekday { weekday, next }),
            Some(existing) if existing.weekday == weekday => {
                found = Some(NamedWeekday {
                    weekday,
                    next: existing.next || next,
                });
            }
            Some(_) => return None,
        }
    }

    found
}

fn days_until(from: Weekday, to: Weekday) -> i64 {
    (to.num_days_from_monday() as i64 - from.num_days_from_monday() as i64).rem_euclid(7)
}

/// Resolves a named weekday against the anchor date.
///
/// A plain "<day>" is the first occurrence on or after the anchor. "next <day>" is
/// the first occurrence strictly after the anchor, moved into the following week
/// when that occurrence still falls in the anchor's own week.
pub fn resolve_weekday(anchor: NaiveDate, named: NamedWeekday) -> NaiveDate {
    let ahead = days_until(anchor.weekday(), named.weekday);
    if !named.next {
        return anchor + Duration::days(ahead);
    }

    let ahead = if ahead == 0 { 7 } else { ahead };
    let candidate = anchor + Duration::days(ahead);
    if candidate.iso_week() == anchor.iso_week() {
        candidate + Duration::days(7)
    } else {
        candidate
    }
}

/// Moves `date` to the nearest day falling on `weekday`, never earlier than the anchor.
pub fn align_to_weekday(date: NaiveDate, weekday: Weekday, anchor: NaiveDate) -> NaiveDate {
    let forward = days_until(date.weekday(), weekday);
    let shifted = if forward <= 3 {
        date + Duration::days(forward)
    } else {
        date - Duration::days(7 - forward)
    };

    if shifted >= anchor {
        shifted
    } else if shifted + Duration::days(7) >= anchor {
        shifted + Duration::days(7)
    } else {
        resolve_weekday(
            anchor,
            NamedWeekday {
                weekday,
                next: false,
            },
        )
    }
}

/// Applies the due-date policy to the raw value the model produced.
///
/// - absent value: `None`, unless the transcript names a weekday;
/// - unparseable value: the date was implied but not resolvable, so the anchor
///   date (or the named weekday resolved from it) is used;
/// - parsed value on the wrong weekday: repaired to the named weekday.
pub fn reconcile_due_date(
    raw: Option<&str>,
    transcript: &str,
    anchor: NaiveDate,
) -> Option<DueDate> {
    let named = named_weekday(transcript);
    let raw = raw
        .map(str::trim)
        .filter(|value| !value.is_empty() && !value.eq_ignore_ascii_case("null"));

    let produced = match raw {
        None => {
            return named.map(|named| {
                let resolved = resolve_weekday(anchor, named);
                debug!(
                    "Model returned no due date; resolved named weekday {:?} to {}",
                    named.weekday, resolved
                );
                DueDate(resolved)
            });
        }
        Some(value) => match DueDate::parse_lenient(value) {
            Some(date) => date,
            None => {
                warn!("Unparseable due date from model: {:?}", value);
                let fallback = named.map_or(anchor, |named| resolve_weekday(anchor, named));
                return Some(DueDate(fallback));
            }
        },
    };

    let Some(named) = named else {
        return Some(produced);
    };

    let mut date = produced.date();
    if date.weekday() != named.weekday {
        date = align_to_weekday(date, named.weekday, anchor);
        warn!(
            "Due date {} falls on {:?} but transcript names {:?}; repaired to {}",
            produced,
            produced.weekday(),
            named.weekday,
            DueDate(date)
        );
    }

    // "next <day>" never lands in the anchor's own week.
    let earliest = resolve_weekday(anchor, named);
    if named.next && date < earliest {
        warn!(
            "Due date {} is earlier than next {:?}; moved to {}",
            DueDate(date),
            named.weekday,
            DueDate(earliest)
        );
        date = earliest;
    }

    Some(DueDate(date))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    // Thursday
    fn anchor() -> NaiveDate {
        date(2025, 10, 23)
    }

    #[test]
    fn test_format_and_parse_agree_across_calendar() {
        let mut day = date(1999, 1, 1);
        let end = date(2032, 12, 31);
        while day <= end {
            let due = DueDate::new(day);
            let rendered = due.to_string();
            assert_eq!(rendered.len(), 10);
            assert_eq!(DueDate::parse(&rendered).unwrap().date(), day);
            day += Duration::days(1);
        }
    }

    #[test]
    fn test_parse_rejects_iso_but_lenient_accepts() {
        assert!(DueDate::parse("2025-10-31").is_err());
        assert_eq!(
            DueDate::parse_lenient("2025-10-31").unwrap().to_string(),
            "31-10-2025"
        );
        assert_eq!(
            DueDate::parse_lenient("31/10/2025").unwrap().to_string(),
            "31-10-2025"
        );
        assert!(DueDate::parse_lenient("next friday").is_none());
        assert!(DueDate::parse_lenient("31-02-2025").is_none());
    }

    #[test]
    fn test_serde_uses_canonical_form() {
        let due = DueDate::new(date(2025, 1, 5));
        assert_eq!(serde_json::to_string(&due).unwrap(), "\"05-01-2025\"");
        let back: DueDate = serde_json::from_str("\"05-01-2025\"").unwrap();
        assert_eq!(back, due);
        assert!(serde_json::from_str::<DueDate>("\"2025-01-05\"").is_err());
    }

    #[test]
    fn test_named_weekday_detection() {
        let named = named_weekday("Remind me to call the dentist next Friday").unwrap();
        assert_eq!(named.weekday, Weekday::Fri);
        assert!(named.next);

        let named = named_weekday("standup on MONDAY").unwrap();
        assert_eq!(named.weekday, Weekday::Mon);
        assert!(!named.next);

        assert!(named_weekday("buy milk").is_none());
        assert!(named_weekday("move it from Monday to Tuesday").is_none());
        assert!(named_weekday("fridays and friday again").is_some());
        assert!(named_weekday("sundayfunday").is_none());
    }

    #[test]
    fn test_resolve_next_weekday_skips_current_week() {
        let named = NamedWeekday {
            weekday: Weekday::Fri,
            next: true,
        };
        assert_eq!(resolve_weekday(anchor(), named), date(2025, 10, 31));
    }

    #[test]
    fn test_resolve_plain_weekday_is_upcoming() {
        let friday = NamedWeekday {
            weekday: Weekday::Fri,
            next: false,
        };
        assert_eq!(resolve_weekday(anchor(), friday), date(2025, 10, 24));

        let thursday = NamedWeekday {
            weekday: Weekday::Thu,
            next: false,
        };
        assert_eq!(resolve_weekday(anchor(), thursday), anchor());
    }

    #[test]
    fn test_resolve_next_weekday_in_following_week() {
        // Saturday anchor: the coming Monday is already next week.
        let saturday = date(2025, 10, 25);
        let named = NamedWeekday {
            weekday: Weekday::Mon,
            next: true,
        };
        assert_eq!(resolve_weekday(saturday, named), date(2025, 10, 27));
    }

    #[test]
    fn test_reconcile_keeps_matching_weekday() {
        let due = reconcile_due_date(
            Some("31-10-2025"),
            "call the dentist next Friday",
            anchor(),
        )
        .unwrap();
        assert_eq!(due.to_string(), "31-10-2025");
    }

    #[test]
    fn test_reconcile_next_weekday_skips_current_week() {
        // Model answered the coming Friday 24-10-2025 for "next Friday".
        let due = reconcile_due_date(
            Some("24-10-2025"),
            "Remind me to call the dentist next Friday, it's urgent",
            anchor(),
        )
        .unwrap();
        assert_eq!(due.to_string(), "31-10-2025");

        // A later Friday is left alone.
        let due = reconcile_due_date(Some("07-11-2025"), "next Friday", anchor()).unwrap();
        assert_eq!(due.to_string(), "07-11-2025");

        // Plain "Friday" accepts the coming one.
        let due = reconcile_due_date(Some("24-10-2025"), "by Friday", anchor()).unwrap();
        assert_eq!(due.to_string(), "24-10-2025");
    }

    #[test]
    fn test_reconcile_repairs_weekday_mismatch() {
        // Model answered Thursday 30-10-2025 for "next Friday".
        let due = reconcile_due_date(
            Some("30-10-2025"),
            "call the dentist next Friday",
            anchor(),
        )
        .unwrap();
        assert_eq!(due.weekday(), Weekday::Fri);
        assert_eq!(due.to_string(), "31-10-2025");
    }

    #[test]
    fn test_reconcile_repair_never_precedes_anchor() {
        // Monday 20-10 is nearest to Tuesday 21-10 but lies before the anchor.
        let due = reconcile_due_date(Some("21-10-2025"), "on Monday", anchor()).unwrap();
        assert_eq!(due.to_string(), "27-10-2025");
    }

    #[test]
    fn test_reconcile_null_without_mention_stays_null() {
        assert!(reconcile_due_date(None, "buy milk", anchor()).is_none());
        assert!(reconcile_due_date(Some("null"), "buy milk", anchor()).is_none());
        assert!(reconcile_due_date(Some("  "), "buy milk", anchor()).is_none());
    }

    #[test]
    fn test_reconcile_null_with_weekday_resolves() {
        let due = reconcile_due_date(None, "gym on saturday", anchor()).unwrap();
        assert_eq!(due.to_string(), "25-10-2025");
    }

    #[test]
    fn test_reconcile_unparseable_defaults_to_anchor() {
        let due = reconcile_due_date(Some("sometime soon"), "finish report soon", anchor())
            .unwrap();
        assert_eq!(due.date(), anchor());
    }

    #[test]
    fn test_reconcile_normalizes_iso_date() {
        let due = reconcile_due_date(Some("2025-11-03"), "pay rent", anchor()).unwrap();
        assert_eq!(due.to_string(), "03-11-2025");
    }
}
