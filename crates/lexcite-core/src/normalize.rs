//! Field normalisation shared by the source adapters.
//!
//! Providers disagree on almost everything: some send scores, most don't;
//! snippets arrive with `<mark>` highlighting; statutory citations appear as
//! "26 USC 162", "26 U.S.C. § 162" or "26 U.S.C. section 162". These helpers
//! turn that into the fixed shape of [`CitationCandidate`](crate::CitationCandidate).

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

/// Maximum excerpt length in characters, before the ellipsis.
pub const EXCERPT_MAX_CHARS: usize = 200;
pub const ELLIPSIS: &str = "...";
pub const NO_EXCERPT: &str = "No excerpt available.";

static RE_MARKUP: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());

static RE_WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

static RE_USC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+)\s*U\.?\s*S\.?\s*C\.?\s*(?:§+|sec(?:tion|\.)?)?\s*(\d+[a-z]*)").unwrap()
});

static RE_CFR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+)\s*C\.?\s*F\.?\s*R\.?\s*(?:§+|part|sec(?:tion|\.)?)?\s*(\d+(?:\.\d+)?)")
        .unwrap()
});

/// Clamp any raw score into the `[0, 100]` percentage range.
pub fn clamp_score(raw: i64) -> u8 {
    raw.clamp(0, 100) as u8
}

/// Normalise a provider-supplied floating point score.
///
/// Rounded, then kept within `[floor, ceil]` (both inside `[0, 100]`).
/// Non-finite input yields `floor`.
pub fn normalize_raw_score(raw: f64, floor: u8, ceil: u8) -> u8 {
    if !raw.is_finite() {
        return floor;
    }
    // `as` saturates on overflow.
    clamp_score(raw.round() as i64).clamp(floor, ceil)
}

/// Deterministic relevance estimate for providers that send no score.
///
/// Starts from a base value; each bonus is added on top and the total is
/// capped at 100.
#[derive(Debug, Clone, Copy)]
pub struct HeuristicScore {
    total: u32,
}

impl HeuristicScore {
    pub fn new(base: u8) -> Self {
        Self {
            total: u32::from(base),
        }
    }

    /// Add `points` when `condition` holds.
    pub fn bonus(mut self, condition: bool, points: u8) -> Self {
        if condition {
            self.total += u32::from(points);
        }
        self
    }

    /// Age tiers: +10 under one year old, +5 under three. Future dates count
    /// as brand new.
    pub fn recency(self, published: Option<NaiveDate>, today: NaiveDate) -> Self {
        let Some(published) = published else {
            return self;
        };
        let age_days = (today - published).num_days();
        if age_days < 365 {
            self.bonus(true, 10)
        } else if age_days < 3 * 365 {
            self.bonus(true, 5)
        } else {
            self
        }
    }

    pub fn finish(self) -> u8 {
        self.total.min(100) as u8
    }
}

/// Remove HTML tags and collapse runs of whitespace.
pub fn strip_markup(s: &str) -> String {
    let no_tags = RE_MARKUP.replace_all(s, "");
    RE_WHITESPACE.replace_all(no_tags.trim(), " ").into_owned()
}

/// Cut `s` to at most `max_chars` characters, appending [`ELLIPSIS`] only when
/// something was removed.
pub fn truncate_excerpt(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}{ELLIPSIS}", s[..byte_idx].trim_end()),
        None => s.to_string(),
    }
}

/// Build an excerpt from the first non-blank body text, falling back to the
/// title, then to [`NO_EXCERPT`].
pub fn excerpt_or_fallback(body: Option<&str>, title: Option<&str>) -> String {
    let body = body.map(strip_markup).filter(|b| !b.is_empty());
    if let Some(body) = body {
        return truncate_excerpt(&body, EXCERPT_MAX_CHARS);
    }
    match title.map(str::trim) {
        Some(t) if !t.is_empty() => truncate_excerpt(t, EXCERPT_MAX_CHARS),
        _ => NO_EXCERPT.to_string(),
    }
}

/// Parse the date part of `2012-03-01` or `2012-03-01T00:00:00-08:00`.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let date = s.trim().get(..10)?;
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}

pub fn year_of(s: &str) -> Option<i32> {
    use chrono::Datelike;
    parse_date(s).map(|d| d.year())
}

/// Find a U.S. Code reference and render it as `26 U.S.C. § 162`.
pub fn extract_usc_citation(text: &str) -> Option<String> {
    let caps = RE_USC.captures(text)?;
    Some(format!("{} U.S.C. § {}", &caps[1], &caps[2]))
}

/// Find a CFR reference and render it as `26 C.F.R. § 1`.
pub fn extract_cfr_citation(text: &str) -> Option<String> {
    let caps = RE_CFR.captures(text)?;
    Some(format!("{} C.F.R. § {}", &caps[1], &caps[2]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn clamp_score_bounds() {
        assert_eq!(clamp_score(-5), 0);
        assert_eq!(clamp_score(42), 42);
        assert_eq!(clamp_score(250), 100);
    }

    #[test]
    fn raw_score_floor_and_ceiling() {
        assert_eq!(normalize_raw_score(12.0, 50, 99), 50);
        assert_eq!(normalize_raw_score(87.4, 50, 99), 87);
        assert_eq!(normalize_raw_score(1534.2, 50, 99), 99);
        assert_eq!(normalize_raw_score(f64::NAN, 50, 99), 50);
        assert_eq!(normalize_raw_score(-3.0, 0, 100), 0);
    }

    #[test]
    fn heuristic_score_caps_at_100() {
        let today = date("2025-06-01");
        let score = HeuristicScore::new(70)
            .bonus(true, 15)
            .recency(Some(date("2025-01-15")), today)
            .bonus(true, 5)
            .finish();
        assert_eq!(score, 100);

        let score = HeuristicScore::new(90).bonus(true, 50).finish();
        assert_eq!(score, 100);
    }

    #[test]
    fn recency_tiers() {
        let today = date("2025-06-01");
        let score = |d: &str| HeuristicScore::new(70).recency(Some(date(d)), today).finish();
        assert_eq!(score("2025-05-01"), 80);
        assert_eq!(score("2023-01-01"), 75);
        assert_eq!(score("2015-01-01"), 70);
        assert_eq!(score("2026-01-01"), 80);
        assert_eq!(HeuristicScore::new(70).recency(None, today).finish(), 70);
    }

    #[test]
    fn strip_markup_removes_tags() {
        assert_eq!(
            strip_markup("The <mark>ordinary</mark> and\n  necessary <em>expense</em>"),
            "The ordinary and necessary expense"
        );
    }

    #[test]
    fn truncate_only_marks_when_cut() {
        assert_eq!(truncate_excerpt("short", 200), "short");
        let long = "a".repeat(250);
        let cut = truncate_excerpt(&long, 200);
        assert_eq!(cut.len(), 203);
        assert!(cut.ends_with(ELLIPSIS));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let s = "§".repeat(5);
        assert_eq!(truncate_excerpt(&s, 3), "§§§...");
    }

    #[test]
    fn excerpt_fallback_chain() {
        assert_eq!(excerpt_or_fallback(Some("<p>Body</p>"), Some("Title")), "Body");
        assert_eq!(excerpt_or_fallback(Some("  "), Some("Title")), "Title");
        assert_eq!(excerpt_or_fallback(None, None), NO_EXCERPT);
        assert_eq!(excerpt_or_fallback(Some("<br/>"), Some(" ")), NO_EXCERPT);
    }

    #[test]
    fn dates_with_and_without_time() {
        assert_eq!(parse_date("2012-03-01"), Some(date("2012-03-01")));
        assert_eq!(year_of("2012-03-01T00:00:00-08:00"), Some(2012));
        assert_eq!(parse_date("March 2012"), None);
        assert_eq!(parse_date(""), None);
    }

    #[test]
    fn usc_citation_variants() {
        for title in [
            "26 USC 162",
            "26 U.S.C. 162",
            "26 U.S.C. § 162",
            "26 U.S.C. section 162",
            "Title 26 - 26 U.S.C. §162",
        ] {
            assert_eq!(
                extract_usc_citation(title).as_deref(),
                Some("26 U.S.C. § 162"),
                "{title}"
            );
        }
        assert_eq!(extract_usc_citation("Internal Revenue Code"), None);
    }

    #[test]
    fn cfr_citation_variants() {
        assert_eq!(extract_cfr_citation("26 CFR Part 1").as_deref(), Some("26 C.F.R. § 1"));
        assert_eq!(
            extract_cfr_citation("26 C.F.R. § 1.183").as_deref(),
            Some("26 C.F.R. § 1.183")
        );
        assert_eq!(
            extract_cfr_citation("Title 26 CFR part 301").as_deref(),
            Some("26 C.F.R. § 301")
        );
        assert_eq!(extract_cfr_citation("Income Taxes"), None);
    }
}
