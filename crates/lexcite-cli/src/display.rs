//! Terminal rendering for search results, triggers, and suggestion state.
//!
//! Candidates are shown as compact cards: a header line with rank, kind, and
//! score, then labelled fields, then provider metadata.

use std::fmt::Write as _;

use lexcite_core::{ApiStatus, CitationCandidate, TriggerMatch};
use lexcite_search::{SearchOutcome, SourceFailure, SuggestionState};

const MAX_TITLE_CHARS: usize = 72;
const LABEL_WIDTH: usize = 12;

/// `writeln!` into a `String` buffer, which cannot fail.
macro_rules! push_line {
    ($out:expr) => {
        $out.push('\n')
    };
    ($out:expr, $($arg:tt)*) => {{
        let _ = writeln!($out, $($arg)*);
    }};
}

// ── Public API ──

/// Print a whole search outcome: banner, cards, then any source errors.
pub fn print_outcome(query: &str, outcome: &SearchOutcome) {
    print!("{}", render_outcome(query, outcome));
}

pub fn print_trigger(text: &str, cursor: usize, trigger: Option<&TriggerMatch>) {
    print!("{}", render_trigger(text, cursor, trigger));
}

pub fn print_api_status(status: &ApiStatus) {
    println!("Provider configuration");
    for (name, ready) in [
        ("federal_register", status.federal_register),
        ("courtlistener", status.courtlistener),
        ("govinfo", status.govinfo),
    ] {
        let note = if ready { "ready" } else { "no API key (limited access)" };
        println!("  {name:<LABEL_WIDTH$}     {note}");
    }
}

pub fn print_candidates(candidates: &[CitationCandidate]) {
    let mut out = String::new();
    for (i, c) in candidates.iter().enumerate() {
        render_card(&mut out, i + 1, c);
    }
    print!("{out}");
}

/// One line per published suggestion state, for `watch`.
pub fn render_state_line(state: &SuggestionState) -> String {
    let Some(trigger) = &state.trigger else {
        return format!("[{}] closed", state.generation);
    };
    if state.loading {
        return format!("[{}] {:?} searching...", state.generation, trigger.query);
    }
    if let Some(error) = &state.error {
        return format!("[{}] {:?} error: {error}", state.generation, trigger.query);
    }
    let titles: Vec<String> = state
        .suggestions
        .iter()
        .map(|c| shorten(c.insertion_text(), 40))
        .collect();
    format!(
        "[{}] {:?} {} suggestion(s){}: {}",
        state.generation,
        trigger.query,
        state.suggestions.len(),
        if state.is_demo { " (demo)" } else { "" },
        titles.join(" | ")
    )
}

// ── Rendering ──

pub fn render_outcome(query: &str, outcome: &SearchOutcome) -> String {
    let mut out = String::new();
    let sources: Vec<&str> = outcome.sources.iter().map(|s| s.as_str()).collect();
    push_line!(out, "=== {query} ===");
    if outcome.suggestions.is_empty() {
        push_line!(out, "No suggestions.");
    } else {
        push_line!(
            out,
            "{} suggestion(s) from {}{}",
            outcome.suggestions.len(),
            sources.join(", "),
            if outcome.is_demo { " (demo data)" } else { "" }
        );
    }
    push_line!(out);

    for (i, c) in outcome.suggestions.iter().enumerate() {
        render_card(&mut out, i + 1, c);
    }
    render_failures(&mut out, &outcome.errors);
    out
}

pub fn render_trigger(text: &str, cursor: usize, trigger: Option<&TriggerMatch>) -> String {
    let Some(t) = trigger else {
        return format!("no trigger before cursor {cursor}\n");
    };
    let mut out = String::new();
    push_line!(out, "{:<LABEL_WIDTH$} {}", "rule", t.rule);
    push_line!(out, "{:<LABEL_WIDTH$} {:?}", "query", t.query);
    push_line!(out, "{:<LABEL_WIDTH$} {}..{}", "span", t.start, t.end());
    push_line!(
        out,
        "{:<LABEL_WIDTH$} {}",
        "searchable",
        if t.is_searchable() { "yes" } else { "no (too short)" }
    );
    push_line!(out, "{:<LABEL_WIDTH$} {}", "context", context(text, t.start));
    out
}

fn render_card(out: &mut String, rank: usize, c: &CitationCandidate) {
    push_line!(
        out,
        "{rank:>2}. [{} {:>3}%] {}",
        c.kind,
        c.relevance_score,
        shorten(&c.title, MAX_TITLE_CHARS)
    );
    field(out, "citation", &c.citation_text);
    field(out, "why", &c.rationale);
    field(out, "excerpt", &c.excerpt);
    field(out, "source", c.source_provider.as_str());
    if let Some(url) = &c.external_url {
        field(out, "url", url);
    }
    for (key, value) in &c.metadata {
        let rendered = match value {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Array(items) if items.is_empty() => continue,
            serde_json::Value::Array(items) => items
                .iter()
                .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
                .collect::<Vec<_>>()
                .join(", "),
            serde_json::Value::Null => continue,
            other => other.to_string(),
        };
        field(out, key, &rendered);
    }
    push_line!(out);
}

fn render_failures(out: &mut String, failures: &[SourceFailure]) {
    if failures.is_empty() {
        return;
    }
    push_line!(out, "Source errors");
    for f in failures {
        let provider = f.provider.map(|p| p.as_str()).unwrap_or("aggregator");
        let mut tags = Vec::new();
        if f.rate_limited {
            tags.push("rate limited");
        }
        if f.timed_out {
            tags.push("timed out");
        }
        let tags = if tags.is_empty() {
            String::new()
        } else {
            format!(" [{}]", tags.join(", "))
        };
        push_line!(out, "  {provider:<LABEL_WIDTH$}{tags} {}", f.message);
    }
}

// ── Helpers ──

fn field(out: &mut String, label: &str, value: &str) {
    if value.is_empty() {
        return;
    }
    push_line!(out, "    {label:<LABEL_WIDTH$} {value}");
}

fn shorten(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars.saturating_sub(3)) {
        Some((i, _)) if s.chars().count() > max_chars => format!("{}...", &s[..i]),
        _ => s.to_string(),
    }
}

/// Up to 30 bytes of text before the trigger, for orientation.
fn context(text: &str, start: usize) -> String {
    let mut from = start.saturating_sub(30);
    while !text.is_char_boundary(from) {
        from -= 1;
    }
    let before = &text[from..start.min(text.len())];
    format!("...{}|", before.replace('\n', " "))
}
