//! # Solr query-string building
//!
//! Turns loosely structured saved-search criteria into the boolean query string
//! that is stored on a saved search and sent to Solr as `q`.
//!
//! | Step        | Function         | Input                     | Output                         |
//! |-------------|------------------|---------------------------|--------------------------------|
//! | Escape      | `escape`         | `"C++ Dev!"`              | `"C Dev"`                      |
//! | Field       | `build_clause`   | `TITLE`, `"Chef,Cook"`    | `"title:Chef AND title:Cook"`  |
//! | Field       | `build_clause`   | `LOCATION`, `"Boise,Reno"`| `"location:Boise OR location:Reno"` |
//! | Compose     | `compose`        | `["a:1", "", "b:2"]`      | `"a:1 AND b:2"`                |
//! | Compose     | `compose`        | `["a:1", "b:2 OR b:3"]`   | `"a:1 AND (b:2 OR b:3)"`       |
//!
//! ## Escaping
//!
//! Reserved query syntax is *deleted*, not backslash-escaped: saved searches are
//! plain criteria, so an operator typed into a title is noise. The colon is the
//! one exception because it can legitimately appear in a value (`"Sr: Chef"`),
//! so it is escaped as `\:` instead.
//!
//! ## Field kinds
//!
//! Free-text fields are conjunctive (every keyword must match), categorical
//! fields are disjunctive (jobs in Austin OR Dallas, not in both at once).
//! Across fields the composer is always conjunctive. Solr's standard parser has
//! no AND-over-OR precedence, so a disjunctive clause is parenthesised whenever
//! it is joined with other clauses.

use serde::{Deserialize, Serialize};

/// Separates the individual values of one filter field.
pub const VALUE_SEPARATOR: char = ',';

/// Splits one value into literal alternatives (`"RN#@#Registered Nurse"`).
pub const ALTERNATE_SEPARATOR: &str = "#@#";

const RESERVED_CHARS: &[char] = &['+', '-', '!', '(', ')', '{', '}', '[', ']', '^', '~', '"', '*', '?'];

/// How the values of one field combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Titles and keywords: every value must match.
    FreeText,
    /// Locations, business units and other identifiers: any value suffices.
    Categorical,
}

impl FieldKind {
    #[inline]
    pub const fn join_operator(self) -> &'static str {
        match self {
            FieldKind::FreeText => " AND ",
            FieldKind::Categorical => " OR ",
        }
    }
}

/// A Solr field that saved-search criteria can filter on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SearchField {
    pub name: &'static str,
    pub kind: FieldKind,
}

impl SearchField {
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self { name, kind }
    }
}

pub const TITLE: SearchField = SearchField::new("title", FieldKind::FreeText);
/// Keywords are matched against the catch-all `text` field.
pub const KEYWORD: SearchField = SearchField::new("text", FieldKind::FreeText);
pub const LOCATION: SearchField = SearchField::new("location", FieldKind::Categorical);
pub const COUNTRY: SearchField = SearchField::new("country", FieldKind::Categorical);
pub const STATE: SearchField = SearchField::new("state", FieldKind::Categorical);
pub const CITY: SearchField = SearchField::new("city", FieldKind::Categorical);
pub const BUSINESS_UNIT: SearchField = SearchField::new("buid", FieldKind::Categorical);

/// Strip reserved query syntax from a raw token.
///
/// # Examples
///
/// ```
/// use savedsearch::query::escape;
///
/// assert_eq!(escape("C++ Dev!"), "C Dev");
/// assert_eq!(escape("Sr: Chef"), "Sr\\: Chef");
/// assert_eq!(escape("AT&T"), "AT&T");
/// assert_eq!(escape("cats && dogs"), "cats  dogs");
/// assert_eq!(escape(""), "");
///
/// // Escaping is idempotent, colons are never escaped twice.
/// assert_eq!(escape(&escape("a:b(c)")), escape("a:b(c)"));
/// ```
pub fn escape(token: &str) -> String {
    let mut stripped = String::with_capacity(token.len());
    for ch in token.chars() {
        if !RESERVED_CHARS.contains(&ch) {
            stripped.push(ch);
        }
    }
    escape_colons(&collapse_operator_pairs(&stripped))
}

/// Build one field's clause from a comma-separated list of raw values.
///
/// # Examples
///
/// ```
/// use savedsearch::query::{BUSINESS_UNIT, KEYWORD, TITLE, build_clause};
///
/// assert_eq!(build_clause(&TITLE, "Chef,Cook"), "title:Chef AND title:Cook");
/// assert_eq!(build_clause(&BUSINESS_UNIT, "12, 34"), "buid:12 OR buid:34");
/// assert_eq!(build_clause(&TITLE, "Chef"), "title:Chef");
/// assert_eq!(build_clause(&TITLE, ""), "");
///
/// // Multi-word values stay scoped to the field.
/// assert_eq!(build_clause(&TITLE, "Dental Technician"), "title:(Dental Technician)");
///
/// // Alternatives inside one keyword value.
/// assert_eq!(
///     build_clause(&KEYWORD, "RN#@#nurse,icu"),
///     "(text:RN OR text:nurse) AND text:icu"
/// );
/// ```
pub fn build_clause(field: &SearchField, raw_values: &str) -> String {
    let mut parts: Vec<String> = Vec::new();

    for piece in raw_values.split(VALUE_SEPARATOR) {
        let alternatives: Vec<String> = piece
            .split(ALTERNATE_SEPARATOR)
            .filter_map(normalize_token)
            .map(|token| render_atom(field.name, &token))
            .collect();

        match field.kind {
            FieldKind::FreeText => match alternatives.len() {
                0 => {}
                1 => parts.extend(alternatives),
                _ => parts.push(format!("({})", alternatives.join(" OR "))),
            },
            FieldKind::Categorical => parts.extend(alternatives),
        }
    }

    parts.join(field.kind.join_operator())
}

/// Join field clauses into the master query; empty clauses are dropped.
///
/// A clause with a top-level ` OR ` is wrapped in parentheses when it is
/// joined with others. A lone clause is returned as is.
///
/// ```
/// use savedsearch::query::compose;
///
/// assert_eq!(compose(["a:1", "", "b:2"]), "a:1 AND b:2");
/// assert_eq!(compose(["a:1", "b:2 OR b:3"]), "a:1 AND (b:2 OR b:3)");
/// assert_eq!(compose(["b:2 OR b:3"]), "b:2 OR b:3");
/// assert_eq!(compose(Vec::<String>::new()), "");
/// ```
pub fn compose<I, S>(clauses: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let kept: Vec<String> = clauses
        .into_iter()
        .filter_map(|clause| {
            let clause = clause.as_ref().trim();
            (!clause.is_empty()).then(|| clause.to_string())
        })
        .collect();
    if kept.len() < 2 {
        return kept.join(" AND ");
    }
    kept.iter()
        .map(|clause| {
            if has_top_level_or(clause) {
                format!("({clause})")
            } else {
                clause.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(" AND ")
}

// True when ` OR ` appears outside every parenthesised group.
fn has_top_level_or(clause: &str) -> bool {
    let mut depth = 0usize;
    for (idx, ch) in clause.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ' ' if depth == 0 && clause[idx..].starts_with(" OR ") => return true,
            _ => {}
        }
    }
    false
}

/// The escaped, trimmed tokens a raw value list contributes, alternatives flattened.
///
/// A non-empty input that yields no token is treated as malformed by the saved
/// search validation.
pub fn split_terms(raw_values: &str) -> Vec<String> {
    raw_values
        .split(VALUE_SEPARATOR)
        .flat_map(|piece| piece.split(ALTERNATE_SEPARATOR))
        .filter_map(normalize_token)
        .collect()
}

/// Render a single `field:value` atom. Multi-word values are parenthesised so
/// every word stays scoped to `field`.
pub fn render_atom(field: &str, token: &str) -> String {
    if token.contains(char::is_whitespace) {
        format!("{field}:({token})")
    } else {
        format!("{field}:{token}")
    }
}

fn normalize_token(raw: &str) -> Option<String> {
    let escaped = escape(raw);
    let words: Vec<&str> = escaped.split_whitespace().collect();
    if words.is_empty() { None } else { Some(words.join(" ")) }
}

// `&&` and `||` are operators, a lone `&` or `|` is ordinary text.
fn collapse_operator_pairs(value: &str) -> String {
    let mut collapsed = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '&' || ch == '|' {
            let mut run = 1;
            while chars.peek() == Some(&ch) {
                chars.next();
                run += 1;
            }
            if run % 2 == 1 {
                collapsed.push(ch);
            }
        } else {
            collapsed.push(ch);
        }
    }
    collapsed
}

fn escape_colons(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    let mut previous = None;
    for ch in value.chars() {
        if ch == ':' && previous != Some('\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
        previous = Some(ch);
    }
    escaped
}
