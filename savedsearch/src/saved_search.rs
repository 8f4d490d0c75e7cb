//! The saved search entity.
//!
//! A saved search keeps the raw criteria an operator entered (titles,
//! keywords, locations and the sites whose business units it covers) and the
//! Solr query string derived from them. The query string is recomputed by
//! [`SavedSearch::prepare_for_save`], which every persistence path calls.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{
    backend::{GroupedResponse, SolrGroupBackend},
    errors::{Result, ValidationError, ValidationIssue, ValidationResult},
    group::GroupQuery,
    id::generate_saved_search_id,
    query::{self, BUSINESS_UNIT, LOCATION, KEYWORD, TITLE},
};

pub const NAME_MAX_LENGTH: usize = 100;

static SLUG_STRIP: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9_\s-]").unwrap());
static SLUG_HYPHENATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[-\s]+").unwrap());

/// A site a saved search applies to, with the business units linked to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct SiteScope {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub business_units: Vec<u32>,
}

impl SiteScope {
    pub fn new(id: impl Into<String>, name: impl Into<String>, business_units: impl IntoIterator<Item = u32>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            business_units: business_units.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct SavedSearch {
    pub id: String,
    pub name: String,
    #[serde(default)]
    name_slug: Option<String>,
    #[serde(default)]
    pub date_created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
    /// Comma-separated job titles.
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub keyword: Vec<String>,
    #[serde(default)]
    pub location: Vec<String>,
    #[serde(default)]
    pub sites: Vec<SiteScope>,
    /// Owning scope id.
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    querystring: String,
    #[serde(default)]
    pub blurb: String,
    #[serde(default)]
    pub show_blurb: bool,
    #[serde(default)]
    pub show_production: bool,
}

impl SavedSearch {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: generate_saved_search_id(),
            name: name.into(),
            name_slug: None,
            date_created: None,
            last_updated: None,
            title: String::new(),
            keyword: Vec::new(),
            location: Vec::new(),
            sites: Vec::new(),
            group: None,
            querystring: String::new(),
            blurb: String::new(),
            show_blurb: false,
            show_production: false,
        }
    }

    #[inline]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    #[inline]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    #[inline]
    pub fn with_keywords<S: Into<String>>(mut self, keywords: impl IntoIterator<Item = S>) -> Self {
        self.keyword = keywords.into_iter().map(Into::into).collect();
        self
    }

    #[inline]
    pub fn with_locations<S: Into<String>>(mut self, locations: impl IntoIterator<Item = S>) -> Self {
        self.location = locations.into_iter().map(Into::into).collect();
        self
    }

    #[inline]
    pub fn with_site(mut self, site: SiteScope) -> Self {
        self.sites.push(site);
        self
    }

    #[inline]
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    #[inline]
    pub fn with_blurb(mut self, blurb: impl Into<String>, show: bool) -> Self {
        self.blurb = blurb.into();
        self.show_blurb = show;
        self
    }

    #[inline]
    pub fn with_show_production(mut self, show: bool) -> Self {
        self.show_production = show;
        self
    }

    pub fn name_slug(&self) -> Option<&str> {
        self.name_slug.as_deref()
    }

    /// The query string stored at the last save.
    pub fn querystring(&self) -> &str {
        &self.querystring
    }

    /// Keep an already assigned slug, e.g. the one of the stored record.
    pub(crate) fn inherit_slug(&mut self, slug: Option<String>) {
        if self.name_slug.is_none() {
            self.name_slug = slug;
        }
    }

    /// Business unit ids of every site, sorted and de-duplicated.
    pub fn business_units(&self) -> Vec<u32> {
        let units: BTreeSet<u32> = self
            .sites
            .iter()
            .flat_map(|site| site.business_units.iter().copied())
            .collect();
        units.into_iter().collect()
    }

    fn business_unit_values(&self) -> String {
        self.business_units()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }

    fn keyword_values(&self) -> String {
        self.keyword.join(",")
    }

    fn location_values(&self) -> String {
        self.location.join(",")
    }

    /// Field clauses in query order: title, keyword, location, business unit.
    pub fn clauses(&self) -> Vec<String> {
        vec![
            query::build_clause(&TITLE, &self.title),
            query::build_clause(&KEYWORD, &self.keyword_values()),
            query::build_clause(&LOCATION, &self.location_values()),
            query::build_clause(&BUSINESS_UNIT, &self.business_unit_values()),
        ]
    }

    /// The Solr query for the current criteria; empty when there are none.
    ///
    /// ```
    /// use savedsearch::saved_search::{SavedSearch, SiteScope};
    ///
    /// let search = SavedSearch::new("Cooks in Boise")
    ///     .with_title("Chef,Line Cook")
    ///     .with_locations(["Boise"])
    ///     .with_site(SiteScope::new("1", "jobs.example.com", [34, 12]));
    ///
    /// assert_eq!(
    ///     search.build_query_string(),
    ///     "title:Chef AND title:(Line Cook) AND location:Boise AND (buid:12 OR buid:34)"
    /// );
    /// ```
    pub fn build_query_string(&self) -> String {
        query::compose(self.clauses())
    }

    /// Whether the stored query string matches the current criteria.
    pub fn is_query_current(&self) -> bool {
        self.querystring == self.build_query_string()
    }

    pub fn validate(&self) -> ValidationResult<()> {
        let mut issues = Vec::new();

        let name = self.name.trim();
        if name.is_empty() {
            issues.push(ValidationIssue::new("name", "required", "name is required"));
        } else if self.name.chars().count() > NAME_MAX_LENGTH {
            issues.push(ValidationIssue::new(
                "name",
                "max_length",
                format!("name must be at most {NAME_MAX_LENGTH} characters"),
            ));
        }

        let slug_missing = match &self.name_slug {
            Some(slug) => slug.is_empty(),
            None => !name.is_empty() && slugify(name).is_empty(),
        };
        if slug_missing {
            issues.push(ValidationIssue::new(
                "name_slug",
                "invalid",
                "name must contain at least one letter or digit",
            ));
        }

        for (field, raw) in [
            ("title", self.title.clone()),
            ("keyword", self.keyword_values()),
            ("location", self.location_values()),
        ] {
            if is_malformed(&raw) {
                issues.push(ValidationIssue::new(
                    field,
                    "malformed",
                    format!("{field} contains no searchable terms"),
                ));
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::new(issues))
        }
    }

    pub fn prepare_for_save(&mut self) -> ValidationResult<()> {
        self.prepare_for_save_at(Utc::now())
    }

    /// Validate, assign the slug once, recompute the query string and stamp dates.
    pub fn prepare_for_save_at(&mut self, now: DateTime<Utc>) -> ValidationResult<()> {
        self.validate()?;
        if self.name_slug.is_none() {
            self.name_slug = Some(slugify(&self.name));
        }
        self.querystring = self.build_query_string();
        self.date_created.get_or_insert(now);
        self.last_updated = Some(now);
        Ok(())
    }

    /// Membership check against the scopes the caller may see.
    pub fn is_visible_to<S: AsRef<str>>(&self, scopes: &[S]) -> bool {
        self.group
            .as_deref()
            .is_some_and(|group| scopes.iter().any(|scope| scope.as_ref() == group))
    }

    pub fn to_group_query(&self) -> GroupQuery {
        GroupQuery::new(self.build_query_string())
    }

    /// Run this search through `backend`, using `query` for groups, sorting
    /// and facets. The query string of `query` is replaced.
    pub async fn execute(&self, backend: &SolrGroupBackend, mut query: GroupQuery) -> Result<GroupedResponse> {
        query.query_string = self.build_query_string();
        backend.search(&query).await
    }
}

/// Lowercase ASCII slug: letters, digits, `_` and single hyphens.
///
/// ```
/// use savedsearch::saved_search::slugify;
///
/// assert_eq!(slugify("Cooks in Boise, ID!"), "cooks-in-boise-id");
/// assert_eq!(slugify("  --Nurses--  "), "nurses");
/// ```
pub fn slugify(value: &str) -> String {
    let lowered = value.to_lowercase();
    let stripped = SLUG_STRIP.replace_all(&lowered, "");
    let hyphenated = SLUG_HYPHENATE.replace_all(stripped.trim(), "-");
    hyphenated.trim_matches(|ch| ch == '-' || ch == '_').to_string()
}

fn is_malformed(raw: &str) -> bool {
    !raw.trim().is_empty() && query::split_terms(raw).is_empty()
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn search() -> SavedSearch {
        SavedSearch::new("Cooks in Boise")
            .with_title("Chef,Line Cook")
            .with_keywords(["kitchen"])
            .with_locations(["Boise", "Reno"])
            .with_site(SiteScope::new("a", "a.example.com", [34, 12]))
            .with_site(SiteScope::new("b", "b.example.com", [12, 56]))
            .with_group("scope-1")
    }

    #[test]
    fn id_is_generated() {
        assert_eq!(SavedSearch::new("x").id.len(), 20);
        assert_ne!(SavedSearch::new("x").id, SavedSearch::new("x").id);
    }

    #[test]
    fn clauses_follow_field_order() {
        assert_eq!(
            search().clauses(),
            vec![
                "title:Chef AND title:(Line Cook)",
                "text:kitchen",
                "location:Boise OR location:Reno",
                "buid:12 OR buid:34 OR buid:56",
            ]
        );
    }

    #[test]
    fn business_units_are_a_sorted_union() {
        assert_eq!(search().business_units(), vec![12, 34, 56]);
        assert!(SavedSearch::new("x").business_units().is_empty());
    }

    #[test]
    fn no_criteria_gives_an_empty_query() {
        let mut search = SavedSearch::new("Everything");
        assert_eq!(search.build_query_string(), "");
        search.prepare_for_save().unwrap();
        assert_eq!(search.querystring(), "");
    }

    #[test]
    fn disjunctive_fields_are_grouped_in_the_query() {
        let search = SavedSearch::new("Chefs")
            .with_title("Chef")
            .with_locations(["Boise", "Reno"])
            .with_site(SiteScope::new("a", "a.example.com", [12, 34]));
        assert_eq!(
            search.build_query_string(),
            "title:Chef AND (location:Boise OR location:Reno) AND (buid:12 OR buid:34)"
        );
    }

    #[test]
    fn empty_clauses_are_skipped() {
        let search = SavedSearch::new("Nurses").with_keywords(["RN#@#nurse"]);
        assert_eq!(search.build_query_string(), "(text:RN OR text:nurse)");
    }

    #[test]
    fn prepare_for_save_sets_slug_query_and_dates() {
        let first = Utc.with_ymd_and_hms(2012, 3, 1, 9, 0, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2012, 4, 1, 9, 0, 0).unwrap();
        let mut search = search();

        search.prepare_for_save_at(first).unwrap();
        assert_eq!(search.name_slug(), Some("cooks-in-boise"));
        assert_eq!(search.querystring(), search.build_query_string());
        assert_eq!(search.date_created, Some(first));
        assert_eq!(search.last_updated, Some(first));

        search.name = "Cooks in Reno".into();
        search.location = vec!["Reno".into()];
        assert!(!search.is_query_current());
        search.prepare_for_save_at(later).unwrap();
        assert_eq!(search.name_slug(), Some("cooks-in-boise"));
        assert!(search.querystring().contains("location:Reno"));
        assert!(search.is_query_current());
        assert_eq!(search.date_created, Some(first));
        assert_eq!(search.last_updated, Some(later));
    }

    #[test]
    fn validation_runs_before_the_query_is_built() {
        let mut search = SavedSearch::new("   ").with_title("Chef");
        let err = search.prepare_for_save().unwrap_err();
        assert!(err.has_field("name"));
        assert_eq!(search.querystring(), "");
        assert!(search.name_slug().is_none());
        assert!(search.date_created.is_none());
    }

    #[test]
    fn long_names_are_rejected() {
        let err = SavedSearch::new("x".repeat(NAME_MAX_LENGTH + 1)).validate().unwrap_err();
        assert_eq!(err.issues[0].code, "max_length");
        assert!(SavedSearch::new("x".repeat(NAME_MAX_LENGTH)).validate().is_ok());
    }

    #[test]
    fn names_without_slug_characters_are_rejected() {
        let err = SavedSearch::new("!!!").validate().unwrap_err();
        assert!(err.has_field("name_slug"));
    }

    #[test]
    fn filters_without_terms_are_malformed() {
        let err = SavedSearch::new("Broken")
            .with_title("(),*")
            .with_keywords(["#@#"])
            .validate()
            .unwrap_err();
        assert!(err.has_field("title"));
        assert!(err.has_field("keyword"));
        assert!(!err.has_field("location"));
        assert!(err.issues.iter().all(|issue| issue.code == "malformed"));
    }

    #[test]
    fn visibility_is_scope_membership() {
        let search = search();
        assert!(search.is_visible_to(&["scope-1", "scope-2"]));
        assert!(!search.is_visible_to(&["scope-2"]));
        assert!(!SavedSearch::new("x").is_visible_to(&["scope-1"]));
    }

    #[test]
    fn slugify_handles_punctuation_and_unicode() {
        assert_eq!(slugify("Café Staff"), "caf-staff");
        assert_eq!(slugify("a  -  b"), "a-b");
        assert_eq!(slugify("___"), "");
    }

    #[test]
    fn serde_keeps_derived_fields() {
        let mut search = search();
        search.prepare_for_save().unwrap();
        let json = serde_json::to_string(&search).unwrap();
        let restored: SavedSearch = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, search);
        assert_eq!(restored.name_slug(), Some("cooks-in-boise"));
    }

    #[test]
    fn group_query_uses_current_criteria() {
        assert_eq!(search().to_group_query().query_string, search().build_query_string());
    }
}
