use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{GroupTree, render_fragment};
use crate::{
    backend::{GroupedResponse, SolrGroupBackend},
    errors::Result,
};

/// Unit of a date facet gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GapUnit {
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
}

impl GapUnit {
    pub const fn as_solr(self) -> &'static str {
        match self {
            GapUnit::Year => "YEAR",
            GapUnit::Month => "MONTH",
            GapUnit::Day => "DAY",
            GapUnit::Hour => "HOUR",
            GapUnit::Minute => "MINUTE",
            GapUnit::Second => "SECOND",
        }
    }
}

/// Date range facet on one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateFacet {
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub gap_by: GapUnit,
    pub gap_amount: u32,
}

impl DateFacet {
    /// Solr date math for the gap, e.g. `+1DAY/DAY` or `+3MONTHS/MONTH`.
    pub fn gap(&self) -> String {
        let unit = self.gap_by.as_solr();
        let plural = if self.gap_amount != 1 { "S" } else { "" };
        format!("+{}{unit}{plural}/{unit}", self.gap_amount)
    }
}

/// A grouped search: the main query plus the group fragments that partition it.
///
/// # Examples
///
/// ```
/// use savedsearch::group::{GroupQuery, GroupTree};
///
/// let query = GroupQuery::new("title:Chef")
///     .group_query(&GroupTree::term("city", "Boise"), false, None)
///     .group_query(&GroupTree::term("city", "Reno"), false, Some("reno"))
///     .with_order_by(["-date_new", "title"])
///     .with_offsets(0, Some(20));
///
/// assert_eq!(query.group_queries().len(), 2);
/// assert_eq!(query.sort_by().as_deref(), Some("date_new desc, title asc"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct GroupQuery {
    pub query_string: String,
    group_queries: BTreeSet<String>,
    pub order_by: Vec<String>,
    pub start_offset: u64,
    pub end_offset: Option<u64>,
    /// Stored fields to return; empty means `* score`.
    pub fields: Vec<String>,
    pub highlight: bool,
    pub facets: Vec<String>,
    pub date_facets: BTreeMap<String, DateFacet>,
    pub query_facets: Vec<(String, String)>,
    pub narrow_queries: BTreeSet<String>,
    pub spelling_query: Option<String>,
    /// Overrides the backend's `limit_to_registered_models` setting.
    pub limit_to_registered: Option<bool>,
}

impl GroupQuery {
    pub fn new(query_string: impl Into<String>) -> Self {
        Self {
            query_string: query_string.into(),
            ..Self::default()
        }
    }

    /// Add a group fragment built from `tree`. Trees that render to nothing are
    /// dropped; identical fragments collapse into one.
    pub fn add_group_query(&mut self, tree: &GroupTree, use_or: bool, tag: Option<&str>) {
        if let Some(fragment) = render_fragment(tree, use_or, tag) {
            self.group_queries.insert(fragment);
        }
    }

    /// Builder form of [`add_group_query`](Self::add_group_query).
    #[inline]
    pub fn group_query(mut self, tree: &GroupTree, use_or: bool, tag: Option<&str>) -> Self {
        self.add_group_query(tree, use_or, tag);
        self
    }

    /// The fragment set, in a stable order.
    pub fn group_queries(&self) -> &BTreeSet<String> {
        &self.group_queries
    }

    #[inline]
    pub fn with_order_by<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        self.order_by = fields.into_iter().map(Into::into).collect();
        self
    }

    #[inline]
    pub fn with_offsets(mut self, start: u64, end: Option<u64>) -> Self {
        self.start_offset = start;
        self.end_offset = end;
        self
    }

    #[inline]
    pub fn with_fields<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    #[inline]
    pub fn with_highlight(mut self, highlight: bool) -> Self {
        self.highlight = highlight;
        self
    }

    #[inline]
    pub fn with_facet(mut self, field: impl Into<String>) -> Self {
        self.facets.push(field.into());
        self
    }

    #[inline]
    pub fn with_date_facet(mut self, field: impl Into<String>, facet: DateFacet) -> Self {
        self.date_facets.insert(field.into(), facet);
        self
    }

    #[inline]
    pub fn with_query_facet(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_facets.push((field.into(), value.into()));
        self
    }

    #[inline]
    pub fn with_narrow_query(mut self, fragment: impl Into<String>) -> Self {
        self.narrow_queries.insert(fragment.into());
        self
    }

    #[inline]
    pub fn with_spelling_query(mut self, spelling: impl Into<String>) -> Self {
        self.spelling_query = Some(spelling.into());
        self
    }

    #[inline]
    pub fn with_limit_to_registered(mut self, limit: bool) -> Self {
        self.limit_to_registered = Some(limit);
        self
    }

    /// Solr `sort` value: `-field` sorts descending, anything else ascending.
    pub fn sort_by(&self) -> Option<String> {
        if self.order_by.is_empty() {
            return None;
        }
        let clauses: Vec<String> = self
            .order_by
            .iter()
            .map(|field| match field.strip_prefix('-') {
                Some(desc) => format!("{desc} desc"),
                None => format!("{field} asc"),
            })
            .collect();
        Some(clauses.join(", "))
    }

    /// Number of rows requested, when an end offset is set.
    pub fn rows(&self) -> Option<u64> {
        self.end_offset.map(|end| end.saturating_sub(self.start_offset))
    }

    /// Execute against `backend`.
    pub async fn run(&self, backend: &SolrGroupBackend) -> Result<GroupedResponse> {
        backend.search(self).await
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::group::GroupNode;

    #[test]
    fn empty_tree_never_inserts_a_fragment() {
        let mut query = GroupQuery::new("title:Chef");
        query.add_group_query(&GroupTree::default(), false, None);
        query.add_group_query(&GroupTree::default(), true, Some("tagged"));
        assert!(query.group_queries().is_empty());
    }

    #[test]
    fn identical_trees_collapse_to_one_fragment() {
        let build = || GroupTree::and([GroupNode::term("city", "Boise"), GroupNode::term("state", "Idaho")]);
        let mut query = GroupQuery::new("title:Chef");
        query.add_group_query(&build(), false, None);
        query.add_group_query(&build(), false, None);
        assert_eq!(query.group_queries().len(), 1);
        assert!(query.group_queries().contains("(city:Boise AND state:Idaho)"));
    }

    #[test]
    fn tagged_and_untagged_fragments_are_distinct() {
        let tree = GroupTree::term("city", "Boise");
        let query = GroupQuery::new("*:*")
            .group_query(&tree, false, None)
            .group_query(&tree, false, Some("boise"));
        assert_eq!(query.group_queries().len(), 2);
    }

    #[test]
    fn sort_by_maps_prefix_to_direction() {
        let query = GroupQuery::new("q").with_order_by(["-date_new", "title"]);
        assert_eq!(query.sort_by().as_deref(), Some("date_new desc, title asc"));
        assert_eq!(GroupQuery::new("q").sort_by(), None);
    }

    #[test]
    fn rows_is_end_minus_start() {
        assert_eq!(GroupQuery::new("q").with_offsets(10, Some(30)).rows(), Some(20));
        assert_eq!(GroupQuery::new("q").with_offsets(10, None).rows(), None);
        assert_eq!(GroupQuery::new("q").with_offsets(10, Some(5)).rows(), Some(0));
    }

    #[test]
    fn date_facet_gap_pluralises() {
        let start = Utc.with_ymd_and_hms(2011, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2011, 2, 1, 0, 0, 0).unwrap();
        let single = DateFacet {
            start_date: start,
            end_date: end,
            gap_by: GapUnit::Day,
            gap_amount: 1,
        };
        assert_eq!(single.gap(), "+1DAY/DAY");
        let several = DateFacet {
            gap_by: GapUnit::Month,
            gap_amount: 3,
            ..single
        };
        assert_eq!(several.gap(), "+3MONTHS/MONTH");
    }
}
