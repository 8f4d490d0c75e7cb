//! Location choices derived from the `full_loc` facet.
//!
//! Indexed jobs carry a composite `full_loc` value such as
//! `city::Topeka@@state::Kansas@@country::United States@@location::Topeka, KS`.
//! Faceting on it gives every distinct location with its job count, which is
//! what an editor offers when picking the locations of a saved search.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::{
    backend::FacetCounts,
    group::{GroupNode, GroupQuery, GroupTree},
};

pub const FULL_LOCATION_FACET: &str = "full_loc";

const PART_SEPARATOR: &str = "@@";
const KEY_VALUE_SEPARATOR: &str = "::";
const MATCH_ALL: &str = "*:*";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocationChoice {
    pub parts: BTreeMap<String, String>,
    pub count: u64,
}

impl LocationChoice {
    pub fn part(&self, name: &str) -> Option<&str> {
        self.parts.get(name).map(String::as_str)
    }

    /// The display label, `location` when present, else `city, state`.
    pub fn label(&self) -> String {
        if let Some(location) = self.part("location") {
            return location.to_string();
        }
        [self.part("city"), self.part("state")]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Split one `full_loc` value into its named parts. Segments without `::`
/// are ignored; a repeated name keeps the last value.
///
/// ```
/// use savedsearch::location::parse_location_facet;
///
/// let parts = parse_location_facet("city::Topeka@@state::Kansas");
/// assert_eq!(parts.get("city").map(String::as_str), Some("Topeka"));
/// assert_eq!(parts.get("state").map(String::as_str), Some("Kansas"));
/// ```
pub fn parse_location_facet(value: &str) -> BTreeMap<String, String> {
    value
        .split(PART_SEPARATOR)
        .filter_map(|segment| {
            let (name, part) = segment.split_once(KEY_VALUE_SEPARATOR)?;
            let name = name.trim();
            (!name.is_empty()).then(|| (name.to_string(), part.trim().to_string()))
        })
        .collect()
}

/// Every location of the `full_loc` facet, in facet order.
pub fn locations_from_facets(facets: &FacetCounts) -> Vec<LocationChoice> {
    facets
        .field(FULL_LOCATION_FACET)
        .iter()
        .map(|(value, count)| LocationChoice {
            parts: parse_location_facet(value),
            count: *count,
        })
        .filter(|choice| !choice.parts.is_empty())
        .collect()
}

/// A query returning no rows, only the `full_loc` facet over all documents.
pub fn location_facet_query() -> GroupQuery {
    GroupQuery::new(MATCH_ALL)
        .group_query(&GroupTree::and([GroupNode::raw(MATCH_ALL)]), false, None)
        .with_facet(FULL_LOCATION_FACET)
        .with_offsets(0, Some(0))
}
