//! Grouped Solr responses, normalised into hits per group.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value as JsonValue};

use crate::{
    config::SolrSettings,
    errors::{Result, SearchError},
    registry::DocumentTypeRegistry,
    value::FieldValue,
};

const SCORE_FIELD: &str = "score";

/// One document that matched a group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub app_label: String,
    pub model_name: String,
    pub pk: String,
    pub score: f64,
    pub fields: BTreeMap<String, FieldValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highlighted: Option<BTreeMap<String, Vec<String>>>,
}

impl SearchHit {
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }
}

/// Facet counts shared by every group of a response.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FacetCounts {
    /// Field facets as `(value, count)` pairs, in Solr's order.
    pub fields: BTreeMap<String, Vec<(String, u64)>>,
    pub dates: BTreeMap<String, JsonValue>,
    pub queries: BTreeMap<String, u64>,
}

impl FacetCounts {
    pub fn field(&self, name: &str) -> &[(String, u64)] {
        self.fields.get(name).map(Vec::as_slice).unwrap_or_default()
    }
}

/// Results for one group fragment.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GroupedResult {
    pub group: String,
    pub results: Vec<SearchHit>,
    pub hits: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matches: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub facets: Option<FacetCounts>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spelling_suggestion: Option<String>,
}

impl GroupedResult {
    /// The placeholder returned when a failed search is silenced.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// All groups of one search, with the summed hit count.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GroupedResponse {
    pub groups: Vec<GroupedResult>,
    pub hits: u64,
}

impl GroupedResponse {
    pub fn from_groups(groups: Vec<GroupedResult>) -> Self {
        let hits = groups.iter().map(|group| group.hits).sum();
        Self { groups, hits }
    }

    /// No groups at all; returned for an empty query string.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether this is the placeholder a silenced backend failure returns.
    pub fn is_silenced_failure(&self) -> bool {
        matches!(self.groups.as_slice(), [only] if *only == GroupedResult::empty())
    }

    pub fn group(&self, key: &str) -> Option<&GroupedResult> {
        self.groups.iter().find(|group| group.group == key)
    }
}

/// Normalise a decoded `/select` body.
pub(crate) fn normalise(
    body: &JsonValue,
    settings: &SolrSettings,
    registry: &DocumentTypeRegistry,
) -> Result<GroupedResponse> {
    if let Some(error) = body.get("error") {
        let status = error
            .get("code")
            .and_then(JsonValue::as_u64)
            .and_then(|code| u16::try_from(code).ok());
        let message = error
            .get("msg")
            .and_then(JsonValue::as_str)
            .unwrap_or("unknown Solr error");
        return Err(SearchError::protocol(status, message));
    }

    let grouped = body
        .get("grouped")
        .and_then(JsonValue::as_object)
        .ok_or_else(|| SearchError::protocol(None, "response has no grouped section"))?;

    let facets = body.get("facet_counts").map(facet_counts);
    let spelling_suggestion = if settings.include_spelling {
        spelling_suggestion(body)
    } else {
        None
    };
    let highlighting = body.get("highlighting").and_then(JsonValue::as_object);

    let groups = grouped
        .iter()
        .map(|(key, entry)| {
            let mut result = group_result(key, entry, settings, registry, highlighting);
            result.facets = facets.clone();
            result.spelling_suggestion = spelling_suggestion.clone();
            result
        })
        .collect();

    Ok(GroupedResponse::from_groups(groups))
}

fn group_result(
    key: &str,
    entry: &JsonValue,
    settings: &SolrSettings,
    registry: &DocumentTypeRegistry,
    highlighting: Option<&Map<String, JsonValue>>,
) -> GroupedResult {
    let doclist = entry.get("doclist");
    let mut hits = doclist
        .and_then(|list| list.get("numFound"))
        .and_then(JsonValue::as_u64)
        .unwrap_or(0);
    let docs = doclist
        .and_then(|list| list.get("docs"))
        .and_then(JsonValue::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let mut results = Vec::with_capacity(docs.len());
    for doc in docs {
        match search_hit(doc, settings, registry, highlighting) {
            Some(hit) => results.push(hit),
            None => hits = hits.saturating_sub(1),
        }
    }

    GroupedResult {
        group: key.to_string(),
        results,
        hits,
        matches: entry.get("matches").and_then(JsonValue::as_u64),
        facets: None,
        spelling_suggestion: None,
    }
}

fn search_hit(
    doc: &JsonValue,
    settings: &SolrSettings,
    registry: &DocumentTypeRegistry,
    highlighting: Option<&Map<String, JsonValue>>,
) -> Option<SearchHit> {
    let doc = doc.as_object()?;
    let content_type = doc.get(&settings.type_field).and_then(JsonValue::as_str)?;
    let doc_type = registry.get(content_type)?;
    let pk = doc.get(&settings.id_field).and_then(scalar_text)?;
    let score = doc.get(SCORE_FIELD).and_then(JsonValue::as_f64).unwrap_or(0.0);

    let fields = doc
        .iter()
        .filter(|(name, _)| {
            name.as_str() != settings.type_field && name.as_str() != settings.id_field && name.as_str() != SCORE_FIELD
        })
        .map(|(name, value)| (name.clone(), doc_type.convert(name, value)))
        .collect();

    let highlighted = doc
        .get(&settings.unique_key)
        .and_then(scalar_text)
        .and_then(|unique_key| highlighting?.get(&unique_key))
        .and_then(highlight_map);

    Some(SearchHit {
        app_label: doc_type.app_label().to_string(),
        model_name: doc_type.model_name().to_string(),
        pk,
        score,
        fields,
        highlighted,
    })
}

fn scalar_text(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(text) => Some(text.clone()),
        JsonValue::Number(number) => Some(number.to_string()),
        JsonValue::Array(items) if items.len() == 1 => scalar_text(&items[0]),
        _ => None,
    }
}

fn highlight_map(value: &JsonValue) -> Option<BTreeMap<String, Vec<String>>> {
    let snippets = value
        .as_object()?
        .iter()
        .map(|(field, fragments)| {
            let fragments = match fragments {
                JsonValue::Array(items) => items.iter().filter_map(JsonValue::as_str).map(str::to_string).collect(),
                JsonValue::String(single) => vec![single.clone()],
                _ => Vec::new(),
            };
            (field.clone(), fragments)
        })
        .collect();
    Some(snippets)
}

fn facet_counts(raw: &JsonValue) -> FacetCounts {
    let fields = raw
        .get("facet_fields")
        .and_then(JsonValue::as_object)
        .map(|fields| {
            fields
                .iter()
                .map(|(field, flat)| (field.clone(), facet_pairs(flat)))
                .collect()
        })
        .unwrap_or_default();

    let dates = raw
        .get("facet_dates")
        .and_then(JsonValue::as_object)
        .map(|dates| dates.iter().map(|(field, counts)| (field.clone(), counts.clone())).collect())
        .unwrap_or_default();

    let queries = raw
        .get("facet_queries")
        .and_then(JsonValue::as_object)
        .map(|queries| {
            queries
                .iter()
                .filter_map(|(query, count)| Some((query.clone(), count.as_u64()?)))
                .collect()
        })
        .unwrap_or_default();

    FacetCounts { fields, dates, queries }
}

/// `["Boise", 3, "Reno", 1]` becomes `[("Boise", 3), ("Reno", 1)]`; a trailing
/// unpaired value is dropped.
fn facet_pairs(flat: &JsonValue) -> Vec<(String, u64)> {
    let Some(items) = flat.as_array() else {
        return Vec::new();
    };
    items
        .chunks_exact(2)
        .filter_map(|pair| {
            let value = scalar_text(&pair[0])?;
            let count = pair[1].as_u64()?;
            Some((value, count))
        })
        .collect()
}

/// The collated suggestion is the last entry of `spellcheck.suggestions`.
fn spelling_suggestion(body: &JsonValue) -> Option<String> {
    let last = body
        .get("spellcheck")?
        .get("suggestions")?
        .as_array()?
        .last()?;
    match last {
        JsonValue::String(text) => Some(text.clone()),
        JsonValue::Object(collation) => collation
            .get("collationQuery")
            .and_then(JsonValue::as_str)
            .map(str::to_string),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::registry::DocumentType;

    fn registry() -> DocumentTypeRegistry {
        DocumentTypeRegistry::new().with_type(DocumentType::new("seo", "joblisting"))
    }

    fn doc(id: &str, content_type: &str) -> JsonValue {
        json!({
            "id": format!("{content_type}.{id}"),
            "django_ct": content_type,
            "django_id": id,
            "score": 1.5,
            "title": "Line Cook",
            "buid": ["12"],
        })
    }

    #[test]
    fn groups_keep_solr_order_and_sum_hits() {
        let body = json!({
            "grouped": {
                "city:Reno": {"matches": 4, "doclist": {"numFound": 1, "docs": [doc("2", "seo.joblisting")]}},
                "city:Boise": {"matches": 4, "doclist": {"numFound": 3, "docs": [doc("1", "seo.joblisting")]}},
            }
        });
        let response = normalise(&body, &SolrSettings::default(), &registry()).unwrap();
        let keys: Vec<&str> = response.groups.iter().map(|group| group.group.as_str()).collect();
        assert_eq!(keys, vec!["city:Reno", "city:Boise"]);
        assert_eq!(response.hits, 4);
        assert_eq!(response.groups[0].matches, Some(4));
    }

    #[test]
    fn hits_strip_bookkeeping_fields() {
        let body = json!({
            "grouped": {"city:Boise": {"doclist": {"numFound": 1, "docs": [doc("1", "seo.joblisting")]}}}
        });
        let response = normalise(&body, &SolrSettings::default(), &registry()).unwrap();
        let hit = &response.groups[0].results[0];
        assert_eq!(hit.app_label, "seo");
        assert_eq!(hit.model_name, "joblisting");
        assert_eq!(hit.pk, "1");
        assert_eq!(hit.score, 1.5);
        assert_eq!(hit.field("buid"), Some(&FieldValue::Int(12)));
        assert!(hit.field("django_ct").is_none());
        assert!(hit.field("django_id").is_none());
        assert!(hit.field("score").is_none());
        assert_eq!(hit.field("id"), Some(&FieldValue::Text("seo.joblisting.1".into())));
    }

    #[test]
    fn unregistered_and_malformed_documents_are_dropped() {
        let body = json!({
            "grouped": {"city:Boise": {"doclist": {"numFound": 3, "docs": [
                doc("1", "seo.joblisting"),
                doc("2", "seo.company"),
                {"django_ct": "broken", "django_id": "3"},
            ]}}}
        });
        let response = normalise(&body, &SolrSettings::default(), &registry()).unwrap();
        let group = &response.groups[0];
        assert_eq!(group.results.len(), 1);
        assert_eq!(group.hits, 1);
    }

    #[test]
    fn hit_count_never_underflows() {
        let body = json!({
            "grouped": {"city:Boise": {"doclist": {"numFound": 0, "docs": [doc("2", "seo.company")]}}}
        });
        let response = normalise(&body, &SolrSettings::default(), &registry()).unwrap();
        assert_eq!(response.groups[0].hits, 0);
    }

    #[test]
    fn missing_doclist_defaults_to_empty() {
        let body = json!({"grouped": {"city:Boise": {}}});
        let response = normalise(&body, &SolrSettings::default(), &registry()).unwrap();
        assert_eq!(response.groups[0].hits, 0);
        assert!(response.groups[0].is_empty());
        assert_eq!(response.groups[0].matches, None);
    }

    #[test]
    fn highlighting_attaches_by_unique_key() {
        let body = json!({
            "grouped": {"city:Boise": {"doclist": {"numFound": 2, "docs": [
                doc("1", "seo.joblisting"),
                doc("2", "seo.joblisting"),
            ]}}},
            "highlighting": {"seo.joblisting.1": {"title": ["Line <em>Cook</em>"]}}
        });
        let response = normalise(&body, &SolrSettings::default(), &registry()).unwrap();
        let results = &response.groups[0].results;
        assert_eq!(
            results[0].highlighted.as_ref().and_then(|map| map.get("title")),
            Some(&vec!["Line <em>Cook</em>".to_string()])
        );
        assert!(results[1].highlighted.is_none());
    }

    #[test]
    fn facet_fields_become_pairs() {
        let body = json!({
            "grouped": {"city:Boise": {"doclist": {"numFound": 0, "docs": []}}},
            "facet_counts": {
                "facet_fields": {"city": ["Boise", 3, "Reno", 1, "Dangling"]},
                "facet_queries": {"buid:12": 7},
                "facet_dates": {"date_new": {"2011-01-01T00:00:00Z": 2}},
            }
        });
        let response = normalise(&body, &SolrSettings::default(), &registry()).unwrap();
        let facets = response.groups[0].facets.as_ref().unwrap();
        assert_eq!(facets.field("city"), &[("Boise".to_string(), 3), ("Reno".to_string(), 1)]);
        assert!(facets.field("state").is_empty());
        assert_eq!(facets.queries.get("buid:12"), Some(&7));
        assert!(facets.dates.contains_key("date_new"));
    }

    #[test]
    fn spelling_suggestion_needs_spelling_enabled() {
        let body = json!({
            "grouped": {"q": {"doclist": {"numFound": 0, "docs": []}}},
            "spellcheck": {"suggestions": ["chfe", {"numFound": 1}, "collation", "title:chef"]}
        });
        let response = normalise(&body, &SolrSettings::default(), &registry()).unwrap();
        assert_eq!(response.groups[0].spelling_suggestion, None);

        let settings = SolrSettings {
            include_spelling: true,
            ..SolrSettings::default()
        };
        let response = normalise(&body, &settings, &registry()).unwrap();
        assert_eq!(response.groups[0].spelling_suggestion.as_deref(), Some("title:chef"));
    }

    #[test]
    fn solr_error_object_is_a_protocol_error() {
        let body = json!({"error": {"code": 400, "msg": "undefined field foo"}});
        let err = normalise(&body, &SolrSettings::default(), &registry()).unwrap_err();
        match err {
            SearchError::BackendProtocol { status, message } => {
                assert_eq!(status, Some(400));
                assert!(message.contains("undefined field"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn missing_grouped_section_is_a_protocol_error() {
        let err = normalise(&json!({"response": {}}), &SolrSettings::default(), &registry()).unwrap_err();
        assert!(err.is_backend_failure());
    }
}
