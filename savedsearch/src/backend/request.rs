//! Outbound Solr parameters for a grouped search.

use crate::{config::SolrSettings, group::GroupQuery, registry::DocumentTypeRegistry};

const SOLR_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";
const DEFAULT_FIELD_LIST: &str = "* score";
const GROUP_FORMAT: &str = "simple";

/// Form parameters for `/select`, in a stable order. Multi-valued keys repeat.
pub fn build_params(
    query: &GroupQuery,
    settings: &SolrSettings,
    registry: &DocumentTypeRegistry,
) -> Vec<(String, String)> {
    let mut params = Params::default();

    params.push("q", &query.query_string);
    if query.fields.is_empty() {
        params.push("fl", DEFAULT_FIELD_LIST);
    } else {
        params.push("fl", query.fields.join(","));
    }

    params.push("group", "true");
    params.push("group.ngroups", "true");
    params.push("group.format", GROUP_FORMAT);
    for fragment in query.group_queries() {
        params.push("group.query", fragment);
    }

    if let Some(sort) = query.sort_by() {
        params.push("sort", sort);
    }
    params.push("start", query.start_offset.to_string());
    if let Some(rows) = query.rows() {
        params.push("rows", rows.to_string());
    }

    if query.highlight {
        params.push("hl", "true");
        params.push("hl.fragsize", settings.highlight_fragsize.to_string());
    }

    if settings.include_spelling {
        params.push("spellcheck", "true");
        params.push("spellcheck.collate", "true");
        params.push("spellcheck.count", "1");
        if let Some(spelling) = query.spelling_query.as_deref().filter(|s| !s.is_empty()) {
            params.push("spellcheck.q", spelling);
        }
    }

    let wants_facets = !query.facets.is_empty() || !query.date_facets.is_empty() || !query.query_facets.is_empty();
    if wants_facets {
        params.push("facet", "on");
    }
    for field in &query.facets {
        params.push("facet.field", field);
    }

    if !query.date_facets.is_empty() {
        for field in query.date_facets.keys() {
            params.push("facet.date", field);
        }
        params.push("facet.date.other", "none");
        for (field, facet) in &query.date_facets {
            params.push(
                format!("f.{field}.facet.date.start"),
                facet.start_date.format(SOLR_DATE_FORMAT).to_string(),
            );
            params.push(
                format!("f.{field}.facet.date.end"),
                facet.end_date.format(SOLR_DATE_FORMAT).to_string(),
            );
            params.push(format!("f.{field}.facet.date.gap"), facet.gap());
        }
    }

    for (field, value) in &query.query_facets {
        params.push("facet.query", format!("{field}:{value}"));
    }

    let mut narrow_queries = query.narrow_queries.clone();
    let limit_to_registered = query.limit_to_registered.unwrap_or(settings.limit_to_registered_models);
    if limit_to_registered {
        let models = registry.models_list();
        if !models.is_empty() {
            narrow_queries.insert(format!("{}:({})", settings.type_field, models.join(" OR ")));
        }
    }
    for fragment in &narrow_queries {
        params.push("fq", fragment);
    }

    params.push("wt", "json");
    params.0
}

#[derive(Default)]
struct Params(Vec<(String, String)>);

impl Params {
    fn push(&mut self, key: impl Into<String>, value: impl AsRef<str>) {
        self.0.push((key.into(), value.as_ref().to_string()));
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::{
        group::{DateFacet, GapUnit, GroupTree},
        registry::DocumentType,
    };

    fn values<'a>(params: &'a [(String, String)], key: &str) -> Vec<&'a str> {
        params
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    fn registry() -> DocumentTypeRegistry {
        DocumentTypeRegistry::new().with_type(DocumentType::new("seo", "joblisting"))
    }

    fn grouped(query: &str) -> GroupQuery {
        GroupQuery::new(query)
            .group_query(&GroupTree::term("city", "Boise"), false, None)
            .group_query(&GroupTree::term("city", "Reno"), false, None)
    }

    #[test]
    fn grouping_parameters_are_always_sent() {
        let params = build_params(&grouped("title:Chef"), &SolrSettings::default(), &registry());
        assert_eq!(values(&params, "q"), vec!["title:Chef"]);
        assert_eq!(values(&params, "fl"), vec!["* score"]);
        assert_eq!(values(&params, "group"), vec!["true"]);
        assert_eq!(values(&params, "group.ngroups"), vec!["true"]);
        assert_eq!(values(&params, "group.format"), vec!["simple"]);
        assert_eq!(values(&params, "group.query"), vec!["city:Boise", "city:Reno"]);
        assert_eq!(values(&params, "start"), vec!["0"]);
        assert_eq!(values(&params, "wt"), vec!["json"]);
    }

    #[test]
    fn optional_parameters_are_omitted_by_default() {
        let params = build_params(&grouped("title:Chef"), &SolrSettings::default(), &registry());
        for key in ["sort", "rows", "hl", "hl.fragsize", "spellcheck", "facet", "facet.field", "facet.query"] {
            assert!(values(&params, key).is_empty(), "{key} should be omitted");
        }
    }

    #[test]
    fn sort_pagination_and_highlight_are_forwarded() {
        let query = grouped("title:Chef")
            .with_order_by(["-date_new"])
            .with_offsets(20, Some(30))
            .with_highlight(true)
            .with_fields(["title", "city"]);
        let params = build_params(&query, &SolrSettings::default(), &registry());
        assert_eq!(values(&params, "sort"), vec!["date_new desc"]);
        assert_eq!(values(&params, "start"), vec!["20"]);
        assert_eq!(values(&params, "rows"), vec!["10"]);
        assert_eq!(values(&params, "hl"), vec!["true"]);
        assert_eq!(values(&params, "hl.fragsize"), vec!["200"]);
        assert_eq!(values(&params, "fl"), vec!["title,city"]);
    }

    #[test]
    fn spelling_follows_settings() {
        let query = grouped("title:Chfe").with_spelling_query("Chfe");
        let params = build_params(&query, &SolrSettings::default(), &registry());
        assert!(values(&params, "spellcheck").is_empty());

        let settings = SolrSettings {
            include_spelling: true,
            ..SolrSettings::default()
        };
        let params = build_params(&query, &settings, &registry());
        assert_eq!(values(&params, "spellcheck"), vec!["true"]);
        assert_eq!(values(&params, "spellcheck.collate"), vec!["true"]);
        assert_eq!(values(&params, "spellcheck.count"), vec!["1"]);
        assert_eq!(values(&params, "spellcheck.q"), vec!["Chfe"]);
    }

    #[test]
    fn facets_are_forwarded() {
        let start = Utc.with_ymd_and_hms(2011, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2011, 12, 31, 0, 0, 0).unwrap();
        let query = grouped("title:Chef")
            .with_facet("city")
            .with_facet("state")
            .with_query_facet("buid", "12")
            .with_date_facet(
                "date_new",
                DateFacet {
                    start_date: start,
                    end_date: end,
                    gap_by: GapUnit::Month,
                    gap_amount: 1,
                },
            );
        let params = build_params(&query, &SolrSettings::default(), &registry());
        assert_eq!(values(&params, "facet"), vec!["on"]);
        assert_eq!(values(&params, "facet.field"), vec!["city", "state"]);
        assert_eq!(values(&params, "facet.query"), vec!["buid:12"]);
        assert_eq!(values(&params, "facet.date"), vec!["date_new"]);
        assert_eq!(values(&params, "facet.date.other"), vec!["none"]);
        assert_eq!(values(&params, "f.date_new.facet.date.start"), vec!["2011-01-01T00:00:00Z"]);
        assert_eq!(values(&params, "f.date_new.facet.date.end"), vec!["2011-12-31T00:00:00Z"]);
        assert_eq!(values(&params, "f.date_new.facet.date.gap"), vec!["+1MONTH/MONTH"]);
    }

    #[test]
    fn registered_types_narrow_the_search() {
        let registry = registry().with_type(DocumentType::new("seo", "company"));
        let query = grouped("title:Chef").with_narrow_query("buid:12");
        let params = build_params(&query, &SolrSettings::default(), &registry);
        assert_eq!(
            values(&params, "fq"),
            vec!["buid:12", "django_ct:(seo.company OR seo.joblisting)"]
        );
    }

    #[test]
    fn narrowing_can_be_disabled() {
        let query = grouped("title:Chef").with_limit_to_registered(false);
        let params = build_params(&query, &SolrSettings::default(), &registry());
        assert!(values(&params, "fq").is_empty());

        let settings = SolrSettings {
            limit_to_registered_models: false,
            ..SolrSettings::default()
        };
        let params = build_params(&grouped("title:Chef"), &settings, &registry());
        assert!(values(&params, "fq").is_empty());
    }

    #[test]
    fn empty_registry_adds_no_type_filter() {
        let params = build_params(&grouped("title:Chef"), &SolrSettings::default(), &DocumentTypeRegistry::new());
        assert!(values(&params, "fq").is_empty());
    }
}
