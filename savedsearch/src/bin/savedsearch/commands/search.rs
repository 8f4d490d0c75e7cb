use anyhow::{Result, bail};
use clap::Args;
use comfy_table::Cell;
use savedsearch::{
    GroupNode, GroupQuery, GroupTree, GroupedResponse,
    location::{LocationChoice, locations_from_facets, location_facet_query},
};
use serde::Serialize;

use crate::context::CliContext;
use crate::examples::ExampleGroup;
use crate::output::{OutputManager, TableDisplay};

pub const SEARCH_EXAMPLES: &[ExampleGroup] = &[
    ExampleGroup {
        title: "Grouped Search",
        commands: &[
            "savedsearch search 'title:Chef' --group 'city=Boise' --group 'city=Reno'",
            "savedsearch search 'title:Chef' --group 'state=Idaho;state=Oregon' --or --tag northwest",
        ],
    },
    ExampleGroup {
        title: "Inspect The Request",
        commands: &["savedsearch search 'title:Chef' --group 'city=Boise' --sort -date_new --rows 5 --dry-run"],
    },
];

pub const LOCATION_EXAMPLES: &[ExampleGroup] = &[ExampleGroup {
    title: "Location Choices",
    commands: &[
        "savedsearch locations",
        "savedsearch --output json locations",
    ],
}];

/// Group and result options shared by `search` and `saved run`
#[derive(Args, Clone, Default)]
pub struct GroupArgs {
    /// Group fragment as `field=value;field=value`; repeat for several groups
    #[arg(long = "group", value_name = "TERMS")]
    pub groups: Vec<String>,

    /// Join the terms of each group with OR instead of AND
    #[arg(long)]
    pub or: bool,

    /// Tag the group fragments for facet exclusion
    #[arg(long)]
    pub tag: Option<String>,

    /// Sort field, `-field` for descending; repeat for several
    #[arg(long)]
    pub sort: Vec<String>,

    #[arg(long, default_value_t = 0)]
    pub start: u64,

    #[arg(long)]
    pub rows: Option<u64>,

    #[arg(long)]
    pub highlight: bool,

    /// Facet field; repeat for several
    #[arg(long)]
    pub facet: Vec<String>,

    /// Filter query applied to every group
    #[arg(long)]
    pub narrow: Vec<String>,

    /// Print the Solr parameters instead of sending them
    #[arg(long)]
    pub dry_run: bool,
}

impl GroupArgs {
    /// Apply the options to `query`.
    pub fn apply(&self, mut query: GroupQuery) -> Result<GroupQuery> {
        for spec in &self.groups {
            query.add_group_query(&parse_group(spec)?, self.or, self.tag.as_deref());
        }
        query = query
            .with_order_by(self.sort.iter().cloned())
            .with_offsets(self.start, self.rows.map(|rows| self.start.saturating_add(rows)))
            .with_highlight(self.highlight);
        for field in &self.facet {
            query = query.with_facet(field.clone());
        }
        for fragment in &self.narrow {
            query = query.with_narrow_query(fragment.clone());
        }
        Ok(query)
    }
}

#[derive(Args)]
pub struct SearchArgs {
    /// Main Solr query string
    pub query: String,

    #[command(flatten)]
    pub options: GroupArgs,
}

/// `city=Boise;state=Idaho` into a tree of terms.
pub fn parse_group(spec: &str) -> Result<GroupTree> {
    let mut terms = Vec::new();
    for pair in spec.split(';').map(str::trim).filter(|pair| !pair.is_empty()) {
        let Some((field, value)) = pair.split_once('=') else {
            bail!("invalid group term '{pair}', expected field=value");
        };
        if field.trim().is_empty() {
            bail!("invalid group term '{pair}', field is empty");
        }
        terms.push(GroupNode::term(field.trim(), value.trim()));
    }
    if terms.is_empty() {
        bail!("group '{spec}' has no terms");
    }
    Ok(GroupTree::and(terms))
}

#[derive(Serialize)]
struct Params(Vec<(String, String)>);

impl TableDisplay for Params {
    fn to_table(&self, output: &OutputManager) -> comfy_table::Table {
        let mut table = output.table(&["Parameter", "Value"]);
        for (key, value) in &self.0 {
            table.add_row(vec![Cell::new(key), Cell::new(value)]);
        }
        table
    }

    fn to_compact(&self) -> String {
        self.0
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join("&")
    }
}

impl TableDisplay for GroupedResponse {
    fn to_table(&self, output: &OutputManager) -> comfy_table::Table {
        let mut table = output.table(&["Group", "Hits", "Type", "Id", "Score", "Title"]);
        for group in &self.groups {
            if group.results.is_empty() {
                table.add_row(vec![
                    Cell::new(&group.group),
                    Cell::new(group.hits),
                    Cell::new(""),
                    Cell::new(""),
                    Cell::new(""),
                    Cell::new(""),
                ]);
            }
            for hit in &group.results {
                let title = hit.field("title").map(ToString::to_string).unwrap_or_default();
                table.add_row(vec![
                    Cell::new(&group.group),
                    Cell::new(group.hits),
                    Cell::new(format!("{}.{}", hit.app_label, hit.model_name)),
                    Cell::new(&hit.pk),
                    Cell::new(format!("{:.3}", hit.score)),
                    Cell::new(title),
                ]);
            }
        }
        table
    }

    fn to_compact(&self) -> String {
        let groups: Vec<String> = self
            .groups
            .iter()
            .map(|group| format!("{}={}", group.group, group.hits))
            .collect();
        format!("hits={} {}", self.hits, groups.join(" "))
    }
}

#[derive(Serialize)]
struct LocationList(Vec<LocationChoice>);

impl TableDisplay for LocationList {
    fn to_table(&self, output: &OutputManager) -> comfy_table::Table {
        let mut table = output.table(&["Location", "City", "State", "Country", "Jobs"]);
        for choice in &self.0 {
            table.add_row(vec![
                Cell::new(choice.label()),
                Cell::new(choice.part("city").unwrap_or_default()),
                Cell::new(choice.part("state").unwrap_or_default()),
                Cell::new(choice.part("country").unwrap_or_default()),
                Cell::new(choice.count),
            ]);
        }
        table
    }

    fn to_compact(&self) -> String {
        format!("Count: {}", self.0.len())
    }
}

/// Print the request parameters or run the search and print the groups.
pub async fn run_grouped(ctx: &CliContext, query: GroupQuery, dry_run: bool, output: &OutputManager) -> Result<()> {
    let backend = ctx.backend()?;
    if dry_run {
        output.verbose(&format!("POST {}", backend.select_url()));
        return output.display(&Params(backend.request_params(&query)));
    }

    output.verbose(&format!("q={}", query.query_string));
    let response = query.run(&backend).await?;
    if response.is_silenced_failure() {
        output.warning("Solr query failed; see the log for details.");
    }
    output.display(&response)?;
    output.key_value("Total hits", &response.hits.to_string());
    Ok(())
}

pub async fn handle_search(args: SearchArgs, ctx: &CliContext, output: &OutputManager) -> Result<()> {
    let query = args.options.apply(GroupQuery::new(args.query))?;
    run_grouped(ctx, query, args.options.dry_run, output).await
}

pub async fn handle_locations(ctx: &CliContext, output: &OutputManager) -> Result<()> {
    let backend = ctx.backend()?;
    let response = location_facet_query().with_limit_to_registered(false).run(&backend).await?;
    let choices = response
        .groups
        .first()
        .and_then(|group| group.facets.as_ref())
        .map(locations_from_facets)
        .unwrap_or_default();
    if choices.is_empty() {
        output.info("No locations found.");
        return Ok(());
    }
    output.display(&LocationList(choices))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_group_terms() {
        let tree = parse_group("city=Boise; state = Idaho").unwrap();
        assert_eq!(tree.render(), "(city:Boise AND state:Idaho)");
    }

    #[test]
    fn rejects_malformed_groups() {
        assert!(parse_group("").is_err());
        assert!(parse_group("Boise").is_err());
        assert!(parse_group("=Boise").is_err());
    }

    #[test]
    fn options_shape_the_query() {
        let options = GroupArgs {
            groups: vec!["state=Idaho;state=Oregon".into()],
            or: true,
            tag: Some("nw".into()),
            sort: vec!["-date_new".into()],
            start: 10,
            rows: Some(5),
            ..GroupArgs::default()
        };
        let query = options.apply(GroupQuery::new("title:Chef")).unwrap();
        assert!(query.group_queries().contains("{!tag=\"nw\"} (state:Idaho OR state:Oregon)"));
        assert_eq!(query.rows(), Some(5));
        assert_eq!(query.sort_by().as_deref(), Some("date_new desc"));
    }

    #[test]
    fn huge_offsets_clamp_instead_of_wrapping() {
        let options = GroupArgs {
            groups: vec!["city=Boise".into()],
            start: u64::MAX,
            rows: Some(5),
            ..GroupArgs::default()
        };
        let query = options.apply(GroupQuery::new("title:Chef")).unwrap();
        assert_eq!(query.end_offset, Some(u64::MAX));
        assert_eq!(query.rows(), Some(0));
    }
}
