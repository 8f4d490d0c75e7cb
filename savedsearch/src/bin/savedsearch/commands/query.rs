use anyhow::Result;
use clap::Args;
use comfy_table::Cell;
use savedsearch::{
    compose, escape,
    query::{BUSINESS_UNIT, CITY, COUNTRY, KEYWORD, LOCATION, SearchField, STATE, TITLE, build_clause},
};
use serde::Serialize;

use crate::examples::ExampleGroup;
use crate::output::{OutputManager, TableDisplay};

pub const ESCAPE_EXAMPLES: &[ExampleGroup] = &[ExampleGroup {
    title: "Escape Tokens",
    commands: &[
        "savedsearch escape 'C++ Dev!'          # -> C Dev",
        "savedsearch escape 'Sr: Chef' 'AT&T'   # one line per token",
    ],
}];

pub const QUERY_EXAMPLES: &[ExampleGroup] = &[
    ExampleGroup {
        title: "Build Queries",
        commands: &[
            "savedsearch query --title 'Chef,Line Cook' --location Boise",
            "savedsearch query --keyword 'RN#@#nurse' --keyword icu --buid 12 --buid 34",
        ],
    },
    ExampleGroup {
        title: "Inspect Clauses",
        commands: &["savedsearch query --title Chef --state Idaho --clauses"],
    },
];

#[derive(Args)]
pub struct EscapeArgs {
    /// Raw tokens to escape
    #[arg(required = true)]
    pub tokens: Vec<String>,
}

#[derive(Args)]
pub struct QueryArgs {
    /// Comma-separated titles (all must match)
    #[arg(long)]
    pub title: Option<String>,

    /// Keyword; repeat for several (all must match)
    #[arg(long)]
    pub keyword: Vec<String>,

    /// Location term; repeat for several (any may match)
    #[arg(long)]
    pub location: Vec<String>,

    #[arg(long)]
    pub country: Vec<String>,

    #[arg(long)]
    pub state: Vec<String>,

    #[arg(long)]
    pub city: Vec<String>,

    /// Business unit id; repeat for several (any may match)
    #[arg(long)]
    pub buid: Vec<u32>,

    /// Show each field clause instead of the composed query
    #[arg(long)]
    pub clauses: bool,
}

#[derive(Serialize)]
struct ClauseRow {
    field: &'static str,
    clause: String,
}

#[derive(Serialize)]
struct ClauseList(Vec<ClauseRow>);

impl TableDisplay for ClauseList {
    fn to_table(&self, output: &OutputManager) -> comfy_table::Table {
        let mut table = output.table(&["Field", "Clause"]);
        for row in &self.0 {
            table.add_row(vec![Cell::new(row.field), Cell::new(&row.clause)]);
        }
        table
    }

    fn to_compact(&self) -> String {
        self.0
            .iter()
            .map(|row| format!("{}={}", row.field, row.clause))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

pub fn handle_escape(args: EscapeArgs, output: &OutputManager) -> Result<()> {
    for token in &args.tokens {
        output.value(&escape(token))?;
    }
    Ok(())
}

pub fn handle_query(args: QueryArgs, output: &OutputManager) -> Result<()> {
    let business_units = args.buid.iter().map(ToString::to_string).collect::<Vec<_>>();
    let fields: [(&SearchField, String); 7] = [
        (&TITLE, args.title.clone().unwrap_or_default()),
        (&KEYWORD, args.keyword.join(",")),
        (&LOCATION, args.location.join(",")),
        (&COUNTRY, args.country.join(",")),
        (&STATE, args.state.join(",")),
        (&CITY, args.city.join(",")),
        (&BUSINESS_UNIT, business_units.join(",")),
    ];

    let rows: Vec<ClauseRow> = fields
        .iter()
        .map(|(field, raw)| ClauseRow {
            field: field.name,
            clause: build_clause(field, raw),
        })
        .filter(|row| !row.clause.is_empty())
        .collect();

    if args.clauses {
        return output.display(&ClauseList(rows));
    }

    let query = compose(rows.iter().map(|row| row.clause.as_str()));
    if query.is_empty() {
        output.warning("No usable criteria; the query is empty.");
    }
    output.value(&query)
}
