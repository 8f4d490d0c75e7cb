use anyhow::{Context, Result, anyhow, bail};
use clap::{Args, Subcommand};
use comfy_table::Cell;
use savedsearch::{SavedSearch, SearchError, SiteScope};

use super::search::{GroupArgs, run_grouped};
use crate::context::CliContext;
use crate::examples::ExampleGroup;
use crate::output::{OutputManager, TableDisplay};

pub const EXAMPLES: &[ExampleGroup] = &[
    ExampleGroup {
        title: "Create And Update",
        commands: &[
            "savedsearch saved save 'Cooks in Boise' --title 'Chef,Line Cook' --location Boise --scope 7",
            "savedsearch saved save 'Nurses' --keyword 'RN#@#nurse' --site 'jobs.example.com=12,34'",
            "savedsearch saved save 'Nurses' --id <ID> --keyword icu   # update, slug is kept",
        ],
    },
    ExampleGroup {
        title: "Browse",
        commands: &[
            "savedsearch saved list --scope 7 --scope 9",
            "savedsearch saved show <ID>",
        ],
    },
    ExampleGroup {
        title: "Run",
        commands: &["savedsearch saved run <ID> --group 'city=Boise' --group 'city=Reno'"],
    },
];

#[derive(Subcommand)]
pub enum SavedCommands {
    /// Create or update a saved search
    #[command(name = "save")]
    Save(SaveArgs),

    /// Show one saved search
    #[command(name = "show")]
    Show { id: String },

    /// List saved searches, optionally only those of some scopes
    #[command(name = "list")]
    List {
        /// Scope id; repeat for several
        #[arg(long)]
        scope: Vec<String>,
    },

    /// Delete a saved search
    #[command(name = "delete")]
    Delete { id: String },

    /// Run a saved search as a grouped Solr search
    #[command(name = "run")]
    Run {
        id: String,

        #[command(flatten)]
        options: GroupArgs,
    },
}

#[derive(Args)]
pub struct SaveArgs {
    pub name: String,

    /// Existing id to update
    #[arg(long)]
    pub id: Option<String>,

    /// Comma-separated titles
    #[arg(long)]
    pub title: Option<String>,

    #[arg(long)]
    pub keyword: Vec<String>,

    #[arg(long)]
    pub location: Vec<String>,

    /// Site as `name=buid,buid`; repeat for several
    #[arg(long)]
    pub site: Vec<String>,

    /// Owning scope id
    #[arg(long)]
    pub scope: Option<String>,

    #[arg(long)]
    pub blurb: Option<String>,

    #[arg(long)]
    pub show_blurb: bool,

    #[arg(long)]
    pub show_production: bool,
}

/// `jobs.example.com=12,34` into a site scope.
pub fn parse_site(spec: &str) -> Result<SiteScope> {
    let (name, units) = spec.split_once('=').unwrap_or((spec, ""));
    let name = name.trim();
    if name.is_empty() {
        bail!("invalid site '{spec}', expected name=buid,buid");
    }
    let business_units = units
        .split(',')
        .map(str::trim)
        .filter(|unit| !unit.is_empty())
        .map(|unit| {
            unit.parse::<u32>()
                .with_context(|| format!("invalid business unit '{unit}' in site '{spec}'"))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(SiteScope::new(name, name, business_units))
}

impl SaveArgs {
    fn apply(self, mut search: SavedSearch) -> Result<SavedSearch> {
        search.name = self.name;
        if let Some(title) = self.title {
            search.title = title;
        }
        if !self.keyword.is_empty() {
            search.keyword = self.keyword;
        }
        if !self.location.is_empty() {
            search.location = self.location;
        }
        if !self.site.is_empty() {
            search.sites = self.site.iter().map(|spec| parse_site(spec)).collect::<Result<_>>()?;
        }
        if let Some(scope) = self.scope {
            search.group = Some(scope);
        }
        if let Some(blurb) = self.blurb {
            search.blurb = blurb;
        }
        search.show_blurb |= self.show_blurb;
        search.show_production |= self.show_production;
        Ok(search)
    }
}

impl TableDisplay for SavedSearch {
    fn to_table(&self, output: &OutputManager) -> comfy_table::Table {
        let mut table = output.table(&["Field", "Value"]);
        let business_units = self
            .business_units()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        let rows = [
            ("Id", self.id.clone()),
            ("Name", self.name.clone()),
            ("Slug", self.name_slug().unwrap_or_default().to_string()),
            ("Scope", self.group.clone().unwrap_or_default()),
            ("Title", self.title.clone()),
            ("Keywords", self.keyword.join(", ")),
            ("Locations", self.location.join(", ")),
            ("Business units", business_units),
            ("Query", self.querystring().to_string()),
            ("Created", self.date_created.map(|dt| dt.to_rfc3339()).unwrap_or_default()),
            ("Updated", self.last_updated.map(|dt| dt.to_rfc3339()).unwrap_or_default()),
        ];
        for (field, value) in rows {
            table.add_row(vec![Cell::new(field), Cell::new(value)]);
        }
        table
    }

    fn to_compact(&self) -> String {
        format!("{} {} {}", self.id, self.name, self.querystring())
    }
}

impl TableDisplay for Vec<SavedSearch> {
    fn to_table(&self, output: &OutputManager) -> comfy_table::Table {
        let mut table = output.table(&["Id", "Name", "Scope", "Query"]);
        for search in self {
            table.add_row(vec![
                Cell::new(&search.id),
                Cell::new(&search.name),
                Cell::new(search.group.as_deref().unwrap_or_default()),
                Cell::new(search.querystring()),
            ]);
        }
        table
    }

    fn to_compact(&self) -> String {
        format!("Count: {}", self.len())
    }
}

pub async fn handle_saved_commands(command: SavedCommands, ctx: &CliContext, output: &OutputManager) -> Result<()> {
    let repo = ctx.repo();
    let mut conn = ctx.redis().await?;

    match command {
        SavedCommands::Save(args) => {
            let existing = match &args.id {
                Some(id) => Some(
                    repo.get(&mut conn, id)
                        .await?
                        .ok_or_else(|| anyhow!("saved search '{id}' not found"))?,
                ),
                None => None,
            };
            let is_update = existing.is_some();
            let mut search = args.apply(existing.unwrap_or_else(|| SavedSearch::new("")))?;

            if let Err(err) = repo.save(&mut conn, &mut search).await {
                if let SearchError::Validation(validation) = &err {
                    for issue in &validation.issues {
                        output.error(&format!("{}: {}", issue.field, issue.message));
                    }
                }
                return Err(err.into());
            }

            output.success(&format!(
                "{} saved search '{}' ({})",
                if is_update { "Updated" } else { "Created" },
                search.name,
                search.id
            ));
            output.display(&search)
        }
        SavedCommands::Show { id } => {
            let search = repo
                .get(&mut conn, &id)
                .await?
                .ok_or_else(|| anyhow!("saved search '{id}' not found"))?;
            if !search.is_query_current() {
                output.warning("Stored query is out of date; save the search again to refresh it.");
            }
            output.display(&search)
        }
        SavedCommands::List { scope } => {
            let searches = if scope.is_empty() {
                repo.list_all(&mut conn).await?
            } else {
                repo.list_for_scopes(&mut conn, &scope).await?
            };
            if searches.is_empty() && !output.is_json() {
                output.info("No saved searches found.");
                return Ok(());
            }
            output.display(&searches)
        }
        SavedCommands::Delete { id } => {
            if repo.delete(&mut conn, &id).await? {
                output.success(&format!("Deleted saved search {id}"));
                Ok(())
            } else {
                bail!("saved search '{id}' not found")
            }
        }
        SavedCommands::Run { id, options } => {
            let search = repo
                .get(&mut conn, &id)
                .await?
                .ok_or_else(|| anyhow!("saved search '{id}' not found"))?;
            let query = options.apply(search.to_group_query())?;
            if query.query_string.is_empty() {
                output.warning(&format!("'{}' has no criteria; nothing to search.", search.name));
            }
            output.bullet(&format!("{} {}", search.name, query.query_string));
            run_grouped(ctx, query, options.dry_run, output).await
        }
    }
}
