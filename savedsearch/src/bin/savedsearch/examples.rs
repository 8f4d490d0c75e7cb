use crate::commands::{query, saved, search};

#[derive(Clone, Copy)]
pub struct ExampleGroup {
    pub title: &'static str,
    pub commands: &'static [&'static str],
}

#[derive(Clone, Copy)]
pub struct CommandExample {
    pub name: &'static str,
    pub groups: &'static [ExampleGroup],
}

pub fn command_examples() -> &'static [CommandExample] {
    &[
        CommandExample {
            name: "escape",
            groups: query::ESCAPE_EXAMPLES,
        },
        CommandExample {
            name: "query",
            groups: query::QUERY_EXAMPLES,
        },
        CommandExample {
            name: "search",
            groups: search::SEARCH_EXAMPLES,
        },
        CommandExample {
            name: "locations",
            groups: search::LOCATION_EXAMPLES,
        },
        CommandExample {
            name: "saved",
            groups: saved::EXAMPLES,
        },
    ]
}
