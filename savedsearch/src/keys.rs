/// Redis key layout for saved searches under one prefix.
#[derive(Debug, Clone)]
pub struct KeyContext<'a> {
    pub prefix: &'a str,
}

const COLLECTION: &str = "saved_search";
const INDEX: &str = "saved_search_index";

impl<'a> KeyContext<'a> {
    pub fn new(prefix: &'a str) -> Self {
        Self { prefix }
    }

    /// `<prefix>:saved_search:<id>`, the serialized record.
    pub fn saved_search(&self, id: &str) -> String {
        format!("{}:{}:{}", self.prefix, COLLECTION, id)
    }

    /// `<prefix>:saved_search_index:scope:<scope>`, ids owned by one scope.
    pub fn scope_index(&self, scope: &str) -> String {
        format!("{}:{}:scope:{}", self.prefix, INDEX, scope)
    }

    /// `<prefix>:saved_search_index:all`, every stored id.
    pub fn all_index(&self) -> String {
        format!("{}:{}:all", self.prefix, INDEX)
    }

    /// Match pattern covering every key under the prefix.
    pub fn pattern(&self) -> String {
        format!("{}:*", self.prefix)
    }
}
