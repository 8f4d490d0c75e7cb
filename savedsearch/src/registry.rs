//! Registered document types.
//!
//! Solr documents carry their type in a discriminator field (`django_ct` by
//! default, formatted `app_label.model_name`). Only documents whose type is
//! registered here are turned into search hits; anything else is a stale
//! reference and is dropped from the results.
//!
//! Types can be registered at runtime on a [`DocumentTypeRegistry`] or
//! statically through `inventory`:
//!
//! ```ignore
//! savedsearch::inventory::submit! {
//!     savedsearch::registry::DocumentTypeRegistration {
//!         app_label: "seo",
//!         model_name: "joblisting",
//!         converters: &[("buid", savedsearch::value::FieldValue::raw_text)],
//!     }
//! }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde_json::Value as JsonValue;

use crate::value::FieldValue;

/// Converts one raw Solr field into a [`FieldValue`].
pub type FieldConverter = fn(&JsonValue) -> FieldValue;

/// Static registration submitted through `inventory::submit!`.
pub struct DocumentTypeRegistration {
    pub app_label: &'static str,
    pub model_name: &'static str,
    /// Per-field converters; fields not listed use generic coercion.
    pub converters: &'static [(&'static str, FieldConverter)],
}

inventory::collect!(DocumentTypeRegistration);

/// All statically registered document types.
pub fn registered_document_types() -> impl Iterator<Item = &'static DocumentTypeRegistration> {
    inventory::iter::<DocumentTypeRegistration>()
}

/// One indexed document type and its field converters.
#[derive(Clone)]
pub struct DocumentType {
    app_label: String,
    model_name: String,
    converters: HashMap<String, FieldConverter>,
}

impl DocumentType {
    pub fn new(app_label: impl Into<String>, model_name: impl Into<String>) -> Self {
        Self {
            app_label: app_label.into().to_ascii_lowercase(),
            model_name: model_name.into().to_ascii_lowercase(),
            converters: HashMap::new(),
        }
    }

    /// Parse an `app_label.model_name` content type.
    pub fn parse(content_type: &str) -> Option<Self> {
        let (app_label, model_name) = split_content_type(content_type)?;
        Some(Self::new(app_label, model_name))
    }

    #[inline]
    pub fn with_converter(mut self, field: impl Into<String>, converter: FieldConverter) -> Self {
        self.converters.insert(field.into(), converter);
        self
    }

    pub fn app_label(&self) -> &str {
        &self.app_label
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// `app_label.model_name`, the value stored in the type discriminator field.
    pub fn content_type(&self) -> String {
        format!("{}.{}", self.app_label, self.model_name)
    }

    pub fn converter(&self, field: &str) -> Option<FieldConverter> {
        self.converters.get(field).copied()
    }

    /// Convert a raw field through its converter, or generic coercion.
    pub fn convert(&self, field: &str, value: &JsonValue) -> FieldValue {
        match self.converter(field) {
            Some(convert) => convert(value),
            None => FieldValue::from_solr(value),
        }
    }
}

impl fmt::Debug for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut converted: Vec<&str> = self.converters.keys().map(String::as_str).collect();
        converted.sort_unstable();
        f.debug_struct("DocumentType")
            .field("app_label", &self.app_label)
            .field("model_name", &self.model_name)
            .field("converters", &converted)
            .finish()
    }
}

impl From<&DocumentTypeRegistration> for DocumentType {
    fn from(registration: &DocumentTypeRegistration) -> Self {
        registration
            .converters
            .iter()
            .fold(Self::new(registration.app_label, registration.model_name), |doc_type, (field, converter)| {
                doc_type.with_converter(*field, *converter)
            })
    }
}

/// The set of document types a backend accepts, keyed by content type.
#[derive(Debug, Clone, Default)]
pub struct DocumentTypeRegistry {
    types: BTreeMap<String, DocumentType>,
}

impl DocumentTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every type submitted through `inventory`.
    pub fn from_inventory() -> Self {
        let mut registry = Self::new();
        for registration in registered_document_types() {
            registry.register(DocumentType::from(registration));
        }
        registry
    }

    pub fn register(&mut self, doc_type: DocumentType) {
        self.types.insert(doc_type.content_type(), doc_type);
    }

    #[inline]
    pub fn with_type(mut self, doc_type: DocumentType) -> Self {
        self.register(doc_type);
        self
    }

    pub fn get(&self, content_type: &str) -> Option<&DocumentType> {
        let (app_label, model_name) = split_content_type(content_type)?;
        self.types
            .get(&format!("{}.{}", app_label.to_ascii_lowercase(), model_name.to_ascii_lowercase()))
    }

    pub fn is_registered(&self, content_type: &str) -> bool {
        self.get(content_type).is_some()
    }

    pub fn converter_for(&self, content_type: &str, field: &str) -> Option<FieldConverter> {
        self.get(content_type)?.converter(field)
    }

    /// Content types in a stable order, as used by the narrowing filter.
    pub fn models_list(&self) -> Vec<String> {
        self.types.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

fn split_content_type(content_type: &str) -> Option<(&str, &str)> {
    let (app_label, model_name) = content_type.trim().split_once('.')?;
    if app_label.is_empty() || model_name.is_empty() || model_name.contains('.') {
        return None;
    }
    Some((app_label, model_name))
}
