//! One-shot initialization of every provider in a schema.

use std::sync::Arc;

use log::{debug, warn};

use crate::emit::TraceSink;
use crate::err::SchemaResult;
use crate::keywords::{KeywordTable, parse_mask};
use crate::provider::{Provider, ProviderHandle, init_provider, validate_provider};
use crate::schema::{
    MaskValue, ResolveOptions, SchemaDefinition, SizeOverrides, TemplateSet, resolve,
};

/// Keywords and templates of a schema, ready for provider initialization.
#[derive(Debug, Clone, Default)]
pub struct ResolvedSchema {
    keywords: KeywordTable,
    templates: TemplateSet,
}

impl ResolvedSchema {
    pub fn resolve(def: &SchemaDefinition, options: &ResolveOptions) -> SchemaResult<Self> {
        let mut keywords = KeywordTable::new();
        for keyword in &def.keywords {
            let mask = match &keyword.mask {
                MaskValue::Number(mask) => *mask,
                MaskValue::Text(text) => parse_mask(&keyword.name, text)?,
            };
            if let Some(previous) = keywords.insert(keyword.name.clone(), mask) {
                warn!(
                    "keyword `{}` is declared more than once ({:#x}, then {:#x}); using {:#x}",
                    keyword.name, previous, mask, mask
                );
            }
        }

        let overrides = SizeOverrides::from_definitions(&def.size_overrides);
        let templates = resolve(&def.templates, &overrides, options)?;
        debug!(
            "resolved {} keywords and {} templates",
            keywords.len(),
            templates.len()
        );

        Ok(ResolvedSchema {
            keywords,
            templates,
        })
    }

    pub fn keywords(&self) -> &KeywordTable {
        &self.keywords
    }

    pub fn templates(&self) -> &TemplateSet {
        &self.templates
    }
}

/// Every provider of a schema, registered with one sink.
#[derive(Debug)]
pub struct Registry {
    schema: ResolvedSchema,
    providers: Vec<Arc<Provider>>,
}

impl Registry {
    /// Resolves `def` and registers each of its providers, in declaration order.
    ///
    /// All providers are validated before the first one is registered, so a schema error
    /// registers nothing.
    pub fn init_all(
        def: &SchemaDefinition,
        sink: &dyn TraceSink,
        options: &ResolveOptions,
    ) -> SchemaResult<Self> {
        let schema = ResolvedSchema::resolve(def, options)?;

        for provider in &def.providers {
            validate_provider(provider, &schema.templates, &schema.keywords)?;
        }

        let mut providers: Vec<Arc<Provider>> = Vec::with_capacity(def.providers.len());
        for provider_def in &def.providers {
            if providers.iter().any(|p| p.name() == provider_def.name) {
                warn!(
                    "provider `{}` is declared more than once; registering it again",
                    provider_def.name
                );
            }
            let provider =
                init_provider(provider_def, &schema.templates, &schema.keywords, sink)?;
            providers.push(Arc::new(provider));
        }

        Ok(Registry { schema, providers })
    }

    pub fn schema(&self) -> &ResolvedSchema {
        &self.schema
    }

    pub fn providers(&self) -> &[Arc<Provider>] {
        &self.providers
    }

    /// First provider registered under `name`.
    pub fn provider(&self, name: &str) -> Option<&Arc<Provider>> {
        self.providers.iter().find(|p| p.name() == name)
    }

    pub fn provider_by_handle(&self, handle: ProviderHandle) -> Option<&Arc<Provider>> {
        self.providers.iter().find(|p| p.handle() == handle)
    }
}
