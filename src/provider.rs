use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, warn};

use crate::FastMap;
use crate::emit::TraceSink;
use crate::err::{SchemaError, SchemaResult};
use crate::keywords::{KeywordTable, Level};
use crate::schema::{ProviderDefinition, Template, TemplateSet};

/// Registration handle handed out by the tracing subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ProviderHandle(pub u64);

impl fmt::Display for ProviderHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a tracing session asked a provider for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnableSession {
    pub keywords: u64,
    pub level: Level,
}

impl EnableSession {
    pub fn new(keywords: u64, level: Level) -> Self {
        EnableSession { keywords, level }
    }

    /// Whether an event with `level` and `keywords` is selected by this session.
    pub fn selects(&self, level: Level, keywords: u64) -> bool {
        let keywords_match = keywords == 0 || self.keywords & keywords != 0;
        let level_match = level == Level::LogAlways || self.level >= level;
        keywords_match && level_match
    }
}

/// Immutable identity of one event plus its live enablement flag.
///
/// Everything except the flag is fixed at provider initialization. The flag is written by
/// the tracing control plane and read on every emission.
#[derive(Debug)]
pub struct EventDescriptor {
    symbol: String,
    value: u32,
    version: u8,
    level: Level,
    keywords: u64,
    template: Option<Arc<Template>>,
    provider: ProviderHandle,
    provider_name: Arc<str>,
    enabled: AtomicBool,
}

impl EventDescriptor {
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn value(&self) -> u32 {
        self.value
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn keywords(&self) -> u64 {
        self.keywords
    }

    pub fn template(&self) -> Option<&Arc<Template>> {
        self.template.as_ref()
    }

    /// Handle of the owning provider, for lookups through the registry.
    pub fn provider(&self) -> ProviderHandle {
        self.provider
    }

    pub fn provider_name(&self) -> &str {
        &self.provider_name
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Control-plane hook.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    fn refresh(&self, session: Option<&EnableSession>) {
        let enabled = session.is_some_and(|s| s.selects(self.level, self.keywords));
        self.set_enabled(enabled);
    }
}

/// A named event source. Owns its event descriptors.
#[derive(Debug)]
pub struct Provider {
    name: Arc<str>,
    handle: ProviderHandle,
    events: Vec<EventDescriptor>,
    by_symbol: FastMap<String, usize>,
}

impl Provider {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The name with `Windows-`/`Microsoft-` dropped and dashes turned into underscores,
    /// e.g. `Microsoft-Windows-DotNETRuntime` -> `DotNETRuntime`.
    pub fn pretty_name(&self) -> String {
        pretty_name(&self.name)
    }

    pub fn handle(&self) -> ProviderHandle {
        self.handle
    }

    pub fn events(&self) -> &[EventDescriptor] {
        &self.events
    }

    pub fn event(&self, symbol: &str) -> Option<&EventDescriptor> {
        self.by_symbol.get(symbol).map(|&i| &self.events[i])
    }

    pub fn event_by_value(&self, value: u32) -> Option<&EventDescriptor> {
        self.events.iter().find(|e| e.value == value)
    }

    /// Applies a session request to every event of this provider.
    pub fn enable(&self, session: EnableSession) {
        debug!(
            "enabling provider `{}` (keywords={:#x}, level={})",
            self.name, session.keywords, session.level
        );
        for event in &self.events {
            event.refresh(Some(&session));
        }
    }

    pub fn disable(&self) {
        debug!("disabling provider `{}`", self.name);
        for event in &self.events {
            event.refresh(None);
        }
    }
}

pub fn pretty_name(name: &str) -> String {
    name.replace("Windows-", "")
        .replace("Microsoft-", "")
        .replace('-', "_")
}

struct PendingEvent<'d> {
    symbol: &'d str,
    value: u32,
    version: u8,
    level: Level,
    keywords: u64,
    template: Option<Arc<Template>>,
}

fn prepare_events<'d>(
    def: &'d ProviderDefinition,
    templates: &TemplateSet,
    keywords: &KeywordTable,
) -> SchemaResult<Vec<PendingEvent<'d>>> {
    let mut pending = Vec::with_capacity(def.events.len());
    for event in &def.events {
        let template = match &event.template {
            Some(name) => Some(
                templates
                    .get(name)
                    .cloned()
                    .ok_or_else(|| SchemaError::UnknownTemplate {
                        event: event.symbol.clone(),
                        template: name.clone(),
                    })?,
            ),
            None => None,
        };

        pending.push(PendingEvent {
            symbol: &event.symbol,
            value: event.value,
            version: event.version,
            level: Level::from_name(&event.level)?,
            keywords: keywords.encode_keywords(&event.keywords)?,
            template,
        });
    }
    Ok(pending)
}

/// Checks that every event of `def` resolves, without registering anything.
pub fn validate_provider(
    def: &ProviderDefinition,
    templates: &TemplateSet,
    keywords: &KeywordTable,
) -> SchemaResult<()> {
    prepare_events(def, templates, keywords).map(|_| ())
}

/// Registers one provider with the tracing subsystem and creates its event descriptors.
///
/// Every event's level, keywords and template are resolved before anything is registered,
/// so a schema error leaves the subsystem untouched. Calling this twice for the same provider
/// registers it twice.
pub fn init_provider(
    def: &ProviderDefinition,
    templates: &TemplateSet,
    keywords: &KeywordTable,
    sink: &dyn TraceSink,
) -> SchemaResult<Provider> {
    let pending = prepare_events(def, templates, keywords)?;

    let name: Arc<str> = Arc::from(def.name.as_str());
    let handle = sink.register_provider(&name);
    debug!("registered provider `{}` as {}", name, handle);

    let mut events = Vec::with_capacity(pending.len());
    let mut by_symbol: FastMap<String, usize> = FastMap::default();
    for (index, event) in pending.into_iter().enumerate() {
        debug!(
            "  event `{}` value={} version={} level={} keywords={:#x}",
            event.symbol, event.value, event.version, event.level, event.keywords
        );
        if by_symbol.contains_key(event.symbol) {
            warn!(
                "provider `{}` defines event `{}` more than once; lookups by symbol return the first",
                name, event.symbol
            );
        } else {
            by_symbol.insert(event.symbol.to_owned(), index);
        }
        events.push(EventDescriptor {
            symbol: event.symbol.to_owned(),
            value: event.value,
            version: event.version,
            level: event.level,
            keywords: event.keywords,
            template: event.template,
            provider: handle,
            provider_name: Arc::clone(&name),
            enabled: AtomicBool::new(false),
        });
    }

    Ok(Provider {
        name,
        handle,
        events,
        by_symbol,
    })
}
