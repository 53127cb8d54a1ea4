//! Typed event payload serialization for EventPipe-style tracing.
//!
//! A schema declares keywords, templates (ordered, typed fields) and providers (named sets of
//! events). [`Registry::init_all`] resolves it and registers every provider with a
//! [`TraceSink`]. At runtime an [`EventWriter`] checks an event's enablement flag, packs the
//! call's [`FieldValue`]s into a contiguous little-endian payload (stack first, heap on
//! demand) and hands the bytes to the sink.
//!
//! ```
//! use std::sync::Arc;
//! use evpipe::{
//!     EnableSession, EventWriter, FieldValue, Level, MemorySink, PackSettings, Registry,
//!     SchemaDefinition,
//! };
//!
//! let schema = SchemaDefinition::from_json(r#"{
//!     "keywords": [{ "name": "Loader", "mask": "0x8" }],
//!     "templates": [{ "name": "Module", "fields": [
//!         { "name": "Id", "in_type": "win:UInt64" },
//!         { "name": "Path", "in_type": "win:UnicodeString" }
//!     ]}],
//!     "providers": [{ "name": "Microsoft-Windows-DotNETRuntime", "events": [
//!         { "symbol": "ModuleLoad", "value": 152, "level": "win:Informational",
//!           "keywords": ["Loader"], "template": "Module" }
//!     ]}]
//! }"#).unwrap();
//!
//! let sink = Arc::new(MemorySink::new());
//! let settings = PackSettings::default();
//! let registry = Registry::init_all(&schema, sink.as_ref(), &settings.resolve_options()).unwrap();
//! let provider = &registry.providers()[0];
//! provider.enable(EnableSession::new(0x8, Level::Verbose));
//!
//! let writer = EventWriter::new(sink.clone(), settings);
//! let event = provider.event("ModuleLoad").unwrap();
//! writer
//!     .write(event, &[FieldValue::UInt64(7), FieldValue::wide("a.dll")])
//!     .unwrap();
//!
//! assert_eq!(sink.events()[0].payload.len(), 8 + 6 * 2);
//! ```

pub use emit::{
    ERROR_SUCCESS, ERROR_WRITE_FAULT, EmitOutcome, EmitState, EmittedEvent, EventWriter,
    MemorySink, NullSink, TraceSink, emit_state, win32_status,
};
pub use err::{EmitError, EmitResult, PackError, PackResult, SchemaError, SchemaResult};
pub use guid::Guid;
pub use keywords::{KeywordTable, Level};
pub use packer::{HeapAllocator, PackedBuffer, Packer, SystemAllocator};
pub use provider::{EnableSession, EventDescriptor, Provider, ProviderHandle, init_provider};
pub use registry::{Registry, ResolvedSchema};
pub use schema::{InType, SchemaDefinition, Template, TemplateSet};
pub use settings::PackSettings;
pub use value::FieldValue;

pub mod emit;
pub mod err;
pub mod guid;
pub mod keywords;
pub mod packer;
pub mod provider;
pub mod registry;
pub mod schema;
pub mod settings;
pub mod value;

pub(crate) type FastMap<K, V> = hashbrown::HashMap<K, V, ahash::RandomState>;

#[cfg(test)]
use std::sync::Once;
#[cfg(test)]
static LOGGER_INIT: Once = Once::new();

// Tests run concurrently, so logger initialization has to be synchronized.
#[cfg(test)]
pub fn ensure_env_logger_initialized() {
    use std::io::Write;

    LOGGER_INIT.call_once(|| {
        let mut builder = env_logger::Builder::from_default_env();
        builder
            .format(|buf, record| writeln!(buf, "[{}] - {}", record.level(), record.args()))
            .init();
    });
}
