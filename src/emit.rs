//! Event emission.
//!
//! Every write goes through the same steps: check the descriptor's enablement flag, pack the
//! arguments, hand the payload to the [`TraceSink`], release the buffer. A disabled event
//! returns before any packing work is done.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use log::warn;

use crate::err::{EmitError, EmitResult, PackError};
use crate::packer::{HeapAllocator, PackedBuffer, Packer, SystemAllocator};
use crate::provider::{EventDescriptor, ProviderHandle};
use crate::schema::Template;
use crate::settings::PackSettings;
use crate::value::FieldValue;

/// Win32 status of a successful (or dropped) write.
pub const ERROR_SUCCESS: u32 = 0;
/// Win32 status of a write that failed while packing.
pub const ERROR_WRITE_FAULT: u32 = 29;

/// Largest inline buffer an [`EventWriter`] places on the stack.
pub const STACK_INLINE_CAPACITY: usize = 256;

/// The tracing subsystem: registers providers and receives finished payloads.
///
/// `write_event` is expected to be cheap and must not block; it may be called from many
/// threads at once.
pub trait TraceSink: Send + Sync {
    fn register_provider(&self, name: &str) -> ProviderHandle;

    fn write_event(&self, event: &EventDescriptor, payload: &[u8]);
}

/// Where an emission call ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitState {
    Emitted,
    /// The event was disabled when the call was made.
    Dropped,
    /// Packing failed; nothing reached the sink.
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitOutcome {
    /// The payload reached the sink.
    Emitted {
        len: usize,
        /// Whether packing outgrew the inline buffer.
        heap: bool,
    },
    /// The event was disabled.
    Dropped,
}

impl EmitOutcome {
    pub fn state(&self) -> EmitState {
        match self {
            EmitOutcome::Emitted { .. } => EmitState::Emitted,
            EmitOutcome::Dropped => EmitState::Dropped,
        }
    }
}

/// Terminal state of an emission call.
pub fn emit_state(result: &EmitResult<EmitOutcome>) -> EmitState {
    match result {
        Ok(outcome) => outcome.state(),
        Err(err) => err.state(),
    }
}

/// Maps an emission result to the status code callers of generated writers expect.
pub fn win32_status(result: &EmitResult<EmitOutcome>) -> u32 {
    match emit_state(result) {
        EmitState::Emitted | EmitState::Dropped => ERROR_SUCCESS,
        EmitState::Failed => ERROR_WRITE_FAULT,
    }
}

/// Writes events to a sink.
///
/// Holds no per-call state; share one writer between threads.
pub struct EventWriter<A = SystemAllocator> {
    sink: Arc<dyn TraceSink>,
    packer: Packer<A>,
}

impl EventWriter<SystemAllocator> {
    pub fn new(sink: Arc<dyn TraceSink>, settings: PackSettings) -> Self {
        EventWriter {
            sink,
            packer: Packer::new(settings),
        }
    }
}

impl<A: HeapAllocator> EventWriter<A> {
    pub fn with_packer(sink: Arc<dyn TraceSink>, packer: Packer<A>) -> Self {
        EventWriter { sink, packer }
    }

    pub fn packer(&self) -> &Packer<A> {
        &self.packer
    }

    pub fn sink(&self) -> &Arc<dyn TraceSink> {
        &self.sink
    }

    /// Writes `event` using inline storage of the template's estimated size.
    ///
    /// Estimates up to [`STACK_INLINE_CAPACITY`] live on the stack. Larger ones get a single
    /// block from the packer's allocator, which still counts as inline storage: a payload
    /// within the estimate never grows.
    pub fn write(
        &self,
        event: &EventDescriptor,
        values: &[FieldValue<'_>],
    ) -> EmitResult<EmitOutcome> {
        if !event.is_enabled() {
            return Ok(EmitOutcome::Dropped);
        }
        let Some(template) = event.template() else {
            return Ok(self.emit_empty(event));
        };

        let estimate = template.estimated_inline_size();
        if estimate <= STACK_INLINE_CAPACITY {
            let mut stack = [0u8; STACK_INLINE_CAPACITY];
            return self.pack_and_emit(event, template, values, &mut stack[..estimate]);
        }

        let Some(mut block) = self
            .packer
            .allocator()
            .allocate(estimate)
            .filter(|block| block.len() >= estimate)
        else {
            return Err(self.write_fault(
                event,
                PackError::AllocationFailed {
                    requested: estimate,
                },
            ));
        };
        self.pack_and_emit(event, template, values, &mut block[..estimate])
    }

    /// Writes `event` using caller-supplied inline storage.
    pub fn write_with_inline(
        &self,
        event: &EventDescriptor,
        values: &[FieldValue<'_>],
        inline: &mut [u8],
    ) -> EmitResult<EmitOutcome> {
        if !event.is_enabled() {
            return Ok(EmitOutcome::Dropped);
        }
        match event.template() {
            Some(template) => self.pack_and_emit(event, template, values, inline),
            None => Ok(self.emit_empty(event)),
        }
    }

    fn write_fault(&self, event: &EventDescriptor, source: PackError) -> EmitError {
        warn!(
            "dropping event `{}` of provider `{}`: {}",
            event.symbol(),
            event.provider_name(),
            source
        );
        EmitError::WriteFault {
            event: event.symbol().to_owned(),
            source,
        }
    }

    fn emit_empty(&self, event: &EventDescriptor) -> EmitOutcome {
        self.sink.write_event(event, &[]);
        EmitOutcome::Emitted {
            len: 0,
            heap: false,
        }
    }

    fn pack_and_emit(
        &self,
        event: &EventDescriptor,
        template: &Template,
        values: &[FieldValue<'_>],
        inline: &mut [u8],
    ) -> EmitResult<EmitOutcome> {
        let buffer: PackedBuffer<'_> = match self.packer.pack(template, values, inline) {
            Ok(buffer) => buffer,
            Err(source) => return Err(self.write_fault(event, source)),
        };

        self.sink.write_event(event, buffer.as_bytes());
        let outcome = EmitOutcome::Emitted {
            len: buffer.len(),
            heap: buffer.is_heap_owned(),
        };
        buffer.release();
        Ok(outcome)
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl TraceSink for NullSink {
    fn register_provider(&self, _name: &str) -> ProviderHandle {
        ProviderHandle::default()
    }

    fn write_event(&self, _event: &EventDescriptor, _payload: &[u8]) {}
}

/// A payload as seen by [`MemorySink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmittedEvent {
    pub provider: ProviderHandle,
    pub symbol: String,
    pub value: u32,
    pub version: u8,
    pub payload: Vec<u8>,
}

/// Keeps every registration and payload in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    next_handle: AtomicU64,
    providers: Mutex<Vec<(ProviderHandle, String)>>,
    events: Mutex<Vec<EmittedEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        MemorySink::default()
    }

    pub fn providers(&self) -> Vec<(ProviderHandle, String)> {
        self.providers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn events(&self) -> Vec<EmittedEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn take_events(&self) -> Vec<EmittedEvent> {
        std::mem::take(&mut *self.events.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl TraceSink for MemorySink {
    fn register_provider(&self, name: &str) -> ProviderHandle {
        let handle = ProviderHandle(self.next_handle.fetch_add(1, Ordering::Relaxed) + 1);
        self.providers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((handle, name.to_owned()));
        handle
    }

    fn write_event(&self, event: &EventDescriptor, payload: &[u8]) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(EmittedEvent {
                provider: event.provider(),
                symbol: event.symbol().to_owned(),
                value: event.value(),
                version: event.version(),
                payload: payload.to_vec(),
            });
    }
}
