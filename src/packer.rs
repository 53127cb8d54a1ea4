//! Payload packing.
//!
//! A [`Packer`] walks a resolved [`Template`] and serializes the matching [`FieldValue`]s into
//! a [`PackedBuffer`]. Packing starts in caller-supplied inline storage and moves to a heap
//! block only when a field does not fit. Growth follows
//! `max(growth_floor, floor(1.5 * (capacity + required)))`.
//!
//! Once a buffer is heap-owned it stays heap-owned. Inline storage is never freed or reused by
//! the packer, and a failed pack leaves whatever it already wrote in the inline slice.

use std::mem;
use std::sync::Arc;

use byteorder::{ByteOrder, LittleEndian};
use log::trace;

use crate::err::{PackError, PackResult};
use crate::guid::GUID_SIZE;
use crate::schema::{ElementSize, Field, InType, Template, WireKind};
use crate::settings::PackSettings;
use crate::value::FieldValue;

/// Source of heap blocks for payload growth.
pub trait HeapAllocator: Send + Sync {
    /// Returns a zero-filled block of exactly `size` bytes, or `None` if memory is exhausted.
    fn allocate(&self, size: usize) -> Option<Vec<u8>>;
}

/// Allocates from the global allocator, reporting exhaustion instead of aborting.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemAllocator;

impl HeapAllocator for SystemAllocator {
    fn allocate(&self, size: usize) -> Option<Vec<u8>> {
        let mut block = Vec::new();
        block.try_reserve_exact(size).ok()?;
        block.resize(size, 0);
        Some(block)
    }
}

impl<A: HeapAllocator + ?Sized> HeapAllocator for Arc<A> {
    fn allocate(&self, size: usize) -> Option<Vec<u8>> {
        (**self).allocate(size)
    }
}

impl<A: HeapAllocator + ?Sized> HeapAllocator for &A {
    fn allocate(&self, size: usize) -> Option<Vec<u8>> {
        (**self).allocate(size)
    }
}

#[derive(Debug)]
enum Storage<'a> {
    Inline(&'a mut [u8]),
    Heap(Vec<u8>),
}

/// A serialized payload and the storage that holds it.
///
/// Dropping a heap-owned buffer frees its block; dropping an inline one leaves the caller's
/// storage alone.
#[derive(Debug)]
pub struct PackedBuffer<'a> {
    storage: Storage<'a>,
    len: usize,
    growths: u32,
}

impl<'a> PackedBuffer<'a> {
    pub fn new(inline: &'a mut [u8]) -> Self {
        PackedBuffer {
            storage: Storage::Inline(inline),
            len: 0,
            growths: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        match &self.storage {
            Storage::Inline(slice) => slice.len(),
            Storage::Heap(block) => block.len(),
        }
    }

    pub fn is_heap_owned(&self) -> bool {
        matches!(self.storage, Storage::Heap(_))
    }

    /// Number of heap promotions this buffer went through.
    pub fn growths(&self) -> u32 {
        self.growths
    }

    pub fn as_bytes(&self) -> &[u8] {
        match &self.storage {
            Storage::Inline(slice) => &slice[..self.len],
            Storage::Heap(block) => &block[..self.len],
        }
    }

    /// Copies (inline) or truncates (heap) the payload into an owned vector.
    pub fn into_vec(self) -> Vec<u8> {
        match self.storage {
            Storage::Inline(slice) => slice[..self.len].to_vec(),
            Storage::Heap(mut block) => {
                block.truncate(self.len);
                block
            }
        }
    }

    /// Frees the heap block, if any.
    pub fn release(self) {
        if self.is_heap_owned() {
            trace!("releasing {} byte heap payload", self.capacity());
        }
    }

    fn storage_mut(&mut self) -> &mut [u8] {
        match &mut self.storage {
            Storage::Inline(slice) => slice,
            Storage::Heap(block) => block.as_mut_slice(),
        }
    }

    /// Appends `n` bytes produced by `fill`. Capacity must already be reserved.
    fn append_with(&mut self, n: usize, fill: impl FnOnce(&mut [u8])) {
        let start = self.len;
        fill(&mut self.storage_mut()[start..start + n]);
        self.len = start + n;
    }

    fn append(&mut self, bytes: &[u8]) {
        self.append_with(bytes.len(), |dst| dst.copy_from_slice(bytes));
    }
}

/// Serializes field values against templates.
///
/// A packer holds no per-call state, so one instance can be shared by every thread emitting
/// events.
#[derive(Debug, Clone, Default)]
pub struct Packer<A = SystemAllocator> {
    settings: PackSettings,
    allocator: A,
}

impl Packer<SystemAllocator> {
    pub fn new(settings: PackSettings) -> Self {
        Packer {
            settings,
            allocator: SystemAllocator,
        }
    }
}

impl<A: HeapAllocator> Packer<A> {
    pub fn with_allocator(settings: PackSettings, allocator: A) -> Self {
        Packer {
            settings,
            allocator,
        }
    }

    pub fn settings(&self) -> &PackSettings {
        &self.settings
    }

    pub fn allocator(&self) -> &A {
        &self.allocator
    }

    /// Packs `values` into `inline`, promoting to the heap when they do not fit.
    ///
    /// On error every heap block allocated by this call has been freed.
    pub fn pack<'b>(
        &self,
        template: &Template,
        values: &[FieldValue<'_>],
        inline: &'b mut [u8],
    ) -> PackResult<PackedBuffer<'b>> {
        if values.len() != template.len() {
            return Err(PackError::ArityMismatch {
                template: template.name().to_owned(),
                expected: template.len(),
                found: values.len(),
            });
        }

        let mut buffer = PackedBuffer::new(inline);
        for (field, value) in template.fields().iter().zip(values) {
            self.pack_field(&mut buffer, field, value, values)?;
        }
        Ok(buffer)
    }

    /// Packs into a fresh heap vector, without inline storage.
    pub fn pack_to_vec(&self, template: &Template, values: &[FieldValue<'_>]) -> PackResult<Vec<u8>> {
        let mut no_inline = [0u8; 0];
        Ok(self.pack(template, values, &mut no_inline)?.into_vec())
    }

    fn pack_field(
        &self,
        buffer: &mut PackedBuffer<'_>,
        field: &Field,
        value: &FieldValue<'_>,
        values: &[FieldValue<'_>],
    ) -> PackResult<()> {
        match &field.kind {
            WireKind::FixedScalar { .. } => {
                let in_type = field.in_type.ok_or_else(|| mismatch(field, "scalar", value))?;
                let mut scratch = [0u8; 16];
                let width = encode_scalar(in_type, value, &mut scratch)
                    .ok_or_else(|| mismatch(field, in_type.name(), value))?;
                self.reserve(buffer, width)?;
                buffer.append(&scratch[..width]);
            }
            WireKind::Guid => {
                let FieldValue::Guid(guid) = value else {
                    return Err(mismatch(field, "Guid", value));
                };
                self.reserve(buffer, GUID_SIZE)?;
                buffer.append(&guid.to_le_bytes());
            }
            WireKind::WideString => {
                let FieldValue::WideStr(units) = value else {
                    return Err(mismatch(field, "WideStr", value));
                };
                let Some(units) = units else {
                    return Ok(());
                };
                let chars = units.iter().position(|&u| u == 0).unwrap_or(units.len());
                let units = &units[..chars];
                let byte_count = chars
                    .checked_add(1)
                    .and_then(|n| n.checked_mul(mem::size_of::<u16>()))
                    .ok_or(PackError::Overflow)?;
                self.reserve(buffer, byte_count)?;
                buffer.append_with(byte_count, |dst| {
                    let (text, terminator) = dst.split_at_mut(chars * 2);
                    LittleEndian::write_u16_into(units, text);
                    terminator.fill(0);
                });
            }
            WireKind::NarrowString => {
                let FieldValue::NarrowStr(bytes) = value else {
                    return Err(mismatch(field, "NarrowStr", value));
                };
                let Some(bytes) = bytes else {
                    return Ok(());
                };
                let chars = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
                let byte_count = chars.checked_add(1).ok_or(PackError::Overflow)?;
                self.reserve(buffer, byte_count)?;
                buffer.append_with(byte_count, |dst| {
                    dst[..chars].copy_from_slice(&bytes[..chars]);
                    dst[chars] = 0;
                });
            }
            WireKind::CountedArray { count, element } => {
                let FieldValue::Binary(data) = value else {
                    return Err(mismatch(field, "Binary", value));
                };
                let Some(data) = data else {
                    return Ok(());
                };
                let count = element_count(&values[count.index], &count.name)?;
                let size = contribution(count, *element, None)?;
                self.copy_blob(buffer, field, data, size)?;
            }
            WireKind::StructBlob { count, element } => {
                let (caller_size, data) = match value {
                    FieldValue::Struct { element_size, data } => (Some(*element_size), *data),
                    FieldValue::Binary(data) if *element != ElementSize::Caller => (None, *data),
                    other => return Err(mismatch(field, "Struct", other)),
                };
                let Some(data) = data else {
                    return Ok(());
                };
                let count = match count {
                    Some(count) => element_count(&values[count.index], &count.name)?,
                    None => 1,
                };
                let size = contribution(count, *element, caller_size)?;
                self.copy_blob(buffer, field, data, size)?;
            }
        }
        Ok(())
    }

    fn copy_blob(
        &self,
        buffer: &mut PackedBuffer<'_>,
        field: &Field,
        data: &[u8],
        size: usize,
    ) -> PackResult<()> {
        if data.len() < size {
            return Err(PackError::ValueTooShort {
                field: field.name.clone(),
                need: size,
                have: data.len(),
            });
        }
        self.reserve(buffer, size)?;
        buffer.append(&data[..size]);
        Ok(())
    }

    /// Makes room for `required` more bytes, promoting the buffer to a larger heap block when
    /// the current storage is too small.
    fn reserve(&self, buffer: &mut PackedBuffer<'_>, required: usize) -> PackResult<()> {
        let end = buffer.len.checked_add(required).ok_or(PackError::Overflow)?;
        let max = self.settings.get_max_payload_size();
        if let Some(max) = max {
            if end > max {
                return Err(PackError::PayloadTooLarge { size: end, max });
            }
        }

        let capacity = buffer.capacity();
        if end <= capacity {
            return Ok(());
        }

        let wanted = capacity.checked_add(required).ok_or(PackError::Overflow)?;
        let mut new_capacity = wanted
            .checked_add(wanted / 2)
            .ok_or(PackError::Overflow)?
            .max(self.settings.get_growth_floor());
        if let Some(max) = max {
            new_capacity = new_capacity.min(max);
        }
        if new_capacity <= capacity {
            return Err(PackError::Overflow);
        }

        let mut block = self
            .allocator
            .allocate(new_capacity)
            .filter(|block| block.len() >= new_capacity)
            .ok_or(PackError::AllocationFailed {
                requested: new_capacity,
            })?;

        block[..buffer.len].copy_from_slice(buffer.as_bytes());
        trace!(
            "payload grew from {} to {} bytes ({} used, {} needed)",
            capacity, new_capacity, buffer.len, required
        );

        // Replacing the storage drops a previous heap block; inline storage is only borrowed.
        buffer.storage = Storage::Heap(block);
        buffer.growths += 1;
        Ok(())
    }
}

fn mismatch(field: &Field, expected: &'static str, found: &FieldValue<'_>) -> PackError {
    PackError::TypeMismatch {
        field: field.name.clone(),
        expected,
        found: found.type_name(),
    }
}

fn element_count(value: &FieldValue<'_>, name: &str) -> PackResult<usize> {
    let count = value.as_count().ok_or_else(|| PackError::TypeMismatch {
        field: name.to_owned(),
        expected: "integer count",
        found: value.type_name(),
    })?;
    if count < 0 {
        return Err(PackError::InvalidCount {
            field: name.to_owned(),
            value: count,
        });
    }
    usize::try_from(count).map_err(|_| PackError::Overflow)
}

fn contribution(count: usize, element: ElementSize, caller_size: Option<u32>) -> PackResult<usize> {
    let element_size = match element {
        ElementSize::Natural(n) | ElementSize::Override(n) => n,
        ElementSize::Fixed(total) => return Ok(total),
        ElementSize::Caller => caller_size.unwrap_or_default() as usize,
    };
    count.checked_mul(element_size).ok_or(PackError::Overflow)
}

/// Encodes a scalar into `out`, returning its width, or `None` if `value` does not match
/// `in_type`.
fn encode_scalar(in_type: InType, value: &FieldValue<'_>, out: &mut [u8; 16]) -> Option<usize> {
    let width = match (in_type, value) {
        (InType::Int8, FieldValue::Int8(v)) => {
            out[0] = *v as u8;
            1
        }
        (InType::UInt8, FieldValue::UInt8(v)) => {
            out[0] = *v;
            1
        }
        (InType::Int16, FieldValue::Int16(v)) => {
            LittleEndian::write_i16(&mut out[..2], *v);
            2
        }
        (InType::UInt16, FieldValue::UInt16(v)) => {
            LittleEndian::write_u16(&mut out[..2], *v);
            2
        }
        (InType::Int32, FieldValue::Int32(v)) => {
            LittleEndian::write_i32(&mut out[..4], *v);
            4
        }
        (InType::UInt32 | InType::HexInt32, FieldValue::UInt32(v)) => {
            LittleEndian::write_u32(&mut out[..4], *v);
            4
        }
        (InType::Int64, FieldValue::Int64(v)) => {
            LittleEndian::write_i64(&mut out[..8], *v);
            8
        }
        (InType::UInt64 | InType::HexInt64, FieldValue::UInt64(v)) => {
            LittleEndian::write_u64(&mut out[..8], *v);
            8
        }
        (InType::Float, FieldValue::Float(v)) => {
            LittleEndian::write_f32(&mut out[..4], *v);
            4
        }
        (InType::Double, FieldValue::Double(v)) => {
            LittleEndian::write_f64(&mut out[..8], *v);
            8
        }
        (InType::Boolean, FieldValue::Bool(v)) => {
            LittleEndian::write_i32(&mut out[..4], i32::from(*v));
            4
        }
        (InType::Pointer, FieldValue::Pointer(v)) => {
            let width = mem::size_of::<usize>();
            LittleEndian::write_uint(&mut out[..width], *v as u64, width);
            width
        }
        (InType::FileTime, FieldValue::FileTime(v)) => {
            LittleEndian::write_u64(&mut out[..8], *v);
            8
        }
        (InType::SystemTime, FieldValue::SystemTime(parts)) => {
            LittleEndian::write_u16_into(parts, &mut out[..16]);
            16
        }
        _ => return None,
    };
    Some(width)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guid::Guid;
    use crate::schema::{
        FieldDefinition as F, ResolveOptions, SizeOverride, SizeOverrides, TemplateDefinition,
    };
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn template(fields: Vec<F>) -> Template {
        template_with(fields, SizeOverrides::new())
    }

    fn template_with(fields: Vec<F>, overrides: SizeOverrides) -> Template {
        let def = TemplateDefinition::new("Test", fields);
        Template::resolve(&def, &overrides, &ResolveOptions::default()).unwrap()
    }

    /// Fails every allocation from the `fail_from`-th call on (0-based).
    struct FailingAllocator {
        fail_from: usize,
        calls: AtomicUsize,
    }

    impl FailingAllocator {
        fn new(fail_from: usize) -> Self {
            FailingAllocator {
                fail_from,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl HeapAllocator for FailingAllocator {
        fn allocate(&self, size: usize) -> Option<Vec<u8>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call >= self.fail_from {
                None
            } else {
                SystemAllocator.allocate(size)
            }
        }
    }

    #[test]
    fn test_counted_array_grows_out_of_small_inline_buffer() {
        let t = template(vec![
            F::scalar("len", InType::UInt32),
            F::array("data", InType::UInt8, "len"),
        ]);
        let packer = Packer::new(PackSettings::default());
        let mut inline = [0u8; 4];
        let data = [1u8, 2, 3, 4, 5];

        let buffer = packer
            .pack(&t, &[FieldValue::UInt32(5), FieldValue::binary(&data)], &mut inline)
            .unwrap();

        assert!(buffer.is_heap_owned());
        assert_eq!(buffer.growths(), 1);
        assert!(buffer.capacity() >= 9);
        assert_eq!(buffer.len(), 9);
        assert_eq!(buffer.as_bytes(), &[5, 0, 0, 0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_null_narrow_string_packs_nothing() {
        let t = template(vec![F::scalar("name", InType::AnsiString)]);
        let packer = Packer::new(PackSettings::default());
        let mut inline = [0u8; 32];

        let buffer = packer.pack(&t, &[FieldValue::null_narrow()], &mut inline).unwrap();

        assert_eq!(buffer.len(), 0);
        assert!(!buffer.is_heap_owned());
    }

    #[test]
    fn test_allocation_failure_on_first_growth() {
        let t = template(vec![F::scalar("name", InType::UnicodeString)]);
        let allocator = FailingAllocator::new(0);
        let packer = Packer::with_allocator(PackSettings::default(), &allocator);
        let mut inline = [0u8; 4];

        let err = packer
            .pack(&t, &[FieldValue::wide("too long for four bytes")], &mut inline)
            .unwrap_err();

        assert!(matches!(err, PackError::AllocationFailed { .. }));
        assert_eq!(allocator.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_allocation_failure_after_promotion_reports_failure() {
        let t = template(vec![
            F::scalar("a", InType::AnsiString),
            F::scalar("b", InType::AnsiString),
        ]);
        let allocator = FailingAllocator::new(1);
        let packer = Packer::with_allocator(PackSettings::new().growth_floor(0), &allocator);
        let mut inline = [0u8; 2];
        let long = "x".repeat(200);

        let err = packer
            .pack(&t, &[FieldValue::narrow("abc"), FieldValue::narrow(&long)], &mut inline)
            .unwrap_err();

        assert!(matches!(err, PackError::AllocationFailed { .. }));
        assert_eq!(allocator.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_fits_inline_stays_inline() {
        let t = template(vec![
            F::scalar("a", InType::UInt16),
            F::scalar("b", InType::Guid),
            F::scalar("c", InType::Boolean),
        ]);
        assert_eq!(t.estimated_inline_size(), 22);
        let packer = Packer::new(PackSettings::default());
        let mut inline = vec![0u8; t.estimated_inline_size()];

        let buffer = packer
            .pack(
                &t,
                &[
                    FieldValue::UInt16(0xBEEF),
                    FieldValue::Guid(Guid::default()),
                    FieldValue::Bool(true),
                ],
                &mut inline,
            )
            .unwrap();

        assert!(!buffer.is_heap_owned());
        assert_eq!(buffer.len(), 22);
        assert_eq!(&buffer.as_bytes()[..2], &[0xEF, 0xBE]);
        assert_eq!(&buffer.as_bytes()[18..], &[1, 0, 0, 0]);
    }

    #[test]
    fn test_repeated_growth_preserves_earlier_bytes() {
        let t = template(vec![
            F::scalar("a", InType::AnsiString),
            F::scalar("b", InType::AnsiString),
            F::scalar("c", InType::AnsiString),
        ]);
        let packer = Packer::new(PackSettings::default());
        let mut inline = [0u8; 1];
        let a = "a".repeat(40);
        let b = "b".repeat(100);
        let c = "c".repeat(400);

        let buffer = packer
            .pack(
                &t,
                &[FieldValue::narrow(&a), FieldValue::narrow(&b), FieldValue::narrow(&c)],
                &mut inline,
            )
            .unwrap();

        assert_eq!(buffer.growths(), 3);
        assert!(buffer.is_heap_owned());
        let mut expected = Vec::new();
        for s in [&a, &b, &c] {
            expected.extend_from_slice(s.as_bytes());
            expected.push(0);
        }
        assert_eq!(buffer.as_bytes(), expected.as_slice());
    }

    #[test]
    fn test_growth_floor_applies_to_tiny_overruns() {
        let t = template(vec![F::scalar("a", InType::UInt64)]);
        let packer = Packer::new(PackSettings::default());
        let mut inline = [0u8; 2];

        let buffer = packer.pack(&t, &[FieldValue::UInt64(7)], &mut inline).unwrap();

        assert_eq!(buffer.capacity(), 32);
        assert_eq!(buffer.len(), 8);
    }

    #[test]
    fn test_growth_uses_one_and_a_half_factor() {
        let t = template(vec![F::scalar("a", InType::AnsiString)]);
        let packer = Packer::new(PackSettings::default());
        let mut inline = [0u8; 10];
        let s = "z".repeat(99);

        let buffer = packer.pack(&t, &[FieldValue::narrow(&s)], &mut inline).unwrap();

        // (10 + 100) * 1.5
        assert_eq!(buffer.capacity(), 165);
    }

    #[test]
    fn test_wide_string_stops_at_embedded_nul() {
        let t = template(vec![F::scalar("s", InType::UnicodeString)]);
        let packer = Packer::new(PackSettings::default());
        let units = [0x48u16, 0x69, 0, 0x21];
        let bytes = packer.pack_to_vec(&t, &[FieldValue::wide_units(&units)]).unwrap();
        assert_eq!(bytes, vec![0x48, 0, 0x69, 0, 0, 0]);
    }

    #[test]
    fn test_null_array_contributes_nothing() {
        let t = template(vec![
            F::scalar("n", InType::UInt32),
            F::array("v", InType::UInt32, "n"),
        ]);
        let packer = Packer::new(PackSettings::default());
        let bytes = packer
            .pack_to_vec(&t, &[FieldValue::UInt32(1000), FieldValue::Binary(None)])
            .unwrap();
        assert_eq!(bytes, vec![0xE8, 0x03, 0, 0]);
    }

    #[test]
    fn test_struct_uses_caller_element_size_unless_overridden() {
        let fields = vec![
            F::scalar("n", InType::UInt16),
            F::structure("items", Some("n")),
        ];
        let data: Vec<u8> = (0..12).collect();
        let packer = Packer::new(PackSettings::default());
        let values = [
            FieldValue::UInt16(2),
            FieldValue::Struct {
                element_size: 3,
                data: Some(&data),
            },
        ];

        let caller = packer.pack_to_vec(&template(fields.clone()), &values).unwrap();
        assert_eq!(caller, vec![2, 0, 0, 1, 2, 3, 4, 5]);

        let mut overrides = SizeOverrides::new();
        overrides.insert("Test", "items", SizeOverride::Element(5));
        let overridden = packer
            .pack_to_vec(&template_with(fields, overrides), &values)
            .unwrap();
        assert_eq!(overridden, vec![2, 0, 0, 1, 2, 3, 4, 5, 6, 7, 8, 9]);
    }

    #[test]
    fn test_total_override_ignores_count() {
        let mut overrides = SizeOverrides::new();
        overrides.insert("Test", "v", SizeOverride::Total(3));
        let t = template_with(
            vec![
                F::scalar("n", InType::UInt8),
                F::array("v", InType::UInt64, "n"),
            ],
            overrides,
        );
        let packer = Packer::new(PackSettings::default());
        let data = [9u8; 16];
        let bytes = packer
            .pack_to_vec(&t, &[FieldValue::UInt8(2), FieldValue::binary(&data)])
            .unwrap();
        assert_eq!(bytes, vec![2, 9, 9, 9]);
    }

    #[test]
    fn test_short_array_value_is_rejected() {
        let t = template(vec![
            F::scalar("n", InType::UInt32),
            F::array("v", InType::UInt16, "n"),
        ]);
        let packer = Packer::new(PackSettings::default());
        let err = packer
            .pack_to_vec(&t, &[FieldValue::UInt32(3), FieldValue::binary(&[1, 2, 3, 4])])
            .unwrap_err();
        assert_eq!(
            err,
            PackError::ValueTooShort {
                field: "v".to_owned(),
                need: 6,
                have: 4,
            }
        );
    }

    #[test]
    fn test_negative_count_is_rejected() {
        let t = template(vec![
            F::scalar("n", InType::Int32),
            F::array("v", InType::UInt8, "n"),
        ]);
        let packer = Packer::new(PackSettings::default());
        let err = packer
            .pack_to_vec(&t, &[FieldValue::Int32(-1), FieldValue::binary(&[1])])
            .unwrap_err();
        assert!(matches!(err, PackError::InvalidCount { value: -1, .. }));
    }

    #[test]
    fn test_count_overflow_is_rejected() {
        let t = template(vec![
            F::scalar("n", InType::UInt64),
            F::array("v", InType::UInt64, "n"),
        ]);
        let packer = Packer::new(PackSettings::default());
        let err = packer
            .pack_to_vec(&t, &[FieldValue::UInt64(u64::MAX), FieldValue::binary(&[1])])
            .unwrap_err();
        assert_eq!(err, PackError::Overflow);
    }

    #[test]
    fn test_type_and_arity_mismatches_are_rejected() {
        let t = template(vec![F::scalar("n", InType::UInt32)]);
        let packer = Packer::new(PackSettings::default());

        let err = packer.pack_to_vec(&t, &[FieldValue::Int32(1)]).unwrap_err();
        assert!(matches!(err, PackError::TypeMismatch { .. }));

        let err = packer.pack_to_vec(&t, &[]).unwrap_err();
        assert!(matches!(
            err,
            PackError::ArityMismatch {
                expected: 1,
                found: 0,
                ..
            }
        ));
    }

    #[test]
    fn test_payload_cap_is_enforced() {
        let t = template(vec![F::scalar("s", InType::AnsiString)]);
        let packer = Packer::new(PackSettings::new().max_payload_size(Some(8)));
        let err = packer
            .pack_to_vec(&t, &[FieldValue::narrow("123456789")])
            .unwrap_err();
        assert_eq!(err, PackError::PayloadTooLarge { size: 10, max: 8 });

        let bytes = packer.pack_to_vec(&t, &[FieldValue::narrow("1234567")]).unwrap();
        assert_eq!(bytes.len(), 8);
    }
}
