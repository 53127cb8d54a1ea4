use std::sync::Arc;

use log::{debug, trace};

use super::types::{FieldDefinition, InType, SizeOverride, SizeOverrideDefinition, TemplateDefinition};
use crate::FastMap;
use crate::err::{SchemaError, SchemaResult};
use crate::guid::GUID_SIZE;

/// Default inline allowance for one string field when sizing the inline buffer.
pub const DEFAULT_STRING_ALLOWANCE: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Bytes budgeted per string field in `estimated_inline_size`.
    pub string_allowance: usize,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        ResolveOptions {
            string_allowance: DEFAULT_STRING_ALLOWANCE,
        }
    }
}

/// Reference to the earlier field that supplies an element count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountRef {
    /// Position of the count field inside the template.
    pub index: usize,
    pub name: String,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ElementSize {
    /// Width of the declared element type.
    Natural(usize),
    /// Per-element width taken from the override table.
    Override(usize),
    /// Supplied alongside the value when packing.
    Caller,
    /// The whole contribution is this many bytes, whatever the count.
    Fixed(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireKind {
    FixedScalar {
        width: usize,
    },
    WideString,
    NarrowString,
    Guid,
    CountedArray {
        count: CountRef,
        element: ElementSize,
    },
    /// Opaque struct elements. Without a count field a single element is written.
    StructBlob {
        count: Option<CountRef>,
        element: ElementSize,
    },
}

impl WireKind {
    pub fn describe(&self) -> &'static str {
        match self {
            WireKind::FixedScalar { .. } => "scalar",
            WireKind::WideString => "wide string",
            WireKind::NarrowString => "narrow string",
            WireKind::Guid => "guid",
            WireKind::CountedArray { .. } => "array",
            WireKind::StructBlob { .. } => "struct",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    /// `None` for struct fields, which have no declared element type.
    pub in_type: Option<InType>,
    pub kind: WireKind,
}

impl Field {
    /// Contribution of this field to the inline size estimate.
    fn base_size(&self, options: &ResolveOptions) -> usize {
        match &self.kind {
            WireKind::FixedScalar { width } => *width,
            WireKind::Guid => GUID_SIZE,
            WireKind::WideString | WireKind::NarrowString => options.string_allowance,
            WireKind::CountedArray { element, .. } | WireKind::StructBlob { element, .. } => {
                match element {
                    ElementSize::Fixed(total) => *total,
                    _ => 0,
                }
            }
        }
    }
}

/// A resolved, immutable template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    name: String,
    fields: Vec<Field>,
    estimated_inline_size: usize,
}

impl Template {
    /// Resolves a single template definition.
    pub fn resolve(
        def: &TemplateDefinition,
        overrides: &SizeOverrides,
        options: &ResolveOptions,
    ) -> SchemaResult<Template> {
        let mut fields: Vec<Field> = Vec::with_capacity(def.fields.len());

        for field_def in &def.fields {
            if fields.iter().any(|f| f.name == field_def.name) {
                return Err(SchemaError::DuplicateField {
                    template: def.name.clone(),
                    field: field_def.name.clone(),
                });
            }

            let size_override = overrides.get(&def.name, &field_def.name);
            let field = resolve_field(&def.name, &def.fields, &fields, field_def, size_override)?;
            trace!("{}.{} -> {:?}", def.name, field.name, field.kind);
            fields.push(field);
        }

        let estimated_inline_size = fields
            .iter()
            .fold(0usize, |acc, f| acc.saturating_add(f.base_size(options)));

        Ok(Template {
            name: def.name.clone(),
            fields,
            estimated_inline_size,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Sum of each field's base contribution. Sizes the inline buffer; packing still grows
    /// past it on demand.
    pub fn estimated_inline_size(&self) -> usize {
        self.estimated_inline_size
    }
}

fn resolve_field(
    template: &str,
    all_defs: &[FieldDefinition],
    resolved: &[Field],
    def: &FieldDefinition,
    size_override: Option<SizeOverride>,
) -> SchemaResult<Field> {
    let in_type = match &def.in_type {
        Some(text) => Some(text.parse::<InType>().map_err(|_| SchemaError::UnknownInType {
            template: template.to_owned(),
            field: def.name.clone(),
            in_type: text.clone(),
        })?),
        None => None,
    };

    let count = match &def.count {
        Some(count) => Some(resolve_count(template, all_defs, resolved, &def.name, count)?),
        None => None,
    };

    let kind = match (def.is_struct, count, in_type) {
        (true, count, _) => {
            let element = match size_override {
                Some(SizeOverride::Element(n)) => ElementSize::Override(n as usize),
                Some(SizeOverride::Total(n)) => ElementSize::Fixed(n as usize),
                None => ElementSize::Caller,
            };
            WireKind::StructBlob { count, element }
        }
        (false, Some(count), Some(in_type)) => {
            let natural = in_type
                .natural_width()
                .ok_or_else(|| SchemaError::UnsupportedArrayElement {
                    template: template.to_owned(),
                    field: def.name.clone(),
                    in_type: in_type.name().to_owned(),
                })?;
            let element = match size_override {
                Some(SizeOverride::Element(n)) => ElementSize::Override(n as usize),
                Some(SizeOverride::Total(n)) => ElementSize::Fixed(n as usize),
                None => ElementSize::Natural(natural),
            };
            WireKind::CountedArray { count, element }
        }
        (false, None, Some(in_type)) => {
            if size_override.is_some() {
                return Err(SchemaError::OverrideOnScalar {
                    template: template.to_owned(),
                    field: def.name.clone(),
                });
            }
            match in_type {
                InType::UnicodeString => WireKind::WideString,
                InType::AnsiString => WireKind::NarrowString,
                InType::Guid => WireKind::Guid,
                InType::Binary => {
                    return Err(SchemaError::MissingCount {
                        template: template.to_owned(),
                        field: def.name.clone(),
                        in_type: in_type.name().to_owned(),
                    });
                }
                other => WireKind::FixedScalar {
                    // Every remaining type has a natural width.
                    width: other.natural_width().unwrap_or_default(),
                },
            }
        }
        (false, _, None) => {
            return Err(SchemaError::UnknownInType {
                template: template.to_owned(),
                field: def.name.clone(),
                in_type: String::new(),
            });
        }
    };

    Ok(Field {
        name: def.name.clone(),
        in_type,
        kind,
    })
}

fn resolve_count(
    template: &str,
    all_defs: &[FieldDefinition],
    resolved: &[Field],
    field: &str,
    count: &str,
) -> SchemaResult<CountRef> {
    match resolved.iter().position(|f| f.name == count) {
        Some(index) => {
            let is_integer = matches!(resolved[index].kind, WireKind::FixedScalar { .. })
                && resolved[index].in_type.is_some_and(InType::is_integer);
            if !is_integer {
                return Err(SchemaError::CountFieldNotInteger {
                    template: template.to_owned(),
                    field: field.to_owned(),
                    count: count.to_owned(),
                });
            }
            Ok(CountRef {
                index,
                name: count.to_owned(),
            })
        }
        None if all_defs.iter().any(|f| f.name == count) => Err(SchemaError::CountFieldOutOfOrder {
            template: template.to_owned(),
            field: field.to_owned(),
            count: count.to_owned(),
        }),
        None => Err(SchemaError::UnknownCountField {
            template: template.to_owned(),
            field: field.to_owned(),
            count: count.to_owned(),
        }),
    }
}

/// Per-field size overrides keyed by `(template, field)`.
#[derive(Debug, Clone, Default)]
pub struct SizeOverrides {
    by_template: FastMap<String, FastMap<String, SizeOverride>>,
}

impl SizeOverrides {
    pub fn new() -> Self {
        SizeOverrides::default()
    }

    pub fn from_definitions(defs: &[SizeOverrideDefinition]) -> Self {
        let mut overrides = SizeOverrides::new();
        for def in defs {
            overrides.insert(def.template.clone(), def.field.clone(), def.size);
        }
        overrides
    }

    pub fn insert(&mut self, template: impl Into<String>, field: impl Into<String>, size: SizeOverride) {
        self.by_template
            .entry(template.into())
            .or_default()
            .insert(field.into(), size);
    }

    pub fn get(&self, template: &str, field: &str) -> Option<SizeOverride> {
        self.by_template
            .get(template)
            .and_then(|fields| fields.get(field))
            .copied()
    }

    fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.by_template.iter().flat_map(|(template, fields)| {
            fields
                .keys()
                .map(move |field| (template.as_str(), field.as_str()))
        })
    }
}

/// All resolved templates of a schema, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct TemplateSet {
    templates: FastMap<String, Arc<Template>>,
}

impl TemplateSet {
    pub fn get(&self, name: &str) -> Option<&Arc<Template>> {
        self.templates.get(name)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Template>> {
        self.templates.values()
    }
}

/// Resolves every template definition. Deterministic: the same input always produces the same
/// templates or the same first error.
pub fn resolve(
    defs: &[TemplateDefinition],
    overrides: &SizeOverrides,
    options: &ResolveOptions,
) -> SchemaResult<TemplateSet> {
    let mut templates: FastMap<String, Arc<Template>> = FastMap::default();

    for def in defs {
        if templates.contains_key(def.name.as_str()) {
            return Err(SchemaError::DuplicateTemplate {
                template: def.name.clone(),
            });
        }
        let template = Template::resolve(def, overrides, options)?;
        debug!(
            "resolved template `{}` ({} fields, ~{} inline bytes)",
            template.name(),
            template.len(),
            template.estimated_inline_size()
        );
        templates.insert(def.name.clone(), Arc::new(template));
    }

    // Sorted so the reported override does not depend on hash order.
    let mut dangling: Vec<(&str, &str)> = overrides
        .iter()
        .filter(|(template, field)| {
            templates
                .get(*template)
                .is_none_or(|t| t.field(field).is_none())
        })
        .collect();
    dangling.sort_unstable();
    if let Some((template, field)) = dangling.first() {
        return Err(SchemaError::UnknownOverride {
            template: (*template).to_owned(),
            field: (*field).to_owned(),
        });
    }

    Ok(TemplateSet { templates })
}
