use crate::schema::{DEFAULT_STRING_ALLOWANCE, ResolveOptions};

/// Smallest capacity a payload buffer grows to.
pub const DEFAULT_GROWTH_FLOOR: usize = 32;

/// Tuning knobs for template resolution and payload packing.
///
/// ```
/// use evpipe::PackSettings;
///
/// let settings = PackSettings::new()
///     .growth_floor(64)
///     .max_payload_size(Some(64 * 1024));
/// assert_eq!(settings.get_growth_floor(), 64);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackSettings {
    growth_floor: usize,
    string_allowance: usize,
    max_payload_size: Option<usize>,
}

impl Default for PackSettings {
    fn default() -> Self {
        PackSettings {
            growth_floor: DEFAULT_GROWTH_FLOOR,
            string_allowance: DEFAULT_STRING_ALLOWANCE,
            max_payload_size: None,
        }
    }
}

impl PackSettings {
    pub fn new() -> Self {
        PackSettings::default()
    }

    /// Minimum capacity of the first heap block.
    pub fn growth_floor(mut self, growth_floor: usize) -> Self {
        self.growth_floor = growth_floor;
        self
    }

    /// Inline bytes budgeted per string field when estimating a template's footprint.
    pub fn string_allowance(mut self, string_allowance: usize) -> Self {
        self.string_allowance = string_allowance;
        self
    }

    /// Rejects payloads larger than this. `None` (the default) means unbounded.
    pub fn max_payload_size(mut self, max_payload_size: Option<usize>) -> Self {
        self.max_payload_size = max_payload_size;
        self
    }

    pub fn get_growth_floor(&self) -> usize {
        self.growth_floor
    }

    pub fn get_string_allowance(&self) -> usize {
        self.string_allowance
    }

    pub fn get_max_payload_size(&self) -> Option<usize> {
        self.max_payload_size
    }

    pub fn resolve_options(&self) -> ResolveOptions {
        ResolveOptions {
            string_allowance: self.string_allowance,
        }
    }
}
