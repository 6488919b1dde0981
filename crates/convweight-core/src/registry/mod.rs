//! Closed registries of quantization schemes, model architectures and source
//! weight formats.
//!
//! Each registry is an enum with a static identifier table. Lookups by name
//! fail with the list of valid choices so the CLI can report them verbatim.

mod model;
mod quantization;
mod source_format;

pub use model::{ModelSpec, ModelType};
pub use quantization::{Quantization, QuantizationKind, QuantizationScheme, WeightLayout};
pub use source_format::SourceFormat;

use crate::error::join_choices;

/// A closed set of named variants.
pub trait RegistryKey: Copy + Sized + 'static {
    /// Every variant, in the order choices are listed to the user.
    const ALL: &'static [Self];

    /// Identifier accepted on the command line.
    fn name(&self) -> &'static str;

    /// Find the variant registered under `name`.
    fn lookup(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|v| v.name() == name)
    }

    /// Comma-separated list of every identifier.
    fn choices() -> String {
        join_choices(Self::ALL.iter().map(|v| v.name()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn assert_unique_names<T: RegistryKey>() {
        let names: HashSet<_> = T::ALL.iter().map(|v| v.name()).collect();
        assert_eq!(names.len(), T::ALL.len());
    }

    #[test]
    fn test_registry_names_are_unique() {
        assert_unique_names::<Quantization>();
        assert_unique_names::<ModelType>();
        assert_unique_names::<SourceFormat>();
    }

    #[test]
    fn test_lookup_roundtrip() {
        for q in Quantization::ALL {
            assert_eq!(Quantization::lookup(q.name()), Some(*q));
        }
        for m in ModelType::ALL {
            assert_eq!(ModelType::lookup(m.name()), Some(*m));
        }
    }

    #[test]
    fn test_lookup_is_exact() {
        assert_eq!(Quantization::lookup("Q4F16_1"), None);
        assert_eq!(ModelType::lookup("auto"), None);
    }
}
