//! Chado-side phases of a load: change detection, extension term
//! synthesis and the merge itself.

mod anon;
mod detect;
mod merge;
mod ontology;

pub use anon::{AnonTermSynthesizer, ExtensionTuple, SynthesisReport};
pub use detect::{ChangeDetector, ChangeSet, LoadMode, LoadedGpad};
pub use merge::{MergeApplier, MergeReport, PropertyCounts, PropertyKind};
pub use ontology::Resolver;
