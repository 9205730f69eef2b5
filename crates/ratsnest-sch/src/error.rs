use thiserror::Error;

/// Errors surfaced while building or finalizing a schematic.
///
/// Every failing operation is atomic: an `Err` means the graph is unchanged
/// by that call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchError {
    /// The catalog has no template for `library:name`.
    #[error("no part `{library}:{name}` in catalog")]
    CatalogLookup { library: String, name: String },

    /// Pin identifier absent from the instance's template.
    #[error("part {part} has no pin `{pin}`")]
    UnknownPin { part: String, pin: String },

    /// A part or net id this schematic does not own.
    #[error("{kind} id {id} is not owned by this schematic")]
    ForeignId { kind: &'static str, id: u32 },

    /// Finalize-time re-check of pin uniqueness failed: one pin is a member
    /// of two live nets.
    #[error("pin {part}.{pin} is bound to both `{first}` and `{second}`")]
    PinConflict {
        part: String,
        pin: String,
        first: String,
        second: String,
    },

    /// Series wiring takes a part with exactly two pins.
    #[error("part {part} has {pins} pins, series wiring needs exactly two")]
    NotTwoPin { part: String, pins: usize },

    /// Value and footprint labels must be non-empty.
    #[error("empty {field} for part {part}")]
    EmptyLabel { part: String, field: &'static str },
}
