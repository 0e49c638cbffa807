//! Caller-configurable ceilings on parser/serializer resource use.

/// Passed by value at `Parser`/`Serializer` construction, the same small
/// `Copy` options-struct shape used elsewhere for connection state handed
/// in at construction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Hard ceiling on a header's serialized size, including the
    /// field-index table's backing allocation. Also bounds the 16-bit
    /// offset table.
    pub max_header_size: u32,
    /// Hard ceiling on the number of fields (plus the start-line) a single
    /// header may carry.
    pub max_field_count: u32,
    /// Ceiling on a body's total length. `None` means unbounded.
    pub max_body_size: Option<u64>,
    /// Capacity of the parser's input `flat_buffer`.
    pub parse_buffer_capacity: u32,
    /// Capacity of the serializer's workspace arena.
    pub serializer_workspace_capacity: u32,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_header_size: 65_535,
            max_field_count: 100,
            max_body_size: None,
            parse_buffer_capacity: 8192,
            serializer_workspace_capacity: 16384,
        }
    }
}
