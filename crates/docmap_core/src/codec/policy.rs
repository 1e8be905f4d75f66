//! Export policies.

use crate::schema::FieldDescriptor;

/// Target of an export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportMode {
    /// Documents written to the store; carries the document identifier.
    Storage,
    /// Documents rendered for presentation; never carries the identifier.
    Presentation,
}

/// One marshalling mode.
///
/// Nested entities are embedded in full when their field carries the
/// full-save tag, or while the current entity hop is within
/// `embed_depth`. Otherwise they are written as their key data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExportPolicy {
    /// Storage or presentation.
    pub mode: ExportMode,
    /// Drop null fields of each encoded entity.
    pub omit_null: bool,
    /// Number of entity hops embedded without a full-save tag.
    pub embed_depth: u32,
}

impl ExportPolicy {
    /// Store documents, nulls kept.
    pub const STORAGE: ExportPolicy = ExportPolicy {
        mode: ExportMode::Storage,
        omit_null: false,
        embed_depth: 0,
    };

    /// Store documents, null fields dropped.
    pub const STORAGE_IGNORE_NULL: ExportPolicy = ExportPolicy {
        mode: ExportMode::Storage,
        omit_null: true,
        embed_depth: 0,
    };

    /// Presentation, null fields dropped.
    pub const JSON: ExportPolicy = ExportPolicy {
        mode: ExportMode::Presentation,
        omit_null: true,
        embed_depth: 0,
    };

    /// Presentation, nulls kept.
    pub const JSON_WITH_NULL: ExportPolicy = ExportPolicy {
        mode: ExportMode::Presentation,
        omit_null: false,
        embed_depth: 0,
    };

    /// Presentation embedding one entity hop, null fields dropped.
    pub const JSON_INNER_1: ExportPolicy = ExportPolicy::JSON.with_embed_depth(1);

    /// Presentation embedding one entity hop, nulls kept.
    pub const JSON_INNER_1_WITH_NULL: ExportPolicy = ExportPolicy::JSON_WITH_NULL.with_embed_depth(1);

    /// Presentation embedding two entity hops, null fields dropped.
    pub const JSON_INNER_2: ExportPolicy = ExportPolicy::JSON.with_embed_depth(2);

    /// Presentation embedding two entity hops, nulls kept.
    pub const JSON_INNER_2_WITH_NULL: ExportPolicy = ExportPolicy::JSON_WITH_NULL.with_embed_depth(2);

    /// Returns this policy with another embed depth.
    #[must_use]
    pub const fn with_embed_depth(mut self, depth: u32) -> Self {
        self.embed_depth = depth;
        self
    }

    /// Returns this policy with another null handling.
    #[must_use]
    pub const fn with_omit_null(mut self, omit_null: bool) -> Self {
        self.omit_null = omit_null;
        self
    }

    /// Whether encoded documents carry the document identifier.
    pub fn includes_id(&self) -> bool {
        self.mode == ExportMode::Storage
    }
}

/// State threaded through one encode call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeContext {
    policy: ExportPolicy,
    depth: u32,
    full_save: bool,
    reference: bool,
}

impl EncodeContext {
    /// Context for encoding a root entity under `policy`.
    pub fn new(policy: ExportPolicy) -> Self {
        Self {
            policy,
            depth: 0,
            full_save: false,
            reference: false,
        }
    }

    /// Context that never embeds nested entities, used for keys and filter
    /// operands.
    pub fn identity() -> Self {
        Self::new(ExportPolicy::STORAGE)
    }

    /// Active policy.
    pub fn policy(&self) -> ExportPolicy {
        self.policy
    }

    /// Entity hops from the root.
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Returns true if an entity met in this context is embedded in full.
    pub fn embeds(&self) -> bool {
        if self.reference {
            return false;
        }
        self.full_save || self.depth < self.policy.embed_depth
    }

    /// Context for the value of `field` of the current entity.
    pub(crate) fn for_field(&self, field: &FieldDescriptor) -> Self {
        Self {
            full_save: field.is_full_save(),
            reference: field.is_reference(),
            ..*self
        }
    }

    /// Context for the fields of an embedded entity.
    pub(crate) fn nested(&self) -> Self {
        Self {
            depth: self.depth + 1,
            full_save: false,
            reference: false,
            ..*self
        }
    }

    /// Context that embeds whatever entity it meets next.
    pub(crate) fn embedding(&self) -> Self {
        Self {
            full_save: true,
            reference: false,
            ..*self
        }
    }
}
