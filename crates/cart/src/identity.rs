//! Line identity and diffing.
//!
//! Two lines denote the same slot if they share a confirmed line ID. When
//! either side is an optimistic placeholder (no ID yet), they match on the
//! variant plus the unordered set of selected options instead.

use std::collections::BTreeSet;

use naked_pineapple_core::{CartLineId, VariantId};

use crate::model::{CartLine, Merchandise, SelectedOption};

/// Identity of merchandise independent of any cart line ID.
///
/// Options compare as an unordered set of `(name, value)` pairs. Both name
/// and value are case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MerchandiseKey {
    variant_id: VariantId,
    options: BTreeSet<(String, String)>,
}

impl MerchandiseKey {
    /// Build a key from a variant and its selected options.
    #[must_use]
    pub fn new(variant_id: VariantId, options: &[SelectedOption]) -> Self {
        Self {
            variant_id,
            options: normalize_options(options),
        }
    }

    /// The variant this key refers to.
    #[must_use]
    pub const fn variant_id(&self) -> &VariantId {
        &self.variant_id
    }
}

impl From<&Merchandise> for MerchandiseKey {
    fn from(merchandise: &Merchandise) -> Self {
        Self::new(
            merchandise.variant_id.clone(),
            &merchandise.selected_options,
        )
    }
}

impl From<&CartLine> for MerchandiseKey {
    fn from(line: &CartLine) -> Self {
        Self::from(&line.merchandise)
    }
}

/// Normalize selected options into an order-independent set.
#[must_use]
pub fn normalize_options(options: &[SelectedOption]) -> BTreeSet<(String, String)> {
    options
        .iter()
        .map(|o| (o.name.clone(), o.value.clone()))
        .collect()
}

/// Whether two lines denote the same logical slot.
#[must_use]
pub fn same_slot(a: &CartLine, b: &CartLine) -> bool {
    match (&a.id, &b.id) {
        (Some(left), Some(right)) => left == right,
        _ => MerchandiseKey::from(a) == MerchandiseKey::from(b),
    }
}

/// Index of the line an add for `key` should merge into.
#[must_use]
pub fn find_slot(lines: &[CartLine], key: &MerchandiseKey) -> Option<usize> {
    lines
        .iter()
        .position(|line| MerchandiseKey::from(line) == *key)
}

/// What a pending action locks against concurrent edits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LineTarget {
    /// A confirmed cart line.
    Line(CartLineId),
}
