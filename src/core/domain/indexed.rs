// src/core/domain/indexed.rs

//! The `create_index` / `modify_index` pair every replicated entity carries.

use serde::{Deserialize, Serialize};

/// Raft-log-commit-index bookkeeping shared by every row in every table.
///
/// `create_index` is assigned once, at the commit that first inserted the row,
/// and never changes afterwards. `modify_index` is bumped on every commit that
/// touches the row, including the one that created it (so initially
/// `create_index == modify_index`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Indices {
    pub create_index: u64,
    pub modify_index: u64,
}

impl Indices {
    pub fn new_at(index: u64) -> Self {
        Self {
            create_index: index,
            modify_index: index,
        }
    }

    /// Record a mutation committed at `index`, preserving `create_index`.
    pub fn touch(&mut self, index: u64) {
        debug_assert!(index >= self.modify_index, "indices must not regress");
        self.modify_index = index;
    }
}

/// A trait implemented by every row type so generic table code can read and
/// update the bookkeeping fields without matching on the concrete entity.
pub trait Indexed {
    fn indices(&self) -> Indices;
    fn indices_mut(&mut self) -> &mut Indices;
}

#[macro_export]
macro_rules! impl_indexed {
    ($ty:ty) => {
        impl $crate::core::domain::indexed::Indexed for $ty {
            fn indices(&self) -> $crate::core::domain::indexed::Indices {
                self.indices
            }
            fn indices_mut(&mut self) -> &mut $crate::core::domain::indexed::Indices {
                &mut self.indices
            }
        }
    };
}
