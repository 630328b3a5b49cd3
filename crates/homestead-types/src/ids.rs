//! Type-safe identifier wrappers around `u64`.
//!
//! Every entity in the colony has a strongly-typed ID to prevent accidental
//! mixing of identifiers at compile time. IDs are handed out by a single
//! monotonic [`IdAllocator`] owned by the colony, so a smaller ID always
//! means an older entity. The task pool relies on that ordering to find the
//! oldest unassigned task.

use serde::{Deserialize, Serialize};

/// Generates a newtype wrapper around `u64` with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            /// Return the inner integer value.
            pub const fn into_inner(self) -> u64 {
                self.0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for u64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Unique identifier for a task in the global task registry.
    TaskId
}

define_id! {
    /// Unique identifier for an item lying on a tile or carried by a worker.
    ItemId
}

define_id! {
    /// Unique identifier for a worker.
    WorkerId
}

define_id! {
    /// Unique identifier for a building.
    BuildingId
}

/// Monotonic source of identifiers shared by every entity kind.
///
/// A default-constructed allocator starts at 1. Zero is never issued.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdAllocator {
    next: u64,
}

impl IdAllocator {
    /// Create an allocator whose first issued ID is 1.
    pub const fn new() -> Self {
        Self { next: 1 }
    }

    /// The value the next call to [`Self::next_raw`] will return.
    pub const fn peek(&self) -> u64 {
        if self.next == 0 { 1 } else { self.next }
    }

    /// Issue the next raw identifier.
    pub const fn next_raw(&mut self) -> u64 {
        let id = self.peek();
        self.next = id.saturating_add(1);
        id
    }

    /// Make sure `raw` will never be issued again.
    ///
    /// Used after loading a snapshot so new IDs do not collide with the
    /// restored ones.
    pub const fn observe(&mut self, raw: u64) {
        if raw >= self.peek() {
            self.next = raw.saturating_add(1);
        }
    }

    /// Issue a new [`TaskId`].
    pub const fn next_task(&mut self) -> TaskId {
        TaskId(self.next_raw())
    }

    /// Issue a new [`ItemId`].
    pub const fn next_item(&mut self) -> ItemId {
        ItemId(self.next_raw())
    }

    /// Issue a new [`WorkerId`].
    pub const fn next_worker(&mut self) -> WorkerId {
        WorkerId(self.next_raw())
    }

    /// Issue a new [`BuildingId`].
    pub const fn next_building(&mut self) -> BuildingId {
        BuildingId(self.next_raw())
    }
}
