use crate::{CoreError, MAX_NUM_OF_SLICES, PARENT_CLASS_STRIDE};
use netops_schema::SliceName;
use std::collections::BTreeMap;

/// Hands out per-slice parent class numbers from a bounded space.
///
/// Candidates are `i * stride` for `i` in `1..=max_slices`; the lowest free
/// one wins, so released numbers are reused before new ones are taken.
#[derive(Debug, Clone)]
pub struct ClassIdAllocator {
    stride: u32,
    max_slices: u32,
    owners: BTreeMap<u32, SliceName>,
}

impl Default for ClassIdAllocator {
    fn default() -> Self {
        Self::with_limits(PARENT_CLASS_STRIDE, MAX_NUM_OF_SLICES)
    }
}

impl ClassIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(stride: u32, max_slices: u32) -> Self {
        Self {
            stride,
            max_slices,
            owners: BTreeMap::new(),
        }
    }

    pub fn allocate(&mut self, slice_name: &SliceName) -> Result<u32, CoreError> {
        let free = (1..=self.max_slices)
            .map(|i| i * self.stride)
            .find(|id| !self.owners.contains_key(id))
            .ok_or_else(|| CoreError::ResourceExhausted(slice_name.to_string()))?;
        self.owners.insert(free, slice_name.clone());
        Ok(free)
    }

    /// Free `class_id`, returning the slice that held it.
    pub fn release(&mut self, class_id: u32) -> Option<SliceName> {
        self.owners.remove(&class_id)
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}
