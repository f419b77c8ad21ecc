//! Point lookups over loaded tables
//!
//! - By path: linear scan, used once per port during a rebuild
//! - By id: binary search over the id-sorted port slots
//! - Files of a port: binary search over the plist, then expansion to every
//!   adjacent line with the same id

use crate::error::{StoreError, StoreResult};
use crate::port::Port;
use crate::store::loader::{PlistTable, PortTable};

impl<'a> PortTable<'a> {
    /// First port whose path equals `path`
    pub fn find_by_path(&self, path: &str) -> Option<&Port<'a>> {
        self.iter().find(|p| p.path() == path)
    }

    /// Port with id `id`
    ///
    /// A miss means the plist references a port the index does not contain,
    /// which is corruption.
    pub fn find_by_id(&self, id: u32) -> StoreResult<&Port<'a>> {
        let slot = self.position_of(id).ok_or(StoreError::UnknownPortId { id })?;
        self.slots[slot]
            .as_ref()
            .ok_or(StoreError::UnknownPortId { id })
    }

    /// Mutable port with id `id`
    pub fn find_by_id_mut(&mut self, id: u32) -> StoreResult<&mut Port<'a>> {
        let slot = self.position_of(id).ok_or(StoreError::UnknownPortId { id })?;
        self.slots[slot]
            .as_mut()
            .ok_or(StoreError::UnknownPortId { id })
    }

    fn position_of(&self, id: u32) -> Option<usize> {
        // Empty slots sort first; search only the populated tail
        let first = self.slots.partition_point(Option::is_none);
        self.slots[first..]
            .binary_search_by_key(&id, |slot| slot.as_ref().map_or(0, |p| p.id))
            .ok()
            .map(|i| first + i)
    }
}

impl<'a> PlistTable<'a> {
    /// Every file installed by port `port_id`, in packing-list order
    ///
    /// The binary search may land on any of the port's lines, so the match is
    /// widened in both directions while the neighbours share the id.
    pub fn files_for_port(&self, port_id: u32) -> Vec<&'a str> {
        let lines = &self.lines;

        let Ok(hit) = lines.binary_search_by_key(&port_id, |l| l.port_id) else {
            return Vec::new();
        };

        let mut start = hit;
        while start > 0 && lines[start - 1].port_id == port_id {
            start -= 1;
        }

        let mut end = hit + 1;
        while end < lines.len() && lines[end].port_id == port_id {
            end += 1;
        }

        lines[start..end].iter().map(|l| l.file).collect()
    }
}
