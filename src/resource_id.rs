use core::fmt;

use serde::{Deserialize, Serialize};

use crate::rid::RID;

/// File descriptor of a table's data file.
pub type FileId = i32;

/// Identifies the open interval in an index that sits immediately before
/// the entry at the given position. Inserts into that interval conflict
/// with scans that have visited it.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct GapId {
    page_no: u32,
    slot_no: u32,
}

impl GapId {
    pub fn new(page_no: u32, slot_no: u32) -> Self {
        Self { page_no, slot_no }
    }

    pub fn page_no(&self) -> u32 {
        self.page_no
    }

    pub fn slot_no(&self) -> u32 {
        self.slot_no
    }
}

impl fmt::Display for GapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Gap({},{})", self.page_no, self.slot_no)
    }
}

/// What a lock protects within a table file.
///
/// The three kinds are separate namespaces: a gap on file 3 never
/// collides with a record or the table itself on file 3.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceTarget {
    Table,
    Record(RID),
    Gap(GapId),
}

/// ResourceId is the lock table's key: one lockable thing in the database.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceId {
    file_id: FileId,
    target: ResourceTarget,
}

impl ResourceId {
    /// The whole table stored in `file_id`.
    pub fn table(file_id: FileId) -> Self {
        Self {
            file_id,
            target: ResourceTarget::Table,
        }
    }

    /// A single record of the table stored in `file_id`.
    pub fn record(file_id: FileId, rid: RID) -> Self {
        Self {
            file_id,
            target: ResourceTarget::Record(rid),
        }
    }

    /// An index gap of the table stored in `file_id`.
    pub fn gap(file_id: FileId, gap: GapId) -> Self {
        Self {
            file_id,
            target: ResourceTarget::Gap(gap),
        }
    }

    pub fn file_id(&self) -> FileId {
        self.file_id
    }

    pub fn target(&self) -> ResourceTarget {
        self.target
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.target {
            ResourceTarget::Table => write!(f, "[{}/table]", self.file_id),
            ResourceTarget::Record(rid) => write!(f, "[{}/{}]", self.file_id, rid),
            ResourceTarget::Gap(gap) => write!(f, "[{}/{}]", self.file_id, gap),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn kinds_are_disjoint_namespaces() {
        let table = ResourceId::table(3);
        let record = ResourceId::record(3, RID::new(1, 1));
        let gap = ResourceId::gap(3, GapId::new(1, 1));

        assert_ne!(table, record);
        assert_ne!(table, gap);
        assert_ne!(record, gap);

        let mut set = HashSet::new();
        set.insert(table);
        set.insert(record);
        set.insert(gap);
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn same_target_same_key() {
        let a = ResourceId::record(7, RID::new(2, 5));
        let b = ResourceId::record(7, RID::new(2, 5));
        assert_eq!(a, b);

        // Different file, same record position
        let c = ResourceId::record(8, RID::new(2, 5));
        assert_ne!(a, c);
    }
}
