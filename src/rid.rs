use std::fmt::Display;

use serde::{Deserialize, Serialize};

// RID points to a record's slot within a table file.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct RID {
    page_no: u32,
    slot_no: u32,
}

impl RID {
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

impl Display for RID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RID({},{})", self.page_no(), self.slot_no())
    }
}
