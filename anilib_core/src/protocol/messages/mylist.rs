//! MYLIST records

use serde::{Deserialize, Serialize};

/// Storage state of a list entry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MyListState {
    Unknown,
    #[default]
    OnHdd,
    OnCd,
    Deleted,
}

impl MyListState {
    pub fn code(self) -> u8 {
        match self {
            MyListState::Unknown => 0,
            MyListState::OnHdd => 1,
            MyListState::OnCd => 2,
            MyListState::Deleted => 3,
        }
    }
}

/// Result of MYLISTADD
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MyListAddOutcome {
    /// 210, carries the new list id
    Added { lid: u64 },
    /// 310, the file was already in the list
    AlreadyInList { lid: Option<u64> },
    /// 311, an existing entry was edited
    Edited { entries: u32 },
}
