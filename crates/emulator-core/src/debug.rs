//! Symbol information produced by the assembler.

use std::collections::BTreeMap;

use crate::Word;

/// A data region placed after the code.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct BufferInfo {
    /// Display name: `sN` for strings, `$name` for buffers.
    pub name: String,
    /// Length in words, including a string's terminator.
    pub size: usize,
}

/// Address to label maps of one assembled image.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct DebugDatabase {
    /// Labeled addresses. When several labels share an address the first
    /// declared one is kept.
    pub points: BTreeMap<Word, String>,
    /// Data regions by start address.
    pub values: BTreeMap<Word, BufferInfo>,
    /// Address of the first data word.
    pub code_end: Word,
}

impl DebugDatabase {
    /// Label at `address`, if any.
    #[must_use]
    pub fn label_at(&self, address: Word) -> Option<&str> {
        self.points.get(&address).map(String::as_str)
    }

    /// Address of `label`.
    #[must_use]
    pub fn address_of(&self, label: &str) -> Option<Word> {
        self.points
            .iter()
            .find(|(_, name)| name.as_str() == label)
            .map(|(address, _)| *address)
    }

    /// Data region containing `address`.
    #[must_use]
    pub fn buffer_containing(&self, address: Word) -> Option<(Word, &BufferInfo)> {
        let (start, info) = self.values.range(..=address).next_back()?;
        (usize::from(address - start) < info.size).then_some((*start, info))
    }
}
