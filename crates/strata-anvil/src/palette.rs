use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use strata_common::error::StrataError;
use strata_common::types::Result;
use strata_nbt::{Compound, Tag};

pub const AIR: &str = "minecraft:air";

/// One voxel-state descriptor: a block name plus its string properties.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockState {
    pub name: String,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl BlockState {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: BTreeMap::new(),
        }
    }

    pub fn air() -> Self {
        Self::new(AIR)
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Reads a palette entry: `Name` is required, `Properties` is an optional compound of
    /// strings.
    pub fn from_tag(tag: &Tag) -> Result<Self> {
        let compound = tag.as_compound()?;
        let name = compound.require("Name")?.as_str()?.to_owned();

        let mut properties = BTreeMap::new();
        if let Some(props) = compound.get("Properties") {
            for (key, value) in props.as_compound()?.iter() {
                properties.insert(key.to_owned(), value.as_str()?.to_owned());
            }
        }

        Ok(Self { name, properties })
    }

    pub fn to_tag(&self) -> Tag {
        let mut compound = Compound::new();
        compound.insert("Name", Tag::String(self.name.clone()));
        if !self.properties.is_empty() {
            let props = self
                .properties
                .iter()
                .map(|(key, value)| (key.clone(), Tag::String(value.clone())))
                .collect::<Compound>();
            compound.insert("Properties", Tag::Compound(props));
        }
        Tag::Compound(compound)
    }
}

/// Append-only list of distinct block states. The position of a state is the value stored
/// for it in the section's index array, so entries are never removed or reordered.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Palette {
    entries: Vec<BlockState>,
    state_to_index: HashMap<BlockState, u32>,
}

impl Palette {
    /// Builds a palette from a decoded list. A repeated state keeps its first index.
    pub fn from_list(entries: Vec<BlockState>) -> Self {
        let mut state_to_index = HashMap::with_capacity(entries.len());
        for (index, state) in entries.iter().enumerate() {
            state_to_index.entry(state.clone()).or_insert(index as u32);
        }
        Self {
            entries,
            state_to_index,
        }
    }

    /// A fresh palette whose index 0 is `background`.
    pub fn with_background(background: BlockState) -> Self {
        Self::from_list(vec![background])
    }

    pub fn from_tag(tag: &Tag) -> Result<Self> {
        let entries = tag
            .as_list()?
            .iter()
            .map(BlockState::from_tag)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::from_list(entries))
    }

    pub fn to_tag(&self) -> Tag {
        Tag::List(self.entries.iter().map(BlockState::to_tag).collect())
    }

    pub fn get(&self, index: u32) -> Option<&BlockState> {
        self.entries.get(index as usize)
    }

    /// Like [`Palette::get`], but an index outside the palette means the index array and
    /// the palette disagree.
    pub fn require(&self, index: u32) -> Result<&BlockState> {
        self.get(index).ok_or_else(|| {
            StrataError::Corruption(format!(
                "palette index {} out of range for {} entries",
                index,
                self.entries.len()
            ))
        })
    }

    pub fn index_of(&self, state: &BlockState) -> Option<u32> {
        self.state_to_index.get(state).copied()
    }

    /// Returns the index of `state`, appending it first if needed. The flag tells whether
    /// the palette grew.
    pub fn insert(&mut self, state: BlockState) -> (u32, bool) {
        if let Some(index) = self.index_of(&state) {
            return (index, false);
        }
        let index = self.entries.len() as u32;
        self.state_to_index.insert(state.clone(), index);
        self.entries.push(state);
        (index, true)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BlockState> {
        self.entries.iter()
    }

    pub fn to_list(&self) -> Vec<BlockState> {
        self.entries.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn stone() -> BlockState {
        BlockState::new("minecraft:stone")
    }

    #[test]
    fn test_insert_is_append_only() {
        let mut palette = Palette::with_background(BlockState::air());
        assert_eq!(palette.len(), 1);
        assert_eq!(palette.get(0), Some(&BlockState::air()));

        assert_eq!(palette.insert(stone()), (1, true));
        assert_eq!(palette.insert(stone()), (1, false));
        assert_eq!(palette.insert(BlockState::air()), (0, false));

        let log = BlockState::new("minecraft:oak_log").with_property("axis", "y");
        assert_eq!(palette.insert(log.clone()), (2, true));
        assert_eq!(palette.to_list(), vec![BlockState::air(), stone(), log]);
    }

    #[test]
    fn test_structural_equality() {
        let mut palette = Palette::default();
        let a = BlockState::new("minecraft:oak_log").with_property("axis", "y");
        let b = BlockState::new("minecraft:oak_log").with_property("axis", "x");
        assert_eq!(palette.insert(a.clone()), (0, true));
        assert_eq!(palette.insert(b), (1, true));
        assert_eq!(
            palette.index_of(&BlockState::new("minecraft:oak_log").with_property("axis", "y")),
            Some(0)
        );
        assert_eq!(palette.index_of(&a), Some(0));
    }

    #[test]
    fn test_tag_round_trip() {
        let list = vec![
            BlockState::air(),
            BlockState::new("minecraft:furnace")
                .with_property("facing", "north")
                .with_property("lit", "false"),
        ];
        let palette = Palette::from_list(list.clone());
        let read = Palette::from_tag(&palette.to_tag()).unwrap();
        assert_eq!(read.to_list(), list);

        // Air has no Properties entry at all
        let air = BlockState::air().to_tag();
        assert!(air.as_compound().unwrap().get("Properties").is_none());
    }

    #[test]
    fn test_bad_entries() {
        let mut compound = Compound::new();
        compound.insert("Properties", Tag::Compound(Compound::new()));
        assert_matches!(
            BlockState::from_tag(&Tag::Compound(compound)),
            Err(StrataError::Malformed(_))
        );

        let mut compound = Compound::new();
        compound.insert("Name", Tag::Int(1));
        assert_matches!(
            BlockState::from_tag(&Tag::Compound(compound)),
            Err(StrataError::TypeMismatch { .. })
        );

        let palette = Palette::with_background(BlockState::air());
        assert_matches!(palette.require(1), Err(StrataError::Corruption(_)));
    }

    #[test]
    fn test_json() {
        let state: BlockState =
            serde_json::from_str(r#"{"name":"minecraft:stone"}"#).unwrap();
        assert_eq!(state, stone());
        let json = serde_json::to_string(&stone().with_property("a", "b")).unwrap();
        assert_eq!(json, r#"{"name":"minecraft:stone","properties":{"a":"b"}}"#);
    }
}
