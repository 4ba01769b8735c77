use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// An immutable, cheaply clonable block state: a namespaced id plus optional properties.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct BlockState(Arc<BlockStateData>);

#[derive(PartialEq, Eq, Hash, Debug)]
struct BlockStateData {
    name: String,
    properties: BTreeMap<String, String>,
}

impl BlockState {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_properties(name, BTreeMap::new())
    }

    pub fn with_properties(name: impl Into<String>, properties: BTreeMap<String, String>) -> Self {
        let mut name = name.into();
        if !name.contains(':') {
            name = format!("minecraft:{name}");
        }
        BlockState(Arc::new(BlockStateData { name, properties }))
    }

    pub fn air() -> Self {
        Self::new("minecraft:air")
    }

    pub fn water() -> Self {
        Self::new("minecraft:water")
    }

    pub fn lava() -> Self {
        Self::new("minecraft:lava")
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.0.properties.get(key).map(String::as_str)
    }

    /// Compares the block id only, ignoring properties.
    pub fn is(&self, name: &str) -> bool {
        self.0.name == name
            || (!name.contains(':')
                && self.0.name.strip_prefix("minecraft:") == Some(name))
    }

    pub fn is_air(&self) -> bool {
        self.is("minecraft:air") || self.is("minecraft:cave_air") || self.is("minecraft:void_air")
    }

    /// Fluid blocks and waterlogged blocks.
    pub fn has_fluid(&self) -> bool {
        self.is("minecraft:water") || self.is("minecraft:lava") || self.property("waterlogged") == Some("true")
    }
}

impl std::fmt::Debug for BlockState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

impl Display for BlockState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0.name)?;
        if !self.0.properties.is_empty() {
            f.write_str("[")?;
            for (i, (key, value)) in self.0.properties.iter().enumerate() {
                if i > 0 {
                    f.write_str(",")?;
                }
                write!(f, "{key}={value}")?;
            }
            f.write_str("]")?;
        }
        Ok(())
    }
}
