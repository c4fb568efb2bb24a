use std::any::TypeId;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use prism_codec::{FixedPack, Packable};

use crate::error::Error;
use crate::shape::{
    decode_empty, decode_object, decode_object_list, decode_ready, decode_string,
    decode_string_list, decode_value, decode_value_list, decode_value_set, DecodeFn,
    ShapeCategory, ShapeEntry, ShapeIndex,
};

pub(crate) const READY_INDEX: ShapeIndex = 0;
pub(crate) const EMPTY_INDEX: ShapeIndex = 1;
pub(crate) const STR_INDEX: ShapeIndex = 2;
pub(crate) const STR_LIST_INDEX: ShapeIndex = 3;

/// Per-channel table of registered payload shapes.
///
/// Indices are assigned monotonically and never reused. Both peers construct
/// the same default table and must register any custom types in the same
/// order before traffic starts; the table freezes at the first encode or
/// decode of a user envelope, after which registration fails.
///
/// Re-registering a known type is a no-op that returns the existing index.
pub(crate) struct TypeRegistry {
    channel: String,
    entries: Vec<Arc<ShapeEntry>>,
    by_type: HashMap<(TypeId, ShapeCategory), ShapeIndex>,
    frozen: bool,
}

impl TypeRegistry {
    /// Builds the default table shared by every channel: the internal ready
    /// signal, the untyped shapes, and value shapes for the built-in scalars
    /// in a fixed order.
    pub fn with_defaults(channel: &str) -> Self {
        let mut registry = Self {
            channel: channel.to_string(),
            entries: Vec::new(),
            by_type: HashMap::new(),
            frozen: false,
        };

        registry.push(ShapeCategory::Ready, "ready", decode_ready);
        registry.push(ShapeCategory::Empty, "empty", decode_empty);
        registry.push(ShapeCategory::Str, "string", decode_string);
        registry.push(ShapeCategory::StrList, "string-list", decode_string_list);
        debug_assert_eq!(registry.entries.len() as ShapeIndex, STR_LIST_INDEX + 1);

        registry.add_hashable_value::<bool>();
        registry.add_hashable_value::<u8>();
        registry.add_hashable_value::<i8>();
        registry.add_hashable_value::<u16>();
        registry.add_hashable_value::<i16>();
        registry.add_hashable_value::<u32>();
        registry.add_hashable_value::<i32>();
        registry.add_hashable_value::<u64>();
        registry.add_hashable_value::<i64>();
        registry.add_value::<f32>();
        registry.add_value::<f64>();
        registry.add_hashable_value::<char>();
        registry.add_hashable_value::<Duration>();
        registry.add_hashable_value::<SystemTime>();

        registry
    }

    fn push(&mut self, category: ShapeCategory, type_name: &'static str, decode: DecodeFn) -> ShapeIndex {
        let index = self.entries.len() as ShapeIndex;
        self.entries.push(Arc::new(ShapeEntry {
            index,
            category,
            type_name,
            decode,
        }));
        index
    }

    fn push_typed<T: 'static>(
        &mut self,
        category: ShapeCategory,
        decode: DecodeFn,
    ) -> ShapeIndex {
        let index = self.push(category, std::any::type_name::<T>(), decode);
        self.by_type.insert((TypeId::of::<T>(), category), index);
        index
    }

    fn add_value<T: FixedPack>(&mut self) -> ShapeIndex {
        if let Some(&index) = self.by_type.get(&(TypeId::of::<T>(), ShapeCategory::Value)) {
            return index;
        }
        let index = self.push_typed::<T>(ShapeCategory::Value, decode_value::<T>);
        self.push_typed::<T>(ShapeCategory::ValueList, decode_value_list::<T>);
        index
    }

    fn add_hashable_value<T: FixedPack + Eq + Hash>(&mut self) -> ShapeIndex {
        let index = self.add_value::<T>();
        if !self
            .by_type
            .contains_key(&(TypeId::of::<T>(), ShapeCategory::ValueSet))
        {
            self.push_typed::<T>(ShapeCategory::ValueSet, decode_value_set::<T>);
        }
        index
    }

    fn add_object<T: Packable>(&mut self) -> ShapeIndex {
        if let Some(&index) = self.by_type.get(&(TypeId::of::<T>(), ShapeCategory::Object)) {
            return index;
        }
        let index = self.push_typed::<T>(ShapeCategory::Object, decode_object::<T>);
        self.push_typed::<T>(ShapeCategory::ObjectList, decode_object_list::<T>);
        index
    }

    fn ensure_unfrozen(&self) -> Result<(), Error> {
        if self.frozen {
            return Err(Error::RegistryFrozen(self.channel.clone()));
        }
        Ok(())
    }

    pub fn register_value_type<T: FixedPack>(&mut self) -> Result<ShapeIndex, Error> {
        self.ensure_unfrozen()?;
        Ok(self.add_value::<T>())
    }

    pub fn register_hashable_value_type<T: FixedPack + Eq + Hash>(
        &mut self,
    ) -> Result<ShapeIndex, Error> {
        self.ensure_unfrozen()?;
        Ok(self.add_hashable_value::<T>())
    }

    pub fn register_object_type<T: Packable>(&mut self) -> Result<ShapeIndex, Error> {
        self.ensure_unfrozen()?;
        Ok(self.add_object::<T>())
    }

    pub fn index_of<T: 'static>(&self, category: ShapeCategory) -> Option<ShapeIndex> {
        self.by_type.get(&(TypeId::of::<T>(), category)).copied()
    }

    pub fn entry(&self, index: ShapeIndex) -> Option<&Arc<ShapeEntry>> {
        if index < 0 {
            return None;
        }
        self.entries.get(index as usize)
    }

    /// Freezes the table; called at the first encode or decode of a user
    /// envelope so the index space can no longer drift between peers.
    pub fn mark_traffic(&mut self) {
        self.frozen = true;
    }

    #[cfg(test)]
    pub fn entries(&self) -> &[Arc<ShapeEntry>] {
        &self.entries
    }
}
