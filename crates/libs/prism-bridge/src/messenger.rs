use std::collections::HashSet;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use prism_codec::{FixedPack, Packable};

use crate::backend::{self, BackendShared};
use crate::error::Error;
use crate::handler::{
    EmptyHandler, ErasedHandler, ObjectHandler, StringHandler, StringListHandler, TypedHandler,
};
use crate::shape::ShapeCategory;

/// Per-owner messaging handle.
///
/// Constructing one registers the owner on its channel; dropping it
/// unregisters the owner again. Every operation is safe to call before the
/// channel handshake has completed: such calls are queued and replayed, in
/// order, once the backend initializes. Deferred actions are not retracted
/// when the messenger is dropped.
///
/// At most one callback is kept per id and payload kind; registering again
/// replaces the previous callback.
pub struct Messenger {
    owner: String,
    shared: Arc<BackendShared>,
}

impl Messenger {
    pub(crate) fn new(owner: String, shared: Arc<BackendShared>) -> Self {
        backend::register_owner(&shared, &owner);
        Self { owner, shared }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn channel(&self) -> &str {
        self.shared.channel()
    }

    fn checked_id(&self, id: &str) -> Result<String, Error> {
        if id.is_empty() {
            return Err(Error::EmptyId);
        }
        if id.starts_with('@') {
            return Err(Error::ReservedId(id.to_string()));
        }
        Ok(id.to_string())
    }

    fn defer(
        &self,
        op: impl FnOnce(&BackendShared) -> Result<(), Error> + Send + 'static,
    ) -> Result<(), Error> {
        let shared = Arc::clone(&self.shared);
        self.shared.run_or_defer(move || op(&shared))
    }

    fn register(
        &self,
        category: ShapeCategory,
        id: String,
        handler: Arc<dyn ErasedHandler>,
    ) -> Result<(), Error> {
        let owner = self.owner.clone();
        self.defer(move |backend| backend.register_callback(&owner, id, category, handler))
    }

    // ── Sending ───────────────────────────────────────────────────────────

    pub fn send_empty(&self, id: &str) -> Result<(), Error> {
        let id = self.checked_id(id)?;
        let owner = self.owner.clone();
        self.defer(move |backend| backend.send_empty(&owner, &id))
    }

    pub fn send_string(&self, id: &str, value: Option<&str>) -> Result<(), Error> {
        let id = self.checked_id(id)?;
        let owner = self.owner.clone();
        let value = value.map(str::to_string);
        self.defer(move |backend| backend.send_string(&owner, &id, value.as_deref()))
    }

    pub fn send_string_list(
        &self,
        id: &str,
        items: Option<Vec<Option<String>>>,
    ) -> Result<(), Error> {
        let id = self.checked_id(id)?;
        let owner = self.owner.clone();
        self.defer(move |backend| backend.send_string_list(&owner, &id, items.as_deref()))
    }

    pub fn send_string_array(&self, id: &str, items: &[&str]) -> Result<(), Error> {
        let owned = items
            .iter()
            .map(|item| Some((*item).to_string()))
            .collect::<Vec<_>>();
        self.send_string_list(id, Some(owned))
    }

    pub fn send_value<T: FixedPack>(&self, id: &str, value: T) -> Result<(), Error> {
        let id = self.checked_id(id)?;
        let owner = self.owner.clone();
        self.defer(move |backend| backend.send_value(&owner, &id, &value))
    }

    pub fn send_value_list<T: FixedPack>(&self, id: &str, items: Option<Vec<T>>) -> Result<(), Error> {
        let id = self.checked_id(id)?;
        let owner = self.owner.clone();
        self.defer(move |backend| backend.send_value_list(&owner, &id, items.as_deref()))
    }

    pub fn send_value_array<T: FixedPack>(&self, id: &str, items: &[T]) -> Result<(), Error> {
        self.send_value_list(id, Some(items.to_vec()))
    }

    pub fn send_value_set<T: FixedPack + Eq + Hash>(
        &self,
        id: &str,
        items: Option<HashSet<T>>,
    ) -> Result<(), Error> {
        let id = self.checked_id(id)?;
        let owner = self.owner.clone();
        self.defer(move |backend| backend.send_value_set(&owner, &id, items.as_ref()))
    }

    pub fn send_object<T: Packable>(&self, id: &str, value: Option<T>) -> Result<(), Error> {
        let id = self.checked_id(id)?;
        let owner = self.owner.clone();
        self.defer(move |backend| backend.send_object(&owner, &id, value.as_ref()))
    }

    pub fn send_object_list<T: Packable>(
        &self,
        id: &str,
        items: Option<Vec<T>>,
    ) -> Result<(), Error> {
        let id = self.checked_id(id)?;
        let owner = self.owner.clone();
        self.defer(move |backend| backend.send_object_list(&owner, &id, items.as_deref()))
    }

    pub fn send_object_array<T: Packable + Clone>(&self, id: &str, items: &[T]) -> Result<(), Error> {
        self.send_object_list(id, Some(items.to_vec()))
    }

    /// Starts a round-trip probe. The measured latency arrives at the
    /// callback registered with [`receive_ping`].
    ///
    /// [`receive_ping`]: Self::receive_ping
    pub fn send_ping(&self) -> Result<(), Error> {
        let owner = self.owner.clone();
        self.defer(move |backend| backend.send_ping(&owner))
    }

    // ── Receiving ─────────────────────────────────────────────────────────

    pub fn receive_empty(
        &self,
        id: &str,
        callback: impl Fn() + Send + Sync + 'static,
    ) -> Result<(), Error> {
        let id = self.checked_id(id)?;
        self.register(
            ShapeCategory::Empty,
            id,
            Arc::new(EmptyHandler(Box::new(callback))),
        )
    }

    pub fn receive_string(
        &self,
        id: &str,
        callback: impl Fn(Option<String>) + Send + Sync + 'static,
    ) -> Result<(), Error> {
        let id = self.checked_id(id)?;
        self.register(
            ShapeCategory::Str,
            id,
            Arc::new(StringHandler(Box::new(callback))),
        )
    }

    pub fn receive_string_list(
        &self,
        id: &str,
        callback: impl Fn(Option<Vec<Option<String>>>) + Send + Sync + 'static,
    ) -> Result<(), Error> {
        let id = self.checked_id(id)?;
        self.register(
            ShapeCategory::StrList,
            id,
            Arc::new(StringListHandler(Box::new(callback))),
        )
    }

    pub fn receive_value<T: FixedPack>(
        &self,
        id: &str,
        callback: impl Fn(T) + Send + Sync + 'static,
    ) -> Result<(), Error> {
        let id = self.checked_id(id)?;
        self.register(
            ShapeCategory::Value,
            id,
            Arc::new(TypedHandler::<T> {
                callback: Box::new(callback),
            }),
        )
    }

    pub fn receive_value_list<T: FixedPack>(
        &self,
        id: &str,
        callback: impl Fn(Option<Vec<T>>) + Send + Sync + 'static,
    ) -> Result<(), Error> {
        let id = self.checked_id(id)?;
        self.register(
            ShapeCategory::ValueList,
            id,
            Arc::new(TypedHandler::<Option<Vec<T>>> {
                callback: Box::new(callback),
            }),
        )
    }

    pub fn receive_value_set<T: FixedPack + Eq + Hash>(
        &self,
        id: &str,
        callback: impl Fn(Option<HashSet<T>>) + Send + Sync + 'static,
    ) -> Result<(), Error> {
        let id = self.checked_id(id)?;
        self.register(
            ShapeCategory::ValueSet,
            id,
            Arc::new(TypedHandler::<Option<HashSet<T>>> {
                callback: Box::new(callback),
            }),
        )
    }

    pub fn receive_object<T: Packable>(
        &self,
        id: &str,
        callback: impl Fn(Option<T>) + Send + Sync + 'static,
    ) -> Result<(), Error> {
        let id = self.checked_id(id)?;
        self.register(
            ShapeCategory::Object,
            id,
            Arc::new(ObjectHandler::<T> {
                callback: Box::new(callback),
            }),
        )
    }

    pub fn receive_object_list<T: Packable>(
        &self,
        id: &str,
        callback: impl Fn(Option<Vec<T>>) + Send + Sync + 'static,
    ) -> Result<(), Error> {
        let id = self.checked_id(id)?;
        self.register(
            ShapeCategory::ObjectList,
            id,
            Arc::new(TypedHandler::<Option<Vec<T>>> {
                callback: Box::new(callback),
            }),
        )
    }

    pub fn receive_ping(
        &self,
        callback: impl Fn(Duration) + Send + Sync + 'static,
    ) -> Result<(), Error> {
        let owner = self.owner.clone();
        let callback: backend::PingCallback = Arc::new(callback);
        self.defer(move |backend| backend.set_ping_callback(&owner, callback))
    }

    // ── Type registration for this messenger's channel ────────────────────

    pub fn register_value_type<T: FixedPack>(&self) -> Result<(), Error> {
        self.shared.register_value_type::<T>().map(|_| ())
    }

    pub fn register_hashable_value_type<T: FixedPack + Eq + Hash>(&self) -> Result<(), Error> {
        self.shared.register_hashable_value_type::<T>().map(|_| ())
    }

    pub fn register_object_type<T: Packable>(&self) -> Result<(), Error> {
        self.shared.register_object_type::<T>().map(|_| ())
    }
}

impl fmt::Debug for Messenger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Messenger")
            .field("owner", &self.owner)
            .field("channel", &self.channel())
            .finish()
    }
}

impl Drop for Messenger {
    fn drop(&mut self) {
        self.shared.unregister_owner(&self.owner);
    }
}
