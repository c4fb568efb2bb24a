use std::collections::{HashMap, HashSet, VecDeque};
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use prism_codec::{FixedPack, Packable, Packer, Unpacker};
use prism_transport::{LinkRole, Transport};

use crate::envelope::{write_count, write_string_list, EnvelopeHeader};
use crate::error::Error;
use crate::handler::ErasedHandler;
use crate::hooks::Hooks;
use crate::lifecycle::{Lifecycle, LinkState};
use crate::registry::{TypeRegistry, EMPTY_INDEX, READY_INDEX, STR_INDEX, STR_LIST_INDEX};
use crate::shape::{DecodedPayload, ShapeCategory, ShapeIndex, NULL_OBJECT_INDEX};

/// Reserved ids for the round-trip latency probe. They ride the empty shape
/// and never reach user callbacks.
pub(crate) const PING_ID: &str = "@ping";
pub(crate) const PONG_ID: &str = "@pong";

type DeferredCall = Box<dyn FnOnce() + Send>;
pub(crate) type PingCallback = Arc<dyn Fn(Duration) + Send + Sync>;
pub(crate) type InitHook = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct OwnerTable {
    handlers: HashMap<(ShapeCategory, String), Arc<dyn ErasedHandler>>,
    ping_callback: Option<PingCallback>,
}

/// One backend per channel: owns the transport endpoint, the shape registry
/// and the owner routing tables.
///
/// All mutable state sits behind one coarse lock. Decoding and table lookups
/// happen under it; user callbacks are always invoked after it is released,
/// so a callback may itself send without deadlocking.
pub(crate) struct BackendShared {
    channel: String,
    hooks: Arc<Hooks>,
    state: Mutex<BackendState>,
}

struct BackendState {
    lifecycle: Lifecycle,
    alive: bool,
    registry: TypeRegistry,
    owners: HashMap<String, OwnerTable>,
    transport: Option<Arc<dyn Transport>>,
    pending_pre_init: Vec<DeferredCall>,
    pending_post_init: Vec<DeferredCall>,
    post_init_hook: Option<InitHook>,
    pending_pings: HashMap<String, VecDeque<Instant>>,
}

enum Routed {
    Consumed,
    Initialize,
    EchoPing {
        owner: String,
    },
    Pong {
        callback: PingCallback,
        latency: Duration,
    },
    Deliver {
        handler: Arc<dyn ErasedHandler>,
        payload: Option<DecodedPayload>,
        route: String,
    },
    Warn(String),
    Fatal(Error),
}

impl BackendShared {
    pub fn new(channel: &str, hooks: Arc<Hooks>) -> Arc<Self> {
        Arc::new(Self {
            channel: channel.to_string(),
            hooks,
            state: Mutex::new(BackendState {
                lifecycle: Lifecycle::new(),
                alive: true,
                registry: TypeRegistry::with_defaults(channel),
                owners: HashMap::new(),
                transport: None,
                pending_pre_init: Vec::new(),
                pending_post_init: Vec::new(),
                post_init_hook: None,
                pending_pings: HashMap::new(),
            }),
        })
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    fn lock_state(&self) -> MutexGuard<'_, BackendState> {
        self.state.lock().expect("backend state mutex poisoned")
    }

    // ── Lifecycle ─────────────────────────────────────────────────────────

    /// Wires a transport endpoint in. The authority is ready as soon as it
    /// is attached; the peer announces itself first so an already-running
    /// authority learns it exists.
    ///
    /// `connect` runs under the state lock: a peer frame that arrives the
    /// instant the endpoint exists blocks in [`on_frame`] until the endpoint
    /// is stored and the state is marked attached.
    ///
    /// [`on_frame`]: Self::on_frame
    pub fn attach_with(
        &self,
        role: LinkRole,
        connect: impl FnOnce() -> Result<Arc<dyn Transport>, Error>,
    ) -> Result<(), Error> {
        {
            let mut state = self.lock_state();
            if state.lifecycle.state() != LinkState::Detached {
                return Err(Error::AlreadyAttached(self.channel.clone()));
            }
            let transport = connect()?;
            state.transport = Some(transport);
            state.lifecycle.mark_attached(&self.channel)?;
        }
        log::debug!("backend({}): attached as {}", self.channel, role.as_str());
        if !role.is_authority() {
            self.send_ready()?;
        }
        self.initialize();
        Ok(())
    }

    pub fn attach(&self, transport: Arc<dyn Transport>, role: LinkRole) -> Result<(), Error> {
        self.attach_with(role, move || Ok(transport))
    }

    /// One-way transition to the initialized state. Replays the deferred
    /// owner registrations, then the deferred calls, in their original
    /// order, then fires the one-shot completion hook.
    pub fn initialize(&self) {
        let (pre, post, hook) = {
            let mut state = self.lock_state();
            if state.lifecycle.is_initialized() {
                return;
            }
            state.lifecycle.mark_initialized();
            (
                std::mem::take(&mut state.pending_pre_init),
                std::mem::take(&mut state.pending_post_init),
                state.post_init_hook.take(),
            )
        };
        log::debug!(
            "backend({}): initialized, replaying {} registrations and {} deferred calls",
            self.channel,
            pre.len(),
            post.len()
        );
        for action in pre {
            action();
        }
        for action in post {
            action();
        }
        if let Some(hook) = hook {
            hook();
        }
    }

    pub fn set_post_init_hook(&self, hook: InitHook) {
        let run_now = {
            let mut state = self.lock_state();
            if state.lifecycle.is_initialized() {
                Some(hook)
            } else {
                state.post_init_hook = Some(hook);
                None
            }
        };
        if let Some(hook) = run_now {
            hook();
        }
    }

    /// Flips the backend dead and reports the failure exactly once. Later
    /// sends fail fast without re-firing the hook.
    pub fn mark_failed(&self, err: Error) {
        let first = {
            let mut state = self.lock_state();
            if state.alive {
                state.alive = false;
                true
            } else {
                false
            }
        };
        if first {
            self.hooks.failure(&err);
        }
    }

    pub fn shutdown(&self) {
        let transport = self.lock_state().transport.take();
        if let Some(transport) = transport {
            transport.close();
        }
    }

    /// Runs `op` immediately once initialized; before that, queues it for
    /// replay. A queued call cannot return its error to the original caller,
    /// so replay errors are reported through the warning hook.
    pub fn run_or_defer(
        &self,
        op: impl FnOnce() -> Result<(), Error> + Send + 'static,
    ) -> Result<(), Error> {
        {
            let mut state = self.lock_state();
            if !state.alive {
                return Err(Error::LinkDown);
            }
            if !state.lifecycle.is_initialized() {
                let hooks = Arc::clone(&self.hooks);
                state.pending_post_init.push(Box::new(move || {
                    if let Err(err) = op() {
                        hooks.warning(&format!("deferred call failed: {err}"));
                    }
                }));
                return Ok(());
            }
        }
        op()
    }

    // ── Owners and callbacks ──────────────────────────────────────────────

    fn register_owner_now(&self, owner: &str) {
        let duplicate = {
            let mut state = self.lock_state();
            if state.owners.contains_key(owner) {
                true
            } else {
                state.owners.insert(owner.to_string(), OwnerTable::default());
                false
            }
        };
        if duplicate {
            self.hooks
                .warning(&format!("owner '{owner}' is already registered"));
        } else {
            log::debug!("backend({}): owner '{owner}' registered", self.channel);
        }
    }

    pub fn unregister_owner(&self, owner: &str) {
        let mut state = self.lock_state();
        state.owners.remove(owner);
        state.pending_pings.remove(owner);
        log::debug!("backend({}): owner '{owner}' unregistered", self.channel);
    }

    pub fn register_callback(
        &self,
        owner: &str,
        id: String,
        category: ShapeCategory,
        handler: Arc<dyn ErasedHandler>,
    ) -> Result<(), Error> {
        let mut state = self.lock_state();
        let table = state
            .owners
            .get_mut(owner)
            .ok_or_else(|| Error::UnknownOwner(owner.to_string()))?;
        // Last writer wins on a duplicate (owner, id, category).
        table.handlers.insert((category, id), handler);
        Ok(())
    }

    pub fn set_ping_callback(&self, owner: &str, callback: PingCallback) -> Result<(), Error> {
        let mut state = self.lock_state();
        let table = state
            .owners
            .get_mut(owner)
            .ok_or_else(|| Error::UnknownOwner(owner.to_string()))?;
        table.ping_callback = Some(callback);
        Ok(())
    }

    // ── Type registration ─────────────────────────────────────────────────

    pub fn register_value_type<T: FixedPack>(&self) -> Result<ShapeIndex, Error> {
        self.lock_state().registry.register_value_type::<T>()
    }

    pub fn register_hashable_value_type<T: FixedPack + Eq + Hash>(
        &self,
    ) -> Result<ShapeIndex, Error> {
        self.lock_state()
            .registry
            .register_hashable_value_type::<T>()
    }

    pub fn register_object_type<T: Packable>(&self) -> Result<ShapeIndex, Error> {
        self.lock_state().registry.register_object_type::<T>()
    }

    // ── Sending ───────────────────────────────────────────────────────────

    fn send_ready(&self) -> Result<(), Error> {
        let header = EnvelopeHeader {
            shape_index: READY_INDEX,
            channel: self.channel.clone(),
            owner: String::new(),
            id: String::new(),
        };
        let mut packer = Packer::new();
        header.encode(&mut packer);
        let trace = header.render("ready", &[]);
        self.transmit(packer.into_bytes(), trace)
    }

    fn encode_frame(
        &self,
        owner: &str,
        id: &str,
        resolve: impl FnOnce(&TypeRegistry) -> Result<ShapeIndex, Error>,
        write_payload: impl FnOnce(&mut Packer),
    ) -> Result<(Vec<u8>, String), Error> {
        let mut state = self.lock_state();
        if !state.alive {
            return Err(Error::LinkDown);
        }
        let index = resolve(&state.registry)?;
        state.registry.mark_traffic();
        let shape_name = if index == NULL_OBJECT_INDEX {
            "null-object"
        } else {
            state
                .registry
                .entry(index)
                .map(|entry| entry.type_name)
                .unwrap_or("unknown")
        };
        let header = EnvelopeHeader {
            shape_index: index,
            channel: self.channel.clone(),
            owner: owner.to_string(),
            id: id.to_string(),
        };
        let mut packer = Packer::new();
        header.encode(&mut packer);
        let payload_start = packer.len();
        write_payload(&mut packer);
        let trace = header.render(shape_name, &packer.as_slice()[payload_start..]);
        Ok((packer.into_bytes(), trace))
    }

    fn transmit(&self, bytes: Vec<u8>, trace: String) -> Result<(), Error> {
        self.hooks.debug(&trace);
        let transport = {
            let state = self.lock_state();
            if !state.alive {
                return Err(Error::LinkDown);
            }
            state.transport.as_ref().map(Arc::clone)
        };
        let Some(transport) = transport else {
            return Err(Error::LinkDown);
        };
        if let Err(err) = transport.send(&bytes) {
            let err = Error::Transport(err);
            self.mark_failed(err.clone());
            return Err(err);
        }
        Ok(())
    }

    fn resolve_typed<T: 'static>(
        registry: &TypeRegistry,
        category: ShapeCategory,
    ) -> Result<ShapeIndex, Error> {
        registry.index_of::<T>(category).ok_or(Error::UnregisteredType(
            std::any::type_name::<T>(),
            category.as_str(),
        ))
    }

    pub fn send_empty(&self, owner: &str, id: &str) -> Result<(), Error> {
        let (bytes, trace) = self.encode_frame(owner, id, |_| Ok(EMPTY_INDEX), |_| {})?;
        self.transmit(bytes, trace)
    }

    pub fn send_string(&self, owner: &str, id: &str, value: Option<&str>) -> Result<(), Error> {
        let (bytes, trace) = self.encode_frame(owner, id, |_| Ok(STR_INDEX), |packer| {
            packer.write_string(value);
        })?;
        self.transmit(bytes, trace)
    }

    pub fn send_string_list(
        &self,
        owner: &str,
        id: &str,
        items: Option<&[Option<String>]>,
    ) -> Result<(), Error> {
        let (bytes, trace) = self.encode_frame(owner, id, |_| Ok(STR_LIST_INDEX), |packer| {
            write_string_list(packer, items);
        })?;
        self.transmit(bytes, trace)
    }

    pub fn send_value<T: FixedPack>(&self, owner: &str, id: &str, value: &T) -> Result<(), Error> {
        let (bytes, trace) = self.encode_frame(
            owner,
            id,
            |registry| Self::resolve_typed::<T>(registry, ShapeCategory::Value),
            |packer| value.pack(packer),
        )?;
        self.transmit(bytes, trace)
    }

    pub fn send_value_list<T: FixedPack>(
        &self,
        owner: &str,
        id: &str,
        items: Option<&[T]>,
    ) -> Result<(), Error> {
        let (bytes, trace) = self.encode_frame(
            owner,
            id,
            |registry| Self::resolve_typed::<T>(registry, ShapeCategory::ValueList),
            |packer| match items {
                None => write_count(packer, None),
                Some(items) => {
                    write_count(packer, Some(items.len()));
                    for item in items {
                        item.pack(packer);
                    }
                }
            },
        )?;
        self.transmit(bytes, trace)
    }

    pub fn send_value_set<T: FixedPack + Eq + Hash>(
        &self,
        owner: &str,
        id: &str,
        items: Option<&HashSet<T>>,
    ) -> Result<(), Error> {
        let (bytes, trace) = self.encode_frame(
            owner,
            id,
            |registry| Self::resolve_typed::<T>(registry, ShapeCategory::ValueSet),
            |packer| match items {
                None => write_count(packer, None),
                Some(items) => {
                    write_count(packer, Some(items.len()));
                    for item in items {
                        item.pack(packer);
                    }
                }
            },
        )?;
        self.transmit(bytes, trace)
    }

    pub fn send_object<T: Packable>(
        &self,
        owner: &str,
        id: &str,
        value: Option<&T>,
    ) -> Result<(), Error> {
        let (bytes, trace) = match value {
            Some(value) => self.encode_frame(
                owner,
                id,
                |registry| Self::resolve_typed::<T>(registry, ShapeCategory::Object),
                |packer| value.pack(packer),
            )?,
            // A null object travels as the bare sentinel; no type index is
            // needed because (owner, id) alone resolves the callback.
            None => self.encode_frame(owner, id, |_| Ok(NULL_OBJECT_INDEX), |_| {})?,
        };
        self.transmit(bytes, trace)
    }

    pub fn send_object_list<T: Packable>(
        &self,
        owner: &str,
        id: &str,
        items: Option<&[T]>,
    ) -> Result<(), Error> {
        let (bytes, trace) = self.encode_frame(
            owner,
            id,
            |registry| Self::resolve_typed::<T>(registry, ShapeCategory::ObjectList),
            |packer| match items {
                None => write_count(packer, None),
                Some(items) => {
                    write_count(packer, Some(items.len()));
                    for item in items {
                        item.pack(packer);
                    }
                }
            },
        )?;
        self.transmit(bytes, trace)
    }

    pub fn send_ping(&self, owner: &str) -> Result<(), Error> {
        let (bytes, trace) = self.encode_frame(owner, PING_ID, |_| Ok(EMPTY_INDEX), |_| {})?;
        // Recorded before transmission; the echo can arrive on the delivery
        // thread before transmit returns.
        {
            let mut state = self.lock_state();
            state
                .pending_pings
                .entry(owner.to_string())
                .or_default()
                .push_back(Instant::now());
        }
        let result = self.transmit(bytes, trace);
        if result.is_err() {
            let mut state = self.lock_state();
            if let Some(pings) = state.pending_pings.get_mut(owner) {
                pings.pop_back();
            }
        }
        result
    }

    // ── Receiving ─────────────────────────────────────────────────────────

    /// Entry point for the transport delivery thread. Decoding and routing
    /// happen under the state lock; the resulting action runs outside it.
    pub fn on_frame(&self, bytes: Vec<u8>) {
        match self.route_frame(&bytes) {
            Routed::Consumed => {}
            Routed::Initialize => self.initialize(),
            Routed::EchoPing { owner } => {
                if let Err(err) = self.send_empty(&owner, PONG_ID) {
                    log::debug!("backend({}): ping echo failed: {err}", self.channel);
                }
            }
            Routed::Pong { callback, latency } => callback(latency),
            Routed::Deliver {
                handler,
                payload,
                route,
            } => {
                let matched = match payload {
                    Some(payload) => handler.invoke(payload),
                    None => handler.invoke_null(),
                };
                if !matched {
                    self.hooks.warning(&format!(
                        "dropping {route}: payload does not match the registered callback"
                    ));
                }
            }
            Routed::Warn(message) => self.hooks.warning(&message),
            Routed::Fatal(err) => self.mark_failed(err),
        }
    }

    fn route_frame(&self, bytes: &[u8]) -> Routed {
        let mut state = self.lock_state();
        let mut unpacker = Unpacker::new(bytes);
        let header = match EnvelopeHeader::decode(&mut unpacker) {
            Ok(header) => header,
            Err(err) => return Routed::Fatal(Error::Codec(err)),
        };

        // The ready signal is consumed here and never reaches user code.
        if header.shape_index == READY_INDEX {
            return if state.lifecycle.is_initialized() {
                log::debug!("backend({}): peer is ready", self.channel);
                Routed::Consumed
            } else {
                Routed::Initialize
            };
        }

        state.registry.mark_traffic();
        let route = format!("{}/{}", header.owner, header.id);

        if header.shape_index == NULL_OBJECT_INDEX {
            let Some(table) = state.owners.get(&header.owner) else {
                return Routed::Warn(format!(
                    "dropping {route}: owner '{}' is not registered",
                    header.owner
                ));
            };
            let Some(handler) = table
                .handlers
                .get(&(ShapeCategory::Object, header.id.clone()))
            else {
                return Routed::Warn(format!("dropping {route}: no object callback registered"));
            };
            return Routed::Deliver {
                handler: Arc::clone(handler),
                payload: None,
                route,
            };
        }

        let (category, decode) = match state.registry.entry(header.shape_index) {
            Some(entry) => (entry.category, entry.decode),
            None => {
                return Routed::Warn(format!(
                    "dropping {route}: unknown shape index {}",
                    header.shape_index
                ))
            }
        };

        if category == ShapeCategory::Empty && header.id == PING_ID {
            return Routed::EchoPing {
                owner: header.owner,
            };
        }
        if category == ShapeCategory::Empty && header.id == PONG_ID {
            let Some(sent_at) = state
                .pending_pings
                .get_mut(&header.owner)
                .and_then(|pings| pings.pop_front())
            else {
                return Routed::Warn(format!("unsolicited pong for owner '{}'", header.owner));
            };
            let latency = sent_at.elapsed();
            let Some(callback) = state
                .owners
                .get(&header.owner)
                .and_then(|table| table.ping_callback.clone())
            else {
                return Routed::Warn(format!(
                    "dropping pong for owner '{}': no ping callback registered",
                    header.owner
                ));
            };
            return Routed::Pong { callback, latency };
        }

        let payload = match decode(&mut unpacker) {
            Ok(payload) => payload,
            Err(err) => return Routed::Fatal(Error::Codec(err)),
        };

        let Some(table) = state.owners.get(&header.owner) else {
            return Routed::Warn(format!(
                "dropping {route}: owner '{}' is not registered",
                header.owner
            ));
        };
        let Some(handler) = table.handlers.get(&(category, header.id.clone())) else {
            return Routed::Warn(format!(
                "dropping {route}: no {} callback registered",
                category.as_str()
            ));
        };
        Routed::Deliver {
            handler: Arc::clone(handler),
            payload: Some(payload),
            route,
        }
    }
}

/// Registers `owner` immediately when the backend is initialized, otherwise
/// queues the registration for the pre-init replay.
pub(crate) fn register_owner(shared: &Arc<BackendShared>, owner: &str) {
    let deferred = {
        let mut state = shared.lock_state();
        if state.lifecycle.is_initialized() {
            false
        } else {
            let replay = Arc::clone(shared);
            let owner = owner.to_string();
            state
                .pending_pre_init
                .push(Box::new(move || replay.register_owner_now(&owner)));
            true
        }
    };
    if !deferred {
        shared.register_owner_now(owner);
    }
}
