use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex};

use prism_codec::{FixedPack, Packable};
use prism_transport::{
    discover_default_channel, ChannelParams, LinkRole, QueueLink, Transport, TransportEvents,
};

use crate::backend::BackendShared;
use crate::error::Error;
use crate::hooks::Hooks;
use crate::messenger::Messenger;

/// Process-level entry point: one `Bridge` per process side.
///
/// The bridge owns the observation hooks, the backend for the default shared
/// channel and any backends for explicitly named channels. Messengers for the
/// default channel can be created, and can queue work, before [`start`] has
/// attached the channel; everything replays once the link is up.
///
/// [`start`]: Self::start
pub struct Bridge {
    hooks: Arc<Hooks>,
    role: LinkRole,
    default_params: ChannelParams,
    default_backend: Arc<BackendShared>,
    custom: Mutex<HashMap<String, Arc<BackendShared>>>,
}

impl Bridge {
    /// Creates the context for this side of the process pair. Parameters for
    /// the default channel are discovered once, here.
    pub fn new(role: LinkRole) -> Self {
        let hooks = Arc::new(Hooks::new());
        let default_params = discover_default_channel();
        let default_backend = BackendShared::new(&default_params.name, Arc::clone(&hooks));
        Self {
            hooks,
            role,
            default_params,
            default_backend,
            custom: Mutex::new(HashMap::new()),
        }
    }

    pub fn role(&self) -> LinkRole {
        self.role
    }

    pub fn default_channel(&self) -> &ChannelParams {
        &self.default_params
    }

    // ── Hooks ─────────────────────────────────────────────────────────────

    /// Observes fatal backend failures. Settable once per process side.
    pub fn on_failure(&self, hook: impl Fn(&Error) + Send + Sync + 'static) -> Result<(), Error> {
        self.hooks.set_failure(hook)
    }

    /// Observes recoverable protocol anomalies. Settable once per process
    /// side.
    pub fn on_warning(&self, hook: impl Fn(&str) + Send + Sync + 'static) -> Result<(), Error> {
        self.hooks.set_warning(hook)
    }

    /// Observes a rendering of every envelope before transmission. Settable
    /// once per process side.
    pub fn on_debug(&self, hook: impl Fn(&str) + Send + Sync + 'static) -> Result<(), Error> {
        self.hooks.set_debug(hook)
    }

    /// One-shot hook fired after the default channel initializes and its
    /// deferred queues have replayed.
    pub fn on_initialized(&self, hook: impl FnOnce() + Send + 'static) {
        self.default_backend.set_post_init_hook(Box::new(hook));
    }

    // ── Channels and messengers ───────────────────────────────────────────

    fn checked_owner(owner: &str) -> Result<(), Error> {
        if owner.is_empty() {
            return Err(Error::EmptyOwner);
        }
        Ok(())
    }

    /// A messenger for `owner` on the default shared channel.
    pub fn messenger(&self, owner: &str) -> Result<Messenger, Error> {
        Self::checked_owner(owner)?;
        Ok(Messenger::new(
            owner.to_string(),
            Arc::clone(&self.default_backend),
        ))
    }

    /// Attaches the default channel and runs the ready handshake. Deferred
    /// registrations and calls replay here. Fails fast when called twice.
    pub fn start(&self) -> Result<(), Error> {
        self.attach_backend(&self.default_backend, self.role, &self.default_params)
    }

    /// A messenger on an explicitly named channel, creating and attaching
    /// the channel's backend on first use.
    pub fn messenger_on(
        &self,
        owner: &str,
        role: LinkRole,
        params: &ChannelParams,
    ) -> Result<Messenger, Error> {
        Self::checked_owner(owner)?;
        if params.name.is_empty() {
            return Err(Error::EmptyChannelName);
        }

        let (backend, fresh) = {
            let mut table = self.custom.lock().expect("custom backend mutex poisoned");
            match table.get(&params.name) {
                Some(backend) => (Arc::clone(backend), false),
                None => {
                    let backend = BackendShared::new(&params.name, Arc::clone(&self.hooks));
                    table.insert(params.name.clone(), Arc::clone(&backend));
                    (backend, true)
                }
            }
        };

        if fresh {
            if let Err(err) = self.attach_backend(&backend, role, params) {
                self.custom
                    .lock()
                    .expect("custom backend mutex poisoned")
                    .remove(&params.name);
                return Err(err);
            }
        }
        Ok(Messenger::new(owner.to_string(), backend))
    }

    fn attach_backend(
        &self,
        backend: &Arc<BackendShared>,
        role: LinkRole,
        params: &ChannelParams,
    ) -> Result<(), Error> {
        let frames = Arc::clone(backend);
        let failures = Arc::clone(backend);
        let params = params.clone();
        backend.attach_with(role, move || {
            let events = TransportEvents::new(
                move |frame| frames.on_frame(frame),
                move |err| failures.mark_failed(Error::Transport(err)),
            );
            let link = QueueLink::attach(&params, role, events)?;
            Ok(Arc::new(link) as Arc<dyn Transport>)
        })
    }

    // ── Type registration for the default channel ─────────────────────────

    pub fn register_value_type<T: FixedPack>(&self) -> Result<(), Error> {
        self.default_backend.register_value_type::<T>().map(|_| ())
    }

    pub fn register_hashable_value_type<T: FixedPack + Eq + Hash>(&self) -> Result<(), Error> {
        self.default_backend
            .register_hashable_value_type::<T>()
            .map(|_| ())
    }

    pub fn register_object_type<T: Packable>(&self) -> Result<(), Error> {
        self.default_backend.register_object_type::<T>().map(|_| ())
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        self.default_backend.shutdown();
        let table = self.custom.lock().expect("custom backend mutex poisoned");
        for backend in table.values() {
            backend.shutdown();
        }
    }
}
