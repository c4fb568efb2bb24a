use std::sync::OnceLock;

use crate::error::Error;

type FailureHook = Box<dyn Fn(&Error) + Send + Sync>;
type TextHook = Box<dyn Fn(&str) + Send + Sync>;

/// Process-wide observation hooks, one set per [`Bridge`].
///
/// Each hook is settable exactly once, before or after traffic starts.
/// Without a hook the corresponding events still reach the `log` facade, so
/// leaving them unset silences nothing but the application's own handling.
///
/// [`Bridge`]: crate::Bridge
#[derive(Default)]
pub(crate) struct Hooks {
    failure: OnceLock<FailureHook>,
    warning: OnceLock<TextHook>,
    debug: OnceLock<TextHook>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failure(&self, hook: impl Fn(&Error) + Send + Sync + 'static) -> Result<(), Error> {
        self.failure
            .set(Box::new(hook))
            .map_err(|_| Error::HookAlreadySet("failure"))
    }

    pub fn set_warning(&self, hook: impl Fn(&str) + Send + Sync + 'static) -> Result<(), Error> {
        self.warning
            .set(Box::new(hook))
            .map_err(|_| Error::HookAlreadySet("warning"))
    }

    pub fn set_debug(&self, hook: impl Fn(&str) + Send + Sync + 'static) -> Result<(), Error> {
        self.debug
            .set(Box::new(hook))
            .map_err(|_| Error::HookAlreadySet("debug"))
    }

    pub fn failure(&self, err: &Error) {
        log::error!("fatal link failure: {err}");
        if let Some(hook) = self.failure.get() {
            hook(err);
        }
    }

    pub fn warning(&self, message: &str) {
        log::warn!("{message}");
        if let Some(hook) = self.warning.get() {
            hook(message);
        }
    }

    pub fn debug(&self, message: &str) {
        log::trace!("{message}");
        if let Some(hook) = self.debug.get() {
            hook(message);
        }
    }
}
