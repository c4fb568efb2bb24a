use crate::error::Error;

/// Where a backend stands between construction and full readiness.
///
/// Transitions are one-way: `Detached -> Attached -> Initialized`. A fatal
/// transport failure does not rewind the state; it flips the backend's alive
/// flag instead.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum LinkState {
    Detached,
    Attached,
    Initialized,
}

impl LinkState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Detached => "detached",
            Self::Attached => "attached",
            Self::Initialized => "initialized",
        }
    }
}

#[derive(Debug)]
pub(crate) struct Lifecycle {
    state: LinkState,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: LinkState::Detached,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn is_initialized(&self) -> bool {
        self.state == LinkState::Initialized
    }

    pub fn mark_attached(&mut self, channel: &str) -> Result<(), Error> {
        if self.state != LinkState::Detached {
            return Err(Error::AlreadyAttached(channel.to_string()));
        }
        self.state = LinkState::Attached;
        Ok(())
    }

    pub fn mark_initialized(&mut self) {
        self.state = LinkState::Initialized;
    }
}
