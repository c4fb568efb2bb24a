use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, OnceLock};
use std::thread;

use crate::discovery::ChannelParams;
use crate::error::TransportError;
use crate::Transport;

/// Which side of a channel an endpoint occupies.
///
/// The authority owns the channel; the peer joins it. Each role can be
/// attached at most once per channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkRole {
    Authority,
    Peer,
}

impl LinkRole {
    pub fn is_authority(self) -> bool {
        matches!(self, Self::Authority)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Authority => "authority",
            Self::Peer => "peer",
        }
    }

    fn slot(self) -> usize {
        match self {
            Self::Authority => 0,
            Self::Peer => 1,
        }
    }

    fn opposite(self) -> Self {
        match self {
            Self::Authority => Self::Peer,
            Self::Peer => Self::Authority,
        }
    }
}

/// Inbound handlers an endpoint hands to the transport at attach time.
///
/// Both handlers run sequentially on the endpoint's delivery thread.
pub struct TransportEvents {
    on_frame: Box<dyn FnMut(Vec<u8>) + Send>,
    on_failure: Box<dyn FnMut(TransportError) + Send>,
}

impl TransportEvents {
    pub fn new(
        on_frame: impl FnMut(Vec<u8>) + Send + 'static,
        on_failure: impl FnMut(TransportError) + Send + 'static,
    ) -> Self {
        Self {
            on_frame: Box::new(on_frame),
            on_failure: Box::new(on_failure),
        }
    }
}

#[derive(Default)]
struct LaneState {
    frames: VecDeque<Vec<u8>>,
    queued_bytes: u64,
    closed: bool,
}

#[derive(Default)]
struct Lane {
    state: Mutex<LaneState>,
    ready: Condvar,
}

/// One named channel: a bounded byte queue per direction.
struct Channel {
    capacity: u64,
    // lanes[0]: authority to peer, lanes[1]: peer to authority
    lanes: [Lane; 2],
    attached: Mutex<[bool; 2]>,
}

impl Channel {
    fn new(capacity: u64) -> Self {
        Self {
            capacity,
            lanes: [Lane::default(), Lane::default()],
            attached: Mutex::new([false; 2]),
        }
    }
}

fn channels() -> &'static Mutex<HashMap<String, Arc<Channel>>> {
    static CHANNELS: OnceLock<Mutex<HashMap<String, Arc<Channel>>>> = OnceLock::new();
    CHANNELS.get_or_init(Mutex::default)
}

/// In-process endpoint of a named frame channel.
///
/// Whichever role attaches first materializes the channel with its
/// parameters; the other role joins it. Channels are single-shot: a closed
/// role stays taken for the life of the process.
pub struct QueueLink {
    name: String,
    role: LinkRole,
    open: Arc<AtomicBool>,
    channel: Arc<Channel>,
}

impl std::fmt::Debug for QueueLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueLink")
            .field("name", &self.name)
            .field("role", &self.role)
            .finish()
    }
}

impl QueueLink {
    pub fn attach(
        params: &ChannelParams,
        role: LinkRole,
        events: TransportEvents,
    ) -> Result<Self, TransportError> {
        if params.name.is_empty() {
            return Err(TransportError::ChannelUnavailable(String::new()));
        }

        let channel = {
            let mut table = channels().lock().expect("channel table mutex poisoned");
            Arc::clone(
                table
                    .entry(params.name.clone())
                    .or_insert_with(|| Arc::new(Channel::new(params.capacity))),
            )
        };

        {
            let mut attached = channel.attached.lock().expect("attach mutex poisoned");
            if attached[role.slot()] {
                return Err(TransportError::RoleTaken(params.name.clone()));
            }
            attached[role.slot()] = true;
        }

        let link = Self {
            name: params.name.clone(),
            role,
            open: Arc::new(AtomicBool::new(true)),
            channel,
        };
        link.spawn_delivery(events);
        log::debug!("link({}): {} attached", link.name, role.as_str());
        Ok(link)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> LinkRole {
        self.role
    }

    fn spawn_delivery(&self, mut events: TransportEvents) {
        let channel = Arc::clone(&self.channel);
        let open = Arc::clone(&self.open);
        let inbound = self.role.opposite().slot();
        let name = self.name.clone();

        thread::spawn(move || {
            let lane = &channel.lanes[inbound];
            loop {
                let frame = {
                    let mut state = lane.state.lock().expect("lane mutex poisoned");
                    loop {
                        if !open.load(Ordering::Acquire) {
                            break None;
                        }
                        if let Some(frame) = state.frames.pop_front() {
                            state.queued_bytes -= frame.len() as u64;
                            break Some(frame);
                        }
                        if state.closed {
                            break None;
                        }
                        state = lane.ready.wait(state).expect("lane mutex poisoned");
                    }
                };
                match frame {
                    Some(frame) => (events.on_frame)(frame),
                    None => break,
                }
            }
            if open.load(Ordering::Acquire) {
                log::debug!("link({name}): peer closed");
                (events.on_failure)(TransportError::PeerClosed);
            }
        });
    }
}

impl Transport for QueueLink {
    fn send(&self, frame: &[u8]) -> Result<(), TransportError> {
        if !self.open.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }
        let lane = &self.channel.lanes[self.role.slot()];
        let mut state = lane.state.lock().expect("lane mutex poisoned");
        if state.closed {
            return Err(TransportError::PeerClosed);
        }
        let len = frame.len() as u64;
        if state.queued_bytes + len > self.channel.capacity {
            return Err(TransportError::QueueFull {
                frame: frame.len(),
                remaining: self.channel.capacity - state.queued_bytes,
            });
        }
        state.queued_bytes += len;
        state.frames.push_back(frame.to_vec());
        lane.ready.notify_one();
        Ok(())
    }

    fn close(&self) {
        if self.open.swap(false, Ordering::AcqRel) {
            for lane in &self.channel.lanes {
                let mut state = lane.state.lock().expect("lane mutex poisoned");
                state.closed = true;
                lane.ready.notify_all();
            }
            log::debug!("link({}): closed", self.name);
        }
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }
}

impl Drop for QueueLink {
    fn drop(&mut self) {
        self.close();
    }
}
