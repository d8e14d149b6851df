//! Debounce and typing-presence state machine.
//!
//! [`SyncScheduler`] decides *when* things happen but performs no I/O and owns
//! no timers. The session arms a timer for every [`Ticket`] it is handed and
//! reports back when the timer fires; a ticket that is no longer current is
//! ignored, which is what makes "cancel and restart" safe even if an aborted
//! timer still manages to fire.
//!
//! ```text
//! flush:     Idle ──edit──▶ Pending ──timer──▶ Flushing ──write done──▶ Idle
//!                            ▲   │                 │
//!                            └───┘ edit            └──edit──▶ Pending
//!
//! presence:  NotTyping ──edit──▶ Typing ──settle timer──▶ NotTyping
//!                                   │ ▲
//!                                   └─┘ refresh timer (typing=true again)
//! ```

/// Persistence state of one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlushState {
    /// Nothing buffered, nothing in flight
    #[default]
    Idle,
    /// Debounce timer running
    Pending,
    /// Write issued, waiting for the store
    Flushing,
}

/// Local typing-presence state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PresenceState {
    #[default]
    NotTyping,
    Typing,
}

/// Identifies one armed timer. Only the most recent ticket of each kind is
/// honoured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket(u64);

/// What the session must do after a local edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditPlan {
    /// Arm (or re-arm) the debounce timer with this ticket.
    pub flush: Ticket,
    /// Arm (or re-arm) the typing-settle timer, when presence is enabled.
    pub settle: Option<Ticket>,
    /// Write `typing=true`: first edit of a burst.
    pub announce_typing: bool,
    /// Arm the presence refresh timer; set together with `announce_typing`.
    pub refresh: Option<Ticket>,
}

/// Decision taken when the debounce timer fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushDecision {
    /// A newer edit or a cancel replaced this timer.
    Superseded,
    /// Persist the latest local edit now.
    Write,
}

/// Per-document debounce and presence state machine.
#[derive(Debug, Default)]
pub struct SyncScheduler {
    flush_state: FlushState,
    presence: PresenceState,
    saving: bool,
    in_flight: usize,
    next_ticket: u64,
    pending_flush: Option<Ticket>,
    pending_settle: Option<Ticket>,
    pending_refresh: Option<Ticket>,
    pending_saving_clear: Option<Ticket>,
}

impl SyncScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flush_state(&self) -> FlushState {
        self.flush_state
    }

    pub fn presence(&self) -> PresenceState {
        self.presence
    }

    /// The "saving" indicator shown to the user.
    pub fn is_saving(&self) -> bool {
        self.saving
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    fn issue(&mut self) -> Ticket {
        self.next_ticket += 1;
        Ticket(self.next_ticket)
    }

    fn settled_state(&self) -> FlushState {
        if self.pending_flush.is_some() {
            FlushState::Pending
        } else if self.in_flight > 0 {
            FlushState::Flushing
        } else {
            FlushState::Idle
        }
    }

    /// Registers a local edit, superseding any armed debounce and settle timers.
    pub fn on_local_edit(&mut self, presence_enabled: bool) -> EditPlan {
        let flush = self.issue();
        self.pending_flush = Some(flush);
        self.flush_state = FlushState::Pending;

        let mut plan = EditPlan {
            flush,
            settle: None,
            announce_typing: false,
            refresh: None,
        };
        if presence_enabled {
            let settle = self.issue();
            self.pending_settle = Some(settle);
            plan.settle = Some(settle);

            if self.presence == PresenceState::NotTyping {
                self.presence = PresenceState::Typing;
                let refresh = self.issue();
                self.pending_refresh = Some(refresh);
                plan.announce_typing = true;
                plan.refresh = Some(refresh);
            }
        }
        plan
    }

    /// Handles expiry of the debounce timer.
    ///
    /// The current ticket always writes, even when a remote snapshot arrived
    /// in the meantime: the last timer to fire wins.
    pub fn on_flush_timer(&mut self, ticket: Ticket) -> FlushDecision {
        if self.pending_flush != Some(ticket) {
            return FlushDecision::Superseded;
        }
        self.pending_flush = None;
        self.start_write();
        FlushDecision::Write
    }

    /// Starts a write outside the debounce cycle, cancelling any armed timer.
    pub fn begin_immediate_flush(&mut self) {
        self.pending_flush = None;
        self.start_write();
    }

    fn start_write(&mut self) {
        self.in_flight += 1;
        self.flush_state = FlushState::Flushing;
        self.saving = true;
        self.pending_saving_clear = None;
    }

    /// Records completion (successful or not) of a write and returns the
    /// ticket for the saving-indicator clear timer.
    pub fn on_write_complete(&mut self) -> Ticket {
        self.in_flight = self.in_flight.saturating_sub(1);
        self.flush_state = self.settled_state();

        let ticket = self.issue();
        self.pending_saving_clear = Some(ticket);
        ticket
    }

    /// Clears the saving indicator unless a newer write started or completed.
    pub fn on_saving_clear(&mut self, ticket: Ticket) -> bool {
        if self.pending_saving_clear != Some(ticket) {
            return false;
        }
        self.pending_saving_clear = None;

        if self.in_flight > 0 {
            return false;
        }
        self.saving = false;
        true
    }

    /// Handles expiry of the typing-settle timer. Returns true when the
    /// caller must write `typing=false`.
    pub fn on_typing_settle(&mut self, ticket: Ticket) -> bool {
        if self.pending_settle != Some(ticket) || self.presence != PresenceState::Typing {
            return false;
        }
        self.pending_settle = None;
        self.pending_refresh = None;
        self.presence = PresenceState::NotTyping;
        true
    }

    /// Handles expiry of the presence refresh timer. While still typing,
    /// returns the ticket for the next refresh; the caller rewrites
    /// `typing=true` and re-arms.
    pub fn on_presence_refresh(&mut self, ticket: Ticket) -> Option<Ticket> {
        if self.pending_refresh != Some(ticket) || self.presence != PresenceState::Typing {
            return None;
        }
        let next = self.issue();
        self.pending_refresh = Some(next);
        Some(next)
    }

    /// Invalidates every armed timer. Returns true when the local presence
    /// was `Typing`, in which case the caller should write `typing=false`.
    pub fn cancel(&mut self) -> bool {
        self.pending_flush = None;
        self.pending_settle = None;
        self.pending_refresh = None;
        self.pending_saving_clear = None;
        self.flush_state = self.settled_state();
        self.saving = self.in_flight > 0;

        let was_typing = self.presence == PresenceState::Typing;
        self.presence = PresenceState::NotTyping;
        was_typing
    }
}
