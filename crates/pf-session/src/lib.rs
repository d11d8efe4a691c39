//! pf-session
//!
//! Picking-session lifecycle: the status machine, checker locking and
//! takeover, the verification checklist and its progress cache, the local
//! draft cache, correction notes, cart reservations and the [`SessionEngine`] that ties them to the
//! storage collaborators.
//!
//! Coordination between users is advisory. The engine never overwrites
//! another user's checker or order number without an explicit
//! [`SessionEngine::confirm_takeover`].

pub mod cart;
pub mod checklist;
pub mod draft_cache;
pub mod engine;
pub mod error;
pub mod lock;
pub mod notes;
pub mod notify;
pub mod progress_cache;
pub mod state_machine;
pub mod store;
pub mod view;

pub use cart::{CartEdit, ReservationBook};
pub use checklist::{item_key, VerificationChecklist};
pub use engine::{
    Collaborators, DeductOutcome, Resume, SessionEngine, SubmitOutcome, UndoOutcome,
    VerificationQueue,
};
pub use draft_cache::{DraftCache, FileDraftCache, MemoryDraftCache};
pub use error::{PickingError, ValidationError};
pub use lock::{evaluate_checker_lock, LockDecision, TakeoverKind, TakeoverRequest};
pub use notes::NotesTimeline;
pub use notify::{ChangeEvent, ChangeFeed};
pub use progress_cache::{FileProgressCache, MemoryProgressCache, ProgressCache};
pub use state_machine::{advance, next_status, SessionEvent, TransitionError};
pub use store::{
    ActivityLog, Clock, DeltaApplied, Identity, IdentityProvider, InventoryProvider,
    SessionStore, StaticIdentity, StoreError, SystemClock,
};
pub use view::{LocalSessionView, ObserveOutcome, ViewMode};
