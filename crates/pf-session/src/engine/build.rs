use pf_path::{plan_pick_path, PickPlan};
use pf_schemas::{InventoryRecord, LineKey, PickingSession, SessionStatus};
use uuid::Uuid;

use super::{store_err, SessionEngine};
use crate::cart::{self, CartEdit, ReservationBook};
use crate::error::{PickingError, ValidationError};
use crate::lock::find_order_number_conflict;
use crate::notify::ChangeEvent;
use crate::state_machine::{advance, next_status, SessionEvent, TransitionError};

fn normalize_order_number(raw: &str) -> Option<String> {
    let t = raw.trim();
    (!t.is_empty()).then(|| t.to_string())
}

impl<'a> SessionEngine<'a> {
    /// idle -> building. The new session lives only in this client until a
    /// path is generated.
    ///
    /// An order number already used by another user's open session raises
    /// `Conflict`; confirming that takeover hands the existing session to
    /// this user instead of creating a new one.
    pub fn start_session(
        &mut self,
        order_number: Option<&str>,
        customer_id: Option<&str>,
    ) -> Result<PickingSession, PickingError> {
        let user = self.user_id();
        next_status(None, &SessionEvent::Start)?;

        let order_number = order_number.and_then(normalize_order_number);
        if let Some(number) = order_number.as_deref() {
            self.ensure_order_number_free(number, &user, None)?;
        }

        let session = PickingSession::new(
            &user,
            order_number,
            customer_id.map(str::to_string),
            self.now(),
        );
        tracing::info!(
            session_id = %session.id,
            owner = %user,
            order_number = session.order_number.as_deref().unwrap_or("-"),
            "session started"
        );
        self.stash_draft(session.clone());
        Ok(session)
    }

    pub fn rename_order(&mut self, id: Uuid, order_number: &str) -> Result<PickingSession, PickingError> {
        let user = self.user_id();
        let number = normalize_order_number(order_number).ok_or(ValidationError::EmptyOrderNumber)?;

        let mut session = self.session(id)?;
        if session.status.is_terminal() {
            return Err(TransitionError {
                from: Some(session.status),
                event: "RenameOrder".to_string(),
            }
            .into());
        }
        self.require_owner(&session, &user)?;
        self.ensure_order_number_free(&number, &user, Some(id))?;

        session.order_number = Some(number);
        self.commit(session.clone(), "rename order")?;
        self.session(id)
    }

    fn ensure_order_number_free(
        &self,
        number: &str,
        user: &str,
        exclude: Option<Uuid>,
    ) -> Result<(), PickingError> {
        let sessions = self.all_sessions("check order number")?;
        if let Some(req) = find_order_number_conflict(&sessions, number, user, exclude) {
            tracing::warn!(
                order_number = number,
                holder = %req.current_holder,
                requested_by = user,
                "order number already in use"
            );
            return Err(PickingError::Conflict(req));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // cart
    // -----------------------------------------------------------------------

    /// A session whose cart this user may edit right now.
    fn editable(&self, id: Uuid) -> Result<PickingSession, PickingError> {
        let user = self.user_id();
        let session = self.session(id)?;
        match session.status {
            SessionStatus::Building | SessionStatus::NeedsCorrection => {}
            other => return Err(ValidationError::NotEditable(other).into()),
        }
        self.require_owner(&session, &user)?;
        Ok(session)
    }

    /// What this session may still take from `key`.
    fn available_for(&self, session: &PickingSession, key: &LineKey) -> Result<(InventoryRecord, i64), PickingError> {
        let record = self
            .deps
            .inventory
            .get(key)
            .map_err(|e| store_err("read inventory", e))?
            .ok_or_else(|| ValidationError::MissingInventory(key.clone()))?;
        let sessions = self.all_sessions("read reservations")?;
        let book = ReservationBook::from_sessions(&sessions, Some(session.id));
        let available = book.available(&record);
        Ok((record, available))
    }

    /// Add one unit of the stock row `key`.
    pub fn add_to_cart(&mut self, id: Uuid, key: &LineKey) -> Result<CartEdit, PickingError> {
        let mut session = self.editable(id)?;
        let (record, available) = self.available_for(&session, key)?;
        let edit = cart::add_unit(&mut session.items, &record, available)?;
        tracing::debug!(session_id = %id, line = %key, qty = edit.qty, "cart line added");
        self.commit(session, "add to cart")?;
        Ok(edit)
    }

    /// Set a line's quantity from user text. Clamps are reported in
    /// `CartEdit::correction` and still applied; 0 removes the line.
    pub fn set_cart_qty(&mut self, id: Uuid, key: &LineKey, text: &str) -> Result<CartEdit, PickingError> {
        let requested = cart::parse_quantity(text)?;
        let mut session = self.editable(id)?;
        let available = if requested == 0 {
            0
        } else {
            self.available_for(&session, key)?.1
        };
        let edit = cart::set_quantity(&mut session.items, key, requested, available)?;
        if let Some(note) = &edit.correction {
            tracing::debug!(session_id = %id, line = %key, %note, "quantity clamped");
        } else if edit.qty == 0 {
            tracing::debug!(session_id = %id, line = %key, "cart line removed");
        }
        self.commit(session, "edit cart")?;
        Ok(edit)
    }

    pub fn remove_from_cart(&mut self, id: Uuid, key: &LineKey) -> Result<(), PickingError> {
        let mut session = self.editable(id)?;
        cart::remove_line(&mut session.items, key)?;
        self.commit(session, "remove from cart")
    }

    // -----------------------------------------------------------------------
    // path
    // -----------------------------------------------------------------------

    fn plan(&self, session: &PickingSession) -> PickPlan {
        plan_pick_path(&session.items, self.deps.directory, &self.packer)
    }

    fn freeze(session: &mut PickingSession, plan: &PickPlan) {
        session.pallets = plan.pallets.clone();
        session.pallets_qty = Some(plan.pallets_qty());
        session.total_units = Some(plan.total_units);
    }

    /// building -> active. Checks reservations, freezes the pallet
    /// sequence and persists the session for the first time.
    pub fn generate_path(&mut self, id: Uuid) -> Result<PickPlan, PickingError> {
        let user = self.user_id();
        let mut session = self.session(id)?;
        next_status(Some(session.status), &SessionEvent::GeneratePath)?;
        self.require_owner(&session, &user)?;
        self.check_reservations(&session, "generate path")?;

        let plan = self.plan(&session);
        advance(&mut session, &SessionEvent::GeneratePath)?;
        Self::freeze(&mut session, &plan);
        self.save(&mut session, "generate path")?;
        self.drop_draft(id);

        tracing::info!(
            session_id = %id,
            pallets = plan.pallets_qty(),
            total_units = plan.total_units,
            "path generated"
        );
        Ok(plan)
    }

    /// active -> building. Releases the reservation by dropping the stored
    /// row; the cart comes back as a local draft.
    pub fn return_to_building(&mut self, id: Uuid) -> Result<PickingSession, PickingError> {
        let user = self.user_id();
        let mut session = self.persisted(id, "return to building")?;
        self.require_owner(&session, &user)?;
        advance(&mut session, &SessionEvent::ReturnToBuilding)?;

        self.deps
            .sessions
            .remove(id)
            .map_err(|e| store_err("return to building", e))?;
        self.publish(ChangeEvent::SessionChanged { session_id: id });

        session.updated_at = self.now();
        self.stash_draft(session.clone());
        tracing::info!(session_id = %id, "returned to building");
        Ok(session)
    }

    /// active -> ready_to_double_check.
    pub fn mark_ready(&mut self, id: Uuid) -> Result<PickingSession, PickingError> {
        let user = self.user_id();
        let mut session = self.persisted(id, "mark ready")?;
        next_status(Some(session.status), &SessionEvent::MarkReady)?;
        self.require_owner(&session, &user)?;
        self.check_reservations(&session, "mark ready")?;

        advance(&mut session, &SessionEvent::MarkReady)?;
        let number = session
            .order_number
            .as_deref()
            .and_then(normalize_order_number)
            .unwrap_or_else(|| format!("ORD-{}", self.now().timestamp_millis()));
        session.order_number = Some(number);
        session.correction_notes = None;
        self.save(&mut session, "mark ready")?;

        tracing::info!(
            session_id = %id,
            order_number = session.order_number.as_deref().unwrap_or("-"),
            "ready for double-check"
        );
        Ok(session)
    }

    /// needs_correction -> active. The cart may have changed, so the path
    /// is planned again under the same reservation rules.
    pub fn resume_picking(&mut self, id: Uuid) -> Result<PickPlan, PickingError> {
        let user = self.user_id();
        let mut session = self.persisted(id, "resume picking")?;
        next_status(Some(session.status), &SessionEvent::ResumePicking)?;
        self.require_owner(&session, &user)?;
        self.check_reservations(&session, "resume picking")?;

        let plan = self.plan(&session);
        advance(&mut session, &SessionEvent::ResumePicking)?;
        Self::freeze(&mut session, &plan);
        self.save(&mut session, "resume picking")?;
        self.clear_progress(id);

        tracing::info!(session_id = %id, pallets = plan.pallets_qty(), "picking resumed");
        Ok(plan)
    }

    /// any non-terminal -> cancelled. A draft is simply discarded.
    ///
    /// Only the owner may cancel, or the checker while checking.
    pub fn delete_session(&mut self, id: Uuid) -> Result<(), PickingError> {
        if let Some(mut draft) = self.drop_draft(id) {
            advance(&mut draft, &SessionEvent::Delete)?;
            tracing::info!(session_id = %id, "draft discarded");
            return Ok(());
        }

        let user = self.user_id();
        let mut session = self.persisted(id, "delete session")?;
        let from = session.status;
        next_status(Some(from), &SessionEvent::Delete)?;
        self.require_owner_or_checker(&session, &user)?;
        advance(&mut session, &SessionEvent::Delete)?;
        self.save(&mut session, "delete session")?;
        self.clear_progress(id);
        if self.checking.as_ref().is_some_and(|c| c.id == id) {
            self.checking = None;
        }
        tracing::info!(session_id = %id, from = %from, by = %user, "session cancelled");
        Ok(())
    }
}
