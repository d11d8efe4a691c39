//! pf-schemas
//!
//! Wire and data model shared by every pickflow crate: picking sessions,
//! cart lines, pallets, location reference data, correction notes and the
//! inventory activity log.
//!
//! Field names follow the persisted record shapes (snake_case columns, with
//! the camelCase cart fields `pickingQty` / `totalUnits` kept as-is).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Default number of units that fit on one pallet.
pub const PALLET_CAPACITY: u32 = 12;

// ---------------------------------------------------------------------------
// SessionStatus
// ---------------------------------------------------------------------------

/// Lifecycle status of a [`PickingSession`].
///
/// `Building` is client-local: it is never written to storage. A session
/// gets persisted the first time a pick path is generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Building,
    Active,
    NeedsCorrection,
    ReadyToDoubleCheck,
    DoubleChecking,
    /// **Terminal.**
    Completed,
    /// **Terminal.**
    Cancelled,
}

impl SessionStatus {
    /// Statuses whose cart lines hold a stock reservation and whose order
    /// number is considered "in use".
    pub const RESERVING: [SessionStatus; 4] = [
        SessionStatus::Active,
        SessionStatus::NeedsCorrection,
        SessionStatus::ReadyToDoubleCheck,
        SessionStatus::DoubleChecking,
    ];

    /// Statuses that appear in the verification queue.
    pub const QUEUED: [SessionStatus; 3] = [
        SessionStatus::ReadyToDoubleCheck,
        SessionStatus::DoubleChecking,
        SessionStatus::NeedsCorrection,
    ];

    /// Returns `true` if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Returns `true` for every status that storage knows about.
    pub fn is_persisted(&self) -> bool {
        !matches!(self, Self::Building)
    }

    pub fn reserves_stock(&self) -> bool {
        Self::RESERVING.contains(self)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Building => "building",
            SessionStatus::Active => "active",
            SessionStatus::NeedsCorrection => "needs_correction",
            SessionStatus::ReadyToDoubleCheck => "ready_to_double_check",
            SessionStatus::DoubleChecking => "double_checking",
            SessionStatus::Completed => "completed",
            SessionStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "building" => Some(SessionStatus::Building),
            "active" => Some(SessionStatus::Active),
            "needs_correction" => Some(SessionStatus::NeedsCorrection),
            "ready_to_double_check" => Some(SessionStatus::ReadyToDoubleCheck),
            "double_checking" => Some(SessionStatus::DoubleChecking),
            "completed" => Some(SessionStatus::Completed),
            "cancelled" => Some(SessionStatus::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Cart lines
// ---------------------------------------------------------------------------

/// Identity of a stock row: one SKU at one location of one warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LineKey {
    pub sku: String,
    pub warehouse: String,
    pub location: String,
}

impl LineKey {
    pub fn new(
        sku: impl Into<String>,
        warehouse: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            sku: sku.into(),
            warehouse: warehouse.into(),
            location: location.into(),
        }
    }
}

impl fmt::Display for LineKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}|{}", self.sku, self.warehouse, self.location)
    }
}

/// Size of one unit of a SKU, used for the pallet footprint estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkuDimensions {
    pub length_ft: u32,
    pub width_in: u32,
}

impl Default for SkuDimensions {
    fn default() -> Self {
        Self {
            length_ft: 5,
            width_in: 6,
        }
    }
}

/// One requested line of a session's cart.
///
/// `quantity` is the stock snapshot taken when the line was added;
/// `picking_qty` never exceeds it while the cart is editable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub sku: String,
    pub location: String,
    pub warehouse: String,
    #[serde(rename = "pickingQty")]
    pub picking_qty: u32,
    pub quantity: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku_metadata: Option<SkuDimensions>,
}

impl CartItem {
    pub fn new(
        sku: impl Into<String>,
        warehouse: impl Into<String>,
        location: impl Into<String>,
        picking_qty: u32,
        quantity: i64,
    ) -> Self {
        Self {
            sku: sku.into(),
            location: location.into(),
            warehouse: warehouse.into(),
            picking_qty,
            quantity,
            sku_metadata: None,
        }
    }

    pub fn line_key(&self) -> LineKey {
        LineKey::new(&self.sku, &self.warehouse, &self.location)
    }
}

// ---------------------------------------------------------------------------
// Pallets
// ---------------------------------------------------------------------------

/// A cart line (or a part of one) loaded onto a pallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PalletLine {
    pub sku: String,
    pub warehouse: String,
    pub location: String,
    /// Units of this line on this pallet.
    #[serde(rename = "pickingQty")]
    pub picking_qty: u32,
    /// Requested quantity of the whole cart line.
    pub original_qty: u32,
    /// `true` when the cart line is divided across more than one pallet.
    pub is_split: bool,
}

/// A capacity-bounded group of lines loaded together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pallet {
    /// Sequential, starting at 1.
    pub id: u32,
    pub items: Vec<PalletLine>,
    #[serde(rename = "totalUnits")]
    pub total_units: u32,
    /// Estimated floor area in square inches. Informational only.
    #[serde(default)]
    pub footprint_in2: u32,
}

// ---------------------------------------------------------------------------
// Location directory rows
// ---------------------------------------------------------------------------

/// Reference data: walking sequence of one location. Lower is visited first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub warehouse: String,
    pub location: String,
    pub picking_order: Option<i64>,
}

// ---------------------------------------------------------------------------
// Inventory
// ---------------------------------------------------------------------------

/// Current stock of one line as seen by the inventory provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryRecord {
    pub sku: String,
    pub warehouse: String,
    pub location: String,
    pub quantity: i64,
}

impl InventoryRecord {
    pub fn new(
        sku: impl Into<String>,
        warehouse: impl Into<String>,
        location: impl Into<String>,
        quantity: i64,
    ) -> Self {
        Self {
            sku: sku.into(),
            warehouse: warehouse.into(),
            location: location.into(),
            quantity,
        }
    }

    pub fn line_key(&self) -> LineKey {
        LineKey::new(&self.sku, &self.warehouse, &self.location)
    }
}

// ---------------------------------------------------------------------------
// PickingSession
// ---------------------------------------------------------------------------

/// One order's end-to-end record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickingSession {
    pub id: Uuid,
    pub order_number: Option<String>,
    pub customer_id: Option<String>,
    pub status: SessionStatus,
    pub owner_id: String,
    pub checker_id: Option<String>,
    /// Latest correction message, kept for quick display.
    pub correction_notes: Option<String>,
    pub pallets_qty: Option<u32>,
    pub total_units: Option<u32>,
    pub load_number: Option<String>,
    #[serde(default)]
    pub items: Vec<CartItem>,
    /// Frozen pick sequence; empty while building.
    #[serde(default)]
    pub pallets: Vec<Pallet>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PickingSession {
    /// A fresh, client-local session in `building`.
    pub fn new(
        owner_id: impl Into<String>,
        order_number: Option<String>,
        customer_id: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_number,
            customer_id,
            status: SessionStatus::Building,
            owner_id: owner_id.into(),
            checker_id: None,
            correction_notes: None,
            pallets_qty: None,
            total_units: None,
            load_number: None,
            items: Vec::new(),
            pallets: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Sum of requested units across the cart.
    pub fn cart_units(&self) -> u32 {
        self.items.iter().map(|i| i.picking_qty).sum()
    }

    pub fn item(&self, key: &LineKey) -> Option<&CartItem> {
        self.items.iter().find(|i| i.line_key() == *key)
    }
}

// ---------------------------------------------------------------------------
// Correction notes
// ---------------------------------------------------------------------------

/// A message from checker to builder. Never edited once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrectionNote {
    pub id: Uuid,
    pub session_id: Uuid,
    pub author: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Activity log
// ---------------------------------------------------------------------------

/// Kind of inventory-affecting action recorded in the activity log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    Move,
    Add,
    Deduct,
    Delete,
    Edit,
    Undo,
    SystemReconciliation,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Move => "MOVE",
            ActionType::Add => "ADD",
            ActionType::Deduct => "DEDUCT",
            ActionType::Delete => "DELETE",
            ActionType::Edit => "EDIT",
            ActionType::Undo => "UNDO",
            ActionType::SystemReconciliation => "SYSTEM_RECONCILIATION",
        }
    }
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// One row of the activity log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityLogEntry {
    pub id: Uuid,
    pub sku: String,
    pub action_type: ActionType,
    pub quantity_change: i64,
    pub from_warehouse: Option<String>,
    pub from_location: Option<String>,
    pub to_warehouse: Option<String>,
    pub to_location: Option<String>,
    pub prev_quantity: Option<i64>,
    pub new_quantity: Option<i64>,
    #[serde(default)]
    pub is_reversed: bool,
    pub list_id: Option<Uuid>,
    #[serde(default)]
    pub order_number: Option<String>,
    #[serde(default)]
    pub previous_sku: Option<String>,
    pub performed_by: String,
    pub created_at: DateTime<Utc>,
    /// Set only on projected (not yet confirmed) entries. Never persisted.
    #[serde(rename = "isOptimistic", default, skip_serializing_if = "is_false")]
    pub is_optimistic: bool,
}

impl ActivityLogEntry {
    /// An entry with every optional field empty.
    pub fn new(
        id: Uuid,
        sku: impl Into<String>,
        action_type: ActionType,
        quantity_change: i64,
        performed_by: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            sku: sku.into(),
            action_type,
            quantity_change,
            from_warehouse: None,
            from_location: None,
            to_warehouse: None,
            to_location: None,
            prev_quantity: None,
            new_quantity: None,
            is_reversed: false,
            list_id: None,
            order_number: None,
            previous_sku: None,
            performed_by: performed_by.into(),
            created_at,
            is_optimistic: false,
        }
    }
}

/// Namespace for log entry ids derived from idempotency keys.
const ENTRY_ID_NAMESPACE: Uuid = Uuid::from_u128(0x5d1c_9a4e_7b1f_4c3a_9e0d_2f6b_8a71_c4e2);

/// Deterministic id of the `index`-th log entry produced by the mutation
/// carrying `optimistic_id`.
///
/// The same derivation is used by the writer and by the optimistic
/// projection, so a confirmed entry replaces its projection by id.
pub fn derive_entry_id(optimistic_id: &str, index: usize) -> Uuid {
    Uuid::new_v5(
        &ENTRY_ID_NAMESPACE,
        format!("{optimistic_id}:{index}").as_bytes(),
    )
}
