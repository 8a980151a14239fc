//! Seams to the external collaborators: the tracking feed, order price lookup,
//! partner portals, manual overrides and the cancellation list.
//!
//! The engine never retries; a collaborator that fails returns `SourceError` and
//! the engine decides whether that is a per-item skip or a fatal propagation.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::error::SourceError;
use crate::model::{CostMaps, OrderInfo, PortalData, Tracking};

pub trait TrackingSource {
    fn trackings(&mut self) -> Result<Vec<Tracking>, SourceError>;
}

pub trait OrderInfoSource {
    fn order_info(&mut self, order_id: &str) -> Result<OrderInfo, SourceError>;
}

pub trait PortalSource {
    fn portal_data(&mut self, group: &str) -> Result<PortalData, SourceError>;
}

pub trait OverrideSource {
    /// Reimbursements received outside any portal.
    fn non_portal_reimbursements(&mut self) -> Result<CostMaps, SourceError>;

    /// Manually entered tracking -> purchase order assignments.
    fn purchase_order_overrides(&mut self) -> Result<BTreeMap<String, BTreeSet<String>>, SourceError>;
}

pub trait CancellationSource {
    /// Cancelled item descriptions keyed by order id.
    fn cancelled_items(&mut self) -> Result<HashMap<String, Vec<String>>, SourceError>;
}

/// Every collaborator a reconciliation run needs.
pub struct Sources<'a> {
    pub trackings: &'a mut dyn TrackingSource,
    pub orders: &'a mut dyn OrderInfoSource,
    pub portals: &'a mut dyn PortalSource,
    pub overrides: &'a mut dyn OverrideSource,
    pub cancellations: &'a mut dyn CancellationSource,
}

// ---------------------------------------------------------------------------
// In-memory implementations
// ---------------------------------------------------------------------------

impl TrackingSource for Vec<Tracking> {
    fn trackings(&mut self) -> Result<Vec<Tracking>, SourceError> {
        Ok(self.clone())
    }
}

impl OrderInfoSource for HashMap<String, OrderInfo> {
    fn order_info(&mut self, order_id: &str) -> Result<OrderInfo, SourceError> {
        self.get(order_id)
            .cloned()
            .ok_or_else(|| SourceError::UnknownOrder(order_id.to_string()))
    }
}

impl PortalSource for HashMap<String, PortalData> {
    fn portal_data(&mut self, group: &str) -> Result<PortalData, SourceError> {
        Ok(self.get(group).cloned().unwrap_or_default())
    }
}

impl CancellationSource for HashMap<String, Vec<String>> {
    fn cancelled_items(&mut self) -> Result<HashMap<String, Vec<String>>, SourceError> {
        Ok(self.clone())
    }
}

/// Fixed override data.
#[derive(Debug, Clone, Default)]
pub struct StaticOverrides {
    pub reimbursements: CostMaps,
    pub purchase_orders: BTreeMap<String, BTreeSet<String>>,
}

impl OverrideSource for StaticOverrides {
    fn non_portal_reimbursements(&mut self) -> Result<CostMaps, SourceError> {
        Ok(self.reimbursements.clone())
    }

    fn purchase_order_overrides(&mut self) -> Result<BTreeMap<String, BTreeSet<String>>, SourceError> {
        Ok(self.purchase_orders.clone())
    }
}
