//! CSV discrepancy report, one row per short cluster.

use std::io;

use crate::cluster::join;
use crate::error::Result;
use crate::model::Discrepancy;

pub const REPORT_HEADER: [&str; 10] = [
    "Group",
    "Shortfall",
    "Expected Cost",
    "Tracked Cost",
    "Last Ship Date",
    "Orders",
    "Trackings",
    "POs",
    "Non-reimbursed Trackings",
    "Cancelled Items",
];

pub fn write_report<W: io::Write>(discrepancies: &[Discrepancy], writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(REPORT_HEADER)?;
    for d in discrepancies {
        wtr.write_record([
            d.group.clone().unwrap_or_default(),
            format!("{:.2}", d.shortfall),
            format!("{:.2}", d.expected_cost),
            format!("{:.2}", d.tracked_cost),
            d.last_ship_date.clone(),
            join(&d.orders),
            join(&d.trackings),
            join(&d.purchase_orders),
            join(&d.non_reimbursed_trackings),
            d.cancelled_items.join("; "),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}
