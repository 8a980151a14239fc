//! CSV-backed collaborators.
//!
//! Each input file is a headered CSV; columns are located by name so extra
//! columns are ignored. Multi-valued cells (order ids, tuple trackings) are
//! comma-joined inside one quoted cell.

use std::collections::HashMap;
use std::path::Path;

use csv::StringRecord;

use crate::config::{resolve, DataConfig};
use crate::error::{ReconError, Result, SourceError};
use crate::model::{OrderInfo, PortalData, Tracking, TrackingTuple, TupleCost};
use crate::sources::{CancellationSource, Sources, StaticOverrides};

/// All collaborator data for one run, read from the files a config names.
pub struct CsvSources {
    pub trackings: Vec<Tracking>,
    pub order_prices: HashMap<String, OrderInfo>,
    pub portals: HashMap<String, PortalData>,
    pub overrides: StaticOverrides,
    pub cancellations: CsvCancellations,
}

impl CsvSources {
    /// Read every configured file. Paths are resolved against `base_dir`.
    /// A broken cancellation file is not an error here; it surfaces later as a
    /// skipped annotation.
    pub fn open(base_dir: &Path, data: &DataConfig) -> Result<Self> {
        let read = |path: &Path| -> Result<(String, String)> {
            let full = resolve(base_dir, path);
            let label = full.display().to_string();
            let text = std::fs::read_to_string(&full).map_err(|source| ReconError::ReadFile {
                path: label.clone(),
                source,
            })?;
            Ok((label, text))
        };

        let (label, text) = read(&data.trackings)?;
        let trackings = load_trackings(&label, &text)?;

        let (label, text) = read(&data.order_prices)?;
        let order_prices = load_order_prices(&label, &text)?;

        let mut portals: HashMap<String, PortalData> = HashMap::new();
        if let Some(ref path) = data.portal_tuple_costs {
            let (label, text) = read(path)?;
            for (group, tuple, cost) in load_tuple_costs(&label, &text)? {
                portals.entry(group).or_default().tuple_costs.insert(tuple, cost);
            }
        }
        if let Some(ref path) = data.portal_po_costs {
            let (label, text) = read(path)?;
            for (group, po, cost) in load_po_costs(&label, &text)? {
                let group = group.ok_or_else(|| ReconError::MissingColumn {
                    file: label.clone(),
                    column: "group".into(),
                })?;
                portals.entry(group).or_default().po_costs.insert(po, cost);
            }
        }
        if let Some(ref path) = data.portal_tracking_pos {
            let (label, text) = read(path)?;
            for (group, tracking, po) in load_tracking_pos(&label, &text)? {
                let group = group.ok_or_else(|| ReconError::MissingColumn {
                    file: label.clone(),
                    column: "group".into(),
                })?;
                portals
                    .entry(group)
                    .or_default()
                    .tracking_pos
                    .entry(tracking)
                    .or_default()
                    .insert(po);
            }
        }

        let mut overrides = StaticOverrides::default();
        if let Some(ref path) = data.non_portal_tuple_costs {
            let (label, text) = read(path)?;
            for (group, tuple, cost) in load_tuple_costs(&label, &text)? {
                overrides
                    .reimbursements
                    .tuple_costs
                    .insert(tuple, TupleCost { group, cost });
            }
        }
        if let Some(ref path) = data.non_portal_po_costs {
            let (label, text) = read(path)?;
            for (_, po, cost) in load_po_costs(&label, &text)? {
                overrides.reimbursements.po_costs.insert(po, cost);
            }
        }
        if let Some(ref path) = data.po_overrides {
            let (label, text) = read(path)?;
            for (_, tracking, po) in load_tracking_pos(&label, &text)? {
                overrides.purchase_orders.entry(tracking).or_default().insert(po);
            }
        }

        let cancellations = match data.cancellations {
            Some(ref path) => CsvCancellations(
                read(path)
                    .and_then(|(label, text)| load_cancellations(&label, &text))
                    .map_err(|e| e.to_string()),
            ),
            None => CsvCancellations(Ok(HashMap::new())),
        };

        log::info!(
            "loaded {} trackings, {} order prices, portal data for {} group(s)",
            trackings.len(),
            order_prices.len(),
            portals.len()
        );

        Ok(Self {
            trackings,
            order_prices,
            portals,
            overrides,
            cancellations,
        })
    }

    pub fn sources(&mut self) -> Sources<'_> {
        Sources {
            trackings: &mut self.trackings,
            orders: &mut self.order_prices,
            portals: &mut self.portals,
            overrides: &mut self.overrides,
            cancellations: &mut self.cancellations,
        }
    }
}

/// Cancellation data, or the reason it could not be read.
pub struct CsvCancellations(pub std::result::Result<HashMap<String, Vec<String>>, String>);

impl CancellationSource for CsvCancellations {
    fn cancelled_items(&mut self) -> std::result::Result<HashMap<String, Vec<String>>, SourceError> {
        self.0
            .clone()
            .map_err(|message| SourceError::unavailable("cancellations", message))
    }
}

// ---------------------------------------------------------------------------
// Per-file loaders
// ---------------------------------------------------------------------------

struct Columns {
    file: String,
    headers: Vec<String>,
}

impl Columns {
    fn required(&self, name: &str) -> Result<usize> {
        self.optional(name).ok_or_else(|| ReconError::MissingColumn {
            file: self.file.clone(),
            column: name.into(),
        })
    }

    fn optional(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }
}

fn read_records(file: &str, data: &str) -> Result<(Columns, Vec<StringRecord>)> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(data.as_bytes());

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.to_string())
        .collect();
    let records = reader.records().collect::<std::result::Result<Vec<_>, _>>()?;
    Ok((
        Columns {
            file: file.into(),
            headers,
        },
        records,
    ))
}

fn cell(record: &StringRecord, idx: Option<usize>) -> &str {
    idx.and_then(|i| record.get(i)).unwrap_or("")
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Parse a money cell. Accepts `$` and thousands separators.
fn parse_amount(file: &str, key: &str, value: &str) -> Result<f64> {
    let cleaned: String = value.chars().filter(|c| *c != '$' && *c != ',').collect();
    cleaned
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
        .ok_or_else(|| ReconError::AmountParse {
            file: file.into(),
            key: key.into(),
            value: value.into(),
        })
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "" => None,
        "true" | "yes" | "y" | "1" => Some(true),
        "false" | "no" | "n" | "0" => Some(false),
        _ => None,
    }
}

/// `tracking_number,group,order_ids,ship_date[,price,email_id,reconcile]`
pub fn load_trackings(file: &str, data: &str) -> Result<Vec<Tracking>> {
    let (cols, records) = read_records(file, data)?;
    let number_idx = cols.required("tracking_number")?;
    let group_idx = cols.required("group")?;
    let orders_idx = cols.required("order_ids")?;
    let date_idx = cols.required("ship_date")?;
    let price_idx = cols.optional("price");
    let email_idx = cols.optional("email_id");
    let reconcile_idx = cols.optional("reconcile");

    let mut trackings = Vec::with_capacity(records.len());
    for record in &records {
        let tracking_number = cell(record, Some(number_idx)).to_string();
        if tracking_number.is_empty() {
            continue;
        }
        let price = match cell(record, price_idx) {
            "" => None,
            value => Some(parse_amount(file, &tracking_number, value)?),
        };
        trackings.push(Tracking {
            group: non_empty(cell(record, Some(group_idx))),
            order_ids: split_list(cell(record, Some(orders_idx))),
            price,
            email_id: non_empty(cell(record, email_idx)),
            ship_date: cell(record, Some(date_idx)).to_string(),
            reconcile: parse_flag(cell(record, reconcile_idx)).unwrap_or(true),
            tracking_number,
        });
    }
    Ok(trackings)
}

/// `order_id,cost[,email_id]`
pub fn load_order_prices(file: &str, data: &str) -> Result<HashMap<String, OrderInfo>> {
    let (cols, records) = read_records(file, data)?;
    let order_idx = cols.required("order_id")?;
    let cost_idx = cols.required("cost")?;
    let email_idx = cols.optional("email_id");

    let mut prices = HashMap::with_capacity(records.len());
    for record in &records {
        let order_id = cell(record, Some(order_idx)).to_string();
        let cost = parse_amount(file, &order_id, cell(record, Some(cost_idx)))?;
        prices.insert(
            order_id,
            OrderInfo {
                cost,
                email_id: non_empty(cell(record, email_idx)),
            },
        );
    }
    Ok(prices)
}

/// `order_id,item`, one row per cancelled item.
pub fn load_cancellations(file: &str, data: &str) -> Result<HashMap<String, Vec<String>>> {
    let (cols, records) = read_records(file, data)?;
    let order_idx = cols.required("order_id")?;
    let item_idx = cols.required("item")?;

    let mut cancelled: HashMap<String, Vec<String>> = HashMap::new();
    for record in &records {
        cancelled
            .entry(cell(record, Some(order_idx)).to_string())
            .or_default()
            .push(cell(record, Some(item_idx)).to_string());
    }
    Ok(cancelled)
}

/// `group,trackings,cost` where `trackings` is the comma-joined tuple.
pub fn load_tuple_costs(file: &str, data: &str) -> Result<Vec<(String, TrackingTuple, f64)>> {
    let (cols, records) = read_records(file, data)?;
    let group_idx = cols.required("group")?;
    let trackings_idx = cols.required("trackings")?;
    let cost_idx = cols.required("cost")?;

    let mut rows = Vec::with_capacity(records.len());
    for record in &records {
        let tuple = TrackingTuple::parse(cell(record, Some(trackings_idx)));
        if tuple.is_empty() {
            continue;
        }
        let cost = parse_amount(file, &tuple.to_string(), cell(record, Some(cost_idx)))?;
        rows.push((cell(record, Some(group_idx)).to_string(), tuple, cost));
    }
    Ok(rows)
}

/// `[group,]purchase_order,cost`
pub fn load_po_costs(file: &str, data: &str) -> Result<Vec<(Option<String>, String, f64)>> {
    let (cols, records) = read_records(file, data)?;
    let group_idx = cols.optional("group");
    let po_idx = cols.required("purchase_order")?;
    let cost_idx = cols.required("cost")?;

    let mut rows = Vec::with_capacity(records.len());
    for record in &records {
        let po = cell(record, Some(po_idx)).to_string();
        let cost = parse_amount(file, &po, cell(record, Some(cost_idx)))?;
        rows.push((non_empty(cell(record, group_idx)), po, cost));
    }
    Ok(rows)
}

/// `[group,]tracking,purchase_order`
pub fn load_tracking_pos(file: &str, data: &str) -> Result<Vec<(Option<String>, String, String)>> {
    let (cols, records) = read_records(file, data)?;
    let group_idx = cols.optional("group");
    let tracking_idx = cols.required("tracking")?;
    let po_idx = cols.required("purchase_order")?;

    Ok(records
        .iter()
        .filter(|r| !cell(r, Some(tracking_idx)).is_empty() && !cell(r, Some(po_idx)).is_empty())
        .map(|r| {
            (
                non_empty(cell(r, group_idx)),
                cell(r, Some(tracking_idx)).to_string(),
                cell(r, Some(po_idx)).to_string(),
            )
        })
        .collect())
}
