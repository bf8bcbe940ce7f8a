//! Attribute title → canonical slot mapping
//!
//! The lookup is a table of [`SlotRule`] rows rather than inline branches.
//! Slots are only ever filled once: a later row for an already-set slot is
//! ignored.

use crate::extract::rows::RowScan;
use crate::model::{AttributeEntry, ExtractedFields, RawValue};
use crate::normalize::parse_number;

/// Canonical slots reachable from attribute rows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Area,
    LandArea,
    YearBuilt,
    Bedrooms,
    PropertyType,
    Price,
    PricePerMeter,
    FloorInfo,
    TitleDeedType,
    BuildingDirection,
    RenovationStatus,
    HasParking,
    HasStorage,
    HasBalcony,
    FloorMaterial,
    BathroomType,
    CoolingSystem,
    HeatingSystem,
    HotWaterSystem,
}

/// How a row title is compared against a rule
#[derive(Debug, Clone, Copy)]
pub enum TitleMatch {
    Exact(&'static str),
    Contains(&'static str),
}

/// What a matching row contributes to the slot
#[derive(Debug, Clone, Copy)]
pub enum Capture {
    /// The row's value
    Value,
    /// The whole row; availability is resolved during assembly
    Feature,
    /// The title with the matched label removed, for available rows only
    LabelRemainder,
}

/// Which mapping pass is running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    /// Primary rows as they are collected; icon keys must match
    Primary,
    /// Re-scan of the collected attribute list; icon keys are optional
    Backfill,
}

pub struct SlotRule {
    pub slot: Slot,
    pub title: TitleMatch,
    pub key: Option<&'static str>,
    pub capture: Capture,
}

const fn value_rule(title: &'static str, slot: Slot) -> SlotRule {
    SlotRule {
        slot,
        title: TitleMatch::Exact(title),
        key: None,
        capture: Capture::Value,
    }
}

const fn flag_rule(label: &'static str, slot: Slot) -> SlotRule {
    SlotRule {
        slot,
        title: TitleMatch::Contains(label),
        key: None,
        capture: Capture::Feature,
    }
}

const fn feature_text_rule(label: &'static str, key: &'static str, slot: Slot) -> SlotRule {
    SlotRule {
        slot,
        title: TitleMatch::Contains(label),
        key: Some(key),
        capture: Capture::LabelRemainder,
    }
}

/// Title → slot lookup table, first matching rule wins
pub const SLOT_RULES: &[SlotRule] = &[
    value_rule("متراژ", Slot::Area),
    value_rule("متراژ زمین", Slot::LandArea),
    value_rule("ساخت", Slot::YearBuilt),
    value_rule("اتاق", Slot::Bedrooms),
    value_rule("نوع ملک", Slot::PropertyType),
    value_rule("قیمت کل", Slot::Price),
    value_rule("قیمت هر متر", Slot::PricePerMeter),
    value_rule("طبقه", Slot::FloorInfo),
    value_rule("سند", Slot::TitleDeedType),
    value_rule("جهت ساختمان", Slot::BuildingDirection),
    value_rule("وضعیت واحد", Slot::RenovationStatus),
    flag_rule("پارکینگ", Slot::HasParking),
    flag_rule("انباری", Slot::HasStorage),
    flag_rule("بالکن", Slot::HasBalcony),
    feature_text_rule("جنس کف", "TEXTURE", Slot::FloorMaterial),
    feature_text_rule("سرویس بهداشتی", "WC", Slot::BathroomType),
    feature_text_rule("سرمایش", "SNOWFLAKE", Slot::CoolingSystem),
    feature_text_rule("گرمایش", "SUNNY", Slot::HeatingSystem),
    feature_text_rule("تأمین‌کننده آب گرم", "THERMOMETER", Slot::HotWaterSystem),
];

/// Records scanned rows as attributes and maps them onto slots
///
/// Primary rows are deduplicated into the attribute list and mapped as they
/// are added. Nested rows are only deduplicated; a backfill pass over the
/// whole list then fills whatever slot is still unset.
pub fn apply_rows(scan: RowScan, fields: &mut ExtractedFields) {
    for entry in scan.primary {
        if fields.attributes.push(entry.clone()) {
            map_entry(&entry, Pass::Primary, fields);
        }
    }

    for entry in scan.nested {
        fields.attributes.push(entry);
    }

    let attributes: Vec<AttributeEntry> = fields.attributes.iter().cloned().collect();
    for entry in &attributes {
        map_entry(entry, Pass::Backfill, fields);
    }
}

/// Maps one row using the first rule whose title matches
pub fn map_entry(entry: &AttributeEntry, pass: Pass, fields: &mut ExtractedFields) {
    let title = entry.title.trim();
    let Some(rule) = SLOT_RULES.iter().find(|rule| rule.matches_title(title)) else {
        return;
    };

    if pass == Pass::Primary {
        if let Some(key) = rule.key {
            if entry.key.as_deref() != Some(key) {
                return;
            }
        }
    }

    match rule.capture {
        Capture::Value => {
            if let Some(value) = entry.trimmed_value() {
                set_value(fields, rule.slot, value);
            }
        }
        Capture::Feature => set_feature(fields, rule.slot, entry),
        Capture::LabelRemainder => {
            if entry.available == Some(false) {
                return;
            }
            let remainder = title.replace(rule.title.label(), "").trim().to_string();
            if !remainder.is_empty() {
                set_value(fields, rule.slot, &remainder);
            }
        }
    }
}

impl TitleMatch {
    fn label(&self) -> &'static str {
        match self {
            TitleMatch::Exact(label) | TitleMatch::Contains(label) => *label,
        }
    }
}

impl SlotRule {
    fn matches_title(&self, title: &str) -> bool {
        match self.title {
            TitleMatch::Exact(expected) => title == expected,
            TitleMatch::Contains(label) => title.contains(label),
        }
    }
}

fn set_value(fields: &mut ExtractedFields, slot: Slot, value: &str) {
    match slot {
        Slot::Area => set_once(&mut fields.area, raw_number(value)),
        Slot::LandArea => set_once(&mut fields.land_area, raw_number(value)),
        Slot::YearBuilt => set_once(&mut fields.year_built, raw_number(value)),
        Slot::Bedrooms => set_once(&mut fields.bedrooms, raw_number(value)),
        Slot::Price => set_once(&mut fields.price, raw_number(value)),
        Slot::PricePerMeter => set_once(&mut fields.price_per_meter, raw_number(value)),
        Slot::PropertyType => set_once(&mut fields.property_type, value.to_string()),
        Slot::FloorInfo => set_once(&mut fields.floor_info, value.to_string()),
        Slot::TitleDeedType => set_once(&mut fields.title_deed_type, value.to_string()),
        Slot::BuildingDirection => set_once(&mut fields.building_direction, value.to_string()),
        Slot::RenovationStatus => set_once(&mut fields.renovation_status, value.to_string()),
        Slot::FloorMaterial => set_once(&mut fields.floor_material, value.to_string()),
        Slot::BathroomType => set_once(&mut fields.bathroom_type, value.to_string()),
        Slot::CoolingSystem => set_once(&mut fields.cooling_system, value.to_string()),
        Slot::HeatingSystem => set_once(&mut fields.heating_system, value.to_string()),
        Slot::HotWaterSystem => set_once(&mut fields.hot_water_system, value.to_string()),
        // Flags are captured as whole rows
        Slot::HasParking | Slot::HasStorage | Slot::HasBalcony => {}
    }
}

fn set_feature(fields: &mut ExtractedFields, slot: Slot, entry: &AttributeEntry) {
    let target = match slot {
        Slot::HasParking => &mut fields.has_parking,
        Slot::HasStorage => &mut fields.has_storage,
        Slot::HasBalcony => &mut fields.has_balcony,
        _ => return,
    };
    set_once(target, entry.clone());
}

fn set_once<T>(slot: &mut Option<T>, value: T) {
    if slot.is_none() {
        *slot = Some(value);
    }
}

/// Numeric slot value; kept as text when it does not parse
fn raw_number(value: &str) -> RawValue {
    parse_number(value)
        .map(RawValue::Number)
        .unwrap_or_else(|| RawValue::Text(value.to_string()))
}
