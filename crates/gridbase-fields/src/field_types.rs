//! Built-in field types.
//!
//! | type | attributes | column |
//! |---|---|---|
//! | `text` | `text_default` | `TEXT` |
//! | `long_text` | | `TEXT` |
//! | `url` | | `TEXT` |
//! | `email` | | `VARCHAR(254)` |
//! | `number` | `number_type`, `number_decimal_places`, `number_negative` | `INTEGER` or `DECIMAL(50, n)` |
//! | `boolean` | | `BOOLEAN NOT NULL DEFAULT FALSE` |
//! | `date` | `date_format`, `date_include_time`, `date_time_format` | `DATE` or `DATETIME` |
//! | `single_select` | `select_options` | `INTEGER` holding the option id |

use std::collections::HashSet;

use chrono::{NaiveDate, NaiveDateTime};
use gridbase_core::{GridbaseError, GridbaseResult, ValidationError};
use gridbase_db::cast::parse_datetime;
use gridbase_db::{CastTarget, ColumnDef, ColumnType, DbExecutor, Value};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::auth::User;
use crate::models::{Attributes, Field, Table};
use crate::registry::{FieldChange, FieldType};

// ── Validation helpers ──────────────────────────────────────────────────

fn invalid(attribute: &str, message: impl Into<String>) -> GridbaseError {
    GridbaseError::ValidationError(ValidationError::for_attribute(
        attribute, message, "invalid",
    ))
}

fn check_string(values: &Attributes, attribute: &str) -> GridbaseResult<()> {
    match values.get(attribute) {
        None | Some(serde_json::Value::String(_)) => Ok(()),
        Some(_) => Err(invalid(attribute, "Must be a string.")),
    }
}

fn check_bool(values: &Attributes, attribute: &str) -> GridbaseResult<()> {
    match values.get(attribute) {
        None | Some(serde_json::Value::Bool(_)) => Ok(()),
        Some(_) => Err(invalid(attribute, "Must be a boolean.")),
    }
}

fn check_choice(values: &Attributes, attribute: &str, choices: &[&str]) -> GridbaseResult<()> {
    match values.get(attribute) {
        None => Ok(()),
        Some(serde_json::Value::String(s)) if choices.contains(&s.as_str()) => Ok(()),
        Some(_) => Err(invalid(
            attribute,
            format!("Must be one of: {}.", choices.join(", ")),
        )),
    }
}

fn attributes(pairs: &[(&str, serde_json::Value)]) -> Attributes {
    pairs
        .iter()
        .map(|(key, value)| ((*key).to_string(), value.clone()))
        .collect()
}

// ── Text ────────────────────────────────────────────────────────────────

/// Single line text with an optional default.
pub struct TextFieldType;

impl FieldType for TextFieldType {
    fn type_name(&self) -> &'static str {
        "text"
    }

    fn allowed_fields(&self) -> &'static [&'static str] {
        &["text_default"]
    }

    fn default_attributes(&self) -> Attributes {
        attributes(&[("text_default", json!(""))])
    }

    fn column_def(&self, field: &Field) -> ColumnDef {
        let column = ColumnDef::new(field.db_column(), ColumnType::Text);
        match field.attribute_str("text_default") {
            Some(default) if !default.is_empty() => column.default(default),
            _ => column,
        }
    }

    fn cast_target(&self, _field: &Field) -> CastTarget {
        CastTarget::Text
    }

    fn prepare_values(&self, values: Attributes, _user: &User) -> GridbaseResult<Attributes> {
        check_string(&values, "text_default")?;
        Ok(values)
    }
}

/// Multi line text.
pub struct LongTextFieldType;

impl FieldType for LongTextFieldType {
    fn type_name(&self) -> &'static str {
        "long_text"
    }

    fn column_def(&self, field: &Field) -> ColumnDef {
        ColumnDef::new(field.db_column(), ColumnType::Text)
    }

    fn cast_target(&self, _field: &Field) -> CastTarget {
        CastTarget::Text
    }
}

/// Text holding an http(s) URL.
pub struct UrlFieldType;

impl FieldType for UrlFieldType {
    fn type_name(&self) -> &'static str {
        "url"
    }

    fn column_def(&self, field: &Field) -> ColumnDef {
        ColumnDef::new(field.db_column(), ColumnType::Text)
    }

    fn cast_target(&self, _field: &Field) -> CastTarget {
        CastTarget::Url
    }
}

/// Text holding an email address.
pub struct EmailFieldType;

impl FieldType for EmailFieldType {
    fn type_name(&self) -> &'static str {
        "email"
    }

    fn column_def(&self, field: &Field) -> ColumnDef {
        ColumnDef::new(field.db_column(), ColumnType::Varchar(254))
    }

    fn cast_target(&self, _field: &Field) -> CastTarget {
        CastTarget::Email
    }
}

// ── Number ──────────────────────────────────────────────────────────────

/// Whole or fixed-point numbers.
pub struct NumberFieldType;

const NUMBER_TYPES: &[&str] = &["INTEGER", "DECIMAL"];
const MAX_DIGITS: u8 = 50;

impl NumberFieldType {
    fn decimal_places(field: &Field) -> Option<u8> {
        if field.attribute_str("number_type") != Some("DECIMAL") {
            return None;
        }
        let places = field
            .attribute_i64("number_decimal_places")
            .and_then(|p| u8::try_from(p).ok())
            .unwrap_or(1);
        Some(places)
    }
}

impl FieldType for NumberFieldType {
    fn type_name(&self) -> &'static str {
        "number"
    }

    fn allowed_fields(&self) -> &'static [&'static str] {
        &["number_type", "number_decimal_places", "number_negative"]
    }

    fn default_attributes(&self) -> Attributes {
        attributes(&[
            ("number_type", json!("INTEGER")),
            ("number_decimal_places", json!(1)),
            ("number_negative", json!(false)),
        ])
    }

    fn column_def(&self, field: &Field) -> ColumnDef {
        let column_type = match Self::decimal_places(field) {
            Some(decimal_places) => ColumnType::Decimal {
                max_digits: MAX_DIGITS,
                decimal_places,
            },
            None => ColumnType::Integer,
        };
        ColumnDef::new(field.db_column(), column_type)
    }

    fn cast_target(&self, field: &Field) -> CastTarget {
        let negative = field.attribute_bool("number_negative");
        match Self::decimal_places(field) {
            Some(places) => CastTarget::Decimal { places, negative },
            None => CastTarget::Integer { negative },
        }
    }

    fn prepare_values(&self, values: Attributes, _user: &User) -> GridbaseResult<Attributes> {
        check_choice(&values, "number_type", NUMBER_TYPES)?;
        check_bool(&values, "number_negative")?;
        if let Some(places) = values.get("number_decimal_places") {
            if !places.as_i64().is_some_and(|p| (1..=5).contains(&p)) {
                return Err(invalid(
                    "number_decimal_places",
                    "Must be a whole number between 1 and 5.",
                ));
            }
        }
        Ok(values)
    }
}

// ── Boolean ─────────────────────────────────────────────────────────────

/// A checkbox. Cells are never empty.
pub struct BooleanFieldType;

impl FieldType for BooleanFieldType {
    fn type_name(&self) -> &'static str {
        "boolean"
    }

    fn can_be_primary_field(&self) -> bool {
        false
    }

    fn column_def(&self, field: &Field) -> ColumnDef {
        ColumnDef::new(field.db_column(), ColumnType::Boolean)
            .not_null()
            .default(false)
    }

    fn cast_target(&self, _field: &Field) -> CastTarget {
        CastTarget::Boolean
    }
}

// ── Date ────────────────────────────────────────────────────────────────

/// A date, optionally with the time of day.
pub struct DateFieldType;

const DATE_FORMATS: &[&str] = &["EU", "US", "ISO"];
const TIME_FORMATS: &[&str] = &["24", "12"];

impl DateFieldType {
    fn date_pattern(field: &Field) -> &'static str {
        match field.attribute_str("date_format") {
            Some("US") => "%m/%d/%Y",
            Some("ISO") => "%Y-%m-%d",
            _ => "%d/%m/%Y",
        }
    }

    /// The time of day pattern, with and without seconds.
    fn time_patterns(field: &Field) -> [&'static str; 2] {
        if field.attribute_str("date_time_format") == Some("12") {
            ["%I:%M:%S %p", "%I:%M %p"]
        } else {
            ["%H:%M:%S", "%H:%M"]
        }
    }

    /// The chrono pattern a user sees cells of `field` in.
    pub fn display_pattern(field: &Field) -> String {
        let date = Self::date_pattern(field);
        if field.attribute_bool("date_include_time") {
            format!("{date} {}", Self::time_patterns(field)[0])
        } else {
            date.to_string()
        }
    }

    /// Renders a stored cell of `field` the way a user sees it.
    pub fn format_cell(field: &Field, value: &Value) -> Option<String> {
        let datetime = match value {
            Value::Date(d) => d.and_hms_opt(0, 0, 0),
            Value::DateTime(dt) => Some(*dt),
            Value::String(s) => parse_datetime(s.trim()),
            _ => None,
        }?;
        Some(datetime.format(&Self::display_pattern(field)).to_string())
    }

    /// Parses user text into a cell of `field`, trying the field's own format
    /// before ISO 8601.
    pub fn parse_cell(field: &Field, text: &str) -> Value {
        let text = text.trim();
        let date = Self::date_pattern(field);
        let [seconds, minutes] = Self::time_patterns(field);
        let with_time = [
            format!("{date} {seconds}"),
            format!("{date} {minutes}"),
            format!("{date} %H:%M:%S"),
            format!("{date} %H:%M"),
        ];
        let parsed = with_time
            .iter()
            .find_map(|pattern| NaiveDateTime::parse_from_str(text, pattern).ok())
            .or_else(|| {
                NaiveDate::parse_from_str(text, date)
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
            })
            .or_else(|| parse_datetime(text));

        match parsed {
            Some(dt) if field.attribute_bool("date_include_time") => Value::DateTime(dt),
            Some(dt) => Value::Date(dt.date()),
            None => Value::Null,
        }
    }
}

impl FieldType for DateFieldType {
    fn type_name(&self) -> &'static str {
        "date"
    }

    fn allowed_fields(&self) -> &'static [&'static str] {
        &["date_format", "date_include_time", "date_time_format"]
    }

    fn default_attributes(&self) -> Attributes {
        attributes(&[
            ("date_format", json!("EU")),
            ("date_include_time", json!(false)),
            ("date_time_format", json!("24")),
        ])
    }

    fn column_def(&self, field: &Field) -> ColumnDef {
        let column_type = if field.attribute_bool("date_include_time") {
            ColumnType::DateTime
        } else {
            ColumnType::Date
        };
        ColumnDef::new(field.db_column(), column_type)
    }

    fn cast_target(&self, field: &Field) -> CastTarget {
        CastTarget::Date {
            include_time: field.attribute_bool("date_include_time"),
        }
    }

    fn prepare_values(&self, values: Attributes, _user: &User) -> GridbaseResult<Attributes> {
        check_choice(&values, "date_format", DATE_FORMATS)?;
        check_bool(&values, "date_include_time")?;
        check_choice(&values, "date_time_format", TIME_FORMATS)?;
        Ok(values)
    }
}

// ── Single select ───────────────────────────────────────────────────────

/// Attribute holding the options of a single select field.
pub const SELECT_OPTIONS: &str = "select_options";
/// Highest option id ever handed out for a field.
const SELECT_OPTIONS_LAST_ID: &str = "select_options_last_id";
const DEFAULT_OPTION_COLOR: &str = "blue";

/// One choice of a single select field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    /// Stable id stored in the cells.
    pub id: i64,
    /// The text shown to users.
    pub value: String,
    /// Display color.
    pub color: String,
}

/// Returns the options of `field`; empty for other field types.
pub fn select_options(field: &Field) -> Vec<SelectOption> {
    field
        .attribute(SELECT_OPTIONS)
        .and_then(|options| serde_json::from_value(options.clone()).ok())
        .unwrap_or_default()
}

/// Gives every option without a known id a new one above `last_id`, and
/// records the highest id handed out.
fn assign_option_ids(values: &mut Attributes, existing: &[SelectOption], last_id: i64) {
    let existing_ids: HashSet<i64> = existing.iter().map(|o| o.id).collect();
    let mut last_id = existing.iter().map(|o| o.id).fold(last_id, i64::max);

    let Some(serde_json::Value::Array(options)) = values.get_mut(SELECT_OPTIONS) else {
        return;
    };
    let mut seen = HashSet::new();
    for option in options.iter_mut().filter_map(serde_json::Value::as_object_mut) {
        let kept = option
            .get("id")
            .and_then(serde_json::Value::as_i64)
            .filter(|id| existing_ids.contains(id) && seen.insert(*id));
        let id = kept.unwrap_or_else(|| {
            last_id += 1;
            last_id
        });
        option.insert("id".to_string(), json!(id));
    }
    values.insert(SELECT_OPTIONS_LAST_ID.to_string(), json!(last_id));
}

/// A choice between user-defined options.
pub struct SingleSelectFieldType;

impl FieldType for SingleSelectFieldType {
    fn type_name(&self) -> &'static str {
        "single_select"
    }

    fn allowed_fields(&self) -> &'static [&'static str] {
        &[SELECT_OPTIONS]
    }

    fn default_attributes(&self) -> Attributes {
        attributes(&[(SELECT_OPTIONS, json!([]))])
    }

    fn column_def(&self, field: &Field) -> ColumnDef {
        ColumnDef::new(field.db_column(), ColumnType::Integer)
    }

    fn cast_target(&self, _field: &Field) -> CastTarget {
        CastTarget::Integer { negative: false }
    }

    fn prepare_values(&self, mut values: Attributes, _user: &User) -> GridbaseResult<Attributes> {
        let Some(raw) = values.get(SELECT_OPTIONS) else {
            return Ok(values);
        };
        let serde_json::Value::Array(items) = raw else {
            return Err(invalid(SELECT_OPTIONS, "Must be a list of options."));
        };

        let mut options = Vec::with_capacity(items.len());
        for item in items {
            let Some(object) = item.as_object() else {
                return Err(invalid(SELECT_OPTIONS, "Every option must be an object."));
            };
            let Some(value) = object.get("value").and_then(serde_json::Value::as_str) else {
                return Err(invalid(SELECT_OPTIONS, "Every option needs a text value."));
            };
            let color = object
                .get("color")
                .and_then(serde_json::Value::as_str)
                .unwrap_or(DEFAULT_OPTION_COLOR);

            let mut option = Attributes::new();
            if let Some(id) = object.get("id").and_then(serde_json::Value::as_i64) {
                option.insert("id".to_string(), json!(id));
            }
            option.insert("value".to_string(), json!(value));
            option.insert("color".to_string(), json!(color));
            options.push(serde_json::Value::Object(option));
        }
        values.insert(SELECT_OPTIONS.to_string(), serde_json::Value::Array(options));
        Ok(values)
    }

    fn before_create(
        &self,
        _table: &Table,
        _primary: bool,
        values: &mut Attributes,
        _order: i64,
        _user: &User,
    ) -> GridbaseResult<()> {
        assign_option_ids(values, &[], 0);
        Ok(())
    }

    fn before_update(
        &self,
        old_field: &Field,
        values: &mut Attributes,
        _user: &User,
    ) -> GridbaseResult<()> {
        let last_id = old_field.attribute_i64(SELECT_OPTIONS_LAST_ID).unwrap_or(0);
        assign_option_ids(values, &select_options(old_field), last_id);
        Ok(())
    }

    fn before_schema_change(
        &self,
        change: &FieldChange<'_>,
        _user: &User,
        db: &dyn DbExecutor,
    ) -> GridbaseResult<()> {
        if change.type_changed() {
            return Ok(());
        }
        let kept: HashSet<i64> = select_options(change.new_field)
            .iter()
            .map(|o| o.id)
            .collect();
        let removed: Vec<Value> = select_options(change.old_field)
            .iter()
            .filter(|o| !kept.contains(&o.id))
            .map(|o| Value::Int(o.id))
            .collect();
        if removed.is_empty() {
            return Ok(());
        }

        let placeholders = vec!["?"; removed.len()].join(", ");
        let sql = format!(
            "UPDATE \"{}\" SET \"{col}\" = NULL WHERE \"{col}\" IN ({placeholders})",
            change.old_model.db_table(),
            col = change.old_column.column,
        );
        let cleared = db.execute_sql(&sql, &removed)?;
        tracing::debug!(
            field_id = change.new_field.id,
            options = removed.len(),
            cleared,
            "cleared cells of removed select options"
        );
        Ok(())
    }
}
