//! Text and JSON rendering of CLI results.

use crate::store::Property;
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use owo_colors::OwoColorize;
use serde::Serialize;

/// One item in a listing
#[derive(Debug, Clone, Serialize)]
pub struct ItemRow {
    pub name: String,
    pub index: usize,
    pub primary_type: String,
    pub kind: &'static str,
    pub id: String,
    pub count: Option<i64>,
}

impl ItemRow {
    pub fn display_name(&self) -> String {
        match self.index {
            1 => self.name.clone(),
            n => format!("{}[{}]", self.name, n),
        }
    }
}

/// Facet navigation tree for `nav`
#[derive(Debug, Clone, Serialize)]
pub struct NavTree {
    #[serde(flatten)]
    pub item: ItemRow,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NavTree>,
}

/// Bold, underlined heading. owo-colors leaves it plain when NO_COLOR is set.
pub fn format_section_heading(title: &str) -> String {
    format!("{}", title.bold().underline())
}

pub fn format_listing_text(path: &str, rows: &[ItemRow]) -> String {
    let mut out = format!("{}\n\n", format_section_heading(path));
    if rows.is_empty() {
        out.push_str("  (no children)\n");
        return out;
    }
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Name", "Type", "Kind", "Id", "Count"]);
    for row in rows {
        table.add_row(vec![
            row.display_name(),
            row.primary_type.clone(),
            row.kind.to_string(),
            row.id.clone(),
            row.count.map(|c| c.to_string()).unwrap_or_else(|| "-".to_string()),
        ]);
    }
    out.push_str(&table.to_string());
    out
}

pub fn format_properties_text(row: &ItemRow, properties: &[Property]) -> String {
    let mut out = format!("{}\n\n", format_section_heading(&row.display_name()));
    out.push_str(&format!("  Type: {}\n  Kind: {}\n  Id:   {}\n\n", row.primary_type, row.kind, row.id));
    if properties.is_empty() {
        out.push_str("  (no properties)\n");
        return out;
    }
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Property", "Type", "Value"]);
    for property in properties {
        let value_type = property.first().map(|v| v.type_name()).unwrap_or("-");
        let values = property.string_values();
        let value = if property.multiple {
            format!("[{}]", values.join(", "))
        } else {
            values.join(", ")
        };
        table.add_row(vec![property.name.clone(), value_type.to_string(), value]);
    }
    out.push_str(&table.to_string());
    out
}

pub fn format_nav_text(tree: &NavTree) -> String {
    let mut out = String::new();
    render_nav(tree, 0, &mut out);
    out
}

fn render_nav(tree: &NavTree, depth: usize, out: &mut String) {
    let count = tree.item.count.map(|c| format!(" ({})", c)).unwrap_or_default();
    out.push_str(&format!("{}{}{}\n", "  ".repeat(depth), tree.item.display_name(), count));
    for child in &tree.children {
        render_nav(child, depth + 1, out);
    }
}

pub fn properties_json(properties: &[Property]) -> serde_json::Value {
    let map: serde_json::Map<String, serde_json::Value> = properties
        .iter()
        .map(|p| {
            let values: Vec<serde_json::Value> = p
                .string_values()
                .into_iter()
                .map(serde_json::Value::String)
                .collect();
            let value = if p.multiple || values.len() != 1 {
                serde_json::Value::Array(values)
            } else {
                values.into_iter().next().unwrap_or(serde_json::Value::Null)
            };
            (p.name.clone(), value)
        })
        .collect();
    serde_json::Value::Object(map)
}
