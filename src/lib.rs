pub mod ast;
pub mod graph;
pub mod migrate;
pub mod parser;
pub mod query;
pub mod serializer;
pub mod sql;

use wasm_bindgen::prelude::*;

/// Initialize panic hook for better error messages in WASM
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();
}

/// Reformat ERD text into its canonical form
#[wasm_bindgen(js_name = "formatErd")]
pub fn format_erd(source: &str) -> Result<String, String> {
    let schema = parser::parse(source).map_err(|e| e.to_string())?;
    Ok(serializer::schema_to_text(&schema))
}

/// Build a cross-table SQL query from `table.field` request lines
#[wasm_bindgen(js_name = "generateQuery")]
pub fn generate_query(source: &str, columns: &str) -> Result<String, String> {
    let schema = parser::parse(source).map_err(|e| e.to_string())?;
    let columns = query::parse_columns(columns);
    let select = query::generate_query(&columns, &schema.tables).map_err(|e| e.to_string())?;
    Ok(select.to_sql())
}

/// Plan the migration from an existing schema to the authored ERD
#[wasm_bindgen(js_name = "autoMigrate")]
pub fn auto_migrate(existing: &str, desired: &str) -> Result<String, String> {
    let existing = parser::parse(existing).map_err(|e| e.to_string())?;
    let desired = parser::parse(desired).map_err(|e| e.to_string())?;
    Ok(migrate::diff_schemas(&existing.tables, &desired.tables).to_text())
}

/// Convert a SQL dump into ERD text
#[wasm_bindgen(js_name = "importSql")]
pub fn import_sql(source: &str, dialect: Option<String>) -> Result<String, String> {
    let dialect = dialect
        .as_deref()
        .and_then(sql::Dialect::from_str)
        .unwrap_or_default();
    let schema = sql::parse_sql(source, dialect).map_err(|e| e.to_string())?;
    Ok(serializer::schema_to_text(&schema))
}
