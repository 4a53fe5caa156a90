#![cfg(not(tarpaulin_include))]

use calamine::{Reader, Xlsx, open_workbook};
use product_admin::product::NewProduct;
use product_admin::registry::ProductRegistry;
use product_admin::store::{self, SpreadsheetStore};
use std::env;
use std::error::Error;
use std::path::Path;
use tracing::warn;
use tracing_subscriber::EnvFilter;

// Column offsets of the supplier export this tool reads. They differ from
// the catalog layout on purpose; see store::COL_* for the latter.
const SRC_COL_BARCODE: usize = 1;
const SRC_COL_NAME: usize = 2;
const SRC_COL_UNIT: usize = 4;
const SRC_COL_PRICE: usize = 6;

const DEFAULT_CATALOG: &str = "uploads/products.xlsx";

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 || args.len() > 3 {
        eprintln!("Usage: {} <source.xlsx> [catalog.xlsx]", args[0]);
        return Ok(());
    }
    let source = Path::new(&args[1]);
    let catalog = args.get(2).map(String::as_str).unwrap_or(DEFAULT_CATALOG);

    let mut registry = ProductRegistry::open(SpreadsheetStore::new(catalog))?;
    let imported = import_file(source, &mut registry)?;
    println!("Imported {} products into {}", imported, catalog);

    Ok(())
}

/// Read the supplier export and insert each complete row into the catalog.
///
/// A row is complete when it has a barcode, a name and a numeric price.
/// Incomplete rows are silently dropped; rows the registry rejects (for
/// example a barcode that is already in the catalog) are logged and
/// skipped.
///
/// # Returns
/// * `Result<usize, Box<dyn Error>>` - Number of products inserted
fn import_file(source: &Path, registry: &mut ProductRegistry) -> Result<usize, Box<dyn Error>> {
    let mut workbook: Xlsx<_> = open_workbook(source)?;
    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or("No sheets found in Excel file")?;
    let range = workbook.worksheet_range(&sheet_name)?;

    let mut imported = 0;
    for row in range.rows().skip(1) {
        let barcode = store::cell_string(row, SRC_COL_BARCODE);
        let name = store::cell_string(row, SRC_COL_NAME);
        let unit = store::cell_string(row, SRC_COL_UNIT);
        let Some(price) = store::cell_number(row, SRC_COL_PRICE) else {
            continue;
        };
        if barcode.is_empty() || name.is_empty() {
            continue;
        }

        let draft = NewProduct {
            barcode: barcode.clone(),
            name,
            price,
            unit: Some(unit),
        };
        match registry.insert(draft) {
            Ok(_) => imported += 1,
            Err(e) => warn!("skipping row with barcode {barcode}: {e}"),
        }
    }

    Ok(imported)
}
