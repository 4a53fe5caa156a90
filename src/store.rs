use crate::error::StoreError;
use crate::product::Product;
use calamine::{Data, Reader, Xlsx, open_workbook};
use rust_xlsxwriter::{Workbook, Worksheet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// Zero-based column positions of the catalog layout. Columns in between
/// belong to the legacy export and are preserved but never read.
pub const COL_ID: usize = 0;
pub const COL_BARCODE: usize = 1;
pub const COL_NAME: usize = 2;
pub const COL_UNIT: usize = 4;
pub const COL_PRICE: usize = 8;

/// Width of a catalog row, trailing legacy columns included.
pub const ROW_WIDTH: usize = 10;

const DEFAULT_SHEET_NAME: &str = "Products";

/// The product catalog persisted as a single-sheet xlsx workbook.
///
/// The store is stateless between calls; each `load` reads the file from
/// scratch and each `save` rewrites it wholesale.
#[derive(Debug, Clone)]
pub struct SpreadsheetStore {
    path: PathBuf,
}

impl SpreadsheetStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load all products from the catalog file.
    ///
    /// The first row is treated as a header and skipped. Rows whose mapped
    /// cells are all empty are dropped; any other row becomes a product,
    /// with non-numeric price cells coerced to `0`.
    ///
    /// # Returns
    /// * `Result<Vec<Product>, StoreError>` - The catalog, empty when the
    ///   file does not exist yet
    ///
    /// # Examples
    /// ```no_run
    /// use product_admin::store::SpreadsheetStore;
    ///
    /// let store = SpreadsheetStore::new("uploads/products.xlsx");
    /// match store.load() {
    ///     Ok(products) => println!("loaded {} products", products.len()),
    ///     Err(e) => eprintln!("failed to load catalog: {}", e),
    /// }
    /// ```
    pub fn load(&self) -> Result<Vec<Product>, StoreError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let mut workbook: Xlsx<_> = open_workbook(&self.path)?;
        let sheet_name = first_sheet_name(&workbook)?;
        let range = workbook.worksheet_range(&sheet_name)?;

        let mut products = Vec::new();
        for row in range.rows().skip(1) {
            if is_blank_row(row) {
                continue;
            }
            products.push(Product {
                id: cell_number(row, COL_ID).unwrap_or(0.0) as i64,
                barcode: cell_string(row, COL_BARCODE),
                name: cell_string(row, COL_NAME),
                unit: cell_string(row, COL_UNIT),
                price: cell_number(row, COL_PRICE).unwrap_or(0.0),
            });
        }

        Ok(products)
    }

    /// Rewrite the catalog file with `products`.
    ///
    /// The sheet name and header row of the existing file are carried over
    /// so that a catalog imported from an external export keeps its column
    /// titles. The workbook is rendered to a buffer, written to a temporary
    /// file next to the catalog and renamed over it, so a crash mid-save
    /// never leaves a truncated workbook behind.
    ///
    /// # Arguments
    /// * `products` - The complete catalog to persist
    pub fn save(&self, products: &[Product]) -> Result<(), StoreError> {
        let (sheet_name, header) = self.current_layout()?;

        let mut worksheet = Worksheet::new();
        worksheet.set_name(sheet_name.as_str())?;
        for (col, title) in header.iter().enumerate().take(ROW_WIDTH) {
            if !title.is_empty() {
                worksheet.write_string(0, col as u16, title.as_str())?;
            }
        }
        for (index, product) in products.iter().enumerate() {
            let row = (index + 1) as u32;
            worksheet.write_number(row, COL_ID as u16, product.id as f64)?;
            worksheet.write_string(row, COL_BARCODE as u16, product.barcode.as_str())?;
            worksheet.write_string(row, COL_NAME as u16, product.name.as_str())?;
            worksheet.write_string(row, COL_UNIT as u16, product.unit.as_str())?;
            worksheet.write_number(row, COL_PRICE as u16, product.price)?;
        }

        let mut workbook = Workbook::new();
        workbook.push_worksheet(worksheet);
        let buffer = workbook.save_to_buffer()?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                fs::create_dir_all(parent)?;
                parent
            }
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(&buffer)?;
        tmp.persist(&self.path)?;
        debug!("wrote {} products to {}", products.len(), self.path.display());

        Ok(())
    }

    /// Sheet name and header row of the current file, or the default layout
    /// when the file does not exist yet.
    fn current_layout(&self) -> Result<(String, Vec<String>), StoreError> {
        if !self.path.exists() {
            return Ok((DEFAULT_SHEET_NAME.to_string(), default_header()));
        }

        let mut workbook: Xlsx<_> = open_workbook(&self.path)?;
        let sheet_name = first_sheet_name(&workbook)?;
        let range = workbook.worksheet_range(&sheet_name)?;
        let header = match range.rows().next() {
            Some(row) => row.iter().map(cell_text).collect(),
            None => default_header(),
        };

        Ok((sheet_name, header))
    }
}

fn default_header() -> Vec<String> {
    let mut header = vec![String::new(); ROW_WIDTH];
    header[COL_ID] = "Id".to_string();
    header[COL_BARCODE] = "Barcode".to_string();
    header[COL_NAME] = "Name".to_string();
    header[COL_UNIT] = "Unit".to_string();
    header[COL_PRICE] = "Price".to_string();
    header
}

fn first_sheet_name<R>(workbook: &Xlsx<R>) -> Result<String, StoreError>
where
    R: std::io::Read + std::io::Seek,
{
    workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or(StoreError::NoSheets)
}

fn is_blank_row(row: &[Data]) -> bool {
    [COL_ID, COL_BARCODE, COL_NAME, COL_UNIT, COL_PRICE]
        .iter()
        .all(|&col| match row.get(col) {
            None | Some(Data::Empty) => true,
            Some(Data::String(s)) => s.trim().is_empty(),
            _ => false,
        })
}

/// Text content of `row[col]`, rendering numbers the way a spreadsheet
/// displays them (`123`, not `123.0`). Missing cells yield an empty string.
pub fn cell_string(row: &[Data], col: usize) -> String {
    row.get(col).map(cell_text).unwrap_or_default()
}

/// Numeric content of `row[col]`. Strings are parsed; anything else is
/// `None`.
pub fn cell_number(row: &[Data], col: usize) -> Option<f64> {
    match row.get(col)? {
        Data::Int(i) => Some(*i as f64),
        Data::Float(f) => Some(*f),
        Data::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => format!("{}", f),
        Data::Bool(b) => b.to_string(),
        Data::Empty => String::new(),
        other => other.to_string().trim().to_string(),
    }
}
