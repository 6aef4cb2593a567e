//! Writing the segmentation table as CSV, JSON or an xlsx workbook, and
//! reading it back

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use calamine::{open_workbook, Data, Reader, Xlsx};
use clap::ValueEnum;
use polars::prelude::*;
use rust_xlsxwriter::Workbook;
use tracing::debug;

use crate::classify::SegmentClass;
use crate::data::{read_text_table, require_columns, text_column};
use crate::error::{Error, Result};
use crate::model::CustomerId;
use crate::pipeline::SegmentedCustomer;
use crate::score::RfvScore;

/// Output columns, in order
pub const OUTPUT_COLUMNS: [&str; 9] = [
    "customer_id",
    "recency",
    "frequency",
    "value",
    "r_class",
    "f_class",
    "v_class",
    "composite_score",
    "recommended_action",
];

/// Worksheet holding the table in xlsx exports
pub const SHEET_NAME: &str = "RFV";

/// Interchange format of the exported segmentation
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    /// Comma-separated values with a header row
    Csv,
    /// Array of JSON objects
    Json,
    /// Excel workbook with a single worksheet
    Xlsx,
}

impl ExportFormat {
    /// Pick the format from a file extension, defaulting to CSV.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => ExportFormat::Json,
            Some(ext) if ext.eq_ignore_ascii_case("xlsx") => ExportFormat::Xlsx,
            _ => ExportFormat::Csv,
        }
    }
}

/// Build a table with one row per customer and [`OUTPUT_COLUMNS`] as columns.
pub fn to_frame(customers: &[SegmentedCustomer]) -> Result<DataFrame> {
    let text = |f: fn(&SegmentedCustomer) -> String| customers.iter().map(f).collect::<Vec<_>>();

    let df = DataFrame::new(vec![
        Series::new(OUTPUT_COLUMNS[0], text(|c| c.customer_id.to_string())),
        Series::new(
            OUTPUT_COLUMNS[1],
            customers.iter().map(|c| c.recency).collect::<Vec<u64>>(),
        ),
        Series::new(
            OUTPUT_COLUMNS[2],
            customers.iter().map(|c| c.frequency).collect::<Vec<u64>>(),
        ),
        Series::new(
            OUTPUT_COLUMNS[3],
            customers.iter().map(|c| c.value).collect::<Vec<f64>>(),
        ),
        Series::new(OUTPUT_COLUMNS[4], text(|c| c.r_class.to_string())),
        Series::new(OUTPUT_COLUMNS[5], text(|c| c.f_class.to_string())),
        Series::new(OUTPUT_COLUMNS[6], text(|c| c.v_class.to_string())),
        Series::new(OUTPUT_COLUMNS[7], text(|c| c.composite_score.to_string())),
        Series::new(
            OUTPUT_COLUMNS[8],
            customers
                .iter()
                .map(|c| c.recommended_action.clone())
                .collect::<Vec<Option<String>>>(),
        ),
    ])?;

    Ok(df)
}

/// Write `customers` to `path` in the given format.
pub fn export(customers: &[SegmentedCustomer], path: impl AsRef<Path>, format: ExportFormat) -> Result<()> {
    let path = path.as_ref();
    match format {
        ExportFormat::Csv => write_csv(customers, path)?,
        ExportFormat::Json => write_json(customers, path)?,
        ExportFormat::Xlsx => write_xlsx(customers, path)?,
    }

    debug!(path = %path.display(), ?format, rows = customers.len(), "exported segmentation");
    Ok(())
}

/// Read a previously exported segmentation back from `path`.
pub fn import(path: impl AsRef<Path>, format: ExportFormat) -> Result<Vec<SegmentedCustomer>> {
    let path = path.as_ref();
    match format {
        ExportFormat::Csv => read_csv(path),
        ExportFormat::Json => read_json(path),
        ExportFormat::Xlsx => read_xlsx(path),
    }
}

fn write_csv(customers: &[SegmentedCustomer], path: &Path) -> Result<()> {
    let mut df = to_frame(customers)?;
    let mut file = File::create(path).map_err(|e| Error::io(path, e))?;

    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(&mut df)?;
    Ok(())
}

fn write_json(customers: &[SegmentedCustomer], path: &Path) -> Result<()> {
    let file = File::create(path).map_err(|e| Error::io(path, e))?;
    let mut writer = BufWriter::new(file);

    serde_json::to_writer_pretty(&mut writer, customers)?;
    writer.flush().map_err(|e| Error::io(path, e))
}

fn read_json(path: &Path) -> Result<Vec<SegmentedCustomer>> {
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

fn write_xlsx(customers: &[SegmentedCustomer], path: &Path) -> Result<()> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME)?;

    for (col, name) in (0u16..).zip(OUTPUT_COLUMNS) {
        sheet.write_string(0, col, name)?;
    }

    for (row, customer) in (1u32..).zip(customers) {
        sheet.write_string(row, 0, customer.customer_id.as_str())?;
        sheet.write_number(row, 1, customer.recency as f64)?;
        sheet.write_number(row, 2, customer.frequency as f64)?;
        sheet.write_number(row, 3, customer.value)?;
        sheet.write_string(row, 4, customer.r_class.to_string())?;
        sheet.write_string(row, 5, customer.f_class.to_string())?;
        sheet.write_string(row, 6, customer.v_class.to_string())?;
        sheet.write_string(row, 7, customer.composite_score.to_string())?;
        if let Some(action) = &customer.recommended_action {
            sheet.write_string(row, 8, action)?;
        }
    }

    workbook.save(path)?;
    Ok(())
}

fn read_xlsx(path: &Path) -> Result<Vec<SegmentedCustomer>> {
    let mut workbook: Xlsx<_> = open_workbook(path)?;
    let range = workbook.worksheet_range(SHEET_NAME)?;
    let mut rows = range.rows();

    let header: Vec<String> = rows
        .next()
        .map(|cells| cells.iter().map(ToString::to_string).collect())
        .unwrap_or_default();
    let positions = OUTPUT_COLUMNS
        .iter()
        .map(|name| header.iter().position(|cell| cell.as_str() == *name))
        .collect::<Vec<_>>();

    let missing: Vec<String> = OUTPUT_COLUMNS
        .iter()
        .zip(&positions)
        .filter(|(_, position)| position.is_none())
        .map(|(name, _)| name.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(Error::MissingColumns { missing });
    }

    rows.enumerate()
        .map(|(index, cells)| {
            let text: Vec<Option<String>> = positions
                .iter()
                .map(|position| position.and_then(|p| cells.get(p)).and_then(cell_text))
                .collect();
            let fields: Vec<Option<&str>> = text.iter().map(Option::as_deref).collect();
            parse_row(index + 2, &fields)
        })
        .collect()
}

fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty => None,
        other => Some(other.to_string()),
    }
}

fn read_csv(path: &Path) -> Result<Vec<SegmentedCustomer>> {
    let df = read_text_table(path)?;
    require_columns(&df, &OUTPUT_COLUMNS)?;

    let columns = OUTPUT_COLUMNS
        .iter()
        .map(|name| text_column(&df, name))
        .collect::<Result<Vec<_>>>()?;
    let columns = columns
        .iter()
        .map(|series| series.str())
        .collect::<PolarsResult<Vec<_>>>()?;

    (0..df.height())
        .map(|row| {
            let fields: Vec<Option<&str>> = columns.iter().map(|column| column.get(row)).collect();
            parse_row(row + 2, &fields)
        })
        .collect()
}

/// Parse one exported row, given its cells in [`OUTPUT_COLUMNS`] order.
///
/// Text cells are taken verbatim; only a missing or empty cell counts as
/// absent.
fn parse_row(line: usize, fields: &[Option<&str>]) -> Result<SegmentedCustomer> {
    let field = |i: usize| {
        fields
            .get(i)
            .copied()
            .flatten()
            .filter(|raw| !raw.is_empty())
            .ok_or_else(|| Error::MissingField {
                line,
                column: OUTPUT_COLUMNS[i].to_string(),
            })
    };
    let parse_error = |i: usize, value: &str, expected: &'static str| Error::Parse {
        line,
        column: OUTPUT_COLUMNS[i].to_string(),
        value: value.to_string(),
        expected,
    };
    let class = |i: usize| {
        let raw = field(i)?;
        let mut chars = raw.chars();
        match (chars.next().and_then(SegmentClass::from_char), chars.next()) {
            (Some(class), None) => Ok(class),
            _ => Err(parse_error(i, raw, "a class letter")),
        }
    };
    let count = |i: usize| {
        let raw = field(i)?;
        raw.parse::<u64>()
            .map_err(|_| parse_error(i, raw, "a non-negative integer"))
    };

    let raw_value = field(3)?;
    let value = raw_value
        .parse::<f64>()
        .map_err(|_| parse_error(3, raw_value, "a number"))?;
    let raw_score = field(7)?;
    let composite_score = raw_score
        .parse::<RfvScore>()
        .map_err(|_| parse_error(7, raw_score, "an RFV score"))?;

    Ok(SegmentedCustomer {
        customer_id: CustomerId::new(field(0)?),
        recency: count(1)?,
        frequency: count(2)?,
        value,
        r_class: class(4)?,
        f_class: class(5)?,
        v_class: class(6)?,
        composite_score,
        recommended_action: field(8).ok().map(str::to_string),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::SegmentClass::{A, B, C, D};
    use tempfile::TempDir;

    fn sample() -> Vec<SegmentedCustomer> {
        vec![
            SegmentedCustomer {
                customer_id: CustomerId::from("17850"),
                recency: 0,
                frequency: 12,
                value: 5391.21,
                r_class: A,
                f_class: A,
                v_class: A,
                composite_score: RfvScore::new(A, A, A),
                recommended_action: Some("send discount coupons".to_string()),
            },
            SegmentedCustomer {
                customer_id: CustomerId::from("C-42"),
                recency: 37,
                frequency: 1,
                value: 0.1 + 0.2,
                r_class: C,
                f_class: D,
                v_class: B,
                composite_score: RfvScore::new(C, D, B),
                recommended_action: None,
            },
        ]
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(ExportFormat::from_path(Path::new("out.json")), ExportFormat::Json);
        assert_eq!(ExportFormat::from_path(Path::new("OUT.JSON")), ExportFormat::Json);
        assert_eq!(ExportFormat::from_path(Path::new("out.xlsx")), ExportFormat::Xlsx);
        assert_eq!(ExportFormat::from_path(Path::new("RFV.XLSX")), ExportFormat::Xlsx);
        assert_eq!(ExportFormat::from_path(Path::new("out.csv")), ExportFormat::Csv);
        assert_eq!(ExportFormat::from_path(Path::new("out")), ExportFormat::Csv);
    }

    #[test]
    fn test_frame_layout() {
        let df = to_frame(&sample()).unwrap();

        assert_eq!(df.shape(), (2, OUTPUT_COLUMNS.len()));
        assert_eq!(df.get_column_names(), OUTPUT_COLUMNS.to_vec());
        assert_eq!(df.column("recommended_action").unwrap().null_count(), 1);
    }

    #[test]
    fn test_csv_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("segments.csv");

        export(&sample(), &path, ExportFormat::Csv).unwrap();
        let restored = import(&path, ExportFormat::Csv).unwrap();

        assert_eq!(restored, sample());
    }

    #[test]
    fn test_csv_header_and_encoding() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("segments.csv");

        let mut customers = sample();
        customers[1].recommended_action = Some("churn — no action".to_string());
        export(&customers, &path, ExportFormat::Csv).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some(OUTPUT_COLUMNS.join(",").as_str()));
        assert!(text.contains("churn — no action"));
        assert_eq!(import(&path, ExportFormat::Csv).unwrap(), customers);
    }

    #[test]
    fn test_json_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("segments.json");

        export(&sample(), &path, ExportFormat::Json).unwrap();
        let restored = import(&path, ExportFormat::Json).unwrap();
        assert_eq!(restored, sample());

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json[0]["composite_score"], "AAA");
        assert_eq!(json[0]["customer_id"], "17850");
        assert!(json[1]["recommended_action"].is_null());
    }

    #[test]
    fn test_xlsx_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("segments.xlsx");

        export(&sample(), &path, ExportFormat::Xlsx).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[..2], b"PK", "xlsx is a zip container");
        assert_eq!(import(&path, ExportFormat::Xlsx).unwrap(), sample());
    }

    #[test]
    fn test_xlsx_header_row() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("segments.xlsx");
        export(&sample(), &path, ExportFormat::Xlsx).unwrap();

        let mut workbook: Xlsx<_> = open_workbook(&path).unwrap();
        assert_eq!(workbook.sheet_names(), vec![SHEET_NAME.to_string()]);

        let range = workbook.worksheet_range(SHEET_NAME).unwrap();
        let header: Vec<String> = range.rows().next().unwrap().iter().map(ToString::to_string).collect();
        assert_eq!(header, OUTPUT_COLUMNS.to_vec());
        assert_eq!(range.get_size(), (3, OUTPUT_COLUMNS.len()));
        assert_eq!(range.get_value((1, 3)), Some(&Data::Float(5391.21)));
    }

    #[test]
    fn test_action_text_is_kept_verbatim() {
        let dir = TempDir::new().unwrap();
        let mut customers = sample();
        customers[0].recommended_action = Some("call, then e-mail \"VIP\"  offer".to_string());

        for (name, format) in [
            ("segments.csv", ExportFormat::Csv),
            ("segments.json", ExportFormat::Json),
            ("segments.xlsx", ExportFormat::Xlsx),
        ] {
            let path = dir.path().join(name);
            export(&customers, &path, format).unwrap();
            assert_eq!(import(&path, format).unwrap(), customers, "{name} should keep action text");
        }
    }

    #[test]
    fn test_import_reads_padded_cells_verbatim() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("segments.csv");
        std::fs::write(
            &path,
            format!("{}\nC-7,0,1,1.0,A,A,A,AAA,\"  spaced out \"\n", OUTPUT_COLUMNS.join(",")),
        )
        .unwrap();

        let restored = import(&path, ExportFormat::Csv).unwrap();
        assert_eq!(restored[0].recommended_action.as_deref(), Some("  spaced out "));
    }

    #[test]
    fn test_import_rejects_bad_class() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("segments.csv");
        std::fs::write(
            &path,
            format!("{}\n1,0,1,1.0,E,A,A,AAA,\n", OUTPUT_COLUMNS.join(",")),
        )
        .unwrap();

        let err = import(&path, ExportFormat::Csv).unwrap_err();
        assert!(matches!(err, Error::Parse { line: 2, ref column, .. } if column == "r_class"));
    }
}
