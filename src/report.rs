use std::path::Path;

use rust_xlsxwriter::{Table, TableColumn, Workbook};

use crate::error::{Error, Result};

const HEADERS: [&str; 3] = ["Building ID", "Prediction", "Ground truth"];
const COLUMN_WIDTH: f64 = 12.0;

fn check_lengths(ids: usize, predictions: usize, ground_truth: usize) -> Result<()> {
    if ids != predictions || ids != ground_truth {
        return Err(Error::invalid_argument(format!(
            "column lengths differ: {ids} ids, {predictions} predictions, {ground_truth} ground truth values"
        )));
    }
    Ok(())
}

/// Writes predictions next to their ground truth as an Excel workbook.
///
/// The first sheet holds a header row (`Building ID`, `Prediction`,
/// `Ground truth`) and one row per building, covered by an Excel table, with
/// the three columns widened. All three slices must have the same length.
pub fn store_xlsx<P, I, V>(ids: &[I], predictions: &[V], ground_truth: &[V], path: P) -> Result<()>
where
    P: AsRef<Path>,
    I: std::fmt::Display,
    V: Into<f64> + Copy,
{
    check_lengths(ids.len(), predictions.len(), ground_truth.len())?;

    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();

    for (row, ((id, prediction), truth)) in ids.iter().zip(predictions).zip(ground_truth).enumerate() {
        let row = row as u32 + 1;
        worksheet.write_string(row, 0, id.to_string())?;
        worksheet.write_number(row, 1, *prediction)?;
        worksheet.write_number(row, 2, *truth)?;
    }

    if ids.is_empty() {
        // A table needs at least one data row.
        for (col, header) in HEADERS.iter().enumerate() {
            worksheet.write_string(0, col as u16, *header)?;
        }
    } else {
        let columns = HEADERS.map(|header| TableColumn::new().set_header(header));
        let table = Table::new().set_columns(&columns);
        worksheet.add_table(0, 0, ids.len() as u32, HEADERS.len() as u16 - 1, &table)?;
    }

    for col in 0..HEADERS.len() as u16 {
        worksheet.set_column_width(col, COLUMN_WIDTH)?;
    }

    workbook.save(path.as_ref())?;
    Ok(())
}

/// Same columns as [`store_xlsx`], written as plain CSV.
///
/// All three slices must have the same length.
pub fn store_csv<P, I, V>(ids: &[I], predictions: &[V], ground_truth: &[V], path: P) -> Result<()>
where
    P: AsRef<Path>,
    I: std::fmt::Display,
    V: std::fmt::Display,
{
    check_lengths(ids.len(), predictions.len(), ground_truth.len())?;

    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(HEADERS)?;
    for ((id, prediction), truth) in ids.iter().zip(predictions).zip(ground_truth) {
        writer.write_record([id.to_string(), prediction.to_string(), truth.to_string()])?;
    }
    writer.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn read_entry(path: &Path, name: &str) -> Option<String> {
        let mut archive = zip::ZipArchive::new(std::fs::File::open(path).unwrap()).unwrap();
        let mut entry = archive.by_name(name).ok()?;
        let mut content = String::new();
        entry.read_to_string(&mut content).unwrap();
        Some(content)
    }

    #[test]
    fn test_store_xlsx() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.xlsx");

        store_xlsx(&["b1", "b2"], &[0.5, 1.25], &[0.5, 1.0], &path).unwrap();

        let table = read_entry(&path, "xl/tables/table1.xml").unwrap();
        assert!(table.contains(r#"ref="A1:C3""#));
        for header in HEADERS {
            assert!(table.contains(&format!(r#"name="{header}""#)));
        }

        let sheet = read_entry(&path, "xl/worksheets/sheet1.xml").unwrap();
        assert!(sheet.contains("<cols>"));
        assert!(sheet.contains(r#"customWidth="1""#));
        assert!(sheet.contains("<v>1.25</v>"));
    }

    #[test]
    fn test_store_xlsx_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.xlsx");

        store_xlsx::<_, &str, f32>(&[], &[], &[], &path).unwrap();

        assert!(read_entry(&path, "xl/tables/table1.xml").is_none());
        let strings = read_entry(&path, "xl/sharedStrings.xml").unwrap();
        assert!(strings.contains("Ground truth"));
    }

    #[test]
    fn test_store_xlsx_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            store_xlsx(&[1], &[0.5, 2.0], &[0.5, 1.0], dir.path().join("report.xlsx")),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_store_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.csv");

        store_csv(&["b1", "b2"], &[0.5, 1.25], &[0.5, 1.0], &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            "Building ID,Prediction,Ground truth\nb1,0.5,0.5\nb2,1.25,1\n"
        );
    }

    #[test]
    fn test_store_csv_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.csv");

        store_csv::<_, &str, f32>(&[], &[], &[], &path).unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "Building ID,Prediction,Ground truth\n"
        );
    }

    #[test]
    fn test_store_csv_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            store_csv(&[1, 2], &[0.5], &[0.5, 1.0], dir.path().join("report.csv")),
            Err(Error::InvalidArgument(_))
        ));
    }
}
