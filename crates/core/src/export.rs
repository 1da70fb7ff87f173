use crate::collection::ResultCollection;
use crate::error::ExportError;
use crate::models::CandidateAssessment;
use rust_xlsxwriter::{Format, Workbook, Worksheet};
use std::io::Write;
use std::path::Path;

pub const LIST_DELIMITER: &str = "; ";
pub const TARGET_REGION_SHEET: &str = "Target Region";
pub const OTHER_REGIONS_SHEET: &str = "Other Regions";

pub const COLUMNS: [&str; 24] = [
    "source_name",
    "email",
    "location.is_target_region",
    "location.detail",
    "skills.finance_economics",
    "skills.analytical",
    "skills.excel",
    "skills.python_sql",
    "skills.identified_skills",
    "experience.years_relevant",
    "experience.autonomy",
    "experience.industry_relevance",
    "experience.key_achievements",
    "cultural_fit.learning_orientation",
    "cultural_fit.impact_driven",
    "cultural_fit.team_orientation",
    "cultural_fit.supporting_evidence",
    "overall_score",
    "key_strengths",
    "potential_concerns",
    "skills_gaps",
    "red_flags",
    "skills_gaps.count",
    "red_flags.count",
];

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Number(f64),
    Bool(bool),
}

impl Cell {
    fn list(items: &[String]) -> Self {
        Cell::Text(items.join(LIST_DELIMITER))
    }

    fn render(&self) -> String {
        match self {
            Cell::Text(text) => text.clone(),
            Cell::Number(number) => number.to_string(),
            Cell::Bool(flag) => flag.to_string(),
        }
    }
}

pub fn flatten(record: &CandidateAssessment) -> Vec<Cell> {
    vec![
        Cell::Text(record.source_name.clone()),
        Cell::Text(record.email.clone().unwrap_or_default()),
        Cell::Bool(record.location.is_target_region),
        Cell::Text(record.location.detail.clone()),
        Cell::Number(record.skills.finance_economics),
        Cell::Number(record.skills.analytical),
        Cell::Number(record.skills.excel),
        Cell::Number(record.skills.python_sql),
        Cell::list(&record.skills.identified_skills),
        Cell::Number(record.experience.years_relevant),
        Cell::Number(record.experience.autonomy),
        Cell::Number(record.experience.industry_relevance),
        Cell::list(&record.experience.key_achievements),
        Cell::Number(record.cultural_fit.learning_orientation),
        Cell::Number(record.cultural_fit.impact_driven),
        Cell::Number(record.cultural_fit.team_orientation),
        Cell::list(&record.cultural_fit.supporting_evidence),
        Cell::Number(record.overall_score),
        Cell::list(&record.key_strengths),
        Cell::list(&record.potential_concerns),
        Cell::list(&record.skills_gaps),
        Cell::list(&record.red_flags),
        Cell::Number(record.skills_gaps.len() as f64),
        Cell::Number(record.red_flags.len() as f64),
    ]
}

pub fn write_csv<W: Write>(collection: &ResultCollection, writer: W) -> Result<(), ExportError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(COLUMNS)?;

    for record in collection.iter() {
        csv_writer.write_record(flatten(record).iter().map(Cell::render))?;
    }

    csv_writer.flush()?;
    Ok(())
}

pub fn write_csv_file(collection: &ResultCollection, path: &Path) -> Result<(), ExportError> {
    let file = std::fs::File::create(path)?;
    write_csv(collection, file)
}

/// Two sheets, target region first, each ranked by overall score.
pub fn build_workbook(collection: &ResultCollection) -> Result<Workbook, ExportError> {
    let (target, other) = collection.partition_by_region();
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();

    for (sheet_name, records) in [(TARGET_REGION_SHEET, target), (OTHER_REGIONS_SHEET, other)] {
        let ranked = records.sort_by(|record| record.overall_score, true);
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(sheet_name)?;
        write_sheet(worksheet, &ranked, &header)?;
    }

    Ok(workbook)
}

fn write_sheet(
    worksheet: &mut Worksheet,
    records: &ResultCollection,
    header: &Format,
) -> Result<(), ExportError> {
    for (col, name) in COLUMNS.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, *name, header)?;
    }

    for (index, record) in records.iter().enumerate() {
        let row = index as u32 + 1;
        for (col, cell) in flatten(record).into_iter().enumerate() {
            let col = col as u16;
            match cell {
                Cell::Text(text) => worksheet.write_string(row, col, text)?,
                Cell::Number(number) => worksheet.write_number(row, col, number)?,
                Cell::Bool(flag) => worksheet.write_boolean(row, col, flag)?,
            };
        }
    }

    Ok(())
}

pub fn write_workbook(collection: &ResultCollection, path: &Path) -> Result<(), ExportError> {
    let mut workbook = build_workbook(collection)?;
    workbook.save(path)?;
    Ok(())
}

pub fn workbook_bytes(collection: &ResultCollection) -> Result<Vec<u8>, ExportError> {
    let mut workbook = build_workbook(collection)?;
    Ok(workbook.save_to_buffer()?)
}
