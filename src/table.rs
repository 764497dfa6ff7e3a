use crate::error::{TableError, TableResult};
use crate::models::{
    FundRecord, GroupBy, COL_ISIN, COL_NAME, COL_SUB_TYPE, COL_TYPE, LINK_COLUMNS, NB_LINKS,
};
use crate::normalize::RootNameNormalizer;
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use std::fs::File;
use std::io;
use std::path::Path;
use tracing::debug;

/// Input table: original header and rows kept verbatim, plus the parsed funds
#[derive(Debug, Clone)]
pub struct FundTable {
    pub headers: StringRecord,
    pub rows: Vec<StringRecord>,
    pub funds: Vec<FundRecord>,
}

/// Positions of the columns the linker reads
struct ColumnIndex {
    name: usize,
    isin: usize,
    fund_type: usize,
    sub_type: Option<usize>,
}

impl ColumnIndex {
    fn locate(headers: &StringRecord, group_by: GroupBy) -> TableResult<Self> {
        let position = |wanted: &str| {
            headers
                .iter()
                .position(|h| clean_header(h) == wanted)
        };

        let missing: Vec<String> = group_by
            .required_columns()
            .into_iter()
            .filter(|&column| position(column).is_none())
            .map(str::to_string)
            .collect();
        if !missing.is_empty() {
            return Err(TableError::MissingColumns(missing));
        }

        // Presence was checked above
        Ok(Self {
            name: position(COL_NAME).unwrap_or_default(),
            isin: position(COL_ISIN).unwrap_or_default(),
            fund_type: position(COL_TYPE).unwrap_or_default(),
            sub_type: position(COL_SUB_TYPE),
        })
    }
}

fn clean_header(header: &str) -> &str {
    header.trim_start_matches('\u{feff}').trim()
}

fn field(record: &StringRecord, index: usize) -> String {
    record.get(index).unwrap_or("").trim().to_string()
}

impl FundTable {
    pub fn from_path<P: AsRef<Path>>(
        path: P,
        delimiter: u8,
        group_by: GroupBy,
        normalizer: &RootNameNormalizer,
    ) -> TableResult<Self> {
        let file = File::open(path)?;
        Self::from_reader(file, delimiter, group_by, normalizer)
    }

    pub fn from_reader<R: io::Read>(
        reader: R,
        delimiter: u8,
        group_by: GroupBy,
        normalizer: &RootNameNormalizer,
    ) -> TableResult<Self> {
        let mut csv_reader = ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let headers = csv_reader.headers()?.clone();
        let columns = ColumnIndex::locate(&headers, group_by)?;

        let mut rows = Vec::new();
        let mut funds = Vec::new();
        for result in csv_reader.records() {
            let record = result?;
            if record.iter().all(|value| value.trim().is_empty()) {
                continue;
            }

            let name = field(&record, columns.name);
            let sub_type = columns
                .sub_type
                .map(|index| field(&record, index))
                .filter(|value| !value.is_empty());
            // Links carry the trimmed name, so the row must too
            let row: StringRecord = record
                .iter()
                .enumerate()
                .map(|(index, value)| if index == columns.name { name.as_str() } else { value })
                .collect();
            funds.push(FundRecord {
                root_name: normalizer.normalize(&name),
                isin: field(&record, columns.isin),
                fund_type: field(&record, columns.fund_type),
                sub_type,
                name,
            });
            rows.push(row);
        }

        debug!(rows = funds.len(), columns = headers.len(), "fund table loaded");
        Ok(Self { headers, rows, funds })
    }

    /// Builds a table with the standard four columns from parsed funds
    pub fn from_funds(funds: Vec<FundRecord>) -> Self {
        let headers = StringRecord::from(vec![COL_NAME, COL_ISIN, COL_TYPE, COL_SUB_TYPE]);
        let rows = funds
            .iter()
            .map(|fund| {
                StringRecord::from(vec![
                    fund.name.as_str(),
                    fund.isin.as_str(),
                    fund.fund_type.as_str(),
                    fund.sub_type.as_deref().unwrap_or(""),
                ])
            })
            .collect();
        Self { headers, rows, funds }
    }

    pub fn len(&self) -> usize {
        self.funds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.funds.is_empty()
    }
}

/// Input table joined with its computed links, ready to be written out
pub struct LinkedTable<'a> {
    pub table: &'a FundTable,
    pub links: &'a [[String; NB_LINKS]],
}

impl<'a> LinkedTable<'a> {
    pub fn new(table: &'a FundTable, links: &'a [[String; NB_LINKS]]) -> Self {
        Self { table, links }
    }

    pub fn write_to_path<P: AsRef<Path>>(&self, path: P, delimiter: u8) -> TableResult<()> {
        let file = File::create(path)?;
        self.write_to(file, delimiter)
    }

    pub fn write_to<W: io::Write>(&self, writer: W, delimiter: u8) -> TableResult<()> {
        let mut csv_writer = WriterBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .from_writer(writer);

        let width = self.table.headers.len();
        let mut header: Vec<&str> = self.table.headers.iter().collect();
        header.extend(LINK_COLUMNS);
        csv_writer.write_record(&header)?;

        for (row, links) in self.table.rows.iter().zip(self.links) {
            // Rows are fitted to the header so the links land under their headers
            let mut values: Vec<&str> = row.iter().take(width).collect();
            values.resize(width, "");
            values.extend(links.iter().map(String::as_str));
            csv_writer.write_record(&values)?;
        }

        csv_writer.flush()?;
        Ok(())
    }
}
