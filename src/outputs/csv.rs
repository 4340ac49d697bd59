//! CSV output (RFC 4180: CRLF line endings, quoted fields where needed).

use super::FIELDS;
use crate::models::HeadlineRecord;

pub fn render(records: &[HeadlineRecord]) -> String {
    let mut out = String::new();
    write_row(&mut out, FIELDS.iter().copied());
    for r in records {
        let time = r.time.as_ref().map(|t| t.to_string()).unwrap_or_default();
        let cells = [
            r.title.as_str(),
            r.url.as_str(),
            time.as_str(),
            r.source.as_deref().unwrap_or(""),
        ];
        write_row(&mut out, cells.into_iter());
    }
    out
}

fn write_row<'a>(out: &mut String, cells: impl Iterator<Item = &'a str>) {
    for (i, cell) in cells.enumerate() {
        if i > 0 {
            out.push(',');
        }
        write_cell(out, cell);
    }
    out.push_str("\r\n");
}

fn write_cell(out: &mut String, cell: &str) {
    if cell.contains([',', '"', '\n', '\r']) {
        out.push('"');
        out.push_str(&cell.replace('"', "\"\""));
        out.push('"');
    } else {
        out.push_str(cell);
    }
}
