use crate::error::IngestError;
use crate::models::{Page, ReconciledPage};
use regex::Regex;
use tracing::info;

pub const SERIAL_HEADER: &str = "SL";
pub const ANSWER_HEADER: &str = "Ans";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerTable {
    pub rows: Vec<(String, String)>,
}

impl AnswerTable {
    pub fn render(&self) -> String {
        let cells = self
            .rows
            .iter()
            .flat_map(|(serial, answer)| [serial.as_str(), answer.as_str()])
            .collect::<Vec<_>>()
            .join(" ");
        format!("{SERIAL_HEADER}\n{ANSWER_HEADER}\n{cells}")
    }
}

#[derive(Debug, Clone)]
pub struct TableReconciler {
    serial: Regex,
    answer: Regex,
}

impl TableReconciler {
    pub fn new() -> Result<Self, IngestError> {
        Ok(Self {
            serial: Regex::new(r"^[০-৯]{1,3}$")?,
            answer: Regex::new(r"^[ক-হ\x{09DC}\x{09DD}\x{09DF}]$")?,
        })
    }

    pub fn extract_answer_table(&self, layout_text: &str) -> Option<AnswerTable> {
        let lines = layout_text.lines().map(str::trim).collect::<Vec<_>>();

        let marker = lines
            .windows(2)
            .rposition(|pair| pair[0] == SERIAL_HEADER && pair[1] == ANSWER_HEADER)?;

        let mut rows = Vec::new();
        let mut cursor = marker + 2;
        while cursor + 1 < lines.len() {
            let serial = lines[cursor];
            let answer = lines[cursor + 1];

            if !self.serial.is_match(serial) || !self.answer.is_match(answer) {
                break;
            }

            rows.push((serial.to_string(), answer.to_string()));
            cursor += 2;
        }

        if rows.is_empty() {
            None
        } else {
            Some(AnswerTable { rows })
        }
    }

    pub fn reconcile_page(&self, page: &Page) -> ReconciledPage {
        let mut text = page.ocr_text.trim().to_string();
        let table = self
            .extract_answer_table(&page.layout_text)
            .map(|table| table.render());

        if let Some(table_text) = &table {
            info!(page = page.number, "answer table recovered from text layer");
            text.push('\n');
            text.push_str(table_text);
        }

        ReconciledPage {
            number: page.number,
            text,
            table,
        }
    }

    pub fn reconcile_pages(&self, pages: &[Page]) -> Vec<ReconciledPage> {
        pages
            .iter()
            .map(|page| {
                info!(page = page.number, "reconciling page");
                self.reconcile_page(page)
            })
            .collect()
    }
}
