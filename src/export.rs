use std::path::Path;

use anyhow::{Context, Result};

use crate::db::SectionRecord;

/// Write the two-column CSV the spreadsheet side consumes: page range and
/// section title, in resolution order.
pub fn write_csv(path: &Path, sections: &[SectionRecord]) -> Result<()> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)?;
        }
    }
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("criando {}", path.display()))?;
    writer.write_record(["paginas", "titulo"])?;
    for s in sections {
        writer.write_record([&s.page_range, &s.label])?;
    }
    writer.flush()?;
    Ok(())
}

/// Compact table for the `sections` command.
pub fn print_table(sections: &[SectionRecord]) {
    println!("{:>3} | {:<9} | {}", "#", "Páginas", "Título");
    println!("{}", "-".repeat(64));
    for (i, s) in sections.iter().enumerate() {
        println!("{:>3} | {:<9} | {}", i + 1, s.page_range, s.label);
    }
    println!("\n{} seções", sections.len());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(range: &str, label: &str) -> SectionRecord {
        SectionRecord {
            position: 0,
            start_page: 0,
            end_page: 0,
            page_range: range.to_string(),
            label: label.to_string(),
        }
    }

    #[test]
    fn csv_roundtrip() {
        let path = std::env::temp_dir().join("diario_segmenter_export_test.csv");
        let sections = vec![
            record("2", "LEIS PROMULGADAS"),
            record("4 - 5", "APRESENTAÇÃO DE PROPOSIÇÕES: REQUERIMENTOS"),
        ];
        write_csv(&path, &sections).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let rows: Vec<Vec<String>> = reader
            .records()
            .map(|r| r.unwrap().iter().map(|f| f.to_string()).collect())
            .collect();
        std::fs::remove_file(&path).ok();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], vec!["2", "LEIS PROMULGADAS"]);
        assert_eq!(rows[1][1], "APRESENTAÇÃO DE PROPOSIÇÕES: REQUERIMENTOS");
    }
}
