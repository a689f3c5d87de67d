//! Informe PDF del riesgo: portada, secciones clave/valor, noticias y
//! tablas de sublímites/edificios, con pie «Page i of n» en cada página.
//!
//! La composición es tipográficamente modesta (fuentes builtin, columnas
//! fijas, truncado con elipsis); el contenido manda sobre el acabado.

use std::io::BufWriter;

use anyhow::{anyhow, Result};
use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference, PdfLayerIndex, PdfLayerReference, PdfPageIndex};
use serde::Deserialize;
use serde_json::Value;

use crate::export::underscored;
use crate::fields::{
    self, ANAGRAFICA_FIELDS, BUILDING_FIELDS, FieldTable, GENERAL_LIABILITY_FIELDS,
    PRODUCT_LIABILITY_FIELDS, PROPERTY_FIELDS, SUBLIMIT_FIELDS,
};
use crate::models::{ExtractedRecord, NewsResult};

const PORTRAIT: (f64, f64) = (210.0, 297.0);
const LANDSCAPE: (f64, f64) = (297.0, 210.0);
const MARGIN: f64 = 20.0;
const LINE_GAP: f64 = 1.35;

/// Qué secciones entran en el informe y los datos opcionales de portada.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PdfExportConfig {
    pub include_risk_summary: bool,
    pub include_latest_news: bool,
    pub include_anagrafica: bool,
    pub include_property_details: bool,
    pub include_general_liability_details: bool,
    pub include_product_liability_details: bool,
    pub include_sublimits: bool,
    pub include_building_details: bool,
    pub use_custom_cover_page: bool,
    pub policy_number: String,
    pub underwriter_name: String,
}

impl Default for PdfExportConfig {
    fn default() -> Self {
        Self {
            include_risk_summary: true,
            include_latest_news: true,
            include_anagrafica: true,
            include_property_details: true,
            include_general_liability_details: true,
            include_product_liability_details: true,
            include_sublimits: true,
            include_building_details: true,
            use_custom_cover_page: false,
            policy_number: String::new(),
            underwriter_name: String::new(),
        }
    }
}

/// Nombre de fichero sugerido para el PDF.
pub fn pdf_filename(record: &ExtractedRecord) -> String {
    match record.entity_name() {
        Some(name) => format!("{}_Risk_Report.pdf", underscored(name)),
        None => "Risk_Report.pdf".to_string(),
    }
}

/// Genera el informe completo y devuelve los bytes del PDF.
pub fn generate_pdf_report(
    record: &ExtractedRecord,
    news: Option<&NewsResult>,
    config: &PdfExportConfig,
) -> Result<Vec<u8>> {
    let entity = record.entity_name().unwrap_or("Risk Report").to_string();
    let mut writer = ReportWriter::new("Risk Assessment Report")?;

    // --- Portada ---
    writer.centered_text("Risk Assessment Report", 28.0, 150.0, true);
    writer.centered_text(
        &format!("Prepared for: {}", record.entity_name().unwrap_or("N/A")),
        16.0,
        170.0,
        false,
    );
    let mut cover_y = 195.0;
    if config.use_custom_cover_page {
        if !config.policy_number.is_empty() {
            writer.centered_text(
                &format!("Policy Number: {}", config.policy_number),
                11.0,
                cover_y,
                false,
            );
            cover_y += 8.0;
        }
        if !config.underwriter_name.is_empty() {
            writer.centered_text(
                &format!("Underwriter: {}", config.underwriter_name),
                11.0,
                cover_y,
                false,
            );
        }
    }
    let generated = chrono::Local::now().format("%Y-%m-%d").to_string();
    writer.centered_text(&format!("Generated on: {generated}"), 11.0, 260.0, false);

    // --- Secciones de contenido ---
    writer.add_page(PORTRAIT);

    if config.include_risk_summary {
        writer.section_title("Risk Summary");
        writer.paragraph(record.risk_summary.risk_summary.as_deref().unwrap_or(""));
    }

    if config.include_latest_news {
        if let Some(news) = news {
            writer.section_title("Latest News");
            if let Some(summary) = news.summary.as_deref().filter(|s| !s.trim().is_empty()) {
                writer.subtitle("Web Summary");
                writer.paragraph(summary);
            }
            if !news.citations.is_empty() {
                writer.subtitle("Recent Mentions");
                for citation in &news.citations {
                    let title = citation.title.as_deref().unwrap_or(&citation.uri);
                    writer.bullet_line(title, true);
                    writer.bullet_line(&citation.uri, false);
                }
                writer.gap(6.0);
            }
        }
    }

    let fixed_sections: [(bool, &str, FieldTable, Value, Option<(&str, &str)>); 4] = [
        (
            config.include_anagrafica,
            "General Information",
            ANAGRAFICA_FIELDS,
            serde_json::to_value(&record.anagrafica)?,
            None,
        ),
        (
            config.include_property_details,
            "Property Details",
            PROPERTY_FIELDS,
            serde_json::to_value(&record.property_details)?,
            Some(("Property Notes", "propertyNotes")),
        ),
        (
            config.include_general_liability_details,
            "General Liability Details",
            GENERAL_LIABILITY_FIELDS,
            serde_json::to_value(&record.general_liability_details)?,
            Some(("General Liability Notes", "generalLiabilityNotes")),
        ),
        (
            config.include_product_liability_details,
            "Product Liability Details",
            PRODUCT_LIABILITY_FIELDS,
            serde_json::to_value(&record.product_liability_details)?,
            Some(("Product Liability Notes", "productLiabilityNotes")),
        ),
    ];

    for (included, title, table, section, notes) in fixed_sections {
        if !included {
            continue;
        }
        writer.section_title(title);
        for (key, label) in table {
            let value = fields::display_value(&fields::field_value(&section, key));
            writer.key_value(label, &value);
        }
        if let Some((label, key)) = notes {
            let value = fields::display_value(&fields::field_value(&section, key));
            if !value.is_empty() {
                writer.key_value(label, &value);
            }
        }
        writer.gap(8.0);
    }

    if config.include_sublimits && !record.sublimits.is_empty() {
        writer.section_title("Sublimits");
        let headers: Vec<&str> = SUBLIMIT_FIELDS.iter().map(|(_, label)| *label).collect();
        let rows: Vec<Vec<String>> = record
            .sublimits
            .iter()
            .map(|sublimit| {
                let section = serde_json::to_value(sublimit).unwrap_or(Value::Null);
                SUBLIMIT_FIELDS
                    .iter()
                    .map(|(key, _)| fields::display_value(&fields::field_value(&section, key)))
                    .collect()
            })
            .collect();
        writer.table(&headers, &rows, 9.0);
    }

    if config.include_building_details && !record.building_details.is_empty() {
        // Demasiadas columnas para el retrato: página apaisada propia.
        writer.add_page(LANDSCAPE);
        writer.section_title("Building Details");
        let mut headers: Vec<&str> = BUILDING_FIELDS.iter().map(|(_, label)| *label).collect();
        headers.push("Building Notes");
        let rows: Vec<Vec<String>> = record
            .building_details
            .iter()
            .map(|building| {
                let section = serde_json::to_value(building).unwrap_or(Value::Null);
                let mut row: Vec<String> = BUILDING_FIELDS
                    .iter()
                    .map(|(key, _)| fields::display_value(&fields::field_value(&section, key)))
                    .collect();
                row.push(fields::display_value(&fields::field_value(&section, "buildingNotes")));
                row
            })
            .collect();
        writer.table(&headers, &rows, 6.0);
    }

    writer.into_bytes(&entity)
}

// ---------------------------------------------------------------------
// Escritor de páginas
// ---------------------------------------------------------------------

struct ReportWriter {
    doc: PdfDocumentReference,
    pages: Vec<(PdfPageIndex, PdfLayerIndex, f64)>,
    current: PdfLayerReference,
    font: IndirectFontRef,
    bold: IndirectFontRef,
    y: f64,
    page: (f64, f64),
    section_counter: usize,
}

impl ReportWriter {
    fn new(title: &str) -> Result<Self> {
        let (doc, page1, layer1) =
            PdfDocument::new(title, Mm(PORTRAIT.0 as f32), Mm(PORTRAIT.1 as f32), "Layer 1");
        let font = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| anyhow!("fuente del PDF: {e}"))?;
        let bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| anyhow!("fuente del PDF: {e}"))?;
        let current = doc.get_page(page1).get_layer(layer1);
        Ok(Self {
            doc,
            pages: vec![(page1, layer1, PORTRAIT.0)],
            current,
            font,
            bold,
            y: MARGIN,
            page: PORTRAIT,
            section_counter: 1,
        })
    }

    fn add_page(&mut self, size: (f64, f64)) {
        let (page, layer) = self.doc.add_page(Mm(size.0 as f32), Mm(size.1 as f32), "Layer 1");
        self.current = self.doc.get_page(page).get_layer(layer);
        self.pages.push((page, layer, size.0));
        self.page = size;
        self.y = MARGIN;
    }

    /// Garantiza hueco vertical; si no lo hay, abre página nueva igual.
    fn ensure_space(&mut self, needed: f64) {
        if self.y + needed > self.page.1 - MARGIN {
            self.add_page(self.page);
        }
    }

    /// El origen de printpdf está abajo-izquierda; `y` aquí crece hacia
    /// abajo desde el borde superior.
    fn put(&self, text: &str, size: f64, x: f64, y_top: f64, bold: bool) {
        let font = if bold { &self.bold } else { &self.font };
        self.current
            .use_text(text, size as f32, Mm(x as f32), Mm((self.page.1 - y_top) as f32), font);
    }

    fn line(&mut self, text: &str, size: f64, x: f64, bold: bool) {
        let advance = pt_to_mm(size) * LINE_GAP;
        self.ensure_space(advance);
        self.y += advance;
        self.put(text, size, x, self.y, bold);
    }

    fn gap(&mut self, mm: f64) {
        self.y += mm;
    }

    fn centered_text(&mut self, text: &str, size: f64, y_top: f64, bold: bool) {
        let x = ((self.page.0 - text_width_mm(text, size)) / 2.0).max(MARGIN);
        self.put(text, size, x, y_top, bold);
    }

    fn section_title(&mut self, title: &str) {
        self.ensure_space(18.0);
        self.gap(6.0);
        let numbered = format!("{}. {}", self.section_counter, title);
        self.section_counter += 1;
        self.line(&numbered, 16.0, MARGIN, true);
        self.gap(2.0);
    }

    fn subtitle(&mut self, text: &str) {
        self.ensure_space(12.0);
        self.gap(3.0);
        self.line(text, 12.0, MARGIN, true);
    }

    fn paragraph(&mut self, text: &str) {
        if text.trim().is_empty() {
            return;
        }
        for raw_line in text.lines() {
            for line in wrap_text(raw_line, 95) {
                self.line(&line, 10.0, MARGIN, false);
            }
        }
        self.gap(4.0);
    }

    fn bullet_line(&mut self, text: &str, bold: bool) {
        let wrapped = wrap_text(text, 90);
        if let Some(first) = wrapped.first() {
            self.line(&format!("· {first}"), 9.0, MARGIN + 2.0, bold);
        }
    }

    fn key_value(&mut self, label: &str, value: &str) {
        let value_col = MARGIN + 65.0;
        let value_chars = 70;
        let lines = if value.is_empty() {
            vec![String::new()]
        } else {
            wrap_text(value, value_chars)
        };
        self.ensure_space(pt_to_mm(10.0) * LINE_GAP * lines.len() as f64);
        self.line(&format!("{label}:"), 10.0, MARGIN, true);
        self.put(lines.first().map(String::as_str).unwrap_or(""), 10.0, value_col, self.y, false);
        for extra in lines.iter().skip(1) {
            self.line(extra, 10.0, value_col, false);
        }
    }

    fn table(&mut self, headers: &[&str], rows: &[Vec<String>], size: f64) {
        let usable = self.page.0 - 2.0 * MARGIN;
        let col_width = usable / headers.len() as f64;
        let max_chars = ((col_width / (pt_to_mm(size) * 0.5)).floor() as usize).max(4);

        let advance = pt_to_mm(size) * LINE_GAP;
        self.ensure_space(advance * 2.0);
        self.y += advance;
        for (i, header) in headers.iter().enumerate() {
            let x = MARGIN + col_width * i as f64;
            self.put(&truncate_cell(header, max_chars), size, x, self.y, true);
        }
        for row in rows {
            self.ensure_space(advance);
            self.y += advance;
            for (i, cell) in row.iter().enumerate() {
                let x = MARGIN + col_width * i as f64;
                self.put(&truncate_cell(cell, max_chars), size, x, self.y, false);
            }
        }
        self.gap(6.0);
    }

    /// Pies de página y serialización final.
    fn into_bytes(self, footer_name: &str) -> Result<Vec<u8>> {
        let total = self.pages.len();
        for (i, (page, layer, width)) in self.pages.iter().enumerate() {
            let layer = self.doc.get_page(*page).get_layer(*layer);
            layer.use_text(footer_name, 8.0, Mm(MARGIN as f32), Mm(8.0), &self.font);
            layer.use_text(
                format!("Page {} of {}", i + 1, total),
                8.0,
                Mm((width - MARGIN - 22.0) as f32),
                Mm(8.0),
                &self.font,
            );
        }

        let mut buffer = BufWriter::new(Vec::new());
        self.doc
            .save(&mut buffer)
            .map_err(|e| anyhow!("no se pudo serializar el PDF: {e}"))?;
        buffer
            .into_inner()
            .map_err(|e| anyhow!("no se pudo volcar el búfer del PDF: {e}"))
    }
}

fn pt_to_mm(pt: f64) -> f64 {
    pt * 0.3528
}

/// Anchura aproximada de un texto en Helvetica (media ~0,5 em por carácter).
fn text_width_mm(text: &str, size: f64) -> f64 {
    text.chars().count() as f64 * pt_to_mm(size) * 0.5
}

fn truncate_cell(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let mut out: String = text.chars().take(max_chars.saturating_sub(1)).collect();
        out.push('…');
        out
    }
}

/// Ajuste de línea por palabras a un máximo de caracteres.
fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if !current.is_empty() && current.chars().count() + 1 + word.chars().count() > max_chars {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Anagrafica, BuildingDetail, Citation, Sublimit};

    fn record() -> ExtractedRecord {
        ExtractedRecord {
            anagrafica: Anagrafica {
                entity_name: Some("Acme Corp".to_string()),
                ..Anagrafica::default()
            },
            sublimits: vec![Sublimit {
                risk_type: Some("Property".to_string()),
                coverage: Some("Flood".to_string()),
                sublimit_type: Some("amount".to_string()),
                amount_eur_percent: Some("1.000.000".to_string()),
            }],
            building_details: vec![BuildingDetail {
                building_id: Some("B1".to_string()),
                building_name: Some("Planta principal".to_string()),
                total_rcv_eur: Some(5_500_000.0),
                ..BuildingDetail::default()
            }],
            ..ExtractedRecord::default()
        }
    }

    #[test]
    fn configuracion_por_defecto_incluye_todo_sin_portada_custom() {
        let config = PdfExportConfig::default();
        assert!(config.include_risk_summary);
        assert!(config.include_building_details);
        assert!(!config.use_custom_cover_page);
        assert!(config.policy_number.is_empty());
    }

    #[test]
    fn el_informe_completo_son_bytes_pdf() {
        let news = NewsResult {
            summary: Some("Noticias recientes de Acme.".to_string()),
            citations: vec![Citation {
                title: Some("Acme expands".to_string()),
                uri: "https://example.com/acme".to_string(),
            }],
        };
        let bytes =
            generate_pdf_report(&record(), Some(&news), &PdfExportConfig::default()).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
        assert!(bytes.len() > 500);
    }

    #[test]
    fn el_informe_minimo_tambien_es_valido() {
        let config = PdfExportConfig {
            include_risk_summary: false,
            include_latest_news: false,
            include_anagrafica: false,
            include_property_details: false,
            include_general_liability_details: false,
            include_product_liability_details: false,
            include_sublimits: false,
            include_building_details: false,
            ..PdfExportConfig::default()
        };
        let bytes = generate_pdf_report(&ExtractedRecord::default(), None, &config).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn nombre_de_fichero_del_informe() {
        assert_eq!(pdf_filename(&record()), "Acme_Corp_Risk_Report.pdf");
        assert_eq!(pdf_filename(&ExtractedRecord::default()), "Risk_Report.pdf");
    }

    #[test]
    fn wrap_text_respeta_el_maximo() {
        let lines = wrap_text("uno dos tres cuatro cinco", 9);
        assert!(lines.iter().all(|l| l.chars().count() <= 9));
        assert_eq!(lines.join(" "), "uno dos tres cuatro cinco");
        assert!(wrap_text("", 10).is_empty());
    }

    #[test]
    fn truncate_cell_marca_el_recorte() {
        assert_eq!(truncate_cell("corto", 10), "corto");
        let cut = truncate_cell("una celda larguísima", 8);
        assert_eq!(cut.chars().count(), 8);
        assert!(cut.ends_with('…'));
    }

    #[test]
    fn el_config_deserializa_camel_case_con_defaults() {
        let config: PdfExportConfig = serde_json::from_value(serde_json::json!({
            "includeRiskSummary": false,
            "useCustomCoverPage": true,
            "policyNumber": "POL-7"
        }))
        .unwrap();
        assert!(!config.include_risk_summary);
        assert!(config.include_anagrafica); // default conservado
        assert!(config.use_custom_cover_page);
        assert_eq!(config.policy_number, "POL-7");
    }
}
