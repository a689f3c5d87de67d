//! Tablas de campos por sección: clave de wire + etiqueta legible.
//!
//! Las comparten el CSV, el informe PDF, el borrador de correo y el
//! resaltado de faltantes; el orden de cada tabla es el orden de
//! presentación.

use serde_json::Value;

/// (clave camelCase en el wire, etiqueta para el usuario)
pub type FieldTable = &'static [(&'static str, &'static str)];

pub const ANAGRAFICA_FIELDS: FieldTable = &[
    ("entityName", "Entity Name"),
    ("altNames", "Alternative Names"),
    ("type", "Type"),
    ("industry", "Industry"),
    ("country", "Country"),
    ("city", "City"),
    ("address", "Address"),
    ("topLocation", "Top Location"),
    ("vat", "VAT Number"),
    ("taxCode", "Tax Code"),
    ("website", "Website"),
    ("brokerName", "Broker Name"),
    ("brokerCompany", "Broker Company"),
    ("periodFrom", "Period From"),
    ("periodTo", "Period To"),
    ("riskTypes", "Risk Types"),
    ("territorialScope", "Territorial Scope"),
    ("lossHistory5y", "Loss History (5y)"),
    ("annualRevenueAmount", "Annual Revenue"),
    ("annualRevenueYear", "Revenue Year"),
    ("payrollAmount", "Payroll Amount"),
    ("payrollYear", "Payroll Year"),
    ("headcount", "Headcount"),
];

pub const PROPERTY_FIELDS: FieldTable = &[
    ("tivPdTotalEur", "TIV PD Total (EUR)"),
    ("tivBiSumInsEur", "TIV BI Sum (EUR)"),
    ("ratePerMille", "Rate per Mille"),
    ("catIncluded", "CAT Included"),
    ("buildingsEur", "Buildings (EUR)"),
    ("machineryEur", "Machinery (EUR)"),
    ("stockEur", "Stock (EUR)"),
    ("marginContributionEur", "Margin Contribution (EUR)"),
    ("fireProtectionSummary", "Fire Protection Summary"),
    ("natHazardNotes", "Natural Hazard Notes"),
    ("biPeriodMonths", "BI Period (Months)"),
    ("biNotes", "BI Notes"),
];

pub const GENERAL_LIABILITY_FIELDS: FieldTable = &[
    ("rctLimitEur", "RCT Limit (EUR)"),
    ("aggregateLimitEur", "Aggregate Limit (EUR)"),
    ("formRctRco", "Form RCT/RCO"),
    ("usaCanCovered", "USA/Canada Covered"),
    ("dedRct", "Deductible RCT"),
    ("extensions", "Extensions"),
    ("exclusions", "Exclusions"),
    ("waivers", "Waivers"),
    ("retroUltrattivita", "Retroactivity"),
];

pub const PRODUCT_LIABILITY_FIELDS: FieldTable = &[
    ("rcpLimitEur", "RCP Limit (EUR)"),
    ("formRcp", "Form RCP"),
    ("recallSublimitEur", "Recall Sublimit (EUR)"),
    ("pollutionAccSublimitEur", "Pollution Sublimit (EUR)"),
    ("interruptionThirdPartySublimitEur", "3rd Party Interruption (EUR)"),
    ("dedRcp", "Deductible RCP"),
];

pub const SUBLIMIT_FIELDS: FieldTable = &[
    ("riskType", "Risk Type"),
    ("coverage", "Coverage"),
    ("sublimitType", "Sublimit Type"),
    ("amountEurPercent", "Amount (EUR/%)"),
];

pub const BUILDING_FIELDS: FieldTable = &[
    ("buildingId", "Building ID"),
    ("buildingName", "Building Name"),
    ("address", "Address"),
    ("occupancy", "Occupancy"),
    ("floorAreaSm", "Floor Area (sqm)"),
    ("buildingRcvEur", "Building RCV (EUR)"),
    ("contentsRcvEur", "Contents RCV (EUR)"),
    ("totalRcvEur", "Total RCV (EUR)"),
    ("yearBuilt", "Year Built"),
    ("manualFireAlarmPercent", "% Manual Fire Alarm"),
    ("automaticFireAlarmPercent", "% Automatic Fire Alarm"),
    ("sprinklersPercent", "% Sprinklers"),
    ("roofMaterial", "Roof Material"),
];

/// Heurística de «valor faltante» para resaltado y borrador de correo:
/// trata null, cadena vacía y cero numérico por igual. Confunde el cero
/// legítimo con la ausencia real; vive aislada aquí para poder sustituirla
/// por una política sólo-null sin tocar el modelo de datos.
pub fn is_missing_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Number(n) => n.as_f64().map(|f| f == 0.0).unwrap_or(false),
        _ => false,
    }
}

/// Valor de un campo dentro de una sección ya serializada.
pub fn field_value(section: &Value, key: &str) -> Value {
    section.get(key).cloned().unwrap_or(Value::Null)
}

/// Representación plana de un valor para celdas de CSV/PDF.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => {
            // Los importes llegan como float; sin decimales se muestran enteros.
            match n.as_f64() {
                Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
                _ => n.to_string(),
            }
        }
        other => other.to_string(),
    }
}
