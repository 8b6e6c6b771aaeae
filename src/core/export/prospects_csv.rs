use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::pipeline::{ProspectKind, ProspectStatus, Timeline};
use crate::core::store::types::{Prospect, ProspectFields};

/// One CSV line. Derived columns are written on export and ignored on import.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProspectCsvRow {
    name: String,
    #[serde(default)]
    phone: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    kind: Option<ProspectKind>,
    #[serde(default)]
    budget: Option<f64>,
    #[serde(rename = "prixEstime", default)]
    estimated_price: Option<f64>,
    #[serde(rename = "tauxHonoraires", default)]
    fee_rate: Option<f64>,
    #[serde(rename = "exclusif", default)]
    exclusive: Option<bool>,
    #[serde(default)]
    timeline: Option<Timeline>,
    #[serde(default)]
    motivation: Option<String>,
    #[serde(default)]
    consent: Option<bool>,
    #[serde(rename = "statut", default)]
    status: Option<ProspectStatus>,
    #[serde(default)]
    notes: Option<String>,
    #[serde(default)]
    next_action: Option<String>,
    #[serde(default)]
    score: Option<i64>,
    #[serde(default)]
    expected_value: Option<f64>,
    #[serde(default)]
    created_at: Option<String>,
}

impl From<&Prospect> for ProspectCsvRow {
    fn from(p: &Prospect) -> Self {
        let f = &p.fields;
        Self {
            name: f.name.clone(),
            phone: f.phone.clone(),
            email: f.email.clone(),
            address: f.address.clone(),
            city: f.city.clone(),
            kind: Some(f.kind),
            budget: f.budget,
            estimated_price: f.estimated_price,
            fee_rate: f.fee_rate,
            exclusive: Some(f.exclusive),
            timeline: f.timeline,
            motivation: f.motivation.clone(),
            consent: Some(f.consent),
            status: Some(f.status),
            notes: f.notes.clone(),
            next_action: f.next_action.clone(),
            score: Some(p.score),
            expected_value: Some(p.expected_value),
            created_at: Some(p.created_at.clone()),
        }
    }
}

impl From<ProspectCsvRow> for ProspectFields {
    fn from(row: ProspectCsvRow) -> Self {
        Self {
            name: row.name,
            phone: row.phone,
            email: row.email,
            address: row.address,
            city: row.city,
            kind: row.kind.unwrap_or_default(),
            budget: row.budget,
            estimated_price: row.estimated_price,
            fee_rate: row.fee_rate,
            exclusive: row.exclusive.unwrap_or(false),
            timeline: row.timeline,
            motivation: row.motivation,
            consent: row.consent.unwrap_or(false),
            status: row.status.unwrap_or_default(),
            notes: row.notes,
            next_action: row.next_action,
        }
    }
}

/// Header plus one line per prospect, RFC 4180 quoting.
pub fn write_prospects(prospects: &[Prospect]) -> Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::CRLF)
        .from_writer(Vec::new());
    if prospects.is_empty() {
        // serde only emits the header alongside the first record.
        writer.write_record(HEADER)?;
    }
    for prospect in prospects {
        writer.serialize(ProspectCsvRow::from(prospect))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow!("csv flush failed: {}", e.error()))?;
    Ok(String::from_utf8(bytes)?)
}

const HEADER: [&str; 19] = [
    "name",
    "phone",
    "email",
    "address",
    "city",
    "kind",
    "budget",
    "prixEstime",
    "tauxHonoraires",
    "exclusif",
    "timeline",
    "motivation",
    "consent",
    "statut",
    "notes",
    "nextAction",
    "score",
    "expectedValue",
    "createdAt",
];

/// Parse and validate every row. Any bad row rejects the whole file.
pub fn read_prospects(data: &[u8]) -> Result<Vec<ProspectFields>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(data);
    let mut out = Vec::new();
    for (index, record) in reader.deserialize::<ProspectCsvRow>().enumerate() {
        // Line 1 is the header.
        let line = index + 2;
        let row = record.map_err(|e| anyhow!("line {}: {}", line, e))?;
        let fields = ProspectFields::from(row)
            .validate()
            .map_err(|e| anyhow!("line {}: {}", line, e))?;
        out.push(fields);
    }
    Ok(out)
}
