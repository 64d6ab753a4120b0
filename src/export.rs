//! Tabular lead export.
//!
//! Column order and names are the contract with the report layer.

use crate::errors::AppError;
use crate::models::{Coordinate, Lead};
use serde::Serialize;

pub const EXPORT_COLUMNS: [&str; 10] = [
    "region",
    "department",
    "latitude",
    "longitude",
    "surface_m2",
    "contact_name",
    "contact_phone",
    "contact_website",
    "google_maps_link",
    "wkt",
];

/// One export row. Field order is the column order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeadRow {
    pub region: String,
    pub department: String,
    pub latitude: f64,
    pub longitude: f64,
    pub surface_m2: f64,
    pub contact_name: String,
    pub contact_phone: String,
    pub contact_website: String,
    pub google_maps_link: String,
    pub wkt: String,
}

impl From<&Lead> for LeadRow {
    fn from(lead: &Lead) -> Self {
        let e = &lead.enriched;
        Self {
            region: e.region.clone().unwrap_or_default(),
            department: e.department.clone().unwrap_or_default(),
            latitude: e.candidate.coordinate.latitude,
            longitude: e.candidate.coordinate.longitude,
            surface_m2: lead.area_m2,
            contact_name: e.display_name.clone(),
            contact_phone: e.phone.clone().unwrap_or_default(),
            contact_website: e.website.clone().unwrap_or_default(),
            google_maps_link: e.map_link.clone().unwrap_or_default(),
            wkt: lead.geometry.wkt(),
        }
    }
}

/// WKT of a bare point, x = longitude.
pub fn point_wkt(point: Coordinate) -> String {
    format!("POINT({} {})", point.longitude, point.latitude)
}

/// Writes leads as CSV with a header row, even when there are no leads.
pub fn write_csv<W: std::io::Write>(leads: &[Lead], writer: W) -> Result<(), AppError> {
    let mut csv_writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    csv_writer.write_record(EXPORT_COLUMNS)?;
    for lead in leads {
        csv_writer.serialize(LeadRow::from(lead))?;
    }
    csv_writer
        .flush()
        .map_err(|e| AppError::InternalError(format!("CSV flush failed: {}", e)))?;
    Ok(())
}

/// CSV export as a string.
pub fn leads_to_csv(leads: &[Lead]) -> Result<String, AppError> {
    let mut buffer = Vec::new();
    write_csv(leads, &mut buffer)?;
    String::from_utf8(buffer)
        .map_err(|e| AppError::InternalError(format!("CSV is not UTF-8: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Candidate, EnrichedCandidate};

    fn lead() -> Lead {
        let enriched = EnrichedCandidate {
            candidate: Candidate {
                external_id: "p1".to_string(),
                coordinate: Coordinate::new(45.75, 4.85),
            },
            display_name: "Stockage, Froid & Co".to_string(),
            phone: Some("+33478000000".to_string()),
            website: None,
            map_link: Some("https://maps.google.com/?cid=9".to_string()),
            directory_link: "https://www.pagesjaunes.fr/recherche/x".to_string(),
            region: Some("Auvergne-Rhône-Alpes".to_string()),
            department: None,
            department_code: None,
        };
        Lead::new(enriched, None, 0.0)
    }

    #[test]
    fn test_header_only_when_empty() {
        let csv = leads_to_csv(&[]).unwrap();
        assert_eq!(
            csv,
            "region,department,latitude,longitude,surface_m2,contact_name,contact_phone,contact_website,google_maps_link,wkt\n"
        );
    }

    #[test]
    fn test_row_layout_and_quoting() {
        let csv = leads_to_csv(&[lead()]).unwrap();
        let mut lines = csv.lines();
        lines.next();
        assert_eq!(
            lines.next().unwrap(),
            "Auvergne-Rhône-Alpes,,45.75,4.85,0.0,\"Stockage, Froid & Co\",+33478000000,,https://maps.google.com/?cid=9,POINT(4.85 45.75)"
        );
    }

    #[test]
    fn test_point_wkt() {
        assert_eq!(point_wkt(Coordinate::new(48.5, -1.25)), "POINT(-1.25 48.5)");
    }
}
