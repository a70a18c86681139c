use crate::xml::Element;

/// Returns, per field name, the full text of the first descendant of
/// `record` whose universal name ends with that name, or `""`.
///
/// Suffix matching ignores which namespace (and prefix) an endpoint uses
/// for Dublin Core.
pub fn extract_fields(record: &Element, fields: &[&str]) -> Vec<String> {
    fields
        .iter()
        .map(|field| {
            record
                .descendants()
                .find(|element| element.universal_name().ends_with(field))
                .map(Element::full_text)
                .unwrap_or_default()
        })
        .collect()
}

/// Field values aligned with the field names they were extracted for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BibliographicRow(Vec<String>);

impl BibliographicRow {
    pub fn extract(record: &Element, fields: &[&str]) -> Self {
        Self(extract_fields(record, fields))
    }

    pub fn values(&self) -> &[String] {
        &self.0
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }
}

impl From<Vec<String>> for BibliographicRow {
    fn from(values: Vec<String>) -> Self {
        Self(values)
    }
}

impl std::fmt::Display for BibliographicRow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.join(", "))
    }
}
