mod harvester;
pub mod oai;
pub mod xml;

pub use harvester::{
    BibliographicRow, Harvester, HarvesterArgs, ListRecordsPage, OaiArgs, REPORT_FIELDS, Record,
    StatusArgs, check_list_sets, extract_fields,
};
pub use oai::{ListRecordsRequest, OaiConfig, build_request, extract_resumption_token};
