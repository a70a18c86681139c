#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use oai_status::{Harvester, OaiConfig};
use reqwest::Url;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    task::JoinHandle,
};

pub const PAGE_SIZE: usize = 51;
pub const DEFAULT_DATESTAMP: &str = "2026-02-07";
pub const REFORMATION: &str = "reformation";
pub const REFORMATION_RECORDS: usize = 73;
pub const LIEDFLUGSCHRIFTEN: &str = "illustrierte.liedflugschriften";
pub const LIEDFLUGSCHRIFTEN_RECORDS: usize = 160;
pub const BROKEN: &str = "broken";

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum ListSetsSpec {
    Sets,
    NoSets,
    NoSetHierarchy,
    Malformed,
}

#[derive(Clone)]
pub struct SetFixture {
    name: String,
    records: usize,
    /// Every page after the first is answered with broken XML.
    broken_after_first_page: bool,
}

#[derive(Clone)]
pub struct MockOaiConfig {
    pub list_sets: ListSetsSpec,
    pub sets: Vec<SetFixture>,
}

impl Default for MockOaiConfig {
    fn default() -> Self {
        Self {
            list_sets: ListSetsSpec::Sets,
            sets: vec![
                set_fixture(REFORMATION, REFORMATION_RECORDS),
                set_fixture(LIEDFLUGSCHRIFTEN, LIEDFLUGSCHRIFTEN_RECORDS),
                SetFixture {
                    broken_after_first_page: true,
                    ..set_fixture(BROKEN, 120)
                },
            ],
        }
    }
}

pub struct MockOaiServer {
    pub endpoint: String,
    requests: Arc<Mutex<Vec<String>>>,
    handle: JoinHandle<()>,
}

impl MockOaiServer {
    /// Query strings of all requests served so far, in arrival order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl Drop for MockOaiServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub fn set_fixture(name: &str, records: usize) -> SetFixture {
    SetFixture {
        name: name.to_string(),
        records,
        broken_after_first_page: false,
    }
}

pub fn harvester(server: &MockOaiServer) -> anyhow::Result<Harvester> {
    Harvester::new(OaiConfig::new(server.endpoint.clone()))
}

/// Splits a decoded resumption token into its `key=value` parts.
pub fn parse_token(token: &str) -> anyhow::Result<HashMap<String, String>> {
    let decoded = urlencoding::decode(token)?;
    Ok(decoded
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect())
}

pub fn encode_token(metadata_prefix: &str, set: &str, cursor: usize, batch_size: usize) -> String {
    urlencoding::encode(&format!(
        "metadataPrefix={metadata_prefix}&set={set}&cursor={cursor}&batch_size={batch_size}"
    ))
    .into_owned()
}

pub async fn start_mock_oai_server(config: MockOaiConfig) -> anyhow::Result<MockOaiServer> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let address = listener.local_addr()?;
    let endpoint = format!("http://{}/", address);
    let endpoint_for_task = endpoint.clone();
    let shared_config = Arc::new(config);
    let requests = Arc::new(Mutex::new(Vec::new()));
    let requests_for_task = requests.clone();

    let handle = tokio::spawn(async move {
        loop {
            let (mut socket, _) = match listener.accept().await {
                Ok(value) => value,
                Err(_) => break,
            };
            let endpoint = endpoint_for_task.clone();
            let config = shared_config.clone();
            let requests = requests_for_task.clone();
            tokio::spawn(async move {
                if let Err(error) =
                    handle_connection(&mut socket, &endpoint, &config, &requests).await
                {
                    eprintln!("mock OAI server request handling failed: {}", error);
                }
            });
        }
    });

    Ok(MockOaiServer {
        endpoint,
        requests,
        handle,
    })
}

async fn handle_connection(
    socket: &mut TcpStream,
    endpoint: &str,
    config: &MockOaiConfig,
    requests: &Mutex<Vec<String>>,
) -> anyhow::Result<()> {
    let mut buf = vec![0u8; 8192];
    let mut total = 0usize;

    loop {
        let bytes_read = socket.read(&mut buf[total..]).await?;
        if bytes_read == 0 {
            return Ok(());
        }
        total += bytes_read;
        if buf[..total].windows(4).any(|window| window == b"\r\n\r\n") {
            break;
        }
        if total == buf.len() {
            break;
        }
    }

    let request = String::from_utf8_lossy(&buf[..total]);
    let request_line = request.lines().next().unwrap_or_default();
    let path = request_line.split_whitespace().nth(1).unwrap_or("/");
    let url = Url::parse(&format!("http://mock{}", path))?;
    requests
        .lock()
        .unwrap()
        .push(url.query().unwrap_or_default().to_string());

    let params: HashMap<String, String> = url.query_pairs().into_owned().collect();
    let body = build_oai_response(endpoint, config, &params);
    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/xml; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    );

    socket.write_all(response.as_bytes()).await?;
    Ok(())
}

fn build_oai_response(
    endpoint: &str,
    config: &MockOaiConfig,
    params: &HashMap<String, String>,
) -> String {
    match params.get("verb").map(String::as_str) {
        Some("ListSets") => list_sets_response(endpoint, config),
        Some("ListRecords") => list_records_response(endpoint, config, params),
        _ => error_response(endpoint, params, "badVerb", "Unknown or missing verb"),
    }
}

fn list_sets_response(endpoint: &str, config: &MockOaiConfig) -> String {
    let sets = match config.list_sets {
        ListSetsSpec::Sets => config
            .sets
            .iter()
            .map(|set| {
                format!(
                    "<set><setSpec>{}</setSpec><setName>{}</setName></set>",
                    set.name, set.name
                )
            })
            .collect::<Vec<_>>()
            .join(""),
        ListSetsSpec::NoSets => String::new(),
        ListSetsSpec::NoSetHierarchy => {
            return error_response(
                endpoint,
                &HashMap::from([("verb".to_string(), "ListSets".to_string())]),
                "noSetHierarchy",
                "This repository does not support sets",
            );
        }
        ListSetsSpec::Malformed => return "<OAI-PMH><ListSets><set>".to_string(),
    };

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<OAI-PMH xmlns="http://www.openarchives.org/OAI/2.0/">
  <responseDate>2026-02-07T00:00:00Z</responseDate>
  <request verb="ListSets">{endpoint}</request>
  <ListSets>{sets}</ListSets>
</OAI-PMH>"#
    )
}

fn list_records_response(
    endpoint: &str,
    config: &MockOaiConfig,
    params: &HashMap<String, String>,
) -> String {
    let (metadata_prefix, set_name, cursor, batch_size) = match params.get("resumptionToken") {
        Some(token) => {
            if params.contains_key("metadataPrefix") || params.contains_key("set") {
                return error_response(
                    endpoint,
                    params,
                    "badArgument",
                    "resumptionToken is an exclusive argument",
                );
            }
            let state = match parse_token(token) {
                Ok(state) => state,
                Err(_) => {
                    return error_response(endpoint, params, "badResumptionToken", "bad token");
                }
            };
            let cursor = state.get("cursor").and_then(|value| value.parse().ok());
            let batch_size = state.get("batch_size").and_then(|value| value.parse().ok());
            match (state.get("metadataPrefix"), state.get("set"), cursor, batch_size) {
                (Some(prefix), Some(set), Some(cursor), Some(batch_size)) => {
                    (prefix.clone(), set.clone(), cursor, batch_size)
                }
                _ => return error_response(endpoint, params, "badResumptionToken", "bad token"),
            }
        }
        None => match (params.get("metadataPrefix"), params.get("set")) {
            (Some(prefix), Some(set)) => (prefix.clone(), set.clone(), 0, PAGE_SIZE),
            _ => {
                return error_response(endpoint, params, "badArgument", "metadataPrefix missing");
            }
        },
    };

    let Some(set) = config.sets.iter().find(|set| set.name == set_name) else {
        return error_response(endpoint, params, "noRecordsMatch", "No matching records");
    };

    if set.broken_after_first_page && cursor > 0 {
        return "<OAI-PMH><ListRecords><record>".to_string();
    }

    let end = (cursor + batch_size).min(set.records);
    let records = (cursor..end)
        .map(|index| record_xml(&set.name, index))
        .collect::<Vec<_>>()
        .join("\n");
    let token = if end < set.records {
        format!(
            r#"<resumptionToken completeListSize="{}" cursor="{cursor}">{}</resumptionToken>"#,
            set.records,
            encode_token(&metadata_prefix, &set.name, end, batch_size)
        )
    } else {
        format!(
            r#"<resumptionToken completeListSize="{}" cursor="{cursor}"/>"#,
            set.records
        )
    };

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<OAI-PMH xmlns="http://www.openarchives.org/OAI/2.0/">
  <responseDate>2026-02-07T00:00:00Z</responseDate>
  <request verb="ListRecords">{endpoint}</request>
  <ListRecords>
{records}
    {token}
  </ListRecords>
</OAI-PMH>"#
    )
}

fn record_xml(set: &str, index: usize) -> String {
    format!(
        r#"    <record>
      <header>
        <identifier>oai:mock:{set}:{index}</identifier>
        <datestamp>{DEFAULT_DATESTAMP}</datestamp>
        <setSpec>{set}</setSpec>
      </header>
      <metadata>
        <oai_dc:dc xmlns:oai_dc="http://www.openarchives.org/OAI/2.0/oai_dc/" xmlns:dc="http://purl.org/dc/elements/1.1/">
          <dc:title>Ein hübsch new Lied {index}</dc:title>
          <dc:creator>Böschenstein, Johann</dc:creator>
          <dc:publisher>Gutknecht, Friedrich</dc:publisher>
          <dc:date>{}</dc:date>
          <dc:coverage>Nürnberg</dc:coverage>
        </oai_dc:dc>
      </metadata>
    </record>"#,
        1500 + index
    )
}

fn error_response(
    endpoint: &str,
    params: &HashMap<String, String>,
    code: &str,
    message: &str,
) -> String {
    let verb = params.get("verb").map(String::as_str).unwrap_or("Unknown");
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<OAI-PMH xmlns="http://www.openarchives.org/OAI/2.0/">
  <responseDate>2026-02-07T00:00:00Z</responseDate>
  <request verb="{verb}">{endpoint}</request>
  <error code="{code}">{message}</error>
</OAI-PMH>"#
    )
}
