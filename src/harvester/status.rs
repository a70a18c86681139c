use tracing::{info, warn};

use crate::oai::{OaiClient, OaiError, list_sets_url};

/// Issues a `ListSets` request against `base_url`.
///
/// True when the response lists at least one `ListSets/set/setSpec`; every
/// failure (network, HTTP status, XML, OAI-PMH error, no sets) is false.
pub async fn check_list_sets(base_url: &str) -> bool {
    match OaiClient::new(None) {
        Ok(client) => run(&client, base_url).await,
        Err(e) => {
            warn!("Failed to build HTTP client: {:#}", e);
            false
        }
    }
}

pub(super) async fn run(client: &OaiClient, endpoint: &str) -> bool {
    match list_sets(client, endpoint).await {
        Ok(count) => {
            info!("{} lists {} set(s)", endpoint, count);
            true
        }
        Err(e) => {
            warn!("ListSets check failed for {}: {:#}", endpoint, e);
            false
        }
    }
}

async fn list_sets(client: &OaiClient, endpoint: &str) -> anyhow::Result<usize> {
    let doc = client.fetch(list_sets_url(endpoint)?).await?;

    if let Some(error) = OaiError::from_document(&doc) {
        return Err(error.into());
    }

    let count = doc.select("//ListSets/set/setSpec").len();
    if count == 0 {
        anyhow::bail!("response has no ListSets/set/setSpec");
    }

    Ok(count)
}
