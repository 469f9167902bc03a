//! `did:web` identity document and feed generator description.

use serde::Serialize;

use crate::feeds::FeedTable;

const DID_CONTEXT: &str = "https://www.w3.org/ns/did/v1";
const SERVICE_ID: &str = "#bsky_fg";
const SERVICE_TYPE: &str = "BskyFeedGenerator";

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DidDocument {
    #[serde(rename = "@context")]
    pub context: Vec<String>,
    pub id: String,
    pub service: Vec<DidService>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DidService {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub service_endpoint: String,
}

/// `app.bsky.feed.describeFeedGenerator` output.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FeedGeneratorDescription {
    pub did: String,
    pub feeds: Vec<DescribedFeed>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DescribedFeed {
    pub uri: String,
}

pub fn service_did(hostname: &str) -> String {
    format!("did:web:{hostname}")
}

pub fn did_document(hostname: &str) -> DidDocument {
    DidDocument {
        context: vec![DID_CONTEXT.to_string()],
        id: service_did(hostname),
        service: vec![DidService {
            id: SERVICE_ID.to_string(),
            kind: SERVICE_TYPE.to_string(),
            service_endpoint: format!("https://{hostname}"),
        }],
    }
}

/// `at://<publisher>/app.bsky.feed.generator/<key>`
pub fn feed_uri(publisher_did: &str, key: &str) -> String {
    format!("at://{publisher_did}/app.bsky.feed.generator/{key}")
}

pub fn describe(
    hostname: &str,
    publisher_did: &str,
    feeds: &FeedTable,
) -> FeedGeneratorDescription {
    FeedGeneratorDescription {
        did: service_did(hostname),
        feeds: feeds
            .iter()
            .map(|f| DescribedFeed {
                uri: feed_uri(publisher_did, &f.key),
            })
            .collect(),
    }
}
