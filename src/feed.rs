//! Upstream ephemeris feed: transport and XML decoding.
//!
//! The document holds any number of `stateVector` elements, each with the
//! text children `EPOCH, X, Y, Z, X_DOT, Y_DOT, Z_DOT`:
//!
//! ```xml
//! <stateVector>
//!   <EPOCH>2024-079T12:00:00.000Z</EPOCH>
//!   <X>-4500.1</X> <Y>...</Y> <Z>...</Z>
//!   <X_DOT>3.1</X_DOT> <Y_DOT>...</Y_DOT> <Z_DOT>...</Z_DOT>
//! </stateVector>
//! ```

use std::future::Future;
use std::time::Duration;

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::FeedError;
use crate::model::{Position, StateVector, Velocity};

pub const DEFAULT_FEED_URL: &str =
    "https://nasa-public-data.s3.amazonaws.com/iss-coords/current/ISS_OEM/ISS.OEM_J2K_EPH.xml";

const STATE_VECTOR_TAG: &str = "stateVector";

/// Source of the raw feed document.
pub trait FeedSource: Send + Sync {
    fn fetch(&self) -> impl Future<Output = Result<String, FeedError>> + Send;
}

/// Fetches the feed over HTTP GET.
#[derive(Debug, Clone)]
pub struct HttpFeed {
    client: reqwest::Client,
    url: String,
}

impl HttpFeed {
    pub fn new(url: &str, timeout: Duration, user_agent: &str) -> Result<Self, FeedError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client, url: url.to_string() })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl FeedSource for HttpFeed {
    async fn fetch(&self) -> Result<String, FeedError> {
        let resp = self.client.get(&self.url).send().await?;
        if !resp.status().is_success() {
            return Err(FeedError::Status(resp.status().as_u16()));
        }
        Ok(resp.text().await?)
    }
}

// --- PARSER ---

#[derive(Debug, Default)]
struct RawStateVector {
    epoch: Option<String>,
    x: Option<String>,
    y: Option<String>,
    z: Option<String>,
    x_dot: Option<String>,
    y_dot: Option<String>,
    z_dot: Option<String>,
}

impl RawStateVector {
    fn slot(&mut self, tag: &str) -> Option<&mut Option<String>> {
        match tag {
            "EPOCH" => Some(&mut self.epoch),
            "X" => Some(&mut self.x),
            "Y" => Some(&mut self.y),
            "Z" => Some(&mut self.z),
            "X_DOT" => Some(&mut self.x_dot),
            "Y_DOT" => Some(&mut self.y_dot),
            "Z_DOT" => Some(&mut self.z_dot),
            _ => None,
        }
    }

    fn build(self, index: usize) -> Result<StateVector, FeedError> {
        let epoch = self
            .epoch
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty())
            .ok_or(FeedError::MissingField { index, field: "EPOCH" })?;

        let number = |value: Option<String>, field: &'static str| -> Result<f64, FeedError> {
            let value = value.ok_or(FeedError::MissingField { index, field })?;
            match value.trim().parse::<f64>() {
                Ok(n) if n.is_finite() => Ok(n),
                _ => Err(FeedError::InvalidNumber { epoch: epoch.clone(), field, value }),
            }
        };

        let position = Position {
            x: number(self.x, "X")?,
            y: number(self.y, "Y")?,
            z: number(self.z, "Z")?,
        };
        let velocity = Velocity {
            x_dot: number(self.x_dot, "X_DOT")?,
            y_dot: number(self.y_dot, "Y_DOT")?,
            z_dot: number(self.z_dot, "Z_DOT")?,
        };

        Ok(StateVector { epoch, position, velocity })
    }
}

// Text and CDATA nodes of one element are joined
fn append_text(raw: Option<&mut RawStateVector>, tag: Option<&str>, text: &str) {
    if let (Some(raw), Some(tag)) = (raw, tag) {
        if let Some(slot) = raw.slot(tag) {
            slot.get_or_insert_with(String::new).push_str(text);
        }
    }
}

/// Decodes every `stateVector` of the document, in document order.
/// Any malformed element fails the whole document.
pub fn parse_feed(xml: &str) -> Result<Vec<StateVector>, FeedError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut vectors = Vec::new();
    let mut current: Option<RawStateVector> = None;
    let mut field: Option<String> = None;
    let mut depth = 0usize;
    let mut saw_root = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                depth += 1;
                saw_root = true;
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if name == STATE_VECTOR_TAG {
                    current = Some(RawStateVector::default());
                } else if current.is_some() {
                    field = Some(name);
                }
            }
            Event::Empty(e) => {
                saw_root = true;
                if e.local_name().as_ref() == STATE_VECTOR_TAG.as_bytes() {
                    vectors.push(RawStateVector::default().build(vectors.len())?);
                }
            }
            Event::Text(t) => {
                let text = t.unescape()?;
                append_text(current.as_mut(), field.as_deref(), &text);
            }
            Event::CData(c) => {
                let bytes = c.into_inner();
                let text = std::str::from_utf8(&bytes)
                    .map_err(|e| FeedError::Malformed(format!("CDATA is not UTF-8: {e}")))?;
                append_text(current.as_mut(), field.as_deref(), text.trim());
            }
            Event::End(e) => {
                depth = depth.saturating_sub(1);
                if e.local_name().as_ref() == STATE_VECTOR_TAG.as_bytes() {
                    if let Some(raw) = current.take() {
                        vectors.push(raw.build(vectors.len())?);
                    }
                }
                field = None;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_root {
        return Err(FeedError::Malformed("no root element".into()));
    }
    if depth != 0 {
        return Err(FeedError::Malformed("unexpected end of document".into()));
    }

    Ok(vectors)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const TWO_VECTOR_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ndm>
    <oem>
        <body>
            <segment>
                <data>
                    <stateVector>
                        <EPOCH>2024-079T12:00:00.000Z</EPOCH>
                        <X>1.0</X>
                        <Y>2.0</Y>
                        <Z>3.0</Z>
                        <X_DOT>3.0</X_DOT>
                        <Y_DOT>4.0</Y_DOT>
                        <Z_DOT>5.0</Z_DOT>
                    </stateVector>
                    <stateVector>
                        <EPOCH>2024-079T13:00:00.000Z</EPOCH>
                        <X>4.0</X>
                        <Y>5.0</Y>
                        <Z>6.0</Z>
                        <X_DOT>6.0</X_DOT>
                        <Y_DOT>8.0</Y_DOT>
                        <Z_DOT>10.0</Z_DOT>
                    </stateVector>
                </data>
            </segment>
        </body>
    </oem>
</ndm>"#;

    #[test]
    fn parses_state_vectors_in_order() {
        let vectors = parse_feed(TWO_VECTOR_FEED).unwrap();
        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[0].epoch, "2024-079T12:00:00.000Z");
        assert_eq!(vectors[0].position, Position { x: 1.0, y: 2.0, z: 3.0 });
        assert_eq!(vectors[1].epoch, "2024-079T13:00:00.000Z");
        assert_eq!(vectors[1].velocity, Velocity { x_dot: 6.0, y_dot: 8.0, z_dot: 10.0 });
    }

    #[test]
    fn ignores_unrelated_elements() {
        let xml = r#"<ndm><header><CREATION_DATE>2024-079</CREATION_DATE></header>
            <data><COMMENT>units are km</COMMENT>
            <stateVector><EPOCH>2024-079T12:00:00.000Z</EPOCH><X>1</X><Y>2</Y><Z>3</Z>
            <X_DOT>-1.5e0</X_DOT><Y_DOT>0</Y_DOT><Z_DOT>0.25</Z_DOT></stateVector></data></ndm>"#;
        let vectors = parse_feed(xml).unwrap();
        assert_eq!(vectors.len(), 1);
        assert_eq!(vectors[0].velocity.x_dot, -1.5);
    }

    #[test]
    fn document_without_vectors_is_empty() {
        assert!(parse_feed("<ndm><oem/></ndm>").unwrap().is_empty());
    }

    #[test]
    fn non_numeric_field_fails_the_document() {
        let xml = TWO_VECTOR_FEED.replace("<Y_DOT>8.0</Y_DOT>", "<Y_DOT>fast</Y_DOT>");
        match parse_feed(&xml) {
            Err(FeedError::InvalidNumber { epoch, field, value }) => {
                assert_eq!(epoch, "2024-079T13:00:00.000Z");
                assert_eq!(field, "Y_DOT");
                assert_eq!(value, "fast");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn missing_field_fails_the_document() {
        let xml = TWO_VECTOR_FEED.replace("<Z>3.0</Z>", "");
        assert!(matches!(
            parse_feed(&xml),
            Err(FeedError::MissingField { index: 0, field: "Z" })
        ));
    }

    #[test]
    fn non_finite_values_are_rejected() {
        let xml = TWO_VECTOR_FEED.replace("<X>1.0</X>", "<X>NaN</X>");
        assert!(matches!(parse_feed(&xml), Err(FeedError::InvalidNumber { .. })));
    }

    /// Serves `body` with `status` on an ephemeral local port.
    fn serve(status: warp::http::StatusCode, body: &'static str) -> String {
        use warp::Filter;
        let route = warp::any().map(move || warp::reply::with_status(body, status));
        let (addr, server) = warp::serve(route).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(server);
        format!("http://{addr}/ISS.OEM_J2K_EPH.xml")
    }

    #[tokio::test]
    async fn http_feed_returns_the_document() {
        let url = serve(warp::http::StatusCode::OK, TWO_VECTOR_FEED);
        let feed = HttpFeed::new(&url, Duration::from_secs(5), "test").unwrap();
        let body = feed.fetch().await.unwrap();
        assert_eq!(parse_feed(&body).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn http_feed_maps_error_status() {
        let url = serve(warp::http::StatusCode::SERVICE_UNAVAILABLE, "down");
        let feed = HttpFeed::new(&url, Duration::from_secs(5), "test").unwrap();
        assert!(matches!(feed.fetch().await, Err(FeedError::Status(503))));
    }

    #[tokio::test]
    async fn unreachable_feed_is_a_transport_error() {
        let feed = HttpFeed::new("http://127.0.0.1:9/feed.xml", Duration::from_millis(500), "test").unwrap();
        assert_eq!(feed.url(), "http://127.0.0.1:9/feed.xml");
        assert!(matches!(feed.fetch().await, Err(FeedError::Http(_))));
    }

    #[test]
    fn cdata_fields_are_read_as_text() {
        let xml = TWO_VECTOR_FEED
            .replace("<X>1.0</X>", "<X><![CDATA[1.0]]></X>")
            .replace("<EPOCH>2024-079T13:00:00.000Z</EPOCH>", "<EPOCH><![CDATA[2024-079T13:00:00.000Z]]></EPOCH>")
            .replace("<Z_DOT>10.0</Z_DOT>", "<Z_DOT>1<![CDATA[0.5]]></Z_DOT>");
        let vectors = parse_feed(&xml).unwrap();
        assert_eq!(vectors[0].position.x, 1.0);
        assert_eq!(vectors[1].epoch, "2024-079T13:00:00.000Z");
        assert_eq!(vectors[1].velocity.z_dot, 10.5);
    }

    #[test]
    fn malformed_documents_are_rejected() {
        assert!(parse_feed("").is_err());
        assert!(parse_feed("not xml at all").is_err());
        assert!(parse_feed("<ndm><stateVector></ndm>").is_err());
        assert!(parse_feed("<ndm><data>").is_err());
    }
}
