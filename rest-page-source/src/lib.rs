// Copyright (c) James Kassemi, SC, US. All rights reserved.

//! REST page source.
//!
//! [`RestPageSource`] implements [`PageSource`] against an HTTP endpoint
//! that takes `limit` and `offset` query parameters and answers with a
//! JSON array of elements.

use std::marker::PhantomData;

use async_trait::async_trait;
use log::debug;
use page_cursor::{FetchError, FetchResult, PageSource};
use reqwest::Client;
use serde::de::DeserializeOwned;
use url::Url;

/// Extra query pairs appended to every request. This is the opaque params
/// value handed to the cursor on `reset`, fixed for one session.
#[derive(Clone, Debug, Default)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pair(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.pairs.push((key.into(), value.into()));
        self
    }
}

/// Fetch capability over a limit/offset REST endpoint.
///
/// Each page request is a GET against the endpoint with `limit`, `offset`,
/// and the session's extra query pairs; the body must decode as a JSON
/// array of `T`. A short array means the source ended there, per the
/// [`PageSource`] contract, so the endpoint must not truncate pages for
/// any other reason.
pub struct RestPageSource<T> {
    client: Client,
    endpoint: Url,
    _marker: PhantomData<fn() -> T>,
}

impl<T> RestPageSource<T> {
    pub fn new(endpoint: Url) -> Self {
        let client = Client::builder()
            .user_agent("rest-page-source/0.1")
            .build()
            .expect("reqwest client");
        Self::with_client(client, endpoint)
    }

    /// Use a caller-built client, keeping its pool, proxy, and TLS setup.
    pub fn with_client(client: Client, endpoint: Url) -> Self {
        Self {
            client,
            endpoint,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<T> PageSource for RestPageSource<T>
where
    T: DeserializeOwned + Clone + Send + 'static,
{
    type Item = T;
    type Params = QueryParams;

    async fn fetch_page(
        &self,
        limit: usize,
        offset: usize,
        params: &QueryParams,
    ) -> FetchResult<Vec<T>> {
        let mut url = self.endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("limit", &limit.to_string())
                .append_pair("offset", &offset.to_string());
            for (key, value) in &params.pairs {
                query.append_pair(key, value);
            }
        }
        debug!("GET {url}");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(FetchError::transport)?;
        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            return Err(FetchError::Status(status.as_u16()));
        }
        response.json::<Vec<T>>().await.map_err(FetchError::decode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use page_cursor::PageCursor;
    use serde::Deserialize;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    /// Serves `limit`/`offset` slices of a fixed row set, empty past the end.
    fn paginate(rows: Vec<i64>) -> impl Fn(&Request) -> ResponseTemplate + Send + Sync {
        move |req: &Request| {
            let mut limit = 0usize;
            let mut offset = 0usize;
            for (key, value) in req.url.query_pairs() {
                match key.as_ref() {
                    "limit" => limit = value.parse().expect("limit"),
                    "offset" => offset = value.parse().expect("offset"),
                    _ => {}
                }
            }
            let page: Vec<i64> = if offset >= rows.len() {
                Vec::new()
            } else {
                let end = (offset + limit).min(rows.len());
                rows[offset..end].to_vec()
            };
            ResponseTemplate::new(200).set_body_json(page)
        }
    }

    fn source_for(server: &MockServer) -> RestPageSource<i64> {
        let endpoint = Url::parse(&server.uri()).expect("server uri");
        RestPageSource::new(endpoint)
    }

    #[tokio::test]
    async fn forwards_limit_offset_and_session_params() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .and(query_param("limit", "5"))
            .and(query_param("offset", "10"))
            .and(query_param("apiKey", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(vec![10, 11, 12]))
            .mount(&server)
            .await;

        let source = source_for(&server);
        let params = QueryParams::new().with_pair("apiKey", "test-key");
        let rows = source.fetch_page(5, 10, &params).await.unwrap();
        assert_eq!(rows, vec![10, 11, 12]);
    }

    #[tokio::test]
    async fn decodes_typed_rows() {
        #[derive(Clone, Debug, Deserialize, PartialEq)]
        struct Row {
            id: u32,
            name: String,
        }

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"id": 1, "name": "alpha"},
                {"id": 2, "name": "beta"},
            ])))
            .mount(&server)
            .await;

        let endpoint = Url::parse(&server.uri()).expect("server uri");
        let source: RestPageSource<Row> = RestPageSource::new(endpoint);
        let rows = source.fetch_page(2, 0, &QueryParams::new()).await.unwrap();
        assert_eq!(
            rows,
            vec![
                Row {
                    id: 1,
                    name: "alpha".into()
                },
                Row {
                    id: 2,
                    name: "beta".into()
                },
            ]
        );
    }

    #[tokio::test]
    async fn maps_status_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let source = source_for(&server);
        let err = source
            .fetch_page(5, 0, &QueryParams::new())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Status(404)));
    }

    #[tokio::test]
    async fn maps_decode_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not an array"))
            .mount(&server)
            .await;

        let source = source_for(&server);
        let err = source
            .fetch_page(5, 0, &QueryParams::new())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Decode(_)));
    }

    #[tokio::test]
    async fn maps_transport_errors() {
        let server = MockServer::start().await;
        let endpoint = Url::parse(&server.uri()).expect("server uri");
        drop(server);

        let source: RestPageSource<i64> = RestPageSource::new(endpoint);
        let err = source
            .fetch_page(5, 0, &QueryParams::new())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Transport(_)));
    }

    #[tokio::test]
    async fn three_element_endpoint_walk() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(paginate(vec![1, 2, 3]))
            .mount(&server)
            .await;

        let cursor = PageCursor::new(source_for(&server));
        assert_eq!(cursor.reset(QueryParams::new()).await.unwrap(), Some(1));
        assert_eq!(cursor.advance().await.unwrap(), Some(2));
        assert_eq!(cursor.advance().await.unwrap(), Some(3));
        assert_eq!(cursor.advance().await.unwrap(), None);
        assert_eq!(cursor.retreat().await.unwrap(), Some(2));
        assert_eq!(cursor.retreat().await.unwrap(), Some(1));
        assert_eq!(cursor.retreat().await.unwrap(), None);
    }

    #[tokio::test]
    async fn long_walk_pages_through_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(paginate((0..23).collect()))
            .mount(&server)
            .await;

        let cursor = PageCursor::new(source_for(&server));
        assert_eq!(cursor.reset(QueryParams::new()).await.unwrap(), Some(0));
        let mut seen = Vec::new();
        while let Some(elem) = cursor.advance().await.unwrap() {
            seen.push(elem);
        }
        assert_eq!(seen, (1..23).collect::<Vec<_>>());
        let requests = server.received_requests().await.expect("recording on");
        assert!(requests.len() < seen.len());
    }
}
