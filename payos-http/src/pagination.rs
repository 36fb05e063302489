//! Offset pagination for list endpoints.
//!
//! List responses carry their items under a resource-specific key next to a
//! `pagination` object:
//!
//! ```json
//! {"pagination": {"limit": 10, "offset": 0, "total": 42, "count": 10, "hasMore": true},
//!  "payouts": [...]}
//! ```
//!
//! A [`Page`] remembers the request that produced it and re-issues it with a
//! shifted `offset` to move forwards or backwards.

use futures_util::Stream;
use futures_util::stream;
use payos::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::PayOsClient;
use crate::request::RequestOptions;

/// Position of a page within the full result set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    /// Page size requested.
    #[serde(default)]
    pub limit: u64,
    /// Index of the first item on this page.
    #[serde(default)]
    pub offset: u64,
    /// Items across all pages.
    #[serde(default)]
    pub total: u64,
    /// Items on this page.
    #[serde(default)]
    pub count: u64,
    /// Whether a later page exists.
    #[serde(default)]
    pub has_more: bool,
}

/// One page of a list endpoint.
#[derive(Debug, Clone)]
pub struct Page<T> {
    items: Vec<T>,
    pagination: Pagination,
    request: RequestOptions,
    client: PayOsClient,
}

impl<T: DeserializeOwned> Page<T> {
    /// Performs `request` and decodes the result as a page.
    ///
    /// # Errors
    ///
    /// Any error from [`PayOsClient::request`], or [`Error::Json`] if the
    /// items do not decode into `T`.
    pub async fn fetch(client: &PayOsClient, request: RequestOptions) -> Result<Self> {
        let data: Value = client.request(request.clone()).await?;
        Self::from_data(client.clone(), data, request)
    }

    fn from_data(client: PayOsClient, data: Value, request: RequestOptions) -> Result<Self> {
        let (items, pagination) = decode_page(data)?;
        Ok(Self {
            items,
            pagination,
            request,
            client,
        })
    }

    /// Returns `true` if the server reported more items after this page.
    #[must_use]
    pub const fn has_next_page(&self) -> bool {
        self.pagination.has_more
    }

    /// Returns `true` if this page does not start at offset 0.
    #[must_use]
    pub const fn has_previous_page(&self) -> bool {
        self.pagination.offset > 0
    }

    /// Fetches the page after this one.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] if there is no next page, otherwise as
    /// [`Page::fetch`].
    pub async fn next_page(&self) -> Result<Self> {
        if !self.has_next_page() {
            return Err(Error::InvalidArgument("No more pages available".into()));
        }
        Self::fetch(&self.client, self.next_request()).await
    }

    /// Fetches the page before this one.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] if this is the first page, otherwise as
    /// [`Page::fetch`].
    pub async fn previous_page(&self) -> Result<Self> {
        if !self.has_previous_page() {
            return Err(Error::InvalidArgument("No previous pages available".into()));
        }
        let offset = self.pagination.offset.saturating_sub(self.pagination.limit);
        Self::fetch(&self.client, self.request_at(offset)).await
    }

    fn next_request(&self) -> RequestOptions {
        self.request_at(self.pagination.offset + self.pagination.count)
    }

    fn request_at(&self, offset: u64) -> RequestOptions {
        self.request
            .clone()
            .with_query("offset", offset)
            .with_query("limit", self.pagination.limit)
    }

    /// Collects every item from this page onwards.
    ///
    /// # Errors
    ///
    /// The first error raised while fetching a later page.
    pub async fn collect_all(self) -> Result<Vec<T>>
    where
        T: Send + 'static,
    {
        use futures_util::TryStreamExt;
        self.into_stream().try_collect().await
    }

    /// Streams every item from this page onwards, fetching pages lazily.
    pub fn into_stream(self) -> impl Stream<Item = Result<T>> + Send
    where
        T: Send + 'static,
    {
        let Self {
            items,
            pagination,
            request,
            client,
        } = self;
        let cursor = Cursor {
            items: items.into_iter(),
            pagination,
            request,
            client,
        };
        stream::try_unfold(cursor, Cursor::advance)
    }
}

impl<T> Page<T> {
    /// Items on this page.
    #[must_use]
    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Consumes the page, returning its items.
    #[must_use]
    pub fn into_items(self) -> Vec<T> {
        self.items
    }

    /// Pagination metadata for this page.
    #[must_use]
    pub const fn pagination(&self) -> &Pagination {
        &self.pagination
    }

    /// The request that produced this page.
    #[must_use]
    pub const fn request(&self) -> &RequestOptions {
        &self.request
    }
}

/// Iteration state for [`Page::into_stream`].
struct Cursor<T> {
    items: std::vec::IntoIter<T>,
    pagination: Pagination,
    request: RequestOptions,
    client: PayOsClient,
}

impl<T: DeserializeOwned> Cursor<T> {
    /// Yields the next item, fetching the following page when this one is
    /// drained. An empty page ends the stream even if `hasMore` is set.
    async fn advance(mut self) -> Result<Option<(T, Self)>> {
        loop {
            if let Some(item) = self.items.next() {
                return Ok(Some((item, self)));
            }
            if !self.pagination.has_more {
                return Ok(None);
            }
            let request = self.page().next_request();
            let next = Page::<T>::fetch(&self.client, request).await?;
            if next.items.is_empty() {
                return Ok(None);
            }
            self.items = next.items.into_iter();
            self.pagination = next.pagination;
            self.request = next.request;
        }
    }

    /// An empty page at the cursor's position.
    fn page(&self) -> Page<T> {
        Page {
            items: Vec::new(),
            pagination: self.pagination,
            request: self.request.clone(),
            client: self.client.clone(),
        }
    }
}

/// Splits list data into items and pagination.
///
/// Items are read from the first key other than `pagination`. `null` data
/// is an empty page.
fn decode_page<T: DeserializeOwned>(data: Value) -> Result<(Vec<T>, Pagination)> {
    let Value::Object(map) = data else {
        return Ok((Vec::new(), Pagination::default()));
    };
    let pagination = match map.get("pagination") {
        Some(value) if !value.is_null() => Pagination::deserialize(value)?,
        _ => Pagination::default(),
    };
    let items = match map.iter().find(|(key, _)| key.as_str() != "pagination") {
        Some((_, value)) if !value.is_null() => Vec::<T>::deserialize(value)?,
        _ => Vec::new(),
    };
    Ok((items, pagination))
}
