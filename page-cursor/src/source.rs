// Copyright (c) James Kassemi, SC, US. All rights reserved.

//! Page fetch capability.

use crate::error::{FetchError, FetchResult};
use async_trait::async_trait;
use std::marker::PhantomData;

/// Capability returning up to `limit` consecutive elements starting at
/// absolute position `offset` in the logical source sequence.
///
/// Returning fewer than `limit` elements signals that the source has no
/// more elements past the returned range; a short page while more data
/// exists causes incorrect permanent exhaustion. The cursor guarantees at
/// most one current call per direction at a time.
#[async_trait]
pub trait PageSource: Send + Sync + 'static {
    type Item: Clone + Send + 'static;
    type Params: Clone + Send + Sync + 'static;

    async fn fetch_page(
        &self,
        limit: usize,
        offset: usize,
        params: &Self::Params,
    ) -> FetchResult<Vec<Self::Item>>;
}

/// Default capability: fails every call. A cursor is unusable until the
/// consumer supplies a real source.
pub struct UnimplementedSource<T, P> {
    _marker: PhantomData<fn() -> (T, P)>,
}

impl<T, P> UnimplementedSource<T, P> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T, P> Default for UnimplementedSource<T, P> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T, P> PageSource for UnimplementedSource<T, P>
where
    T: Clone + Send + 'static,
    P: Clone + Send + Sync + 'static,
{
    type Item = T;
    type Params = P;

    async fn fetch_page(&self, _limit: usize, _offset: usize, _params: &P) -> FetchResult<Vec<T>> {
        Err(FetchError::NotImplemented)
    }
}
