use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use futures::stream::{self, Stream};

use crate::error::Result;
use crate::models::NewPost;

use super::extract::extract_posts;
use super::renderer::FeedRenderer;

pub const DEFAULT_MAX_POSTS: usize = 200;

struct WalkState<'a, R: ?Sized> {
    renderer: &'a mut R,
    url: &'a str,
    extracted_at: DateTime<Utc>,
    pending: VecDeque<NewPost>,
    remaining: usize,
    yielded: i64,
    opened: bool,
}

/// Walk the feed at `url` page by page, yielding posts newest first.
///
/// The stream is lazy: a page is only requested once every post of the
/// previous page has been consumed, so dropping the stream early never
/// fetches further pages. It ends after `max_posts` posts (mid-page if
/// need be) or when the feed has no next page. Every post carries
/// `extracted_at` and its position within the walk.
pub fn walk_feed<'a, R>(
    renderer: &'a mut R,
    url: &'a str,
    max_posts: Option<usize>,
    extracted_at: DateTime<Utc>,
) -> impl Stream<Item = Result<NewPost>> + 'a
where
    R: FeedRenderer + ?Sized,
{
    let state = WalkState {
        renderer,
        url,
        extracted_at,
        pending: VecDeque::new(),
        remaining: max_posts.unwrap_or(DEFAULT_MAX_POSTS),
        yielded: 0,
        opened: false,
    };

    stream::try_unfold(state, next_post)
}

async fn next_post<'a, R>(
    mut state: WalkState<'a, R>,
) -> Result<Option<(NewPost, WalkState<'a, R>)>>
where
    R: FeedRenderer + ?Sized,
{
    loop {
        if state.remaining == 0 {
            return Ok(None);
        }

        if let Some(mut post) = state.pending.pop_front() {
            post.feed_position = state.yielded;
            state.yielded += 1;
            state.remaining -= 1;
            return Ok(Some((post, state)));
        }

        if state.opened {
            if !state.renderer.advance_to_next_page().await? {
                return Ok(None);
            }
        } else {
            tracing::info!("Getting feed page {}", state.url);
            state.renderer.open(state.url).await?;
            state.opened = true;
        }

        let markup = state.renderer.current_markup().await?;
        let posts = extract_posts(&markup, state.extracted_at);
        tracing::debug!("Extracted {} posts from page", posts.len());
        state.pending.extend(posts);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{page, MockRenderer};
    use futures::TryStreamExt;

    async fn collect_ids(renderer: &mut MockRenderer, max_posts: Option<usize>) -> Vec<String> {
        walk_feed(renderer, "https://feed.test/", max_posts, Utc::now())
            .map_ok(|post| post.id)
            .try_collect()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn spans_pages_in_feed_order() {
        let mut renderer = MockRenderer::new(vec![page(&["p5", "p4"]), page(&["p3", "p2", "p1"])]);

        let ids = collect_ids(&mut renderer, None).await;

        assert_eq!(ids, ["p5", "p4", "p3", "p2", "p1"]);
        assert_eq!(renderer.opened, ["https://feed.test/"]);
        assert_eq!(renderer.pages_requested(), 2);
    }

    #[tokio::test]
    async fn stops_mid_page_at_the_limit() {
        let mut renderer = MockRenderer::new(vec![page(&["p5", "p4", "p3"]), page(&["p2"])]);

        let ids = collect_ids(&mut renderer, Some(2)).await;

        assert_eq!(ids, ["p5", "p4"]);
        assert_eq!(renderer.advances, 0);
    }

    #[tokio::test]
    async fn default_limit_applies() {
        let ids: Vec<String> = (0..DEFAULT_MAX_POSTS + 20).map(|i| format!("p{i}")).collect();
        let pages = ids
            .chunks(25)
            .map(|chunk| page(&chunk.iter().map(String::as_str).collect::<Vec<_>>()))
            .collect();
        let mut renderer = MockRenderer::new(pages);

        let walked = collect_ids(&mut renderer, None).await;

        assert_eq!(walked.len(), DEFAULT_MAX_POSTS);
        assert_eq!(walked[0], "p0");
    }

    #[tokio::test]
    async fn empty_pages_are_passed_over() {
        let mut renderer = MockRenderer::new(vec![page(&[]), page(&["p1"])]);

        let ids = collect_ids(&mut renderer, None).await;

        assert_eq!(ids, ["p1"]);
    }

    #[tokio::test]
    async fn positions_run_across_pages() {
        let mut renderer = MockRenderer::new(vec![page(&["a", "b"]), page(&["c"])]);
        let at = Utc::now();

        let posts: Vec<NewPost> = walk_feed(&mut renderer, "https://feed.test/", None, at)
            .try_collect()
            .await
            .unwrap();

        let positions: Vec<i64> = posts.iter().map(|p| p.feed_position).collect();
        assert_eq!(positions, [0, 1, 2]);
        assert!(posts.iter().all(|p| p.extracted_at == at));
    }

    #[tokio::test]
    async fn nothing_is_fetched_until_polled() {
        let mut renderer = MockRenderer::new(vec![page(&["p1"])]);

        {
            let stream = walk_feed(&mut renderer, "https://feed.test/", None, Utc::now());
            futures::pin_mut!(stream);
            assert_eq!(stream.try_next().await.unwrap().unwrap().id, "p1");
        }

        assert_eq!(renderer.pages_requested(), 1);
        assert_eq!(renderer.advances, 0);
    }

    #[tokio::test]
    async fn renderer_failure_ends_the_walk_with_an_error() {
        let mut renderer = MockRenderer::new(vec![page(&["p1"])]).failing_open();

        let result: Result<Vec<NewPost>> =
            walk_feed(&mut renderer, "https://feed.test/", None, Utc::now())
                .try_collect()
                .await;

        assert!(result.is_err());
    }
}
