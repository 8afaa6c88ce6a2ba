//! Static landing page served on `GET /`.

/// The page posts to `/chat` and renders `reply` or `error.message`.
pub const INDEX_HTML: &str = include_str!("../../static/index.html");
