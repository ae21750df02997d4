//! Keys used by the client's surfaces.

use super::key::CacheKey;
use narrify_core::PostId;

pub const POSTS: &str = "posts";
pub const MY_POSTS: &str = "my-posts";
pub const POST: &str = "post";

/// `["posts", search]`: public list filtered by committed search text.
pub fn posts(search: &str) -> CacheKey {
    CacheKey::new(POSTS).with(search)
}

/// `["posts"]`: prefix of every public list key.
pub fn posts_root() -> CacheKey {
    CacheKey::new(POSTS)
}

/// `["my-posts"]`: the logged-in identity's posts.
pub fn my_posts() -> CacheKey {
    CacheKey::new(MY_POSTS)
}

/// `["post", id]`: a single post.
pub fn post(id: PostId) -> CacheKey {
    CacheKey::new(POST).with(id)
}

/// Keys whose data belongs to the logged-in identity and must not outlive it.
pub fn is_identity_scoped(key: &CacheKey) -> bool {
    key.starts_with(&my_posts())
}
